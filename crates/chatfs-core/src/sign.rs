//! Signed thumbnail URLs pointing back at the proxy route.

use std::sync::Arc;

/// Signs virtual paths for the serving layer.
pub trait LinkSigner: Send + Sync {
    /// Signature over the unencoded virtual path.
    fn sign(&self, path: &str) -> String;
}

/// Normalise a `/`-separated virtual path: collapses empty and `.`
/// segments, resolves `..`, always starts with `/`.
pub fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// `base/child`, cleaned.
pub fn join_path(base: &str, child: &str) -> String {
    clean_path(&format!("{base}/{child}"))
}

/// Percent-encode each segment of a path, keeping the separators.
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Builds `<api base>/p/<path>?type=thumb&sign=<signature>` URLs.
#[derive(Clone)]
pub struct ThumbnailUrls {
    api_base: String,
    signer: Arc<dyn LinkSigner>,
}

impl ThumbnailUrls {
    pub fn new(api_base: impl Into<String>, signer: Arc<dyn LinkSigner>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            signer,
        }
    }

    /// URL of the thumbnail of `name` inside the directory `req_path`.
    pub fn url_for(&self, req_path: &str, name: &str) -> String {
        let path = join_path(req_path, name);
        let signature = self.signer.sign(&path);
        format!(
            "{}{}?type=thumb&sign={}",
            self.api_base,
            encode_path(&join_path("/p", &path)),
            urlencoding::encode(&signature)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reverse;

    impl LinkSigner for Reverse {
        fn sign(&self, path: &str) -> String {
            path.chars().rev().collect()
        }
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(""), "/");
        assert_eq!(clean_path("a//b/./c/"), "/a/b/c");
        assert_eq!(clean_path("/a/b/../c"), "/a/c");
        assert_eq!(clean_path("/../.."), "/");
    }

    #[test]
    fn test_url_signs_unencoded_path() {
        let urls = ThumbnailUrls::new("https://drive.example/", Arc::new(Reverse));
        let url = urls.url_for("/News ChatChannel/2022-11", "a b.pdf");
        assert_eq!(
            url,
            "https://drive.example/p/News%20ChatChannel/2022-11/a%20b.pdf\
             ?type=thumb&sign=fdp.b%20a%2F11-2202%2FlennahCtahC%20sweN%2F"
        );
    }
}
