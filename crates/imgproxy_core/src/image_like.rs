use regex::Regex;

use crate::resolve::PageLocation;

const DEFAULT_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "ico", "tiff", "avif", "heic",
];
const DEFAULT_PATH_TOKENS: &[&str] = &["/image", "/img/", "/avatar/", "/thumb"];
const DEFAULT_QUERY_TOKENS: &[&str] = &["image"];

/// Heuristic used by the network layer to decide whether a GET looks like an image.
///
/// This is a tunable policy: false negatives leave a request untouched, false
/// positives send a non-image through the proxy.
#[derive(Debug, Clone)]
pub struct ImageLikePolicy {
    extension: Regex,
    path_tokens: Vec<String>,
    query_tokens: Vec<String>,
}

impl ImageLikePolicy {
    pub fn new<E, P, Q>(extensions: E, path_tokens: P, query_tokens: Q) -> Result<Self, regex::Error>
    where
        E: IntoIterator,
        E::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: Into<String>,
        Q: IntoIterator,
        Q::Item: Into<String>,
    {
        let alternation = extensions
            .into_iter()
            .map(|ext| regex::escape(ext.as_ref()))
            .collect::<Vec<_>>()
            .join("|");
        let extension = Regex::new(&format!(r"(?i)\.({alternation})($|\?)"))?;
        Ok(Self {
            extension,
            path_tokens: path_tokens.into_iter().map(Into::into).collect(),
            query_tokens: query_tokens.into_iter().map(Into::into).collect(),
        })
    }

    pub fn is_image_like(&self, url: &str, location: &PageLocation) -> bool {
        if url.trim().is_empty() {
            return false;
        }
        match location.href().join(url) {
            Ok(parsed) => {
                let path = parsed.path();
                let query = parsed.query().unwrap_or("");
                self.extension.is_match(path)
                    || self.path_tokens.iter().any(|t| path.contains(t.as_str()))
                    || self.query_tokens.iter().any(|t| query.contains(t.as_str()))
            }
            Err(_) => {
                self.extension.is_match(url)
                    || self.path_tokens.iter().any(|t| url.contains(t.as_str()))
                    || self.query_tokens.iter().any(|t| url.contains(t.as_str()))
            }
        }
    }
}

impl Default for ImageLikePolicy {
    fn default() -> Self {
        let extension = Regex::new(&format!(
            r"(?i)\.({})($|\?)",
            DEFAULT_EXTENSIONS.join("|")
        ))
        .expect("default image extension pattern is valid");
        Self {
            extension,
            path_tokens: DEFAULT_PATH_TOKENS.iter().map(|t| t.to_string()).collect(),
            query_tokens: DEFAULT_QUERY_TOKENS.iter().map(|t| t.to_string()).collect(),
        }
    }
}
