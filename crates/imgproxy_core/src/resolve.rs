use url::Url;

use crate::config::ProxyConfig;

const INLINE_SCHEMES: &[&str] = &["data:", "blob:", "javascript:"];

/// The document address every relative reference is resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    href: Url,
    origin: String,
}

impl PageLocation {
    pub fn parse(href: &str) -> Result<Self, url::ParseError> {
        Url::parse(href).map(Self::new)
    }

    pub fn new(href: Url) -> Self {
        let origin = href.origin().ascii_serialization();
        Self { href, origin }
    }

    pub fn href(&self) -> &Url {
        &self.href
    }

    /// `scheme://host[:port]`, or `null` for opaque origins.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn scheme(&self) -> &str {
        self.href.scheme()
    }

    pub fn hostname(&self) -> &str {
        self.href.host_str().unwrap_or("")
    }

    pub fn path(&self) -> &str {
        match self.href.path() {
            "" => "/",
            path => path,
        }
    }

    /// Directory portion of the path, always ending in `/`.
    pub fn directory(&self) -> &str {
        let path = self.path();
        match path.rfind('/') {
            Some(idx) => &path[..=idx],
            None => "/",
        }
    }

    /// Whether `other` (absolute or relative to this page) shares the page origin.
    pub fn is_same_origin(&self, other: &str) -> bool {
        self.href
            .join(other)
            .map(|url| url.origin().ascii_serialization() == self.origin)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Empty,
    AlreadyProxied,
    InlineScheme,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Left untouched; callers forward the input unchanged.
    Rejected(Rejection),
    Proxied { absolute: String, proxied: String },
}

impl Resolution {
    pub fn is_proxied(&self) -> bool {
        matches!(self, Resolution::Proxied { .. })
    }
}

/// Absolutizes candidate references and wraps them in the proxy template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlResolver {
    prefix: String,
    marker: String,
}

impl UrlResolver {
    pub fn new(prefix: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            marker: marker.into(),
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(config.proxy_template.clone(), config.marker())
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn contains_marker(&self, value: &str) -> bool {
        value.contains(self.marker.as_str())
    }

    pub fn rejection(&self, candidate: &str) -> Option<Rejection> {
        let trimmed = candidate.trim();
        if trimmed.is_empty() {
            return Some(Rejection::Empty);
        }
        if self.contains_marker(trimmed) {
            return Some(Rejection::AlreadyProxied);
        }
        if has_inline_scheme(trimmed) {
            return Some(Rejection::InlineScheme);
        }
        None
    }

    /// Resolution order: absolute http(s), protocol-relative, root-relative,
    /// then path-relative against the current document directory.
    pub fn absolutize(&self, candidate: &str, location: &PageLocation) -> String {
        let trimmed = candidate.trim();
        if is_absolute_http(trimmed) {
            trimmed.to_string()
        } else if trimmed.starts_with("//") {
            format!("{}:{trimmed}", location.scheme())
        } else if trimmed.starts_with('/') {
            format!("{}{trimmed}", location.origin())
        } else {
            format!("{}{}{trimmed}", location.origin(), location.directory())
        }
    }

    pub fn proxy(&self, absolute: &str) -> String {
        format!("{}{}", self.prefix, urlencoding::encode(absolute))
    }

    pub fn resolve(&self, candidate: &str, location: &PageLocation) -> Resolution {
        if let Some(rejection) = self.rejection(candidate) {
            return Resolution::Rejected(rejection);
        }
        let absolute = self.absolutize(candidate, location);
        let proxied = self.proxy(&absolute);
        Resolution::Proxied { absolute, proxied }
    }

    /// The proxied form of `candidate`, or `candidate` itself when rejected.
    pub fn rewrite(&self, candidate: &str, location: &PageLocation) -> String {
        match self.resolve(candidate, location) {
            Resolution::Proxied { proxied, .. } => proxied,
            Resolution::Rejected(_) => candidate.to_string(),
        }
    }
}

fn has_inline_scheme(value: &str) -> bool {
    INLINE_SCHEMES.iter().any(|scheme| {
        value
            .get(..scheme.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
    })
}

fn is_absolute_http(value: &str) -> bool {
    ["http://", "https://"].iter().any(|scheme| {
        value
            .get(..scheme.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
    })
}
