//! Fixed attribute and selector vocabularies shared by every rewrite path.

/// Attributes used by lazy-loading libraries to hold the real image URL.
pub const LAZY_ATTRIBUTES: &[&str] = &[
    "data-src",
    "data-lazy-src",
    "data-original",
    "lazy-src",
    "data-cover",
    "data-thumbnail",
    "data-image",
    "data-bg",
    "data-srcset",
    "data-defer-src",
    "data-origin",
    "data-backdrop",
    "data-url",
    "data-high-res-src",
    "data-low-res-src",
    "data-raw-src",
    "data-img",
    "data-src-retina",
];

/// Lazy attributes whose values are srcset lists rather than single URLs.
pub const LAZY_SRCSET_ATTRIBUTES: &[&str] = &["data-srcset"];

/// Elements managed by common lazy-loading conventions.
pub const LAZY_SELECTORS: &[&str] = &[
    "[loading=\"lazy\"]",
    ".lazyload",
    ".lazy",
    ".lazy-load",
    ".b-lazy",
    "[data-lazy]",
    "[data-lazyload]",
    ".js-lazy-image",
    ".js-lazy",
    ".js-lazyload",
    "[data-ll-status]",
    "[data-src]",
    "[data-original]",
];

/// Class names that mark the "current" item in players and carousels.
pub const ACTIVE_CLASS_MARKERS: &[&str] = &["active", "playing"];

pub const INLINE_BACKGROUND_SELECTOR: &str = "[style*=\"background-image\"]";

/// Set on images handled by the viewport scan.
pub const PROCESSED_MARKER: &str = "data-proxy-processed";

/// Id of the stylesheet holding corrective background rules.
pub const OVERRIDE_SHEET_ID: &str = "weserv-bg-interceptor";

/// Name under which the engine claims the page, preventing double installation.
pub const NAMESPACE: &str = "_imageProxyHandler";

/// `data-original-<name>`: where the pre-rewrite value of `name` is kept.
pub fn shadow_attribute(name: &str) -> String {
    format!("data-original-{name}")
}

/// Attributes the mutation observer listens to.
pub fn observed_attributes() -> Vec<String> {
    let mut names: Vec<String> = ["src", "srcset", "poster", "class", "style"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    names.extend(LAZY_ATTRIBUTES.iter().map(|s| s.to_string()));
    names
}

pub fn joined(selectors: &[&str]) -> String {
    selectors.join(",")
}
