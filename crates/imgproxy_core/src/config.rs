use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const DEFAULT_PROXY_TEMPLATE: &str = "https://images.weserv.nl/?url=";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("proxy template is not an absolute http(s) url: {0}")]
    InvalidTemplate(String),
    #[error("{field} must be greater than zero")]
    ZeroInterval { field: &'static str },
}

/// Immutable-after-install settings for the rewrite engine.
///
/// Every field is optional in serialized form; missing fields take the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub proxy_template: String,
    /// Substring identifying already-proxied URLs. Defaults to the template host.
    pub proxy_marker: Option<String>,
    pub process_css_backgrounds: bool,
    pub process_dynamic_images: bool,
    pub intercept_network: bool,
    pub prevent_duplicates: bool,
    pub direct_prototype_intercept: bool,
    pub scan_interval_ms: u64,
    pub elevated_scan_interval_ms: u64,
    pub scan_jitter_ms: u64,
    pub viewport_margin_px: u32,
    pub scroll_debounce_ms: u64,
    pub inline_style_interval_ms: u64,
    pub css_sweep_delay_ms: u64,
    pub dom_ready_fallback_ms: u64,
    pub debug: bool,
    pub wait_for_dom_ready: bool,
    pub site_specific_handling: bool,
    pub exclude_domains: Vec<String>,
    pub exclude_selectors: Vec<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            proxy_template: DEFAULT_PROXY_TEMPLATE.to_string(),
            proxy_marker: None,
            process_css_backgrounds: true,
            process_dynamic_images: true,
            intercept_network: true,
            prevent_duplicates: true,
            direct_prototype_intercept: true,
            scan_interval_ms: 600,
            elevated_scan_interval_ms: 300,
            scan_jitter_ms: 400,
            viewport_margin_px: 300,
            scroll_debounce_ms: 200,
            inline_style_interval_ms: 1500,
            css_sweep_delay_ms: 500,
            dom_ready_fallback_ms: 2000,
            debug: false,
            wait_for_dom_ready: true,
            site_specific_handling: true,
            exclude_domains: Vec::new(),
            exclude_selectors: Vec::new(),
        }
    }
}

impl ProxyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let template = Url::parse(&self.proxy_template)
            .map_err(|_| ConfigError::InvalidTemplate(self.proxy_template.clone()))?;
        if !matches!(template.scheme(), "http" | "https") || template.host_str().is_none() {
            return Err(ConfigError::InvalidTemplate(self.proxy_template.clone()));
        }
        for (field, value) in [
            ("scan_interval_ms", self.scan_interval_ms),
            ("elevated_scan_interval_ms", self.elevated_scan_interval_ms),
            ("inline_style_interval_ms", self.inline_style_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroInterval { field });
            }
        }
        Ok(())
    }

    /// The substring whose presence marks a URL as already proxied.
    pub fn marker(&self) -> String {
        if let Some(marker) = self.proxy_marker.as_deref().filter(|m| !m.is_empty()) {
            return marker.to_string();
        }
        Url::parse(&self.proxy_template)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| self.proxy_template.clone())
    }

    pub fn is_domain_excluded(&self, hostname: &str) -> bool {
        self.exclude_domains
            .iter()
            .any(|domain| domain.eq_ignore_ascii_case(hostname))
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn elevated_scan_interval(&self) -> Duration {
        Duration::from_millis(self.elevated_scan_interval_ms)
    }
}
