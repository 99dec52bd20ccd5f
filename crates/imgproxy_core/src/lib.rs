//! Image proxy core: pure URL, ledger and heuristic logic with no page access.
mod config;
mod css_url;
mod image_like;
mod ledger;
mod resolve;
mod site;
mod srcset;
pub mod vocab;

pub use config::{ConfigError, ProxyConfig, DEFAULT_PROXY_TEMPLATE};
pub use css_url::{first_url, is_candidate_background, rewrite_url_tokens, url_tokens, UrlToken};
pub use image_like::ImageLikePolicy;
pub use ledger::{DedupLedger, LedgerKey, Surface};
pub use resolve::{PageLocation, Rejection, Resolution, UrlResolver};
pub use site::{
    classify, Cadence, CategoryProfile, KeywordScope, PageSignals, SiteCategories, SiteCategory,
    HOST_COVER_FIELD, HOST_DATA_GLOBAL, HOST_ORIGINAL_FIELD, PROFILES,
};
pub use srcset::{parse_srcset, rewrite_srcset, SrcsetCandidate};
