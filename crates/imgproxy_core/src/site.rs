//! Site-category heuristics as a single data table.
//!
//! Each [`CategoryProfile`] describes how a category is detected, which extra
//! selectors its scan sweeps, and how its cadence changes when detected. One
//! generic scan routine in the engine iterates this table.

use std::time::Duration;

use bitflags::bitflags;
use regex::Regex;

use crate::config::ProxyConfig;

/// Host global holding player entries, each with an optional cover URL.
pub const HOST_DATA_GLOBAL: &str = "songs";
pub const HOST_COVER_FIELD: &str = "cover";
/// Private marker field storing the original cover on the host entry.
pub const HOST_ORIGINAL_FIELD: &str = "_originalCover";

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SiteCategories: u8 {
        const MUSIC = 1;
        const GALLERY = 1 << 1;
        const SOCIAL = 1 << 2;
        const ECOMMERCE = 1 << 3;
        const VIDEO = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SiteCategory {
    Music,
    Gallery,
    Social,
    Ecommerce,
    Video,
}

impl SiteCategory {
    pub const ALL: [SiteCategory; 5] = [
        SiteCategory::Music,
        SiteCategory::Gallery,
        SiteCategory::Social,
        SiteCategory::Ecommerce,
        SiteCategory::Video,
    ];

    pub fn flag(self) -> SiteCategories {
        match self {
            SiteCategory::Music => SiteCategories::MUSIC,
            SiteCategory::Gallery => SiteCategories::GALLERY,
            SiteCategory::Social => SiteCategories::SOCIAL,
            SiteCategory::Ecommerce => SiteCategories::ECOMMERCE,
            SiteCategory::Video => SiteCategories::VIDEO,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SiteCategory::Music => "music",
            SiteCategory::Gallery => "gallery",
            SiteCategory::Social => "social",
            SiteCategory::Ecommerce => "ecommerce",
            SiteCategory::Video => "video",
        }
    }

    pub fn profile(self) -> &'static CategoryProfile {
        &PROFILES[self as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordScope {
    /// Title, hostname and body text.
    PageText,
    Hostname,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Use `elevated_scan_interval_ms` once detected.
    Elevated,
    /// Use half the base interval once detected.
    Halved,
}

#[derive(Debug)]
pub struct CategoryProfile {
    pub category: SiteCategory,
    /// Case-insensitive regex alternation.
    pub keywords: &'static str,
    pub keyword_scope: KeywordScope,
    /// Any match marks the page as belonging to the category.
    pub marker_selectors: &'static [&'static str],
    pub selectors: &'static [&'static str],
    /// "Now playing" items whose images are swept as well.
    pub playing_selectors: &'static [&'static str],
    pub cadence: Cadence,
    /// Rewrite matched images even when their URL is already in the ledger.
    pub force_rewrite: bool,
    pub rewrite_posters: bool,
    pub reconcile_host_data: bool,
}

impl CategoryProfile {
    pub fn scan_interval(&self, detected: bool, config: &ProxyConfig) -> Duration {
        match (detected, self.cadence) {
            (false, _) => config.scan_interval(),
            (true, Cadence::Elevated) => config.elevated_scan_interval(),
            (true, Cadence::Halved) => config.scan_interval() / 2,
        }
    }

    fn keyword_match(&self, signals: &PageSignals<'_>) -> bool {
        let Ok(pattern) = Regex::new(&format!("(?i)({})", self.keywords)) else {
            return false;
        };
        match self.keyword_scope {
            KeywordScope::Hostname => pattern.is_match(signals.hostname),
            KeywordScope::PageText => {
                pattern.is_match(signals.title)
                    || pattern.is_match(signals.hostname)
                    || signals.body_text.is_some_and(|body| pattern.is_match(body))
            }
        }
    }
}

pub static PROFILES: [CategoryProfile; 5] = [
    CategoryProfile {
        category: SiteCategory::Music,
        keywords: "music|song|audio|player|spotify|pandora|deezer|tidal|soundcloud|bandcamp",
        keyword_scope: KeywordScope::PageText,
        marker_selectors: &[
            "#audio-player",
            "#cover-art",
            ".cover-art",
            ".album-cover",
            "audio",
            ".player",
        ],
        selectors: &[
            "#cover-art",
            ".cover-art",
            ".album-cover",
            ".song-cover",
            ".player-cover",
            ".cd-cover",
            ".album-img",
            ".music-cover",
            "[class*=\"cover\"]",
            "[class*=\"artwork\"]",
            "[class*=\"album\"]",
            "[id*=\"cover\"]",
            "[id*=\"artwork\"]",
            "[id*=\"album\"]",
            ".aplayer-pic",
            ".aplayer-cover",
            ".music-player-cover",
            "audio[poster]",
            "video[poster]",
            ".track-cover",
            ".jp-cover",
            ".now-playing-cover",
            ".playing-cover",
            ".musicInfo-cover",
            "[data-testid=\"cover-art-image\"]",
            ".cover-art-image",
            ".playlist-item-cover img",
        ],
        playing_selectors: &[
            ".playing",
            ".active",
            ".current",
            "[data-playing=\"true\"]",
            "[aria-current=\"true\"]",
            ".now-playing",
            ".is-playing",
            ".playlist-item.active",
            ".song-item.active",
        ],
        cadence: Cadence::Elevated,
        force_rewrite: true,
        rewrite_posters: true,
        reconcile_host_data: true,
    },
    CategoryProfile {
        category: SiteCategory::Gallery,
        keywords: "gallery|album|photo|image|picture|slide|carousel",
        keyword_scope: KeywordScope::PageText,
        marker_selectors: &[],
        selectors: &[
            ".gallery",
            ".carousel",
            ".slider",
            ".slideshow",
            ".album",
            "[class*=\"gallery\"]",
            "[class*=\"carousel\"]",
            "[class*=\"slider\"]",
            "[id*=\"gallery\"]",
            "[id*=\"carousel\"]",
            "[id*=\"slider\"]",
            ".img-container",
            ".photo-container",
            ".picture-container",
            ".swiper-slide",
            ".slide-item",
            ".thumbnail",
            "[role=\"listbox\"]",
            "[role=\"slider\"]",
            "[role=\"tabpanel\"]",
        ],
        playing_selectors: &[],
        cadence: Cadence::Halved,
        force_rewrite: false,
        rewrite_posters: false,
        reconcile_host_data: false,
    },
    CategoryProfile {
        category: SiteCategory::Social,
        keywords: "facebook|twitter|instagram|linkedin|pinterest|reddit|tumblr|weibo|wechat|qq|tiktok",
        keyword_scope: KeywordScope::Hostname,
        marker_selectors: &[],
        selectors: &[
            ".avatar",
            ".profile-pic",
            ".profile-image",
            ".user-avatar",
            "[class*=\"avatar\"]",
            "[class*=\"profile\"]",
            "[class*=\"user-pic\"]",
            ".post-image",
            ".tweet-image",
            ".status-image",
            ".story-image",
            ".feed-item-image",
            ".timeline-image",
            ".attachment",
            ".media-attachment",
            ".preview-image",
        ],
        playing_selectors: &[],
        cadence: Cadence::Halved,
        force_rewrite: false,
        rewrite_posters: false,
        reconcile_host_data: false,
    },
    CategoryProfile {
        category: SiteCategory::Ecommerce,
        keywords: "shop|store|mall|product|buy|cart|checkout|price|order",
        keyword_scope: KeywordScope::PageText,
        marker_selectors: &[],
        selectors: &[
            ".product-image",
            ".item-image",
            ".goods-image",
            "[class*=\"product\"]",
            "[class*=\"item-img\"]",
            "[class*=\"goods-img\"]",
            ".thumbnail",
            ".preview",
            ".showcase",
            ".cart-item-image",
            ".shop-item-image",
            ".merchandise-image",
            ".catalog-image",
            ".zoom-image",
            ".magnify-image",
        ],
        playing_selectors: &[],
        cadence: Cadence::Halved,
        force_rewrite: false,
        rewrite_posters: false,
        reconcile_host_data: false,
    },
    CategoryProfile {
        category: SiteCategory::Video,
        keywords: "video|movie|film|tv|show|episode|stream|watch|youtube|vimeo|bilibili",
        keyword_scope: KeywordScope::PageText,
        marker_selectors: &[],
        selectors: &[
            ".thumbnail",
            ".preview",
            ".poster",
            ".video-thumbnail",
            "[class*=\"thumbnail\"]",
            "[class*=\"poster\"]",
            "[class*=\"preview\"]",
            ".episode-image",
            ".movie-cover",
            ".video-cover",
            "video[poster]",
            ".recommend-cover",
            ".related-video-image",
            ".channel-image",
            ".playlist-thumbnail",
        ],
        playing_selectors: &[],
        cadence: Cadence::Halved,
        force_rewrite: false,
        rewrite_posters: true,
        reconcile_host_data: false,
    },
];

/// What the classifier can see of the page at setup time.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageSignals<'a> {
    pub title: &'a str,
    pub hostname: &'a str,
    pub body_text: Option<&'a str>,
    /// Whether the host data global exists as an array.
    pub has_host_data: bool,
}

/// Buckets the page into categories. `has_match` answers whether any element
/// matches a selector.
pub fn classify(signals: &PageSignals<'_>, mut has_match: impl FnMut(&str) -> bool) -> SiteCategories {
    let mut detected = SiteCategories::empty();
    for profile in &PROFILES {
        let hit = profile.keyword_match(signals)
            || profile.marker_selectors.iter().any(|sel| has_match(sel))
            || (profile.reconcile_host_data && signals.has_host_data);
        if hit {
            detected |= profile.category.flag();
        }
    }
    detected
}
