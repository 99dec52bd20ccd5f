use std::sync::Once;
use std::time::Duration;

use imgproxy_core::{
    classify, ImageLikePolicy, PageLocation, PageSignals, ProxyConfig, SiteCategories,
    SiteCategory,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(imgproxy_logging::initialize_for_tests);
}

fn no_elements(_: &str) -> bool {
    false
}

#[test]
fn music_is_detected_from_title_keywords() {
    init_logging();
    let signals = PageSignals {
        title: "My Music Player",
        hostname: "tunes.example",
        ..PageSignals::default()
    };
    let detected = classify(&signals, no_elements);
    assert!(detected.contains(SiteCategories::MUSIC));
}

#[test]
fn music_is_detected_from_marker_elements_and_host_data() {
    init_logging();
    let blank = PageSignals {
        title: "Home",
        hostname: "example.org",
        ..PageSignals::default()
    };
    let by_marker = classify(&blank, |selector| selector == "audio");
    assert_eq!(by_marker, SiteCategories::MUSIC);

    let by_data = classify(
        &PageSignals {
            has_host_data: true,
            ..blank
        },
        no_elements,
    );
    assert_eq!(by_data, SiteCategories::MUSIC);
}

#[test]
fn social_only_considers_hostname() {
    init_logging();
    let in_title = PageSignals {
        title: "Share on twitter",
        hostname: "blog.example",
        ..PageSignals::default()
    };
    assert!(!classify(&in_title, no_elements).contains(SiteCategories::SOCIAL));

    let in_host = PageSignals {
        title: "Home",
        hostname: "www.reddit.com",
        ..PageSignals::default()
    };
    assert!(classify(&in_host, no_elements).contains(SiteCategories::SOCIAL));
}

#[test]
fn body_text_contributes_to_detection() {
    init_logging();
    let signals = PageSignals {
        title: "Home",
        hostname: "example.org",
        body_text: Some("Add to cart and proceed to checkout"),
        has_host_data: false,
    };
    assert_eq!(classify(&signals, no_elements), SiteCategories::ECOMMERCE);
}

#[test]
fn cadence_shortens_only_when_detected() {
    let config = ProxyConfig::default();
    let music = SiteCategory::Music.profile();
    let gallery = SiteCategory::Gallery.profile();

    assert_eq!(music.scan_interval(false, &config), Duration::from_millis(600));
    assert_eq!(music.scan_interval(true, &config), Duration::from_millis(300));
    assert_eq!(gallery.scan_interval(true, &config), Duration::from_millis(300));
    assert_eq!(gallery.scan_interval(false, &config), Duration::from_millis(600));
}

#[test]
fn profiles_are_indexed_by_category() {
    for category in SiteCategory::ALL {
        assert_eq!(category.profile().category, category);
    }
}

#[test]
fn image_like_policy_matches_extensions_and_tokens() {
    let page = PageLocation::parse("https://site.example/app/").unwrap();
    let policy = ImageLikePolicy::default();

    assert!(policy.is_image_like("/media/pic.JPG", &page));
    assert!(policy.is_image_like("https://cdn.example/x.webp?w=200", &page));
    assert!(policy.is_image_like("/api/avatar/42", &page));
    assert!(policy.is_image_like("/render?type=image", &page));
    assert!(policy.is_image_like("thumbs/1", &page));
    assert!(!policy.is_image_like("/api/users.json", &page));
    assert!(!policy.is_image_like("", &page));
}

#[test]
fn custom_image_like_policy_is_tunable() {
    let page = PageLocation::parse("https://site.example/").unwrap();
    let policy = ImageLikePolicy::new(["png"], Vec::<String>::new(), Vec::<String>::new()).unwrap();

    assert!(policy.is_image_like("/a.png", &page));
    assert!(!policy.is_image_like("/a.jpg", &page));
    assert!(!policy.is_image_like("/img/a", &page));
}

#[test]
fn config_fields_default_when_missing() {
    let config: ProxyConfig = ron::from_str("(scan_interval_ms: 900, debug: true)").unwrap();
    assert_eq!(config.scan_interval_ms, 900);
    assert!(config.debug);
    assert_eq!(config.elevated_scan_interval_ms, 300);
    assert!(config.validate().is_ok());
    assert_eq!(config.marker(), "images.weserv.nl");
}

#[test]
fn config_rejects_bad_template_and_zero_intervals() {
    let bad = ProxyConfig {
        proxy_template: "not a url".into(),
        ..ProxyConfig::default()
    };
    assert!(bad.validate().is_err());

    let zero = ProxyConfig {
        scan_interval_ms: 0,
        ..ProxyConfig::default()
    };
    assert!(zero.validate().is_err());
}
