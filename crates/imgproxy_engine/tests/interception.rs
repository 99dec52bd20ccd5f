use std::sync::Once;

use imgproxy_core::{LedgerKey, PageLocation, ProxyConfig, UrlResolver};
use imgproxy_engine::{
    ImageProxy, InstallError, InterceptionPoint, MemoryPage, NetworkPoint, Property,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(imgproxy_logging::initialize_for_tests);
}

fn gallery_page(html: &str) -> MemoryPage {
    init_logging();
    let location = PageLocation::parse("https://site.example/gallery/index.html").unwrap();
    MemoryPage::new(html, location)
}

fn wrapped(absolute: &str) -> String {
    UrlResolver::from_config(&ProxyConfig::default()).proxy(absolute)
}

const EMPTY: &str = "<html><head></head><body><div id=\"root\"></div></body></html>";

#[test]
fn src_setter_keeps_original_for_every_resolution_branch() {
    let mut page = gallery_page(EMPTY);
    let _proxy = ImageProxy::install(&mut page, ProxyConfig::default()).unwrap();

    let cases = [
        ("https://cdn.example/c.png", "https://cdn.example/c.png"),
        ("//cdn.example/b.png", "https://cdn.example/b.png"),
        ("/assets/a.png", "https://site.example/assets/a.png"),
        ("photo.jpg", "https://site.example/gallery/photo.jpg"),
    ];
    for (input, absolute) in cases {
        let img = page.create_element("img");
        page.set_property(img, Property::Src, input).unwrap();
        assert_eq!(page.attribute(img, "data-original-src").as_deref(), Some(input));
        assert_eq!(page.attribute(img, "src"), Some(wrapped(absolute)));
    }
}

#[test]
fn rewriting_twice_changes_nothing() {
    let mut page = gallery_page(EMPTY);
    let proxy = ImageProxy::install(&mut page, ProxyConfig::default()).unwrap();

    let img = page.create_element("img");
    page.set_property(img, Property::Src, "photo.jpg").unwrap();
    let first = page.attribute(img, "src");
    let ledger_size = proxy.ledger().len();

    assert!(!proxy.rewrite_if_needed(&mut page, img));
    assert_eq!(page.attribute(img, "src"), first);
    assert_eq!(proxy.ledger().len(), ledger_size);
    assert!(proxy
        .ledger()
        .contains(&LedgerKey::url("https://site.example/gallery/photo.jpg")));

    // Assigning the proxied value again is rejected by the marker check.
    page.set_property(img, Property::Src, first.as_deref().unwrap()).unwrap();
    assert_eq!(page.attribute(img, "src"), first);
    assert_eq!(page.attribute(img, "data-original-src").as_deref(), Some("photo.jpg"));
}

#[test]
fn repeated_src_assignments_stay_proxied() {
    let mut page = gallery_page(EMPTY);
    let proxy = ImageProxy::install(&mut page, ProxyConfig::default()).unwrap();
    let expected = wrapped("https://site.example/gallery/photo.jpg");

    let img = page.create_element("img");
    for _ in 0..2 {
        page.set_property(img, Property::Src, "photo.jpg").unwrap();
        assert_eq!(page.attribute(img, "src"), Some(expected.clone()));
    }
    assert_eq!(page.attribute(img, "data-original-src").as_deref(), Some("photo.jpg"));

    // A second element with a URL already in the ledger is proxied too,
    // but the rewrite is only counted once.
    let other = page.create_element("img");
    page.set_property(other, Property::Src, "photo.jpg").unwrap();
    assert_eq!(page.attribute(other, "src"), Some(expected));
    assert_eq!(page.attribute(other, "data-original-src").as_deref(), Some("photo.jpg"));
    assert_eq!(proxy.stats().sources, 1);
    assert!(proxy
        .ledger()
        .contains(&LedgerKey::url("https://site.example/gallery/photo.jpg")));
}

#[test]
fn disabling_dedup_rewrites_repeated_urls() {
    let mut page = gallery_page(EMPTY);
    let config = ProxyConfig {
        prevent_duplicates: false,
        ..ProxyConfig::default()
    };
    let _proxy = ImageProxy::install(&mut page, config).unwrap();

    for _ in 0..2 {
        let img = page.create_element("img");
        page.set_property(img, Property::Src, "same.png").unwrap();
        assert_eq!(
            page.attribute(img, "src"),
            Some(wrapped("https://site.example/gallery/same.png"))
        );
    }
}

#[test]
fn inline_schemes_pass_through_untouched() {
    let mut page = gallery_page(EMPTY);
    let proxy = ImageProxy::install(&mut page, ProxyConfig::default()).unwrap();
    let before = proxy.ledger().len();

    for value in ["data:image/png;base64,AAAA", "blob:https://site.example/1", "javascript:void(0)", ""] {
        let img = page.create_element("img");
        page.set_property(img, Property::Src, value).unwrap();
        assert_eq!(page.attribute(img, "src").as_deref(), Some(value));
        assert_eq!(page.attribute(img, "data-original-src"), None);
    }
    assert_eq!(proxy.ledger().len(), before);
}

#[test]
fn srcset_setter_preserves_descriptors_and_order() {
    let mut page = gallery_page(EMPTY);
    let _proxy = ImageProxy::install(&mut page, ProxyConfig::default()).unwrap();

    let img = page.create_element("img");
    page.set_property(img, Property::Srcset, "a.jpg 1x, b.jpg 2x").unwrap();
    let expected = format!(
        "{} 1x, {} 2x",
        wrapped("https://site.example/gallery/a.jpg"),
        wrapped("https://site.example/gallery/b.jpg")
    );
    assert_eq!(page.attribute(img, "srcset"), Some(expected));
    assert_eq!(
        page.attribute(img, "data-original-srcset").as_deref(),
        Some("a.jpg 1x, b.jpg 2x")
    );
}

#[test]
fn poster_setter_uses_its_own_namespace() {
    let mut page = gallery_page(EMPTY);
    let proxy = ImageProxy::install(&mut page, ProxyConfig::default()).unwrap();

    let img = page.create_element("img");
    page.set_property(img, Property::Src, "/media/clip.jpg").unwrap();
    let video = page.create_element("video");
    page.set_property(video, Property::Poster, "/media/clip.jpg").unwrap();

    assert_eq!(
        page.attribute(video, "poster"),
        Some(wrapped("https://site.example/media/clip.jpg"))
    );
    assert_eq!(page.attribute(video, "data-original-poster").as_deref(), Some("/media/clip.jpg"));
    assert_eq!(proxy.stats().posters, 1);
}

#[test]
fn inserted_images_are_rewritten_before_they_land() {
    let mut page = gallery_page(EMPTY);
    let _proxy = ImageProxy::install(&mut page, ProxyConfig::default()).unwrap();

    let root = page.first("#root").unwrap();
    let img = page.create_element("img");
    page.set_attribute(img, "src", "late.png").unwrap();
    page.set_attribute(img, "data-src", "late-hd.png").unwrap();
    page.append_child(root, img).unwrap();

    assert_eq!(page.attribute(img, "src"), Some(wrapped("https://site.example/gallery/late.png")));
    assert_eq!(
        page.attribute(img, "data-src"),
        Some(wrapped("https://site.example/gallery/late-hd.png"))
    );
    assert_eq!(page.attribute(img, "data-original-data-src").as_deref(), Some("late-hd.png"));

    let first = page.create_element("img");
    page.set_attribute(first, "src", "early.png").unwrap();
    page.insert_before(root, first, Some(img)).unwrap();
    assert_eq!(page.attribute(first, "src"), Some(wrapped("https://site.example/gallery/early.png")));
    assert_eq!(page.select("#root img"), vec![first, img]);
}

#[test]
fn network_requests_redirect_only_image_like_gets() {
    let mut page = gallery_page(EMPTY);
    let proxy = ImageProxy::install(&mut page, ProxyConfig::default()).unwrap();

    assert_eq!(
        page.fetch("/api/avatar/7", None),
        wrapped("https://site.example/api/avatar/7")
    );
    assert_eq!(
        page.xhr_open("GET", "https://cdn.example/p.webp?w=100"),
        wrapped("https://cdn.example/p.webp?w=100")
    );
    assert_eq!(page.xhr_open("POST", "/upload/a.png"), "/upload/a.png");
    assert_eq!(page.fetch("/upload/b.png", Some("put")), "/upload/b.png");
    assert_eq!(page.fetch("/api/users.json", None), "/api/users.json");

    let already = wrapped("https://cdn.example/x.png");
    assert_eq!(page.fetch(&already, None), already);

    assert_eq!(page.requests().len(), 6);
    assert_eq!(proxy.stats().requests, 2);
}

#[test]
fn refused_hooks_leave_the_rest_running() {
    let mut page = gallery_page(EMPTY);
    page.seal(InterceptionPoint::Property(Property::Src));
    page.seal_network(NetworkPoint::Fetch);

    let proxy = ImageProxy::install(&mut page, ProxyConfig::default()).unwrap();
    assert_eq!(
        proxy.degraded_hooks().element,
        vec![InterceptionPoint::Property(Property::Src)]
    );
    assert_eq!(proxy.degraded_hooks().network, vec![NetworkPoint::Fetch]);
    assert!(page.has_element_hooks(InterceptionPoint::Property(Property::Srcset)));
    assert!(page.has_network_hooks(NetworkPoint::XhrOpen));

    let img = page.create_element("img");
    page.set_property(img, Property::Src, "raw.png").unwrap();
    assert_eq!(page.attribute(img, "src").as_deref(), Some("raw.png"));

    page.set_property(img, Property::Srcset, "hd.png 2x").unwrap();
    assert_eq!(
        page.attribute(img, "srcset"),
        Some(format!("{} 2x", wrapped("https://site.example/gallery/hd.png")))
    );
    assert_eq!(page.fetch("/img/a.png", None), "/img/a.png");
}

#[test]
fn installation_is_refused_when_already_installed_or_excluded() {
    let mut page = gallery_page(EMPTY);
    let _proxy = ImageProxy::install(&mut page, ProxyConfig::default()).unwrap();
    assert!(matches!(
        ImageProxy::install(&mut page, ProxyConfig::default()),
        Err(InstallError::AlreadyInstalled)
    ));

    let mut excluded = gallery_page(EMPTY);
    let config = ProxyConfig {
        exclude_domains: vec!["site.example".into()],
        ..ProxyConfig::default()
    };
    assert!(matches!(
        ImageProxy::install(&mut excluded, config),
        Err(InstallError::DomainExcluded(host)) if host == "site.example"
    ));
    assert!(!excluded.has_element_hooks(InterceptionPoint::Property(Property::Src)));

    let mut invalid = gallery_page(EMPTY);
    let config = ProxyConfig {
        proxy_template: "ftp://proxy.example/".into(),
        ..ProxyConfig::default()
    };
    assert!(matches!(
        ImageProxy::install(&mut invalid, config),
        Err(InstallError::InvalidConfig(_))
    ));
}

#[test]
fn rewrite_url_string_is_exposed_for_callers() {
    let mut page = gallery_page(EMPTY);
    let proxy = ImageProxy::install(&mut page, ProxyConfig::default()).unwrap();
    assert_eq!(
        proxy.rewrite_url_string("/x.gif"),
        wrapped("https://site.example/x.gif")
    );
    assert_eq!(proxy.rewrite_url_string("data:,"), "data:,");
}
