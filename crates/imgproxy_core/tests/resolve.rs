use imgproxy_core::{PageLocation, ProxyConfig, Rejection, Resolution, UrlResolver};
use pretty_assertions::assert_eq;

const PREFIX: &str = "https://images.weserv.nl/?url=";

fn gallery_page() -> PageLocation {
    PageLocation::parse("https://site.example/gallery/index.html").unwrap()
}

fn resolver() -> UrlResolver {
    UrlResolver::from_config(&ProxyConfig::default())
}

fn wrapped(absolute: &str) -> String {
    format!("{PREFIX}{}", urlencoding::encode(absolute))
}

#[test]
fn path_relative_joins_document_directory() {
    let out = resolver().rewrite("photo.jpg", &gallery_page());
    assert_eq!(out, wrapped("https://site.example/gallery/photo.jpg"));
}

#[test]
fn root_relative_joins_origin() {
    let out = resolver().rewrite("/assets/a.png", &gallery_page());
    assert_eq!(out, wrapped("https://site.example/assets/a.png"));
}

#[test]
fn protocol_relative_takes_page_scheme() {
    let out = resolver().rewrite("//cdn.example/b.png", &gallery_page());
    assert_eq!(out, wrapped("https://cdn.example/b.png"));

    let plain = PageLocation::parse("http://site.example/").unwrap();
    assert_eq!(
        resolver().rewrite("//cdn.example/b.png", &plain),
        wrapped("http://cdn.example/b.png")
    );
}

#[test]
fn absolute_urls_are_wrapped_unchanged() {
    let out = resolver().rewrite("https://cdn.example/c.png", &gallery_page());
    assert_eq!(out, wrapped("https://cdn.example/c.png"));
    assert_eq!(
        out,
        "https://images.weserv.nl/?url=https%3A%2F%2Fcdn.example%2Fc.png"
    );
}

#[test]
fn resolution_reports_absolute_form() {
    let resolution = resolver().resolve("photo.jpg", &gallery_page());
    assert_eq!(
        resolution,
        Resolution::Proxied {
            absolute: "https://site.example/gallery/photo.jpg".to_string(),
            proxied: wrapped("https://site.example/gallery/photo.jpg"),
        }
    );
}

#[test]
fn excluded_inputs_come_back_unchanged() {
    let page = gallery_page();
    let resolver = resolver();
    let cases = [
        ("", Rejection::Empty),
        ("   ", Rejection::Empty),
        ("https://images.weserv.nl/?url=x", Rejection::AlreadyProxied),
        ("data:image/png;base64,AAAA", Rejection::InlineScheme),
        ("blob:https://site.example/1234", Rejection::InlineScheme),
        ("javascript:void(0)", Rejection::InlineScheme),
        ("DATA:image/gif;base64,R0lG", Rejection::InlineScheme),
    ];
    for (input, reason) in cases {
        assert_eq!(resolver.resolve(input, &page), Resolution::Rejected(reason));
        assert_eq!(resolver.rewrite(input, &page), input);
    }
}

#[test]
fn custom_marker_overrides_template_host() {
    let config = ProxyConfig {
        proxy_template: "https://px.example/fetch?src=".to_string(),
        proxy_marker: Some("px.example/fetch".to_string()),
        ..ProxyConfig::default()
    };
    let resolver = UrlResolver::from_config(&config);
    assert_eq!(resolver.marker(), "px.example/fetch");
    assert!(resolver.rewrite("a.png", &gallery_page()).starts_with("https://px.example/fetch?src="));
}

#[test]
fn location_parts_follow_document_path() {
    let page = gallery_page();
    assert_eq!(page.origin(), "https://site.example");
    assert_eq!(page.directory(), "/gallery/");
    assert_eq!(page.hostname(), "site.example");
    assert!(page.is_same_origin("/styles/site.css"));
    assert!(!page.is_same_origin("https://cdn.example/site.css"));
}
