use std::sync::Once;
use std::time::Duration;

use imgproxy_core::{PageLocation, ProxyConfig, UrlResolver};
use imgproxy_engine::{
    sweep_inline_backgrounds, CssEngine, ImageProxy, MemoryPage, Page, Rewriter, SheetId,
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

fn important(selector: &str, absolute: &str) -> String {
    format!(
        "{selector} {{ background-image: url(\"{}\") !important; }}",
        wrapped(absolute)
    )
}

#[test]
fn overrides_cover_nested_rule_kinds() {
    let mut page = gallery_page(
        r#"<html><head>
            <link rel="stylesheet" href="/css/site.css">
            <link rel="stylesheet" href="https://other.example/remote.css">
            <style>
              @import url("/css/theme.css");
              @import url("https://other.example/x.css");
              .plain { color: red; }
              @media screen { .m { background-image: url(m.png); } }
              @keyframes k { from { background-image: url(k.png); } to { opacity: 1; } }
              .skip { background-image: url(data:image/png;base64,AAAA); }
            </style>
          </head><body></body></html>"#,
    );
    page.add_resource("https://site.example/css/site.css", ".site { background: url(/s.png) no-repeat; }");
    page.add_resource("https://site.example/css/theme.css", ".banner { background-image: url(banner.png); }");
    page.add_resource("https://other.example/remote.css", ".remote { background-image: url(r.png); }");

    let location = page.location().clone();
    let rewriter = Rewriter::new(ProxyConfig::default(), location);
    let mut css = CssEngine::new();
    assert_eq!(css.sweep_stylesheets(&mut page, &rewriter).unwrap(), 4);

    let sheet = page.sheet_by_id("weserv-bg-interceptor").unwrap();
    assert_eq!(css.override_sheet(), Some(sheet));
    assert_eq!(
        page.inserted_rules(sheet),
        &[
            important(".site", "https://site.example/s.png"),
            important(".banner", "https://site.example/gallery/banner.png"),
            format!(
                "@media screen {{ {} }}",
                important(".m", "https://site.example/gallery/m.png")
            ),
            format!(
                "@keyframes k {{ {} }}",
                important("from", "https://site.example/gallery/k.png")
            ),
        ]
    );

    // A second pass finds nothing new and never reads its own sheet.
    assert_eq!(css.sweep_stylesheets(&mut page, &rewriter).unwrap(), 0);
    assert_eq!(page.inserted_rules(sheet).len(), 4);
    assert_eq!(css.emitted_rules(), 4);
    assert_eq!(rewriter.stats().stylesheet_rules, 4);
    assert!(page.to_html().contains("id=\"weserv-bg-interceptor\""));
}

#[test]
fn external_sheet_urls_resolve_against_the_page() {
    let mut page = gallery_page(
        r#"<html><head><link rel="stylesheet" href="/css/site.css"></head><body></body></html>"#,
    );
    page.add_resource("https://site.example/css/site.css", ".hero { background-image: url(img/bg.png); }");

    let location = page.location().clone();
    let rewriter = Rewriter::new(ProxyConfig::default(), location);
    let mut css = CssEngine::new();
    assert_eq!(css.sweep_stylesheets(&mut page, &rewriter).unwrap(), 1);

    let sheet = css.override_sheet().unwrap();
    assert_eq!(
        page.inserted_rules(sheet),
        &[important(".hero", "https://site.example/gallery/img/bg.png")]
    );
}

#[test]
fn unreadable_sheet_does_not_block_the_rest() {
    let mut page = gallery_page(
        r#"<html><head>
            <style id="bad">.x { background-image: url(/x.jpg); }</style>
            <style id="good">.hero { background-image: url(/hero.jpg); }</style>
          </head><body>
            <div class="hero"></div>
            <div id="inline" style="color: red; background-image: url('/inline.png')"></div>
            <img id="pic" src="pic.png">
          </body></html>"#,
    );
    let bad = page.first("#bad").unwrap();
    page.deny_sheet(SheetId(bad.0));

    let mut proxy = ImageProxy::install(&mut page, ProxyConfig::default()).unwrap();
    page.run_for(&mut proxy, Duration::from_millis(550));

    let sheet = proxy.css().override_sheet().unwrap();
    assert_eq!(
        page.inserted_rules(sheet),
        &[important(".hero", "https://site.example/hero.jpg")]
    );

    let inline = page.first("#inline").unwrap();
    assert_eq!(
        page.inline_style_of(inline, "background-image"),
        Some(format!("url(\"{}\")", wrapped("https://site.example/inline.png")))
    );
    assert_eq!(page.inline_style_of(inline, "color").as_deref(), Some("red"));

    let pic = page.first("#pic").unwrap();
    assert_eq!(page.attribute(pic, "src"), Some(wrapped("https://site.example/gallery/pic.png")));
}

#[test]
fn inline_sweep_leaves_proxied_and_inline_values() {
    let proxied = wrapped("https://cdn.example/done.png");
    let html = format!(
        r#"<html><body>
            <div id="a" style="background-image: url(/a.png)"></div>
            <div id="b" style="background-image: url('{proxied}')"></div>
            <div id="c" style="background-image: url(data:image/gif;base64,R0lG)"></div>
            <div id="d" style="background-image: none"></div>
          </body></html>"#
    );
    let mut page = gallery_page(&html);
    let location = page.location().clone();
    let rewriter = Rewriter::new(ProxyConfig::default(), location);

    assert_eq!(sweep_inline_backgrounds(&mut page, &rewriter).unwrap(), 1);
    assert_eq!(sweep_inline_backgrounds(&mut page, &rewriter).unwrap(), 0);

    let a = page.first("#a").unwrap();
    assert_eq!(
        page.inline_style_of(a, "background-image"),
        Some(format!("url(\"{}\")", wrapped("https://site.example/a.png")))
    );
    let b = page.first("#b").unwrap();
    assert_eq!(
        page.inline_style_of(b, "background-image"),
        Some(format!("url('{proxied}')"))
    );
    assert_eq!(rewriter.stats().backgrounds, 1);
}

#[test]
fn css_processing_can_be_switched_off() {
    let mut page = gallery_page(
        r#"<html><head><style>.hero { background-image: url(/hero.jpg); }</style></head>
           <body><div id="inline" style="background-image: url(/inline.png)"></div></body></html>"#,
    );
    let config = ProxyConfig {
        process_css_backgrounds: false,
        ..ProxyConfig::default()
    };
    let mut proxy = ImageProxy::install(&mut page, config).unwrap();
    page.run_for(&mut proxy, Duration::from_secs(3));

    assert_eq!(proxy.css().override_sheet(), None);
    assert_eq!(page.sheet_by_id("weserv-bg-interceptor"), None);
    let inline = page.first("#inline").unwrap();
    assert_eq!(
        page.inline_style_of(inline, "background-image").as_deref(),
        Some("url(/inline.png)")
    );
}
