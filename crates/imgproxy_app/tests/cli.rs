use std::fs;
use std::sync::Once;
use std::time::Duration;

use imgproxy_app::{
    decode_page, load_config, rewrite_page, write_atomically, AppError, RunOptions, RunReport,
};
use imgproxy_core::{ProxyConfig, SiteCategories, UrlResolver};
use imgproxy_engine::{DegradedHooks, RewriteStats};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(imgproxy_logging::initialize_for_tests);
}

fn wrapped(absolute: &str) -> String {
    UrlResolver::from_config(&ProxyConfig::default()).proxy(absolute)
}

fn options(run_ms: u64) -> RunOptions {
    RunOptions {
        page_url: "https://site.example/blog/post.html".into(),
        run_for: Duration::from_millis(run_ms),
    }
}

#[test]
fn partial_config_keeps_defaults() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("proxy.ron");
    fs::write(
        &path,
        r#"(
            proxy_template: "https://proxy.example/img?src=",
            exclude_selectors: [".no-proxy"],
            debug: true,
        )"#,
    )
    .unwrap();

    let config = load_config(Some(&path)).unwrap();
    assert_eq!(config.proxy_template, "https://proxy.example/img?src=");
    assert_eq!(config.exclude_selectors, vec![".no-proxy".to_string()]);
    assert!(config.debug);
    assert_eq!(config.scan_interval_ms, ProxyConfig::default().scan_interval_ms);
    assert_eq!(config.marker(), "proxy.example");

    assert_eq!(load_config(None).unwrap(), ProxyConfig::default());
}

#[test]
fn bad_configs_are_reported() {
    init_logging();
    let dir = TempDir::new().unwrap();

    let garbled = dir.path().join("garbled.ron");
    fs::write(&garbled, "(proxy_template: ").unwrap();
    assert!(matches!(load_config(Some(&garbled)), Err(AppError::ConfigParse { .. })));

    let invalid = dir.path().join("invalid.ron");
    fs::write(&invalid, "(scan_interval_ms: 0)").unwrap();
    assert!(matches!(load_config(Some(&invalid)), Err(AppError::Config(_))));

    let missing = dir.path().join("missing.ron");
    assert!(matches!(load_config(Some(&missing)), Err(AppError::Read { .. })));
}

#[test]
fn input_decoding_follows_bom_then_declaration_then_detection() {
    let mut bom = vec![0xEF, 0xBB, 0xBF];
    bom.extend_from_slice("<p>caf\u{e9}</p>".as_bytes());
    let decoded = decode_page(&bom).unwrap();
    assert_eq!(decoded.encoding_label, "UTF-8");
    assert_eq!(decoded.html, "<p>caf\u{e9}</p>");

    let mut latin = br#"<html><head><meta charset="iso-8859-1"></head><body>caf"#.to_vec();
    latin.push(0xE9);
    latin.extend_from_slice(b"</body></html>");
    let decoded = decode_page(&latin).unwrap();
    assert_eq!(decoded.encoding_label, "windows-1252");
    assert!(decoded.html.contains("caf\u{e9}"));

    let plain = "<html><body>na\u{ef}ve caf\u{e9}</body></html>";
    let decoded = decode_page(plain.as_bytes()).unwrap();
    assert_eq!(decoded.encoding_label, "UTF-8");
    assert_eq!(decoded.html, plain);
}

#[test]
fn atomic_writes_create_and_replace() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("out.html");

    write_atomically(&path, "first").unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "first");
    write_atomically(&path, "second").unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "second");

    let leftovers = fs::read_dir(path.parent().unwrap()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn saved_page_is_rewritten_end_to_end() {
    init_logging();
    let html = r#"<!DOCTYPE html>
<html><head><title>Notes</title>
<style>.banner { background-image: url(/img/banner.jpg); }</style>
</head><body>
<div class="banner"></div>
<img src="photo.jpg" srcset="photo.jpg 1x, photo@2x.jpg 2x">
<img class="lazy" src="data:image/gif;base64,R0lGOD" data-src="/img/lazy.jpg">
<div style="background-image: url('bg.png')"></div>
<img class="no-proxy" src="keep.jpg">
</body></html>"#;
    let config = ProxyConfig {
        exclude_selectors: vec![".no-proxy".into()],
        ..ProxyConfig::default()
    };

    let report = rewrite_page(html, &options(3000), config).unwrap();
    let out = &report.html;

    assert!(out.starts_with("<!DOCTYPE html>"));
    assert!(out.contains(&format!("src=\"{}\"", wrapped("https://site.example/blog/photo.jpg"))));
    assert!(out.contains("data-original-src=\"photo.jpg\""));
    assert!(out.contains(&format!(
        "srcset=\"{} 1x, {} 2x\"",
        wrapped("https://site.example/blog/photo.jpg"),
        wrapped("https://site.example/blog/photo@2x.jpg")
    )));
    assert!(out.contains(&format!("data-src=\"{}\"", wrapped("https://site.example/img/lazy.jpg"))));
    assert!(out.contains("src=\"data:image/gif;base64,R0lGOD\""));
    assert!(out.contains(&format!(
        "background-image: url(&quot;{}&quot;);",
        wrapped("https://site.example/blog/bg.png")
    )));
    assert!(out.contains("id=\"weserv-bg-interceptor\""));
    assert!(out.contains(&format!(
        ".banner {{ background-image: url(\"{}\") !important; }}",
        wrapped("https://site.example/img/banner.jpg")
    )));
    assert!(out.contains("src=\"keep.jpg\""));

    assert_eq!(report.stats.sources, 1);
    assert_eq!(report.stats.srcsets, 1);
    assert_eq!(report.stats.lazy_attributes, 1);
    assert_eq!(report.stats.backgrounds, 1);
    assert_eq!(report.stats.stylesheet_rules, 1);
    assert!(report.degraded.is_empty());
    assert!(report.summary().starts_with("rewrites applied: 5"));
}

#[test]
fn music_pages_report_their_category() {
    init_logging();
    let html = r#"<html><head><title>Song of the day</title></head>
<body><div class="player"><img class="album-cover" src="/covers/today.jpg"></div></body></html>"#;
    let report = rewrite_page(html, &options(500), ProxyConfig::default()).unwrap();
    assert!(report.categories.contains(SiteCategories::MUSIC));
    assert!(report.summary().contains("site categories: music"));
}

#[test]
fn summary_rows_add_up_to_the_total() {
    let report = RunReport {
        html: String::new(),
        stats: RewriteStats {
            sources: 2,
            backgrounds: 1,
            requests: 3,
            ..RewriteStats::default()
        },
        categories: SiteCategories::empty(),
        degraded: DegradedHooks::default(),
    };
    let summary = report.summary();
    assert!(summary.starts_with("rewrites applied: 6\n"));
    assert!(summary.contains("network requests"));

    let listed: usize = summary
        .lines()
        .skip(1)
        .filter_map(|line| line.split_whitespace().last()?.parse::<usize>().ok())
        .sum();
    assert_eq!(listed, 6);
}

#[test]
fn excluded_hosts_and_bad_urls_fail() {
    init_logging();
    let config = ProxyConfig {
        exclude_domains: vec!["site.example".into()],
        ..ProxyConfig::default()
    };
    assert!(matches!(
        rewrite_page("<html></html>", &options(0), config),
        Err(AppError::Install(_))
    ));

    let bad = RunOptions {
        page_url: "not a url".into(),
        run_for: Duration::ZERO,
    };
    assert!(matches!(
        rewrite_page("<html></html>", &bad, ProxyConfig::default()),
        Err(AppError::PageUrl(_))
    ));
}
