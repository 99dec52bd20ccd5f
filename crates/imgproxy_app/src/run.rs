use std::fmt::Write as _;
use std::time::Duration;

use imgproxy_core::{PageLocation, ProxyConfig, SiteCategories, SiteCategory};
use imgproxy_engine::{DegradedHooks, ImageProxy, MemoryPage, RewriteStats};
use imgproxy_logging::proxy_info;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub page_url: String,
    /// Virtual time the periodic scans get before the engine is stopped.
    pub run_for: Duration,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub html: String,
    pub stats: RewriteStats,
    pub categories: SiteCategories,
    pub degraded: DegradedHooks,
}

impl RunReport {
    pub fn summary(&self) -> String {
        let s = &self.stats;
        let mut out = String::new();
        let _ = writeln!(out, "rewrites applied: {}", s.total());
        for (label, count) in [
            ("image sources", s.sources),
            ("srcset lists", s.srcsets),
            ("lazy attributes", s.lazy_attributes),
            ("posters", s.posters),
            ("inline backgrounds", s.backgrounds),
            ("stylesheet overrides", s.stylesheet_rules),
            ("host track entries", s.host_entries),
            ("network requests", s.requests),
        ] {
            let _ = writeln!(out, "  {label:<22}{count}");
        }
        let categories: Vec<&str> = SiteCategory::ALL
            .iter()
            .filter(|category| self.categories.contains(category.flag()))
            .map(|category| category.name())
            .collect();
        if !categories.is_empty() {
            let _ = writeln!(out, "site categories: {}", categories.join(", "));
        }
        if !self.degraded.is_empty() {
            let _ = writeln!(
                out,
                "hooks refused: {:?} {:?}",
                self.degraded.element, self.degraded.network
            );
        }
        out
    }
}

/// Loads `html` as if served from `options.page_url`, lets the engine run
/// its setup and periodic scans, then stops it and serializes the result.
pub fn rewrite_page(html: &str, options: &RunOptions, config: ProxyConfig) -> Result<RunReport, AppError> {
    let location = PageLocation::parse(&options.page_url)?;
    let mut page = MemoryPage::loading(html, location);
    let mut proxy = ImageProxy::install(&mut page, config)?;

    page.finish_loading();
    page.settle(&mut proxy);
    page.run_for(&mut proxy, options.run_for);
    proxy.stop(&mut page);

    let report = RunReport {
        html: page.to_html(),
        stats: proxy.stats(),
        categories: proxy.categories(),
        degraded: proxy.degraded_hooks().clone(),
    };
    proxy_info!("Rewrote {} surfaces on {}", report.stats.total(), options.page_url);
    Ok(report)
}
