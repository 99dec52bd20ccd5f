//! Periodic and event-driven reconciliation scans.
//!
//! Each scan reports how many elements it changed. Per-element failures are
//! isolated so that one bad element never aborts the rest of the pass.

use imgproxy_core::vocab::{self, LAZY_SELECTORS, PROCESSED_MARKER};
use imgproxy_core::{
    CategoryProfile, Resolution, HOST_COVER_FIELD, HOST_DATA_GLOBAL, HOST_ORIGINAL_FIELD,
};
use imgproxy_logging::{abbreviate, proxy_debug, proxy_trace};
use serde_json::Value;

use crate::css::sweep_inline_backgrounds_in;
use crate::guard::{isolate, RewriteError};
use crate::page::{NodeId, Page, PageError, QueryScope};
use crate::rewriter::{RewriteMode, Rewriter};

const MEDIA_WITH_POSTER: &str = "video[poster], audio[poster]";

pub fn general_scan(page: &mut dyn Page, rewriter: &Rewriter) -> Result<usize, RewriteError> {
    rewriter.sweep_subtree(page, QueryScope::Document)
}

pub fn lazy_scan(page: &mut dyn Page, rewriter: &Rewriter) -> Result<usize, RewriteError> {
    let nodes = page.query_all(QueryScope::Document, &vocab::joined(LAZY_SELECTORS))?;
    Ok(rewrite_each(page, rewriter, &nodes, RewriteMode::Deduplicated))
}

/// Sweeps the documents of same-origin frames, inline backgrounds included
/// when CSS handling is on. Cross-origin frames are skipped without a trace.
pub fn iframe_scan(page: &mut dyn Page, rewriter: &Rewriter) -> Result<usize, RewriteError> {
    let mut count = 0;
    for frame in page.query_all(QueryScope::Document, "iframe")? {
        count += isolate("iframe", || {
            let scope = QueryScope::Subtree(page.frame_document(frame)?);
            let mut swept = rewriter.sweep_subtree(page, scope)?;
            if rewriter.config().process_css_backgrounds {
                swept += sweep_inline_backgrounds_in(page, rewriter, scope)?;
            }
            Ok(swept)
        });
    }
    Ok(count)
}

/// Images near the visible viewport that no viewport pass has handled yet.
pub fn viewport_scan(page: &mut dyn Page, rewriter: &Rewriter) -> Result<usize, RewriteError> {
    let selector = format!("img:not([{PROCESSED_MARKER}])");
    let margin = f64::from(rewriter.config().viewport_margin_px);
    let height = page.viewport_height();

    let mut count = 0;
    for node in page.query_all(QueryScope::Document, &selector)? {
        let Some(rect) = page.bounding_rect(node) else {
            continue;
        };
        if rect.bottom < -margin || rect.top > height + margin {
            continue;
        }
        count += usize::from(isolate("viewport image", || {
            let changed = rewriter.rewrite_element(page, node, RewriteMode::Deduplicated)?;
            let element = page.element_mut(node).ok_or(PageError::NotAnElement(node))?;
            element.set_attribute(PROCESSED_MARKER, "true")?;
            Ok(changed)
        }));
    }
    if count > 0 {
        proxy_trace!("viewport scan rewrote {count} images");
    }
    Ok(count)
}

/// One pass of a site category: its selectors, its "now playing" items,
/// its media posters and, for music, the host track list.
pub fn category_scan(
    page: &mut dyn Page,
    rewriter: &Rewriter,
    profile: &CategoryProfile,
) -> Result<usize, RewriteError> {
    let mode = if profile.force_rewrite {
        RewriteMode::Forced
    } else {
        RewriteMode::Deduplicated
    };

    let mut count = 0;
    for selectors in [profile.selectors, profile.playing_selectors] {
        if selectors.is_empty() {
            continue;
        }
        let containers = page.query_all(QueryScope::Document, &vocab::joined(selectors))?;
        for container in containers {
            count += isolate(profile.category.name(), || {
                sweep_container(page, rewriter, container, mode)
            });
        }
    }

    if profile.rewrite_posters {
        for node in page.query_all(QueryScope::Document, MEDIA_WITH_POSTER)? {
            if rewriter.should_skip(page, node) {
                continue;
            }
            count += usize::from(isolate("poster", || {
                let element = page.element_mut(node).ok_or(PageError::NotAnElement(node))?;
                rewriter.rewrite_poster(element)
            }));
        }
    }

    if profile.reconcile_host_data {
        count += isolate("host data", || reconcile_host_data(page, rewriter));
    }
    Ok(count)
}

fn sweep_container(
    page: &mut dyn Page,
    rewriter: &Rewriter,
    container: NodeId,
    mode: RewriteMode,
) -> Result<usize, RewriteError> {
    let mut count = usize::from(rewriter.rewrite_element(page, container, mode)?);
    let images = page.query_all(QueryScope::Subtree(container), "img")?;
    count += rewrite_each(page, rewriter, &images, mode);
    Ok(count)
}

fn rewrite_each(page: &mut dyn Page, rewriter: &Rewriter, nodes: &[NodeId], mode: RewriteMode) -> usize {
    let mut count = 0;
    for &node in nodes {
        count += usize::from(isolate("element", || rewriter.rewrite_element(page, node, mode)));
    }
    count
}

/// Rewrites the cover field of every entry in the host's track list once.
/// The entry itself remembers the original URL, independent of the ledger.
pub fn reconcile_host_data(page: &mut dyn Page, rewriter: &Rewriter) -> Result<usize, RewriteError> {
    let Some(Value::Array(entries)) = page.host_global_mut(HOST_DATA_GLOBAL) else {
        return Ok(0);
    };

    let mut count = 0;
    for (index, entry) in entries.iter_mut().enumerate() {
        count += usize::from(isolate("host entry", || reconcile_entry(entry, index, rewriter)));
    }
    if count > 0 {
        rewriter.record(|s| s.host_entries += count);
    }
    Ok(count)
}

fn reconcile_entry(entry: &mut Value, index: usize, rewriter: &Rewriter) -> Result<bool, RewriteError> {
    let Value::Object(fields) = entry else {
        return Err(RewriteError::MalformedHostData(format!("entry {index} is not an object")));
    };
    if fields.contains_key(HOST_ORIGINAL_FIELD) {
        return Ok(false);
    }
    let Some(cover) = fields.get(HOST_COVER_FIELD).and_then(Value::as_str) else {
        return Ok(false);
    };
    let Resolution::Proxied { proxied, .. } = rewriter.resolve(cover) else {
        return Ok(false);
    };
    proxy_debug!("rewrote host cover {index}: {}", abbreviate(cover));
    let original = cover.to_string();
    fields.insert(HOST_ORIGINAL_FIELD.to_string(), Value::String(original));
    fields.insert(HOST_COVER_FIELD.to_string(), Value::String(proxied));
    Ok(true)
}
