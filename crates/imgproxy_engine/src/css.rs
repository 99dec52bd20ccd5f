//! Stylesheet and inline-style background rewriting.
//!
//! Stylesheet rules are never edited in place. Each rewritten background
//! becomes an `!important` rule appended to one override sheet owned by the
//! engine, so the original rule keeps applying wherever the override does not.

use std::collections::HashSet;

use imgproxy_core::vocab::{INLINE_BACKGROUND_SELECTOR, OVERRIDE_SHEET_ID};
use imgproxy_core::{is_candidate_background, rewrite_url_tokens, Resolution};
use imgproxy_logging::{proxy_debug, proxy_info};

use crate::guard::{isolate, RewriteError};
use crate::page::{CssRule, Keyframe, Page, PageError, QueryScope, SheetId};
use crate::rewriter::Rewriter;

#[derive(Debug, Default)]
pub struct CssEngine {
    sheet: Option<SheetId>,
    emitted: HashSet<String>,
}

impl CssEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn override_sheet(&self) -> Option<SheetId> {
        self.sheet
    }

    /// Rules appended to the override sheet so far.
    pub fn emitted_rules(&self) -> usize {
        self.emitted.len()
    }

    /// Visits every readable same-origin sheet and appends corrective rules.
    /// Returns the number of rules added by this pass.
    ///
    /// Relative `url()` tokens resolve against the page location, not the
    /// URL of the sheet that declares them, so a relative reference inside an
    /// external sheet points below the page's directory.
    pub fn sweep_stylesheets(
        &mut self,
        page: &mut dyn Page,
        rewriter: &Rewriter,
    ) -> Result<usize, RewriteError> {
        let target = self.ensure_sheet(page)?;

        let mut pending = Vec::new();
        for sheet in page.style_sheets() {
            if sheet == target {
                continue;
            }
            if let Some(href) = page.sheet_href(sheet) {
                if !rewriter.location().is_same_origin(&href) {
                    continue;
                }
            }
            let rules = isolate("stylesheet", || Ok(page.sheet_rules(sheet)?));
            for rule in &rules {
                collect_rule(rule, rewriter, &mut pending);
            }
        }

        let mut added = 0;
        for text in pending {
            if self.emitted.contains(&text) {
                continue;
            }
            let inserted = isolate("insert rule", || {
                page.insert_rule(target, &text)?;
                Ok(true)
            });
            if inserted {
                self.emitted.insert(text);
                added += 1;
            }
        }
        if added > 0 {
            rewriter.record(|s| s.stylesheet_rules += added);
            proxy_info!("appended {added} background override rules");
        }
        Ok(added)
    }

    fn ensure_sheet(&mut self, page: &mut dyn Page) -> Result<SheetId, PageError> {
        if let Some(sheet) = self.sheet {
            return Ok(sheet);
        }
        let sheet = page.create_style_sheet(OVERRIDE_SHEET_ID)?;
        self.sheet = Some(sheet);
        Ok(sheet)
    }
}

/// Rewrites inline `background-image` styles across the document.
pub fn sweep_inline_backgrounds(
    page: &mut dyn Page,
    rewriter: &Rewriter,
) -> Result<usize, RewriteError> {
    sweep_inline_backgrounds_in(page, rewriter, QueryScope::Document)
}

pub(crate) fn sweep_inline_backgrounds_in(
    page: &mut dyn Page,
    rewriter: &Rewriter,
    scope: QueryScope,
) -> Result<usize, RewriteError> {
    let mut count = 0;
    for node in page.query_all(scope, INLINE_BACKGROUND_SELECTOR)? {
        if rewriter.should_skip(page, node) {
            continue;
        }
        count += usize::from(isolate("inline background", || {
            let element = page.element_mut(node).ok_or(PageError::NotAnElement(node))?;
            rewriter.rewrite_inline_background(element)
        }));
    }
    Ok(count)
}

fn collect_rule(rule: &CssRule, rewriter: &Rewriter, out: &mut Vec<String>) {
    match rule {
        CssRule::Style {
            selector,
            background_image: Some(value),
        } => {
            if let Some(rewritten) = rewrite_background(value, rewriter) {
                out.push(important_rule(selector, &rewritten));
            }
        }
        CssRule::Style { .. } | CssRule::Other => {}
        CssRule::Media { condition, rules } => {
            let mut nested = Vec::new();
            for rule in rules {
                collect_rule(rule, rewriter, &mut nested);
            }
            out.extend(nested.into_iter().map(|text| format!("@media {condition} {{ {text} }}")));
        }
        CssRule::Import { href, rules } => match rules {
            Ok(rules) => {
                for rule in rules {
                    collect_rule(rule, rewriter, out);
                }
            }
            Err(err) if err.is_expected() => {}
            Err(err) => proxy_debug!("imported sheet {href} unreadable: {err}"),
        },
        CssRule::Keyframes { name, frames } => {
            if let Some(text) = keyframes_override(name, frames, rewriter) {
                out.push(text);
            }
        }
    }
}

fn rewrite_background(value: &str, rewriter: &Rewriter) -> Option<String> {
    if !is_candidate_background(value, rewriter.resolver().marker()) {
        return None;
    }
    rewrite_url_tokens(value, |url| match rewriter.resolve(url) {
        Resolution::Proxied { proxied, .. } => Some(proxied),
        Resolution::Rejected(_) => None,
    })
}

fn important_rule(selector: &str, background: &str) -> String {
    format!("{selector} {{ background-image: {background} !important; }}")
}

fn keyframes_override(name: &str, frames: &[Keyframe], rewriter: &Rewriter) -> Option<String> {
    let steps: Vec<String> = frames
        .iter()
        .filter_map(|frame| {
            let value = frame.background_image.as_deref()?;
            let rewritten = rewrite_background(value, rewriter)?;
            Some(important_rule(&frame.key_text, &rewritten))
        })
        .collect();
    if steps.is_empty() {
        return None;
    }
    Some(format!("@keyframes {name} {{ {} }}", steps.join(" ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgproxy_core::{PageLocation, ProxyConfig};

    fn rewriter() -> Rewriter {
        let location = PageLocation::parse("https://site.example/app/index.html").unwrap();
        Rewriter::new(ProxyConfig::default(), location)
    }

    #[test]
    fn keyframes_keep_step_selectors() {
        let frames = vec![
            Keyframe {
                key_text: "0%".into(),
                background_image: Some("url(a.png)".into()),
            },
            Keyframe {
                key_text: "100%".into(),
                background_image: None,
            },
        ];
        let text = keyframes_override("spin", &frames, &rewriter()).unwrap();
        assert_eq!(
            text,
            "@keyframes spin { 0% { background-image: url(\"https://images.weserv.nl/?url=https%3A%2F%2Fsite.example%2Fapp%2Fa.png\") !important; } }"
        );
    }

    #[test]
    fn media_rules_keep_their_condition() {
        let rule = CssRule::Media {
            condition: "(max-width: 600px)".into(),
            rules: vec![CssRule::Style {
                selector: ".hero".into(),
                background_image: Some("url('/bg.jpg')".into()),
            }],
        };
        let mut out = Vec::new();
        collect_rule(&rule, &rewriter(), &mut out);
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("@media (max-width: 600px) { .hero { background-image: url(\""));
    }

    #[test]
    fn proxied_and_inline_backgrounds_are_left_alone() {
        let rw = rewriter();
        assert_eq!(rewrite_background("url(https://images.weserv.nl/?url=x)", &rw), None);
        assert_eq!(rewrite_background("url(data:image/png;base64,AAAA)", &rw), None);
        assert_eq!(rewrite_background("none", &rw), None);
    }
}
