use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static URL_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*['"]?([^'")]*?)['"]?\s*\)"#).expect("url() token pattern is valid")
});

/// One `url(...)` token inside a CSS value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlToken<'a> {
    /// Byte range of the whole `url(...)` token.
    pub range: Range<usize>,
    pub url: &'a str,
}

pub fn url_tokens(value: &str) -> Vec<UrlToken<'_>> {
    URL_TOKEN
        .captures_iter(value)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let url = caps.get(1)?;
            Some(UrlToken {
                range: whole.range(),
                url: url.as_str(),
            })
        })
        .collect()
}

pub fn first_url(value: &str) -> Option<&str> {
    URL_TOKEN
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|url| !url.is_empty())
}

/// Whether a `background-image` value is worth inspecting at all.
pub fn is_candidate_background(value: &str, marker: &str) -> bool {
    let value = value.trim();
    !value.is_empty()
        && !value.eq_ignore_ascii_case("none")
        && !value.contains(marker)
        && !value.starts_with("data:")
        && !value.starts_with("blob:")
}

/// Replaces each `url(...)` token whose URL `rewrite` accepts with
/// `url("<rewritten>")`. Returns `None` when nothing changed.
pub fn rewrite_url_tokens(
    value: &str,
    mut rewrite: impl FnMut(&str) -> Option<String>,
) -> Option<String> {
    let mut out = String::with_capacity(value.len());
    let mut last = 0;
    let mut changed = false;

    for token in url_tokens(value) {
        if let Some(replacement) = rewrite(token.url) {
            out.push_str(&value[last..token.range.start]);
            out.push_str("url(\"");
            out.push_str(&replacement);
            out.push_str("\")");
            last = token.range.end;
            changed = true;
        }
    }

    if !changed {
        return None;
    }
    out.push_str(&value[last..]);
    Some(out)
}
