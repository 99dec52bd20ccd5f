//! Block-level CSS parsing into the engine's rule model.
//!
//! Only structure and background images are kept; everything else in a rule
//! body is ignored. `@import` rules come back unresolved and the page fills
//! in the imported rules.

use imgproxy_core::url_tokens;

use crate::page::{CssRule, Keyframe, PageError};

use super::dom::{background_image, parse_declarations};

pub(crate) fn parse_stylesheet(text: &str) -> Vec<CssRule> {
    parse_rules(&strip_comments(text))
}

/// The `href` of an unresolved import.
pub(crate) fn unresolved_import(href: String) -> CssRule {
    CssRule::Import {
        href,
        rules: Err(PageError::Unsupported("import not resolved".into())),
    }
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

fn parse_rules(text: &str) -> Vec<CssRule> {
    let mut rules = Vec::new();
    let mut rest = text.trim_start();
    while !rest.is_empty() {
        let Some((index, delimiter)) = prelude_end(rest) else {
            break;
        };
        let prelude = rest[..index].trim();
        if delimiter == ';' {
            if let Some(rule) = statement_rule(prelude) {
                rules.push(rule);
            }
            rest = rest[index + 1..].trim_start();
            continue;
        }
        let Some(close) = matching_brace(rest, index) else {
            break;
        };
        rules.push(block_rule(prelude, &rest[index + 1..close]));
        rest = rest[close + 1..].trim_start();
    }
    rules
}

fn statement_rule(prelude: &str) -> Option<CssRule> {
    let target = strip_keyword(prelude, "@import")?.trim();
    let href = match url_tokens(target).first() {
        Some(token) => token.url.to_string(),
        None => {
            let quote = target.chars().next().filter(|c| *c == '"' || *c == '\'')?;
            let inner = &target[1..];
            inner[..inner.find(quote)?].to_string()
        }
    };
    Some(unresolved_import(href))
}

fn block_rule(prelude: &str, body: &str) -> CssRule {
    if let Some(condition) = strip_keyword(prelude, "@media") {
        return CssRule::Media {
            condition: condition.trim().to_string(),
            rules: parse_rules(body),
        };
    }
    let keyframes = strip_keyword(prelude, "@keyframes")
        .or_else(|| strip_keyword(prelude, "@-webkit-keyframes"));
    if let Some(name) = keyframes {
        return CssRule::Keyframes {
            name: name.trim().to_string(),
            frames: parse_keyframes(body),
        };
    }
    if prelude.starts_with('@') {
        return CssRule::Other;
    }
    CssRule::Style {
        selector: prelude.to_string(),
        background_image: background_image(&parse_declarations(body)),
    }
}

fn parse_keyframes(body: &str) -> Vec<Keyframe> {
    let mut frames = Vec::new();
    let mut rest = body.trim_start();
    while let Some((index, '{')) = prelude_end(rest) {
        let Some(close) = matching_brace(rest, index) else {
            break;
        };
        frames.push(Keyframe {
            key_text: rest[..index].trim().to_string(),
            background_image: background_image(&parse_declarations(&rest[index + 1..close])),
        });
        rest = rest[close + 1..].trim_start();
    }
    frames
}

fn strip_keyword<'a>(prelude: &'a str, keyword: &str) -> Option<&'a str> {
    let head = prelude.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &prelude[keyword.len()..];
    (rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == '('))
        .then_some(rest)
}

/// First top-level `{` or `;`.
fn prelude_end(text: &str) -> Option<(usize, char)> {
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    for (index, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, '{' | ';') if depth == 0 => return Some((index, ch)),
            _ => {}
        }
    }
    None
}

fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    for (index, ch) in text[open..].char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '{') => depth += 1,
            (None, '}') => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + index);
                }
            }
            _ => {}
        }
    }
    None
}
