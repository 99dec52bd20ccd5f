//! `srcset` candidate lists: `url [descriptor], url [descriptor], ...`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrcsetCandidate<'a> {
    pub url: &'a str,
    /// Width/density descriptor, empty when absent.
    pub descriptor: &'a str,
}

/// Splits a srcset into candidates.
///
/// URLs are whitespace-delimited tokens, so commas inside a URL (as in `data:`
/// URLs) do not split it; commas inside parenthesized descriptors are kept.
pub fn parse_srcset(srcset: &str) -> Vec<SrcsetCandidate<'_>> {
    let bytes = srcset.as_bytes();
    let mut candidates = Vec::new();
    let mut pos = 0;

    loop {
        while pos < bytes.len() && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b',') {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }

        let start = pos;
        while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        let token = &srcset[start..pos];
        if token.ends_with(',') {
            candidates.push(SrcsetCandidate {
                url: token.trim_end_matches(','),
                descriptor: "",
            });
            continue;
        }

        let descriptor_start = pos;
        let mut in_parens = false;
        while pos < bytes.len() {
            match bytes[pos] {
                b'(' => in_parens = true,
                b')' => in_parens = false,
                b',' if !in_parens => break,
                _ => {}
            }
            pos += 1;
        }
        candidates.push(SrcsetCandidate {
            url: token,
            descriptor: srcset[descriptor_start..pos].trim(),
        });
    }

    candidates
}

/// Rewrites every candidate URL through `rewrite`, keeping descriptors and
/// order. Candidates for which `rewrite` returns `None` are kept verbatim.
pub fn rewrite_srcset(srcset: &str, mut rewrite: impl FnMut(&str) -> Option<String>) -> String {
    parse_srcset(srcset)
        .into_iter()
        .map(|candidate| {
            let url = rewrite(candidate.url).unwrap_or_else(|| candidate.url.to_string());
            if candidate.descriptor.is_empty() {
                url
            } else {
                format!("{url} {}", candidate.descriptor)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::{parse_srcset, rewrite_srcset, SrcsetCandidate};

    #[test]
    fn data_urls_are_not_split_on_commas() {
        let parsed = parse_srcset("data:image/png;base64,AAAA 1x, b.png 2x");
        assert_eq!(
            parsed,
            vec![
                SrcsetCandidate { url: "data:image/png;base64,AAAA", descriptor: "1x" },
                SrcsetCandidate { url: "b.png", descriptor: "2x" },
            ]
        );
    }

    #[test]
    fn trailing_comma_ends_a_bare_candidate() {
        let parsed = parse_srcset("a.png, b.png 480w");
        assert_eq!(parsed[0], SrcsetCandidate { url: "a.png", descriptor: "" });
        assert_eq!(parsed[1], SrcsetCandidate { url: "b.png", descriptor: "480w" });
    }

    #[test]
    fn declined_candidates_pass_through() {
        let out = rewrite_srcset("keep.png 1x, swap.png 2x", |url| {
            (url == "swap.png").then(|| "P".to_string())
        });
        assert_eq!(out, "keep.png 1x, P 2x");
    }
}
