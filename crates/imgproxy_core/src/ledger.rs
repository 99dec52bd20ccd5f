use std::collections::HashSet;
use std::fmt;

/// Surface that produced a URL, used to namespace ledger keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Surface {
    Srcset,
    Background,
    Poster,
    /// A lazy-loading attribute such as `data-src`.
    Attribute(String),
}

impl Surface {
    pub fn namespace(&self) -> &str {
        match self {
            Surface::Srcset => "srcset",
            Surface::Background => "bg",
            Surface::Poster => "poster",
            Surface::Attribute(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LedgerKey {
    /// A plain absolute URL, produced by element `src` rewrites.
    Url(String),
    /// `<namespace>:<url>`.
    Namespaced(Surface, String),
}

impl LedgerKey {
    pub fn url(url: impl Into<String>) -> Self {
        LedgerKey::Url(url.into())
    }

    pub fn namespaced(surface: Surface, url: impl Into<String>) -> Self {
        LedgerKey::Namespaced(surface, url.into())
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerKey::Url(url) => f.write_str(url),
            LedgerKey::Namespaced(surface, url) => write!(f, "{}:{url}", surface.namespace()),
        }
    }
}

/// Process-lifetime record of applied rewrites. Grows monotonically.
///
/// Callers check with [`DedupLedger::should_process`] before mutating anything
/// and call [`DedupLedger::mark_processed`] only once the rewrite is committed.
#[derive(Debug, Clone, Default)]
pub struct DedupLedger {
    keys: HashSet<String>,
    enforce: bool,
}

impl DedupLedger {
    pub fn new(enforce: bool) -> Self {
        Self {
            keys: HashSet::new(),
            enforce,
        }
    }

    /// With enforcement off every key is reported as processable,
    /// but applied rewrites are still recorded.
    pub fn should_process(&self, key: &LedgerKey) -> bool {
        !self.enforce || !self.keys.contains(&key.to_string())
    }

    pub fn mark_processed(&mut self, key: &LedgerKey) {
        self.keys.insert(key.to_string());
    }

    pub fn contains(&self, key: &LedgerKey) -> bool {
        self.keys.contains(&key.to_string())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}
