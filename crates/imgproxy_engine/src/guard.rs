use imgproxy_logging::proxy_debug;
use thiserror::Error;

use crate::page::PageError;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error(transparent)]
    Page(#[from] PageError),
    #[error("host data entry is malformed: {0}")]
    MalformedHostData(String),
}

impl RewriteError {
    pub fn is_expected(&self) -> bool {
        matches!(self, RewriteError::Page(err) if err.is_expected())
    }
}

/// Runs one unit of reconciliation work and absorbs its failure.
///
/// Errors become `T::default()`; unexpected ones are logged behind the debug
/// switch, expected ones (cross-origin denials) are dropped silently.
pub fn isolate<T: Default>(label: &str, work: impl FnOnce() -> Result<T, RewriteError>) -> T {
    match work() {
        Ok(value) => value,
        Err(err) if err.is_expected() => T::default(),
        Err(err) => {
            proxy_debug!("{label} failed: {err}");
            T::default()
        }
    }
}
