use std::io;
use std::path::PathBuf;

use imgproxy_core::ConfigError;
use imgproxy_engine::InstallError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode input with {encoding}")]
    Decode { encoding: String },
    #[error("failed to parse config {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid page URL: {0}")]
    PageUrl(#[from] url::ParseError),
    #[error("engine refused to install: {0}")]
    Install(#[from] InstallError),
    #[error("output path {0:?} has no file name")]
    OutputPath(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
