//! Command-line front end: rewrites a saved HTML page offline by running the
//! proxy engine against the in-memory page on a virtual clock.

mod args;
mod config;
mod error;
mod input;
mod logging;
mod output;
mod run;

pub use args::{CliArgs, LogDestination};
pub use config::load_config;
pub use error::AppError;
pub use input::{decode_page, DecodedPage};
pub use logging::initialize as initialize_logging;
pub use output::write_atomically;
pub use run::{rewrite_page, RunOptions, RunReport};
