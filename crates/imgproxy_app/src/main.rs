use std::fs;
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use imgproxy_app::{
    decode_page, initialize_logging, load_config, rewrite_page, write_atomically, AppError,
    CliArgs, RunOptions,
};
use imgproxy_logging::{proxy_error, proxy_info};

fn main() -> ExitCode {
    let args = CliArgs::parse();
    initialize_logging(args.log, args.debug);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            proxy_error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs) -> Result<(), AppError> {
    let mut config = load_config(args.config.as_deref())?;
    config.debug |= args.debug;

    let bytes = fs::read(&args.input).map_err(|source| AppError::Read {
        path: args.input.clone(),
        source,
    })?;
    let decoded = decode_page(&bytes)?;
    proxy_info!("Decoded {:?} as {}", args.input, decoded.encoding_label);

    let options = RunOptions {
        page_url: args.page_url.clone(),
        run_for: Duration::from_millis(args.run_ms),
    };
    let report = rewrite_page(&decoded.html, &options, config)?;

    match &args.output {
        Some(path) => {
            write_atomically(path, &report.html)?;
            proxy_info!("Wrote rewritten page to {:?}", path);
        }
        None => io::stdout().write_all(report.html.as_bytes())?,
    }
    eprint!("{}", report.summary());
    Ok(())
}
