#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `ecd`: drive an electrochromic segment display from the command line.

mod cli;
mod error_fmt;
mod run;

use clap::Parser;
use cli::{Cli, JSON_MODE, json_mode};
use ecd_core::CancelToken;
use error_fmt::{exit_code_for_error, format_error_json, humanize};
use eyre::{Result, WrapErr};
use std::ffi::OsStr;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if !cli.json {
        let _ = color_eyre::install();
    }

    // Load before tracing so the file sink can come from [logging].
    let cfg = load_config(&cli.config);
    let file_guard = init_tracing(
        cli.json,
        &cli.log_level,
        cfg.as_ref().ok().map(|c| &c.logging),
    );

    let result = cfg.and_then(|cfg| run_cli(&cli, &cfg));
    if let Err(e) = result {
        tracing::error!(error = %format!("{e:#}"), "command failed");
        // Flush the file sink; process::exit skips destructors.
        drop(file_guard);
        if json_mode() {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn load_config(path: &Path) -> Result<ecd_config::Config> {
    let cfg = ecd_config::load_file(path)?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn run_cli(cli: &Cli, cfg: &ecd_config::Config) -> Result<()> {
    let token = CancelToken::new();
    let handler_token = token.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.request_stop()) {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler; stop requests disabled");
    }
    tracing::debug!(command = ?cli.cmd, config = %cli.config.display(), "starting");
    run::run_command(&cli.cmd, cfg, token)
}

/// Console layer on stderr plus an optional JSON file sink from `[logging]`.
/// The returned guard must outlive all logging.
fn init_tracing(
    json: bool,
    level: &str,
    logging: Option<&ecd_config::Logging>,
) -> Option<WorkerGuard> {
    use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };

    let mut guard = None;
    let file = logging.and_then(|l| {
        let path = Path::new(l.file.as_deref()?);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path.file_name().unwrap_or_else(|| OsStr::new("ecd.log"));
        let rotation = l.rotation.as_deref().map(str::to_ascii_lowercase);
        let appender = match rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, worker) = tracing_appender::non_blocking(appender);
        guard = Some(worker);
        let filter = EnvFilter::new(l.level.as_deref().unwrap_or("info"));
        Some(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter),
        )
    });

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init();
    guard
}
