//! # CLI Layer
//!
//! **One possible client** of `rapportapp`. This is the only place that
//! knows about stdout, stderr and exit codes.
//!
//! 1. **Argument Parsing**: clap derive in `setup.rs`
//! 2. **Context Setup**: load `RapportConfig`, open the configured storage
//! 3. **Logging**: `tracing-subscriber` on stderr, `RUST_LOG` wins over `-v`
//! 4. **Dispatch**: `handlers.rs` maps each command onto one API call
//! 5. **Output**: pretty JSON on stdout
//!
//! Commands that act as a user (`report create`, `massnahme add`,
//! `users list`, `users login`) authenticate `--user` / `--password` against
//! the `users` collection first.

mod handlers;
mod render;
mod setup;

use anyhow::{Context, Result};
use clap::Parser;
use handlers::{dispatch, AppState};
use rapportapp::{RapportApi, RapportConfig};
use setup::Cli;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = RapportConfig::load(Some(&cli.config))
        .with_context(|| format!("loading {}", cli.config.display()))?;
    tracing::debug!(?config.backend, "configuration loaded");
    let api = RapportApi::open(&config)?;

    let state = AppState {
        api,
        config,
        user: cli.user,
        password: cli.password,
    };
    let output = dispatch(&state, cli.command).await?;
    render::print_json(&output)
}
