//! # Rapport CLI
//!
//! An operator tool over the `rapportapp` library. The binary is thin: the
//! CLI lives in `src/cli/`, this file only starts the runtime, calls
//! `cli::run()` and turns errors into an exit code.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (src/cli/)                                       │
//! │  - clap argument parsing (setup.rs)                         │
//! │  - config loading, logging, dispatch (mod.rs, handlers.rs)  │
//! │  - JSON rendering (render.rs)                               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  rapportapp::RapportApi                                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All output on stdout is JSON, so the tool composes with `jq`. Logs go to
//! stderr, filtered by `RUST_LOG` (default `warn`, `-v` for `debug`).

mod cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
