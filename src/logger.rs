//! Logging setup for the CLI.
//!
//! Every diagnostic goes through `tracing` macros; this module installs the
//! subscriber that prints them to stdout.

use std::io::IsTerminal;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const CRATE_TARGET: &str = "amplify_disable_unused_ops";

/// Install the global subscriber. Call once, before anything logs.
///
/// Level selection, first match wins:
/// 1. `--verbose` → debug
/// 2. `--quiet` → errors only
/// 3. `RUST_LOG`
/// 4. info
///
/// Colors are enabled when stdout is a terminal and `NO_COLOR` is unset.
pub fn init_logger(verbose: bool, quiet: bool) {
    let filter = filter_for(verbose, quiet);

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(use_colors())
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn filter_for(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(format!("{CRATE_TARGET}=debug"))
    } else if quiet {
        EnvFilter::new(format!("{CRATE_TARGET}=error"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("{CRATE_TARGET}=info")))
    }
}

fn use_colors() -> bool {
    std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}
