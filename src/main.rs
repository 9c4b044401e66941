mod cli;
mod config;
mod error;
mod logger;
mod parser;
mod patcher;
mod project;
mod resolver;
mod scanner;
mod usage;
mod walker;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands};
use patcher::{ApplyOptions, apply_disable_operations};
use scanner::{ScanOptions, scan_usage};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init_logger(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Scan(args) => {
            let usage = scan_usage(&ScanOptions {
                tsconfig: args.project,
                include: args.include,
            })?;
            usage
                .save(&args.out)
                .with_context(|| format!("writing {}", args.out.display()))?;
            println!("written: {}", args.out.display());
        }
        Commands::Apply(args) => {
            let options = ApplyOptions {
                resource: args.resource,
                usage: args.usage,
                dry_run: args.dry_run,
                backup: !args.no_backup,
                on_existing: args.on_existing,
            };
            let report = apply_disable_operations(&options)
                .with_context(|| format!("patching {}", options.resource.display()))?;
            for line in report.summary() {
                tracing::debug!("{line}");
            }
            if let Some(backup) = &report.backup {
                tracing::info!("backup: {}", backup.display());
            }
            if !report.saved {
                tracing::debug!("patched text:\n{}", report.patched);
            }
            tracing::info!(
                "{} of {} schema entries changed",
                report.changed(),
                report.models.len()
            );
        }
    }

    Ok(())
}
