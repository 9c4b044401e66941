use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::patcher::OnExisting;

/// Disable unused Amplify Data model operations.
///
/// `scan` records which `client.models.<Model>.<operation>()` calls a TypeScript
/// project makes; `apply` rewrites the schema so every operation category nobody
/// calls is turned off with `.disableOperations([...])`.
#[derive(Parser, Debug)]
#[command(
    name = "amplify-disable-unused-ops",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    /// Debug output.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Errors only.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a project and write the model usage map as JSON.
    Scan(ScanArgs),

    /// Add `disableOperations` calls to a schema resource file.
    Apply(ApplyArgs),
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Path to the project's tsconfig.json.
    #[arg(long)]
    pub project: PathBuf,

    /// Where to write the usage map.
    #[arg(long)]
    pub out: PathBuf,

    /// Restrict analysis to files matching this glob (repeatable).
    #[arg(long)]
    pub include: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Source file containing the `a.schema({...})` call.
    #[arg(long)]
    pub resource: PathBuf,

    /// Usage map written by `scan`.
    #[arg(long)]
    pub usage: PathBuf,

    /// Report what would change without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Do not write a `.bak` copy of the resource file.
    #[arg(long)]
    pub no_backup: bool,

    /// What to do with models that already call `disableOperations`.
    #[arg(long, value_enum, default_value_t = OnExisting::Skip)]
    pub on_existing: OnExisting,
}
