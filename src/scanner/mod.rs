pub mod clients;
pub mod operations;

use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::config::ProjectConfig;
use crate::parser::{ParsedFile, parse_path};
use crate::project::ProjectScope;
use crate::resolver::{build_resolver, canonical};
use crate::usage::UsageMap;
use crate::walker::walk_project;

use clients::{ExportTable, resolve_client_references};
use operations::extract_operation_calls;

/// Input of a usage scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Path to the project's `tsconfig.json`. Its `files`/`include`/`exclude` select the
    /// project's files; its directory anchors relative globs.
    pub tsconfig: PathBuf,
    /// Globs restricting the analysed files. Empty means the configured defaults.
    pub include: Vec<String>,
}

/// Scan a project and record which model operations are called through a data client.
///
/// Runs three sequential steps:
///
/// 1. **Discovery**: collect the files the tsconfig selects (see [`ProjectScope`]) and
///    parse each matching one once.
/// 2. **Export table**: record every client variable or client-returning function
///    each file exports (see [`ExportTable::build`]).
/// 3. **Extraction**: per file, resolve the local client identifiers and collect
///    `<client>.models.<Model>.<op>(...)` calls.
///
/// Files that cannot be read or parsed are skipped with a warning.
///
/// # Errors
/// Fails if the tsconfig path is not a file or not valid JSONC, or an include glob is
/// invalid.
pub fn scan_usage(options: &ScanOptions) -> Result<UsageMap> {
    if !options.tsconfig.is_file() {
        bail!("project config not found: {}", options.tsconfig.display());
    }
    let tsconfig = canonical(&options.tsconfig);
    let scope = ProjectScope::load(&tsconfig)?;

    let config = ProjectConfig::load(&scope.root);
    let factory = config.client_factory();

    // -----------------------------------------------------------------------
    // Step 1: discover and parse.
    // -----------------------------------------------------------------------
    let paths = walk_project(&scope, &config, &options.include)?;
    let files: Vec<ParsedFile> = paths
        .iter()
        .filter_map(|path| match parse_path(&canonical(path)) {
            Ok(file) => Some(file),
            Err(err) => {
                tracing::warn!("skipping {}: {err}", path.display());
                None
            }
        })
        .collect();
    tracing::debug!("parsed {} of {} file(s)", files.len(), paths.len());

    // -----------------------------------------------------------------------
    // Step 2: global export table.
    // -----------------------------------------------------------------------
    let table = ExportTable::build(&files, factory);
    tracing::debug!("{} exported client binding(s)", table.len());

    // -----------------------------------------------------------------------
    // Step 3: per-file resolution and extraction.
    // -----------------------------------------------------------------------
    let resolver = build_resolver(Some(&tsconfig));
    let mut observed = Vec::new();
    for file in &files {
        let clients = resolve_client_references(file, &table, &resolver, factory);
        if clients.variables.is_empty() {
            continue;
        }
        let calls = extract_operation_calls(file, &clients);
        for call in &calls {
            tracing::debug!(
                "{}:{} {}.{}",
                file.path.display(),
                call.line,
                call.model,
                call.operation
            );
        }
        observed.extend(calls.into_iter().map(|call| (call.model, call.operation)));
    }

    let usage: UsageMap = observed.into_iter().collect();
    if usage.is_empty() {
        tracing::warn!("no client operations found; applying this map disables every model");
    }
    tracing::info!(
        "scanned {} file(s), found {} model(s) in use",
        files.len(),
        usage.len()
    );
    Ok(usage)
}
