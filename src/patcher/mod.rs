pub mod categories;
pub mod locator;
pub mod rewrite;

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::ValueEnum;

use crate::error::PatchError;
use crate::parser::{ParsedFile, parse_path};
use crate::usage::UsageMap;

use categories::disabled_categories;
use locator::locate_models;
use rewrite::{ModelAction, apply_edits, rewrite_model};

/// What to do with a model that already has a `disableOperations` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OnExisting {
    /// Leave the model untouched and warn.
    #[default]
    Skip,
    /// Replace the existing call with the computed list.
    Overwrite,
    /// Union the existing list with the computed one.
    Merge,
}

/// Input of the apply operation.
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Source file containing the `a.schema({...})` call.
    pub resource: PathBuf,
    /// Usage map produced by a scan.
    pub usage: PathBuf,
    /// Compute everything, write nothing (not even the backup).
    pub dry_run: bool,
    /// Copy the original file to `<resource>.bak` before writing.
    pub backup: bool,
    pub on_existing: OnExisting,
}

/// Outcome of patching one resource file.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    /// Per schema property, in declaration order.
    pub models: Vec<(String, ModelAction)>,
    /// Full text of the patched file.
    pub patched: String,
    /// Whether the file was written.
    pub saved: bool,
    /// Backup written before saving, if any.
    pub backup: Option<PathBuf>,
}

impl ApplyReport {
    /// `Model: action` for every schema property, in declaration order.
    pub fn summary(&self) -> impl Iterator<Item = String> + '_ {
        self.models
            .iter()
            .map(|(name, action)| format!("{name}: {action}"))
    }

    /// Number of models whose definition text changed.
    pub fn changed(&self) -> usize {
        self.models
            .iter()
            .filter(|(_, action)| {
                matches!(
                    action,
                    ModelAction::Added(_) | ModelAction::Overwritten(_) | ModelAction::Merged(_)
                )
            })
            .count()
    }
}

/// Compute the patched text of `file` without touching the disk.
///
/// # Errors
/// Returns [`PatchError::SchemaNotFound`] or [`PatchError::SchemaArgNotObject`] when the
/// file has no usable `schema({...})` call.
pub fn patch_source(
    file: &ParsedFile,
    usage: &UsageMap,
    policy: OnExisting,
) -> Result<(Vec<(String, ModelAction)>, String), PatchError> {
    let properties = locate_models(file)?;
    let source = file.bytes();

    let mut actions = Vec::with_capacity(properties.len());
    let mut edits = Vec::new();
    for property in &properties {
        let Some(definition) = property.definition else {
            actions.push((property.name.clone(), ModelAction::NotAModel));
            continue;
        };
        let disable: Vec<String> = disabled_categories(usage.operations(&property.name))
            .into_iter()
            .map(|category| category.as_str().to_owned())
            .collect();
        let (action, edit) = rewrite_model(&property.name, definition, source, &disable, policy);
        actions.push((property.name.clone(), action));
        edits.extend(edit);
    }

    let declared: BTreeSet<&str> = properties.iter().map(|p| p.name.as_str()).collect();
    for model in usage.models().filter(|m| !declared.contains(m)) {
        tracing::debug!("usage map entry {model} has no model in the schema");
    }

    Ok((actions, apply_edits(&file.source, edits)))
}

/// Add `disableOperations([...])` to every model of a schema resource file.
///
/// Fatal errors (unreadable inputs, malformed usage map, missing schema) are raised
/// before anything is written.
pub fn apply_disable_operations(options: &ApplyOptions) -> Result<ApplyReport, PatchError> {
    let usage = UsageMap::load(&options.usage)?;
    let file = parse_path(&options.resource)?;
    let (models, patched) = patch_source(&file, &usage, options.on_existing)?;

    if options.dry_run {
        tracing::info!("dry-run: no save");
        return Ok(ApplyReport {
            models,
            patched,
            saved: false,
            backup: None,
        });
    }

    let backup = if options.backup {
        let path = backup_path(&options.resource);
        std::fs::write(&path, &file.source).map_err(|e| PatchError::io(&path, e))?;
        Some(path)
    } else {
        None
    };

    write_atomic(&options.resource, &patched)?;
    tracing::info!("saved {}", options.resource.display());

    Ok(ApplyReport {
        models,
        patched,
        saved: true,
        backup,
    })
}

/// `<resource>.bak`, keeping the original extension: `resource.ts` → `resource.ts.bak`.
pub fn backup_path(resource: &Path) -> PathBuf {
    let mut name = OsString::from(resource.as_os_str());
    name.push(".bak");
    PathBuf::from(name)
}

/// Replace `path` with `contents` through a temp file in the same directory.
fn write_atomic(path: &Path, contents: &str) -> Result<(), PatchError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let permissions = std::fs::metadata(path)
        .map_err(|e| PatchError::io(path, e))?
        .permissions();

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| PatchError::io(dir, e))?;
    tmp.write_all(contents.as_bytes())
        .and_then(|()| tmp.as_file().flush())
        .and_then(|()| tmp.as_file().set_permissions(permissions))
        .map_err(|e| PatchError::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| PatchError::io(path, e.error))?;
    Ok(())
}
