//! The set of source files a `tsconfig.json` puts in the project.
//!
//! `files`, `include` and `exclude` follow the TypeScript compiler's rules: patterns are
//! relative to the config that declares them, a pattern without a wildcard or extension
//! names a directory, `extends` chains are followed, and a child's field replaces the
//! inherited one wholesale. Configs are JSONC (comments and trailing commas allowed).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::resolver::canonical;

/// `include` used when a config names neither `files` nor `include`.
const DEFAULT_INCLUDE: &str = "**/*";

/// `exclude` used when no config in the chain names one (`outDir` is added to it).
const DEFAULT_EXCLUDE: &[&str] = &["node_modules", "bower_components", "jspm_packages"];

const MATCH_OPTIONS: glob::MatchOptions = glob::MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTsconfig {
    extends: Option<Extends>,
    files: Option<Vec<String>>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    #[serde(default)]
    compiler_options: RawCompilerOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCompilerOptions {
    out_dir: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Extends {
    One(String),
    Many(Vec<String>),
}

impl Extends {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(path) => vec![path],
            Self::Many(paths) => paths,
        }
    }
}

/// A list-valued field together with the directory its entries are relative to.
#[derive(Debug, Clone)]
struct Field {
    base: PathBuf,
    values: Vec<String>,
}

/// The fields of one config after its `extends` chain has been applied.
#[derive(Debug, Default)]
struct Layer {
    files: Option<Field>,
    include: Option<Field>,
    exclude: Option<Field>,
    out_dir: Option<PathBuf>,
}

impl Layer {
    /// `over`'s fields win; missing ones fall back to `self`.
    fn overlay(self, over: Layer) -> Layer {
        Layer {
            files: over.files.or(self.files),
            include: over.include.or(self.include),
            exclude: over.exclude.or(self.exclude),
            out_dir: over.out_dir.or(self.out_dir),
        }
    }
}

/// A compiled include pattern and the directory a walk must start from to reach it.
#[derive(Debug, Clone)]
struct IncludePattern {
    walk_root: PathBuf,
    pattern: glob::Pattern,
}

/// The files a tsconfig selects.
#[derive(Debug, Clone)]
pub struct ProjectScope {
    /// Directory containing the tsconfig.
    pub root: PathBuf,
    include: Vec<IncludePattern>,
    exclude: Vec<glob::Pattern>,
    files: Vec<PathBuf>,
}

impl ProjectScope {
    /// Every file under `root`, as for a tsconfig with no `files`/`include`/`exclude`.
    pub fn directory(root: &Path) -> Self {
        let root = canonical(root);
        Self {
            include: compile_pattern(&root, DEFAULT_INCLUDE)
                .map(|(walk_root, pattern)| IncludePattern { walk_root, pattern })
                .into_iter()
                .collect(),
            exclude: Vec::new(),
            files: Vec::new(),
            root,
        }
    }

    /// Read `tsconfig` (and whatever it extends) and compile its file selection.
    ///
    /// # Errors
    /// Fails if `tsconfig` itself cannot be read or is not valid JSONC. Problems in an
    /// extended config are logged and that config is ignored.
    pub fn load(tsconfig: &Path) -> Result<Self> {
        let tsconfig = canonical(tsconfig);
        let root = tsconfig
            .parent()
            .map(Path::to_path_buf)
            .context("tsconfig path has no parent directory")?;
        let layer = load_layer(&tsconfig, &mut Vec::new())?;

        let files: Vec<PathBuf> = layer
            .files
            .iter()
            .flat_map(|field| field.values.iter().map(|f| canonical(&field.base.join(f))))
            .collect();

        let include_field = match (layer.include, layer.files.is_some()) {
            (Some(field), _) => field,
            (None, true) => Field {
                base: root.clone(),
                values: Vec::new(),
            },
            (None, false) => Field {
                base: root.clone(),
                values: vec![DEFAULT_INCLUDE.to_owned()],
            },
        };
        let include = include_field
            .values
            .iter()
            .filter_map(|spec| compile_pattern(&include_field.base, spec))
            .map(|(walk_root, pattern)| IncludePattern { walk_root, pattern })
            .collect();

        let mut exclude_field = layer.exclude.unwrap_or_else(|| Field {
            base: root.clone(),
            values: DEFAULT_EXCLUDE.iter().map(|s| s.to_string()).collect(),
        });
        if let Some(out_dir) = layer.out_dir {
            exclude_field
                .values
                .push(out_dir.to_string_lossy().into_owned());
        }
        let exclude = exclude_field
            .values
            .iter()
            .filter_map(|spec| compile_pattern(&exclude_field.base, spec))
            .map(|(_, pattern)| pattern)
            .collect();

        Ok(Self {
            root,
            include,
            exclude,
            files,
        })
    }

    /// Directories to walk, with nested ones folded into their ancestors.
    pub fn walk_roots(&self) -> Vec<PathBuf> {
        let mut candidates: Vec<PathBuf> = self
            .include
            .iter()
            .map(|p| p.walk_root.clone())
            .filter(|dir| dir.is_dir())
            .collect();
        candidates.sort();
        candidates.dedup();

        let mut roots: Vec<PathBuf> = Vec::new();
        for dir in candidates {
            if !roots.iter().any(|root| dir.starts_with(root)) {
                roots.push(dir);
            }
        }
        roots
    }

    /// Files named in `files`. They belong to the project even when excluded.
    pub fn listed_files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Whether an absolute, canonical `path` is selected by the config.
    pub fn contains(&self, path: &Path) -> bool {
        if self.files.iter().any(|f| f == path) {
            return true;
        }
        self.include
            .iter()
            .any(|p| p.pattern.matches_path_with(path, MATCH_OPTIONS))
            && !self
                .exclude
                .iter()
                .any(|pattern| pattern.matches_path_with(path, MATCH_OPTIONS))
    }
}

fn load_layer(path: &Path, stack: &mut Vec<PathBuf>) -> Result<Layer> {
    let path = canonical(path);
    if stack.contains(&path) {
        bail!("circular extends through {}", path.display());
    }
    let base = path
        .parent()
        .map(Path::to_path_buf)
        .context("tsconfig path has no parent directory")?;
    let raw = read_tsconfig(&path)?;

    stack.push(path.clone());
    let mut inherited = Layer::default();
    for spec in raw.extends.map(Extends::into_vec).unwrap_or_default() {
        let Some(parent) = resolve_extends(&base, &spec) else {
            tracing::warn!("{}: cannot find extended config '{spec}'", path.display());
            continue;
        };
        match load_layer(&parent, stack) {
            Ok(layer) => inherited = inherited.overlay(layer),
            Err(err) => tracing::warn!("{}: ignoring '{spec}': {err:#}", path.display()),
        }
    }
    stack.pop();

    let field = |values: Option<Vec<String>>| {
        values.map(|values| Field {
            base: base.clone(),
            values,
        })
    };
    let own = Layer {
        files: field(raw.files),
        include: field(raw.include),
        exclude: field(raw.exclude),
        out_dir: raw.compiler_options.out_dir.map(|dir| base.join(dir)),
    };
    Ok(inherited.overlay(own))
}

fn read_tsconfig(path: &Path) -> Result<RawTsconfig> {
    let mut contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if json_strip_comments::strip(&mut contents).is_err() {
        tracing::debug!("{}: could not strip comments", path.display());
    }
    serde_json::from_str(&contents).with_context(|| format!("invalid tsconfig {}", path.display()))
}

/// Locate the config named by an `extends` entry.
///
/// Relative and absolute paths are taken as-is (`.json` appended when missing);
/// anything else is looked up in `node_modules` directories from `base` upward.
fn resolve_extends(base: &Path, spec: &str) -> Option<PathBuf> {
    let candidates = |path: PathBuf| {
        let mut with_json = path.clone().into_os_string();
        with_json.push(".json");
        [path.clone(), PathBuf::from(with_json), path.join("tsconfig.json")]
    };

    if spec.starts_with('.') || Path::new(spec).is_absolute() {
        return candidates(base.join(spec)).into_iter().find(|p| p.is_file());
    }

    base.ancestors()
        .flat_map(|dir| candidates(dir.join("node_modules").join(spec)))
        .find(|p| p.is_file())
}

/// Compile a tsconfig file pattern relative to `base`.
///
/// Returns the deepest wildcard-free directory of the pattern (where a walk must start)
/// and an absolute glob. `src` and `src/**` both become `<base>/src/**/*`.
fn compile_pattern(base: &Path, spec: &str) -> Option<(PathBuf, glob::Pattern)> {
    let parts: Vec<&str> = spec.split('/').collect();
    let split = parts
        .iter()
        .position(|part| part.contains(['*', '?', '[']))
        .unwrap_or(parts.len());
    let prefix = parts[..split].join("/");
    let rest = parts[split..].join("/");

    let literal = if prefix.is_empty() {
        base.to_path_buf()
    } else {
        canonical(&base.join(&prefix))
    };
    let escaped = glob::Pattern::escape(&literal.to_string_lossy());
    let escaped = escaped.trim_end_matches('/');

    let (walk_root, text) = if rest.is_empty() {
        let last = prefix.rsplit('/').find(|s| !s.is_empty()).unwrap_or("");
        if literal.is_dir() || !last.contains('.') {
            (literal.clone(), format!("{escaped}/**/*"))
        } else {
            let parent = literal.parent().map(Path::to_path_buf).unwrap_or_default();
            (parent, escaped.to_owned())
        }
    } else if rest.ends_with("**") {
        (literal.clone(), format!("{escaped}/{rest}/*"))
    } else {
        (literal.clone(), format!("{escaped}/{rest}"))
    };

    match glob::Pattern::new(&text) {
        Ok(pattern) => Some((walk_root, pattern)),
        Err(err) => {
            tracing::warn!("ignoring tsconfig pattern {spec:?}: {err}");
            None
        }
    }
}
