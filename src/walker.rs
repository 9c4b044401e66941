use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::ProjectConfig;
use crate::project::ProjectScope;

/// Globs applied when neither the command line nor the config names any.
pub const DEFAULT_INCLUDE: &[&str] = &["**/*.ts", "**/*.tsx"];

/// Source file extensions the scanner can parse.
const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "mts", "cts", "js", "jsx", "mjs", "cjs"];

/// Collect the project's source files to scan.
///
/// Walks every directory `scope` can select from, respecting `.gitignore` rules, and
/// adds the files it lists explicitly. A file is kept when `scope` selects it, no
/// component is `node_modules`, `config.exclude` does not match it, and it matches at
/// least one of `include` (falling back to `config.include`, then [`DEFAULT_INCLUDE`]).
/// A glob matches if it matches either the absolute path or the path relative to
/// `scope.root`.
pub fn walk_project(
    scope: &ProjectScope,
    config: &ProjectConfig,
    include: &[String],
) -> anyhow::Result<Vec<PathBuf>> {
    let patterns = include_patterns(include, config)?;
    let root = scope.root.as_path();

    let mut candidates: Vec<PathBuf> = scope
        .listed_files()
        .iter()
        .filter(|path| path.is_file())
        .cloned()
        .collect();

    for walk_root in scope.walk_roots() {
        let walker = ignore::WalkBuilder::new(&walk_root)
            .standard_filters(true)
            // Read .gitignore files even when the directory is not inside a git repository.
            .require_git(false)
            .build();

        for result in walker {
            let entry = match result {
                Ok(e) => e,
                Err(err) => {
                    tracing::warn!("{err}");
                    continue;
                }
            };
            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                continue;
            }
            candidates.push(entry.into_path());
        }
    }

    let mut files = BTreeSet::new();
    for path in candidates {
        // Check that no component of the path is `node_modules`.
        if path_contains_node_modules(&path) {
            continue;
        }

        if is_excluded_by_config(&path, config) {
            continue;
        }

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !SOURCE_EXTENSIONS.contains(&ext) {
            continue;
        }

        if !scope.contains(&path) || !is_included(&path, root, &patterns) {
            continue;
        }

        if files.insert(path.clone()) {
            tracing::debug!("discovered {}", path.display());
        }
    }

    Ok(files.into_iter().collect())
}

fn include_patterns(include: &[String], config: &ProjectConfig) -> anyhow::Result<Vec<glob::Pattern>> {
    let raw: Vec<&str> = if !include.is_empty() {
        include.iter().map(String::as_str).collect()
    } else if let Some(globs) = config.include.as_ref().filter(|g| !g.is_empty()) {
        globs.iter().map(String::as_str).collect()
    } else {
        DEFAULT_INCLUDE.to_vec()
    };

    raw.into_iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| anyhow::anyhow!("invalid include glob {p:?}: {e}"))
        })
        .collect()
}

fn is_included(path: &Path, root: &Path, patterns: &[glob::Pattern]) -> bool {
    let relative = path.strip_prefix(root).ok();
    patterns.iter().any(|pattern| {
        pattern.matches_path(path) || relative.is_some_and(|rel| pattern.matches_path(rel))
    })
}

/// Returns true if any component of `path` is named `node_modules`.
fn path_contains_node_modules(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .map(|s| s == "node_modules")
            .unwrap_or(false)
    })
}

/// Returns true if `path` matches any exclusion pattern from config.
fn is_excluded_by_config(path: &Path, config: &ProjectConfig) -> bool {
    let Some(patterns) = &config.exclude else {
        return false;
    };

    let path_str = path.to_string_lossy();

    for pattern in patterns {
        let Ok(matcher) = glob::Pattern::new(pattern) else {
            continue;
        };
        if matcher.matches(&path_str) {
            return true;
        }
        // Also check if any component matches the pattern directly.
        if path
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .any(|s| matcher.matches(s))
        {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tmp() -> TempDir {
        tempfile::tempdir().expect("tempdir")
    }

    fn walk(
        dir: &TempDir,
        config: &ProjectConfig,
        include: &[String],
    ) -> anyhow::Result<Vec<PathBuf>> {
        walk_project(&ProjectScope::directory(dir.path()), config, include)
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.file_name().unwrap().to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_default_globs_pick_ts_and_tsx() {
        let dir = tmp();
        fs::write(dir.path().join("app.ts"), "").unwrap();
        fs::write(dir.path().join("component.tsx"), "").unwrap();
        fs::write(dir.path().join("legacy.js"), "").unwrap();
        fs::write(dir.path().join("README.md"), "# Hello").unwrap();

        let files = walk(&dir, &ProjectConfig::default(), &[]).unwrap();
        let names = names(&files);
        assert!(names.contains(&"app.ts".to_string()));
        assert!(names.contains(&"component.tsx".to_string()));
        assert!(!names.contains(&"legacy.js".to_string()));
        assert!(!names.contains(&"README.md".to_string()));
    }

    #[test]
    fn test_include_globs_restrict_files() {
        let dir = tmp();
        fs::write(dir.path().join("app.ts"), "").unwrap();
        fs::write(dir.path().join("component.tsx"), "").unwrap();

        let include = vec!["**/*.tsx".to_string()];
        let files = walk(&dir, &ProjectConfig::default(), &include).unwrap();
        assert_eq!(names(&files), vec!["component.tsx".to_string()]);
    }

    #[test]
    fn test_absolute_include_glob() {
        let dir = tmp();
        fs::write(dir.path().join("app.ts"), "").unwrap();
        fs::write(dir.path().join("other.ts"), "").unwrap();

        let include = vec![dir.path().join("app.ts").to_string_lossy().into_owned()];
        let files = walk(&dir, &ProjectConfig::default(), &include).unwrap();
        assert_eq!(names(&files), vec!["app.ts".to_string()]);
    }

    #[test]
    fn test_excludes_node_modules_and_config_patterns() {
        let dir = tmp();
        let nm = dir.path().join("node_modules").join("pkg");
        fs::create_dir_all(&nm).unwrap();
        fs::write(nm.join("index.ts"), "").unwrap();
        fs::create_dir_all(dir.path().join("legacy")).unwrap();
        fs::write(dir.path().join("legacy").join("old.ts"), "").unwrap();
        fs::write(dir.path().join("app.ts"), "").unwrap();

        let config = ProjectConfig {
            exclude: Some(vec!["legacy".to_string()]),
            ..Default::default()
        };
        let files = walk(&dir, &config, &[]).unwrap();
        assert_eq!(names(&files), vec!["app.ts".to_string()]);
    }

    #[test]
    fn test_invalid_glob_is_an_error() {
        let dir = tmp();
        let include = vec!["[".to_string()];
        assert!(walk(&dir, &ProjectConfig::default(), &include).is_err());
    }

    #[test]
    fn test_tsconfig_scope_limits_walk() {
        let dir = tmp();
        let app = dir.path().join("app");
        fs::create_dir_all(app.join("src").join("legacy")).unwrap();
        fs::create_dir_all(app.join("scripts")).unwrap();
        fs::create_dir_all(dir.path().join("shared")).unwrap();
        fs::write(app.join("src").join("main.ts"), "").unwrap();
        fs::write(app.join("src").join("legacy").join("old.ts"), "").unwrap();
        fs::write(app.join("scripts").join("seed.ts"), "").unwrap();
        fs::write(app.join("setup.ts"), "").unwrap();
        fs::write(dir.path().join("shared").join("client.ts"), "").unwrap();
        fs::write(
            app.join("tsconfig.json"),
            r#"{ "files": ["setup.ts"], "include": ["src", "../shared"], "exclude": ["src/legacy"] }"#,
        )
        .unwrap();

        let scope = ProjectScope::load(&app.join("tsconfig.json")).unwrap();
        let files = walk_project(&scope, &ProjectConfig::default(), &[]).unwrap();
        let mut found = names(&files);
        found.sort();
        assert_eq!(found, vec!["client.ts", "main.ts", "setup.ts"]);
    }
}
