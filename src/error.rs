use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading a usage map or patching a schema resource.
///
/// All of these are fatal for the apply operation and are raised before the
/// resource file is touched on disk.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("schema() not found")]
    SchemaNotFound,

    #[error("schema() arg is not object")]
    SchemaArgNotObject,

    #[error("invalid usage map {path}: {source}")]
    UsageMap {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse {0}")]
    Parse(PathBuf),

    #[error("unsupported file extension for {0}")]
    UnsupportedFile(PathBuf),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PatchError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
