use std::path::Path;

use serde::Deserialize;

/// Name of the optional project configuration file, looked up next to the tsconfig.
pub const CONFIG_FILE: &str = "amplify-ops.toml";

/// Factory whose return value is treated as a data client.
pub const DEFAULT_CLIENT_FACTORY: &str = "generateClient";

/// Configuration loaded from `amplify-ops.toml` at the project root.
#[derive(Debug, Deserialize, Default)]
pub struct ProjectConfig {
    /// Additional path patterns to exclude from scanning (beyond .gitignore and node_modules).
    pub exclude: Option<Vec<String>>,
    /// Glob patterns used when none are passed on the command line.
    pub include: Option<Vec<String>>,
    /// Name of the client-generation function. Defaults to `generateClient`.
    pub client_factory: Option<String>,
}

impl ProjectConfig {
    /// Load configuration from `amplify-ops.toml` in the given root directory.
    ///
    /// Returns a default (empty) configuration if the file does not exist or cannot be parsed.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!("failed to parse {CONFIG_FILE}: {err}. Using defaults.");
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!("failed to read {CONFIG_FILE}: {err}. Using defaults.");
                Self::default()
            }
        }
    }

    pub fn client_factory(&self) -> &str {
        self.client_factory.as_deref().unwrap_or(DEFAULT_CLIENT_FACTORY)
    }
}
