//! Configuration system for the Tasklist server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/tasklist/config.toml`)
//! 4. Compiled defaults
//!
//! Credentials are accepted only from the CLI or the environment, never
//! from the config file, and are redacted from `Debug` output.

use std::path::PathBuf;

/// Default collection name, shared with earlier deployments of the app.
pub const DEFAULT_COLLECTION: &str = "vercel_flask_todos";

/// Default text-generation model.
pub const DEFAULT_SUGGEST_MODEL: &str = "gemini-2.0-flash";

/// Default text-generation API base URL.
pub const DEFAULT_SUGGEST_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Errors that can occur when loading server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Hosted Firestore database (or its local emulator).
    #[default]
    Firestore,
    /// In-process store; contents are lost on restart.
    Memory,
}

/// A credential string that never appears in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a credential value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the credential value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    store: StoreFileConfig,
    suggest: SuggestFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    log_level: Option<String>,
}

/// `[store]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StoreFileConfig {
    backend: Option<StoreBackend>,
    collection: Option<String>,
    emulator_host: Option<String>,
    project_id: Option<String>,
}

/// `[suggest]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SuggestFileConfig {
    model: Option<String>,
    base_url: Option<String>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the Tasklist server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Tasklist web server")]
pub struct CliArgs {
    /// Address to bind the HTTP server to.
    #[arg(short, long, env = "TASKLIST_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/tasklist/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Persistence backend.
    #[arg(long, value_enum, env = "TASKLIST_STORE")]
    pub store: Option<StoreBackend>,

    /// Document collection holding the tasks.
    #[arg(long, env = "TASKLIST_COLLECTION")]
    pub collection: Option<String>,

    /// `host:port` of a local Firestore emulator; disables authentication.
    #[arg(long, env = "FIRESTORE_EMULATOR_HOST")]
    pub emulator_host: Option<String>,

    /// Project id, when it cannot be taken from the service-account credential.
    #[arg(long, env = "TASKLIST_PROJECT_ID")]
    pub project_id: Option<String>,

    /// Serialized service-account credential JSON for the document store.
    #[arg(long, env = "FIREBASE_CREDENTIALS_JSON", hide_env_values = true)]
    pub firebase_credentials: Option<String>,

    /// API key for the text-generation service.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Text-generation model name.
    #[arg(long, env = "TASKLIST_SUGGEST_MODEL")]
    pub suggest_model: Option<String>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, env = "TASKLIST_LOG")]
    pub log_level: Option<String>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Persistence gateway configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Which backend to construct.
    pub backend: StoreBackend,
    /// Collection holding the task documents.
    pub collection: String,
    /// Emulator `host:port`, if any.
    pub emulator_host: Option<String>,
    /// Explicit project id; overrides the credential's.
    pub project_id: Option<String>,
    /// Service-account credential JSON.
    pub credentials_json: Option<Secret>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            collection: DEFAULT_COLLECTION.to_string(),
            emulator_host: None,
            project_id: None,
            credentials_json: None,
        }
    }
}

/// Suggestion gateway configuration.
#[derive(Debug, Clone)]
pub struct SuggestConfig {
    /// API key; `None` leaves the gateway unavailable.
    pub api_key: Option<Secret>,
    /// Model name.
    pub model: String,
    /// API base URL.
    pub base_url: String,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_SUGGEST_MODEL.to_string(),
            base_url: DEFAULT_SUGGEST_BASE_URL.to_string(),
        }
    }
}

/// Fully resolved server configuration.
#[derive(Debug, Clone)]
pub struct TasklistConfig {
    /// Address to bind the server to (e.g., `0.0.0.0:8080`).
    pub bind_addr: String,
    /// Log level filter string.
    pub log_level: String,
    /// Persistence gateway settings.
    pub store: StoreConfig,
    /// Suggestion gateway settings.
    pub suggest: SuggestConfig,
}

impl Default for TasklistConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            log_level: "info".to_string(),
            store: StoreConfig::default(),
            suggest: SuggestConfig::default(),
        }
    }
}

impl TasklistConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an error.
    /// If no `--config` is given, the default path is tried and a missing
    /// file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `TasklistConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. Empty credential strings count as
    /// absent.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            log_level: cli
                .log_level
                .clone()
                .or_else(|| file.server.log_level.clone())
                .unwrap_or(defaults.log_level),
            store: StoreConfig {
                backend: cli
                    .store
                    .or(file.store.backend)
                    .unwrap_or(defaults.store.backend),
                collection: cli
                    .collection
                    .clone()
                    .or_else(|| file.store.collection.clone())
                    .unwrap_or(defaults.store.collection),
                emulator_host: cli
                    .emulator_host
                    .clone()
                    .or_else(|| file.store.emulator_host.clone())
                    .filter(|h| !h.trim().is_empty()),
                project_id: cli
                    .project_id
                    .clone()
                    .or_else(|| file.store.project_id.clone()),
                credentials_json: non_blank_secret(cli.firebase_credentials.as_deref()),
            },
            suggest: SuggestConfig {
                api_key: non_blank_secret(cli.gemini_api_key.as_deref()),
                model: cli
                    .suggest_model
                    .clone()
                    .or_else(|| file.suggest.model.clone())
                    .unwrap_or(defaults.suggest.model),
                base_url: file
                    .suggest
                    .base_url
                    .clone()
                    .unwrap_or(defaults.suggest.base_url),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn non_blank_secret(value: Option<&str>) -> Option<Secret> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(Secret::new)
}

/// Load and parse a TOML config file.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("tasklist").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
