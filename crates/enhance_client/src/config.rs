//! Credentials loader for `~/.config/enhance-with-ai/config`.
//! Plain `KEY=value` lines; `#` starts a comment line; unknown keys are ignored.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

/// Model used when the config file has no `MODEL` line.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Written to the config path when no file exists yet.
pub const TEMPLATE: &str = "# Enhance With AI – configuration file
# Required:
OPENAI_API_KEY=sk-xxxxxxxxxxxxxxxxxxxxxxxxxxxx

# Optional (defaults to gpt-4o-mini if missing)
MODEL=gpt-4o-mini
";

const API_KEY_FIELD: &str = "OPENAI_API_KEY";
const MODEL_FIELD: &str = "MODEL";

/// API key and model, loaded once at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub model: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

// Keeps the key out of logs and panic messages.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// Returns the default config file path: `<config dir>/enhance-with-ai/config`.
pub fn default_config_path() -> Option<PathBuf> {
    let base = dirs::config_dir()?;
    Some(base.join("enhance-with-ai").join("config"))
}

/// Load credentials from `path`.
///
/// When the file does not exist a template is written there first and
/// [`ConfigError::Missing`] is returned so the caller can ask the user to fill
/// it in and restart.
pub fn load(path: &Path) -> Result<Credentials, ConfigError> {
    if !path.exists() {
        write_template(path)?;
        info!(path = %path.display(), "wrote config template");
        return Err(ConfigError::Missing {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    parse(&contents)
}

/// Parse config file contents. Later duplicate keys win.
pub fn parse(contents: &str) -> Result<Credentials, ConfigError> {
    let mut api_key = None;
    let mut model = DEFAULT_MODEL.to_string();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').unwrap_or((line, ""));
        match key {
            API_KEY_FIELD => api_key = Some(value.to_string()),
            MODEL_FIELD => model = value.to_string(),
            other => debug!(key = other, "ignoring unknown config key"),
        }
    }

    match api_key {
        Some(api_key) if !api_key.is_empty() => Ok(Credentials { api_key, model }),
        _ => Err(ConfigError::Invalid(format!(
            "{API_KEY_FIELD} is missing in the config file"
        ))),
    }
}

fn write_template(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, TEMPLATE)?;
    Ok(())
}

/// Config load error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "Configuration file created at:\n\n{}\n\nPlease add your OpenAI API key and restart the app.",
        .path.display()
    )]
    Missing { path: PathBuf },
    #[error("{0}")]
    Invalid(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Heading shown above the message.
    pub fn title(&self) -> &'static str {
        "Configuration required"
    }
}
