//! Configuration file support

use masry_core::ThemeMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "MASRY_CONFIG_PATH";

/// Configuration for masry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default model to use
    pub model: Option<String>,
    /// API key (alternative to environment variables)
    pub api_key: Option<String>,
    /// Where conversations and settings are stored
    pub data_dir: Option<String>,
    /// Theme used when none has been saved yet (light or dark)
    pub theme: Option<String>,
    /// Custom system prompt file path; `{user_name}` is substituted
    pub system_prompt_file: Option<String>,
    /// Whether to use TUI mode by default
    pub tui: Option<bool>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("masry")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`. A missing or malformed file yields the defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to `path`
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            model: Some(masry_ai::DEFAULT_MODEL_ID.to_string()),
            theme: Some(ThemeMode::default().as_str().to_string()),
            tui: Some(true),
            ..Default::default()
        };
        default_config.save_to(&path)?;
        Ok(path)
    }

    /// Theme from the config file, ignoring values that are not light or dark
    pub fn theme_mode(&self) -> Option<ThemeMode> {
        let theme = self.theme.as_deref()?;
        match theme.parse() {
            Ok(mode) => Some(mode),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring theme from config");
                None
            }
        }
    }

    /// Read the custom system prompt, if one is configured
    pub fn system_prompt(&self) -> Option<String> {
        let path = expand_home(self.system_prompt_file.as_deref()?);
        match fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => Some(content),
            Ok(_) => None,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to read system prompt file {}: {}",
                    path.display(),
                    e
                );
                None
            }
        }
    }

    /// Configured data directory, or the platform default
    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => expand_home(dir),
            None => default_data_dir(),
        }
    }
}

/// `<local data dir>/masry`
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("masry")
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// Pick the API key: command line, then config, then the environment.
///
/// `None` means no key was found anywhere; the provider then reports the
/// missing key when the first reply is requested.
pub fn resolve_api_key(flag: Option<&str>, config: &Config) -> Option<String> {
    let explicit = flag
        .or(config.api_key.as_deref())
        .filter(|key| !key.trim().is_empty());
    if let Some(key) = explicit {
        return Some(key.to_string());
    }
    masry_ai::providers::get_api_key(None, masry_ai::providers::google::API_KEY_ENV_VARS).ok()
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# masry configuration file
# Place at ~/.config/masry/config.toml (Linux) or set MASRY_CONFIG_PATH

# Default model to use
model = "gemini-2.5-flash"

# Theme used until you toggle it (light or dark)
theme = "dark"

# Whether to use TUI mode by default (true by default)
# Set to false for simple stdin/stdout mode
tui = true

# Where conversations are stored (defaults to the platform data directory)
# data_dir = "~/.local/share/masry"

# Custom system prompt file (optional); {user_name} is replaced with your name
# system_prompt_file = "~/.config/masry/persona.txt"

# API key (optional - GOOGLE_API_KEY or GEMINI_API_KEY also work)
# It's recommended to use environment variables instead for security
# api_key = "..."
"#
}
