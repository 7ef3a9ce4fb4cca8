//! Configuration management for draftcheck
//!
//! Stores settings in ~/.config/draftcheck/config.json

use crate::keyring;
use draftcheck_core::{CategoryToggles, SettingsStore};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const API_KEY_ENV_VARS: [&str; 2] = ["DRAFTCHECK_API_KEY", "OPENAI_API_KEY"];
const MIN_API_KEY_LEN: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub offline_mode: bool,
    #[serde(default)]
    pub suggestion_settings: CategoryToggles,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_endpoint: Option<String>,
}

impl Config {
    fn sanitize(&mut self) {
        for field in [&mut self.model, &mut self.api_endpoint] {
            *field = field
                .take()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());
        }
    }

    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("draftcheck"))
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from `path`. A file that fails to parse is moved aside and the
    /// defaults are returned.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str::<Config>(&content) {
            Ok(mut config) => {
                config.sanitize();
                config
            }
            Err(err) => {
                preserve_corrupt_config(path, &content);
                tracing::warn!(
                    error = %err,
                    path = %path.display(),
                    "config file was corrupted; a backup was saved and defaults were loaded"
                );
                Self::default()
            }
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<(), String> {
        let path =
            Self::config_path().ok_or_else(|| "Could not determine config directory".to_string())?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        let mut sanitized = self.clone();
        sanitized.sanitize();

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o700)) {
                    tracing::debug!(error = %e, "failed to set config directory permissions");
                }
            }
        }

        let content = serde_json::to_string_pretty(&sanitized)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;
        write_config_atomic(path, &content).map_err(|e| format!("Failed to write config: {}", e))
    }

    /// API key from the environment, then the credential store.
    pub fn get_api_key() -> Option<String> {
        let from_env = API_KEY_ENV_VARS.iter().find_map(|name| {
            std::env::var(name)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        });
        if from_env.is_some() {
            return from_env;
        }
        match keyring::get_api_key() {
            Ok(key) => key,
            Err(err) => {
                keyring::warn_keychain_error_once(&err);
                None
            }
        }
    }

    /// Validate, store, and read back the API key.
    pub fn set_api_key(key: &str) -> Result<(), String> {
        match validate_api_key_format(key) {
            KeyCheck::Valid => {}
            KeyCheck::Masked => {
                return Err("That is the masked key; enter the full key to change it.".to_string())
            }
            KeyCheck::Invalid => {
                return Err("API keys start with 'sk-' and are at least 10 characters.".to_string())
            }
        }

        let key = key.trim();
        keyring::set_api_key(key).map_err(|e| {
            format!(
                "Failed to store API key in {}: {}. \
                 You can set the DRAFTCHECK_API_KEY environment variable instead.",
                keyring::credentials_store_label(),
                e
            )
        })?;

        match keyring::get_api_key() {
            Ok(Some(stored)) if stored == key => Ok(()),
            Ok(_) => Err(format!(
                "API key verification failed: key was not persisted to {}.",
                keyring::credentials_store_label()
            )),
            Err(err) => Err(format!(
                "API key verification failed: couldn't read back from {} ({}).",
                keyring::credentials_store_label(),
                err
            )),
        }
    }

    /// Get the config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/draftcheck/config.json".to_string())
    }
}

/// Outcome of checking a key typed into the settings form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCheck {
    Valid,
    /// The masked display value was submitted unchanged
    Masked,
    Invalid,
}

pub fn validate_api_key_format(key: &str) -> KeyCheck {
    let key = key.trim();
    if key.contains('*') {
        return KeyCheck::Masked;
    }
    if key.starts_with("sk-") && key.chars().count() >= MIN_API_KEY_LEN {
        KeyCheck::Valid
    } else {
        KeyCheck::Invalid
    }
}

/// Keep the first three and last four characters of a key.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.trim().chars().collect();
    if chars.len() <= 7 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 7), tail)
}

/// Interactive prompt to set up the API key
pub fn setup_api_key_interactive() -> Result<String, String> {
    use std::io::{self, Write};

    println!();
    println!("  draftcheck setup");
    println!();
    println!("  draftcheck sends the text you check to an OpenAI-compatible API.");
    println!("  Without a key it still runs its built-in basic checks.");
    println!();
    println!(
        "  The key will be stored in your {}.",
        keyring::credentials_store_label()
    );
    println!("  Prefer env vars? Set DRAFTCHECK_API_KEY and skip this step.");
    println!();
    print!("  API Key: ");
    io::stdout().flush().map_err(|e| e.to_string())?;

    let mut key = String::new();
    io::stdin().read_line(&mut key).map_err(|e| e.to_string())?;
    let key = key.trim().to_string();
    if key.is_empty() {
        return Err("No API key provided".to_string());
    }

    Config::set_api_key(&key)?;

    println!();
    println!("  + API key {} saved", mask_api_key(&key));
    println!();
    Ok(key)
}

fn preserve_corrupt_config(path: &Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

pub(crate) fn write_config_atomic(path: &Path, content: &str) -> Result<(), String> {
    use std::fs::OpenOptions;

    let tmp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&tmp_path)
        .map_err(|e| e.to_string())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = file.set_permissions(fs::Permissions::from_mode(0o600)) {
            tracing::debug!(error = %e, "failed to set temp config file permissions");
        }
    }

    file.write_all(content.as_bytes()).map_err(|e| e.to_string())?;

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err.to_string());
    }
    Ok(())
}

/// Settings view over the config file and the credential store
pub struct ConfigStore {
    config: Mutex<Config>,
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// Store backed by the user's config file.
    pub fn load() -> Self {
        Self {
            config: Mutex::new(Config::load()),
            path: Config::config_path(),
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            config: Mutex::new(Config::load_from(&path)),
            path: Some(path),
        }
    }

    pub fn config(&self) -> Config {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Config> {
        self.config.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SettingsStore for ConfigStore {
    fn api_key(&self) -> Option<String> {
        Config::get_api_key()
    }

    fn offline_mode(&self) -> bool {
        self.lock().offline_mode
    }

    fn set_offline_mode(&self, value: bool) -> anyhow::Result<()> {
        let mut config = self.lock();
        let mut updated = config.clone();
        updated.offline_mode = value;
        if let Some(path) = &self.path {
            updated.save_to(path).map_err(anyhow::Error::msg)?;
        }
        *config = updated;
        Ok(())
    }

    fn suggestion_settings(&self) -> CategoryToggles {
        self.lock().suggestion_settings
    }
}
