//! Where the API key is kept
//!
//! Normally the system keychain holds the key as a single secret. Setting
//! `DRAFTCHECK_DISABLE_KEYRING` switches to a small JSON file instead, which
//! `DRAFTCHECK_CREDENTIALS_FILE` can relocate.

use crate::config::write_config_atomic;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

const KEYCHAIN_SERVICE: &str = "draftcheck";
const KEYCHAIN_ACCOUNT: &str = "api-key";

static KEY_CACHE: OnceLock<Mutex<Option<Option<String>>>> = OnceLock::new();
static KEYCHAIN_ERROR_WARNED: AtomicBool = AtomicBool::new(false);

/// On-disk shape of the credentials file
#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    api_key: Option<String>,
}

enum Backend {
    Keychain,
    File(PathBuf),
}

impl Backend {
    fn resolve() -> Result<Self, String> {
        if keychain_disabled() {
            credentials_file_path().map(Backend::File)
        } else {
            Ok(Backend::Keychain)
        }
    }

    fn read(&self) -> Result<Option<String>, String> {
        match self {
            Backend::Keychain => match keychain_entry()?.get_password() {
                Ok(key) => Ok(Some(key)),
                Err(keyring::Error::NoEntry) => Ok(None),
                Err(err) => Err(err.to_string()),
            },
            Backend::File(path) => {
                if !path.exists() {
                    return Ok(None);
                }
                let json = fs::read_to_string(path)
                    .map_err(|e| format!("Failed to read '{}': {}", path.display(), e))?;
                let file: CredentialsFile = serde_json::from_str(&json)
                    .map_err(|e| format!("Failed to parse '{}': {}", path.display(), e))?;
                Ok(file.api_key)
            }
        }
    }

    fn write(&self, key: Option<&str>) -> Result<(), String> {
        match (self, key) {
            (Backend::Keychain, Some(key)) => keychain_entry()?
                .set_password(key)
                .map_err(|e| e.to_string()),
            (Backend::Keychain, None) => match keychain_entry()?.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(err) => Err(err.to_string()),
            },
            (Backend::File(path), key) => {
                if let Some(dir) = path.parent() {
                    fs::create_dir_all(dir)
                        .map_err(|e| format!("Failed to create '{}': {}", dir.display(), e))?;
                }
                let content = serde_json::to_string(&CredentialsFile {
                    api_key: key.map(str::to_string),
                })
                .map_err(|e| e.to_string())?;
                write_config_atomic(path, &content)
            }
        }
    }
}

fn keychain_disabled() -> bool {
    if cfg!(test) {
        return true;
    }
    matches!(
        std::env::var("DRAFTCHECK_DISABLE_KEYRING")
            .unwrap_or_default()
            .to_lowercase()
            .as_str(),
        "1" | "true" | "yes"
    )
}

fn keychain_entry() -> Result<Entry, String> {
    Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_ACCOUNT).map_err(|e| e.to_string())
}

fn credentials_file_path() -> Result<PathBuf, String> {
    if let Some(path) = std::env::var_os("DRAFTCHECK_CREDENTIALS_FILE") {
        if !path.is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    if cfg!(test) {
        return Ok(std::env::temp_dir().join("draftcheck-test-credentials.json"));
    }
    dirs::config_dir()
        .map(|dir| dir.join("draftcheck").join("credentials.json"))
        .ok_or_else(|| "Could not determine credentials file path".to_string())
}

fn key_cache() -> &'static Mutex<Option<Option<String>>> {
    KEY_CACHE.get_or_init(|| Mutex::new(None))
}

fn remember(key: Option<Option<String>>) {
    *key_cache().lock().unwrap_or_else(|e| e.into_inner()) = key;
}

/// Label for CLI messages
pub fn credentials_store_label() -> &'static str {
    if keychain_disabled() {
        "local credentials file"
    } else {
        "system keychain"
    }
}

/// Log keychain trouble once per process.
pub fn warn_keychain_error_once(err: &str) {
    if KEYCHAIN_ERROR_WARNED.swap(true, Ordering::Relaxed) {
        return;
    }
    tracing::warn!(
        error = %err,
        "couldn't access the system keychain; \
         set DRAFTCHECK_DISABLE_KEYRING=1 or DRAFTCHECK_API_KEY to bypass it"
    );
}

/// Stored API key, if any. The first successful read is cached.
pub fn get_api_key() -> Result<Option<String>, String> {
    let mut cache = key_cache().lock().unwrap_or_else(|e| e.into_inner());
    if let Some(key) = cache.as_ref() {
        return Ok(key.clone());
    }
    let key = Backend::resolve()?
        .read()?
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty());
    *cache = Some(key.clone());
    Ok(key)
}

pub fn set_api_key(key: &str) -> Result<(), String> {
    let key = key.trim();
    Backend::resolve()?.write(Some(key))?;
    remember(Some(Some(key.to_string())));
    Ok(())
}

pub fn clear_api_key() -> Result<(), String> {
    Backend::resolve()?.write(None)?;
    remember(Some(None));
    Ok(())
}
