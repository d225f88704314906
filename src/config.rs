//! Runtime configuration and credential loading
//!
//! # Environment Variables
//!
//! - `DPT_URL` - Device API URL (default: `https://digitalpaper.local:8443`)
//! - `DPT_CLIENT_ID` - Client id registered with the device
//! - `DPT_CLIENT_ID_FILE` - File holding the client id (used when `DPT_CLIENT_ID` is unset)
//! - `DPT_KEY_FILE` - Private key file (PKCS#1 or PKCS#8, PEM or bare base64)
//! - `DPT_TIMEOUT_SECS` - Request and handshake timeout in seconds (default: 30)
//! - `DPT_ACCEPT_INVALID_CERTS` - `1`, `true`, `yes` or `on` to skip certificate verification

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::pkcs::{prepare_key, KeyError};

pub const DEFAULT_URL: &str = "https://digitalpaper.local:8443";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No client id configured (set DPT_CLIENT_ID or DPT_CLIENT_ID_FILE)")]
    MissingClientId,

    #[error("No private key configured (set DPT_KEY_FILE)")]
    MissingKey,

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },

    #[error("Invalid key in {path}: {source}")]
    Key {
        path: PathBuf,
        #[source]
        source: KeyError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DptConfig {
    pub base_url: String,
    pub client_id: Option<String>,
    pub client_id_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl Default for DptConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_URL.to_string(),
            client_id: None,
            client_id_file: None,
            key_file: None,
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: false,
        }
    }
}

impl DptConfig {
    /// Read configuration from `DPT_*` environment variables.
    ///
    /// An unparseable numeric or boolean value falls back to its own default
    /// with a warning; the other variables still apply. Use
    /// [`DptConfig::from_lookup`] to surface such values as errors.
    pub fn from_env() -> Self {
        Self::from_lookup_lenient(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            timeout: timeout_from(&lookup)?,
            accept_invalid_certs: accept_invalid_certs_from(&lookup)?,
            ..Self::strings_from(&lookup)
        })
    }

    /// Like [`DptConfig::from_lookup`], but bad values default field by field.
    pub fn from_lookup_lenient<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let timeout = timeout_from(&lookup).unwrap_or_else(|e| {
            warn!("{}, using {}s", e, DEFAULT_TIMEOUT.as_secs());
            DEFAULT_TIMEOUT
        });
        let accept_invalid_certs = accept_invalid_certs_from(&lookup).unwrap_or_else(|e| {
            warn!("{}, certificate verification stays on", e);
            false
        });
        Self {
            timeout,
            accept_invalid_certs,
            ..Self::strings_from(&lookup)
        }
    }

    fn strings_from<F>(lookup: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            base_url: lookup("DPT_URL").unwrap_or_else(|| DEFAULT_URL.to_string()),
            client_id: lookup("DPT_CLIENT_ID").and_then(|id| normalize_client_id(&id)),
            client_id_file: lookup("DPT_CLIENT_ID_FILE").map(PathBuf::from),
            key_file: lookup("DPT_KEY_FILE").map(PathBuf::from),
            ..Self::default()
        }
    }

    /// Client id from the explicit value, else from the id file.
    pub fn load_client_id(&self) -> Result<String, ConfigError> {
        if let Some(id) = &self.client_id {
            return Ok(id.clone());
        }
        match &self.client_id_file {
            Some(path) => read_client_id(path)?.ok_or(ConfigError::MissingClientId),
            None => Err(ConfigError::MissingClientId),
        }
    }

    /// Base64 PKCS#8 key prepared from the key file
    pub fn load_prepared_key(&self) -> Result<String, ConfigError> {
        let path = self.key_file.as_ref().ok_or(ConfigError::MissingKey)?;
        read_key(path)
    }
}

fn timeout_from<F>(lookup: &F) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup("DPT_TIMEOUT_SECS") {
        Some(value) => match value.trim().parse::<u64>() {
            Ok(secs) => Ok(Duration::from_secs(secs)),
            Err(_) => Err(ConfigError::InvalidValue {
                name: "DPT_TIMEOUT_SECS",
                value,
            }),
        },
        None => Ok(DEFAULT_TIMEOUT),
    }
}

fn accept_invalid_certs_from<F>(lookup: &F) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup("DPT_ACCEPT_INVALID_CERTS") {
        Some(value) => parse_flag(&value).ok_or(ConfigError::InvalidValue {
            name: "DPT_ACCEPT_INVALID_CERTS",
            value,
        }),
        None => Ok(false),
    }
}

/// Same vocabulary as clap's `BoolishValueParser`, plus empty for false.
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Remove all whitespace; whitespace-only ids count as absent.
pub fn normalize_client_id(raw: &str) -> Option<String> {
    let id: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    (!id.is_empty()).then_some(id)
}

/// Read a client id file.
pub fn read_client_id(path: &Path) -> Result<Option<String>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(normalize_client_id(&raw))
}

/// Read a private key file and prepare it for signing.
pub fn read_key(path: &Path) -> Result<String, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if text.trim().is_empty() {
        return Err(ConfigError::MissingKey);
    }
    prepare_key(&text).map_err(|source| ConfigError::Key {
        path: path.to_path_buf(),
        source,
    })
}
