//! API key resolution
//!
//! Supports the `SNORKEL_API_KEY` environment variable and the user config file.

use crate::config::{API_KEY_VAR, BackendMode, Settings};
use crate::error::{Error, Result};
use std::env;
use std::fmt;

/// Key handed out by the stub backend
pub const STUB_API_KEY: &str = "stub-api-key-for-development";

/// Source of the API key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Key from environment variable
    EnvVar,
    /// Key from the user config file
    ConfigFile,
    /// Fixed key used in stub mode
    Stub,
}

impl fmt::Display for AuthSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnvVar => write!(f, "{API_KEY_VAR} environment variable"),
            Self::ConfigFile => write!(f, "config file"),
            Self::Stub => write!(f, "stub mode"),
        }
    }
}

/// API key used for every request of a run
#[derive(Clone)]
pub struct ApiKey {
    /// Key value
    pub key: String,
    /// Where the key was obtained from
    pub source: AuthSource,
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("key", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Get the API key
///
/// Priority:
/// 1. Stub mode fixed key (unless simulating a logged-out user)
/// 2. `SNORKEL_API_KEY` environment variable
/// 3. `[auth] api_key` in the config file
pub fn get_api_key(settings: &Settings) -> Result<ApiKey> {
    resolve_api_key(settings, env::var(API_KEY_VAR).ok())
}

fn resolve_api_key(settings: &Settings, from_env: Option<String>) -> Result<ApiKey> {
    if let BackendMode::Stub(stub) = &settings.backend {
        if stub.logged_out {
            return Err(missing_key());
        }
        return Ok(ApiKey {
            key: STUB_API_KEY.to_string(),
            source: AuthSource::Stub,
        });
    }

    if let Some(key) = from_env.filter(|k| !k.trim().is_empty()) {
        return Ok(ApiKey {
            key,
            source: AuthSource::EnvVar,
        });
    }

    if let Some(key) = &settings.stored_api_key {
        return Ok(ApiKey {
            key: key.clone(),
            source: AuthSource::ConfigFile,
        });
    }

    Err(missing_key())
}

fn missing_key() -> Error {
    Error::Auth(format!(
        "No API key found. Set {API_KEY_VAR} or add it to the config file (see `stb auth setup`)"
    ))
}
