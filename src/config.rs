//! Runtime configuration
//!
//! Settings are resolved once at startup from environment variables and the
//! optional user config file (`<config dir>/stb/config.toml`):
//!
//! ```toml
//! [auth]
//! api_key = "..."
//!
//! [backend]
//! probe_states = ["NEEDS_REVISION", "EVALUATION_PENDING", "COMPLETED"]
//! ```

use crate::error::{Error, Result};
use crate::types::{FeedbackOutcome, SubmissionState};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Enables the stub backend
pub const DEV_MODE_VAR: &str = "STB_DEV_MODE";
/// Stubbed validation outcome (`PASS` or `FAIL`)
pub const STUB_OUTCOME_VAR: &str = "STB_STUB_FEEDBACK_OUTCOME";
/// Stubbed remote state returned for update checks
pub const STUB_STATE_VAR: &str = "STB_STUB_SUBMISSION_STATE";
/// Multiplier applied to simulated stub delays
pub const STUB_DELAY_SCALE_VAR: &str = "STB_STUB_DELAY_SCALE";
/// Largest accepted stub delay scale
pub const MAX_STUB_DELAY_SCALE: f64 = 100.0;
/// Simulates a missing API key in stub mode
pub const STUB_LOGGED_OUT_VAR: &str = "STB_STUB_LOGGED_OUT";
/// API key environment variable
pub const API_KEY_VAR: &str = "SNORKEL_API_KEY";

/// Timeout for metadata calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for the upload and the validation call
pub const LONG_TIMEOUT: Duration = Duration::from_secs(300);

/// Remote deployment to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Environment {
    /// Production
    #[default]
    Prod,
    /// Staging
    Staging,
    /// Development
    Dev,
}

impl Environment {
    /// Base endpoint of the JSON API
    pub const fn base_url(self) -> &'static str {
        match self {
            Self::Prod => "https://experts.snorkel-ai.com/api/v1",
            Self::Staging => "https://experts-stg.snorkel-ai.com/api/v1",
            Self::Dev => "https://experts-dev.snorkel-ai.com/api/v1",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prod => write!(f, "prod"),
            Self::Staging => write!(f, "staging"),
            Self::Dev => write!(f, "dev"),
        }
    }
}

/// Behaviour of the stub backend
#[derive(Debug, Clone, PartialEq)]
pub struct StubConfig {
    /// Outcome reported by the stubbed validation call
    pub feedback_outcome: FeedbackOutcome,
    /// State reported for update-eligibility checks
    pub submission_state: SubmissionState,
    /// Multiplier on simulated latency (0 disables delays)
    pub delay_scale: f64,
    /// Pretend no API key is configured
    pub logged_out: bool,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            feedback_outcome: FeedbackOutcome::Pass,
            submission_state: SubmissionState::NeedsRevision,
            delay_scale: 1.0,
            logged_out: false,
        }
    }
}

/// Which `RemoteBackend` implementation to construct
#[derive(Debug, Clone, PartialEq)]
pub enum BackendMode {
    /// Talk to the real service
    Http,
    /// Use local fakes
    Stub(StubConfig),
}

/// Contents of the user config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// `[auth]` table
    pub auth: AuthSection,
    /// `[backend]` table
    pub backend: BackendSection,
}

/// `[auth]` table of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    /// Stored API key
    pub api_key: Option<String>,
}

/// `[backend]` table of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackendSection {
    /// Ordered states probed to locate a submission
    pub probe_states: Option<Vec<String>>,
}

impl FileConfig {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("stb").join("config.toml"))
    }

    /// Load the config file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Parse config file contents
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Resolved settings for one process run
#[derive(Debug, Clone)]
pub struct Settings {
    /// Remote deployment
    pub environment: Environment,
    /// Backend implementation to use
    pub backend: BackendMode,
    /// Ordered states probed to locate a submission
    pub probe_states: Vec<SubmissionState>,
    /// API key from the config file, if any
    pub stored_api_key: Option<String>,
}

impl Settings {
    /// Resolve settings from the process environment and the default config file
    pub fn load(environment: Environment) -> Result<Self> {
        let file = match FileConfig::default_path() {
            Some(path) => FileConfig::load(&path)?,
            None => FileConfig::default(),
        };
        Self::resolve(environment, |key| std::env::var(key).ok(), file)
    }

    /// Resolve settings from an arbitrary variable lookup
    pub fn resolve(
        environment: Environment,
        lookup: impl Fn(&str) -> Option<String>,
        file: FileConfig,
    ) -> Result<Self> {
        let backend = if is_truthy(lookup(DEV_MODE_VAR).as_deref()) {
            BackendMode::Stub(stub_config(&lookup)?)
        } else {
            BackendMode::Http
        };

        let probe_states = match file.backend.probe_states {
            Some(states) if states.is_empty() => {
                return Err(Error::Config(
                    "backend.probe_states must list at least one state".to_string(),
                ));
            }
            Some(states) => states.iter().map(|s| SubmissionState::from(s.as_str())).collect(),
            None => SubmissionState::DEFAULT_PROBE_ORDER.to_vec(),
        };

        Ok(Self {
            environment,
            backend,
            probe_states,
            stored_api_key: file.auth.api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Whether the stub backend is selected
    pub const fn is_stub(&self) -> bool {
        matches!(self.backend, BackendMode::Stub(_))
    }
}

fn stub_config(lookup: &impl Fn(&str) -> Option<String>) -> Result<StubConfig> {
    let mut config = StubConfig::default();

    if let Some(outcome) = lookup(STUB_OUTCOME_VAR) {
        config.feedback_outcome = match FeedbackOutcome::parse(&outcome) {
            FeedbackOutcome::Pass => FeedbackOutcome::Pass,
            _ => FeedbackOutcome::Fail,
        };
    }
    if let Some(state) = lookup(STUB_STATE_VAR) {
        config.submission_state = SubmissionState::from(state.as_str());
    }
    if let Some(scale) = lookup(STUB_DELAY_SCALE_VAR) {
        config.delay_scale = scale
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|s| (0.0..=MAX_STUB_DELAY_SCALE).contains(s))
            .ok_or_else(|| {
                Error::Config(format!(
                    "{STUB_DELAY_SCALE_VAR} must be a number between 0 and {MAX_STUB_DELAY_SCALE}"
                ))
            })?;
    }
    config.logged_out = is_truthy(lookup(STUB_LOGGED_OUT_VAR).as_deref());

    Ok(config)
}

fn is_truthy(value: Option<&str>) -> bool {
    value.is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}
