//! Backend factory
//!
//! Picks the backend implementation once, at startup, from the resolved settings.

use crate::auth::ApiKey;
use crate::backend::{HttpBackend, RemoteBackend, StubBackend};
use crate::config::{BackendMode, Settings};
use tracing::debug;

/// Create the backend selected by `settings`
pub fn create_backend(settings: &Settings, api_key: &ApiKey) -> Box<dyn RemoteBackend> {
    match &settings.backend {
        BackendMode::Http => {
            debug!(env = %settings.environment, "using HTTP backend");
            Box::new(HttpBackend::new(
                settings.environment,
                api_key.key.clone(),
                settings.probe_states.clone(),
            ))
        }
        BackendMode::Stub(stub) => {
            debug!(env = %settings.environment, "using stub backend");
            Box::new(StubBackend::new(
                stub.clone(),
                settings.environment,
                settings.probe_states.clone(),
            ))
        }
    }
}
