//! Logging capability injected into `FacilityClient`.

use crate::error::FacilityError;

/// Receives failures swallowed by the `OrDefault` adapter.
pub trait Logger: Send + Sync {
    fn error(&self, message: &str, error: &FacilityError);
}

/// Forwards to `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn error(&self, message: &str, error: &FacilityError) {
        tracing::error!(error = %error, "{message}");
    }
}
