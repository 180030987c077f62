//! Platform-specific location backends.

/// Android platform implementation.
#[cfg(target_os = "android")]
pub mod android;

#[cfg(target_os = "android")]
pub use android::AndroidLocationBackend;

use std::sync::Arc;

use crate::{LocationBackend, LocationDelegate, LocationError, Position, Provider, UpdateConfig};

/// Fallback for platforms without location providers. Every provider reports
/// as disabled, so a tracker over it never subscribes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsupported;

impl LocationBackend for Unsupported {
    fn is_provider_enabled(&self, _provider: Provider) -> bool {
        false
    }

    fn subscribe(
        &self,
        provider: Provider,
        _config: &UpdateConfig,
        _delegate: Arc<dyn LocationDelegate>,
    ) -> Result<(), LocationError> {
        Err(LocationError::ProviderUnavailable(provider))
    }

    fn unsubscribe(&self, _provider: Provider) {}

    fn last_known_location(&self, _provider: Provider) -> Option<Position> {
        None
    }
}
