//! Platform-specific permission backends.

#[cfg(target_os = "android")]
pub mod android;

#[cfg(target_os = "android")]
pub use android::{AndroidActivity, deliver_request_result};

use crate::{ApiLevel, Permission, PermissionError, PermissionPlatform};

/// Fallback for platforms without a runtime permission service.
///
/// Nothing is reported as granted and every request fails with
/// [`PermissionError::NotSupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsupported;

impl PermissionPlatform for Unsupported {
    fn api_level(&self) -> ApiLevel {
        ApiLevel(0)
    }

    fn is_granted(&self, _permission: Permission) -> bool {
        false
    }

    fn should_show_rationale(&self, _permission: Permission) -> bool {
        false
    }

    async fn request(
        &self,
        _permissions: &[Permission],
    ) -> Result<Vec<(Permission, bool)>, PermissionError> {
        Err(PermissionError::NotSupported)
    }
}
