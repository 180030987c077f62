//! Runtime permission negotiation.
//!
//! This crate negotiates the fixed set of runtime permissions the Feeling
//! shell needs, classifies what the user answered, and drives the two recovery
//! prompts: a rationale prompt for permissions that may still be requested and
//! a feature-limited notice for permissions the OS will no longer prompt for.
//!
//! The OS primitives live behind [`PermissionPlatform`], dialog presentation
//! behind [`RecoveryUi`], and app-level actions behind [`AppControl`], so the
//! negotiation itself is plain, testable Rust.

#![warn(missing_docs)]

mod coordinator;
mod notice;

/// Platform-specific implementations.
pub mod sys;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub use coordinator::PermissionCoordinator;
pub use notice::{FeatureLimitedAction, FeatureLimitedNotice, RationaleNotice};

/// Runtime permissions the shell asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Network access for loading the web app.
    Network,
    /// Access to the device camera.
    Camera,
    /// Precise device location.
    FineLocation,
    /// Approximate device location.
    CoarseLocation,
    /// Read access to images in shared storage.
    MediaImages,
    /// Posting notifications.
    Notifications,
}

impl Permission {
    /// Every permission the shell knows about, in request order.
    pub const ALL: [Self; 6] = [
        Self::Network,
        Self::Camera,
        Self::FineLocation,
        Self::CoarseLocation,
        Self::MediaImages,
        Self::Notifications,
    ];

    /// The Android manifest identifier for this permission.
    #[must_use]
    pub const fn manifest_name(self) -> &'static str {
        match self {
            Self::Network => "android.permission.INTERNET",
            Self::Camera => "android.permission.CAMERA",
            Self::FineLocation => "android.permission.ACCESS_FINE_LOCATION",
            Self::CoarseLocation => "android.permission.ACCESS_COARSE_LOCATION",
            Self::MediaImages => "android.permission.READ_MEDIA_IMAGES",
            Self::Notifications => "android.permission.POST_NOTIFICATIONS",
        }
    }

    /// Parse an Android manifest identifier.
    #[must_use]
    pub fn from_manifest_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.manifest_name() == name)
    }

    /// Short human-readable name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Network => "Network",
            Self::Camera => "Camera",
            Self::FineLocation => "Precise location",
            Self::CoarseLocation => "Approximate location",
            Self::MediaImages => "Photos",
            Self::Notifications => "Notifications",
        }
    }

    /// What the app uses this permission for.
    #[must_use]
    pub const fn justification(self) -> &'static str {
        match self {
            Self::Network => "load the app and keep its content up to date",
            Self::Camera => "take photos and record videos",
            Self::FineLocation => {
                "precise location features (e.g. navigation, searching nearby places)"
            }
            Self::CoarseLocation => {
                "area-based services (e.g. weather information, local news)"
            }
            Self::MediaImages => {
                "view and pick photos on the device (e.g. profile picture upload, image sharing)"
            }
            Self::Notifications => "deliver important updates and information",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.manifest_name())
    }
}

/// OS API level of the running platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiLevel(pub u32);

impl ApiLevel {
    /// Android 13. Media and notification permissions become runtime permissions here.
    pub const TIRAMISU: Self = Self(33);
}

/// The ordered set of permissions requested in one negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSet(Vec<Permission>);

impl PermissionSet {
    /// The permissions required on the given API level.
    ///
    /// Network, camera and both location permissions are always included;
    /// media images and notifications are added from [`ApiLevel::TIRAMISU`] on.
    #[must_use]
    pub fn for_api_level(level: ApiLevel) -> Self {
        let mut permissions = vec![
            Permission::Network,
            Permission::Camera,
            Permission::FineLocation,
            Permission::CoarseLocation,
        ];
        if level >= ApiLevel::TIRAMISU {
            permissions.push(Permission::MediaImages);
            permissions.push(Permission::Notifications);
        }
        Self(permissions)
    }

    /// Iterate over the permissions in request order.
    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }

    /// The permissions as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Permission] {
        &self.0
    }

    /// Whether `permission` is part of the set.
    #[must_use]
    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    /// Number of permissions in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How the OS currently regards a single permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermissionOutcome {
    /// Permission has been granted.
    Granted,
    /// Denied, but the OS still allows explaining and asking again.
    DeniedTemporarily,
    /// Denied, and the OS will no longer show its prompt.
    DeniedPermanently,
}

impl PermissionOutcome {
    /// Classify from the two OS hints.
    #[must_use]
    pub const fn classify(granted: bool, should_show_rationale: bool) -> Self {
        match (granted, should_show_rationale) {
            (true, _) => Self::Granted,
            (false, true) => Self::DeniedTemporarily,
            (false, false) => Self::DeniedPermanently,
        }
    }
}

/// Final result of one negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationResult {
    /// Every required permission is granted.
    AllGranted,
    /// These permissions were denied.
    SomeDenied(Vec<Permission>),
}

impl NegotiationResult {
    /// Whether every permission was granted.
    #[must_use]
    pub const fn is_all_granted(&self) -> bool {
        matches!(self, Self::AllGranted)
    }

    /// Hand the result to `callback`, calling exactly one of its methods.
    pub fn dispatch(&self, callback: &impl PermissionCallback) {
        match self {
            Self::AllGranted => callback.on_all_permissions_granted(),
            Self::SomeDenied(denied) => callback.on_some_permissions_denied(denied),
        }
    }
}

/// Receives the result of a negotiation.
pub trait PermissionCallback {
    /// Every required permission is granted.
    fn on_all_permissions_granted(&self);

    /// Some permissions were denied.
    fn on_some_permissions_denied(&self, denied: &[Permission]);
}

/// Errors that can occur when talking to the platform permission service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PermissionError {
    /// Runtime permissions are not supported on this platform.
    #[error("permission not supported on this platform")]
    NotSupported,
    /// Another permission request is still waiting for the user.
    #[error("a permission request is already in flight")]
    RequestInFlight,
    /// An unknown error occurred.
    #[error("unknown error: {0}")]
    Unknown(String),
}

/// OS permission primitives.
pub trait PermissionPlatform {
    /// API level of the running OS.
    fn api_level(&self) -> ApiLevel;

    /// Whether `permission` is currently granted.
    fn is_granted(&self, permission: Permission) -> bool;

    /// Whether the OS suggests explaining `permission` before asking again.
    fn should_show_rationale(&self, permission: Permission) -> bool;

    /// Show the OS prompt for `permissions` and report the answer for each.
    ///
    /// Permissions missing from the returned list are treated as denied.
    fn request(
        &self,
        permissions: &[Permission],
    ) -> impl Future<Output = Result<Vec<(Permission, bool)>, PermissionError>> + Send;
}

/// Presentation of the recovery prompts.
pub trait RecoveryUi {
    /// Explain why the permissions are needed. Resolves to `true` if the user
    /// agreed to be asked again.
    fn show_rationale(&self, notice: &RationaleNotice) -> impl Future<Output = bool> + Send;

    /// Tell the user which features are limited and let them pick what to do next.
    fn show_feature_limited(
        &self,
        notice: &FeatureLimitedNotice,
    ) -> impl Future<Output = FeatureLimitedAction> + Send;
}

/// App-level actions reachable from the recovery prompts and the web bridge.
pub trait AppControl {
    /// Open the OS settings screen for this application.
    fn open_app_settings(&self);

    /// Close the application.
    fn exit_app(&self);
}

impl<T: PermissionPlatform + ?Sized> PermissionPlatform for &T {
    fn api_level(&self) -> ApiLevel {
        (**self).api_level()
    }

    fn is_granted(&self, permission: Permission) -> bool {
        (**self).is_granted(permission)
    }

    fn should_show_rationale(&self, permission: Permission) -> bool {
        (**self).should_show_rationale(permission)
    }

    fn request(
        &self,
        permissions: &[Permission],
    ) -> impl Future<Output = Result<Vec<(Permission, bool)>, PermissionError>> + Send {
        (**self).request(permissions)
    }
}

impl<T: PermissionPlatform + ?Sized> PermissionPlatform for Arc<T> {
    fn api_level(&self) -> ApiLevel {
        (**self).api_level()
    }

    fn is_granted(&self, permission: Permission) -> bool {
        (**self).is_granted(permission)
    }

    fn should_show_rationale(&self, permission: Permission) -> bool {
        (**self).should_show_rationale(permission)
    }

    fn request(
        &self,
        permissions: &[Permission],
    ) -> impl Future<Output = Result<Vec<(Permission, bool)>, PermissionError>> + Send {
        (**self).request(permissions)
    }
}

impl<T: RecoveryUi + ?Sized> RecoveryUi for &T {
    fn show_rationale(&self, notice: &RationaleNotice) -> impl Future<Output = bool> + Send {
        (**self).show_rationale(notice)
    }

    fn show_feature_limited(
        &self,
        notice: &FeatureLimitedNotice,
    ) -> impl Future<Output = FeatureLimitedAction> + Send {
        (**self).show_feature_limited(notice)
    }
}

impl<T: RecoveryUi + ?Sized> RecoveryUi for Arc<T> {
    fn show_rationale(&self, notice: &RationaleNotice) -> impl Future<Output = bool> + Send {
        (**self).show_rationale(notice)
    }

    fn show_feature_limited(
        &self,
        notice: &FeatureLimitedNotice,
    ) -> impl Future<Output = FeatureLimitedAction> + Send {
        (**self).show_feature_limited(notice)
    }
}

impl<T: AppControl + ?Sized> AppControl for &T {
    fn open_app_settings(&self) {
        (**self).open_app_settings();
    }

    fn exit_app(&self) {
        (**self).exit_app();
    }
}

impl<T: AppControl + ?Sized> AppControl for Arc<T> {
    fn open_app_settings(&self) {
        (**self).open_app_settings();
    }

    fn exit_app(&self) {
        (**self).exit_app();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_set_below_tiramisu() {
        let set = PermissionSet::for_api_level(ApiLevel(32));
        assert_eq!(
            set.as_slice(),
            &[
                Permission::Network,
                Permission::Camera,
                Permission::FineLocation,
                Permission::CoarseLocation,
            ]
        );
    }

    #[test]
    fn media_and_notifications_from_tiramisu() {
        let set = PermissionSet::for_api_level(ApiLevel::TIRAMISU);
        assert_eq!(set.len(), 6);
        assert_eq!(set.as_slice()[4], Permission::MediaImages);
        assert_eq!(set.as_slice()[5], Permission::Notifications);
        assert!(PermissionSet::for_api_level(ApiLevel(34)).contains(Permission::Notifications));
    }

    #[test]
    fn manifest_names_parse_back() {
        for permission in Permission::ALL {
            assert_eq!(
                Permission::from_manifest_name(permission.manifest_name()),
                Some(permission)
            );
        }
        assert_eq!(Permission::from_manifest_name("android.permission.RECORD_AUDIO"), None);
    }

    #[test]
    fn outcome_classification() {
        assert_eq!(PermissionOutcome::classify(true, true), PermissionOutcome::Granted);
        assert_eq!(
            PermissionOutcome::classify(false, true),
            PermissionOutcome::DeniedTemporarily
        );
        assert_eq!(
            PermissionOutcome::classify(false, false),
            PermissionOutcome::DeniedPermanently
        );
    }
}
