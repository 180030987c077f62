use std::sync::Arc;

use feeling_location::{LocationBackend, LocationTracker};
use feeling_permission::{
    AppControl, NegotiationResult, Permission, PermissionCallback, PermissionCoordinator,
    PermissionPlatform, RecoveryUi,
};
use log::{debug, info};

use crate::{ShellConfig, WebAppBridge};

/// Script the host evaluates on back navigation. The page answers `"exit"`
/// to close the app; anything else is handled by the page itself.
pub const BACK_NAVIGATION_SCRIPT: &str = "window.handleBackButton && window.handleBackButton();";

/// Wires permission negotiation, location tracking and the web bridge together.
#[derive(Debug)]
pub struct AppShell<P, U, C, B> {
    config: ShellConfig,
    coordinator: PermissionCoordinator<P, U, C>,
    tracker: Arc<LocationTracker<B>>,
    control: C,
}

impl<P, U, C, B> AppShell<P, U, C, B>
where
    P: PermissionPlatform,
    U: RecoveryUi,
    C: AppControl + Clone,
    B: LocationBackend,
{
    /// Create a shell. Nothing is requested or started until [`launch`](Self::launch).
    pub fn new(config: ShellConfig, platform: P, ui: U, control: C, backend: B) -> Self {
        let coordinator = PermissionCoordinator::new(platform, ui, control.clone())
            .with_app_label(config.app_label.as_str());
        let tracker = Arc::new(LocationTracker::with_config(
            backend,
            config.update_config(),
        ));

        Self {
            config,
            coordinator,
            tracker,
            control,
        }
    }

    /// The shell's configuration.
    pub const fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// The location tracker shared with the bridge.
    pub const fn tracker(&self) -> &Arc<LocationTracker<B>> {
        &self.tracker
    }

    /// A bridge for the page's scripting interface.
    pub fn bridge(&self) -> WebAppBridge<B, C> {
        WebAppBridge::new(Arc::clone(&self.tracker), self.control.clone())
    }

    /// Negotiate permissions; location tracking starts if everything is granted.
    ///
    /// Call again after the user returns from the settings screen.
    pub async fn launch(&self) -> NegotiationResult {
        info!("loading {}", self.config.start_url);
        self.coordinator.negotiate_with(self).await
    }

    /// Act on the page's answer to [`BACK_NAVIGATION_SCRIPT`]. Returns `true`
    /// if the app is closing.
    pub fn handle_back_result(&self, result: &str) -> bool {
        if result.trim().trim_matches('"') == "exit" {
            self.control.exit_app();
            true
        } else {
            false
        }
    }

    /// Stop location updates.
    pub fn shutdown(&self) {
        self.tracker.stop_updates();
    }
}

impl<P, U, C, B> PermissionCallback for AppShell<P, U, C, B>
where
    B: LocationBackend,
{
    fn on_all_permissions_granted(&self) {
        debug!("all permissions granted, starting location updates");
        self.tracker.start_updates();
    }

    fn on_some_permissions_denied(&self, denied: &[Permission]) {
        let names: Vec<&str> = denied.iter().map(|p| p.manifest_name()).collect();
        info!("some permissions were denied: {}", names.join(", "));
    }
}
