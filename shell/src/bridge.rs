use std::sync::Arc;

use feeling_location::{LocationBackend, LocationTracker, UNKNOWN_POSITION};
use feeling_permission::AppControl;
use log::info;

/// What page scripts get when no position is known.
pub const LOCATION_UNAVAILABLE: &str = "Unable to get location";

/// The methods exposed to page scripts.
///
/// Everything here is reachable from untrusted web content, so every method
/// returns a usable value and never fails.
#[derive(Debug)]
pub struct WebAppBridge<B, C> {
    tracker: Arc<LocationTracker<B>>,
    control: C,
}

impl<B: LocationBackend, C: AppControl> WebAppBridge<B, C> {
    /// Create a bridge over `tracker`.
    pub const fn new(tracker: Arc<LocationTracker<B>>, control: C) -> Self {
        Self { tracker, control }
    }

    /// Current position as `latitude,longitude`, or [`LOCATION_UNAVAILABLE`].
    pub fn get_current_location(&self) -> String {
        let location = self.tracker.current_position_string();
        if location == UNKNOWN_POSITION || location.is_empty() {
            LOCATION_UNAVAILABLE.to_string()
        } else {
            location
        }
    }

    /// Great-circle distance in kilometers.
    #[must_use]
    pub fn calculate_distance(&self, lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
        LocationTracker::<B>::distance_km(lat1, lon1, lat2, lon2)
    }

    /// Close the application.
    pub fn exit_app(&self) {
        info!("exit requested by web content");
        self.control.exit_app();
    }
}
