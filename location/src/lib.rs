//! Best-effort device location.
//!
//! [`LocationTracker`] subscribes to the GPS and network providers, keeps the
//! most recent reading from either, and seeds itself from the providers'
//! cached fixes so a position is available before the first live update.
//! [`distance_km`] computes great-circle distances.

#![warn(missing_docs)]

mod tracker;

/// Platform-specific implementations.
pub mod sys;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use tracker::{LocationTracker, UNKNOWN_POSITION};

/// Mean Earth radius used by [`distance_km`].
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Position {
    /// Create a position.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to `other` in kilometers.
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        distance_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Renders `latitude,longitude`. Whole degrees keep their fractional part
/// (`127.0`), matching what the web app parses.
impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?},{:?}", self.latitude, self.longitude)
    }
}

/// A location source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Satellite positioning.
    Gps,
    /// Cell and Wi-Fi positioning.
    Network,
}

impl Provider {
    /// Both providers, in fallback order.
    pub const ALL: [Self; 2] = [Self::Gps, Self::Network];

    /// Platform name of the provider.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gps => "gps",
            Self::Network => "network",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single live fix delivered by a provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderReading {
    /// Where the fix came from.
    pub provider: Provider,
    /// The reported position.
    pub position: Position,
}

/// Thresholds for live updates. Whichever is crossed first triggers an update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateConfig {
    /// Minimum time between updates.
    pub min_interval: Duration,
    /// Minimum displacement between updates, in meters.
    pub min_distance_m: f32,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(5),
            min_distance_m: 10.0,
        }
    }
}

/// Errors that can occur when accessing location.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LocationError {
    /// The provider is disabled on the device.
    #[error("location provider {0} is disabled")]
    ProviderUnavailable(Provider),
    /// The OS rejected the subscription.
    #[error("subscribing to {provider} failed: {reason}")]
    SubscriptionFailed {
        /// Provider that was being subscribed to.
        provider: Provider,
        /// What the platform reported.
        reason: String,
    },
    /// Location permission was not granted.
    #[error("location permission denied")]
    PermissionDenied,
    /// The platform API failed.
    #[error("platform error: {0}")]
    Platform(String),
}

/// Receives live readings from a backend subscription.
pub trait LocationDelegate: Send + Sync {
    /// A provider delivered a fix.
    fn on_reading(&self, reading: ProviderReading);
}

/// OS location-provider primitives.
pub trait LocationBackend {
    /// Whether `provider` is enabled.
    fn is_provider_enabled(&self, provider: Provider) -> bool;

    /// Start delivering readings from `provider` to `delegate`.
    ///
    /// # Errors
    /// Returns a [`LocationError`] if the OS rejects the subscription.
    fn subscribe(
        &self,
        provider: Provider,
        config: &UpdateConfig,
        delegate: Arc<dyn LocationDelegate>,
    ) -> Result<(), LocationError>;

    /// Stop delivering readings from `provider`.
    fn unsubscribe(&self, provider: Provider);

    /// The provider's cached fix, if it has one.
    fn last_known_location(&self, provider: Provider) -> Option<Position>;
}

impl<T: LocationBackend + ?Sized> LocationBackend for &T {
    fn is_provider_enabled(&self, provider: Provider) -> bool {
        (**self).is_provider_enabled(provider)
    }

    fn subscribe(
        &self,
        provider: Provider,
        config: &UpdateConfig,
        delegate: Arc<dyn LocationDelegate>,
    ) -> Result<(), LocationError> {
        (**self).subscribe(provider, config, delegate)
    }

    fn unsubscribe(&self, provider: Provider) {
        (**self).unsubscribe(provider);
    }

    fn last_known_location(&self, provider: Provider) -> Option<Position> {
        (**self).last_known_location(provider)
    }
}

impl<T: LocationBackend + ?Sized> LocationBackend for Arc<T> {
    fn is_provider_enabled(&self, provider: Provider) -> bool {
        (**self).is_provider_enabled(provider)
    }

    fn subscribe(
        &self,
        provider: Provider,
        config: &UpdateConfig,
        delegate: Arc<dyn LocationDelegate>,
    ) -> Result<(), LocationError> {
        (**self).subscribe(provider, config, delegate)
    }

    fn unsubscribe(&self, provider: Provider) {
        (**self).unsubscribe(provider);
    }

    fn last_known_location(&self, provider: Provider) -> Option<Position> {
        (**self).last_known_location(provider)
    }
}

/// Great-circle distance in kilometers between two coordinates, by the
/// haversine formula on a sphere of radius [`EARTH_RADIUS_KM`].
///
/// Inputs are not range-checked.
#[must_use]
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero() {
        for lat in [-89.0, -45.5, 0.0, 12.34, 90.0] {
            assert!(distance_km(lat, 127.0, lat, 127.0).abs() < 1e-9);
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let pairs = [
            ((37.5665, 126.978), (35.1796, 129.0756)),
            ((-33.8688, 151.2093), (51.5074, -0.1278)),
            ((0.0, 179.5), (0.0, -179.5)),
        ];
        for ((lat1, lon1), (lat2, lon2)) in pairs {
            let there = distance_km(lat1, lon1, lat2, lon2);
            let back = distance_km(lat2, lon2, lat1, lon1);
            assert!((there - back).abs() < 1e-9);
        }
    }

    #[test]
    fn one_degree_of_longitude_at_equator() {
        let d = distance_km(0.0, 0.0, 0.0, 1.0);
        assert!((d - 111.19).abs() < 0.5, "got {d}");
    }

    #[test]
    fn london_to_new_york() {
        let d = distance_km(51.5007, 0.1246, 40.6892, 74.0445);
        assert!((d - 5570.0).abs() < 20.0, "got {d}");
    }

    #[test]
    fn out_of_range_inputs_still_compute() {
        assert!(distance_km(200.0, 400.0, -200.0, -400.0).is_finite());
    }

    #[test]
    fn position_display_keeps_fraction() {
        assert_eq!(Position::new(37.5, 127.0).to_string(), "37.5,127.0");
        assert_eq!(Position::new(-33.8688, 151.2093).to_string(), "-33.8688,151.2093");
    }

    #[test]
    fn error_messages() {
        let err = LocationError::Platform("attach_current_thread: detached".into());
        assert_eq!(err.to_string(), "platform error: attach_current_thread: detached");

        let err = LocationError::SubscriptionFailed {
            provider: Provider::Gps,
            reason: "SecurityException".into(),
        };
        assert_eq!(err.to_string(), "subscribing to gps failed: SecurityException");
    }
}
