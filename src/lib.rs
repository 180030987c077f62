//! # Feeling
//!
//! Native capability core for the Feeling app shell: a mobile host that shows
//! a remote web page and exposes a handful of device capabilities to it.
//!
//! ## Features
//!
//! - `permission`: runtime permission negotiation with rationale and
//!   feature-limited recovery prompts.
//! - `location`: two-provider location tracking with cached fallback and
//!   great-circle distance.
//! - `shell`: the host controller and the scripting-bridge surface (enables
//!   both of the above).
//!
//! Use the `full` feature to enable everything.
//!
//! ## Example
//!
//! ```toml
//! [dependencies]
//! feeling = { version = "0.1", features = ["location"] }
//! ```
//!
//! ```rust
//! # #[cfg(feature = "location")]
//! # fn main() {
//! use feeling::location::{distance_km, LocationTracker, sys::Unsupported};
//!
//! let tracker = LocationTracker::new(Unsupported);
//! tracker.start_updates();
//! assert_eq!(tracker.current_position_string(), "null");
//!
//! let km = distance_km(37.5665, 126.978, 35.1796, 129.0756);
//! assert!(km > 300.0 && km < 350.0);
//! # }
//! # #[cfg(not(feature = "location"))]
//! # fn main() {}
//! ```

#[cfg(feature = "location")]
pub use feeling_location as location;

#[cfg(feature = "permission")]
pub use feeling_permission as permission;

#[cfg(feature = "shell")]
pub use feeling_shell as shell;
