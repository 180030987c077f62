//! Host side of the Feeling app shell.
//!
//! [`AppShell`] plays the role of the hosting activity: it runs the permission
//! negotiation on launch, starts location tracking once everything is
//! granted, and hands out a [`WebAppBridge`] for the web page's scripting
//! bridge. [`ShellConfig`] carries the settings the embedding layer needs.

#![warn(missing_docs)]

mod app;
mod bridge;
mod config;

pub use app::{AppShell, BACK_NAVIGATION_SCRIPT};
pub use bridge::{LOCATION_UNAVAILABLE, WebAppBridge};
pub use config::{LocationUpdateConfig, ShellConfig};

/// Errors that can occur while setting up the shell.
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    /// The configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    /// The configuration parsed but a value is unusable.
    #[error("invalid configuration value: {0}")]
    Invalid(String),
}
