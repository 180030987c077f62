use std::fmt::Write as _;

use crate::Permission;

/// What the user picked in the feature-limited notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureLimitedAction {
    /// Close the notice and keep using the app.
    Dismiss,
    /// Close the application.
    ExitApp,
    /// Jump to the application's settings screen.
    OpenSettings,
}

/// Content of the rationale prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RationaleNotice {
    /// Title of the prompt.
    pub title: String,
    /// Permissions the prompt explains, in request order.
    pub permissions: Vec<Permission>,
}

impl RationaleNotice {
    /// Create a rationale prompt for `permissions`.
    #[must_use]
    pub fn new(permissions: &[Permission]) -> Self {
        Self {
            title: "Permissions needed".to_string(),
            permissions: permissions.to_vec(),
        }
    }

    /// Body text explaining each requested category.
    #[must_use]
    pub fn message(&self) -> String {
        let mut message = String::from("This app needs the following permissions:\n\n");
        message.push_str(&detail_lines(&self.permissions));
        message
    }
}

/// Content of the feature-limited notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureLimitedNotice {
    /// Title of the notice.
    pub title: String,
    /// Application name shown in the settings instructions.
    pub app_label: String,
    /// Permissions the OS will no longer prompt for. Empty when the user only
    /// declined the rationale.
    pub permissions: Vec<Permission>,
}

impl FeatureLimitedNotice {
    /// Create a notice listing `permissions`.
    #[must_use]
    pub fn new(app_label: impl Into<String>, permissions: &[Permission]) -> Self {
        Self {
            title: "Limited features".to_string(),
            app_label: app_label.into(),
            permissions: permissions.to_vec(),
        }
    }

    /// Whether any listed permission was permanently denied.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        !self.permissions.is_empty()
    }

    /// Body text: one justification line per permission, then the steps to
    /// grant them from the settings app.
    #[must_use]
    pub fn message(&self) -> String {
        let mut message = if self.is_permanent() {
            let mut message = String::from(
                "The following permissions were permanently denied, \
                 so some features of the app are limited:\n\n",
            );
            message.push_str(&detail_lines(&self.permissions));
            message
        } else {
            String::from(
                "Some permissions were not granted, so some features of the app are limited.",
            )
        };
        message.push_str("\n\nTo grant them, follow these steps:\n\n");
        message.push_str("1. Open the phone's Settings app.\n");
        message.push_str("2. Find and tap 'Apps' or 'Application manager'.\n");
        let _ = writeln!(message, "3. Find and tap '{}' in the app list.", self.app_label);
        message.push_str("4. Tap 'Permissions'.\n");
        message.push_str(if self.is_permanent() {
            "5. Turn on each permission listed above.\n\n"
        } else {
            "5. Turn on the permissions the app needs.\n\n"
        });
        message.push_str("Please restart the app after changing the permissions.");
        message
    }
}

fn detail_lines(permissions: &[Permission]) -> String {
    permissions
        .iter()
        .map(|p| format!("- {}: {}", p.label(), p.justification()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_limited_message_lists_only_given_permissions() {
        let notice = FeatureLimitedNotice::new("Feeling", &[Permission::Camera]);
        let message = notice.message();

        assert!(message.contains("- Camera: take photos and record videos"));
        assert!(!message.contains(Permission::FineLocation.justification()));
        assert!(message.contains("'Feeling'"));
    }

    #[test]
    fn feature_limited_without_permanent_denials() {
        let notice = FeatureLimitedNotice::new("Feeling", &[]);
        let message = notice.message();

        assert!(!notice.is_permanent());
        assert!(!message.contains("permanently"));
        assert!(message.contains("features of the app are limited"));
        assert!(!message.lines().any(|l| l.starts_with("- ")));
        assert!(message.contains("'Feeling'"));
    }

    #[test]
    fn rationale_message_has_one_line_per_permission() {
        let notice = RationaleNotice::new(&[Permission::FineLocation, Permission::Notifications]);
        let message = notice.message();

        assert_eq!(message.lines().filter(|l| l.starts_with("- ")).count(), 2);
    }
}
