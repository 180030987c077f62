use log::{debug, info, warn};

use crate::{
    AppControl, FeatureLimitedAction, FeatureLimitedNotice, NegotiationResult, Permission,
    PermissionCallback, PermissionOutcome, PermissionPlatform, PermissionSet, RationaleNotice,
    RecoveryUi,
};

/// Negotiates the shell's permission set with the OS.
///
/// A negotiation either finishes immediately because everything is granted,
/// or issues an OS request (optionally preceded by a rationale prompt),
/// classifies the answer and, for anything still denied, walks the user
/// through the recovery prompts. Each call to [`negotiate`](Self::negotiate)
/// is a single attempt; call it again after the user returns from settings.
#[derive(Debug)]
pub struct PermissionCoordinator<P, U, C> {
    platform: P,
    ui: U,
    control: C,
    app_label: String,
}

impl<P, U, C> PermissionCoordinator<P, U, C>
where
    P: PermissionPlatform,
    U: RecoveryUi,
    C: AppControl,
{
    /// Create a coordinator over the given platform, prompt presenter and app control.
    pub fn new(platform: P, ui: U, control: C) -> Self {
        Self {
            platform,
            ui,
            control,
            app_label: "Feeling".to_string(),
        }
    }

    /// Set the application name used in the settings instructions.
    #[must_use]
    pub fn with_app_label(mut self, label: impl Into<String>) -> Self {
        self.app_label = label.into();
        self
    }

    /// The permissions this platform requires.
    pub fn candidates(&self) -> PermissionSet {
        PermissionSet::for_api_level(self.platform.api_level())
    }

    /// Current OS classification of `permission`.
    pub fn outcome(&self, permission: Permission) -> PermissionOutcome {
        let granted = self.platform.is_granted(permission);
        let rationale = !granted && self.platform.should_show_rationale(permission);
        PermissionOutcome::classify(granted, rationale)
    }

    /// Run one negotiation and report the result to `callback` exactly once,
    /// after every prompt has been answered.
    pub async fn negotiate_with(&self, callback: &impl PermissionCallback) -> NegotiationResult {
        let result = self.negotiate().await;
        result.dispatch(callback);
        result
    }

    /// Run one negotiation.
    pub async fn negotiate(&self) -> NegotiationResult {
        let candidates = self.candidates();
        let missing: Vec<Permission> = candidates
            .iter()
            .filter(|p| !self.platform.is_granted(*p))
            .collect();

        if missing.is_empty() {
            debug!("all {} permissions already granted", candidates.len());
            return NegotiationResult::AllGranted;
        }

        let mut pending = if self.any_rationale(&missing) {
            let notice = RationaleNotice::new(candidates.as_slice());
            if !self.ui.show_rationale(&notice).await {
                info!("rationale declined, not requesting permissions");
                return self.limit_features(missing).await;
            }
            candidates.as_slice().to_vec()
        } else {
            missing
        };

        loop {
            let denied = self.request(&pending).await;
            if denied.is_empty() {
                return NegotiationResult::AllGranted;
            }

            if self.any_rationale(&denied)
                && self.ui.show_rationale(&RationaleNotice::new(&denied)).await
            {
                pending = denied;
                continue;
            }

            return self.limit_features(denied).await;
        }
    }

    /// Issue the OS request and return what was denied.
    async fn request(&self, permissions: &[Permission]) -> Vec<Permission> {
        let answers = match self.platform.request(permissions).await {
            Ok(answers) => answers,
            Err(err) => {
                warn!("permission request failed: {err}");
                Vec::new()
            }
        };

        permissions
            .iter()
            .copied()
            .filter(|permission| {
                let granted = answers
                    .iter()
                    .any(|(answered, granted)| answered == permission && *granted);
                debug!(
                    "{permission} is {}",
                    if granted { "granted" } else { "denied" }
                );
                !granted
            })
            .collect()
    }

    /// Show the feature-limited notice and act on the user's choice.
    ///
    /// The notice lists only the permissions the OS will no longer prompt for.
    async fn limit_features(&self, denied: Vec<Permission>) -> NegotiationResult {
        let permanent: Vec<Permission> = denied
            .iter()
            .copied()
            .filter(|p| !self.platform.should_show_rationale(*p))
            .collect();

        let notice = FeatureLimitedNotice::new(self.app_label.as_str(), &permanent);
        match self.ui.show_feature_limited(&notice).await {
            FeatureLimitedAction::Dismiss => {}
            FeatureLimitedAction::OpenSettings => self.control.open_app_settings(),
            FeatureLimitedAction::ExitApp => self.control.exit_app(),
        }

        NegotiationResult::SomeDenied(denied)
    }

    fn any_rationale(&self, permissions: &[Permission]) -> bool {
        permissions
            .iter()
            .any(|p| self.platform.should_show_rationale(*p))
    }
}
