//! Feature flags configuration

use serde::Deserialize;

/// Feature flags for enabling/disabling functionality
#[derive(Debug, Clone, Deserialize, Default)]
pub struct FeatureFlags {
    /// Honor the `previewTier` override on the entitlements endpoint
    #[serde(default)]
    pub allow_tier_preview: bool,
}
