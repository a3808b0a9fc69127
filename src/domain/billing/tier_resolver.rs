//! Derives a membership tier from the purchased product.
//!
//! Resolution order:
//! 1. product metadata `tier` naming one of the four tiers (any case)
//! 2. case-insensitive substring match of the product name, checked as
//!    `breakthrough`, `aspiring`, `driven`, `free`
//! 3. `Unknown`

use std::collections::HashMap;

use super::tier::MembershipTier;

/// Metadata key carrying an explicit tier tag on the product.
pub const TIER_METADATA_KEY: &str = "tier";

const NAME_VOCABULARY: [(&str, MembershipTier); 4] = [
    ("breakthrough", MembershipTier::Breakthrough),
    ("aspiring", MembershipTier::Aspiring),
    ("driven", MembershipTier::Driven),
    ("free", MembershipTier::Free),
];

/// Derives the tier for a product.
///
/// Deterministic and side-effect free.
pub fn derive_tier(name: Option<&str>, metadata: &HashMap<String, String>) -> MembershipTier {
    if let Some(tier) = metadata
        .get(TIER_METADATA_KEY)
        .and_then(|value| value.parse::<MembershipTier>().ok())
        .filter(|tier| *tier != MembershipTier::Unknown)
    {
        return tier;
    }

    let Some(name) = name else {
        return MembershipTier::Unknown;
    };
    let name = name.to_lowercase();

    NAME_VOCABULARY
        .iter()
        .find(|(word, _)| name.contains(word))
        .map(|(_, tier)| *tier)
        .unwrap_or(MembershipTier::Unknown)
}
