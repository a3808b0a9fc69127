//! Membership tier definitions.
//!
//! Tiers form a total order used purely for access comparison:
//! free < driven < aspiring < breakthrough.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// Membership subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipTier {
    /// Community content only.
    Free,

    /// Entry paid plan.
    Driven,

    /// Mid paid plan.
    Aspiring,

    /// Full access.
    Breakthrough,

    /// The purchased product could not be mapped to a tier.
    /// Grants the same access as `Free`.
    Unknown,
}

impl MembershipTier {
    /// Tiers that can be required by content, in ascending rank.
    pub const ORDERED: [MembershipTier; 4] = [
        MembershipTier::Free,
        MembershipTier::Driven,
        MembershipTier::Aspiring,
        MembershipTier::Breakthrough,
    ];

    /// Returns the numeric rank of this tier for comparison.
    ///
    /// `Unknown` ranks with `Free`.
    pub fn rank(&self) -> u8 {
        match self {
            MembershipTier::Free | MembershipTier::Unknown => 0,
            MembershipTier::Driven => 1,
            MembershipTier::Aspiring => 2,
            MembershipTier::Breakthrough => 3,
        }
    }

    /// Returns true if this tier is a paid tier.
    pub fn is_paid(&self) -> bool {
        self.rank() > 0
    }

    /// Lowercase wire/storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipTier::Free => "free",
            MembershipTier::Driven => "driven",
            MembershipTier::Aspiring => "aspiring",
            MembershipTier::Breakthrough => "breakthrough",
            MembershipTier::Unknown => "unknown",
        }
    }

    /// Returns the display name for this tier.
    pub fn display_name(&self) -> &'static str {
        match self {
            MembershipTier::Free => "Free",
            MembershipTier::Driven => "Driven",
            MembershipTier::Aspiring => "Aspiring",
            MembershipTier::Breakthrough => "Breakthrough",
            MembershipTier::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for MembershipTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for MembershipTier {
    type Err = ValidationError;

    /// Case-insensitive parse of the storage representation.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(MembershipTier::Free),
            "driven" => Ok(MembershipTier::Driven),
            "aspiring" => Ok(MembershipTier::Aspiring),
            "breakthrough" => Ok(MembershipTier::Breakthrough),
            "unknown" => Ok(MembershipTier::Unknown),
            other => Err(ValidationError::invalid_format(
                "tier",
                format!("unknown tier '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_are_strictly_ordered() {
        let ranks: Vec<u8> = MembershipTier::ORDERED.iter().map(|t| t.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }

    #[test]
    fn unknown_ranks_as_free() {
        assert_eq!(MembershipTier::Unknown.rank(), MembershipTier::Free.rank());
        assert!(!MembershipTier::Unknown.is_paid());
    }

    #[test]
    fn paid_tiers() {
        assert!(!MembershipTier::Free.is_paid());
        assert!(MembershipTier::Driven.is_paid());
        assert!(MembershipTier::Aspiring.is_paid());
        assert!(MembershipTier::Breakthrough.is_paid());
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Aspiring".parse::<MembershipTier>().unwrap(), MembershipTier::Aspiring);
        assert_eq!(" BREAKTHROUGH ".parse::<MembershipTier>().unwrap(), MembershipTier::Breakthrough);
        assert!("gold".parse::<MembershipTier>().is_err());
    }

    #[test]
    fn tier_serializes_lowercase() {
        let json = serde_json::to_string(&MembershipTier::Driven).unwrap();
        assert_eq!(json, "\"driven\"");
    }

    #[test]
    fn tier_deserializes_from_lowercase() {
        let tier: MembershipTier = serde_json::from_str("\"breakthrough\"").unwrap();
        assert_eq!(tier, MembershipTier::Breakthrough);
    }

    #[test]
    fn as_str_matches_serde() {
        for tier in MembershipTier::ORDERED {
            let json = serde_json::to_string(&tier).unwrap();
            assert_eq!(json, format!("\"{}\"", tier.as_str()));
        }
    }
}
