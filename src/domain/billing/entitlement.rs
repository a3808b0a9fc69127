//! Tier gating.
//!
//! Pure functions over the mirrored subscription. No I/O.

use super::status::SubscriptionStatus;
use super::subscription::SubscriptionRecord;
use super::tier::MembershipTier;

/// Returns true if a member on `user_tier` may see content requiring
/// `required`.
///
/// Monotonic in `user_tier`: access granted to a tier is granted to every
/// tier ranked at or above it. A missing tier counts as free.
pub fn has_access(user_tier: Option<MembershipTier>, required: MembershipTier) -> bool {
    user_tier.unwrap_or(MembershipTier::Free).rank() >= required.rank()
}

/// Effective access of a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entitlements {
    /// Tier used for every access decision.
    pub tier: MembershipTier,
    /// Status of the mirrored subscription, if any.
    pub status: Option<SubscriptionStatus>,
    /// True when `tier` came from a session override.
    pub overridden: bool,
}

impl Entitlements {
    /// Resolves the effective tier.
    ///
    /// The override, when given, wins. Otherwise the mirrored tier applies
    /// only while its status grants access; a lapsed or missing subscription
    /// leaves the member on free.
    pub fn resolve(record: Option<&SubscriptionRecord>, preview: Option<MembershipTier>) -> Self {
        let status = record.map(|r| r.status);

        if let Some(tier) = preview {
            return Self {
                tier,
                status,
                overridden: true,
            };
        }

        let tier = match record {
            Some(r) if r.status.has_access() => r.tier,
            _ => MembershipTier::Free,
        };

        Self {
            tier,
            status,
            overridden: false,
        }
    }

    pub fn allows(&self, required: MembershipTier) -> bool {
        has_access(Some(self.tier), required)
    }

    /// Access decision for each orderable tier, lowest first.
    pub fn access_matrix(&self) -> [(MembershipTier, bool); 4] {
        MembershipTier::ORDERED.map(|required| (required, self.allows(required)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::subscription::test_support::snapshot;
    use crate::domain::foundation::Timestamp;
    use proptest::prelude::*;

    fn record(tier: MembershipTier, status: SubscriptionStatus) -> SubscriptionRecord {
        let mut record = SubscriptionRecord::from_snapshot(&snapshot("u1", "sub_1", 1), Timestamp::now());
        record.tier = tier;
        record.status = status;
        record
    }

    fn any_tier() -> impl Strategy<Value = MembershipTier> {
        prop_oneof![
            Just(MembershipTier::Free),
            Just(MembershipTier::Driven),
            Just(MembershipTier::Aspiring),
            Just(MembershipTier::Breakthrough),
            Just(MembershipTier::Unknown),
        ]
    }

    // ══════════════════════════════════════════════════════════════
    // has_access
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn same_tier_has_access() {
        for tier in MembershipTier::ORDERED {
            assert!(has_access(Some(tier), tier));
        }
    }

    #[test]
    fn lower_tier_is_denied() {
        assert!(!has_access(Some(MembershipTier::Driven), MembershipTier::Aspiring));
        assert!(!has_access(Some(MembershipTier::Free), MembershipTier::Driven));
    }

    #[test]
    fn missing_tier_is_treated_as_free() {
        assert!(has_access(None, MembershipTier::Free));
        assert!(!has_access(None, MembershipTier::Driven));
    }

    #[test]
    fn unknown_tier_only_sees_free_content() {
        assert!(has_access(Some(MembershipTier::Unknown), MembershipTier::Free));
        assert!(!has_access(Some(MembershipTier::Unknown), MembershipTier::Driven));
    }

    proptest! {
        #[test]
        fn access_is_monotonic_in_user_tier(
            user in any_tier(),
            higher in any_tier(),
            required in any_tier(),
        ) {
            prop_assume!(higher.rank() >= user.rank());
            if has_access(Some(user), required) {
                prop_assert!(has_access(Some(higher), required));
            }
        }

        #[test]
        fn access_matches_rank_comparison(user in any_tier(), required in any_tier()) {
            prop_assert_eq!(has_access(Some(user), required), user.rank() >= required.rank());
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Entitlements::resolve
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn no_record_resolves_to_free() {
        let e = Entitlements::resolve(None, None);
        assert_eq!(e.tier, MembershipTier::Free);
        assert_eq!(e.status, None);
        assert!(!e.overridden);
    }

    #[test]
    fn active_record_grants_its_tier() {
        let r = record(MembershipTier::Aspiring, SubscriptionStatus::Active);
        let e = Entitlements::resolve(Some(&r), None);
        assert_eq!(e.tier, MembershipTier::Aspiring);
        assert!(e.allows(MembershipTier::Driven));
        assert!(!e.allows(MembershipTier::Breakthrough));
    }

    #[test]
    fn canceling_record_keeps_access_until_period_end() {
        let r = record(MembershipTier::Breakthrough, SubscriptionStatus::Canceling);
        assert_eq!(Entitlements::resolve(Some(&r), None).tier, MembershipTier::Breakthrough);
    }

    #[test]
    fn canceled_record_falls_back_to_free() {
        let r = record(MembershipTier::Breakthrough, SubscriptionStatus::Canceled);
        let e = Entitlements::resolve(Some(&r), None);
        assert_eq!(e.tier, MembershipTier::Free);
        assert_eq!(e.status, Some(SubscriptionStatus::Canceled));
    }

    #[test]
    fn preview_override_wins() {
        let r = record(MembershipTier::Driven, SubscriptionStatus::Active);
        let e = Entitlements::resolve(Some(&r), Some(MembershipTier::Breakthrough));
        assert_eq!(e.tier, MembershipTier::Breakthrough);
        assert!(e.overridden);
    }

    #[test]
    fn access_matrix_lists_every_tier() {
        let r = record(MembershipTier::Driven, SubscriptionStatus::Trialing);
        let matrix = Entitlements::resolve(Some(&r), None).access_matrix();
        assert_eq!(
            matrix,
            [
                (MembershipTier::Free, true),
                (MembershipTier::Driven, true),
                (MembershipTier::Aspiring, false),
                (MembershipTier::Breakthrough, false),
            ]
        );
    }
}
