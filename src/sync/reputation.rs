//! Reputation scoring policy.
//!
//! The 0-100 score is business policy, not a computed formula, so it is
//! kept as an ordered table of `(matcher, score)` pairs evaluated
//! top-down: the first matching row wins.

use crate::types::SellerReputation;

/// Score for sellers with no reputation data at all.
pub const DEFAULT_REPUTATION: u8 = 70;

/// One way a reputation payload can match a tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TierMatch {
    /// Any non-empty power-seller grade.
    PowerSeller,
    /// `level_id` starting with the given digit (`5_green`, `4_light_green`, ...).
    LevelPrefix(char),
    /// A `level_id` is present but matched no known prefix.
    AnyLevel,
}

/// The policy table. Order matters: rows are tried top-down.
pub const REPUTATION_TABLE: &[(TierMatch, u8)] = &[
    (TierMatch::PowerSeller, 95),
    (TierMatch::LevelPrefix('5'), 90),
    (TierMatch::LevelPrefix('4'), 85),
    (TierMatch::LevelPrefix('3'), 80),
    (TierMatch::LevelPrefix('2'), 75),
    (TierMatch::LevelPrefix('1'), 70),
    (TierMatch::AnyLevel, 75),
];

fn applies(matcher: TierMatch, reputation: &SellerReputation) -> bool {
    match matcher {
        TierMatch::PowerSeller => reputation
            .power_seller_status
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty()),
        TierMatch::LevelPrefix(digit) => reputation
            .level_id
            .as_deref()
            .is_some_and(|level| level.starts_with(digit)),
        TierMatch::AnyLevel => reputation.level_id.is_some(),
    }
}

/// Score a seller's reputation payload against the policy table.
pub fn score(reputation: Option<&SellerReputation>) -> u8 {
    let Some(reputation) = reputation else {
        return DEFAULT_REPUTATION;
    };
    for (matcher, score) in REPUTATION_TABLE {
        if applies(*matcher, reputation) {
            return *score;
        }
    }
    DEFAULT_REPUTATION
}
