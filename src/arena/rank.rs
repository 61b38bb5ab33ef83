// src/arena/rank.rs

use std::cmp::Ordering;

use crate::models::challenge::{ChallengeResult, ChallengeType};

/// Outcome of a ranking attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankOutcome {
    /// Not enough results yet; ranks untouched.
    Deferred,
    /// Every result already carried a rank; ranks untouched.
    Settled,
    /// Ranks assigned with all expected participants present.
    Final,
    /// Ranks assigned before the other side reported. May be revised.
    Provisional,
}

/// Higher score first, then the faster run.
pub fn compare_results(a: &ChallengeResult, b: &ChallengeResult) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.total_time_ms.cmp(&b.total_time_ms))
}

/// Assigns dense 1-based ranks to a deduplicated result list.
///
/// Runs when every expected participant has reported, or provisionally for the
/// head-to-head modes once at least one result is in. A list whose entries are all
/// ranked is left alone. The list is reordered best-first when ranks are assigned.
pub fn assign_ranks(
    results: &mut [ChallengeResult],
    expected_participants: usize,
    challenge_type: ChallengeType,
) -> RankOutcome {
    if results.is_empty() {
        return RankOutcome::Deferred;
    }

    let all_present = results.len() >= expected_participants;
    if !all_present && !challenge_type.allows_provisional_rank() {
        return RankOutcome::Deferred;
    }

    if results.iter().all(ChallengeResult::is_ranked) {
        return RankOutcome::Settled;
    }

    // Stable, so fully tied runs keep arrival order.
    results.sort_by(compare_results);
    for (position, result) in results.iter_mut().enumerate() {
        result.rank = position as u32 + 1;
    }

    if all_present {
        RankOutcome::Final
    } else {
        RankOutcome::Provisional
    }
}
