// src/arena/merge.rs

use std::collections::HashSet;

use crate::models::challenge::ChallengeResult;

/// Merges the authoritative results with locally held ones.
///
/// Authoritative entries are seeded first and win every field they carry. A local
/// entry for a participant already present only fills fields the authoritative
/// entry lacks; a local entry for an unknown participant is appended. The output
/// holds at most one entry per `participant_id`.
pub fn merge_results(
    authoritative: &[ChallengeResult],
    local: &[ChallengeResult],
) -> Vec<ChallengeResult> {
    let mut merged = dedup_results(authoritative.to_vec());

    for entry in local {
        match merged
            .iter_mut()
            .find(|r| r.participant_id == entry.participant_id)
        {
            Some(existing) => fill_missing(existing, entry),
            None => merged.push(entry.clone()),
        }
    }

    dedup_results(merged)
}

/// Keeps the first occurrence of every participant, preserving order.
pub fn dedup_results(results: Vec<ChallengeResult>) -> Vec<ChallengeResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(r.participant_id.clone()))
        .collect()
}

fn fill_missing(target: &mut ChallengeResult, source: &ChallengeResult) {
    if target.display_name.is_empty() {
        target.display_name = source.display_name.clone();
    }
    if target.affiliation.is_none() {
        target.affiliation = source.affiliation.clone();
    }
    if target.accuracy.is_none() {
        target.accuracy = source.accuracy;
    }
    if target.rating_change.is_none() {
        target.rating_change = source.rating_change;
    }
    if target.coins_earned.is_none() {
        target.coins_earned = source.coins_earned;
    }
}
