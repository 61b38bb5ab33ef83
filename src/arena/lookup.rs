// src/arena/lookup.rs

use crate::models::challenge::ChallengeResult;

/// Finds the local participant's own result by strict id match.
///
/// Returns `None` when the id is absent, however many other results exist.
pub fn my_result<'a>(
    results: &'a [ChallengeResult],
    participant_id: &str,
) -> Option<&'a ChallengeResult> {
    results.iter().find(|r| r.participant_id == participant_id)
}
