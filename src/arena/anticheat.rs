// src/arena/anticheat.rs

use serde::Serialize;

use crate::{
    config::{FAST_ANSWERS_BLOCKED_MIN, FAST_ANSWERS_FLAGGED, MIN_HUMAN_ANSWER_MS},
    models::challenge::AnswerSubmission,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityStatus {
    Clean,
    Flagged,
    Blocked,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub status: IntegrityStatus,
    pub fast_answers: usize,
    pub total_answers: usize,
}

impl IntegrityReport {
    pub fn clean(total_answers: usize) -> Self {
        Self {
            status: IntegrityStatus::Clean,
            fast_answers: 0,
            total_answers,
        }
    }
}

/// Checks per-question timings for humanly implausible answer speed.
///
/// Callers pass the answers that are actually graded; see
/// [`counted_answers`](crate::arena::grading::counted_answers).
pub fn inspect_timings<'a, I>(answers: I) -> IntegrityReport
where
    I: IntoIterator<Item = &'a AnswerSubmission>,
{
    let (total_answers, fast_answers) = answers.into_iter().fold((0, 0), |(total, fast), a| {
        (total + 1, fast + usize::from(a.time_ms < MIN_HUMAN_ANSWER_MS))
    });

    let status = if total_answers >= FAST_ANSWERS_BLOCKED_MIN && fast_answers == total_answers {
        IntegrityStatus::Blocked
    } else if fast_answers >= FAST_ANSWERS_FLAGGED || (fast_answers > 0 && fast_answers * 2 >= total_answers) {
        IntegrityStatus::Flagged
    } else {
        IntegrityStatus::Clean
    };

    IntegrityReport {
        status,
        fast_answers,
        total_answers,
    }
}

/// Helper to check whether anticheat is disabled via env var
pub fn anticheat_disabled() -> bool {
    std::env::var("ANTICHEAT_DISABLED").unwrap_or_else(|_| "0".to_string()) == "1"
}
