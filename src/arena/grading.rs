// src/arena/grading.rs

use std::collections::HashSet;

use crate::{
    arena::timer::is_expired,
    config::POINTS_PER_CORRECT,
    models::challenge::{AnswerSubmission, ChallengeQuestion, ChallengeRecord, ChallengeResult},
};

/// Strict comparison against the answer key, ignoring surrounding whitespace.
pub fn is_answer_correct(question: &ChallengeQuestion, answer: &str) -> bool {
    answer.trim() == question.answer.trim()
}

/// The answers that take part in grading: the first one per known question.
///
/// Timing checks run over the same list, so padding a submission with
/// unknown or repeated entries changes neither the score nor the verdict.
pub fn counted_answers<'a>(
    record: &'a ChallengeRecord,
    answers: &'a [AnswerSubmission],
) -> Vec<(&'a ChallengeQuestion, &'a AnswerSubmission)> {
    let mut seen = HashSet::new();
    answers
        .iter()
        .filter_map(|submitted| {
            let question = record.question(&submitted.question_id)?;
            seen.insert(question.id.as_str()).then_some((question, submitted))
        })
        .collect()
}

/// Builds a participant's result from their answers.
///
/// Only [`counted_answers`] are graded. An answer past the question's time limit
/// is scored as wrong, and its time is capped at the limit.
pub fn grade_submission(
    record: &ChallengeRecord,
    participant_id: &str,
    answers: &[AnswerSubmission],
) -> ChallengeResult {
    let mut correct_count = 0u32;
    let mut total_time_ms = 0u64;

    for (question, submitted) in counted_answers(record, answers) {
        total_time_ms += submitted.time_ms.min(question.time_limit_ms);

        if is_expired(submitted.time_ms, question.time_limit_ms) {
            continue;
        }
        if is_answer_correct(question, &submitted.answer) {
            correct_count += 1;
        }
    }

    let mut result = ChallengeResult {
        correct_count,
        ..ChallengeResult::new(participant_id, correct_count * POINTS_PER_CORRECT, total_time_ms)
    };
    result.accuracy = Some(result.accuracy_or_derived(record.questions.len()));
    result
}
