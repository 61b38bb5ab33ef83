// src/arena/gate.rs

use serde::Serialize;

use crate::{config::BOT_ID_PREFIX, models::challenge::ChallengeType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    Waiting,
    Reveal,
}

/// Automated opponents are recognised by a reserved id prefix.
pub fn is_bot(participant_id: &str) -> bool {
    participant_id.starts_with(BOT_ID_PREFIX)
}

/// Decides whether the local viewer may see results now.
///
/// Solo modes reveal at once, a full house reveals, and a quick match against
/// automated opponents only reveals without waiting.
pub fn decide_reveal(
    challenge_type: ChallengeType,
    expected_participants: usize,
    finished_participants: usize,
    opponent_ids: &[String],
) -> GateDecision {
    if challenge_type.is_solo() {
        return GateDecision::Reveal;
    }

    if finished_participants >= expected_participants {
        return GateDecision::Reveal;
    }

    if challenge_type == ChallengeType::Quick
        && !opponent_ids.is_empty()
        && opponent_ids.iter().all(|id| is_bot(id))
    {
        return GateDecision::Reveal;
    }

    GateDecision::Waiting
}

/// Latches the gate: once revealed, stays revealed for the rest of the session.
#[derive(Debug, Clone, Default)]
pub struct RevealGate {
    revealed: bool,
}

impl RevealGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn evaluate(
        &mut self,
        challenge_type: ChallengeType,
        expected_participants: usize,
        finished_participants: usize,
        opponent_ids: &[String],
    ) -> GateDecision {
        if self.revealed {
            return GateDecision::Reveal;
        }

        let decision = decide_reveal(
            challenge_type,
            expected_participants,
            finished_participants,
            opponent_ids,
        );
        if decision == GateDecision::Reveal {
            self.revealed = true;
        }
        decision
    }
}
