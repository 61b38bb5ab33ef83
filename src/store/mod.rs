// src/store/mod.rs

pub mod memory;
pub mod postgres;

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    arena::rank::assign_ranks,
    config::SNAPSHOT_CHANNEL_CAPACITY,
    error::AppError,
    models::challenge::{
        ChallengeQuestion, ChallengeRecord, ChallengeResult, ChallengeStatus, ChallengeType,
    },
};

pub use memory::MemoryChallengeStore;
pub use postgres::PgChallengeStore;

/// Parameters for a new challenge.
#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub creator_id: String,
    pub challenge_type: ChallengeType,
    pub opponent_ids: Vec<String>,
    pub questions: Vec<ChallengeQuestion>,
}

/// The authoritative challenge-record data source.
///
/// Every mutation is a single-record read-modify-write and publishes the new
/// snapshot to subscribers of that challenge.
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn create(&self, new: NewChallenge) -> Result<ChallengeRecord, AppError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<ChallengeRecord>, AppError>;

    async fn accept(&self, id: Uuid, participant_id: &str) -> Result<ChallengeRecord, AppError>;

    async fn submit_result(
        &self,
        id: Uuid,
        result: ChallengeResult,
    ) -> Result<ChallengeRecord, AppError>;

    /// Receives every snapshot published after this call. Drop to unsubscribe.
    fn subscribe(&self, id: Uuid) -> broadcast::Receiver<ChallengeRecord>;

    /// Forgets the challenge's channel once its last receiver is gone.
    fn release(&self, id: Uuid);
}

/// Checks the shape of a new challenge and builds its initial record.
pub fn build_challenge(new: NewChallenge) -> Result<ChallengeRecord, AppError> {
    if new.questions.is_empty() {
        return Err(AppError::BadRequest(
            "A challenge needs at least one question".to_string(),
        ));
    }

    if new.challenge_type.is_solo() && !new.opponent_ids.is_empty() {
        return Err(AppError::BadRequest(format!(
            "{} challenges do not take opponents",
            new.challenge_type
        )));
    }
    if !new.challenge_type.is_solo() && new.opponent_ids.is_empty() {
        return Err(AppError::BadRequest(format!(
            "{} challenges need at least one opponent",
            new.challenge_type
        )));
    }

    let mut distinct = HashSet::new();
    for opponent in &new.opponent_ids {
        if opponent.is_empty() || *opponent == new.creator_id {
            return Err(AppError::BadRequest(format!(
                "Invalid opponent '{}'",
                opponent
            )));
        }
        if !distinct.insert(opponent.as_str()) {
            return Err(AppError::BadRequest(format!(
                "Opponent '{}' listed twice",
                opponent
            )));
        }
    }

    let mut question_ids = HashSet::new();
    for question in &new.questions {
        if !question_ids.insert(question.id.as_str()) {
            return Err(AppError::BadRequest(format!(
                "Question id '{}' is not unique",
                question.id
            )));
        }
    }

    Ok(ChallengeRecord::new(
        new.creator_id,
        new.challenge_type,
        new.opponent_ids,
        new.questions,
    ))
}

/// Opponent acceptance. Only moves a pending record forward.
pub fn apply_accept(record: &mut ChallengeRecord, participant_id: &str) -> Result<(), AppError> {
    if !record.opponent_ids.iter().any(|id| id == participant_id) {
        return Err(AppError::Forbidden(
            "Only an invited opponent can accept this challenge".to_string(),
        ));
    }

    if record.status == ChallengeStatus::Pending {
        record.status = ChallengeStatus::Accepted;
        record.updated_at = Utc::now();
    }
    Ok(())
}

/// Records one participant's result on the shared record.
///
/// At most one submission per participant. The submission that completes the
/// roster also settles final ranks.
pub fn apply_submission(
    record: &mut ChallengeRecord,
    mut result: ChallengeResult,
) -> Result<(), AppError> {
    if !record.is_participant(&result.participant_id) {
        return Err(AppError::Forbidden(
            "Not a participant of this challenge".to_string(),
        ));
    }
    if record.has_submitted(&result.participant_id) {
        return Err(AppError::Conflict(
            "Result already submitted for this participant".to_string(),
        ));
    }
    if record.status == ChallengeStatus::Completed {
        return Err(AppError::Conflict("Challenge already completed".to_string()));
    }

    // Ranks are only ever settled here.
    result.rank = 0;
    record.results.push(result);

    if record.finished_participant_count() >= record.expected_participant_count() {
        record.status = ChallengeStatus::Completed;
        let expected = record.expected_participant_count();
        let challenge_type = record.challenge_type;
        assign_ranks(&mut record.results, expected, challenge_type);
    } else {
        record.status = ChallengeStatus::InProgress;
    }
    record.updated_at = Utc::now();
    Ok(())
}

/// Per-challenge broadcast channels for snapshot fan-out.
#[derive(Default)]
pub struct SnapshotHub {
    channels: Mutex<HashMap<Uuid, broadcast::Sender<ChallengeRecord>>>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, id: Uuid) -> broadcast::Receiver<ChallengeRecord> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.retain(|_, sender| sender.receiver_count() > 0);
        channels
            .entry(id)
            .or_insert_with(|| broadcast::channel(SNAPSHOT_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    pub fn publish(&self, record: &ChallengeRecord) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let Some(sender) = channels.get(&record.id) else {
            return;
        };

        if sender.receiver_count() == 0 || sender.send(record.clone()).is_err() {
            // Nobody listening any more.
            channels.remove(&record.id);
        } else {
            tracing::debug!(
                "Published snapshot of challenge {} ({} results)",
                record.id,
                record.results.len()
            );
        }
    }

    pub fn release(&self, id: Uuid) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        if channels.get(&id).is_some_and(|sender| sender.receiver_count() == 0) {
            channels.remove(&id);
            tracing::debug!("Released snapshot channel of challenge {}", id);
        }
    }

    /// Number of challenges with an open snapshot channel.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
