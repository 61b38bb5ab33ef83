// src/store/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::challenge::{ChallengeRecord, ChallengeResult},
    store::{ChallengeStore, NewChallenge, SnapshotHub, apply_accept, apply_submission, build_challenge},
};

/// Process-local store. Used by tests and when no database is configured.
#[derive(Default)]
pub struct MemoryChallengeStore {
    records: RwLock<HashMap<Uuid, ChallengeRecord>>,
    hub: SnapshotHub,
}

impl MemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Challenges that still have a live snapshot channel.
    pub fn open_channels(&self) -> usize {
        self.hub.channel_count()
    }
}

#[async_trait]
impl ChallengeStore for MemoryChallengeStore {
    async fn create(&self, new: NewChallenge) -> Result<ChallengeRecord, AppError> {
        let record = build_challenge(new)?;
        self.records.write().await.insert(record.id, record.clone());
        tracing::info!(
            "Created {} challenge {} by {}",
            record.challenge_type,
            record.id,
            record.creator_id
        );
        Ok(record)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<ChallengeRecord>, AppError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn accept(&self, id: Uuid, participant_id: &str) -> Result<ChallengeRecord, AppError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or(AppError::NotFound("Challenge not found".to_string()))?;

        apply_accept(record, participant_id)?;
        let snapshot = record.clone();
        drop(records);

        self.hub.publish(&snapshot);
        Ok(snapshot)
    }

    async fn submit_result(
        &self,
        id: Uuid,
        result: ChallengeResult,
    ) -> Result<ChallengeRecord, AppError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or(AppError::NotFound("Challenge not found".to_string()))?;

        apply_submission(record, result)?;
        let snapshot = record.clone();
        drop(records);

        self.hub.publish(&snapshot);
        Ok(snapshot)
    }

    fn subscribe(&self, id: Uuid) -> broadcast::Receiver<ChallengeRecord> {
        self.hub.subscribe(id)
    }

    fn release(&self, id: Uuid) {
        self.hub.release(id);
    }
}
