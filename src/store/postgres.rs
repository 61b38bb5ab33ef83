// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction, types::Json};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::challenge::{ChallengeQuestion, ChallengeRecord, ChallengeResult},
    store::{ChallengeStore, NewChallenge, SnapshotHub, apply_accept, apply_submission, build_challenge},
};

/// Represents the 'challenges' table in the database.
#[derive(Debug, FromRow)]
struct ChallengeRow {
    id: Uuid,
    creator_id: String,
    opponent_ids: Json<Vec<String>>,
    challenge_type: String,
    status: String,
    questions: Json<Vec<ChallengeQuestion>>,
    results: Json<Vec<ChallengeResult>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ChallengeRow> for ChallengeRecord {
    type Error = AppError;

    fn try_from(row: ChallengeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            creator_id: row.creator_id,
            opponent_ids: row.opponent_ids.0,
            challenge_type: row
                .challenge_type
                .parse()
                .map_err(AppError::InternalServerError)?,
            status: row.status.parse().map_err(AppError::InternalServerError)?,
            questions: row.questions.0,
            results: row.results.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_CHALLENGE: &str = r#"
    SELECT id, creator_id, opponent_ids, challenge_type, status,
           questions, results, created_at, updated_at
    FROM challenges
    WHERE id = $1
"#;

/// Postgres-backed store. Snapshots fan out through an in-process hub.
pub struct PgChallengeStore {
    pool: PgPool,
    hub: SnapshotHub,
}

impl PgChallengeStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            hub: SnapshotHub::new(),
        }
    }

    /// Loads a record inside `tx` with its row locked until commit.
    async fn lock_record(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<ChallengeRecord, AppError> {
        let query = format!("{} FOR UPDATE", SELECT_CHALLENGE);
        let row = sqlx::query_as::<_, ChallengeRow>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(AppError::NotFound("Challenge not found".to_string()))?;

        row.try_into()
    }

    async fn write_record(
        tx: &mut Transaction<'_, Postgres>,
        record: &ChallengeRecord,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE challenges
            SET status = $2, results = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(record.status.as_str())
        .bind(Json(&record.results))
        .bind(record.updated_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update challenge {}: {:?}", record.id, e);
            AppError::InternalServerError(e.to_string())
        })?;
        Ok(())
    }
}

#[async_trait]
impl ChallengeStore for PgChallengeStore {
    async fn create(&self, new: NewChallenge) -> Result<ChallengeRecord, AppError> {
        let record = build_challenge(new)?;

        sqlx::query(
            r#"
            INSERT INTO challenges
                (id, creator_id, opponent_ids, challenge_type, status, questions, results, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id)
        .bind(&record.creator_id)
        .bind(Json(&record.opponent_ids))
        .bind(record.challenge_type.as_str())
        .bind(record.status.as_str())
        .bind(Json(&record.questions))
        .bind(Json(&record.results))
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert challenge: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        tracing::info!(
            "Created {} challenge {} by {}",
            record.challenge_type,
            record.id,
            record.creator_id
        );
        Ok(record)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<ChallengeRecord>, AppError> {
        let row = sqlx::query_as::<_, ChallengeRow>(SELECT_CHALLENGE)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ChallengeRecord::try_from).transpose()
    }

    async fn accept(&self, id: Uuid, participant_id: &str) -> Result<ChallengeRecord, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut record = Self::lock_record(&mut tx, id).await?;

        apply_accept(&mut record, participant_id)?;
        Self::write_record(&mut tx, &record).await?;
        tx.commit().await?;

        self.hub.publish(&record);
        Ok(record)
    }

    async fn submit_result(
        &self,
        id: Uuid,
        result: ChallengeResult,
    ) -> Result<ChallengeRecord, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut record = Self::lock_record(&mut tx, id).await?;

        apply_submission(&mut record, result)?;
        Self::write_record(&mut tx, &record).await?;
        tx.commit().await?;

        self.hub.publish(&record);
        Ok(record)
    }

    fn subscribe(&self, id: Uuid) -> broadcast::Receiver<ChallengeRecord> {
        self.hub.subscribe(id)
    }

    fn release(&self, id: Uuid) {
        self.hub.release(id);
    }
}
