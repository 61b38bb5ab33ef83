// src/handlers/challenge.rs

use std::{convert::Infallible, sync::Arc};

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::stream::{self, Stream};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    arena::{
        anticheat::{IntegrityReport, IntegrityStatus, anticheat_disabled, inspect_timings},
        grading::{counted_answers, grade_submission},
        session::{ArenaSession, SessionView, WatchHandle, watch},
    },
    error::AppError,
    models::challenge::{
        ChallengeRecord, CreateChallengeRequest, PublicChallenge, SubmitChallengeRequest,
    },
    store::{ChallengeStore, NewChallenge},
    utils::{html::clean_text, jwt::Claims},
};

type SharedStore = Arc<dyn ChallengeStore>;

/// Response for a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub view: SessionView,
    pub integrity: IntegrityReport,
}

async fn load_challenge(store: &SharedStore, id: Uuid) -> Result<ChallengeRecord, AppError> {
    store
        .fetch(id)
        .await?
        .ok_or(AppError::NotFound("Challenge not found".to_string()))
}

/// Creates a challenge owned by the caller.
pub async fn create_challenge(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateChallengeRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let record = store
        .create(NewChallenge {
            creator_id: claims.sub,
            challenge_type: req.challenge_type,
            opponent_ids: req.opponent_ids,
            questions: req.questions,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(PublicChallenge::from(&record))))
}

/// Public view of a challenge. Answer keys are never included.
pub async fn get_challenge(
    State(store): State<SharedStore>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let record = load_challenge(&store, id).await?;
    Ok(Json(PublicChallenge::from(&record)))
}

pub async fn accept_challenge(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let record = store.accept(id, &claims.sub).await?;
    tracing::info!("{} accepted challenge {}", claims.sub, id);
    Ok(Json(PublicChallenge::from(&record)))
}

/// Grades the caller's answers and records the result on the shared record.
///
/// * Rejects non-participants and repeat submissions before grading.
/// * Runs the timing checks; blocked submissions are refused.
/// * Returns the caller's reconciled view straight from the acknowledged record.
pub async fn submit_challenge(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitChallengeRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let record = load_challenge(&store, id).await?;
    if !record.is_participant(&claims.sub) {
        return Err(AppError::Forbidden(
            "Not a participant of this challenge".to_string(),
        ));
    }
    if record.has_submitted(&claims.sub) {
        return Err(AppError::Conflict(
            "Result already submitted for this participant".to_string(),
        ));
    }

    let counted = counted_answers(&record, &req.answers);
    let integrity = if anticheat_disabled() {
        IntegrityReport::clean(counted.len())
    } else {
        inspect_timings(counted.iter().map(|(_, answer)| *answer))
    };
    match integrity.status {
        IntegrityStatus::Blocked => {
            tracing::warn!(
                "Blocked submission: challenge={}, participant={}, fast_answers={}/{}",
                id,
                claims.sub,
                integrity.fast_answers,
                integrity.total_answers
            );
            return Err(AppError::BadRequest(
                "Submission rejected by integrity check".to_string(),
            ));
        }
        IntegrityStatus::Flagged => tracing::warn!(
            "Flagged submission: challenge={}, participant={}, fast_answers={}/{}",
            id,
            claims.sub,
            integrity.fast_answers,
            integrity.total_answers
        ),
        IntegrityStatus::Clean => {}
    }

    let display_name = clean_text(&req.display_name);
    if display_name.is_empty() {
        return Err(AppError::BadRequest("Display name is empty".to_string()));
    }

    let mut result = grade_submission(&record, &claims.sub, &req.answers);
    result.display_name = display_name;
    result.affiliation = req
        .affiliation
        .as_deref()
        .map(clean_text)
        .filter(|a| !a.is_empty());

    let ack = store
        .submit_result(id, result.clone())
        .await
        .inspect_err(|e| tracing::warn!("Submission to challenge {} failed: {}", id, e))?;

    tracing::info!(
        "Recorded result: challenge={}, participant={}, score={}, status={}",
        id,
        claims.sub,
        result.score,
        ack.status
    );

    let mut session = ArenaSession::new(Some(claims.sub), &ack);
    let view = session.record_submission(&ack, result);

    Ok(Json(SubmitResponse { view, integrity }))
}

/// The caller's reconciled results: waiting, or revealed with ranks.
pub async fn get_results(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let record = load_challenge(&store, id).await?;
    let mut session = ArenaSession::new(Some(claims.sub), &record);
    Ok(Json(session.apply_snapshot(&record)))
}

/// SSE stream of the caller's reconciled view, one event per record update.
/// GET /api/challenges/{id}/events
pub async fn challenge_events(
    State(store): State<SharedStore>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let record = load_challenge(&store, id).await?;
    tracing::info!("Client connected to challenge stream: challenge={}, participant={}", id, claims.sub);

    let session = ArenaSession::new(Some(claims.sub), &record);
    let handle = watch(store.clone(), session);

    Ok(Sse::new(view_stream(handle)).keep_alive(KeepAlive::default()))
}

fn view_stream(handle: WatchHandle) -> impl Stream<Item = Result<Event, Infallible>> {
    // The handle lives inside the stream, so a disconnect drops the subscription.
    stream::unfold(handle, |mut handle| async move {
        let view = handle.next().await?;
        let data = serde_json::to_string(&view).unwrap_or_else(|_| "{}".to_string());
        Some((Ok(Event::default().event("view").data(data)), handle))
    })
}
