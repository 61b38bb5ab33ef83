// src/arena/session.rs

use std::sync::Arc;

use serde::Serialize;
use tokio::{
    sync::{
        broadcast::{self, error::RecvError},
        mpsc,
    },
    task::JoinHandle,
};
use uuid::Uuid;

use crate::{
    arena::{
        gate::{GateDecision, RevealGate},
        lookup::my_result,
        merge::merge_results,
        rank::assign_ranks,
    },
    models::challenge::{ChallengeRecord, ChallengeResult, ChallengeStatus, ChallengeType},
    store::ChallengeStore,
};

/// What the local viewer may see after a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionView {
    /// No local identity; personalised results must not be shown.
    AuthRequired,
    /// The local participant has not submitted yet; the gate is not consulted.
    Playing {
        finished: usize,
        expected: usize,
    },
    Waiting {
        finished: usize,
        expected: usize,
    },
    Revealed {
        status: ChallengeStatus,
        results: Vec<ChallengeResult>,
        my_result: Option<ChallengeResult>,
    },
}

impl SessionView {
    pub fn is_revealed(&self) -> bool {
        matches!(self, SessionView::Revealed { .. })
    }
}

/// Local view of one challenge, reduced from authoritative snapshots.
#[derive(Debug, Clone)]
pub struct ArenaSession {
    challenge_id: Uuid,
    local_participant: Option<String>,
    challenge_type: ChallengeType,
    local_results: Vec<ChallengeResult>,
    gate: RevealGate,
    submitted: bool,
}

impl ArenaSession {
    pub fn new(local_participant: Option<String>, record: &ChallengeRecord) -> Self {
        let submitted = local_participant
            .as_deref()
            .is_some_and(|id| record.has_submitted(id));

        Self {
            challenge_id: record.id,
            local_participant,
            challenge_type: record.challenge_type,
            local_results: Vec::new(),
            gate: RevealGate::new(),
            submitted,
        }
    }

    pub fn challenge_id(&self) -> Uuid {
        self.challenge_id
    }

    pub fn local_participant(&self) -> Option<&str> {
        self.local_participant.as_deref()
    }

    pub fn is_revealed(&self) -> bool {
        self.gate.is_revealed()
    }

    /// False once the backend has acknowledged this participant's submission.
    pub fn can_submit(&self) -> bool {
        self.local_participant.is_some() && !self.submitted
    }

    /// Records an acknowledged submission and reduces the returned record.
    pub fn record_submission(
        &mut self,
        ack: &ChallengeRecord,
        mine: ChallengeResult,
    ) -> SessionView {
        self.submitted = true;
        self.local_results.retain(|r| r.participant_id != mine.participant_id);
        self.local_results.push(mine);
        self.apply_snapshot(ack)
    }

    /// Reduces one authoritative snapshot into the view for the local viewer.
    ///
    /// Applying the same snapshot twice yields the same view.
    pub fn apply_snapshot(&mut self, record: &ChallengeRecord) -> SessionView {
        let Some(local_id) = self.local_participant.clone() else {
            return SessionView::AuthRequired;
        };

        if record.has_submitted(&local_id) {
            self.submitted = true;
        }

        let expected = record.expected_participant_count();
        let finished = if record.status == ChallengeStatus::Completed {
            expected.max(record.finished_participant_count())
        } else {
            record.finished_participant_count()
        };

        // The gate only applies once the local participant has answered.
        if record.is_participant(&local_id) && !self.submitted {
            return SessionView::Playing { finished, expected };
        }
        // Spectators only see complete records.
        if !record.is_participant(&local_id) && !record.is_complete() && !self.gate.is_revealed() {
            return SessionView::Waiting { finished, expected };
        }

        let total_questions = record.questions.len();
        let mut results = merge_results(&record.results, &self.local_results);
        for result in results.iter_mut().filter(|r| r.accuracy.is_none()) {
            result.accuracy = Some(result.accuracy_or_derived(total_questions));
        }
        assign_ranks(&mut results, expected, self.challenge_type);
        sort_for_display(&mut results);

        match self
            .gate
            .evaluate(self.challenge_type, expected, finished, &record.opponent_ids)
        {
            GateDecision::Reveal => SessionView::Revealed {
                status: record.status,
                my_result: my_result(&results, &local_id).cloned(),
                results,
            },
            GateDecision::Waiting => SessionView::Waiting { finished, expected },
        }
    }
}

/// Ranked entries first in rank order, unranked ones after in arrival order.
fn sort_for_display(results: &mut [ChallengeResult]) {
    results.sort_by_key(|r| if r.rank == 0 { u32::MAX } else { r.rank });
}

/// Owns the snapshot receiver and hands the channel back to the store on drop,
/// including when the watcher task is aborted.
struct Subscription {
    store: Arc<dyn ChallengeStore>,
    id: Uuid,
    snapshots: Option<broadcast::Receiver<ChallengeRecord>>,
}

impl Subscription {
    fn open(store: Arc<dyn ChallengeStore>, id: Uuid) -> Self {
        let snapshots = Some(store.subscribe(id));
        Self { store, id, snapshots }
    }

    async fn recv(&mut self) -> Result<ChallengeRecord, RecvError> {
        match self.snapshots.as_mut() {
            Some(rx) => rx.recv().await,
            None => Err(RecvError::Closed),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Receiver first, so the store sees no listener left.
        self.snapshots.take();
        self.store.release(self.id);
    }
}

/// Live reduction of a challenge's snapshots. Dropping the handle unsubscribes.
pub struct WatchHandle {
    views: mpsc::Receiver<SessionView>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub async fn next(&mut self) -> Option<SessionView> {
        self.views.recv().await
    }

    /// Stops the watcher and releases the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns a watcher that reduces every snapshot of the session's challenge.
///
/// Subscribes before reading the current record so no update is missed. A lagging
/// subscription falls back to re-fetching by id. Ends once a complete record has
/// been revealed, or when the store closes the channel.
pub fn watch(store: Arc<dyn ChallengeStore>, mut session: ArenaSession) -> WatchHandle {
    let (tx, rx) = mpsc::channel(16);
    let id = session.challenge_id();

    let task = tokio::spawn(async move {
        let mut snapshots = Subscription::open(store.clone(), id);

        match store.fetch(id).await {
            Ok(Some(record)) => {
                let view = session.apply_snapshot(&record);
                let done = view.is_revealed() && record.is_complete();
                if tx.send(view).await.is_err() || done {
                    return;
                }
            }
            Ok(None) => {
                tracing::warn!("Watched challenge {} does not exist", id);
                return;
            }
            Err(e) => tracing::warn!("Initial fetch of challenge {} failed: {}", id, e),
        }

        loop {
            let record = match snapshots.recv().await {
                Ok(record) => record,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "Subscription to challenge {} lagged by {} snapshots, re-fetching",
                        id,
                        skipped
                    );
                    match store.fetch(id).await {
                        Ok(Some(record)) => record,
                        Ok(None) => return,
                        Err(e) => {
                            tracing::warn!("Re-fetch of challenge {} failed: {}", id, e);
                            continue;
                        }
                    }
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("Snapshot channel for challenge {} closed", id);
                    return;
                }
            };

            let view = session.apply_snapshot(&record);
            let done = view.is_revealed() && record.is_complete();
            if tx.send(view).await.is_err() || done {
                return;
            }
        }
    });

    WatchHandle { views: rx, task }
}
