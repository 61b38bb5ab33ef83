// src/arena/timer.rs

use std::time::Duration;

use serde::Serialize;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

/// True once `elapsed_ms` has used up the whole `limit_ms` budget.
pub fn is_expired(elapsed_ms: u64, limit_ms: u64) -> bool {
    elapsed_ms >= limit_ms
}

/// Deadline of the question currently on screen.
#[derive(Debug, Clone, Copy)]
pub struct QuestionDeadline {
    started_at: Instant,
    limit: Duration,
}

impl QuestionDeadline {
    pub fn new(started_at: Instant, limit: Duration) -> Self {
        Self { started_at, limit }
    }

    pub fn starting_now(limit: Duration) -> Self {
        Self::new(Instant::now(), limit)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started_at) >= self.limit
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.limit
            .saturating_sub(now.saturating_duration_since(self.started_at))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClockEvent {
    Tick { question: usize, remaining_ms: u64 },
    Expired { question: usize },
    Finished,
}

/// Single owned ticker driving the per-question countdown.
///
/// Expired questions auto-advance. Dropping the clock stops the ticker.
pub struct QuestionClock {
    advance_tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl QuestionClock {
    pub fn spawn(limits: Vec<Duration>, tick: Duration) -> (Self, mpsc::Receiver<ClockEvent>) {
        let (event_tx, event_rx) = mpsc::channel(32);
        let (advance_tx, advance_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_clock(limits, tick, event_tx, advance_rx));
        (Self { advance_tx, task }, event_rx)
    }

    /// Moves to the next question before its deadline (question answered).
    pub fn advance(&self) {
        let _ = self.advance_tx.send(());
    }
}

impl Drop for QuestionClock {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_clock(
    limits: Vec<Duration>,
    tick: Duration,
    events: mpsc::Sender<ClockEvent>,
    mut advance_rx: mpsc::UnboundedReceiver<()>,
) {
    let mut question = 0;
    let Some(first) = limits.first() else {
        let _ = events.send(ClockEvent::Finished).await;
        return;
    };
    let mut deadline = QuestionDeadline::starting_now(*first);

    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let move_on = tokio::select! {
            _ = interval.tick() => {
                let now = Instant::now();
                if deadline.is_expired(now) {
                    tracing::debug!("Question {} expired", question);
                    if events.send(ClockEvent::Expired { question }).await.is_err() {
                        return;
                    }
                    true
                } else {
                    let remaining_ms = deadline.remaining(now).as_millis() as u64;
                    if events.send(ClockEvent::Tick { question, remaining_ms }).await.is_err() {
                        return;
                    }
                    false
                }
            }
            Some(()) = advance_rx.recv() => true,
        };

        if move_on {
            question += 1;
            match limits.get(question) {
                Some(limit) => deadline = QuestionDeadline::starting_now(*limit),
                None => {
                    let _ = events.send(ClockEvent::Finished).await;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_is_inclusive_of_the_limit() {
        assert!(!is_expired(9_999, 10_000));
        assert!(is_expired(10_000, 10_000));
        assert!(is_expired(12_000, 10_000));
    }

    #[tokio::test]
    async fn deadline_reports_remaining_time() {
        let start = Instant::now();
        let deadline = QuestionDeadline::new(start, Duration::from_millis(500));

        assert!(!deadline.is_expired(start));
        assert_eq!(deadline.remaining(start), Duration::from_millis(500));

        let later = start + Duration::from_millis(800);
        assert!(deadline.is_expired(later));
        assert_eq!(deadline.remaining(later), Duration::ZERO);
    }

    #[tokio::test]
    async fn clock_auto_advances_through_every_question() {
        let limits = vec![Duration::from_millis(30), Duration::from_millis(30)];
        let (_clock, mut events) = QuestionClock::spawn(limits, Duration::from_millis(5));

        let mut expired = Vec::new();
        while let Some(event) = events.recv().await {
            match event {
                ClockEvent::Expired { question } => expired.push(question),
                ClockEvent::Finished => break,
                ClockEvent::Tick { .. } => {}
            }
        }

        assert_eq!(expired, vec![0, 1]);
    }

    #[tokio::test]
    async fn answered_question_does_not_expire() {
        let limits = vec![Duration::from_secs(30), Duration::from_millis(40)];
        let (clock, mut events) = QuestionClock::spawn(limits, Duration::from_millis(5));
        clock.advance();

        let mut expired = Vec::new();
        while let Some(event) = events.recv().await {
            match event {
                ClockEvent::Expired { question } => expired.push(question),
                ClockEvent::Finished => break,
                ClockEvent::Tick { .. } => {}
            }
        }

        assert_eq!(expired, vec![1]);
    }

    #[tokio::test]
    async fn empty_clock_finishes_immediately() {
        let (_clock, mut events) = QuestionClock::spawn(Vec::new(), Duration::from_millis(5));
        assert_eq!(events.recv().await, Some(ClockEvent::Finished));
    }
}
