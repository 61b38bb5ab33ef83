// src/models/challenge.rs

use std::{collections::HashSet, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Kind of arena battle. Decides whether opponents gate the result screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeType {
    Practice,
    Boss,
    Quick,
    School,
    Tournament,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeType::Practice => "practice",
            ChallengeType::Boss => "boss",
            ChallengeType::Quick => "quick",
            ChallengeType::School => "school",
            ChallengeType::Tournament => "tournament",
        }
    }

    /// Modes that are meaningful for a single participant and never wait on anyone.
    pub fn is_solo(&self) -> bool {
        matches!(self, ChallengeType::Practice | ChallengeType::Boss)
    }

    /// Head-to-head modes that may show a provisional rank before the other side reports.
    pub fn allows_provisional_rank(&self) -> bool {
        matches!(
            self,
            ChallengeType::Quick | ChallengeType::School | ChallengeType::Tournament
        )
    }
}

impl fmt::Display for ChallengeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "practice" => Ok(ChallengeType::Practice),
            "boss" => Ok(ChallengeType::Boss),
            "quick" => Ok(ChallengeType::Quick),
            "school" => Ok(ChallengeType::School),
            "tournament" => Ok(ChallengeType::Tournament),
            other => Err(format!("unknown challenge type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengeStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Pending => "pending",
            ChallengeStatus::Accepted => "accepted",
            ChallengeStatus::InProgress => "in-progress",
            ChallengeStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChallengeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChallengeStatus::Pending),
            "accepted" => Ok(ChallengeStatus::Accepted),
            "in-progress" => Ok(ChallengeStatus::InProgress),
            "completed" => Ok(ChallengeStatus::Completed),
            other => Err(format!("unknown challenge status '{}'", other)),
        }
    }
}

/// One participant's outcome for one challenge instance.
///
/// `participant_id` is the only identity key. A `rank` of 0 means unassigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeResult {
    pub participant_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub affiliation: Option<String>,
    pub score: u32,
    pub correct_count: u32,
    /// Percentage of correct answers. Derivable when absent.
    #[serde(default)]
    pub accuracy: Option<f64>,
    pub total_time_ms: u64,
    #[serde(default)]
    pub rank: u32,
    #[serde(default)]
    pub rating_change: Option<i32>,
    #[serde(default)]
    pub coins_earned: Option<u32>,
}

impl ChallengeResult {
    pub fn new(participant_id: impl Into<String>, score: u32, total_time_ms: u64) -> Self {
        Self {
            participant_id: participant_id.into(),
            display_name: String::new(),
            affiliation: None,
            score,
            correct_count: 0,
            accuracy: None,
            total_time_ms,
            rank: 0,
            rating_change: None,
            coins_earned: None,
        }
    }

    pub fn is_ranked(&self) -> bool {
        self.rank > 0
    }

    /// Stored accuracy, or `correct_count / total_questions` as a percentage
    /// rounded to one decimal.
    pub fn accuracy_or_derived(&self, total_questions: usize) -> f64 {
        match self.accuracy {
            Some(accuracy) => accuracy,
            None if total_questions == 0 => 0.0,
            None => (self.correct_count as f64 / total_questions as f64 * 1000.0).round() / 10.0,
        }
    }
}

/// A question as stored on the challenge record, answer key included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ChallengeQuestion {
    #[validate(length(min = 1, max = 64))]
    pub id: String,
    #[validate(length(min = 1, max = 1000))]
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 500))]
    pub answer: String,
    /// Per-question countdown. Answers arriving later count as unanswered.
    #[validate(range(min = 1000, max = 600000))]
    pub time_limit_ms: u64,
}

/// DTO for sending a question to players (excludes the answer key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub time_limit_ms: u64,
}

impl From<&ChallengeQuestion> for PublicQuestion {
    fn from(q: &ChallengeQuestion) -> Self {
        Self {
            id: q.id.clone(),
            prompt: q.prompt.clone(),
            options: q.options.clone(),
            time_limit_ms: q.time_limit_ms,
        }
    }
}

/// The shared, authoritative multi-party challenge record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    pub id: Uuid,
    pub creator_id: String,
    pub opponent_ids: Vec<String>,
    pub challenge_type: ChallengeType,
    pub status: ChallengeStatus,
    pub questions: Vec<ChallengeQuestion>,
    pub results: Vec<ChallengeResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChallengeRecord {
    pub fn new(
        creator_id: impl Into<String>,
        challenge_type: ChallengeType,
        opponent_ids: Vec<String>,
        questions: Vec<ChallengeQuestion>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            creator_id: creator_id.into(),
            opponent_ids,
            challenge_type,
            status: ChallengeStatus::Pending,
            questions,
            results: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The creator plus every opponent.
    pub fn expected_participant_count(&self) -> usize {
        1 + self.opponent_ids.len()
    }

    pub fn is_participant(&self, participant_id: &str) -> bool {
        self.creator_id == participant_id || self.opponent_ids.iter().any(|id| id == participant_id)
    }

    pub fn has_submitted(&self, participant_id: &str) -> bool {
        self.results.iter().any(|r| r.participant_id == participant_id)
    }

    /// Number of distinct participants that have reported a result.
    pub fn finished_participant_count(&self) -> usize {
        self.results
            .iter()
            .map(|r| r.participant_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn is_complete(&self) -> bool {
        self.status == ChallengeStatus::Completed
            || self.finished_participant_count() >= self.expected_participant_count()
    }

    pub fn question(&self, question_id: &str) -> Option<&ChallengeQuestion> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}

/// DTO for returning a challenge to clients without answer keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicChallenge {
    pub id: Uuid,
    pub creator_id: String,
    pub opponent_ids: Vec<String>,
    pub challenge_type: ChallengeType,
    pub status: ChallengeStatus,
    pub questions: Vec<PublicQuestion>,
    pub results: Vec<ChallengeResult>,
    pub expected_participants: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ChallengeRecord> for PublicChallenge {
    fn from(record: &ChallengeRecord) -> Self {
        Self {
            id: record.id,
            creator_id: record.creator_id.clone(),
            opponent_ids: record.opponent_ids.clone(),
            challenge_type: record.challenge_type,
            status: record.status,
            questions: record.questions.iter().map(PublicQuestion::from).collect(),
            results: record.results.clone(),
            expected_participants: record.expected_participant_count(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// DTO for creating a new challenge.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateChallengeRequest {
    pub challenge_type: ChallengeType,
    #[serde(default)]
    #[validate(length(max = 16))]
    pub opponent_ids: Vec<String>,
    #[validate(length(min = 1, max = 50), nested)]
    pub questions: Vec<ChallengeQuestion>,
}

/// One answered question as reported by the client.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AnswerSubmission {
    #[validate(length(min = 1, max = 64))]
    pub question_id: String,
    #[validate(length(max = 500))]
    pub answer: String,
    /// Time spent on this question.
    pub time_ms: u64,
}

/// DTO for submitting a participant's answers.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitChallengeRequest {
    #[validate(length(min = 1, max = 40))]
    pub display_name: String,
    #[validate(length(max = 80))]
    pub affiliation: Option<String>,
    #[validate(length(min = 1, max = 50), nested)]
    pub answers: Vec<AnswerSubmission>,
}
