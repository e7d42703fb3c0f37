use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use types::{AnswerOption, GamePhase, Question, SessionState, Standing};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminRecord {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub pass_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CategoryRecord {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TriviaRecord {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub question_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OptionRecord {
    pub id: i64,
    pub question_id: i64,
    pub position: i64,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: i64,
    pub trivia_id: i64,
    pub position: i64,
    pub text: String,
    pub options: Vec<OptionRecord>,
}

impl From<QuestionRecord> for Question {
    fn from(record: QuestionRecord) -> Self {
        Question {
            id: record.id,
            text: record.text,
            options: record
                .options
                .into_iter()
                .map(|o| AnswerOption {
                    id: o.id,
                    text: o.text,
                    is_correct: o.is_correct,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOption {
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuestion {
    pub text: String,
    pub options: Vec<NewOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoomRecord {
    pub id: i64,
    pub code: String,
    pub status: String,
    pub host_admin_id: Option<i64>,
    pub time_limit_ms: i64,
    pub category_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub code: String,
    pub host_admin_id: Option<i64>,
    pub time_limit_ms: i64,
    pub category_id: Option<i64>,
    pub trivia_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionRecord {
    pub id: i64,
    pub room_id: i64,
    pub trivia_id: i64,
    pub code: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub current_question_index: i64,
    pub question_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn phase(&self) -> GamePhase {
        GamePhase::from_timestamps(self.start_time, self.end_time)
    }

    pub fn state(&self, question_count: usize) -> SessionState {
        SessionState {
            start_time: self.start_time,
            end_time: self.end_time,
            current_question_index: self.current_question_index.max(0) as usize,
            question_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: Uuid,
    pub session_id: i64,
    pub username: String,
    pub score: i64,
    pub joined_at: DateTime<Utc>,
}

impl From<&PlayerRecord> for Standing {
    fn from(player: &PlayerRecord) -> Self {
        Standing {
            player_id: player.id,
            username: player.username.clone(),
            score: player.score,
            joined_at: player.joined_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAnswer {
    pub session_id: i64,
    pub player_id: Uuid,
    pub question_id: i64,
    pub option_id: Option<i64>,
    pub is_correct: bool,
    pub response_time_ms: i64,
    pub points: i64,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerRecord {
    pub id: i64,
    pub session_id: i64,
    pub player_id: Uuid,
    pub score: i64,
    pub created_at: DateTime<Utc>,
}

/// Who gets recorded as the winner when a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinnerPick {
    pub player_id: Uuid,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HistoryEntry {
    pub room_id: i64,
    pub session_id: i64,
    pub trivia_name: String,
    pub winner_name: Option<String>,
    pub winner_score: Option<i64>,
    pub ended_at: DateTime<Utc>,
}

/// Row counts removed by a room delete, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoomDeletion {
    pub answers: u64,
    pub winners: u64,
    pub players: u64,
    pub sessions: u64,
    pub category_links: u64,
}
