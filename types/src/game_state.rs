use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::question::QuestionCursor;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GamePhase {
    Lobby,
    Live,
    Ended,
}

impl Display for GamePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GamePhase {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lobby" => Ok(GamePhase::Lobby),
            "live" => Ok(GamePhase::Live),
            "ended" => Ok(GamePhase::Ended),
            other => Err(TransitionError::UnknownPhase(other.to_string())),
        }
    }
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Lobby => "lobby",
            GamePhase::Live => "live",
            GamePhase::Ended => "ended",
        }
    }

    /// Phase implied by a session's timestamps. An end time always wins, so a
    /// session ended straight from the lobby reads as ended.
    pub fn from_timestamps(
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Self {
        match (start_time, end_time) {
            (_, Some(_)) => GamePhase::Ended,
            (Some(_), None) => GamePhase::Live,
            (None, None) => GamePhase::Lobby,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, GamePhase::Ended)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Game has already started")]
    AlreadyStarted,

    #[error("Game has not started yet")]
    NotStarted,

    #[error("Game has already ended")]
    AlreadyEnded,

    #[error("Trivia set has no questions")]
    NoQuestions,

    #[error("Already at last question")]
    AtLastQuestion { current_question_index: usize },

    #[error("Unknown game phase: {0}")]
    UnknownPhase(String),
}

/// Snapshot of one session's lifecycle fields, enough to decide whether a
/// host-triggered transition is allowed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionState {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub current_question_index: usize,
    pub question_count: usize,
}

impl SessionState {
    pub fn phase(&self) -> GamePhase {
        GamePhase::from_timestamps(self.start_time, self.end_time)
    }

    pub fn cursor(&self) -> QuestionCursor {
        QuestionCursor::new(self.current_question_index, self.question_count)
    }

    pub fn check_start(&self) -> Result<(), TransitionError> {
        match self.phase() {
            GamePhase::Live => Err(TransitionError::AlreadyStarted),
            GamePhase::Ended => Err(TransitionError::AlreadyEnded),
            GamePhase::Lobby if self.question_count == 0 => Err(TransitionError::NoQuestions),
            GamePhase::Lobby => Ok(()),
        }
    }

    /// Returns the index the session moves to on "next question".
    pub fn check_advance(&self) -> Result<usize, TransitionError> {
        match self.phase() {
            GamePhase::Lobby => Err(TransitionError::NotStarted),
            GamePhase::Ended => Err(TransitionError::AlreadyEnded),
            GamePhase::Live => self.cursor().advance().map(|cursor| cursor.index()),
        }
    }

    pub fn check_answer(&self) -> Result<(), TransitionError> {
        match self.phase() {
            GamePhase::Lobby => Err(TransitionError::NotStarted),
            GamePhase::Ended => Err(TransitionError::AlreadyEnded),
            GamePhase::Live => Ok(()),
        }
    }
}
