pub mod game_state;
pub mod leaderboard;
pub mod question;
pub mod scoring;
pub mod validation;

pub use game_state::{GamePhase, SessionState, TransitionError};
pub use leaderboard::{Leaderboard, LeaderboardEntry, Standing};
pub use question::{AnswerOption, Question, QuestionCursor};
pub use scoring::ScoringRules;
pub use validation::ValidationError;
