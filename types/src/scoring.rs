use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_POINTS: i64 = 100;
pub const DEFAULT_MAX_BONUS: i64 = 50;

/// Points for a correct answer: a flat base plus a speed bonus that decays
/// linearly from `max_bonus` to zero over the question's time limit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub base_points: i64,
    pub max_bonus: i64,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            base_points: DEFAULT_BASE_POINTS,
            max_bonus: DEFAULT_MAX_BONUS,
        }
    }
}

impl ScoringRules {
    pub fn new(base_points: i64, max_bonus: i64) -> Self {
        Self {
            base_points: base_points.max(0),
            max_bonus: max_bonus.max(0),
        }
    }

    pub fn bonus(&self, elapsed_ms: u64, time_limit_ms: u64) -> i64 {
        if time_limit_ms == 0 {
            return 0;
        }
        let remaining = time_limit_ms as f64 - elapsed_ms as f64;
        let fraction = (remaining / time_limit_ms as f64).clamp(0.0, 1.0);
        (self.max_bonus as f64 * fraction).round() as i64
    }

    pub fn award(&self, is_correct: bool, elapsed_ms: u64, time_limit_ms: u64) -> i64 {
        if !is_correct {
            return 0;
        }
        self.base_points + self.bonus(elapsed_ms, time_limit_ms)
    }
}
