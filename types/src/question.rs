use serde::{Deserialize, Serialize};

use crate::game_state::TransitionError;

/// Position in a trivia set's ordered question list. `index` is always
/// below `count` unless the set is empty.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionCursor {
    index: usize,
    count: usize,
}

impl QuestionCursor {
    pub fn new(index: usize, count: usize) -> Self {
        let index = if count == 0 {
            0
        } else if index >= count {
            log::warn!("Question index {index} out of range for {count} questions, clamping");
            count - 1
        } else {
            index
        };
        Self { index, count }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is_last(&self) -> bool {
        self.count == 0 || self.index + 1 >= self.count
    }

    pub fn current<'a, T>(&self, questions: &'a [T]) -> Option<&'a T> {
        questions.get(self.index)
    }

    pub fn advance(&self) -> Result<Self, TransitionError> {
        if self.is_empty() {
            return Err(TransitionError::NoQuestions);
        }
        if self.is_last() {
            return Err(TransitionError::AtLastQuestion {
                current_question_index: self.index,
            });
        }
        Ok(Self {
            index: self.index + 1,
            count: self.count,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: i64,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub text: String,
    pub options: Vec<AnswerOption>,
}

impl Question {
    pub fn option(&self, option_id: i64) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    pub fn correct_option_ids(&self) -> Vec<i64> {
        self.options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id)
            .collect()
    }
}
