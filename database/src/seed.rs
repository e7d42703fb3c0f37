//! Loading categories and trivia sets from a YAML catalog.
//!
//! ```yaml
//! categories:
//!   - name: Space
//!     slug: space
//!     trivia:
//!       - name: Solar System
//!         questions:
//!           - question: Which planet is the largest?
//!             options:
//!               - text: Jupiter
//!                 correct: true
//!               - text: Mars
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::{NewOption, NewQuestion};
use crate::stores::TriviaStore;
use crate::DatabaseError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedCatalog {
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedCategory {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub trivia: Vec<SeedTrivia>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedTrivia {
    pub name: String,
    #[serde(default)]
    pub questions: Vec<SeedQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedQuestion {
    pub question: String,
    pub options: Vec<SeedOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedOption {
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub categories: usize,
    pub trivia_sets: usize,
    pub skipped_trivia_sets: usize,
    pub questions: usize,
}

impl SeedCatalog {
    pub fn from_yaml(yaml: &str) -> Result<Self, DatabaseError> {
        let catalog: SeedCatalog = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    pub fn validate(&self) -> Result<(), DatabaseError> {
        for category in &self.categories {
            if category.name.trim().is_empty() || category.slug.trim().is_empty() {
                return Err(DatabaseError::InvalidSeed(
                    "category name and slug are required".to_string(),
                ));
            }
            for trivia in &category.trivia {
                if trivia.name.trim().is_empty() {
                    return Err(DatabaseError::InvalidSeed(format!(
                        "trivia set in '{}' has no name",
                        category.slug
                    )));
                }
                for question in &trivia.questions {
                    if question.options.len() < 2 {
                        return Err(DatabaseError::InvalidSeed(format!(
                            "'{}' needs at least two options",
                            question.question
                        )));
                    }
                    if !question.options.iter().any(|o| o.correct) {
                        return Err(DatabaseError::InvalidSeed(format!(
                            "'{}' has no correct option",
                            question.question
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Upserts categories by slug. Trivia sets that already exist in their
    /// category are left untouched so re-running a seed is harmless.
    pub async fn load_into(&self, store: &dyn TriviaStore) -> Result<SeedReport, DatabaseError> {
        let mut report = SeedReport::default();

        for category in &self.categories {
            let category_id = store
                .upsert_category(category.name.trim(), category.slug.trim())
                .await?;
            report.categories += 1;

            let existing = store.list_trivia(category_id).await?;
            for trivia in &category.trivia {
                let name = trivia.name.trim();
                if existing.iter().any(|t| t.name == name) {
                    tracing::info!(category = %category.slug, trivia = name, "Trivia set exists, skipping");
                    report.skipped_trivia_sets += 1;
                    continue;
                }

                let questions: Vec<NewQuestion> = trivia
                    .questions
                    .iter()
                    .map(|question| NewQuestion {
                        text: question.question.clone(),
                        options: question
                            .options
                            .iter()
                            .map(|o| NewOption {
                                text: o.text.clone(),
                                is_correct: o.correct,
                            })
                            .collect(),
                    })
                    .collect();
                store.insert_trivia_set(category_id, name, &questions).await?;
                report.questions += questions.len();
                report.trivia_sets += 1;
            }
        }

        tracing::info!(?report, "Seeded trivia catalog");
        Ok(report)
    }
}
