use axum::{extract::State, Json};
use database::{CategoryRecord, TriviaRecord};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriviaQuery {
    pub category_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriviaView {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    pub question_count: i64,
}

impl From<TriviaRecord> for TriviaView {
    fn from(record: TriviaRecord) -> Self {
        Self {
            id: record.id,
            category_id: record.category_id,
            name: record.name,
            question_count: record.question_count,
        }
    }
}

pub async fn categories_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryRecord>>, ApiError> {
    Ok(Json(state.store.list_categories().await?))
}

pub async fn trivia_handler(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TriviaQuery>,
) -> Result<Json<Vec<TriviaView>>, ApiError> {
    let category_id: i64 = query
        .category_id
        .as_deref()
        .and_then(|raw| raw.trim().parse().ok())
        .ok_or_else(|| ApiError::BadRequest("categoryId is required".to_string()))?;

    let trivia = state.store.list_trivia(category_id).await?;
    Ok(Json(trivia.into_iter().map(TriviaView::from).collect()))
}
