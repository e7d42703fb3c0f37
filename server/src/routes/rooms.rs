use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use database::{
    DatabaseError, HistoryEntry, NewRoom, RoomRecord, SessionRecord, TriviaRecord, TriviaStore,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use types::{validation, GamePhase, LeaderboardEntry, Question};

use super::{load_questions, ranked, winner_view, WinnerView};
use crate::auth::AdminSession;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

const ROOM_LIST_LIMIT: i64 = 50;
const HISTORY_LIMIT: i64 = 50;
const CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub code: Option<String>,
    pub category_id: Option<i64>,
    pub trivia_id: Option<i64>,
    pub time_limit_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreated {
    pub id: i64,
    pub code: String,
    pub status: String,
    pub category_id: Option<i64>,
    pub trivia_id: i64,
    pub session_id: i64,
    pub time_limit_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub id: i64,
    pub code: String,
    pub status: String,
    pub category_id: Option<i64>,
    pub host_admin_id: Option<i64>,
    pub time_limit_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl From<RoomRecord> for RoomView {
    fn from(room: RoomRecord) -> Self {
        Self {
            id: room.id,
            code: room.code,
            status: room.status,
            category_id: room.category_id,
            host_admin_id: room.host_admin_id,
            time_limit_ms: room.time_limit_ms,
            created_at: room.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TriviaSummary {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct OptionView {
    pub id: i64,
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostQuestionView {
    pub id: i64,
    pub question: String,
    pub options: Vec<OptionView>,
    pub correct_option_ids: Vec<i64>,
}

impl From<&Question> for HostQuestionView {
    fn from(question: &Question) -> Self {
        Self {
            id: question.id,
            question: question.text.clone(),
            options: question
                .options
                .iter()
                .map(|o| OptionView {
                    id: o.id,
                    text: o.text.clone(),
                })
                .collect(),
            correct_option_ids: question.correct_option_ids(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRoomView {
    pub room_id: i64,
    pub code: String,
    pub status: String,
    pub category_id: Option<i64>,
    pub session_id: i64,
    pub phase: GamePhase,
    pub game_started: bool,
    pub game_ended: bool,
    pub question_index: usize,
    pub question_count: usize,
    pub time_limit_ms: i64,
    pub trivia: TriviaSummary,
    pub questions: Vec<HostQuestionView>,
    pub players: Vec<LeaderboardEntry>,
    pub winner: Option<WinnerView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub room_id: i64,
    pub session_id: i64,
    pub trivia_name: String,
    pub winner_name: Option<String>,
    pub winner_score: Option<i64>,
    pub ended_at: DateTime<Utc>,
}

impl From<HistoryEntry> for HistoryView {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            room_id: entry.room_id,
            session_id: entry.session_id,
            trivia_name: entry.trivia_name,
            winner_name: entry.winner_name,
            winner_score: entry.winner_score,
            ended_at: entry.ended_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoomRequest {
    #[serde(default)]
    pub category_id: Option<i64>,
}

/// Picks the trivia set a session plays. An explicit set must exist and sit
/// in the given category; otherwise the category's first set by name is used.
pub(crate) async fn resolve_trivia(
    store: &dyn TriviaStore,
    category_id: Option<i64>,
    trivia_id: Option<i64>,
) -> Result<TriviaRecord, ApiError> {
    if let Some(category_id) = category_id {
        store
            .get_category(category_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Category"))?;
    }

    match (trivia_id, category_id) {
        (Some(trivia_id), category_id) => {
            let trivia = store
                .get_trivia(trivia_id)
                .await?
                .ok_or_else(|| ApiError::not_found("Trivia set"))?;
            if category_id.is_some_and(|id| id != trivia.category_id) {
                return Err(ApiError::BadRequest(
                    "Trivia set does not belong to this category".to_string(),
                ));
            }
            Ok(trivia)
        }
        (None, Some(category_id)) => store
            .list_trivia(category_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::BadRequest("Category has no trivia sets".to_string())),
        (None, None) => Err(ApiError::BadRequest(
            "A category or trivia set is required".to_string(),
        )),
    }
}

pub(crate) fn fresh_code() -> String {
    validation::generate_join_code(&mut rand::thread_rng())
}

pub(crate) fn is_code_conflict(err: &DatabaseError) -> bool {
    matches!(err, DatabaseError::Conflict(msg) if msg == "Room code is already in use")
}

pub async fn create_room_handler(
    State(state): State<AppState>,
    admin: AdminSession,
    ApiJson(payload): ApiJson<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomCreated>), ApiError> {
    let requested_code = payload
        .code
        .as_deref()
        .map(validation::room_code)
        .transpose()?;
    let time_limit_ms =
        validation::time_limit_ms(Some(payload.time_limit_ms.unwrap_or(state.time_limit_ms)))?;
    let trivia = resolve_trivia(state.store.as_ref(), payload.category_id, payload.trivia_id).await?;

    let attempts = if requested_code.is_some() { 1 } else { CODE_ATTEMPTS };
    let mut last_err = None;
    for _ in 0..attempts {
        let code = requested_code.clone().unwrap_or_else(fresh_code);
        let new_room = NewRoom {
            code,
            host_admin_id: Some(admin.admin_id),
            time_limit_ms: time_limit_ms as i64,
            category_id: payload.category_id,
            trivia_id: trivia.id,
        };

        match state.store.create_room(new_room).await {
            Ok((room, session)) => {
                info!(room_id = room.id, admin_id = admin.admin_id, "Room created");
                return Ok((
                    StatusCode::CREATED,
                    Json(RoomCreated {
                        id: room.id,
                        code: room.code,
                        status: room.status,
                        category_id: room.category_id,
                        trivia_id: session.trivia_id,
                        session_id: session.id,
                        time_limit_ms: room.time_limit_ms,
                    }),
                ));
            }
            Err(err) if requested_code.is_none() && is_code_conflict(&err) => {
                warn!("Generated room code collided, retrying");
                last_err = Some(err);
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(last_err
        .map(ApiError::from)
        .unwrap_or_else(|| ApiError::Internal("Could not allocate a room code".to_string())))
}

pub async fn list_rooms_handler(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<Json<Vec<RoomView>>, ApiError> {
    let rooms = state.store.list_rooms(ROOM_LIST_LIMIT).await?;
    Ok(Json(rooms.into_iter().map(RoomView::from).collect()))
}

pub async fn room_handler(
    State(state): State<AppState>,
    _admin: AdminSession,
    ApiPath(room_id): ApiPath<i64>,
) -> Result<Json<HostRoomView>, ApiError> {
    let store = state.store.as_ref();
    let room = store
        .get_room(room_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Room"))?;
    let session: SessionRecord = store
        .latest_session(room_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No session found for this room".to_string()))?;
    let trivia = store
        .get_trivia(session.trivia_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Trivia set"))?;
    let questions = load_questions(store, trivia.id).await?;
    let players = store.list_players(session.id).await?;
    let winner = winner_view(store, &session, &players).await?;

    let phase = session.phase();
    let cursor = session.state(questions.len()).cursor();

    Ok(Json(HostRoomView {
        room_id: room.id,
        code: session.code.clone(),
        status: room.status,
        category_id: room.category_id,
        session_id: session.id,
        phase,
        game_started: phase == GamePhase::Live,
        game_ended: phase == GamePhase::Ended,
        question_index: cursor.index(),
        question_count: cursor.count(),
        time_limit_ms: room.time_limit_ms,
        trivia: TriviaSummary {
            id: trivia.id,
            name: trivia.name,
        },
        questions: questions.iter().map(HostQuestionView::from).collect(),
        players: ranked(&players).into_entries(),
        winner,
    }))
}

pub async fn update_room_handler(
    State(state): State<AppState>,
    _admin: AdminSession,
    ApiPath(room_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UpdateRoomRequest>,
) -> Result<Json<RoomView>, ApiError> {
    if let Some(category_id) = payload.category_id {
        state
            .store
            .get_category(category_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Category"))?;
    }

    let room = state
        .store
        .set_room_category(room_id, payload.category_id)
        .await?;
    Ok(Json(room.into()))
}

pub async fn delete_room_handler(
    State(state): State<AppState>,
    admin: AdminSession,
    ApiPath(room_id): ApiPath<i64>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state.store.delete_room(room_id).await?;
    info!(room_id, admin_id = admin.admin_id, ?deleted, "Room deleted");
    Ok(Json(json!({ "success": true })))
}

pub async fn history_handler(
    State(state): State<AppState>,
    _admin: AdminSession,
) -> Result<Json<Vec<HistoryView>>, ApiError> {
    let history = state.store.list_history(HISTORY_LIMIT).await?;
    Ok(Json(history.into_iter().map(HistoryView::from).collect()))
}
