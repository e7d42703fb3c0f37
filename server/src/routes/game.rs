use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use database::{SessionRecord, TriviaRecord, TriviaStore, WinnerPick};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use types::{GamePhase, LeaderboardEntry};
use uuid::Uuid;

use super::rooms::{fresh_code, is_code_conflict, resolve_trivia};
use super::{active_session, load_questions, ranked, winner_view, WinnerView};
use crate::auth::AdminSession;
use crate::error::ApiError;
use crate::extract::{ApiPath, OptionalJson};
use crate::state::AppState;

const CODE_ATTEMPTS: usize = 5;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndGameRequest {
    pub winner_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionRequest {
    pub trivia_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomLiveView {
    pub session_id: i64,
    pub code: String,
    pub phase: GamePhase,
    pub game_started: bool,
    pub game_ended: bool,
    pub question_index: usize,
    pub question_count: usize,
    pub answered_count: i64,
    pub players: Vec<LeaderboardEntry>,
    pub winner: Option<WinnerView>,
}

async fn session_trivia(
    store: &dyn TriviaStore,
    session: &SessionRecord,
) -> Result<TriviaRecord, ApiError> {
    store
        .get_trivia(session.trivia_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Trivia set"))
}

pub async fn start_game_handler(
    State(state): State<AppState>,
    admin: AdminSession,
    ApiPath(room_id): ApiPath<i64>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.as_ref();
    let session = active_session(store, room_id).await?;
    let trivia = session_trivia(store, &session).await?;
    session
        .state(trivia.question_count.max(0) as usize)
        .check_start()?;

    let started = store.start_session(session.id, Utc::now()).await?;
    info!(room_id, session_id = started.id, admin_id = admin.admin_id, "Game started");

    Ok(Json(json!({
        "success": true,
        "sessionId": started.id,
        "startTime": started.start_time,
    })))
}

pub async fn next_question_handler(
    State(state): State<AppState>,
    _admin: AdminSession,
    ApiPath(room_id): ApiPath<i64>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.as_ref();
    let session = active_session(store, room_id).await?;
    let trivia = session_trivia(store, &session).await?;
    let next_index = session
        .state(trivia.question_count.max(0) as usize)
        .check_advance()?;

    // the store only moves the session if nobody advanced it in the meantime
    let advanced = store
        .advance_question(session.id, session.current_question_index, Utc::now())
        .await?;
    info!(room_id, session_id = session.id, next_index, "Advanced question");

    let players = store.list_players(session.id).await?;
    Ok(Json(json!({
        "success": true,
        "sessionId": advanced.id,
        "currentQuestionIndex": advanced.current_question_index,
        "players": ranked(&players).into_entries(),
    })))
}

pub async fn end_game_handler(
    State(state): State<AppState>,
    admin: AdminSession,
    ApiPath(room_id): ApiPath<i64>,
    OptionalJson(payload): OptionalJson<EndGameRequest>,
) -> Result<Json<Value>, ApiError> {
    let store = state.store.as_ref();
    let session = active_session(store, room_id).await?;

    let players = store.list_players(session.id).await?;
    let pick = match payload.winner_id.as_deref() {
        Some(raw) => {
            let player_id = Uuid::parse_str(raw.trim())
                .map_err(|_| ApiError::BadRequest("Invalid winnerId".to_string()))?;
            let winner = players
                .iter()
                .find(|p| p.id == player_id)
                .ok_or_else(|| {
                    ApiError::BadRequest("Winner does not belong to this session".to_string())
                })?;
            Some(WinnerPick {
                player_id: winner.id,
                score: winner.score,
            })
        }
        None if session.phase() == GamePhase::Live => {
            ranked(&players).top().map(|leader| WinnerPick {
                player_id: leader.id,
                score: leader.score,
            })
        }
        None => None,
    };

    let (ended, winner) = store.end_session(session.id, pick, Utc::now()).await?;
    info!(
        room_id,
        session_id = ended.id,
        admin_id = admin.admin_id,
        winner = ?winner.as_ref().map(|w| w.player_id),
        "Game ended"
    );

    Ok(Json(json!({
        "success": true,
        "sessionId": ended.id,
        "endTime": ended.end_time,
        "winnerId": winner.map(|w| w.player_id),
    })))
}

/// Opens a new session on a room whose last game is over, so the same room
/// can be played again under a new join code.
pub async fn new_session_handler(
    State(state): State<AppState>,
    admin: AdminSession,
    ApiPath(room_id): ApiPath<i64>,
    OptionalJson(payload): OptionalJson<NewSessionRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let store = state.store.as_ref();
    let room = store
        .get_room(room_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Room"))?;
    if store.active_session(room_id).await?.is_some() {
        return Err(ApiError::Conflict(
            "Room already has an active session".to_string(),
        ));
    }

    let trivia = match payload.trivia_id {
        Some(trivia_id) => resolve_trivia(store, room.category_id, Some(trivia_id)).await?,
        None => {
            let previous = match store.latest_session(room_id).await? {
                Some(session) => store.get_trivia(session.trivia_id).await?,
                None => None,
            };
            match previous {
                Some(trivia) if room.category_id.map_or(true, |id| id == trivia.category_id) => {
                    trivia
                }
                _ => resolve_trivia(store, room.category_id, None).await?,
            }
        }
    };

    for _ in 0..CODE_ATTEMPTS {
        let code = fresh_code();
        match store.open_session(room_id, trivia.id, &code).await {
            Ok(session) => {
                info!(room_id, session_id = session.id, admin_id = admin.admin_id, "Replay opened");
                return Ok((
                    StatusCode::CREATED,
                    Json(json!({
                        "sessionId": session.id,
                        "roomId": room_id,
                        "code": session.code,
                        "triviaId": session.trivia_id,
                    })),
                ));
            }
            Err(err) if is_code_conflict(&err) => {
                warn!(room_id, "Generated room code collided, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(ApiError::Internal("Could not allocate a room code".to_string()))
}

pub async fn room_live_handler(
    State(state): State<AppState>,
    _admin: AdminSession,
    ApiPath(room_id): ApiPath<i64>,
) -> Result<Json<RoomLiveView>, ApiError> {
    let store = state.store.as_ref();
    let session = store
        .latest_session(room_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No session found for this room".to_string()))?;
    let questions = load_questions(store, session.trivia_id).await?;
    let players = store.list_players(session.id).await?;

    let phase = session.phase();
    let cursor = session.state(questions.len()).cursor();
    let answered_count = match cursor.current(&questions) {
        Some(question) if phase == GamePhase::Live => {
            store.count_answers(session.id, question.id).await?
        }
        _ => 0,
    };
    let winner = winner_view(store, &session, &players).await?;

    Ok(Json(RoomLiveView {
        session_id: session.id,
        code: session.code.clone(),
        phase,
        game_started: phase == GamePhase::Live,
        game_ended: phase == GamePhase::Ended,
        question_index: cursor.index(),
        question_count: cursor.count(),
        answered_count,
        players: ranked(&players).into_entries(),
        winner,
    }))
}
