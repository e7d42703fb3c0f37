use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use database::{NewAnswer, PlayerRecord, RoomRecord, SessionRecord, TriviaStore};
use serde::{Deserialize, Serialize};
use tracing::info;
use types::{validation, GamePhase, LeaderboardEntry};
use uuid::Uuid;

use super::rooms::{OptionView, TriviaSummary};
use super::{load_questions, ranked, winner_view, WinnerView};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub display_name: Option<String>,
    pub room_code: Option<String>,
    pub room_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub player_id: Uuid,
    pub session_id: i64,
    pub room_id: i64,
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question_id: Option<i64>,
    #[serde(default)]
    pub selected_option_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub question_id: i64,
    pub correct: bool,
    pub awarded: i64,
    pub new_score: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerQuestionView {
    pub id: i64,
    pub question: String,
    pub options: Vec<OptionView>,
    pub time_limit_ms: i64,
    pub remaining_ms: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStateView {
    pub room_id: i64,
    pub session_id: i64,
    pub code: String,
    pub phase: GamePhase,
    pub game_started: bool,
    pub game_ended: bool,
    pub question_index: usize,
    pub question_count: usize,
    pub trivia: TriviaSummary,
    pub current_question: Option<PlayerQuestionView>,
    pub answered_current: bool,
    pub me: LeaderboardEntry,
    pub players: Vec<LeaderboardEntry>,
    pub winner: Option<WinnerView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLiveView {
    pub phase: GamePhase,
    pub game_started: bool,
    pub game_ended: bool,
    pub question_index: usize,
    pub players: Vec<LeaderboardEntry>,
}

fn join_fields(payload: &JoinRequest) -> Result<(String, String), ApiError> {
    let name = validation::display_name(payload.display_name.as_deref().unwrap_or_default())?;
    let code = validation::room_code(payload.room_code.as_deref().unwrap_or_default())?;
    Ok((name, code))
}

async fn join_session(
    store: &dyn TriviaStore,
    session: SessionRecord,
    name: &str,
) -> Result<Json<JoinResponse>, ApiError> {
    let player = store.add_player(session.id, name).await?;
    info!(
        room_id = session.room_id,
        session_id = session.id,
        player_id = %player.id,
        "Player joined"
    );

    Ok(Json(JoinResponse {
        player_id: player.id,
        session_id: session.id,
        room_id: session.room_id,
        username: player.username,
    }))
}

pub async fn join_room_handler(
    State(state): State<AppState>,
    ApiPath(room_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<JoinRequest>,
) -> Result<Json<JoinResponse>, ApiError> {
    let (name, code) = join_fields(&payload)?;
    if payload.room_id.is_some_and(|id| id != room_id) {
        return Err(ApiError::BadRequest("Room ID mismatch".to_string()));
    }

    let session = state
        .store
        .active_session(room_id)
        .await?
        .filter(|session| session.code == code)
        .ok_or_else(|| {
            ApiError::NotFound("No active session found for this room and code".to_string())
        })?;

    join_session(state.store.as_ref(), session, &name).await
}

pub async fn join_by_code_handler(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<JoinRequest>,
) -> Result<Json<JoinResponse>, ApiError> {
    let (name, code) = join_fields(&payload)?;
    let session = state
        .store
        .active_session_by_code(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound("No active session found for this code".to_string()))?;

    join_session(state.store.as_ref(), session, &name).await
}

struct PlayerContext {
    player: PlayerRecord,
    session: SessionRecord,
    room: RoomRecord,
}

async fn player_context(store: &dyn TriviaStore, player_id: Uuid) -> Result<PlayerContext, ApiError> {
    let player = store
        .get_player(player_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Player"))?;
    let session = store
        .get_session(player.session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session"))?;
    let room = store
        .get_room(session.room_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Room"))?;

    Ok(PlayerContext {
        player,
        session,
        room,
    })
}

fn elapsed_ms(started_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u64 {
    started_at
        .map(|at| (now - at).num_milliseconds().max(0) as u64)
        .unwrap_or(0)
}

pub async fn player_state_handler(
    State(state): State<AppState>,
    ApiPath(player_id): ApiPath<Uuid>,
) -> Result<Json<PlayerStateView>, ApiError> {
    let store = state.store.as_ref();
    let PlayerContext {
        player,
        session,
        room,
    } = player_context(store, player_id).await?;
    let trivia = store
        .get_trivia(session.trivia_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Trivia set"))?;
    let questions = load_questions(store, trivia.id).await?;
    let players = store.list_players(session.id).await?;
    let board = ranked(&players);

    let phase = session.phase();
    let cursor = session.state(questions.len()).cursor();

    let mut answered_current = false;
    let current_question = match cursor.current(&questions) {
        Some(question) if phase == GamePhase::Live => {
            answered_current = store.has_answered(player.id, question.id).await?;
            let elapsed = elapsed_ms(session.question_started_at, Utc::now()) as i64;
            Some(PlayerQuestionView {
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
                time_limit_ms: room.time_limit_ms,
                remaining_ms: (room.time_limit_ms - elapsed).max(0),
            })
        }
        _ => None,
    };

    let me = board
        .position_of(player.id)
        .cloned()
        .unwrap_or_else(|| LeaderboardEntry {
            id: player.id,
            username: player.username.clone(),
            score: player.score,
            rank: board.len() + 1,
        });
    let winner = winner_view(store, &session, &players).await?;

    Ok(Json(PlayerStateView {
        room_id: room.id,
        session_id: session.id,
        code: session.code.clone(),
        phase,
        game_started: phase == GamePhase::Live,
        game_ended: phase == GamePhase::Ended,
        question_index: cursor.index(),
        question_count: cursor.count(),
        trivia: TriviaSummary {
            id: trivia.id,
            name: trivia.name,
        },
        current_question,
        answered_current,
        me,
        players: board.into_entries(),
        winner,
    }))
}

pub async fn player_live_handler(
    State(state): State<AppState>,
    ApiPath(player_id): ApiPath<Uuid>,
) -> Result<Json<PlayerLiveView>, ApiError> {
    let store = state.store.as_ref();
    let player = store
        .get_player(player_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Player"))?;
    let session = store
        .get_session(player.session_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session"))?;
    let players = store.list_players(session.id).await?;

    let phase = session.phase();
    Ok(Json(PlayerLiveView {
        phase,
        game_started: phase == GamePhase::Live,
        game_ended: phase == GamePhase::Ended,
        question_index: session.current_question_index.max(0) as usize,
        players: ranked(&players).into_entries(),
    }))
}

/// Scores an answer against the question that is open right now. Points come
/// from the time since the question opened, never from the client.
pub async fn answer_handler(
    State(state): State<AppState>,
    ApiPath(player_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AnswerRequest>,
) -> Result<Json<AnswerResponse>, ApiError> {
    let store = state.store.as_ref();
    let question_id = payload
        .question_id
        .ok_or_else(|| ApiError::BadRequest("questionId is required".to_string()))?;
    let PlayerContext {
        player,
        session,
        room,
    } = player_context(store, player_id).await?;

    let questions = load_questions(store, session.trivia_id).await?;
    let session_state = session.state(questions.len());
    session_state.check_answer()?;

    let question = session_state
        .cursor()
        .current(&questions)
        .filter(|q| q.id == question_id)
        .ok_or_else(|| ApiError::BadRequest("Question is not the current question".to_string()))?;

    let is_correct = match payload.selected_option_id {
        Some(option_id) => {
            question
                .option(option_id)
                .ok_or_else(|| {
                    ApiError::BadRequest("Option does not belong to this question".to_string())
                })?
                .is_correct
        }
        None => false,
    };

    let now = Utc::now();
    let elapsed = elapsed_ms(session.question_started_at, now);
    let awarded = state
        .scoring
        .award(is_correct, elapsed, room.time_limit_ms.max(0) as u64);

    let updated = store
        .record_answer(&NewAnswer {
            session_id: session.id,
            player_id: player.id,
            question_id: question.id,
            option_id: payload.selected_option_id,
            is_correct,
            response_time_ms: elapsed as i64,
            points: awarded,
            answered_at: now,
        })
        .await?;
    info!(
        session_id = session.id,
        player_id = %player.id,
        question_id,
        is_correct,
        awarded,
        "Answer recorded"
    );

    Ok(Json(AnswerResponse {
        question_id: question.id,
        correct: is_correct,
        awarded,
        new_score: updated.score,
    }))
}
