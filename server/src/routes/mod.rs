use axum::{
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use database::{PlayerRecord, SessionRecord, TriviaStore};
use serde::Serialize;
use serde_json::{json, Value};
use types::{Leaderboard, Question, Standing};
use uuid::Uuid;

use crate::auth::{login_handler, logout_handler, me_handler};
use crate::error::ApiError;
use crate::state::AppState;

pub mod catalog;
pub mod game;
pub mod players;
pub mod rooms;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/me", get(me_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/categories", get(catalog::categories_handler))
        .route("/api/trivia", get(catalog::trivia_handler))
        .route(
            "/api/rooms",
            post(rooms::create_room_handler).get(rooms::list_rooms_handler),
        )
        .route("/api/rooms/history", get(rooms::history_handler))
        .route(
            "/api/rooms/:id",
            get(rooms::room_handler)
                .patch(rooms::update_room_handler)
                .delete(rooms::delete_room_handler),
        )
        .route("/api/rooms/:id/startGame", post(game::start_game_handler))
        .route("/api/rooms/:id/nextQuestion", post(game::next_question_handler))
        .route("/api/rooms/:id/endGame", post(game::end_game_handler))
        .route("/api/rooms/:id/sessions", post(game::new_session_handler))
        .route("/api/rooms/:id/live", get(game::room_live_handler))
        .route("/api/rooms/:id/join", post(players::join_room_handler))
        .route("/api/join", post(players::join_by_code_handler))
        .route("/api/players/:player_id/state", get(players::player_state_handler))
        .route("/api/players/:player_id/live", get(players::player_live_handler))
        .route("/api/players/:player_id/answer", post(players::answer_handler))
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "tap-tap-trivia",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub(crate) async fn load_questions(
    store: &dyn TriviaStore,
    trivia_id: i64,
) -> Result<Vec<Question>, ApiError> {
    Ok(store
        .list_questions(trivia_id)
        .await?
        .into_iter()
        .map(Question::from)
        .collect())
}

pub(crate) async fn active_session(
    store: &dyn TriviaStore,
    room_id: i64,
) -> Result<SessionRecord, ApiError> {
    store
        .active_session(room_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No active session found for this room".to_string()))
}

pub(crate) fn ranked(players: &[PlayerRecord]) -> Leaderboard {
    Leaderboard::rank(players.iter().map(Standing::from))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerView {
    pub player_id: Uuid,
    pub username: String,
    pub score: i64,
}

/// The recorded winner of an ended session, if one was picked.
pub(crate) async fn winner_view(
    store: &dyn TriviaStore,
    session: &SessionRecord,
    players: &[PlayerRecord],
) -> Result<Option<WinnerView>, ApiError> {
    if session.end_time.is_none() {
        return Ok(None);
    }
    let Some(winner) = store.get_winner(session.id).await? else {
        return Ok(None);
    };

    let username = players
        .iter()
        .find(|p| p.id == winner.player_id)
        .map(|p| p.username.clone())
        .unwrap_or_default();
    Ok(Some(WinnerView {
        player_id: winner.player_id,
        username,
        score: winner.score,
    }))
}
