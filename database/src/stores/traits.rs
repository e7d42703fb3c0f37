use super::super::models::*;
use super::super::DatabaseError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait TriviaStore: Send + Sync {
    // catalog
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, DatabaseError>;
    async fn get_category(&self, category_id: i64) -> Result<Option<CategoryRecord>, DatabaseError>;
    async fn upsert_category(&self, name: &str, slug: &str) -> Result<i64, DatabaseError>;
    async fn list_trivia(&self, category_id: i64) -> Result<Vec<TriviaRecord>, DatabaseError>;
    async fn get_trivia(&self, trivia_id: i64) -> Result<Option<TriviaRecord>, DatabaseError>;
    async fn insert_trivia(&self, category_id: i64, name: &str) -> Result<i64, DatabaseError>;
    async fn insert_question(
        &self,
        trivia_id: i64,
        position: i64,
        text: &str,
        options: &[NewOption],
    ) -> Result<i64, DatabaseError>;
    /// Inserts a trivia set with all of its questions and options, or nothing.
    async fn insert_trivia_set(
        &self,
        category_id: i64,
        name: &str,
        questions: &[NewQuestion],
    ) -> Result<i64, DatabaseError>;
    async fn list_questions(&self, trivia_id: i64) -> Result<Vec<QuestionRecord>, DatabaseError>;

    // admins
    async fn insert_admin(
        &self,
        email: &str,
        name: &str,
        pass_hash: &str,
    ) -> Result<i64, DatabaseError>;
    async fn find_admin_by_email(&self, email: &str) -> Result<Option<AdminRecord>, DatabaseError>;
    async fn get_admin(&self, admin_id: i64) -> Result<Option<AdminRecord>, DatabaseError>;

    // rooms
    async fn create_room(
        &self,
        room: NewRoom,
    ) -> Result<(RoomRecord, SessionRecord), DatabaseError>;
    async fn list_rooms(&self, limit: i64) -> Result<Vec<RoomRecord>, DatabaseError>;
    async fn get_room(&self, room_id: i64) -> Result<Option<RoomRecord>, DatabaseError>;
    async fn set_room_category(
        &self,
        room_id: i64,
        category_id: Option<i64>,
    ) -> Result<RoomRecord, DatabaseError>;
    async fn delete_room(&self, room_id: i64) -> Result<RoomDeletion, DatabaseError>;

    // sessions
    async fn get_session(&self, session_id: i64) -> Result<Option<SessionRecord>, DatabaseError>;
    async fn latest_session(&self, room_id: i64) -> Result<Option<SessionRecord>, DatabaseError>;
    async fn active_session(&self, room_id: i64) -> Result<Option<SessionRecord>, DatabaseError>;
    async fn active_session_by_code(
        &self,
        code: &str,
    ) -> Result<Option<SessionRecord>, DatabaseError>;
    async fn open_session(
        &self,
        room_id: i64,
        trivia_id: i64,
        code: &str,
    ) -> Result<SessionRecord, DatabaseError>;
    async fn start_session(
        &self,
        session_id: i64,
        at: DateTime<Utc>,
    ) -> Result<SessionRecord, DatabaseError>;
    async fn advance_question(
        &self,
        session_id: i64,
        expected_index: i64,
        at: DateTime<Utc>,
    ) -> Result<SessionRecord, DatabaseError>;
    async fn end_session(
        &self,
        session_id: i64,
        winner: Option<WinnerPick>,
        at: DateTime<Utc>,
    ) -> Result<(SessionRecord, Option<WinnerRecord>), DatabaseError>;
    async fn get_winner(&self, session_id: i64) -> Result<Option<WinnerRecord>, DatabaseError>;
    async fn list_history(&self, limit: i64) -> Result<Vec<HistoryEntry>, DatabaseError>;

    // players and answers
    async fn add_player(
        &self,
        session_id: i64,
        username: &str,
    ) -> Result<PlayerRecord, DatabaseError>;
    async fn get_player(&self, player_id: Uuid) -> Result<Option<PlayerRecord>, DatabaseError>;
    async fn list_players(&self, session_id: i64) -> Result<Vec<PlayerRecord>, DatabaseError>;
    async fn record_answer(&self, answer: &NewAnswer) -> Result<PlayerRecord, DatabaseError>;
    async fn has_answered(&self, player_id: Uuid, question_id: i64)
        -> Result<bool, DatabaseError>;
    async fn count_answers(&self, session_id: i64, question_id: i64)
        -> Result<i64, DatabaseError>;
}
