use std::collections::HashMap;

use super::TriviaStore;
use crate::models::*;
use crate::DatabaseError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

const ROOM_COLUMNS: &str = "SELECT r.id, r.code, r.status, r.host_admin_id, r.time_limit_ms,
        (SELECT MIN(rc.category_id) FROM room_categories rc WHERE rc.room_id = r.id) AS category_id,
        r.created_at
     FROM rooms r";

const SESSION_COLUMNS: &str = "SELECT id, room_id, trivia_id, code, start_time, end_time,
        current_question_index, question_started_at, created_at
     FROM sessions";

const TRIVIA_COLUMNS: &str = "SELECT t.id, t.category_id, t.name,
        (SELECT COUNT(*) FROM questions q WHERE q.trivia_id = t.id) AS question_count
     FROM trivia t";

async fn insert_question_rows(
    conn: &mut SqliteConnection,
    trivia_id: i64,
    position: i64,
    text: &str,
    options: &[NewOption],
) -> Result<i64, sqlx::Error> {
    let question_id = sqlx::query(
        "INSERT INTO questions (trivia_id, position, text) VALUES (?, ?, ?)",
    )
    .bind(trivia_id)
    .bind(position)
    .bind(text)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    for (option_position, option) in options.iter().enumerate() {
        sqlx::query(
            "INSERT INTO options (question_id, position, text, is_correct) VALUES (?, ?, ?, ?)",
        )
        .bind(question_id)
        .bind(option_position as i64)
        .bind(&option.text)
        .bind(option.is_correct)
        .execute(&mut *conn)
        .await?;
    }
    Ok(question_id)
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DatabaseError::Migration(e.to_string()))?;
        tracing::info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn player_from_row(row: &SqliteRow) -> Result<PlayerRecord, DatabaseError> {
    let id: String = row.try_get("id").map_err(DatabaseError::query)?;
    Ok(PlayerRecord {
        id: Uuid::parse_str(&id)?,
        session_id: row.try_get("session_id").map_err(DatabaseError::query)?,
        username: row.try_get("username").map_err(DatabaseError::query)?,
        score: row.try_get("score").map_err(DatabaseError::query)?,
        joined_at: row.try_get("joined_at").map_err(DatabaseError::query)?,
    })
}

fn winner_from_row(row: &SqliteRow) -> Result<WinnerRecord, DatabaseError> {
    let player_id: String = row.try_get("player_id").map_err(DatabaseError::query)?;
    Ok(WinnerRecord {
        id: row.try_get("id").map_err(DatabaseError::query)?,
        session_id: row.try_get("session_id").map_err(DatabaseError::query)?,
        player_id: Uuid::parse_str(&player_id)?,
        score: row.try_get("score").map_err(DatabaseError::query)?,
        created_at: row.try_get("created_at").map_err(DatabaseError::query)?,
    })
}

#[async_trait::async_trait]
impl TriviaStore for SqliteStore {
    async fn list_categories(&self) -> Result<Vec<CategoryRecord>, DatabaseError> {
        sqlx::query_as::<_, CategoryRecord>("SELECT id, name, slug FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::query)
    }

    async fn get_category(&self, category_id: i64) -> Result<Option<CategoryRecord>, DatabaseError> {
        sqlx::query_as::<_, CategoryRecord>("SELECT id, name, slug FROM categories WHERE id = ?")
            .bind(category_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::query)
    }

    async fn upsert_category(&self, name: &str, slug: &str) -> Result<i64, DatabaseError> {
        sqlx::query(
            "INSERT INTO categories (name, slug) VALUES (?, ?)
             ON CONFLICT(slug) DO UPDATE SET name = excluded.name",
        )
        .bind(name)
        .bind(slug)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        sqlx::query_scalar("SELECT id FROM categories WHERE slug = ?")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::query)
    }

    async fn list_trivia(&self, category_id: i64) -> Result<Vec<TriviaRecord>, DatabaseError> {
        sqlx::query_as::<_, TriviaRecord>(&format!(
            "{TRIVIA_COLUMNS} WHERE t.category_id = ? ORDER BY t.name"
        ))
        .bind(category_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::query)
    }

    async fn get_trivia(&self, trivia_id: i64) -> Result<Option<TriviaRecord>, DatabaseError> {
        sqlx::query_as::<_, TriviaRecord>(&format!("{TRIVIA_COLUMNS} WHERE t.id = ?"))
            .bind(trivia_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::query)
    }

    async fn insert_trivia(&self, category_id: i64, name: &str) -> Result<i64, DatabaseError> {
        let result = sqlx::query("INSERT INTO trivia (category_id, name) VALUES (?, ?)")
            .bind(category_id)
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DatabaseError::conflict_or_query(e, "Trivia set already exists in this category")
            })?;
        Ok(result.last_insert_rowid())
    }

    async fn insert_question(
        &self,
        trivia_id: i64,
        position: i64,
        text: &str,
        options: &[NewOption],
    ) -> Result<i64, DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DatabaseError::transaction)?;
        let question_id = insert_question_rows(&mut *tx, trivia_id, position, text, options)
            .await
            .map_err(DatabaseError::query)?;
        tx.commit().await.map_err(DatabaseError::transaction)?;
        Ok(question_id)
    }

    async fn insert_trivia_set(
        &self,
        category_id: i64,
        name: &str,
        questions: &[NewQuestion],
    ) -> Result<i64, DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DatabaseError::transaction)?;

        let trivia_id = sqlx::query("INSERT INTO trivia (category_id, name) VALUES (?, ?)")
            .bind(category_id)
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DatabaseError::conflict_or_query(e, "Trivia set already exists in this category")
            })?
            .last_insert_rowid();

        for (position, question) in questions.iter().enumerate() {
            insert_question_rows(
                &mut *tx,
                trivia_id,
                position as i64,
                &question.text,
                &question.options,
            )
            .await
            .map_err(DatabaseError::query)?;
        }

        tx.commit().await.map_err(DatabaseError::transaction)?;
        Ok(trivia_id)
    }

    async fn list_questions(&self, trivia_id: i64) -> Result<Vec<QuestionRecord>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT id, trivia_id, position, text FROM questions
             WHERE trivia_id = ? ORDER BY position, id",
        )
        .bind(trivia_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        let options = sqlx::query_as::<_, OptionRecord>(
            "SELECT o.id, o.question_id, o.position, o.text, o.is_correct
             FROM options o JOIN questions q ON q.id = o.question_id
             WHERE q.trivia_id = ? ORDER BY o.position, o.id",
        )
        .bind(trivia_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        let mut options_by_question: HashMap<i64, Vec<OptionRecord>> = HashMap::new();
        for option in options {
            options_by_question
                .entry(option.question_id)
                .or_default()
                .push(option);
        }

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("id").map_err(DatabaseError::query)?;
                Ok(QuestionRecord {
                    id,
                    trivia_id: row.try_get("trivia_id").map_err(DatabaseError::query)?,
                    position: row.try_get("position").map_err(DatabaseError::query)?,
                    text: row.try_get("text").map_err(DatabaseError::query)?,
                    options: options_by_question.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }

    async fn insert_admin(
        &self,
        email: &str,
        name: &str,
        pass_hash: &str,
    ) -> Result<i64, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO admins (email, name, pass_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(email)
        .bind(name)
        .bind(pass_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::conflict_or_query(e, "An admin with that email already exists"))?;
        Ok(result.last_insert_rowid())
    }

    async fn find_admin_by_email(&self, email: &str) -> Result<Option<AdminRecord>, DatabaseError> {
        sqlx::query_as::<_, AdminRecord>(
            "SELECT id, email, name, pass_hash, created_at FROM admins WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::query)
    }

    async fn get_admin(&self, admin_id: i64) -> Result<Option<AdminRecord>, DatabaseError> {
        sqlx::query_as::<_, AdminRecord>(
            "SELECT id, email, name, pass_hash, created_at FROM admins WHERE id = ?",
        )
        .bind(admin_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::query)
    }

    async fn create_room(
        &self,
        room: NewRoom,
    ) -> Result<(RoomRecord, SessionRecord), DatabaseError> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DatabaseError::transaction)?;

        let room_id = sqlx::query(
            "INSERT INTO rooms (code, status, host_admin_id, time_limit_ms, created_at)
             VALUES (?, 'lobby', ?, ?, ?)",
        )
        .bind(&room.code)
        .bind(room.host_admin_id)
        .bind(room.time_limit_ms)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| DatabaseError::conflict_or_query(e, "Room code is already in use"))?
        .last_insert_rowid();

        if let Some(category_id) = room.category_id {
            sqlx::query("INSERT INTO room_categories (room_id, category_id) VALUES (?, ?)")
                .bind(room_id)
                .bind(category_id)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::query)?;
        }

        let session_id = sqlx::query(
            "INSERT INTO sessions (room_id, trivia_id, code, current_question_index, created_at)
             VALUES (?, ?, ?, 0, ?)",
        )
        .bind(room_id)
        .bind(room.trivia_id)
        .bind(&room.code)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| DatabaseError::conflict_or_query(e, "Room code is already in use"))?
        .last_insert_rowid();

        tx.commit().await.map_err(DatabaseError::transaction)?;
        tracing::info!(room_id, session_id, code = %room.code, "Created room");

        let room = self
            .get_room(room_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Room not found".to_string()))?;
        let session = self
            .get_session(session_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Session not found".to_string()))?;
        Ok((room, session))
    }

    async fn list_rooms(&self, limit: i64) -> Result<Vec<RoomRecord>, DatabaseError> {
        sqlx::query_as::<_, RoomRecord>(&format!(
            "{ROOM_COLUMNS} ORDER BY r.created_at DESC, r.id DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::query)
    }

    async fn get_room(&self, room_id: i64) -> Result<Option<RoomRecord>, DatabaseError> {
        sqlx::query_as::<_, RoomRecord>(&format!("{ROOM_COLUMNS} WHERE r.id = ?"))
            .bind(room_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::query)
    }

    async fn set_room_category(
        &self,
        room_id: i64,
        category_id: Option<i64>,
    ) -> Result<RoomRecord, DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DatabaseError::transaction)?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::query)?;
        if exists.is_none() {
            return Err(DatabaseError::NotFound("Room not found".to_string()));
        }

        sqlx::query("DELETE FROM room_categories WHERE room_id = ?")
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::query)?;

        if let Some(category_id) = category_id {
            sqlx::query("INSERT INTO room_categories (room_id, category_id) VALUES (?, ?)")
                .bind(room_id)
                .bind(category_id)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::query)?;
        }

        tx.commit().await.map_err(DatabaseError::transaction)?;

        self.get_room(room_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Room not found".to_string()))
    }

    async fn delete_room(&self, room_id: i64) -> Result<RoomDeletion, DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DatabaseError::transaction)?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(DatabaseError::query)?;
        if exists.is_none() {
            return Err(DatabaseError::NotFound("Room not found".to_string()));
        }

        let mut deletion = RoomDeletion::default();
        let in_room = "(SELECT id FROM sessions WHERE room_id = ?)";

        deletion.answers = sqlx::query(&format!("DELETE FROM answers WHERE session_id IN {in_room}"))
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::query)?
            .rows_affected();

        deletion.winners = sqlx::query(&format!("DELETE FROM winners WHERE session_id IN {in_room}"))
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::query)?
            .rows_affected();

        deletion.players = sqlx::query(&format!("DELETE FROM players WHERE session_id IN {in_room}"))
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::query)?
            .rows_affected();

        deletion.sessions = sqlx::query("DELETE FROM sessions WHERE room_id = ?")
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::query)?
            .rows_affected();

        deletion.category_links = sqlx::query("DELETE FROM room_categories WHERE room_id = ?")
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::query)?
            .rows_affected();

        sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::query)?;

        tx.commit().await.map_err(DatabaseError::transaction)?;
        tracing::info!(room_id, ?deletion, "Deleted room");
        Ok(deletion)
    }

    async fn get_session(&self, session_id: i64) -> Result<Option<SessionRecord>, DatabaseError> {
        sqlx::query_as::<_, SessionRecord>(&format!("{SESSION_COLUMNS} WHERE id = ?"))
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::query)
    }

    async fn latest_session(&self, room_id: i64) -> Result<Option<SessionRecord>, DatabaseError> {
        sqlx::query_as::<_, SessionRecord>(&format!(
            "{SESSION_COLUMNS} WHERE room_id = ? ORDER BY id DESC LIMIT 1"
        ))
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::query)
    }

    async fn active_session(&self, room_id: i64) -> Result<Option<SessionRecord>, DatabaseError> {
        sqlx::query_as::<_, SessionRecord>(&format!(
            "{SESSION_COLUMNS} WHERE room_id = ? AND end_time IS NULL ORDER BY id DESC LIMIT 1"
        ))
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::query)
    }

    async fn active_session_by_code(
        &self,
        code: &str,
    ) -> Result<Option<SessionRecord>, DatabaseError> {
        sqlx::query_as::<_, SessionRecord>(&format!(
            "{SESSION_COLUMNS} WHERE code = ? AND end_time IS NULL ORDER BY id DESC LIMIT 1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::query)
    }

    async fn open_session(
        &self,
        room_id: i64,
        trivia_id: i64,
        code: &str,
    ) -> Result<SessionRecord, DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DatabaseError::transaction)?;

        let active: Option<i64> =
            sqlx::query_scalar("SELECT id FROM sessions WHERE room_id = ? AND end_time IS NULL")
                .bind(room_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(DatabaseError::query)?;
        if active.is_some() {
            return Err(DatabaseError::Conflict(
                "Room already has an active session".to_string(),
            ));
        }

        let updated = sqlx::query("UPDATE rooms SET code = ?, status = 'lobby' WHERE id = ?")
            .bind(code)
            .bind(room_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::conflict_or_query(e, "Room code is already in use"))?;
        if updated.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("Room not found".to_string()));
        }

        let session_id = sqlx::query(
            "INSERT INTO sessions (room_id, trivia_id, code, current_question_index, created_at)
             VALUES (?, ?, ?, 0, ?)",
        )
        .bind(room_id)
        .bind(trivia_id)
        .bind(code)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| DatabaseError::conflict_or_query(e, "Room already has an active session"))?
        .last_insert_rowid();

        tx.commit().await.map_err(DatabaseError::transaction)?;
        tracing::info!(room_id, session_id, code, "Opened session");

        self.get_session(session_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Session not found".to_string()))
    }

    async fn start_session(
        &self,
        session_id: i64,
        at: DateTime<Utc>,
    ) -> Result<SessionRecord, DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DatabaseError::transaction)?;

        let updated = sqlx::query(
            "UPDATE sessions
             SET start_time = ?, current_question_index = 0, question_started_at = ?
             WHERE id = ? AND start_time IS NULL AND end_time IS NULL",
        )
        .bind(at)
        .bind(at)
        .bind(session_id)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::query)?;
        if updated.rows_affected() == 0 {
            return Err(DatabaseError::Conflict(
                "Game has already started".to_string(),
            ));
        }

        sqlx::query(
            "UPDATE rooms SET status = 'live'
             WHERE id = (SELECT room_id FROM sessions WHERE id = ?)",
        )
        .bind(session_id)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::query)?;

        tx.commit().await.map_err(DatabaseError::transaction)?;

        self.get_session(session_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Session not found".to_string()))
    }

    async fn advance_question(
        &self,
        session_id: i64,
        expected_index: i64,
        at: DateTime<Utc>,
    ) -> Result<SessionRecord, DatabaseError> {
        // The index guard makes a second concurrent "next" a no-op instead of
        // a double increment; the count guard keeps the index in range.
        let updated = sqlx::query(
            "UPDATE sessions
             SET current_question_index = current_question_index + 1, question_started_at = ?
             WHERE id = ?
               AND current_question_index = ?
               AND start_time IS NOT NULL
               AND end_time IS NULL
               AND current_question_index + 1 <
                   (SELECT COUNT(*) FROM questions q WHERE q.trivia_id = sessions.trivia_id)",
        )
        .bind(at)
        .bind(session_id)
        .bind(expected_index)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        if updated.rows_affected() == 0 {
            return Err(DatabaseError::Conflict(
                "Question was already advanced".to_string(),
            ));
        }

        self.get_session(session_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Session not found".to_string()))
    }

    async fn end_session(
        &self,
        session_id: i64,
        winner: Option<WinnerPick>,
        at: DateTime<Utc>,
    ) -> Result<(SessionRecord, Option<WinnerRecord>), DatabaseError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DatabaseError::transaction)?;

        let updated =
            sqlx::query("UPDATE sessions SET end_time = ? WHERE id = ? AND end_time IS NULL")
                .bind(at)
                .bind(session_id)
                .execute(&mut *tx)
                .await
                .map_err(DatabaseError::query)?;
        if updated.rows_affected() == 0 {
            return Err(DatabaseError::Conflict("Game has already ended".to_string()));
        }

        if let Some(pick) = winner {
            let player_id = pick.player_id.to_string();
            let belongs: Option<String> =
                sqlx::query_scalar("SELECT id FROM players WHERE id = ? AND session_id = ?")
                    .bind(&player_id)
                    .bind(session_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(DatabaseError::query)?;
            if belongs.is_none() {
                return Err(DatabaseError::NotFound(
                    "Winner does not belong to this session".to_string(),
                ));
            }

            sqlx::query(
                "INSERT INTO winners (session_id, player_id, score, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(session_id)
            .bind(&player_id)
            .bind(pick.score)
            .bind(at)
            .execute(&mut *tx)
            .await
            .map_err(|e| DatabaseError::conflict_or_query(e, "Winner already recorded"))?;
        }

        sqlx::query(
            "UPDATE rooms SET status = 'ended'
             WHERE id = (SELECT room_id FROM sessions WHERE id = ?)",
        )
        .bind(session_id)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::query)?;

        tx.commit().await.map_err(DatabaseError::transaction)?;

        let session = self
            .get_session(session_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Session not found".to_string()))?;
        let winner = self.get_winner(session_id).await?;
        tracing::info!(
            session_id,
            winner = ?winner.as_ref().map(|w| w.player_id),
            "Ended session"
        );
        Ok((session, winner))
    }

    async fn get_winner(&self, session_id: i64) -> Result<Option<WinnerRecord>, DatabaseError> {
        let row = sqlx::query(
            "SELECT id, session_id, player_id, score, created_at FROM winners WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        row.as_ref().map(winner_from_row).transpose()
    }

    async fn list_history(&self, limit: i64) -> Result<Vec<HistoryEntry>, DatabaseError> {
        sqlx::query_as::<_, HistoryEntry>(
            "SELECT s.room_id AS room_id, s.id AS session_id, t.name AS trivia_name,
                    p.username AS winner_name, w.score AS winner_score, s.end_time AS ended_at
             FROM sessions s
             JOIN trivia t ON t.id = s.trivia_id
             LEFT JOIN winners w ON w.session_id = s.id
             LEFT JOIN players p ON p.id = w.player_id
             WHERE s.end_time IS NOT NULL
             ORDER BY s.end_time DESC, s.id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::query)
    }

    async fn add_player(
        &self,
        session_id: i64,
        username: &str,
    ) -> Result<PlayerRecord, DatabaseError> {
        let player = PlayerRecord {
            id: Uuid::new_v4(),
            session_id,
            username: username.to_string(),
            score: 0,
            joined_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO players (id, session_id, username, score, joined_at) VALUES (?, ?, ?, 0, ?)",
        )
        .bind(player.id.to_string())
        .bind(session_id)
        .bind(&player.username)
        .bind(player.joined_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::conflict_or_query(e, "That name is already taken in this game"))?;

        tracing::debug!(session_id, player_id = %player.id, "Player joined");
        Ok(player)
    }

    async fn get_player(&self, player_id: Uuid) -> Result<Option<PlayerRecord>, DatabaseError> {
        let row = sqlx::query(
            "SELECT id, session_id, username, score, joined_at FROM players WHERE id = ?",
        )
        .bind(player_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        row.as_ref().map(player_from_row).transpose()
    }

    async fn list_players(&self, session_id: i64) -> Result<Vec<PlayerRecord>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT id, session_id, username, score, joined_at FROM players
             WHERE session_id = ? ORDER BY score DESC, joined_at ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::query)?;

        rows.iter().map(player_from_row).collect()
    }

    async fn record_answer(&self, answer: &NewAnswer) -> Result<PlayerRecord, DatabaseError> {
        let player_id = answer.player_id.to_string();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DatabaseError::transaction)?;

        sqlx::query(
            "INSERT INTO answers
                (session_id, player_id, question_id, option_id, is_correct, response_time_ms, points, answered_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(answer.session_id)
        .bind(&player_id)
        .bind(answer.question_id)
        .bind(answer.option_id)
        .bind(answer.is_correct)
        .bind(answer.response_time_ms)
        .bind(answer.points.max(0))
        .bind(answer.answered_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            DatabaseError::conflict_or_query(e, "Answer already submitted for this question")
        })?;

        let updated = sqlx::query(
            "UPDATE players SET score = score + ? WHERE id = ? AND session_id = ?",
        )
        .bind(answer.points.max(0))
        .bind(&player_id)
        .bind(answer.session_id)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::query)?;
        if updated.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("Player not found".to_string()));
        }

        let row = sqlx::query(
            "SELECT id, session_id, username, score, joined_at FROM players WHERE id = ?",
        )
        .bind(&player_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::query)?;
        let player = player_from_row(&row)?;

        tx.commit().await.map_err(DatabaseError::transaction)?;
        Ok(player)
    }

    async fn has_answered(
        &self,
        player_id: Uuid,
        question_id: i64,
    ) -> Result<bool, DatabaseError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM answers WHERE player_id = ? AND question_id = ?",
        )
        .bind(player_id.to_string())
        .bind(question_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::query)?;
        Ok(count > 0)
    }

    async fn count_answers(
        &self,
        session_id: i64,
        question_id: i64,
    ) -> Result<i64, DatabaseError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM answers WHERE session_id = ? AND question_id = ?")
            .bind(session_id)
            .bind(question_id)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::query)
    }
}
