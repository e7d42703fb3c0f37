#[cfg(test)]
mod database_tests {
    use crate::*;
    use chrono::Utc;

    pub async fn setup_test_store() -> SqliteStore {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test database pool");
        let store = SqliteStore::new(pool);
        store
            .run_migrations()
            .await
            .expect("Failed to run migrations");
        store
    }

    /// One category holding one trivia set of `num_questions` two-option
    /// questions, where the first option is always the correct one.
    async fn seed_trivia(store: &SqliteStore, num_questions: usize) -> (i64, i64) {
        let category_id = store
            .upsert_category("General", "general")
            .await
            .expect("Failed to insert category");
        let trivia_id = store
            .insert_trivia(category_id, "Warmup")
            .await
            .expect("Failed to insert trivia");
        for position in 0..num_questions {
            store
                .insert_question(
                    trivia_id,
                    position as i64,
                    &format!("Question {position}"),
                    &[
                        NewOption {
                            text: "Right".to_string(),
                            is_correct: true,
                        },
                        NewOption {
                            text: "Wrong".to_string(),
                            is_correct: false,
                        },
                    ],
                )
                .await
                .expect("Failed to insert question");
        }
        (category_id, trivia_id)
    }

    async fn create_room(store: &SqliteStore, code: &str, trivia_id: i64) -> (RoomRecord, SessionRecord) {
        store
            .create_room(NewRoom {
                code: code.to_string(),
                host_admin_id: None,
                time_limit_ms: 15_000,
                category_id: None,
                trivia_id,
            })
            .await
            .expect("Failed to create room")
    }

    #[tokio::test]
    async fn test_create_room_opens_lobby_session() {
        let store = setup_test_store().await;
        let (category_id, trivia_id) = seed_trivia(&store, 3).await;

        let (room, session) = store
            .create_room(NewRoom {
                code: "ABC123".to_string(),
                host_admin_id: None,
                time_limit_ms: 10_000,
                category_id: Some(category_id),
                trivia_id,
            })
            .await
            .expect("Failed to create room");

        assert_eq!(room.status, "lobby");
        assert_eq!(room.category_id, Some(category_id));
        assert_eq!(session.room_id, room.id);
        assert_eq!(session.code, "ABC123");
        assert_eq!(session.phase(), types::GamePhase::Lobby);
        assert_eq!(session.current_question_index, 0);
    }

    #[tokio::test]
    async fn test_room_code_must_be_unique() {
        let store = setup_test_store().await;
        let (_, trivia_id) = seed_trivia(&store, 1).await;
        create_room(&store, "SAME", trivia_id).await;

        let result = store
            .create_room(NewRoom {
                code: "SAME".to_string(),
                host_admin_id: None,
                time_limit_ms: 15_000,
                category_id: None,
                trivia_id,
            })
            .await;
        assert!(matches!(result, Err(DatabaseError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_duplicate_display_name_rejected() {
        let store = setup_test_store().await;
        let (_, trivia_id) = seed_trivia(&store, 1).await;
        let (_, session) = create_room(&store, "DUPE", trivia_id).await;

        store
            .add_player(session.id, "Ada")
            .await
            .expect("Failed to add player");
        let result = store.add_player(session.id, "Ada").await;

        match result {
            Err(DatabaseError::Conflict(message)) => {
                assert_eq!(message, "That name is already taken in this game")
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        assert_eq!(store.list_players(session.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_advance_never_passes_question_count() {
        let store = setup_test_store().await;
        let (_, trivia_id) = seed_trivia(&store, 2).await;
        let (_, session) = create_room(&store, "ADV", trivia_id).await;

        let session = store
            .start_session(session.id, Utc::now())
            .await
            .expect("Failed to start");
        let session = store
            .advance_question(session.id, session.current_question_index, Utc::now())
            .await
            .expect("Failed to advance");
        assert_eq!(session.current_question_index, 1);

        let result = store
            .advance_question(session.id, session.current_question_index, Utc::now())
            .await;
        assert!(matches!(result, Err(DatabaseError::Conflict(_))));

        let reloaded = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(reloaded.current_question_index, 1);
    }

    #[tokio::test]
    async fn test_stale_advance_does_not_double_increment() {
        let store = setup_test_store().await;
        let (_, trivia_id) = seed_trivia(&store, 5).await;
        let (_, session) = create_room(&store, "RACE", trivia_id).await;
        store.start_session(session.id, Utc::now()).await.unwrap();

        // two host tabs both saw index 0
        store.advance_question(session.id, 0, Utc::now()).await.unwrap();
        let second = store.advance_question(session.id, 0, Utc::now()).await;

        assert!(matches!(second, Err(DatabaseError::Conflict(_))));
        let reloaded = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(reloaded.current_question_index, 1);
    }

    #[tokio::test]
    async fn test_start_twice_is_conflict() {
        let store = setup_test_store().await;
        let (_, trivia_id) = seed_trivia(&store, 1).await;
        let (room, session) = create_room(&store, "START", trivia_id).await;

        store.start_session(session.id, Utc::now()).await.unwrap();
        let again = store.start_session(session.id, Utc::now()).await;
        assert!(matches!(again, Err(DatabaseError::Conflict(_))));

        let room = store.get_room(room.id).await.unwrap().unwrap();
        assert_eq!(room.status, "live");
    }

    #[tokio::test]
    async fn test_end_session_records_exactly_one_winner() {
        let store = setup_test_store().await;
        let (_, trivia_id) = seed_trivia(&store, 1).await;
        let (room, session) = create_room(&store, "WIN", trivia_id).await;
        let ada = store.add_player(session.id, "Ada").await.unwrap();
        store.add_player(session.id, "Grace").await.unwrap();
        store.start_session(session.id, Utc::now()).await.unwrap();

        let (ended, winner) = store
            .end_session(
                session.id,
                Some(WinnerPick {
                    player_id: ada.id,
                    score: 150,
                }),
                Utc::now(),
            )
            .await
            .expect("Failed to end session");

        assert!(ended.end_time.is_some());
        let winner = winner.expect("winner should be recorded");
        assert_eq!(winner.player_id, ada.id);
        assert_eq!(winner.score, 150);

        let winners: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM winners WHERE session_id = ?")
            .bind(session.id)
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(winners, 1);

        let again = store.end_session(session.id, None, Utc::now()).await;
        assert!(matches!(again, Err(DatabaseError::Conflict(_))));

        let room = store.get_room(room.id).await.unwrap().unwrap();
        assert_eq!(room.status, "ended");
    }

    #[tokio::test]
    async fn test_winner_must_belong_to_session() {
        let store = setup_test_store().await;
        let (_, trivia_id) = seed_trivia(&store, 1).await;
        let (_, first) = create_room(&store, "ONE", trivia_id).await;
        let (_, second) = create_room(&store, "TWO", trivia_id).await;
        let outsider = store.add_player(second.id, "Outsider").await.unwrap();

        let result = store
            .end_session(
                first.id,
                Some(WinnerPick {
                    player_id: outsider.id,
                    score: 0,
                }),
                Utc::now(),
            )
            .await;
        assert!(matches!(result, Err(DatabaseError::NotFound(_))));

        // rolled back, so the session is still active
        let session = store.get_session(first.id).await.unwrap().unwrap();
        assert!(session.end_time.is_none());
    }

    #[tokio::test]
    async fn test_answer_scores_once_per_question() {
        let store = setup_test_store().await;
        let (_, trivia_id) = seed_trivia(&store, 1).await;
        let (_, session) = create_room(&store, "ANS", trivia_id).await;
        let player = store.add_player(session.id, "Ada").await.unwrap();
        let question = store.list_questions(trivia_id).await.unwrap().remove(0);

        let answer = NewAnswer {
            session_id: session.id,
            player_id: player.id,
            question_id: question.id,
            option_id: Some(question.options[0].id),
            is_correct: true,
            response_time_ms: 1_200,
            points: 146,
            answered_at: Utc::now(),
        };
        let updated = store.record_answer(&answer).await.unwrap();
        assert_eq!(updated.score, 146);
        assert!(store.has_answered(player.id, question.id).await.unwrap());
        assert_eq!(store.count_answers(session.id, question.id).await.unwrap(), 1);

        let again = store.record_answer(&answer).await;
        assert!(matches!(again, Err(DatabaseError::Conflict(_))));
        let reloaded = store.get_player(player.id).await.unwrap().unwrap();
        assert_eq!(reloaded.score, 146);
    }

    #[tokio::test]
    async fn test_delete_room_cascades() {
        let store = setup_test_store().await;
        let (category_id, trivia_id) = seed_trivia(&store, 1).await;
        let (room, session) = store
            .create_room(NewRoom {
                code: "GONE".to_string(),
                host_admin_id: None,
                time_limit_ms: 15_000,
                category_id: Some(category_id),
                trivia_id,
            })
            .await
            .unwrap();
        let player = store.add_player(session.id, "Ada").await.unwrap();
        let question = store.list_questions(trivia_id).await.unwrap().remove(0);
        store.start_session(session.id, Utc::now()).await.unwrap();
        store
            .record_answer(&NewAnswer {
                session_id: session.id,
                player_id: player.id,
                question_id: question.id,
                option_id: Some(question.options[0].id),
                is_correct: true,
                response_time_ms: 0,
                points: 150,
                answered_at: Utc::now(),
            })
            .await
            .unwrap();
        store
            .end_session(
                session.id,
                Some(WinnerPick {
                    player_id: player.id,
                    score: 150,
                }),
                Utc::now(),
            )
            .await
            .unwrap();

        let deletion = store.delete_room(room.id).await.expect("Failed to delete room");
        assert_eq!(
            deletion,
            RoomDeletion {
                answers: 1,
                winners: 1,
                players: 1,
                sessions: 1,
                category_links: 1,
            }
        );

        for table in ["answers", "winners", "players", "sessions", "room_categories", "rooms"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(store.pool())
                .await
                .unwrap();
            assert_eq!(count, 0, "{table} should be empty");
        }
        assert!(store.get_player(player.id).await.unwrap().is_none());

        let missing = store.delete_room(room.id).await;
        assert!(matches!(missing, Err(DatabaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_one_active_session_per_room() {
        let store = setup_test_store().await;
        let (_, trivia_id) = seed_trivia(&store, 1).await;
        let (room, session) = create_room(&store, "REPLAY", trivia_id).await;

        let busy = store.open_session(room.id, trivia_id, "NEXT1").await;
        assert!(matches!(busy, Err(DatabaseError::Conflict(_))));

        store.end_session(session.id, None, Utc::now()).await.unwrap();
        let replay = store
            .open_session(room.id, trivia_id, "NEXT1")
            .await
            .expect("Failed to open replay session");
        assert_eq!(replay.phase(), types::GamePhase::Lobby);

        let room = store.get_room(room.id).await.unwrap().unwrap();
        assert_eq!(room.code, "NEXT1");
        assert_eq!(room.status, "lobby");
        let active = store.active_session_by_code("NEXT1").await.unwrap().unwrap();
        assert_eq!(active.id, replay.id);
        assert!(store.active_session_by_code("REPLAY").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_lists_ended_sessions() {
        let store = setup_test_store().await;
        let (_, trivia_id) = seed_trivia(&store, 1).await;
        let (room, session) = create_room(&store, "HIST", trivia_id).await;
        let (_, open) = create_room(&store, "OPEN", trivia_id).await;
        let player = store.add_player(session.id, "Ada").await.unwrap();
        store.add_player(open.id, "Bob").await.unwrap();
        store
            .end_session(
                session.id,
                Some(WinnerPick {
                    player_id: player.id,
                    score: 0,
                }),
                Utc::now(),
            )
            .await
            .unwrap();

        let history = store.list_history(50).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].room_id, room.id);
        assert_eq!(history[0].trivia_name, "Warmup");
        assert_eq!(history[0].winner_name.as_deref(), Some("Ada"));
        assert_eq!(history[0].winner_score, Some(0));
    }

    #[tokio::test]
    async fn test_set_room_category_replaces_link() {
        let store = setup_test_store().await;
        let (category_id, trivia_id) = seed_trivia(&store, 1).await;
        let other = store.upsert_category("Music", "music").await.unwrap();
        let (room, _) = create_room(&store, "CAT", trivia_id).await;

        let room = store.set_room_category(room.id, Some(category_id)).await.unwrap();
        assert_eq!(room.category_id, Some(category_id));
        let room = store.set_room_category(room.id, Some(other)).await.unwrap();
        assert_eq!(room.category_id, Some(other));
        let room = store.set_room_category(room.id, None).await.unwrap();
        assert_eq!(room.category_id, None);

        let missing = store.set_room_category(9_999, None).await;
        assert!(matches!(missing, Err(DatabaseError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_catalog_queries() {
        let store = setup_test_store().await;
        let (category_id, trivia_id) = seed_trivia(&store, 3).await;

        let categories = store.list_categories().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].slug, "general");

        // upsert by slug keeps the id
        let again = store.upsert_category("General Knowledge", "general").await.unwrap();
        assert_eq!(again, category_id);

        let trivia = store.list_trivia(category_id).await.unwrap();
        assert_eq!(trivia.len(), 1);
        assert_eq!(trivia[0].question_count, 3);

        let questions = store.list_questions(trivia_id).await.unwrap();
        let texts: Vec<_> = questions.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["Question 0", "Question 1", "Question 2"]);
        assert!(questions.iter().all(|q| q.options.len() == 2));
        assert!(questions.iter().all(|q| q.options[0].is_correct));
    }

    #[tokio::test]
    async fn test_admin_lookup() {
        let store = setup_test_store().await;
        let admin_id = store
            .insert_admin("host@example.com", "Host", "hash")
            .await
            .unwrap();

        let admin = store
            .find_admin_by_email("host@example.com")
            .await
            .unwrap()
            .expect("admin should exist");
        assert_eq!(admin.id, admin_id);
        assert_eq!(admin.name, "Host");
        assert!(store.get_admin(admin_id).await.unwrap().is_some());

        let duplicate = store.insert_admin("host@example.com", "Other", "hash").await;
        assert!(matches!(duplicate, Err(DatabaseError::Conflict(_))));
    }

    fn two_option_question(text: &str, right: &str, wrong: &str) -> NewQuestion {
        NewQuestion {
            text: text.to_string(),
            options: vec![
                NewOption {
                    text: right.to_string(),
                    is_correct: true,
                },
                NewOption {
                    text: wrong.to_string(),
                    is_correct: false,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_trivia_set_insert_is_all_or_nothing() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test database pool");
        let store = SqliteStore::new(pool.clone());
        store.run_migrations().await.expect("Failed to run migrations");
        sqlx::query(
            "CREATE TRIGGER reject_option BEFORE INSERT ON options
             WHEN NEW.text = 'Rejected'
             BEGIN SELECT RAISE(ABORT, 'option rejected'); END",
        )
        .execute(&pool)
        .await
        .expect("Failed to create trigger");

        let category_id = store.upsert_category("General", "general").await.unwrap();
        let broken = [
            two_option_question("First", "Right", "Wrong"),
            two_option_question("Second", "Right", "Rejected"),
        ];
        let result = store.insert_trivia_set(category_id, "Broken", &broken).await;
        assert!(matches!(result, Err(DatabaseError::Query(_))));
        assert!(store.list_trivia(category_id).await.unwrap().is_empty());
        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(orphans, 0);

        let good = [
            two_option_question("First", "Right", "Wrong"),
            two_option_question("Second", "Right", "Wrong"),
        ];
        let trivia_id = store
            .insert_trivia_set(category_id, "Good", &good)
            .await
            .unwrap();
        let questions = store.list_questions(trivia_id).await.unwrap();
        assert_eq!(questions.len(), 2);
        assert!(questions.iter().all(|q| q.options.len() == 2));

        let duplicate = store.insert_trivia_set(category_id, "Good", &good).await;
        assert!(matches!(duplicate, Err(DatabaseError::Conflict(_))));
        let trivia = store.list_trivia(category_id).await.unwrap();
        assert_eq!(trivia.len(), 1);
        assert_eq!(trivia[0].question_count, 2);
    }
}
