//! End-to-end tests for the SQLite store: a catalog is seeded from YAML, then
//! a room is played from lobby to history through the `TriviaStore` trait.

use chrono::{Duration, Utc};
use database::{
    DatabaseConfig, NewAnswer, NewRoom, SeedCatalog, SqliteStore, TriviaStore,
    WinnerPick,
};
use types::{GamePhase, Leaderboard, Question, ScoringRules, Standing, TransitionError};

const CATALOG: &str = r#"
categories:
  - name: Geography
    slug: geography
    trivia:
      - name: Capitals
        questions:
          - question: Capital of France?
            options:
              - text: Paris
                correct: true
              - text: Lyon
          - question: Capital of Japan?
            options:
              - text: Osaka
              - text: Tokyo
                correct: true
"#;

async fn setup_store() -> Box<dyn TriviaStore> {
    let config = DatabaseConfig::from_cli_or_env_or_yaml(Some("sqlite::memory:".to_string()), None);
    let pool = config.create_pool().await.expect("Failed to create pool");
    let store = SqliteStore::new(pool);
    store.run_migrations().await.expect("Failed to run migrations");
    Box::new(store)
}

#[tokio::test]
async fn test_seed_is_idempotent() {
    let store = setup_store().await;
    let catalog = SeedCatalog::from_yaml(CATALOG).unwrap();

    let first = catalog.load_into(store.as_ref()).await.unwrap();
    assert_eq!(first.trivia_sets, 1);
    assert_eq!(first.questions, 2);

    let second = catalog.load_into(store.as_ref()).await.unwrap();
    assert_eq!(second.trivia_sets, 0);
    assert_eq!(second.skipped_trivia_sets, 1);

    let categories = store.list_categories().await.unwrap();
    assert_eq!(categories.len(), 1);
    let trivia = store.list_trivia(categories[0].id).await.unwrap();
    assert_eq!(trivia.len(), 1);
    assert_eq!(trivia[0].question_count, 2);
}

#[tokio::test]
async fn test_game_from_lobby_to_history() {
    let store = setup_store().await;
    SeedCatalog::from_yaml(CATALOG)
        .unwrap()
        .load_into(store.as_ref())
        .await
        .unwrap();
    let category = store.list_categories().await.unwrap().remove(0);
    let trivia = store.list_trivia(category.id).await.unwrap().remove(0);
    let questions: Vec<Question> = store
        .list_questions(trivia.id)
        .await
        .unwrap()
        .into_iter()
        .map(Question::from)
        .collect();

    let (room, session) = store
        .create_room(NewRoom {
            code: "CAPS".to_string(),
            host_admin_id: None,
            time_limit_ms: 10_000,
            category_id: Some(category.id),
            trivia_id: trivia.id,
        })
        .await
        .unwrap();
    assert_eq!(session.phase(), GamePhase::Lobby);

    let ada = store.add_player(session.id, "Ada").await.unwrap();
    let bob = store.add_player(session.id, "Bob").await.unwrap();

    let state = session.state(questions.len());
    assert_eq!(state.check_answer(), Err(TransitionError::NotStarted));
    state.check_start().unwrap();

    let started_at = Utc::now();
    let session = store.start_session(session.id, started_at).await.unwrap();
    assert_eq!(session.phase(), GamePhase::Live);

    let rules = ScoringRules::default();
    let answer_all = |question: &Question, elapsed_ms: u64| {
        let correct = question.correct_option_ids()[0];
        let wrong = question
            .options
            .iter()
            .find(|o| !o.is_correct)
            .map(|o| o.id)
            .unwrap();
        let at = started_at + Duration::milliseconds(elapsed_ms as i64);
        [
            (ada.id, Some(correct), true),
            (bob.id, Some(wrong), false),
        ]
        .map(|(player_id, option_id, is_correct)| NewAnswer {
            session_id: session.id,
            player_id,
            question_id: question.id,
            option_id,
            is_correct,
            response_time_ms: elapsed_ms as i64,
            points: rules.award(is_correct, elapsed_ms, 10_000),
            answered_at: at,
        })
    };

    for answer in answer_all(&questions[0], 0) {
        store.record_answer(&answer).await.unwrap();
    }
    assert_eq!(store.count_answers(session.id, questions[0].id).await.unwrap(), 2);

    let next = session.state(questions.len()).check_advance().unwrap();
    assert_eq!(next, 1);
    let session = store
        .advance_question(session.id, 0, Utc::now())
        .await
        .unwrap();
    assert_eq!(session.current_question_index, 1);
    assert!(matches!(
        session.state(questions.len()).check_advance(),
        Err(TransitionError::AtLastQuestion { .. })
    ));

    // past the time limit only the base points count
    for answer in answer_all(&questions[1], 20_000) {
        store.record_answer(&answer).await.unwrap();
    }

    let players = store.list_players(session.id).await.unwrap();
    let board = Leaderboard::rank(players.iter().map(Standing::from));
    let leader = board.top().unwrap();
    assert_eq!(leader.id, ada.id);
    assert_eq!(leader.score, 150 + 100);
    assert_eq!(board.position_of(bob.id).unwrap().score, 0);

    let (ended, winner) = store
        .end_session(
            session.id,
            Some(WinnerPick {
                player_id: leader.id,
                score: leader.score,
            }),
            Utc::now(),
        )
        .await
        .unwrap();
    assert_eq!(ended.phase(), GamePhase::Ended);
    assert_eq!(winner.unwrap().player_id, ada.id);
    assert!(store.active_session(room.id).await.unwrap().is_none());
    assert_eq!(store.get_room(room.id).await.unwrap().unwrap().status, "ended");

    let history = store.list_history(10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].trivia_name, "Capitals");
    assert_eq!(history[0].winner_name.as_deref(), Some("Ada"));
    assert_eq!(history[0].winner_score, Some(250));
}
