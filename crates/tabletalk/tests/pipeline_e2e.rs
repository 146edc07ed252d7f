//! End-to-end pipeline tests: in-memory SQLite store, scripted model.

#![cfg(feature = "sqlite")]

use std::sync::Arc;
use tabletalk::orchestrator::REJECTION_MESSAGE;
use tabletalk::{
    CatalogBuilder, Orchestrator, PipelineSettings, QueryResult, Route, SessionOptions,
    SessionSummary,
};
use tabletalk_db::{DbConfig, DbValue, QueryStore, SqlStore};
use tabletalk_llm::mock::{CannedResponse, MockProvider};

async fn bank_store() -> SqlStore {
    let store = SqlStore::open(DbConfig::sqlite_memory()).await.unwrap();
    for sql in [
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, balance REAL, age INTEGER)",
        "INSERT INTO users (name, balance, age) VALUES ('ada', 8000.0, 36)",
        "INSERT INTO users (name, balance, age) VALUES ('bob', 8843.0, 41)",
    ] {
        store.fetch_all(sql).await.unwrap();
    }
    store
}

async fn pipeline(llm: &MockProvider) -> Orchestrator {
    let store = bank_store().await;
    let catalog = CatalogBuilder::new().build(&store).await.unwrap();
    Orchestrator::new(Arc::new(store), Arc::new(llm.clone()), catalog)
}

async fn session(orchestrator: &mut Orchestrator, input: &str, show_sql: bool) -> (String, SessionSummary) {
    let mut out = Vec::new();
    let summary = orchestrator
        .run_session(input.as_bytes(), &mut out, SessionOptions { show_sql })
        .await
        .unwrap();
    (String::from_utf8(out).unwrap(), summary)
}

#[tokio::test]
async fn test_average_balance_question() {
    let llm = MockProvider::with_responses(vec![
        CannedResponse::text("SQL_QUERY"),
        CannedResponse::text("```sql\nSELECT AVG(balance) FROM users;\n```"),
        CannedResponse::text("The average balance across all users is 8421.50."),
    ]);
    let orchestrator = pipeline(&llm).await;

    let answer = orchestrator.answer("What is the average balance?").await.unwrap();

    assert_eq!(answer.route, Route::SqlQuery);
    let query = answer.query.as_ref().unwrap();
    assert_eq!(query.sanitized, "SELECT AVG(balance) FROM users;");
    match answer.result.as_ref().unwrap() {
        QueryResult::Success { columns, rows } => {
            assert_eq!(columns.len(), 1);
            assert_eq!(rows, &vec![vec![DbValue::Real(8421.5)]]);
        }
        other => panic!("expected success, got {:?}", other),
    }
    assert_eq!(answer.text, "The average balance across all users is 8421.50.");

    let prompts = llm.received_prompts();
    assert_eq!(prompts.len(), 3);
    // Router and synthesizer both see the discovered schema.
    assert!(prompts[0].contains("Table: users\n - id (INTEGER)\n - name (TEXT)"));
    assert!(prompts[1].contains("Possible values for name: [ada, bob]"));
    assert!(prompts[1].contains("SQLite"));
    assert!(prompts[2].contains("8421.5"));
}

#[tokio::test]
async fn test_exit_ends_session_without_routing() {
    let llm = MockProvider::new();
    let mut orchestrator = pipeline(&llm).await;

    let (_, summary) = session(&mut orchestrator, "EXIT\nWhat is the average balance?\n", false).await;

    assert_eq!(llm.call_count(), 0);
    assert_eq!(summary, SessionSummary::default());
}

#[tokio::test]
async fn test_empty_classification_is_rejected() {
    let llm = MockProvider::with_responses(vec![CannedResponse::text("")]);
    let orchestrator = pipeline(&llm).await;

    let answer = orchestrator.answer("Write me a poem").await.unwrap();

    assert_eq!(answer.route, Route::Other);
    assert_eq!(answer.text, REJECTION_MESSAGE);
    assert!(answer.query.is_none());
    // Only the router was consulted.
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn test_other_route_never_synthesizes() {
    for raw in ["OTHER", "Maybe both", "sql", "SQL_QUERY, probably"] {
        let llm = MockProvider::with_responses(vec![
            CannedResponse::text(raw),
            CannedResponse::text("SELECT 1"),
        ]);
        let orchestrator = pipeline(&llm).await;

        let answer = orchestrator.answer("Tell me a joke").await.unwrap();

        assert_eq!(answer.route, Route::Other, "raw response {:?}", raw);
        assert_eq!(llm.call_count(), 1);
        assert_eq!(llm.responses_remaining(), 1);
    }
}

#[tokio::test]
async fn test_execution_failure_reaches_explainer() {
    let llm = MockProvider::with_responses(vec![
        CannedResponse::text("SQL_QUERY"),
        CannedResponse::text("SELECT * FROM nosuchtable"),
        CannedResponse::text("That table does not exist."),
    ]);
    let orchestrator = pipeline(&llm).await;

    let answer = orchestrator.answer("Show me the ghosts").await.unwrap();

    let message = match answer.result.as_ref().unwrap() {
        QueryResult::Failure { message } => message.clone(),
        other => panic!("expected failure, got {:?}", other),
    };
    assert!(message.contains("no such table: nosuchtable"));

    let prompts = llm.received_prompts();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[2].contains(&message));
    assert_eq!(answer.text, "That table does not exist.");
}

#[tokio::test]
async fn test_destructive_query_is_not_executed() {
    let llm = MockProvider::with_responses(vec![
        CannedResponse::text("SQL_QUERY"),
        CannedResponse::text("DROP TABLE users"),
        CannedResponse::text("I am not allowed to do that."),
        CannedResponse::text("SQL_QUERY"),
        CannedResponse::text("SELECT COUNT(*) FROM users"),
        CannedResponse::text("There are 2 users."),
    ]);
    let orchestrator = pipeline(&llm).await;

    let first = orchestrator.answer("Delete the users table").await.unwrap();
    assert!(matches!(first.result, Some(QueryResult::Failure { .. })));

    let second = orchestrator.answer("How many users?").await.unwrap();
    match second.result.unwrap() {
        QueryResult::Success { rows, .. } => assert_eq!(rows, vec![vec![DbValue::Integer(2)]]),
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_write_allowed_when_policy_disabled() {
    let llm = MockProvider::with_responses(vec![
        CannedResponse::text("SQL_QUERY"),
        CannedResponse::text("UPDATE users SET age = 37 WHERE name = 'ada'"),
        CannedResponse::text("Done."),
    ]);
    let store = Arc::new(bank_store().await);
    let catalog = CatalogBuilder::new().build(store.as_ref()).await.unwrap();
    let mut settings = PipelineSettings::default();
    settings.policy.read_only = false;
    let orchestrator = Orchestrator::new(store.clone(), Arc::new(llm.clone()), catalog)
        .with_settings(settings);

    let answer = orchestrator.answer("Make ada 37").await.unwrap();
    assert!(answer.result.unwrap().is_success());

    let ages = store
        .fetch_all("SELECT age FROM users WHERE name = 'ada'")
        .await
        .unwrap();
    assert_eq!(ages.rows, vec![vec![DbValue::Integer(37)]]);
}

#[tokio::test]
async fn test_multiple_statements_rejected_when_policy_disabled() {
    let llm = MockProvider::with_responses(vec![
        CannedResponse::text("SQL_QUERY"),
        CannedResponse::text("SELECT COUNT(*) FROM users; DELETE FROM users"),
        CannedResponse::text("Only one statement can run."),
    ]);
    let store = Arc::new(bank_store().await);
    let catalog = CatalogBuilder::new().build(store.as_ref()).await.unwrap();
    let mut settings = PipelineSettings::default();
    settings.policy.read_only = false;
    let orchestrator = Orchestrator::new(store.clone(), Arc::new(llm.clone()), catalog)
        .with_settings(settings);

    let answer = orchestrator.answer("How many users, then forget them").await.unwrap();

    match answer.result.unwrap() {
        QueryResult::Failure { message } => {
            assert!(message.contains("Multiple statements are not allowed"))
        }
        other => panic!("expected failure, got {:?}", other),
    }
    let count = store.fetch_all("SELECT COUNT(*) FROM users").await.unwrap();
    assert_eq!(count.rows, vec![vec![DbValue::Integer(2)]]);
}

#[tokio::test]
async fn test_generation_error_keeps_session_alive() {
    let llm = MockProvider::with_responses(vec![
        CannedResponse::failure("connection refused"),
        CannedResponse::text("DATA_EXPLAIN"),
        CannedResponse::text("The users table holds customers."),
    ]);
    let mut orchestrator = pipeline(&llm).await;

    let (out, summary) = session(
        &mut orchestrator,
        "How rich is ada?\n\n   \nWhat is in the users table?\nquit\n",
        false,
    )
    .await;

    assert!(out.contains("Error: routing failed: Mock error: connection refused"));
    assert!(out.contains("Route: DATA_EXPLAIN"));
    assert!(out.contains("The users table holds customers."));
    assert_eq!(
        summary,
        SessionSummary {
            questions: 2,
            answered: 1,
            rejected: 0,
            errors: 1,
        }
    );
    assert!(llm.received_prompts()[2].contains("No query was needed for this question."));
}

#[tokio::test]
async fn test_session_show_sql_prints_query_and_table() {
    let llm = MockProvider::with_responses(vec![
        CannedResponse::text("SQL_QUERY"),
        CannedResponse::text("SELECT name, age FROM users ORDER BY age"),
        CannedResponse::text("Ada is 36 and Bob is 41."),
    ]);
    let mut orchestrator = pipeline(&llm).await;

    let (out, summary) = session(&mut orchestrator, "How old is everyone?\n", true).await;

    assert!(out.contains("Route: SQL_QUERY"));
    assert!(out.contains("SQL: SELECT name, age FROM users ORDER BY age"));
    assert!(out.contains("ada"));
    assert!(out.contains("41"));
    assert!(out.contains("Ada is 36 and Bob is 41."));
    assert_eq!(summary.answered, 1);
}

#[tokio::test]
async fn test_schema_and_refresh_commands() {
    let llm = MockProvider::new();
    let store = Arc::new(bank_store().await);
    let catalog = CatalogBuilder::new().build(store.as_ref()).await.unwrap();
    let mut orchestrator = Orchestrator::new(store.clone(), Arc::new(llm.clone()), catalog);

    store
        .fetch_all("CREATE TABLE branches (id INTEGER PRIMARY KEY, city TEXT)")
        .await
        .unwrap();

    let (out, _) = session(&mut orchestrator, ":schema\n:refresh\n:schema\n", false).await;

    assert_eq!(out.matches("Table: users").count(), 2);
    assert_eq!(out.matches("Table: branches").count(), 1);
    assert!(out.contains("Schema refreshed: 2 tables"));
    assert!(orchestrator.catalog().table("branches").is_some());
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn test_concurrent_questions_share_catalog() {
    let llm = MockProvider::with_responses(vec![
        CannedResponse::text("OTHER"),
        CannedResponse::text("OTHER"),
    ]);
    let orchestrator = pipeline(&llm).await;

    let (a, b) = tokio::join!(
        orchestrator.answer("first question"),
        orchestrator.answer("second question"),
    );

    assert_eq!(a.unwrap().route, Route::Other);
    assert_eq!(b.unwrap().route, Route::Other);
    assert_eq!(llm.call_count(), 2);
}
