//! Database integration tests
//!
//! Tests SQLite WAL behavior for the document store:
//! - Document round-trips across a fresh pool on the same file
//! - Upsert overwrite semantics
//! - Concurrent writers under the busy timeout

use quotewatch::config::DatabaseConfig;
use quotewatch::db::{init_pool, load_document, run_migrations, save_document, DbPool};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Doc {
    revision: u32,
    payload: Vec<String>,
}

async fn create_test_db() -> (DbPool, DatabaseConfig, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let config = DatabaseConfig {
        path: temp_dir.path().join("test.db"),
        max_connections: 5,
    };
    let pool = init_pool(&config).await.unwrap();
    run_migrations(&pool).await.unwrap();
    (pool, config, temp_dir)
}

#[tokio::test]
async fn document_round_trips_across_reopen() {
    let (pool, config, _tmp) = create_test_db().await;

    let doc = Doc {
        revision: 1,
        payload: vec!["a".to_string(), "b".to_string()],
    };
    save_document(&pool, "settings", &doc).await.unwrap();
    pool.close().await;

    // Reopen the same file with a fresh pool
    let pool = init_pool(&config).await.unwrap();
    run_migrations(&pool).await.unwrap();
    let loaded: Option<Doc> = load_document(&pool, "settings").await.unwrap();
    assert_eq!(loaded, Some(doc));
}

#[tokio::test]
async fn missing_document_is_none() {
    let (pool, _config, _tmp) = create_test_db().await;
    let loaded: Option<Doc> = load_document(&pool, "never_written").await.unwrap();
    assert!(loaded.is_none());
}

#[tokio::test]
async fn upsert_overwrites_in_place() {
    let (pool, _config, _tmp) = create_test_db().await;

    for revision in 1..=3 {
        let doc = Doc {
            revision,
            payload: vec![format!("rev-{}", revision)],
        };
        save_document(&pool, "alert_state", &doc).await.unwrap();
    }

    let loaded: Doc = load_document(&pool, "alert_state").await.unwrap().unwrap();
    assert_eq!(loaded.revision, 3);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);
}

#[tokio::test]
async fn concurrent_writers_all_land() {
    let (pool, _config, _tmp) = create_test_db().await;

    let mut handles = Vec::new();
    for i in 0..10u32 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let doc = Doc {
                revision: i,
                payload: Vec::new(),
            };
            save_document(&pool, &format!("doc-{}", i), &doc).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 10);
}
