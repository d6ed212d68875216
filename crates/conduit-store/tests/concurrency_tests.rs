//! Concurrent access to a shared store

use conduit_store::{Error, InMemoryBackend, KvRepository, Repository, SqliteBackend, Storable};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use std::collections::BTreeSet;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Comment {
    id: String,
    body: String,
}

impl Storable for Comment {
    const KIND: &'static str = "comment";

    fn key(&self) -> &str {
        &self.id
    }

    fn set_key(&mut self, key: String) {
        self.id = key;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sequence_is_unique_under_concurrency() {
    let repo = KvRepository::<Comment, _>::new(InMemoryBackend::new());

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let repo = repo.clone();
        tasks.push(tokio::spawn(async move {
            let mut issued = Vec::with_capacity(10);
            for _ in 0..10 {
                issued.push(repo.sequence("slug-A").await.unwrap());
            }
            issued
        }));
    }

    let mut all = Vec::new();
    for task in tasks {
        all.extend(task.await.unwrap());
    }

    let unique: BTreeSet<u64> = all.iter().copied().collect();
    assert_eq!(all.len(), 100);
    assert_eq!(unique, (1..=100).collect::<BTreeSet<u64>>());

    assert_eq!(repo.sequence("slug-B").await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_lose_no_write() {
    let repo = KvRepository::<Comment, _>::new(InMemoryBackend::new());

    let mut tasks = Vec::new();
    for key in ["first", "second"] {
        for round in 0..50 {
            let repo = repo.clone();
            tasks.push(tokio::spawn(async move {
                repo.save(Comment {
                    id: format!("{key}-{round}"),
                    body: format!("{key} says {round}"),
                })
                .await
                .unwrap();
            }));
        }
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(repo.count_filtered(&[]).await.unwrap(), 100);
    let second = repo.get("second-49").await.unwrap();
    assert_eq!(second.body, "second says 49");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_to_two_keys() {
    let repo = KvRepository::<Comment, _>::new(InMemoryBackend::new());

    let a = {
        let repo = repo.clone();
        tokio::spawn(async move {
            repo.save(Comment {
                id: "a".to_string(),
                body: "from a".to_string(),
            })
            .await
        })
    };
    let b = {
        let repo = repo.clone();
        tokio::spawn(async move {
            repo.save(Comment {
                id: "b".to_string(),
                body: "from b".to_string(),
            })
            .await
        })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(repo.get("a").await.unwrap().body, "from a");
    assert_eq!(repo.get("b").await.unwrap().body, "from b");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_insert_if_absent_race_has_one_winner() {
    let repo = KvRepository::<Comment, _>::new(InMemoryBackend::new());

    let mut tasks = Vec::new();
    for n in 0..20 {
        let repo = repo.clone();
        tasks.push(tokio::spawn(async move {
            repo.insert_if_absent(Comment {
                id: "jake|dragons".to_string(),
                body: format!("attempt {n}"),
            })
            .await
            .unwrap()
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(repo.count_filtered(&[]).await.unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_durable_sequence_is_unique_under_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let backend = SqliteBackend::open(dir.path().join("conduit.db")).await.unwrap();
    let repo = KvRepository::<Comment, _>::new(backend);

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let repo = repo.clone();
        tasks.push(tokio::spawn(async move {
            let mut issued = Vec::with_capacity(10);
            for _ in 0..10 {
                issued.push(repo.sequence("slug-A").await.unwrap());
            }
            issued
        }));
    }

    let mut all = BTreeSet::new();
    for task in tasks {
        all.extend(task.await.unwrap());
    }
    assert_eq!(all, (1..=100).collect::<BTreeSet<u64>>());
}

#[tokio::test]
async fn test_sequences_resume_after_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conduit.db");

    {
        let repo = KvRepository::<Comment, _>::new(SqliteBackend::open(&path).await.unwrap());
        for expected in 1..=3 {
            assert_eq!(repo.sequence("dragons").await.unwrap(), expected);
        }
    }

    let repo = KvRepository::<Comment, _>::new(SqliteBackend::open(&path).await.unwrap());
    assert_eq!(repo.sequence("dragons").await.unwrap(), 4);
}

#[tokio::test]
async fn test_failed_save_is_not_readable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conduit.db");
    let backend = SqliteBackend::open_with(&path, Duration::from_millis(50))
        .await
        .unwrap();
    let repo = KvRepository::<Comment, _>::new(backend);

    // Another process holds the write lock
    let mut other = SqliteConnection::connect_with(&SqliteConnectOptions::new().filename(&path))
        .await
        .unwrap();
    sqlx::query("BEGIN EXCLUSIVE").execute(&mut other).await.unwrap();

    let saved = repo
        .save(Comment {
            id: "a".to_string(),
            body: "lost".to_string(),
        })
        .await;
    assert!(saved.is_err());
    assert!(matches!(repo.get("a").await, Err(Error::NotFound(_))));
    assert!(repo.sequence("x").await.is_err());
    assert!(repo.sequence("x").await.is_err());

    sqlx::query("ROLLBACK").execute(&mut other).await.unwrap();
    other.close().await.unwrap();

    assert_eq!(repo.sequence("x").await.unwrap(), 1);
    assert_eq!(repo.count_filtered(&[]).await.unwrap(), 0);
}
