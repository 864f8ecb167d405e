use std::sync::Arc;

use quiz_core::model::{Progress, QuestionId, UserId};
use quiz_core::time::fixed_now;
use storage::repository::{AccountRepository, AuthSession, ProgressRepository, SignUpOutcome, StorageError};
use storage::sqlite::SqliteRepository;

async fn repo(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

async fn account(repo: &SqliteRepository, email: &str) -> AuthSession {
    match repo.sign_up(email, "correct-horse").await.expect("sign up") {
        SignUpOutcome::SignedIn(session) => session,
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn sqlite_round_trips_progress_row() {
    let repo = repo("memdb_progress_roundtrip").await;
    let session = account(&repo, "ann@example.com").await;

    assert!(
        repo.fetch_progress(&session, session.user_id())
            .await
            .unwrap()
            .is_none()
    );

    let mut progress = Progress::empty(session.user_id(), fixed_now());
    progress.apply_attempt(QuestionId::new(1), true, fixed_now());
    progress.apply_attempt(QuestionId::new(2), false, fixed_now());
    repo.upsert_progress(&session, &progress).await.unwrap();

    progress.apply_attempt(QuestionId::new(2), false, fixed_now());
    repo.upsert_progress(&session, &progress).await.unwrap();

    let fetched = repo
        .fetch_progress(&session, session.user_id())
        .await
        .unwrap()
        .expect("row");
    assert_eq!(fetched.attempts(), 3);
    assert_eq!(fetched.correct(), 1);
    assert_eq!(fetched.seen_ids(), &[QuestionId::new(1), QuestionId::new(2)]);
    assert_eq!(fetched.wrong_ids(), &[QuestionId::new(2)]);
    assert_eq!(fetched.updated_at(), fixed_now());
}

#[tokio::test]
async fn sqlite_denies_foreign_identities() {
    let repo = repo("memdb_progress_policy").await;
    let ann = account(&repo, "ann@example.com").await;
    let bob = account(&repo, "bob@example.com").await;

    let ann_row = Progress::empty(ann.user_id(), fixed_now());
    repo.upsert_progress(&ann, &ann_row).await.unwrap();

    assert!(matches!(
        repo.fetch_progress(&bob, ann.user_id()).await,
        Err(StorageError::Unauthorized(_))
    ));
    assert!(matches!(
        repo.upsert_progress(&bob, &ann_row).await,
        Err(StorageError::Unauthorized(_))
    ));

    // writing a row for someone else is an insert-as, not an update
    let stranger = Progress::empty(UserId::random(), fixed_now());
    assert!(matches!(
        repo.upsert_progress(&bob, &stranger).await,
        Err(StorageError::Unauthorized(_))
    ));

    // ann's row is untouched
    let fetched = repo
        .fetch_progress(&ann, ann.user_id())
        .await
        .unwrap()
        .expect("row");
    assert_eq!(fetched, ann_row);
}

#[tokio::test]
async fn deleting_account_cascades_progress() {
    let repo = repo("memdb_progress_cascade").await;
    let session = account(&repo, "ann@example.com").await;
    repo.upsert_progress(&session, &Progress::empty(session.user_id(), fixed_now()))
        .await
        .unwrap();

    repo.delete_account(&session).await.unwrap();

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM progress")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
    assert!(matches!(
        repo.delete_account(&session).await,
        Err(StorageError::NotFound)
    ));
}

#[tokio::test]
async fn row_inserted_with_defaults_reads_as_empty() {
    let repo = repo("memdb_progress_defaults").await;
    let session = account(&repo, "ann@example.com").await;

    sqlx::query("INSERT INTO progress (user_id) VALUES (?1)")
        .bind(session.user_id().to_string())
        .execute(repo.pool())
        .await
        .unwrap();

    let fetched = repo
        .fetch_progress(&session, session.user_id())
        .await
        .unwrap()
        .expect("row");
    assert_eq!(fetched.attempts(), 0);
    assert_eq!(fetched.correct(), 0);
    assert!(fetched.wrong_ids().is_empty());
    assert!(fetched.seen_ids().is_empty());
}

#[tokio::test]
async fn sqlite_accounts_check_credentials() {
    let repo = repo("memdb_accounts").await;
    let created = account(&repo, "Ann@Example.com").await;

    let session = repo
        .sign_in("ann@example.com", "correct-horse")
        .await
        .expect("sign in");
    assert_eq!(session.user_id(), created.user_id());

    assert!(matches!(
        repo.sign_in("ann@example.com", "battery-staple").await,
        Err(StorageError::InvalidCredentials(_))
    ));
    assert!(matches!(
        repo.sign_in("nobody@example.com", "correct-horse").await,
        Err(StorageError::InvalidCredentials(_))
    ));
    assert!(matches!(
        repo.sign_up("ann@example.com", "correct-horse").await,
        Err(StorageError::Conflict(_))
    ));
}

#[tokio::test]
async fn insert_as_another_user_is_denied_on_empty_table() {
    let repo = repo("memdb_progress_insert_as").await;
    let ann = account(&repo, "ann@example.com").await;
    let bob = account(&repo, "bob@example.com").await;

    assert!(matches!(
        repo.upsert_progress(&bob, &Progress::empty(ann.user_id(), fixed_now()))
            .await,
        Err(StorageError::Unauthorized(_))
    ));
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM progress")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn concurrent_upserts_for_one_user_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quiz.sqlite3");
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    let session = Arc::new(account(&repo, "ann@example.com").await);

    let mut tasks = Vec::new();
    for attempt in 1..=40_u32 {
        let repo = repo.clone();
        let session = Arc::clone(&session);
        tasks.push(tokio::spawn(async move {
            let mut progress = Progress::empty(session.user_id(), fixed_now());
            for id in 1..=attempt {
                progress.apply_attempt(QuestionId::new(u64::from(id)), true, fixed_now());
            }
            repo.upsert_progress(&session, &progress).await
        }));
    }

    let mut failures = Vec::new();
    for task in tasks {
        if let Err(err) = task.await.unwrap() {
            failures.push(err.to_string());
        }
    }
    assert!(failures.is_empty(), "failed writes: {failures:?}");

    let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM progress")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);
    let stored = repo
        .fetch_progress(&session, session.user_id())
        .await
        .unwrap()
        .expect("row");
    assert!((1..=40).contains(&stored.attempts()));
    assert_eq!(stored.seen_ids().len(), stored.attempts() as usize);
}
