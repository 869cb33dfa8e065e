use std::sync::Arc;

use integration_tests::{hasher, memory_engine, sqlite_engine, TempDb};
use rs_core::traits::VoteRepo;
use rs_core::{
    AppError, Engine, EngineSettings, Requester, VoteCounts, VoteDirection, VoteRequest, VoteState,
};
use rs_db_memory::MemoryStore;
use rs_db_sqlite::SqliteStore;

const RACERS: usize = 50;

/// Fires `RACERS` identical casts at once and returns (accepted, conflicts).
async fn race_same_vote(engine: &Engine, requester: Requester, target_id: i64) -> (usize, usize) {
    let handles: Vec<_> = (0..RACERS)
        .map(|_| {
            let engine = engine.clone();
            let requester = requester.clone();
            tokio::spawn(async move {
                engine.cast_vote(&requester, &VoteRequest::new(target_id, "up")).await
            })
        })
        .collect();

    let mut accepted = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(AppError::AlreadyVoted { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    (accepted, conflicts)
}

async fn assert_single_record(engine: Engine, backend: &str) {
    let user = Requester::user("racer", "10.1.1.1");
    let (accepted, conflicts) = race_same_vote(&engine, user.clone(), 11).await;
    assert_eq!(accepted, 1, "{backend}: exactly one cast wins");
    assert_eq!(conflicts, RACERS - 1, "{backend}");
    assert_eq!(
        engine.vote_counts(11).await.unwrap(),
        VoteCounts { upvotes: 1, downvotes: 0 },
        "{backend}"
    );
    assert!(engine.vote_status(&user, 11).await.unwrap().has_voted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_duplicates_keep_one_record_memory() {
    assert_single_record(memory_engine(), "memory").await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_duplicates_keep_one_record_sqlite_memory() {
    assert_single_record(sqlite_engine().await, "sqlite-memory").await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_duplicates_keep_one_record_sqlite_file() {
    let db = TempDb::new();
    let store = db.open(4).await;
    let engine = Engine::new(Arc::new(store), hasher(), EngineSettings::default());
    assert_single_record(engine, "sqlite-file").await;
}

/// Anonymous casts toggle: an even number of serialized toggles leaves no vote.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_anonymous_toggles_never_double_count() {
    let db = TempDb::new();
    let file_engine = Engine::new(Arc::new(db.open(4).await), hasher(), EngineSettings::default());

    for (backend, engine) in [("memory", memory_engine()), ("sqlite-file", file_engine)] {
        let visitor = Requester::anonymous("203.0.113.50");
        let (accepted, conflicts) = race_same_vote(&engine, visitor.clone(), 12).await;
        assert_eq!((accepted, conflicts), (RACERS, 0), "{backend}");
        assert_eq!(engine.vote_counts(12).await.unwrap(), VoteCounts::default(), "{backend}");
        assert!(!engine.vote_status(&visitor, 12).await.unwrap().has_voted, "{backend}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_distinct_voters_all_count() {
    let db = TempDb::new();
    let engine = Engine::new(Arc::new(db.open(4).await), hasher(), EngineSettings::default());

    let handles: Vec<_> = (0..40)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let who = Requester::anonymous(format!("10.0.0.{i}"));
                let direction = if i % 4 == 0 { "down" } else { "up" };
                engine.cast_vote(&who, &VoteRequest::new(13, direction)).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(
        engine.vote_counts(13).await.unwrap(),
        VoteCounts { upvotes: 30, downvotes: 10 }
    );
}

/// Each backend's engine alongside a handle on its raw vote records.
async fn engines_with_votes() -> Vec<(&'static str, Engine, Arc<dyn VoteRepo>)> {
    let memory = Arc::new(MemoryStore::new());
    let sqlite = Arc::new(SqliteStore::new("sqlite::memory:").await.unwrap());
    vec![
        (
            "memory",
            Engine::new(memory.clone(), hasher(), EngineSettings::default()),
            memory as Arc<dyn VoteRepo>,
        ),
        (
            "sqlite",
            Engine::new(sqlite.clone(), hasher(), EngineSettings::default()),
            sqlite as Arc<dyn VoteRepo>,
        ),
    ]
}

#[tokio::test]
async fn test_vote_sequence_returns_fresh_counts() {
    for (backend, engine, votes) in engines_with_votes().await {
        let who = Requester::anonymous("198.51.100.23");
        let other = Requester::anonymous("198.51.100.24");
        engine.cast_vote(&other, &VoteRequest::new(20, "up")).await.unwrap();

        let steps = [
            ("up", VoteState::Up, VoteCounts { upvotes: 2, downvotes: 0 }),
            ("down", VoteState::Down, VoteCounts { upvotes: 1, downvotes: 1 }),
            ("down", VoteState::None, VoteCounts { upvotes: 1, downvotes: 0 }),
        ];
        for (direction, state, counts) in steps {
            let outcome = engine.cast_vote(&who, &VoteRequest::new(20, direction)).await.unwrap();
            assert_eq!(outcome.new_state, state, "{backend}: {direction}");
            assert_eq!(outcome.counts, counts, "{backend}: {direction}");
        }

        let err = engine
            .cast_vote(&who, &VoteRequest::new(20, "UP"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400, "{backend}: direction is case-sensitive");

        let flipper = Requester::anonymous("198.51.100.25");
        for direction in ["up", "down", "up"] {
            engine.cast_vote(&flipper, &VoteRequest::new(20, direction)).await.unwrap();
        }
        let identity = engine.identity_for(&flipper, 20);
        let records: Vec<_> = votes
            .vote_records(20)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.identity == identity)
            .collect();
        assert_eq!(records.len(), 1, "{backend}: flips update the one record");
        assert_eq!(records[0].direction, VoteDirection::Up, "{backend}");
    }
}
