use chrono::{DateTime, Duration, Utc};
use integration_tests::engines;
use rs_core::{
    AppError, CommentRequest, Engine, RankRequest, RankedList, Requester, ScoreMode, TargetRef,
    ValidationError, VoteRequest,
};

/// Four targets with deliberately different shapes:
/// 1: old and heavily upvoted, 2: fresh with a few upvotes,
/// 3: fresh, no votes, lively discussion, 4: two days old and downvoted.
async fn seed(engine: &Engine, now: DateTime<Utc>) -> Vec<TargetRef> {
    let vote = |target: i64, voter: usize, direction: &'static str| {
        let engine = engine.clone();
        async move {
            let who = Requester::anonymous(format!("10.{target}.0.{voter}"));
            engine.cast_vote(&who, &VoteRequest::new(target, direction)).await.unwrap();
        }
    };

    for voter in 0..10 {
        vote(1, voter, "up").await;
    }
    for voter in 0..3 {
        vote(2, voter, "up").await;
    }
    for voter in 0..2 {
        vote(4, voter, "down").await;
    }
    let talker = Requester::anonymous("172.16.0.1");
    for n in 0..4 {
        engine
            .post_comment(&talker, &CommentRequest::top_level(3, format!("point {n}")))
            .await
            .unwrap();
    }

    vec![
        TargetRef { id: 1, created_at: now - Duration::days(30) },
        TargetRef { id: 2, created_at: now - Duration::hours(1) },
        TargetRef { id: 3, created_at: now - Duration::hours(1) },
        TargetRef { id: 4, created_at: now - Duration::days(2) },
    ]
}

fn ids(list: &RankedList) -> Vec<i64> {
    list.items.iter().map(|item| item.target_id()).collect()
}

#[tokio::test]
async fn test_modes_order_the_same_candidates_differently() {
    let now = Utc::now();
    for (backend, engine) in engines().await {
        let candidates = seed(&engine, now).await;
        let ranked = |mode: &str| {
            let engine = engine.clone();
            let candidates = candidates.clone();
            let req = RankRequest::new(mode);
            async move { engine.ranked(&req, &candidates, now).await.unwrap() }
        };

        let top = ranked("top").await;
        assert_eq!(top.score_mode, ScoreMode::Top);
        assert_eq!(ids(&top), vec![1, 2, 3, 4], "{backend}");
        assert_eq!(top.items[0].score, 10.0);

        // Recency beats raw score: the month-old favourite drops below both fresh targets.
        let hot = ranked("hot").await;
        assert_eq!(ids(&hot), vec![2, 3, 1, 4], "{backend}");

        let discussed = ranked("discussed").await;
        assert_eq!(ids(&discussed)[0], 3, "{backend}");
        assert_eq!(discussed.items[0].snapshot.comment_count, 4);

        // Equal ages tie on score and fall back to ascending id.
        let new = ranked("new").await;
        assert_eq!(ids(&new), vec![2, 3, 4, 1], "{backend}");
    }
}

#[tokio::test]
async fn test_pagination_and_duplicates() {
    let now = Utc::now();
    for (backend, engine) in engines().await {
        let mut candidates = seed(&engine, now).await;
        candidates.push(candidates[0]);

        let req = RankRequest { mode: "top".into(), offset: Some(1), limit: Some(2) };
        let page = engine.ranked(&req, &candidates, now).await.unwrap();
        assert_eq!(page.total, 4, "{backend}: duplicates are scored once");
        assert_eq!(page.offset, 1);
        assert_eq!(ids(&page), vec![2, 3], "{backend}");

        let req = RankRequest { mode: "top".into(), offset: Some(10), limit: None };
        let past_end = engine.ranked(&req, &candidates, now).await.unwrap();
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.total, 4);

        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["scoreMode"], "top");
        assert_eq!(json["items"][0]["targetId"], 2);
        assert_eq!(json["items"][0]["upvotes"], 3);
    }
}

#[tokio::test]
async fn test_invalid_rank_requests() {
    let now = Utc::now();
    for (backend, engine) in engines().await {
        let candidates = [TargetRef { id: 1, created_at: now }];

        let err = engine.ranked(&RankRequest::new("best"), &candidates, now).await.unwrap_err();
        assert_eq!(
            err,
            AppError::Validation(ValidationError::InvalidScoreMode("best".into())),
            "{backend}"
        );

        let req = RankRequest { limit: Some(0), ..RankRequest::new("hot") };
        let err = engine.ranked(&req, &candidates, now).await.unwrap_err();
        assert!(
            matches!(err, AppError::Validation(ValidationError::InvalidPage(_))),
            "{backend}"
        );

        let empty = engine.ranked(&RankRequest::new("hot"), &[], now).await.unwrap();
        assert_eq!(empty.total, 0, "{backend}");
    }
}

#[tokio::test]
async fn test_target_without_engagement_scores_zero() {
    let now = Utc::now();
    for (backend, engine) in engines().await {
        let candidates = [TargetRef { id: 77, created_at: now + Duration::hours(3) }];
        let list = engine.ranked(&RankRequest::new("hot"), &candidates, now).await.unwrap();
        let item = list.items[0];
        assert_eq!(item.score, 0.0, "{backend}");
        assert_eq!(item.snapshot.age_in_days, 0.0, "{backend}: future timestamps clamp");
    }
}

#[tokio::test]
async fn test_new_orders_future_dated_targets_by_creation() {
    let now = Utc::now();
    for (backend, engine) in engines().await {
        let candidates = [
            TargetRef { id: 1, created_at: now + Duration::minutes(10) },
            TargetRef { id: 2, created_at: now + Duration::hours(2) },
            TargetRef { id: 3, created_at: now - Duration::hours(1) },
        ];
        let list = engine.ranked(&RankRequest::new("new"), &candidates, now).await.unwrap();
        assert_eq!(ids(&list), vec![2, 1, 3], "{backend}: skewed clocks still sort latest first");
        assert_eq!(list.items[0].snapshot.age_in_days, 0.0);
    }
}
