use integration_tests::engines;
use rs_core::{AppError, CommentRequest, LikeStatus, Requester, ValidationError};

#[tokio::test]
async fn test_reply_like_and_listing_scenario() {
    for (backend, engine) in engines().await {
        let alice = Requester::user("alice", "10.0.0.1");
        let visitor = Requester::anonymous("203.0.113.7");

        let first = engine
            .post_comment(&alice, &CommentRequest::top_level(1, "First!").with_display_name("Alice"))
            .await
            .unwrap();
        let second = engine
            .post_comment(&visitor, &CommentRequest::top_level(1, "  Second  ").with_display_name("   "))
            .await
            .unwrap();
        assert_eq!(second.content, "Second", "{backend}");
        assert_eq!(second.display_name, "Anonymous", "{backend}");

        let reply = engine
            .post_comment(&visitor, &CommentRequest::reply(1, first.id, "agreed"))
            .await
            .unwrap();

        let liked = engine.toggle_like(&visitor, first.id).await.unwrap();
        assert_eq!(liked, LikeStatus { is_liked: true, like_count: 1 }, "{backend}");

        let thread = engine.list_comments(&visitor, 1).await.unwrap();
        let ids: Vec<_> = thread.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![second.id, first.id], "{backend}: newest top-level first");

        let first_view = &thread[1];
        assert_eq!(first_view.author_display_name, "Alice");
        assert_eq!(first_view.like_count, 1);
        assert!(first_view.is_liked, "{backend}: liker sees their own like");
        assert_eq!(first_view.replies.len(), 1);
        assert_eq!(first_view.replies[0].id, reply.id);
        assert!(first_view.replies[0].replies.is_empty());

        let as_alice = engine.list_comments(&alice, 1).await.unwrap();
        assert!(!as_alice[1].is_liked, "{backend}: like belongs to the visitor only");
        assert_eq!(as_alice[1].like_count, 1);

        let unliked = engine.toggle_like(&visitor, first.id).await.unwrap();
        assert_eq!(unliked, LikeStatus { is_liked: false, like_count: 0 }, "{backend}");
        assert_eq!(
            engine.like_status(&visitor, first.id).await.unwrap(),
            LikeStatus { is_liked: false, like_count: 0 }
        );
    }
}

#[tokio::test]
async fn test_nesting_is_limited_to_one_level() {
    for (backend, engine) in engines().await {
        let who = Requester::anonymous("198.51.100.4");
        let top = engine.post_comment(&who, &CommentRequest::top_level(7, "top")).await.unwrap();
        let reply = engine
            .post_comment(&who, &CommentRequest::reply(7, top.id, "reply"))
            .await
            .unwrap();

        let err = engine
            .post_comment(&who, &CommentRequest::reply(7, reply.id, "too deep"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::Validation(ValidationError::InvalidParent(reply.id)), "{backend}");

        let err = engine
            .post_comment(&who, &CommentRequest::reply(8, top.id, "wrong target"))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::Validation(ValidationError::InvalidParent(top.id)), "{backend}");

        let err = engine
            .post_comment(&who, &CommentRequest::reply(7, 9_999, "ghost parent"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400, "{backend}");

        // Nothing was written by the rejected attempts.
        let thread = engine.list_comments(&who, 7).await.unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].replies.len(), 1);
        assert!(engine.list_comments(&who, 8).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_content_and_display_name_limits() {
    for (backend, engine) in engines().await {
        let who = Requester::anonymous("192.0.2.1");

        let exact = "é".repeat(1000);
        let ok = engine
            .post_comment(&who, &CommentRequest::top_level(3, exact.clone()))
            .await
            .unwrap();
        assert_eq!(ok.content, exact, "{backend}: limit counts characters, not bytes");

        let err = engine
            .post_comment(&who, &CommentRequest::top_level(3, "x".repeat(1001)))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AppError::Validation(ValidationError::ContentTooLong { max: 1000, actual: 1001 })
        );

        let err = engine
            .post_comment(&who, &CommentRequest::top_level(3, " \n\t "))
            .await
            .unwrap_err();
        assert_eq!(err, AppError::Validation(ValidationError::EmptyContent), "{backend}");

        let err = engine
            .post_comment(&who, &CommentRequest::top_level(3, "hi").with_display_name("n".repeat(51)))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AppError::Validation(ValidationError::DisplayNameTooLong { max: 50, actual: 51 })
        );
    }
}

#[tokio::test]
async fn test_likes_on_missing_comments_are_not_found() {
    for (backend, engine) in engines().await {
        let who = Requester::anonymous("192.0.2.99");
        let err = engine.toggle_like(&who, 4_242).await.unwrap_err();
        assert_eq!(err, AppError::comment_not_found(4_242), "{backend}");
        assert_eq!(err.status_code(), 404);
        assert!(engine.like_status(&who, 4_242).await.is_err());
    }
}
