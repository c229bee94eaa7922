use std::env;

use chrono::Utc;
use redwatch_core::{FetchLogEntry, Post};

use crate::{Database, PostFilter};

fn sample_post(reddit_id: &str, subreddit: &str) -> Post {
    Post {
        reddit_id: reddit_id.to_string(),
        subreddit: subreddit.to_string(),
        title: format!("post {reddit_id}"),
        selftext: "Looking for early feedback".to_string(),
        author: "tester".to_string(),
        score: 10,
        upvote_ratio: 0.9,
        num_comments: 3,
        created_utc: Utc::now().timestamp(),
        url: format!("https://example.com/{reddit_id}"),
        permalink: format!("https://reddit.com/r/{subreddit}/comments/{reddit_id}/"),
        is_self: true,
    }
}

async fn setup_test_db() -> Database {
    Database::in_memory()
        .await
        .expect("failed to open in-memory database")
}

#[tokio::test]
async fn connects_and_migrates_on_file() {
    let db_path = env::temp_dir().join(format!("redwatch_test_{}.db", uuid::Uuid::new_v4()));
    let path = db_path.to_str().unwrap();

    let db = Database::connect(path).await.expect("connect failed");
    assert!(db.insert_post(&sample_post("file1", "rust")).await.unwrap());
    drop(db);

    // Reopening must see the stored row and not re-create tables.
    let db = Database::connect(path).await.expect("reconnect failed");
    let stats = db.stats().await.unwrap();
    assert_eq!(stats.total_posts, 1);

    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test]
async fn duplicate_insert_is_a_noop() {
    let db = setup_test_db().await;
    let post = sample_post("abc123", "SaaS");

    assert!(db.insert_post(&post).await.unwrap());
    assert!(!db.insert_post(&post).await.unwrap());

    let stats = db.stats().await.unwrap();
    assert_eq!(stats.total_posts, 1);
}

#[tokio::test]
async fn mark_relevant_round_trips_keywords() {
    let db = setup_test_db().await;
    let post = sample_post("abc123", "SaaS");
    db.insert_post(&post).await.unwrap();

    db.mark_relevant("abc123", 0.5, &["feedback".to_string(), "customer".to_string()])
        .await
        .unwrap();

    let posts = db.posts(&PostFilter::default()).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].is_relevant, Some(true));
    assert_eq!(posts[0].relevance_score, Some(0.5));
    assert_eq!(
        posts[0].keywords_found.as_deref(),
        Some(&["feedback".to_string(), "customer".to_string()][..])
    );
}

#[tokio::test]
async fn posts_filter_by_subreddit_and_relevance() {
    let db = setup_test_db().await;
    db.insert_post(&sample_post("a1", "rust")).await.unwrap();
    db.insert_post(&sample_post("a2", "rust")).await.unwrap();
    db.insert_post(&sample_post("b1", "SaaS")).await.unwrap();
    db.mark_relevant("a1", 1.0, &["feedback".to_string()])
        .await
        .unwrap();

    let rust_posts = db
        .posts(&PostFilter {
            subreddit: Some("rust".to_string()),
            ..PostFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(rust_posts.len(), 2);

    let relevant = db
        .posts(&PostFilter {
            is_relevant: Some(true),
            ..PostFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(relevant.len(), 1);
    assert_eq!(relevant[0].post.reddit_id, "a1");
}

#[tokio::test]
async fn posts_respect_age_cutoff_and_limit() {
    let db = setup_test_db().await;

    let mut old = sample_post("old1", "rust");
    old.created_utc = Utc::now().timestamp() - 30 * 86_400;
    db.insert_post(&old).await.unwrap();
    db.insert_post(&sample_post("new1", "rust")).await.unwrap();
    db.insert_post(&sample_post("new2", "rust")).await.unwrap();

    let recent = db.posts(&PostFilter::default()).await.unwrap();
    assert_eq!(recent.len(), 2);

    let capped = db
        .posts(&PostFilter {
            limit: 1,
            max_age_days: None,
            ..PostFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(capped.len(), 1);

    let all = db
        .posts(&PostFilter {
            max_age_days: None,
            ..PostFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn cleanup_removes_only_old_posts() {
    let db = setup_test_db().await;

    let mut old = sample_post("old1", "rust");
    old.created_utc = Utc::now().timestamp() - 60 * 86_400;
    db.insert_post(&old).await.unwrap();
    db.insert_post(&sample_post("new1", "rust")).await.unwrap();

    let deleted = db.cleanup_old(30).await.unwrap();
    assert_eq!(deleted, 1);

    let all = db
        .posts(&PostFilter {
            max_age_days: None,
            ..PostFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].post.reddit_id, "new1");
}

#[tokio::test]
async fn fetch_log_appends_and_counts_runs() {
    let db = setup_test_db().await;

    db.log_fetch(&FetchLogEntry::success("rust", 25, 10, 2, 1200))
        .await
        .unwrap();
    db.log_fetch(&FetchLogEntry::failure(
        "privatesub",
        80,
        "Forbidden access to resource: /r/privatesub/new".to_string(),
    ))
    .await
    .unwrap();

    let stats = db.stats().await.unwrap();
    assert_eq!(stats.monitoring_runs, 2);
}

#[tokio::test]
async fn stats_report_top_subreddits() {
    let db = setup_test_db().await;

    for i in 0..3 {
        db.insert_post(&sample_post(&format!("r{i}"), "rust"))
            .await
            .unwrap();
    }
    db.insert_post(&sample_post("s1", "SaaS")).await.unwrap();
    db.mark_relevant("s1", 1.0, &["feedback".to_string()])
        .await
        .unwrap();

    let stats = db.stats().await.unwrap();
    assert_eq!(stats.total_posts, 4);
    assert_eq!(stats.relevant_posts, 1);
    assert_eq!(stats.unique_subreddits, 2);
    assert_eq!(stats.top_subreddits[0], ("rust".to_string(), 3));
}
