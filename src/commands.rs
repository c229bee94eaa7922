use analyzer::{Analyzer, OpenAiProvider};
use chrono::Utc;
use database::{Database, PostFilter};
use monitor_service::MonitorService;
use reddit_client::RedditClient;
use redwatch_core::{CoreError, MonitorConfig, Post, SearchSort, SortOrder, StoredPost, TimeFilter};
use tracing::warn;

fn account_age_days(created_utc: f64) -> i64 {
    (Utc::now().timestamp() - created_utc as i64) / 86_400
}

fn print_post(post: &Post) {
    println!("\n{}", post.title);
    println!(
        "  r/{} | {} pts | {} comments",
        post.subreddit, post.score, post.num_comments
    );
    println!("  by {}", post.author);
}

fn print_stored_post(stored: &StoredPost) {
    let status = match stored.is_relevant {
        Some(true) => "✓ ",
        Some(false) => "✗ ",
        None => "",
    };

    println!("\n{}{}", status, stored.post.title);
    println!(
        "  r/{} | {} pts | {} comments",
        stored.post.subreddit, stored.post.score, stored.post.num_comments
    );
    println!("  by {}", stored.post.author);

    if let Some(score) = stored.relevance_score {
        println!("  relevance: {score:.2}");
    }
    if let Some(keywords) = &stored.keywords_found {
        if !keywords.is_empty() {
            println!("  keywords: {}", keywords.join(", "));
        }
    }
}

pub async fn test(config: &MonitorConfig) -> Result<(), CoreError> {
    let client = RedditClient::new(config.credentials.clone())?;

    match client.verify_connection().await {
        Ok(user) => {
            println!("✓ Authenticated as {}", user.name);
            println!("  Link Karma: {}", user.link_karma);
            println!("  Comment Karma: {}", user.comment_karma);
            println!("  Account Age: {} days", account_age_days(user.created_utc));
            Ok(())
        }
        Err(e) => {
            println!("✗ Connection failed: {e}");
            Err(e)
        }
    }
}

pub async fn fetch(
    config: &MonitorConfig,
    subreddit: &str,
    limit: u32,
    sort: SortOrder,
    time: TimeFilter,
    json: bool,
) -> Result<(), CoreError> {
    let client = RedditClient::new(config.credentials.clone())?;
    let db = Database::connect(&config.database_path).await?;

    let posts = client.subreddit_posts(subreddit, sort, limit, time).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&posts)?);
        for post in &posts {
            db.insert_post(post).await?;
        }
        return Ok(());
    }

    for post in &posts {
        print_post(post);
        if db.insert_post(post).await? {
            println!("  [stored]");
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn search(
    config: &MonitorConfig,
    query: &str,
    subreddit: Option<&str>,
    limit: u32,
    sort: SearchSort,
    time: TimeFilter,
    store: bool,
    json: bool,
) -> Result<(), CoreError> {
    let client = RedditClient::new(config.credentials.clone())?;

    let posts = client
        .search_posts(query, subreddit, sort, limit, time)
        .await?;

    if posts.is_empty() {
        println!("No posts found.");
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&posts)?);
    }

    let db = if store {
        Some(Database::connect(&config.database_path).await?)
    } else {
        None
    };

    for post in &posts {
        if !json {
            print_post(post);
        }
        if let Some(db) = &db {
            if db.insert_post(post).await? && !json {
                println!("  [stored]");
            }
        }
    }

    Ok(())
}

pub async fn monitor(config: &MonitorConfig, once: bool, ai: bool) -> Result<(), CoreError> {
    let client = RedditClient::new(config.credentials.clone())?;
    let db = Database::connect(&config.database_path).await?;

    let mut analyzer = Analyzer::new(&config.keywords);
    if ai {
        match &config.openai_api_key {
            Some(key) => analyzer = analyzer.with_llm(Box::new(OpenAiProvider::new(key.clone()))),
            None => warn!("OPENAI_API_KEY not set, continuing with keyword matching only"),
        }
    }

    let service = MonitorService::new(client, db, analyzer, config);

    if once {
        println!("Running monitoring cycle once...");
        let report = service.run_once().await?;
        println!(
            "Cycle complete: {} subreddits, {} fetched, {} stored, {} matched, {} failed",
            report.subreddits,
            report.posts_fetched,
            report.posts_stored,
            report.posts_matched,
            report.failures
        );
        return Ok(());
    }

    println!(
        "Starting scheduler (every {} minutes). Press Ctrl+C to stop.",
        config.interval_minutes
    );
    service.run().await
}

pub async fn posts(
    config: &MonitorConfig,
    subreddit: Option<String>,
    relevant: bool,
    limit: u32,
    days: u32,
    json: bool,
) -> Result<(), CoreError> {
    let db = Database::connect(&config.database_path).await?;

    let filter = PostFilter {
        subreddit,
        is_relevant: relevant.then_some(true),
        max_age_days: Some(days),
        limit,
    };
    let stored = db.posts(&filter).await?;

    if stored.is_empty() {
        println!("No posts found.");
        return Ok(());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&stored)?);
        return Ok(());
    }

    for post in &stored {
        print_stored_post(post);
    }

    Ok(())
}

pub async fn stats(config: &MonitorConfig, json: bool) -> Result<(), CoreError> {
    let db = Database::connect(&config.database_path).await?;
    let stats = db.stats().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("\nDatabase Statistics");
    println!("========================================");
    println!("Total Posts: {}", stats.total_posts);
    println!("Relevant Posts: {}", stats.relevant_posts);
    println!("Unique Subreddits: {}", stats.unique_subreddits);
    println!("Monitoring Runs: {}", stats.monitoring_runs);

    if !stats.top_subreddits.is_empty() {
        println!("\nTop Subreddits:");
        for (subreddit, count) in &stats.top_subreddits {
            println!("  r/{subreddit}: {count} posts");
        }
    }

    Ok(())
}

pub async fn subreddit(config: &MonitorConfig, name: &str) -> Result<(), CoreError> {
    let client = RedditClient::new(config.credentials.clone())?;
    let info = client.subreddit_about(name).await?;

    println!("\nr/{}", info.display_name);
    println!("  Subscribers: {}", info.subscribers);
    println!("  Type: {}", info.subreddit_type);
    println!("  NSFW: {}", if info.over18 { "Yes" } else { "No" });

    let description: String = info.public_description.chars().take(200).collect();
    if !description.is_empty() {
        println!("  Description: {description}");
    }

    Ok(())
}

pub async fn user(config: &MonitorConfig, username: &str) -> Result<(), CoreError> {
    let client = RedditClient::new(config.credentials.clone())?;
    let profile = client.user_about(username).await?;

    println!("\nu/{}", profile.name);
    println!("  Link Karma: {}", profile.link_karma);
    println!("  Comment Karma: {}", profile.comment_karma);
    println!(
        "  Account Age: {} days",
        account_age_days(profile.created_utc)
    );
    println!("  Gold: {}", if profile.is_gold { "Yes" } else { "No" });
    println!("  Moderator: {}", if profile.is_mod { "Yes" } else { "No" });

    Ok(())
}

pub async fn cleanup(config: &MonitorConfig, days: u32) -> Result<(), CoreError> {
    let db = Database::connect(&config.database_path).await?;
    let deleted = db.cleanup_old(days).await?;
    println!("Deleted {deleted} posts older than {days} days.");
    Ok(())
}
