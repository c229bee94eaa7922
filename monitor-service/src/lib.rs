use std::time::{Duration, Instant};

use analyzer::Analyzer;
use async_trait::async_trait;
use database::Database;
use reddit_client::RedditClient;
use redwatch_core::{CoreError, FetchLogEntry, MonitorConfig, Post, SortOrder, TimeFilter};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Where the monitor gets its posts. The production source is
/// `RedditClient`; tests substitute their own.
#[async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_new_posts(&self, subreddit: &str, limit: u32) -> Result<Vec<Post>, CoreError>;
}

#[async_trait]
impl PostSource for RedditClient {
    async fn fetch_new_posts(&self, subreddit: &str, limit: u32) -> Result<Vec<Post>, CoreError> {
        self.subreddit_posts(subreddit, SortOrder::New, limit, TimeFilter::Day)
            .await
    }
}

/// Aggregate counts for one polling cycle across all subreddits.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub subreddits: usize,
    pub posts_fetched: u32,
    pub posts_stored: u32,
    pub posts_matched: u32,
    pub failures: usize,
}

impl CycleReport {
    fn absorb(&mut self, entry: &FetchLogEntry) {
        self.subreddits += 1;
        self.posts_fetched += entry.posts_fetched;
        self.posts_stored += entry.posts_stored;
        self.posts_matched += entry.posts_matched;
        if entry.error.is_some() {
            self.failures += 1;
        }
    }
}

/// Drives the fetch→filter→store pipeline on a fixed interval.
///
/// Cycles are sequential and non-overlapping: the loop awaits a full cycle
/// before taking the next tick. Within a cycle, subreddits are processed in
/// configured order; an upstream failure for one subreddit is logged and
/// the cycle moves on, while a database failure aborts the cycle.
pub struct MonitorService<S: PostSource = RedditClient> {
    source: S,
    db: Database,
    analyzer: Analyzer,
    subreddits: Vec<String>,
    poll_interval: Duration,
    fetch_limit: u32,
}

impl<S: PostSource> MonitorService<S> {
    pub fn new(source: S, db: Database, analyzer: Analyzer, config: &MonitorConfig) -> Self {
        Self {
            source,
            db,
            analyzer,
            subreddits: config.subreddits.clone(),
            poll_interval: Duration::from_secs(config.interval_minutes * 60),
            fetch_limit: config.fetch_limit,
        }
    }

    /// Run cycles until ctrl-c. The first cycle starts immediately.
    pub async fn run(&self) -> Result<(), CoreError> {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            subreddits = self.subreddits.len(),
            interval_minutes = self.poll_interval.as_secs() / 60,
            "monitor started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await?;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown requested, stopping monitor");
                    return Ok(());
                }
            }
        }
    }

    /// Execute a single polling cycle.
    pub async fn run_once(&self) -> Result<CycleReport, CoreError> {
        self.run_cycle().await
    }

    async fn run_cycle(&self) -> Result<CycleReport, CoreError> {
        let cycle_start = Instant::now();
        info!("starting monitoring cycle");

        let mut report = CycleReport::default();

        for subreddit in &self.subreddits {
            let started = Instant::now();
            let entry = match self.process_subreddit(subreddit).await {
                Ok(entry) => entry,
                Err(e @ CoreError::Database(_)) => {
                    // Local I/O failure, the rest of the cycle cannot be
                    // trusted to persist anything.
                    error!(subreddit, %e, "database failure, aborting cycle");
                    return Err(e);
                }
                Err(e) => {
                    error!(subreddit, %e, "subreddit fetch failed");
                    FetchLogEntry::failure(
                        subreddit,
                        started.elapsed().as_millis() as u64,
                        e.to_string(),
                    )
                }
            };

            self.db.log_fetch(&entry).await?;
            report.absorb(&entry);
        }

        info!(
            elapsed_ms = cycle_start.elapsed().as_millis() as u64,
            fetched = report.posts_fetched,
            stored = report.posts_stored,
            matched = report.posts_matched,
            failures = report.failures,
            "monitoring cycle complete"
        );
        Ok(report)
    }

    async fn process_subreddit(&self, subreddit: &str) -> Result<FetchLogEntry, CoreError> {
        let started = Instant::now();
        info!(subreddit, "monitoring");

        let posts = self
            .source
            .fetch_new_posts(subreddit, self.fetch_limit)
            .await?;

        let mut stored = 0u32;
        let mut matched = 0u32;

        for post in &posts {
            // Already-seen posts were analyzed in an earlier cycle.
            if !self.db.insert_post(post).await? {
                continue;
            }
            stored += 1;

            let analysis = self.analyzer.analyze(post).await;
            if analysis.is_relevant {
                self.db
                    .mark_relevant(&post.reddit_id, analysis.score, &analysis.keywords)
                    .await?;
                matched += 1;
                info!(
                    subreddit,
                    title = %post.title,
                    score = analysis.score,
                    "relevant post"
                );
            }
        }

        info!(
            subreddit,
            fetched = posts.len(),
            stored,
            matched,
            "subreddit done"
        );
        Ok(FetchLogEntry::success(
            subreddit,
            posts.len() as u32,
            stored,
            matched,
            started.elapsed().as_millis() as u64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use database::PostFilter;
    use redwatch_core::{RedditApiError, RedditCredentials};

    fn sample_post(reddit_id: &str, subreddit: &str, title: &str) -> Post {
        Post {
            reddit_id: reddit_id.to_string(),
            subreddit: subreddit.to_string(),
            title: title.to_string(),
            selftext: String::new(),
            author: "tester".to_string(),
            score: 1,
            upvote_ratio: 0.9,
            num_comments: 0,
            created_utc: Utc::now().timestamp(),
            url: String::new(),
            permalink: String::new(),
            is_self: true,
        }
    }

    fn test_config(subreddits: &[&str]) -> MonitorConfig {
        MonitorConfig {
            credentials: RedditCredentials {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                user_agent: "redwatch-test/0.1".to_string(),
                username: "user".to_string(),
                password: "pass".to_string(),
            },
            subreddits: subreddits.iter().map(|s| s.to_string()).collect(),
            keywords: vec!["feedback".to_string()],
            interval_minutes: 120,
            fetch_limit: 25,
            database_path: ":memory:".to_string(),
            log_file: "redwatch.log".to_string(),
            openai_api_key: None,
        }
    }

    /// Serves two posts per subreddit, erroring for one named subreddit.
    struct ScriptedSource {
        failing: &'static str,
    }

    #[async_trait]
    impl PostSource for ScriptedSource {
        async fn fetch_new_posts(
            &self,
            subreddit: &str,
            _limit: u32,
        ) -> Result<Vec<Post>, CoreError> {
            if subreddit == self.failing {
                return Err(CoreError::RedditApi(RedditApiError::ServerError {
                    status_code: 503,
                }));
            }
            Ok(vec![
                sample_post(
                    &format!("{subreddit}_1"),
                    subreddit,
                    "Looking for feedback on my launch",
                ),
                sample_post(&format!("{subreddit}_2"), subreddit, "Weekly open thread"),
            ])
        }
    }

    async fn service_with(
        subreddits: &[&str],
        failing: &'static str,
    ) -> MonitorService<ScriptedSource> {
        let config = test_config(subreddits);
        let db = Database::in_memory().await.unwrap();
        let analyzer = Analyzer::new(&config.keywords);
        MonitorService::new(ScriptedSource { failing }, db, analyzer, &config)
    }

    #[tokio::test]
    async fn one_failing_subreddit_does_not_stop_the_cycle() {
        let service = service_with(&["first", "broken", "last"], "broken").await;

        let report = service.run_once().await.unwrap();

        assert_eq!(report.subreddits, 3);
        assert_eq!(report.failures, 1);
        assert_eq!(report.posts_stored, 4);

        // Every subreddit got its audit row, including the failed one.
        let stats = service.db.stats().await.unwrap();
        assert_eq!(stats.monitoring_runs, 3);
        assert_eq!(stats.total_posts, 4);
    }

    #[tokio::test]
    async fn repeated_cycles_do_not_duplicate_posts() {
        let service = service_with(&["rust"], "none").await;

        let first = service.run_once().await.unwrap();
        assert_eq!(first.posts_stored, 2);

        let second = service.run_once().await.unwrap();
        assert_eq!(second.posts_fetched, 2);
        assert_eq!(second.posts_stored, 0);

        let stats = service.db.stats().await.unwrap();
        assert_eq!(stats.total_posts, 2);
    }

    #[tokio::test]
    async fn keyword_matches_are_marked_relevant() {
        let service = service_with(&["SaaS"], "none").await;

        let report = service.run_once().await.unwrap();
        assert_eq!(report.posts_matched, 1);

        let relevant = service
            .db
            .posts(&PostFilter {
                is_relevant: Some(true),
                ..PostFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(relevant.len(), 1);
        assert_eq!(relevant[0].post.reddit_id, "SaaS_1");
        assert_eq!(
            relevant[0].keywords_found.as_deref(),
            Some(&["feedback".to_string()][..])
        );
    }
}
