pub mod api;
pub mod auth;
pub mod rate_limiter;
pub mod retry;

use std::time::Duration;

use redwatch_core::{CoreError, Post, RedditCredentials, SearchSort, SortOrder, TimeFilter};
use reqwest::Client;

pub use api::{RedditApiClient, RedditSubredditData, RedditUserData};
pub use auth::TokenManager;
pub use rate_limiter::RateLimitStatus;
pub use retry::RetryConfig;

/// High-level Reddit client: token management, rate limiting, and retry
/// wrapped around the raw API operations.
#[derive(Debug)]
pub struct RedditClient {
    api: RedditApiClient,
    tokens: TokenManager,
    retry: RetryConfig,
}

impl RedditClient {
    pub fn new(credentials: RedditCredentials) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&credentials.user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        let api = RedditApiClient::new(http_client.clone(), credentials.user_agent.clone());
        let tokens = TokenManager::new(http_client, credentials);

        Ok(Self {
            api,
            tokens,
            retry: RetryConfig::reddit(),
        })
    }

    /// Fetch a subreddit listing as normalized posts.
    pub async fn subreddit_posts(
        &self,
        subreddit: &str,
        sort: SortOrder,
        limit: u32,
        time_filter: TimeFilter,
    ) -> Result<Vec<Post>, CoreError> {
        let listing = retry::with_retry(&self.retry, "subreddit_posts", || async {
            let token = self.tokens.access_token().await?;
            self.api
                .subreddit_posts(&token, subreddit, sort, limit, time_filter)
                .await
        })
        .await?;

        Ok(listing
            .data
            .children
            .into_iter()
            .map(|child| child.data.into())
            .collect())
    }

    /// Search for posts, optionally restricted to one subreddit.
    pub async fn search_posts(
        &self,
        query: &str,
        subreddit: Option<&str>,
        sort: SearchSort,
        limit: u32,
        time_filter: TimeFilter,
    ) -> Result<Vec<Post>, CoreError> {
        let listing = retry::with_retry(&self.retry, "search_posts", || async {
            let token = self.tokens.access_token().await?;
            self.api
                .search_posts(&token, query, subreddit, sort, limit, time_filter)
                .await
        })
        .await?;

        Ok(listing
            .data
            .children
            .into_iter()
            .map(|child| child.data.into())
            .collect())
    }

    pub async fn subreddit_about(&self, subreddit: &str) -> Result<RedditSubredditData, CoreError> {
        retry::with_retry(&self.retry, "subreddit_about", || async {
            let token = self.tokens.access_token().await?;
            self.api.subreddit_about(&token, subreddit).await
        })
        .await
    }

    pub async fn user_about(&self, username: &str) -> Result<RedditUserData, CoreError> {
        retry::with_retry(&self.retry, "user_about", || async {
            let token = self.tokens.access_token().await?;
            self.api.user_about(&token, username).await
        })
        .await
    }

    /// Verify credentials by fetching the authenticated identity.
    pub async fn verify_connection(&self) -> Result<RedditUserData, CoreError> {
        let token = self.tokens.access_token().await?;
        self.api.me(&token).await
    }

    pub async fn rate_limit_status(&self) -> RateLimitStatus {
        self.api.rate_limit_status().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_credentials() -> RedditCredentials {
        RedditCredentials {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            user_agent: "redwatch-test/0.1".to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
        }
    }

    #[tokio::test]
    async fn client_builds_from_credentials() {
        let client = RedditClient::new(test_credentials()).unwrap();
        let status = client.rate_limit_status().await;
        assert_eq!(status.max_tokens, 10);
    }
}
