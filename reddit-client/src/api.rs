use std::sync::Arc;

use crate::rate_limiter::{RateLimitConfig, RateLimitStatus, RateLimiter};
use redwatch_core::{CoreError, Post, RedditApiError, SearchSort, SortOrder, TimeFilter};
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

/// Reddit's listing envelope: `{"kind": "Listing", "data": {"children": [...]}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    /// Absent for deleted accounts.
    #[serde(default)]
    pub author: Option<String>,
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub upvote_ratio: Option<f64>,
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub over_18: bool,
    #[serde(default)]
    pub stickied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditUserData {
    pub name: String,
    pub created_utc: f64,
    #[serde(default)]
    pub link_karma: i64,
    #[serde(default)]
    pub comment_karma: i64,
    #[serde(default)]
    pub is_gold: bool,
    #[serde(default)]
    pub is_mod: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditSubredditData {
    pub display_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub public_description: String,
    #[serde(default)]
    pub subscribers: u64,
    pub created_utc: f64,
    #[serde(default)]
    pub over18: bool,
    #[serde(default)]
    pub subreddit_type: String,
}

/// Low-level Reddit API client: rate-limited requests against the OAuth
/// host, with HTTP status codes mapped onto `RedditApiError`.
#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    user_agent: String,
    base_url: String,
}

impl RedditApiClient {
    pub fn new(http_client: Client, user_agent: String) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::reddit_oauth()));

        Self {
            http_client,
            rate_limiter,
            user_agent,
            base_url: REDDIT_API_BASE.to_string(),
        }
    }

    /// Point API requests somewhere else (tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        query_params: &[(&str, &str)],
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);

        let permit = self.rate_limiter.acquire_permit().await;
        if !permit.queue_wait_time.is_zero() {
            debug!(endpoint, wait = ?permit.queue_wait_time, "request delayed by rate limiter");
        }

        let mut request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token)
            .header("User-Agent", &self.user_agent)
            .query(&[("raw_json", "1")]);

        if !query_params.is_empty() {
            request_builder = request_builder.query(query_params);
        }

        debug!(%method, endpoint, "Reddit API request");
        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(e) => {
                error!(%method, endpoint, %e, "network error");
                if e.is_timeout() {
                    return Err(CoreError::RedditApi(RedditApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!(%status, endpoint, "request successful");
            return Ok(response);
        }

        error!(%status, endpoint, "request failed");
        match status.as_u16() {
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                warn!(retry_after, "rate limited by Reddit");
                Err(CoreError::RedditApi(RedditApiError::RateLimitExceeded {
                    retry_after,
                }))
            }
            401 => Err(CoreError::RedditApi(RedditApiError::InvalidToken)),
            403 => Err(CoreError::RedditApi(RedditApiError::Forbidden {
                resource: endpoint.to_string(),
            })),
            404 => Err(CoreError::RedditApi(RedditApiError::NotFound {
                resource: endpoint.to_string(),
            })),
            code if status.is_server_error() => {
                Err(CoreError::RedditApi(RedditApiError::ServerError {
                    status_code: code,
                }))
            }
            _ => Err(CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("unexpected status {status} for {endpoint}"),
            })),
        }
    }

    /// Fetch a subreddit listing: `/r/{subreddit}/{sort}`.
    pub async fn subreddit_posts(
        &self,
        access_token: &str,
        subreddit: &str,
        sort: SortOrder,
        limit: u32,
        time_filter: TimeFilter,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let endpoint = format!("/r/{}/{}", subreddit, sort.as_str());
        let limit_str = limit.to_string();

        let mut params: Vec<(&str, &str)> = vec![("limit", limit_str.as_str())];
        if sort.takes_time_filter() {
            params.push(("t", time_filter.as_str()));
        }

        let response = self
            .make_request(Method::GET, &endpoint, access_token, &params)
            .await
            .map_err(|e| not_found_to_subreddit(e, subreddit))?;

        let listing: RedditListing<RedditPostData> = response.json().await.map_err(|e| {
            error!(subreddit, %e, "failed to parse listing");
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("listing for r/{subreddit}"),
            })
        })?;

        info!(
            subreddit,
            count = listing.data.children.len(),
            %sort,
            "retrieved posts"
        );
        Ok(listing)
    }

    /// Search within a subreddit (`restrict_sr=1`) or site-wide.
    pub async fn search_posts(
        &self,
        access_token: &str,
        query: &str,
        subreddit: Option<&str>,
        sort: SearchSort,
        limit: u32,
        time_filter: TimeFilter,
    ) -> Result<RedditListing<RedditPostData>, CoreError> {
        let endpoint = match subreddit {
            Some(sub) => format!("/r/{sub}/search"),
            None => "/search".to_string(),
        };
        let limit_str = limit.to_string();

        let mut params: Vec<(&str, &str)> = vec![
            ("q", query),
            ("sort", sort.as_str()),
            ("limit", limit_str.as_str()),
            ("t", time_filter.as_str()),
        ];
        if subreddit.is_some() {
            params.push(("restrict_sr", "1"));
        }

        let response = self
            .make_request(Method::GET, &endpoint, access_token, &params)
            .await
            .map_err(|e| match subreddit {
                Some(sub) => not_found_to_subreddit(e, sub),
                None => e,
            })?;

        let listing: RedditListing<RedditPostData> = response.json().await.map_err(|e| {
            error!(query, %e, "failed to parse search results");
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("search results for '{query}'"),
            })
        })?;

        info!(query, count = listing.data.children.len(), "search complete");
        Ok(listing)
    }

    /// Subreddit metadata: `/r/{subreddit}/about`.
    pub async fn subreddit_about(
        &self,
        access_token: &str,
        subreddit: &str,
    ) -> Result<RedditSubredditData, CoreError> {
        let endpoint = format!("/r/{subreddit}/about");

        let response = self
            .make_request(Method::GET, &endpoint, access_token, &[])
            .await
            .map_err(|e| not_found_to_subreddit(e, subreddit))?;

        let about: RedditListingChild<RedditSubredditData> =
            response.json().await.map_err(|e| {
                error!(subreddit, %e, "failed to parse subreddit info");
                CoreError::RedditApi(RedditApiError::InvalidResponse {
                    details: format!("info for r/{subreddit}"),
                })
            })?;

        debug!(subreddit, "retrieved subreddit info");
        Ok(about.data)
    }

    /// User metadata: `/user/{username}/about`.
    pub async fn user_about(
        &self,
        access_token: &str,
        username: &str,
    ) -> Result<RedditUserData, CoreError> {
        let endpoint = format!("/user/{username}/about");

        let response = self
            .make_request(Method::GET, &endpoint, access_token, &[])
            .await
            .map_err(|e| match e {
                CoreError::RedditApi(RedditApiError::NotFound { .. }) => {
                    CoreError::RedditApi(RedditApiError::UserNotFound {
                        username: username.to_string(),
                    })
                }
                other => other,
            })?;

        let about: RedditListingChild<RedditUserData> = response.json().await.map_err(|e| {
            error!(username, %e, "failed to parse user info");
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("info for u/{username}"),
            })
        })?;

        debug!(username, "retrieved user info");
        Ok(about.data)
    }

    /// The authenticated account: `/api/v1/me`. Used for credential checks.
    pub async fn me(&self, access_token: &str) -> Result<RedditUserData, CoreError> {
        let response = self
            .make_request(Method::GET, "/api/v1/me", access_token, &[])
            .await?;

        let user: RedditUserData = response.json().await.map_err(|e| {
            error!(%e, "failed to parse identity");
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: "identity response".to_string(),
            })
        })?;

        debug!(name = %user.name, "verified identity");
        Ok(user)
    }

    pub async fn rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.status().await
    }
}

fn not_found_to_subreddit(error: CoreError, subreddit: &str) -> CoreError {
    match error {
        CoreError::RedditApi(RedditApiError::NotFound { .. }) => {
            CoreError::RedditApi(RedditApiError::SubredditNotFound {
                subreddit: subreddit.to_string(),
            })
        }
        other => other,
    }
}

impl From<RedditPostData> for Post {
    fn from(data: RedditPostData) -> Self {
        Self {
            reddit_id: data.id,
            subreddit: data.subreddit,
            title: data.title,
            selftext: data.selftext,
            author: data.author.unwrap_or_else(|| "[deleted]".to_string()),
            score: data.score,
            upvote_ratio: data.upvote_ratio.unwrap_or(0.5),
            num_comments: data.num_comments,
            created_utc: data.created_utc as i64,
            url: data.url,
            permalink: format!("https://reddit.com{}", data.permalink),
            is_self: data.is_self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_post_json() -> &'static str {
        r#"{
            "id": "abc123",
            "title": "Looking for feedback on my side project",
            "selftext": "It polls things.",
            "author": "builder",
            "subreddit": "SaaS",
            "url": "https://example.com/demo",
            "permalink": "/r/SaaS/comments/abc123/looking_for_feedback/",
            "created_utc": 1700000000.0,
            "score": 42,
            "num_comments": 5,
            "upvote_ratio": 0.93,
            "is_self": true
        }"#
    }

    #[test]
    fn post_data_converts_to_post() {
        let data: RedditPostData = serde_json::from_str(sample_post_json()).unwrap();
        let post: Post = data.into();

        assert_eq!(post.reddit_id, "abc123");
        assert_eq!(post.author, "builder");
        assert_eq!(post.created_utc, 1_700_000_000);
        assert_eq!(
            post.permalink,
            "https://reddit.com/r/SaaS/comments/abc123/looking_for_feedback/"
        );
    }

    #[test]
    fn deleted_author_becomes_placeholder() {
        let json = r#"{
            "id": "x1",
            "title": "t",
            "subreddit": "rust",
            "permalink": "/r/rust/comments/x1/t/",
            "created_utc": 1.0
        }"#;
        let data: RedditPostData = serde_json::from_str(json).unwrap();
        let post: Post = data.into();

        assert_eq!(post.author, "[deleted]");
        assert_eq!(post.selftext, "");
        assert_eq!(post.upvote_ratio, 0.5);
    }

    #[test]
    fn listing_envelope_deserializes() {
        let json = format!(
            r#"{{"kind": "Listing", "data": {{"children": [{{"kind": "t3", "data": {}}}], "after": null, "before": null}}}}"#,
            sample_post_json()
        );
        let listing: RedditListing<RedditPostData> = serde_json::from_str(&json).unwrap();

        assert_eq!(listing.kind, "Listing");
        assert_eq!(listing.data.children.len(), 1);
        assert_eq!(listing.data.children[0].data.id, "abc123");
    }

    #[tokio::test]
    async fn client_starts_with_full_rate_budget() {
        let client = RedditApiClient::new(Client::new(), "redwatch-test/0.1".to_string());
        let status = client.rate_limit_status().await;
        assert!(status.available_tokens > 0);
    }
}
