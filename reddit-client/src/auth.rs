use std::time::{Duration, Instant};

use redwatch_core::{CoreError, RedditApiError, RedditCredentials};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

const TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Refresh this far before the token actually expires.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Acquires and caches OAuth2 tokens via the password grant, the flow
/// Reddit prescribes for script-type applications.
#[derive(Debug)]
pub struct TokenManager {
    http_client: Client,
    credentials: RedditCredentials,
    token_url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenManager {
    pub fn new(http_client: Client, credentials: RedditCredentials) -> Self {
        Self {
            http_client,
            credentials,
            token_url: TOKEN_URL.to_string(),
            cached: Mutex::new(None),
        }
    }

    /// Point token requests somewhere else (tests).
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    /// Return a valid access token, requesting a fresh one if the cached
    /// token is missing or close to expiry.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() + EXPIRY_MARGIN < token.expires_at {
                return Ok(token.access_token.clone());
            }
            debug!("cached token expiring, refreshing");
        }

        let token = self.request_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn request_token(&self) -> Result<CachedToken, CoreError> {
        let params = [
            ("grant_type", "password"),
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .header("User-Agent", &self.credentials.user_agent)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: "client id or secret rejected".to_string(),
            }));
        }
        if !status.is_success() {
            return Err(CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: format!("token endpoint returned {status}"),
            }));
        }

        // Reddit reports bad user credentials as 200 with an error body.
        let body: TokenResponse = response.json().await.map_err(|e| {
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("token response: {e}"),
            })
        })?;

        if let Some(error) = body.error {
            return Err(CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                reason: error,
            }));
        }

        let access_token = body.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: "token response missing access_token".to_string(),
            })
        })?;
        let expires_in = body.expires_in.unwrap_or(3600);

        info!(expires_in, "acquired Reddit access token");
        Ok(CachedToken {
            access_token,
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        })
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

    #[test]
    fn token_response_tolerates_error_bodies() {
        let body: TokenResponse = serde_json::from_str(r#"{"error": "invalid_grant"}"#).unwrap();
        assert_eq!(body.error.as_deref(), Some("invalid_grant"));
        assert!(body.access_token.is_none());
    }

    #[test]
    fn token_response_parses_success_body() {
        let body: TokenResponse = serde_json::from_str(
            r#"{"access_token": "abc123", "token_type": "bearer", "expires_in": 3600, "scope": "*"}"#,
        )
        .unwrap();
        assert_eq!(body.access_token.as_deref(), Some("abc123"));
        assert_eq!(body.expires_in, Some(3600));
    }

    #[tokio::test]
    async fn cache_starts_empty() {
        let manager = TokenManager::new(Client::new(), test_credentials());
        assert!(manager.cached.lock().await.is_none());
    }
}
