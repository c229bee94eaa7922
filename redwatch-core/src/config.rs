use std::env;

use crate::error::ConfigError;

/// Reddit script-app credentials, read from the environment.
#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub username: String,
    pub password: String,
}

/// Monitoring configuration. Loaded once at startup; not mutated at runtime.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub credentials: RedditCredentials,
    pub subreddits: Vec<String>,
    pub keywords: Vec<String>,
    pub interval_minutes: u64,
    pub fetch_limit: u32,
    pub database_path: String,
    pub log_file: String,
    pub openai_api_key: Option<String>,
}

impl MonitorConfig {
    /// Load configuration from the environment. Call `dotenvy::dotenv()`
    /// before this to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let credentials = RedditCredentials {
            client_id: require_var("REDDIT_CLIENT_ID")?,
            client_secret: require_var("REDDIT_CLIENT_SECRET")?,
            user_agent: require_var("REDDIT_USER_AGENT")?,
            username: require_var("REDDIT_USERNAME")?,
            password: require_var("REDDIT_PASSWORD")?,
        };

        let subreddits = parse_list(&var_or("TARGET_SUBREDDITS", "SaaS,startup"));
        if subreddits.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "TARGET_SUBREDDITS must name at least one subreddit".to_string(),
            });
        }

        let keywords = parse_list(&var_or("KEYWORDS", "feedback,customer"));

        let interval_minutes = parse_var("MONITOR_INTERVAL", 120)?;
        if interval_minutes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "MONITOR_INTERVAL".to_string(),
                value: "0".to_string(),
            });
        }

        let fetch_limit: u32 = parse_var("FETCH_LIMIT", 25)?;
        if fetch_limit == 0 || fetch_limit > 100 {
            return Err(ConfigError::InvalidValue {
                field: "FETCH_LIMIT".to_string(),
                value: fetch_limit.to_string(),
            });
        }

        let config = Self {
            credentials,
            subreddits,
            keywords,
            interval_minutes,
            fetch_limit,
            database_path: var_or("DATABASE_PATH", "reddit_data.db"),
            log_file: var_or("LOG_FILE", "redwatch.log"),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
        };

        tracing::debug!(
            subreddits = config.subreddits.len(),
            keywords = config.keywords.len(),
            interval_minutes = config.interval_minutes,
            "loaded monitor configuration"
        );
        Ok(config)
    }
}

fn require_var(name: &str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
            var_name: name.to_string(),
        })
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: name.to_string(),
                value: raw,
            })
        }
        _ => Ok(default),
    }
}

/// Split a comma-separated list, trimming whitespace and dropping empties.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
