use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A Reddit submission as fetched from the API. Immutable once fetched;
/// `reddit_id` is the dedup key across polling cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub reddit_id: String,
    pub subreddit: String,
    pub title: String,
    pub selftext: String,
    pub author: String,
    pub score: i64,
    pub upvote_ratio: f64,
    pub num_comments: i64,
    pub created_utc: i64,
    pub url: String,
    pub permalink: String,
    pub is_self: bool,
}

/// A post as persisted, including relevance annotations written after
/// analysis.
#[derive(Debug, Clone, Serialize)]
pub struct StoredPost {
    #[serde(flatten)]
    pub post: Post,
    pub fetched_at: String,
    pub is_relevant: Option<bool>,
    pub relevance_score: Option<f64>,
    pub keywords_found: Option<Vec<String>>,
}

/// Sort order for subreddit listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    New,
    Hot,
    Top,
    Rising,
    Controversial,
}

impl SortOrder {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Hot => "hot",
            Self::Top => "top",
            Self::Rising => "rising",
            Self::Controversial => "controversial",
        }
    }

    /// Top and controversial listings take a `t` window parameter.
    pub const fn takes_time_filter(&self) -> bool {
        matches!(self, Self::Top | Self::Controversial)
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "hot" => Ok(Self::Hot),
            "top" => Ok(Self::Top),
            "rising" => Ok(Self::Rising),
            "controversial" => Ok(Self::Controversial),
            _ => Err(ConfigError::InvalidValue {
                field: "sort".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Sort order for search queries. Reddit's search endpoint accepts a
/// different set than the listing endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSort {
    Relevance,
    New,
    Hot,
    Top,
    Comments,
}

impl SearchSort {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::New => "new",
            Self::Hot => "hot",
            Self::Top => "top",
            Self::Comments => "comments",
        }
    }
}

impl fmt::Display for SearchSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchSort {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relevance" => Ok(Self::Relevance),
            "new" => Ok(Self::New),
            "hot" => Ok(Self::Hot),
            "top" => Ok(Self::Top),
            "comments" => Ok(Self::Comments),
            _ => Err(ConfigError::InvalidValue {
                field: "sort".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Time window for top/controversial listings and search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFilter {
    Hour,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeFilter {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::All => "all",
        }
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFilter {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "all" => Ok(Self::All),
            _ => Err(ConfigError::InvalidValue {
                field: "time filter".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// One append-only audit row per subreddit per polling cycle.
#[derive(Debug, Clone, Serialize)]
pub struct FetchLogEntry {
    pub subreddit: String,
    pub posts_fetched: u32,
    pub posts_stored: u32,
    pub posts_matched: u32,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl FetchLogEntry {
    pub fn success(
        subreddit: impl Into<String>,
        posts_fetched: u32,
        posts_stored: u32,
        posts_matched: u32,
        duration_ms: u64,
    ) -> Self {
        Self {
            subreddit: subreddit.into(),
            posts_fetched,
            posts_stored,
            posts_matched,
            duration_ms,
            error: None,
        }
    }

    pub fn failure(subreddit: impl Into<String>, duration_ms: u64, error: String) -> Self {
        Self {
            subreddit: subreddit.into(),
            posts_fetched: 0,
            posts_stored: 0,
            posts_matched: 0,
            duration_ms,
            error: Some(error),
        }
    }
}

/// Aggregate counts reported by the `stats` command.
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub total_posts: i64,
    pub relevant_posts: i64,
    pub unique_subreddits: i64,
    pub monitoring_runs: i64,
    pub top_subreddits: Vec<(String, i64)>,
}
