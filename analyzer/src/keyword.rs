use redwatch_core::Post;

/// Result of matching a post against the configured keyword set.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordMatch {
    /// Keywords found in the post, in configuration order.
    pub matched: Vec<String>,
    /// Fraction of configured keywords that matched, clamped to 1.0.
    pub score: f64,
}

/// Case-insensitive substring matching over title + body.
///
/// With zero configured keywords nothing ever matches; posts are still
/// stored, they are just never marked relevant.
#[derive(Debug, Clone)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn matches(&self, post: &Post) -> Option<KeywordMatch> {
        if self.keywords.is_empty() {
            return None;
        }

        let text = format!("{} {}", post.title, post.selftext).to_lowercase();

        let matched: Vec<String> = self
            .keywords
            .iter()
            .filter(|keyword| text.contains(keyword.as_str()))
            .cloned()
            .collect();

        if matched.is_empty() {
            return None;
        }

        let score = (matched.len() as f64 / self.keywords.len() as f64).min(1.0);
        Some(KeywordMatch { matched, score })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(title: &str, selftext: &str) -> Post {
        Post {
            reddit_id: "t1".to_string(),
            subreddit: "SaaS".to_string(),
            title: title.to_string(),
            selftext: selftext.to_string(),
            author: "tester".to_string(),
            score: 0,
            upvote_ratio: 0.5,
            num_comments: 0,
            created_utc: 0,
            url: String::new(),
            permalink: String::new(),
            is_self: true,
        }
    }

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn matching_is_case_insensitive() {
        let filter = KeywordFilter::new(&keywords(&["Feedback"]));

        let m = filter.matches(&post("Need FEEDBACK on my app", "")).unwrap();
        assert_eq!(m.matched, vec!["feedback"]);
    }

    #[test]
    fn matches_title_or_body() {
        let filter = KeywordFilter::new(&keywords(&["customer"]));

        assert!(filter.matches(&post("customer stories", "")).is_some());
        assert!(filter
            .matches(&post("a question", "how do you find your first customer?"))
            .is_some());
        assert!(filter.matches(&post("unrelated", "nothing here")).is_none());
    }

    #[test]
    fn zero_keywords_match_nothing() {
        let filter = KeywordFilter::new(&[]);
        assert!(filter.is_empty());
        assert!(filter
            .matches(&post("anything at all", "any body text"))
            .is_none());
    }

    #[test]
    fn score_is_matched_over_total() {
        let filter = KeywordFilter::new(&keywords(&["feedback", "customer", "churn", "pricing"]));

        let m = filter
            .matches(&post("feedback on pricing", ""))
            .unwrap();
        assert_eq!(m.matched, vec!["feedback", "pricing"]);
        assert!((m.score - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn full_match_caps_at_one() {
        let filter = KeywordFilter::new(&keywords(&["a", "b"]));
        let m = filter.matches(&post("a b", "")).unwrap();
        assert!((m.score - 1.0).abs() < f64::EPSILON);
    }
}
