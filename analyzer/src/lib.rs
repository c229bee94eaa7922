pub mod keyword;
pub mod llm;

use redwatch_core::Post;
use tracing::warn;

pub use keyword::{KeywordFilter, KeywordMatch};
pub use llm::{LlmProvider, OpenAiProvider};

/// Relevance verdict for one post.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub is_relevant: bool,
    pub score: f64,
    pub keywords: Vec<String>,
}

impl Analysis {
    fn no_match() -> Self {
        Self {
            is_relevant: false,
            score: 0.0,
            keywords: Vec::new(),
        }
    }
}

/// Keyword matching with an optional LLM refinement pass. Only posts that
/// already matched a keyword are sent to the LLM; the final score is the
/// mean of the keyword and LLM scores.
pub struct Analyzer {
    filter: KeywordFilter,
    llm: Option<Box<dyn LlmProvider>>,
}

impl Analyzer {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            filter: KeywordFilter::new(keywords),
            llm: None,
        }
    }

    pub fn with_llm(mut self, provider: Box<dyn LlmProvider>) -> Self {
        self.llm = Some(provider);
        self
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    pub async fn analyze(&self, post: &Post) -> Analysis {
        let Some(keyword_match) = self.filter.matches(post) else {
            return Analysis::no_match();
        };

        let mut score = keyword_match.score;

        if let Some(llm) = &self.llm {
            match llm.relevance_score(post, self.filter.keywords()).await {
                Ok(ai_score) => score = (score + ai_score) / 2.0,
                Err(e) => {
                    warn!(reddit_id = %post.reddit_id, %e, "LLM scoring failed, keeping keyword score");
                }
            }
        }

        Analysis {
            is_relevant: true,
            score,
            keywords: keyword_match.matched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use redwatch_core::CoreError;

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

    struct FixedScore(f64);

    #[async_trait]
    impl LlmProvider for FixedScore {
        async fn relevance_score(&self, _: &Post, _: &[String]) -> Result<f64, CoreError> {
            Ok(self.0)
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl LlmProvider for AlwaysFails {
        async fn relevance_score(&self, _: &Post, _: &[String]) -> Result<f64, CoreError> {
            Err(CoreError::Internal {
                message: "provider down".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn keyword_only_analysis() {
        let analyzer = Analyzer::new(&keywords(&["feedback", "customer"]));

        let analysis = analyzer.analyze(&post("feedback please", "")).await;
        assert!(analysis.is_relevant);
        assert!((analysis.score - 0.5).abs() < f64::EPSILON);
        assert_eq!(analysis.keywords, vec!["feedback"]);

        let miss = analyzer.analyze(&post("nothing to see", "")).await;
        assert!(!miss.is_relevant);
        assert_eq!(miss.score, 0.0);
    }

    #[tokio::test]
    async fn llm_score_blends_with_keyword_score() {
        let analyzer =
            Analyzer::new(&keywords(&["feedback"])).with_llm(Box::new(FixedScore(0.6)));

        let analysis = analyzer.analyze(&post("feedback please", "")).await;
        assert!(analysis.is_relevant);
        // keyword score 1.0 blended with 0.6
        assert!((analysis.score - 0.8).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn llm_is_skipped_for_non_matches() {
        // A provider that would panic the test if consulted.
        struct Unreachable;

        #[async_trait]
        impl LlmProvider for Unreachable {
            async fn relevance_score(&self, _: &Post, _: &[String]) -> Result<f64, CoreError> {
                panic!("LLM consulted for a non-matching post");
            }
        }

        let analyzer = Analyzer::new(&keywords(&["feedback"])).with_llm(Box::new(Unreachable));
        let analysis = analyzer.analyze(&post("unrelated", "")).await;
        assert!(!analysis.is_relevant);
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_keyword_score() {
        let analyzer = Analyzer::new(&keywords(&["feedback"])).with_llm(Box::new(AlwaysFails));

        let analysis = analyzer.analyze(&post("feedback please", "")).await;
        assert!(analysis.is_relevant);
        assert!((analysis.score - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn zero_keywords_never_relevant() {
        let analyzer = Analyzer::new(&[]);
        let analysis = analyzer.analyze(&post("anything", "everything")).await;
        assert!(!analysis.is_relevant);
    }
}
