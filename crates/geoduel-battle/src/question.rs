//! The question source seam.

use std::future::Future;
use std::time::Duration;

use geoduel_protocol::Question;
use rand::Rng;

use crate::BattleError;

/// Where battle questions come from.
///
/// The engine bounds every fetch with a timeout and treats a timeout like
/// any other failure: the battle is not created, and nothing is retried
/// within the same request.
pub trait QuestionSource: Send + Sync + 'static {
    /// Fetches one random question, optionally restricted to `category`.
    fn fetch_random_question(
        &self,
        category: Option<&str>,
    ) -> impl Future<Output = Result<Question, BattleError>> + Send;
}

/// A fixed, in-memory question list.
#[derive(Debug, Clone, Default)]
pub struct StaticQuestionSource {
    questions: Vec<Question>,
}

impl StaticQuestionSource {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    /// A source holding only [`Question::sample`].
    pub fn sample() -> Self {
        Self::new(vec![Question::sample()])
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    fn pick(&self, category: Option<&str>) -> Result<Question, BattleError> {
        let candidates: Vec<&Question> = match category {
            Some(wanted) => self
                .questions
                .iter()
                .filter(|q| q.category.eq_ignore_ascii_case(wanted))
                .collect(),
            None => self.questions.iter().collect(),
        };
        if candidates.is_empty() {
            return Err(BattleError::QuestionUnavailable(match category {
                Some(c) => format!("no questions in category {c:?}"),
                None => "question list is empty".to_string(),
            }));
        }
        let index = rand::rng().random_range(0..candidates.len());
        Ok(candidates[index].clone())
    }
}

impl QuestionSource for StaticQuestionSource {
    fn fetch_random_question(
        &self,
        category: Option<&str>,
    ) -> impl Future<Output = Result<Question, BattleError>> + Send {
        std::future::ready(self.pick(category))
    }
}

/// Wraps a source and answers with a fixed question whenever the inner
/// source fails or takes longer than the wrapper's timeout.
///
/// Keep the timeout below the engine's fetch timeout, or a hung source
/// still aborts the battle before the fallback is served.
#[derive(Debug, Clone)]
pub struct WithFallback<S> {
    inner: S,
    fallback: Question,
    timeout: Duration,
}

impl<S: QuestionSource> WithFallback<S> {
    /// Default bound on one inner fetch.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(4);

    /// Falls back to [`Question::sample`].
    pub fn new(inner: S) -> Self {
        Self::with_question(inner, Question::sample())
    }

    pub fn with_question(inner: S, fallback: Question) -> Self {
        Self {
            inner,
            fallback,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Serves the fallback when the inner fetch has not finished after
    /// `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<S: QuestionSource> QuestionSource for WithFallback<S> {
    fn fetch_random_question(
        &self,
        category: Option<&str>,
    ) -> impl Future<Output = Result<Question, BattleError>> + Send {
        async move {
            let fetch = self.inner.fetch_random_question(category);
            match tokio::time::timeout(self.timeout, fetch).await {
                Ok(Ok(question)) => Ok(question),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "question source failed, using fallback question");
                    Ok(self.fallback.clone())
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = self.timeout.as_millis() as u64,
                        "question source timed out, using fallback question"
                    );
                    Ok(self.fallback.clone())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoduel_protocol::{Choice, Difficulty};

    fn question(prompt: &str, category: &str) -> Question {
        Question {
            prompt: prompt.to_string(),
            choices: vec![Choice {
                label: "a".into(),
                text: "yes".into(),
            }],
            correct_label: "a".into(),
            category: category.to_string(),
            difficulty: Difficulty::Easy,
        }
    }

    struct AlwaysDown;

    impl QuestionSource for AlwaysDown {
        fn fetch_random_question(
            &self,
            _category: Option<&str>,
        ) -> impl Future<Output = Result<Question, BattleError>> + Send {
            std::future::ready(Err(BattleError::QuestionUnavailable("down".into())))
        }
    }

    #[tokio::test]
    async fn test_static_source_category_filter_is_case_insensitive() {
        let source = StaticQuestionSource::new(vec![
            question("geo", "Geography"),
            question("sci", "science"),
        ]);

        for _ in 0..20 {
            let q = source.fetch_random_question(Some("geography")).await.unwrap();
            assert_eq!(q.prompt, "geo");
        }
    }

    #[tokio::test]
    async fn test_static_source_unknown_category_is_unavailable() {
        let source = StaticQuestionSource::new(vec![question("geo", "geography")]);

        let result = source.fetch_random_question(Some("history")).await;

        assert!(matches!(result, Err(BattleError::QuestionUnavailable(_))));
    }

    #[tokio::test]
    async fn test_static_source_empty_is_unavailable() {
        let source = StaticQuestionSource::default();

        assert!(source.is_empty());
        assert!(source.fetch_random_question(None).await.is_err());
    }

    #[tokio::test]
    async fn test_static_source_without_category_picks_from_all() {
        let source = StaticQuestionSource::new(vec![question("one", "x"), question("two", "y")]);

        let q = source.fetch_random_question(None).await.unwrap();

        assert!(q.prompt == "one" || q.prompt == "two");
    }

    #[tokio::test]
    async fn test_with_fallback_failing_inner_yields_sample() {
        let source = WithFallback::new(AlwaysDown);

        let q = source.fetch_random_question(None).await.unwrap();

        assert_eq!(q, Question::sample());
    }

    struct NeverAnswers;

    impl QuestionSource for NeverAnswers {
        fn fetch_random_question(
            &self,
            _category: Option<&str>,
        ) -> impl Future<Output = Result<Question, BattleError>> + Send {
            std::future::pending()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_fallback_hung_inner_yields_sample_after_timeout() {
        let source = WithFallback::new(NeverAnswers).with_timeout(Duration::from_millis(100));
        let started = tokio::time::Instant::now();

        let q = source.fetch_random_question(None).await.unwrap();

        assert_eq!(q, Question::sample());
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(started.elapsed() < WithFallback::<NeverAnswers>::DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_with_fallback_healthy_inner_passes_through() {
        let source = WithFallback::new(StaticQuestionSource::new(vec![question("real", "x")]));

        let q = source.fetch_random_question(None).await.unwrap();

        assert_eq!(q.prompt, "real");
    }
}
