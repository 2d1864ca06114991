use tracing::{debug, info};

use crate::config::AgentConfig;
use crate::error::Result;
use crate::fallback::Fallback;
use crate::model::{Query, RetrievalResult};
use crate::store::VectorStore;

/// Answers from the FAQ store when the nearest document is close enough,
/// otherwise from the fallback.
pub struct QueryAgent<V, F> {
    store: V,
    fallback: F,
    config: AgentConfig,
}

impl<V: VectorStore, F: Fallback> QueryAgent<V, F> {
    pub fn new(store: V, fallback: F, config: AgentConfig) -> Self {
        Self {
            store,
            fallback,
            config,
        }
    }

    pub fn store(&self) -> &V {
        &self.store
    }

    /// Store errors propagate untouched; there is no retry here.
    pub async fn run(&self, query: &Query) -> Result<RetrievalResult> {
        let nearest = self.store.nearest(query.text()).await?;
        let threshold = self.config.distance_threshold;

        if nearest.distance > threshold {
            info!(
                distance = nearest.distance,
                threshold,
                nearest_id = %nearest.id,
                "no close FAQ match, using fallback"
            );
            let answer = self.fallback.resolve(query.text()).await;
            return Ok(RetrievalResult::from_fallback(answer));
        }

        debug!(distance = nearest.distance, id = %nearest.id, "answering from FAQ");
        Ok(RetrievalResult::from_faq(nearest.document, nearest.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FaqError;
    use crate::fallback::{IdkFallback, IDK_ANSWER};
    use crate::model::NearestDocument;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedStore(f32);

    #[async_trait]
    impl VectorStore for FixedStore {
        async fn nearest(&self, _text: &str) -> Result<NearestDocument> {
            Ok(NearestDocument {
                id: "faq-balance".into(),
                document: "Dial *199# to check your balance.".into(),
                distance: self.0,
            })
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        async fn nearest(&self, _text: &str) -> Result<NearestDocument> {
            Err(FaqError::EmptyCollection("vi_faq".into()))
        }
    }

    #[derive(Default)]
    struct CountingFallback(AtomicUsize);

    #[async_trait]
    impl Fallback for CountingFallback {
        async fn resolve(&self, query: &str) -> String {
            self.0.fetch_add(1, Ordering::SeqCst);
            format!("web: {query}")
        }
    }

    fn agent<V: VectorStore>(store: V) -> QueryAgent<V, CountingFallback> {
        QueryAgent::new(store, CountingFallback::default(), AgentConfig::default())
    }

    #[tokio::test]
    async fn close_match_returns_stored_text_verbatim() {
        let agent = agent(FixedStore(0.3));
        let result = agent.run(&Query::new("How do I check my balance?")).await.unwrap();

        assert_eq!(result.answer, "Dial *199# to check your balance.");
        assert!(!result.fallback_needed());
        assert_eq!(result.ids(), ["faq-balance".to_string()]);
        assert_eq!(agent.fallback.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn distance_at_threshold_is_still_a_match() {
        let result = agent(FixedStore(1.0)).run(&Query::new("q")).await.unwrap();
        assert!(!result.fallback_needed());
        assert_eq!(result.ids().len(), 1);
    }

    #[tokio::test]
    async fn far_match_uses_fallback_without_ids() {
        let agent = agent(FixedStore(1.4));
        let result = agent.run(&Query::new("What's the weather in Paris?")).await.unwrap();

        assert!(result.fallback_needed());
        assert!(result.ids().is_empty());
        assert_eq!(result.answer, "web: What's the weather in Paris?");
        assert_eq!(agent.fallback.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn far_match_without_search_key_answers_idk() {
        let agent = QueryAgent::new(FixedStore(1.4), IdkFallback, AgentConfig::default());
        let result = agent.run(&Query::new("What's the weather in Paris?")).await.unwrap();
        assert_eq!(result.answer, IDK_ANSWER);
        assert!(result.fallback_needed());
        assert!(result.ids().is_empty());
    }

    #[tokio::test]
    async fn threshold_is_configurable() {
        let strict = QueryAgent::new(
            FixedStore(0.3),
            CountingFallback::default(),
            AgentConfig {
                distance_threshold: 0.25,
            },
        );
        assert!(strict.run(&Query::new("q")).await.unwrap().fallback_needed());
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let err = agent(BrokenStore).run(&Query::new("q")).await.unwrap_err();
        assert!(matches!(err, FaqError::EmptyCollection(_)));
    }
}
