pub mod agent;
pub mod config;
pub mod embed;
pub mod error;
pub mod fallback;
pub mod judge;
pub mod log;
pub mod model;
pub mod ollama;
pub mod retrieval;
pub mod retry;
pub mod rewrite;
pub mod session;
pub mod storage;
pub mod store;
pub mod stream;

pub use agent::QueryAgent;
pub use config::{
    AgentConfig, FallbackConfig, JudgeConfig, DEFAULT_CHAT_BASE_URL, DEFAULT_COLLECTION,
    DEFAULT_DISTANCE_THRESHOLD, DEFAULT_EMBEDDING_DIM, DEFAULT_FALLBACK_MODEL,
    DEFAULT_FALLBACK_TIMEOUT, DEFAULT_JUDGE_BACKOFF, DEFAULT_JUDGE_MAX_ATTEMPTS,
    DEFAULT_JUDGE_MODEL, DEFAULT_JUDGE_TIMEOUT, DEFAULT_LOG_PATH, DEFAULT_OLLAMA_HOST,
    DEFAULT_REWRITE_MODEL, DEFAULT_SEARCH_RESULTS, DEFAULT_SEARCH_URL,
};
pub use embed::{EmbeddingProvider, HashEmbeddingProvider};
pub use error::{FaqError, Result};
pub use fallback::{Fallback, IdkFallback, WebFallback, IDK_ANSWER};
pub use judge::{judge_prompt, Judge};
pub use log::{CsvLogSink, LogRecord, LOG_HEADERS};
pub use model::{FaqEntry, NearestDocument, Provenance, Query, RetrievalResult, Verdict};
pub use ollama::{Generate, OllamaClient};
pub use retry::{RetryError, RetryPolicy};
pub use rewrite::Rewriter;
pub use session::{CycleOutcome, Session};
pub use store::{ChromaStore, FaqDocument, LocalCollection, QueryResponse, VectorStore};
pub use stream::{accumulate, fragments};
