use std::time::Duration;

pub const DEFAULT_DISTANCE_THRESHOLD: f32 = 1.0;
pub const DEFAULT_COLLECTION: &str = "vi_faq";
pub const DEFAULT_EMBEDDING_DIM: usize = 768;

pub const DEFAULT_SEARCH_URL: &str = "https://api.tavily.com/search";
pub const DEFAULT_SEARCH_RESULTS: usize = 5;
pub const DEFAULT_CHAT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_FALLBACK_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
pub const DEFAULT_JUDGE_MODEL: &str = "granite3.3:2b";
pub const DEFAULT_JUDGE_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_JUDGE_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_JUDGE_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_REWRITE_MODEL: &str = "mistral";

pub const DEFAULT_LOG_PATH: &str = "runs.csv";

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Nearest-neighbour distances strictly above this go to the fallback.
    pub distance_threshold: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            distance_threshold: DEFAULT_DISTANCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FallbackConfig {
    pub search_api_key: Option<String>,
    pub search_url: String,
    pub max_results: usize,
    pub chat_api_key: Option<String>,
    pub chat_base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            search_api_key: None,
            search_url: DEFAULT_SEARCH_URL.to_string(),
            max_results: DEFAULT_SEARCH_RESULTS,
            chat_api_key: None,
            chat_base_url: DEFAULT_CHAT_BASE_URL.to_string(),
            model: DEFAULT_FALLBACK_MODEL.to_string(),
            temperature: 0.2,
            max_tokens: 256,
            timeout: DEFAULT_FALLBACK_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JudgeConfig {
    pub model: String,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_JUDGE_MODEL.to_string(),
            max_attempts: DEFAULT_JUDGE_MAX_ATTEMPTS,
            backoff: DEFAULT_JUDGE_BACKOFF,
        }
    }
}
