use tracing::{debug, info};

use crate::config::JudgeConfig;
use crate::error::{FaqError, Result};
use crate::model::Verdict;
use crate::ollama::Generate;
use crate::retry::RetryPolicy;

/// Build the evaluation prompt. Identical inputs give identical prompts.
pub fn judge_prompt(query: &str, answer: &str, reference: Option<&str>) -> String {
    let mut prompt = format!(
        "You are an expert telecom support evaluator.\n\n\
         QUESTION:\n{query}\n\n\
         ANSWER:\n{answer}\n"
    );
    if let Some(reference) = reference.filter(|r| !r.trim().is_empty()) {
        prompt.push_str(&format!("\nREFERENCE (ground truth):\n{reference}\n"));
    }
    prompt.push_str(
        "\nRate the ANSWER on factual correctness & helpfulness.\n\
         Return only valid JSON: {\"score\": 0-5 integer, \"reasoning\": \"...\"}",
    );
    prompt
}

/// Scores answers with a local model, retrying malformed verdicts and
/// transport failures.
pub struct Judge<G> {
    backend: G,
    config: JudgeConfig,
}

impl<G: Generate> Judge<G> {
    pub fn new(backend: G, config: JudgeConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Fails with [`FaqError::JudgeUnavailable`] once the retry budget is spent.
    pub async fn judge(&self, query: &str, answer: &str, reference: Option<&str>) -> Result<Verdict> {
        let prompt = judge_prompt(query, answer, reference);
        let policy = RetryPolicy::new(self.config.max_attempts, self.config.backoff);
        let model = self.config.model.as_str();

        let verdict = policy
            .run(
                |attempt| {
                    let prompt = prompt.as_str();
                    async move {
                        debug!(attempt, model, "requesting verdict");
                        let raw = self.backend.generate(model, prompt).await?;
                        Verdict::from_json(&raw)
                    }
                },
                FaqError::is_transient,
            )
            .await
            .map_err(|err| FaqError::JudgeUnavailable {
                attempts: err.attempts,
                source: Box::new(err.last),
            })?;

        info!(score = verdict.score, model, "verdict received");
        Ok(verdict)
    }
}
