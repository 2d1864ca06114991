use tracing::warn;

use crate::ollama::Generate;

pub fn rewrite_prompt(question: &str, answer: &str) -> String {
    format!("Rewrite in a friendly style:\n\nQ: {question}\nA: {answer}")
}

/// Rephrases stored FAQ answers through a local model. Falls back to the
/// stored text whenever the model fails or returns nothing.
pub struct Rewriter<G> {
    backend: G,
    model: String,
}

impl<G: Generate> Rewriter<G> {
    pub fn new(backend: G, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    pub async fn rewrite(&self, question: &str, answer: &str) -> String {
        match self
            .backend
            .generate(&self.model, &rewrite_prompt(question, answer))
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => {
                warn!(model = %self.model, "rewrite came back empty, keeping stored answer");
                answer.to_string()
            }
            Err(err) => {
                warn!(model = %self.model, error = %err, "rewrite failed, keeping stored answer");
                answer.to_string()
            }
        }
    }
}
