use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FaqError, Result};

pub const MAX_SCORE: u8 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    text: String,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A stored FAQ entry in a local collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqEntry {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub source: Option<String>,
}

/// Best match returned by a vector store for a single query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestDocument {
    pub id: String,
    pub document: String,
    pub distance: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    Faq { ids: Vec<String> },
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub answer: String,
    pub provenance: Provenance,
}

impl RetrievalResult {
    pub fn from_faq(answer: String, id: String) -> Self {
        Self {
            answer,
            provenance: Provenance::Faq { ids: vec![id] },
        }
    }

    pub fn from_fallback(answer: String) -> Self {
        Self {
            answer,
            provenance: Provenance::Fallback,
        }
    }

    pub fn fallback_needed(&self) -> bool {
        matches!(self.provenance, Provenance::Fallback)
    }

    pub fn ids(&self) -> &[String] {
        match &self.provenance {
            Provenance::Faq { ids } => ids,
            Provenance::Fallback => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub score: u8,
    pub reasoning: String,
}

#[derive(Deserialize)]
struct RawVerdict {
    score: i64,
    reasoning: String,
}

impl Verdict {
    /// Parse judge output, rejecting anything that is not exactly the verdict
    /// schema with a score in `0..=MAX_SCORE`.
    pub fn from_json(raw: &str) -> Result<Self> {
        let parsed: RawVerdict = serde_json::from_str(raw.trim()).map_err(|err| {
            FaqError::InvalidVerdict(format!("not a verdict object ({err}): {}", preview(raw)))
        })?;

        let score = u8::try_from(parsed.score)
            .ok()
            .filter(|s| *s <= MAX_SCORE)
            .ok_or_else(|| {
                FaqError::InvalidVerdict(format!(
                    "score {} outside 0..={MAX_SCORE}",
                    parsed.score
                ))
            })?;

        Ok(Self {
            score,
            reasoning: parsed.reasoning,
        })
    }
}

fn preview(raw: &str) -> String {
    const LIMIT: usize = 120;
    let trimmed = raw.trim();
    match trimmed.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
