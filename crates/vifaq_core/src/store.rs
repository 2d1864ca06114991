//! Vector store clients: a local persisted collection and a Chroma HTTP client.
//!
//! Both answer the same question, "which single document is closest to this
//! text and how far away is it", and hand back a validated
//! [`NearestDocument`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::embed::EmbeddingProvider;
use crate::error::{FaqError, Result};
use crate::model::{FaqEntry, NearestDocument};
use crate::retrieval::{is_zero, nearest};
use crate::storage::{append_entries_jsonl, load_entries_jsonl};

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Single best match for `text`. Fails on an empty collection.
    async fn nearest(&self, text: &str) -> Result<NearestDocument>;
}

#[async_trait]
impl VectorStore for Box<dyn VectorStore> {
    async fn nearest(&self, text: &str) -> Result<NearestDocument> {
        (**self).nearest(text).await
    }
}

/// Seed input: one curated question/answer pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaqDocument {
    pub id: String,
    pub question: String,
    pub answer: String,
}

/// A named collection persisted as `<root>/<name>.jsonl`. Opening a collection
/// that does not exist yet yields an empty one.
pub struct LocalCollection {
    name: String,
    path: PathBuf,
    embedder: Box<dyn EmbeddingProvider>,
    entries: RwLock<Vec<FaqEntry>>,
}

impl LocalCollection {
    pub fn open(root: &Path, name: &str, embedder: Box<dyn EmbeddingProvider>) -> Result<Self> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(FaqError::Config(format!("invalid collection name '{name}'")));
        }
        let path = root.join(format!("{name}.jsonl"));
        let entries = if path.exists() {
            load_entries_jsonl(&path)?
        } else {
            Vec::new()
        };
        debug!(collection = name, entries = entries.len(), path = %path.display(), "opened collection");

        Ok(Self {
            name: name.to_string(),
            path,
            embedder,
            entries: RwLock::new(entries),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Embed and persist new documents. Ids already present are skipped.
    /// Returns how many documents were added. On error, documents persisted
    /// before the failure stay in the collection.
    pub fn add(&self, docs: &[FaqDocument]) -> Result<usize> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let mut seen: HashSet<String> = entries.iter().map(|e| e.id.clone()).collect();
        let now = Utc::now();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut added = 0;
        for doc in docs {
            if !seen.insert(doc.id.clone()) {
                warn!(collection = %self.name, id = %doc.id, "skipping duplicate id");
                continue;
            }
            let entry = FaqEntry {
                id: doc.id.clone(),
                question: doc.question.clone(),
                answer: doc.answer.clone(),
                embedding: self.embedder.embed(&doc.question)?,
                created_at: now,
                source: Some("human_curated".to_string()),
            };
            append_entries_jsonl(&self.path, std::slice::from_ref(&entry))?;
            entries.push(entry);
            added += 1;
        }
        Ok(added)
    }
}

#[async_trait]
impl VectorStore for LocalCollection {
    async fn nearest(&self, text: &str) -> Result<NearestDocument> {
        let query = self.embedder.embed(text)?;
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);

        let (entry, distance) =
            nearest(&query, &entries).ok_or_else(|| FaqError::EmptyCollection(self.name.clone()))?;
        debug!(collection = %self.name, id = %entry.id, distance, "nearest document");

        Ok(NearestDocument {
            id: entry.id.clone(),
            document: entry.answer.clone(),
            distance,
        })
    }
}

/// Chroma `query` response: one inner list per query embedding, parallel
/// across `ids`, `documents` and `distances`.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    pub ids: Vec<Vec<String>>,
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<Option<f32>>>>,
}

impl QueryResponse {
    pub fn into_nearest(self, collection: &str) -> Result<NearestDocument> {
        let malformed = |msg: &str| FaqError::MalformedStoreResponse(msg.to_string());

        let ids = self.ids.into_iter().next().ok_or_else(|| malformed("no id row"))?;
        let documents = self
            .documents
            .and_then(|rows| rows.into_iter().next())
            .ok_or_else(|| malformed("documents not included"))?;
        let distances = self
            .distances
            .and_then(|rows| rows.into_iter().next())
            .ok_or_else(|| malformed("distances not included"))?;

        if ids.len() != documents.len() || ids.len() != distances.len() {
            return Err(malformed(&format!(
                "row lengths differ: ids={} documents={} distances={}",
                ids.len(),
                documents.len(),
                distances.len()
            )));
        }

        let (Some(id), Some(document), Some(distance)) = (
            ids.into_iter().next(),
            documents.into_iter().next(),
            distances.into_iter().next(),
        ) else {
            return Err(FaqError::EmptyCollection(collection.to_string()));
        };

        let document = document.ok_or_else(|| malformed("null document"))?;
        let distance = distance
            .filter(|d| d.is_finite())
            .ok_or_else(|| malformed("missing or non-finite distance"))?;

        Ok(NearestDocument {
            id,
            document,
            distance,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
}

/// Client for a collection hosted by a Chroma server. Embeddings are computed
/// locally and sent as `query_embeddings`.
pub struct ChromaStore {
    http: reqwest::Client,
    base_url: String,
    collection: String,
    embedder: Box<dyn EmbeddingProvider>,
    collection_id: OnceCell<String>,
}

impl ChromaStore {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        collection: &str,
        embedder: Box<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            embedder,
            collection_id: OnceCell::new(),
        }
    }

    async fn collection_id(&self) -> Result<&str> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let url = format!("{}/api/v1/collections/{}", self.base_url, self.collection);
                let info: CollectionInfo = self
                    .http
                    .get(url)
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                debug!(collection = %self.collection, id = %info.id, "resolved chroma collection");
                Ok::<_, FaqError>(info.id)
            })
            .await?;
        Ok(id)
    }

    /// Like `collection_id`, but creates the collection when it is missing.
    async fn ensure_collection(&self) -> Result<&str> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let url = format!("{}/api/v1/collections", self.base_url);
                let info: CollectionInfo = self
                    .http
                    .post(url)
                    .json(&json!({
                        "name": self.collection,
                        "metadata": {"hnsw:space": "l2"},
                        "get_or_create": true,
                    }))
                    .send()
                    .await?
                    .error_for_status()?
                    .json()
                    .await?;
                debug!(collection = %self.collection, id = %info.id, "created or found chroma collection");
                Ok::<_, FaqError>(info.id)
            })
            .await?;
        Ok(id)
    }

    /// Embed questions locally and upload them with their answers as
    /// documents. Chroma ignores ids it already holds. Returns how many
    /// documents were sent.
    pub async fn add(&self, docs: &[FaqDocument]) -> Result<usize> {
        if docs.is_empty() {
            return Ok(0);
        }
        let embeddings = docs
            .iter()
            .map(|doc| self.embedder.embed(&doc.question))
            .collect::<Result<Vec<_>>>()?;
        let id = self.ensure_collection().await?;
        let url = format!("{}/api/v1/collections/{id}/add", self.base_url);

        self.http
            .post(url)
            .json(&json!({
                "ids": docs.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
                "documents": docs.iter().map(|d| d.answer.as_str()).collect::<Vec<_>>(),
                "metadatas": docs.iter().map(|d| json!({"question": d.question})).collect::<Vec<_>>(),
                "embeddings": embeddings,
            }))
            .send()
            .await?
            .error_for_status()?;
        debug!(collection = %self.collection, count = docs.len(), "uploaded documents");
        Ok(docs.len())
    }
}

#[async_trait]
impl VectorStore for ChromaStore {
    async fn nearest(&self, text: &str) -> Result<NearestDocument> {
        let embedding = self.embedder.embed(text)?;
        let id = self.collection_id().await?;
        let url = format!("{}/api/v1/collections/{id}/query", self.base_url);

        let response: QueryResponse = self
            .http
            .post(url)
            .json(&json!({
                "query_embeddings": [embedding],
                "n_results": 1,
                "include": ["documents", "distances"],
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut nearest = response.into_nearest(&self.collection)?;
        if is_zero(&embedding) {
            nearest.distance = f32::INFINITY;
        }
        Ok(nearest)
    }
}
