use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, info_span, warn, Instrument};

use crate::agent::QueryAgent;
use crate::error::Result;
use crate::fallback::Fallback;
use crate::judge::Judge;
use crate::log::{CsvLogSink, LogRecord};
use crate::model::{Query, RetrievalResult, Verdict};
use crate::ollama::Generate;
use crate::rewrite::Rewriter;
use crate::store::VectorStore;

#[derive(Debug, Clone, Serialize)]
pub struct CycleOutcome {
    pub query: String,
    pub result: RetrievalResult,
    pub verdict: Option<Verdict>,
    pub judge_error: Option<String>,
    pub latency_ms: u64,
}

impl CycleOutcome {
    pub fn to_record(&self) -> LogRecord {
        let reasoning = match (&self.verdict, &self.judge_error) {
            (Some(verdict), _) => verdict.reasoning.clone(),
            (None, Some(err)) => format!("Judge error: {err}"),
            (None, None) => String::new(),
        };
        LogRecord {
            ts: Utc::now(),
            query: self.query.clone(),
            answer: self.result.answer.clone(),
            fallback: self.result.fallback_needed(),
            latency_ms: self.latency_ms,
            score: self.verdict.as_ref().map(|v| v.score),
            reasoning,
            ids: self.result.ids().to_vec(),
        }
    }
}

/// One user's query → answer → verdict → log loop. Cycles run one at a time.
pub struct Session<V, F, G> {
    agent: QueryAgent<V, F>,
    judge: Judge<G>,
    rewriter: Option<Rewriter<G>>,
    log: Option<CsvLogSink>,
}

impl<V, F, G> Session<V, F, G>
where
    V: VectorStore,
    F: Fallback,
    G: Generate,
{
    pub fn new(agent: QueryAgent<V, F>, judge: Judge<G>) -> Self {
        Self {
            agent,
            judge,
            rewriter: None,
            log: None,
        }
    }

    pub fn with_rewriter(mut self, rewriter: Rewriter<G>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    pub fn with_log(mut self, log: CsvLogSink) -> Self {
        self.log = Some(log);
        self
    }

    pub fn agent(&self) -> &QueryAgent<V, F> {
        &self.agent
    }

    /// Run one cycle. Retrieval failures abort it before anything is logged;
    /// judge failures only cost the score.
    pub async fn cycle(&self, text: &str) -> Result<CycleOutcome> {
        let span = info_span!("query_cycle", query = %text);
        async move {
            let started = Instant::now();
            let mut result = self.agent.run(&Query::new(text)).await?;
            if let Some(rewriter) = self.rewriter.as_ref().filter(|_| !result.fallback_needed()) {
                result.answer = rewriter.rewrite(text, &result.answer).await;
            }
            let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

            let (verdict, judge_error) = match self.judge.judge(text, &result.answer, None).await {
                Ok(verdict) => (Some(verdict), None),
                Err(err) => {
                    warn!(error = %err, "judge failed, continuing without a score");
                    (None, Some(err.to_string()))
                }
            };

            let outcome = CycleOutcome {
                query: text.to_string(),
                result,
                verdict,
                judge_error,
                latency_ms,
            };

            if let Some(log) = &self.log {
                if let Err(err) = log.append(&outcome.to_record()) {
                    warn!(error = %err, path = %log.path().display(), "could not append log row");
                }
            }

            info!(
                fallback = outcome.result.fallback_needed(),
                latency_ms,
                score = ?outcome.verdict.as_ref().map(|v| v.score),
                ids = ?outcome.result.ids(),
                "faq.answer.done"
            );
            Ok(outcome)
        }
        .instrument(span)
        .await
    }
}
