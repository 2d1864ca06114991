use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use vifaq_core::{
    AgentConfig, ChromaStore, CsvLogSink, CycleOutcome, EmbeddingProvider, FallbackConfig,
    FaqDocument, HashEmbeddingProvider, Judge, JudgeConfig, LocalCollection, OllamaClient,
    QueryAgent, Rewriter, Session, VectorStore, WebFallback, DEFAULT_CHAT_BASE_URL,
    DEFAULT_COLLECTION, DEFAULT_DISTANCE_THRESHOLD, DEFAULT_FALLBACK_MODEL,
    DEFAULT_JUDGE_MAX_ATTEMPTS, DEFAULT_JUDGE_MODEL, DEFAULT_LOG_PATH, DEFAULT_OLLAMA_HOST,
    DEFAULT_REWRITE_MODEL, DEFAULT_SEARCH_URL,
};

const PROMPT: &str = "enter your query: ";
const FAREWELL: &str = "Good-bye!";
const FALLBACK_NOTICE: &str = "No close match in FAQ: fallback was used.";

type ChatSession = Session<Box<dyn VectorStore>, WebFallback, Arc<OllamaClient>>;

#[derive(Debug, Parser)]
#[command(name = "vifaq", version)]
#[command(about = "Telecom FAQ assistant with web fallback and an LLM judge")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Args)]
struct Settings {
    /// Directory holding local collections.
    #[arg(long, env = "FAQ_STORE_PATH", default_value = "./faq_db", global = true)]
    store_path: PathBuf,

    #[arg(long, env = "FAQ_COLLECTION", default_value = DEFAULT_COLLECTION, global = true)]
    collection: String,

    /// Query a Chroma server instead of the local collection.
    #[arg(long, env = "CHROMA_URL", global = true)]
    chroma_url: Option<String>,

    /// Matches farther than this are answered by the fallback.
    #[arg(long, env = "FAQ_DISTANCE_THRESHOLD", default_value_t = DEFAULT_DISTANCE_THRESHOLD, global = true)]
    distance_threshold: f32,

    #[arg(long, env = "TAVILY_API_KEY", hide_env_values = true, global = true)]
    tavily_api_key: Option<String>,

    #[arg(long, env = "TAVILY_URL", default_value = DEFAULT_SEARCH_URL, global = true)]
    tavily_url: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_CHAT_BASE_URL, global = true)]
    openai_base_url: String,

    #[arg(long, env = "FALLBACK_MODEL", default_value = DEFAULT_FALLBACK_MODEL, global = true)]
    fallback_model: String,

    #[arg(long, env = "FALLBACK_TIMEOUT", default_value = "10s", global = true)]
    fallback_timeout: humantime::Duration,

    #[arg(long, env = "OLLAMA_HOST", default_value = DEFAULT_OLLAMA_HOST, global = true)]
    ollama_host: String,

    #[arg(long, env = "JUDGE_MODEL", default_value = DEFAULT_JUDGE_MODEL, global = true)]
    judge_model: String,

    /// Attempts before the judge gives up.
    #[arg(long, env = "JUDGE_MAX_RETRY", default_value_t = DEFAULT_JUDGE_MAX_ATTEMPTS, global = true)]
    judge_max_retry: u32,

    #[arg(long, env = "JUDGE_BACKOFF", default_value = "1s", global = true)]
    judge_backoff: humantime::Duration,

    #[arg(long, env = "JUDGE_TIMEOUT", default_value = "600s", global = true)]
    judge_timeout: humantime::Duration,

    #[arg(long, env = "FAQ_LOG_PATH", default_value = DEFAULT_LOG_PATH, global = true)]
    log_path: PathBuf,

    /// Do not append cycles to the CSV log.
    #[arg(long, global = true)]
    no_log: bool,

    /// Rephrase FAQ answers in a friendlier tone.
    #[arg(long, global = true)]
    rewrite: bool,

    #[arg(long, env = "REWRITE_MODEL", default_value = DEFAULT_REWRITE_MODEL, global = true)]
    rewrite_model: String,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Interactive question loop (default).
    Chat,
    /// Answer one question and exit.
    Ask {
        question: String,

        /// Print the whole cycle outcome as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Add FAQ entries from a JSONL file of {id, question, answer} objects.
    Seed {
        #[arg(long)]
        input: PathBuf,
    },
    /// Score one answer with the judge model.
    Judge {
        #[arg(long)]
        question: String,
        #[arg(long)]
        answer: String,
        #[arg(long)]
        reference: Option<String>,
    },
}

impl Settings {
    fn validate(&self) -> Result<()> {
        if !self.distance_threshold.is_finite() || self.distance_threshold < 0.0 {
            bail!("distance threshold must be a non-negative number");
        }
        if self.judge_max_retry == 0 {
            bail!("JUDGE_MAX_RETRY must be at least 1");
        }
        Ok(())
    }

    fn embedder(&self) -> Box<dyn EmbeddingProvider> {
        Box::new(HashEmbeddingProvider::default())
    }

    fn local_collection(&self) -> Result<LocalCollection> {
        LocalCollection::open(&self.store_path, &self.collection, self.embedder()).with_context(|| {
            format!(
                "failed to open collection '{}' under {}",
                self.collection,
                self.store_path.display()
            )
        })
    }

    fn chroma_store(&self, http: &reqwest::Client, url: &str) -> ChromaStore {
        ChromaStore::new(http.clone(), url, &self.collection, self.embedder())
    }

    fn store(&self, http: &reqwest::Client) -> Result<Box<dyn VectorStore>> {
        Ok(match &self.chroma_url {
            Some(url) => Box::new(self.chroma_store(http, url)),
            None => Box::new(self.local_collection()?),
        })
    }

    fn fallback_config(&self) -> FallbackConfig {
        FallbackConfig {
            search_api_key: self.tavily_api_key.clone(),
            search_url: self.tavily_url.clone(),
            chat_api_key: self.openai_api_key.clone(),
            chat_base_url: self.openai_base_url.clone(),
            model: self.fallback_model.clone(),
            timeout: self.fallback_timeout.into(),
            ..FallbackConfig::default()
        }
    }

    fn judge_config(&self) -> JudgeConfig {
        JudgeConfig {
            model: self.judge_model.clone(),
            max_attempts: self.judge_max_retry,
            backoff: self.judge_backoff.into(),
        }
    }

    fn ollama(&self, http: &reqwest::Client) -> Arc<OllamaClient> {
        Arc::new(OllamaClient::new(http.clone(), &self.ollama_host).with_timeout(self.judge_timeout.into()))
    }

    fn session(&self, http: &reqwest::Client) -> Result<ChatSession> {
        let agent = QueryAgent::new(
            self.store(http)?,
            WebFallback::new(http.clone(), self.fallback_config()),
            AgentConfig {
                distance_threshold: self.distance_threshold,
            },
        );
        let ollama = self.ollama(http);
        let mut session = Session::new(agent, Judge::new(Arc::clone(&ollama), self.judge_config()));
        if self.rewrite {
            session = session.with_rewriter(Rewriter::new(ollama, self.rewrite_model.clone()));
        }
        if !self.no_log {
            session = session.with_log(CsvLogSink::new(&self.log_path));
        }
        tracing::debug!(
            collection = %self.collection,
            chroma = self.chroma_url.is_some(),
            rewrite = self.rewrite,
            log = !self.no_log,
            "session configured"
        );
        Ok(session)
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn render_outcome(outcome: &CycleOutcome) -> String {
    let mut lines = vec![outcome.result.answer.clone()];
    if outcome.result.fallback_needed() {
        lines.push(FALLBACK_NOTICE.to_string());
    }
    match (&outcome.verdict, &outcome.judge_error) {
        (Some(verdict), _) => lines.push(format!("Judge ➜ {}/5 · {}", verdict.score, verdict.reasoning)),
        (None, Some(err)) => lines.push(format!("Judge ➜ unavailable · {err}")),
        (None, None) => {}
    }
    lines.join("\n")
}

fn print_outcome(outcome: &CycleOutcome) {
    println!("{}", render_outcome(outcome));
}

async fn chat(session: &ChatSession) -> Result<()> {
    let mut rl = DefaultEditor::new().context("failed to start line editor")?;
    loop {
        let line = match rl.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => return Ok(()),
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let query = line.trim();
        if query.is_empty() {
            break;
        }
        let _ = rl.add_history_entry(query);

        match session.cycle(query).await {
            Ok(outcome) => print_outcome(&outcome),
            Err(err) => eprintln!("Could not answer: {err}"),
        }
        println!();
    }
    println!("{FAREWELL}");
    Ok(())
}

fn read_documents(path: &PathBuf) -> Result<Vec<FaqDocument>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut docs = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: FaqDocument = serde_json::from_str(&line)
            .with_context(|| format!("invalid FAQ entry at {}:{}", path.display(), idx + 1))?;
        docs.push(doc);
    }
    Ok(docs)
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = &cli.settings;
    settings.validate()?;

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let session = settings.session(&http)?;
            chat(&session).await?;
        }
        Commands::Ask { question, json } => {
            let session = settings.session(&http)?;
            let outcome = session
                .cycle(&question)
                .await
                .context("could not retrieve an answer")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_outcome(&outcome);
            }
        }
        Commands::Seed { input } => {
            let docs = read_documents(&input)?;
            match &settings.chroma_url {
                Some(url) => {
                    let sent = settings
                        .chroma_store(&http, url)
                        .add(&docs)
                        .await
                        .context("failed to upload FAQ entries")?;
                    println!("Added {sent} of {} entries to '{}' at {url}", docs.len(), settings.collection);
                }
                None => {
                    let collection = settings.local_collection()?;
                    let added = collection.add(&docs).context("failed to add FAQ entries")?;
                    println!(
                        "Added {added} of {} entries to '{}' ({} total)",
                        docs.len(),
                        collection.name(),
                        collection.len()
                    );
                }
            }
        }
        Commands::Judge {
            question,
            answer,
            reference,
        } => {
            let judge = Judge::new(settings.ollama(&http), settings.judge_config());
            let verdict = judge
                .judge(&question, &answer, reference.as_deref())
                .await
                .context("judge failed")?;
            println!("{}", serde_json::to_string(&verdict)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults_to_chat_with_stock_settings() {
        let cli = Cli::try_parse_from(["vifaq"]).expect("parse");
        assert!(cli.command.is_none());
        assert_eq!(cli.settings.collection, DEFAULT_COLLECTION);
        assert_eq!(cli.settings.distance_threshold, DEFAULT_DISTANCE_THRESHOLD);
        assert_eq!(cli.settings.judge_max_retry, 3);
        assert_eq!(*cli.settings.judge_backoff.as_ref(), Duration::from_secs(1));
        assert_eq!(*cli.settings.fallback_timeout.as_ref(), Duration::from_secs(10));
        assert!(!cli.settings.no_log);
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "vifaq",
            "ask",
            "How do I check my balance?",
            "--json",
            "--no-log",
            "--distance-threshold",
            "0.5",
            "--judge-backoff",
            "250ms",
        ])
        .expect("parse");
        match cli.command {
            Some(Commands::Ask { question, json }) => {
                assert_eq!(question, "How do I check my balance?");
                assert!(json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(cli.settings.no_log);
        assert_eq!(cli.settings.distance_threshold, 0.5);
        assert_eq!(cli.settings.judge_config().backoff, Duration::from_millis(250));
    }

    #[test]
    fn zero_judge_attempts_is_rejected() {
        let cli = Cli::try_parse_from(["vifaq", "--judge-max-retry", "0"]).expect("parse");
        assert!(cli.settings.validate().is_err());
    }

    fn outcome(result: vifaq_core::RetrievalResult) -> CycleOutcome {
        CycleOutcome {
            query: "q".into(),
            result,
            verdict: None,
            judge_error: Some("Judge unavailable after 1 attempt(s)".into()),
            latency_ms: 3,
        }
    }

    #[test]
    fn fallback_notice_does_not_claim_a_web_answer() {
        let text = render_outcome(&outcome(vifaq_core::RetrievalResult::from_fallback(
            vifaq_core::IDK_ANSWER.to_string(),
        )));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], vifaq_core::IDK_ANSWER);
        assert_eq!(lines[1], "No close match in FAQ: fallback was used.");
        assert_eq!(lines[2], "Judge ➜ unavailable · Judge unavailable after 1 attempt(s)");
    }

    #[test]
    fn faq_answer_has_no_notice() {
        let mut faq = outcome(vifaq_core::RetrievalResult::from_faq(
            "Dial *199#.".into(),
            "faq-balance".into(),
        ));
        faq.verdict = Some(vifaq_core::Verdict {
            score: 5,
            reasoning: "exact".into(),
        });
        assert_eq!(render_outcome(&faq), "Dial *199#.\nJudge ➜ 5/5 · exact");
    }

    #[test]
    fn seed_requires_input() {
        assert!(Cli::try_parse_from(["vifaq", "seed"]).is_err());
    }

    #[test]
    fn reads_documents_skipping_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faqs.jsonl");
        std::fs::write(
            &path,
            "{\"id\":\"a\",\"question\":\"q1\",\"answer\":\"a1\"}\n\n{\"id\":\"b\",\"question\":\"q2\",\"answer\":\"a2\"}\n",
        )
        .unwrap();
        let docs = read_documents(&path).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].id, "b");
    }

    #[test]
    fn malformed_document_names_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("faqs.jsonl");
        std::fs::write(&path, "{\"id\":\"a\",\"question\":\"q\",\"answer\":\"a\"}\nnot json\n").unwrap();
        let err = read_documents(&path).unwrap_err();
        assert!(format!("{err:#}").contains("faqs.jsonl:2"));
    }
}
