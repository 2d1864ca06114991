use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

const IDK: &str = "Sorry, I don't have that information right now.";
const BALANCE_ANSWER: &str = "Dial *199# or open the Vi app to see your balance.";

/// Binary with a throwaway store, no credentials, and a judge that cannot be
/// reached.
fn bin(root: &Path) -> Command {
    let path = assert_cmd::cargo::cargo_bin!("vifaq");
    let mut cmd = Command::new(path);
    for var in [
        "TAVILY_API_KEY",
        "OPENAI_API_KEY",
        "CHROMA_URL",
        "FAQ_COLLECTION",
        "FAQ_DISTANCE_THRESHOLD",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("FAQ_STORE_PATH", root.join("db"))
        .env("FAQ_LOG_PATH", root.join("runs.csv"))
        .env("OLLAMA_HOST", "http://127.0.0.1:9")
        .env("JUDGE_MAX_RETRY", "1")
        .env("JUDGE_BACKOFF", "0s")
        .env("JUDGE_TIMEOUT", "2s");
    cmd
}

fn seed(root: &Path) {
    let input = root.join("faqs.jsonl");
    std::fs::write(
        &input,
        format!(
            "{{\"id\":\"faq-balance\",\"question\":\"How do I check my balance?\",\"answer\":\"{BALANCE_ANSWER}\"}}\n\
             {{\"id\":\"faq-roaming\",\"question\":\"How do I activate international roaming?\",\"answer\":\"Enable IR in the Vi app before you travel.\"}}\n"
        ),
    )
    .unwrap();

    bin(root)
        .args(["seed", "--input"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Added 2 of 2 entries to 'vi_faq'"));
}

#[test]
fn seeded_question_is_answered_verbatim_without_a_score() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());

    bin(dir.path())
        .args(["ask", "How do I check my balance?"])
        .assert()
        .success()
        .stdout(predicate::str::contains(BALANCE_ANSWER))
        .stdout(predicate::str::contains("Judge ➜ unavailable"))
        .stdout(predicate::str::contains("fallback was used").not());

    let log = std::fs::read_to_string(dir.path().join("runs.csv")).unwrap();
    let lines: Vec<_> = log.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "ts,query,answer,fallback,latency_ms,score,reasoning,ids");
    assert!(lines[1].contains(",false,"));
    assert!(lines[1].contains("Judge error: "));
    assert!(lines[1].contains("faq-balance"));
}

#[test]
fn unrelated_question_without_search_key_answers_idk() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());

    let assert = bin(dir.path())
        .args(["ask", "What's the weather in Paris?", "--json", "--no-log"])
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["result"]["answer"], IDK);
    assert_eq!(json["result"]["provenance"]["kind"], "fallback");
    assert!(json["verdict"].is_null());
    assert!(json["judge_error"].as_str().unwrap().contains("1 attempt"));
    assert!(!dir.path().join("runs.csv").exists());
}

#[test]
fn empty_collection_fails_without_logging() {
    let dir = tempfile::tempdir().unwrap();

    bin(dir.path())
        .args(["ask", "How do I check my balance?"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: could not retrieve an answer"))
        .stderr(predicate::str::contains("vi_faq"));

    assert!(!dir.path().join("runs.csv").exists());
}

#[test]
fn chat_loop_answers_until_blank_line() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());

    bin(dir.path())
        .arg("--no-log")
        .write_stdin("How do I check my balance?\n\nignored\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(BALANCE_ANSWER))
        .stdout(predicate::str::contains("Good-bye!"));
}

#[test]
fn judge_command_reports_unreachable_model() {
    let dir = tempfile::tempdir().unwrap();

    bin(dir.path())
        .args(["judge", "--question", "q", "--answer", "a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: judge failed"))
        .stderr(predicate::str::contains("Judge unavailable after 1 attempt(s)"));
}

#[test]
fn seeding_rejects_malformed_lines() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("faqs.jsonl");
    std::fs::write(&input, "{\"id\":\"x\"}\n").unwrap();

    bin(dir.path())
        .args(["seed", "--input"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("faqs.jsonl:1"));
}

#[test]
fn query_without_words_falls_back_with_notice() {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());

    bin(dir.path())
        .args(["ask", "??? 🙂", "--no-log"])
        .assert()
        .success()
        .stdout(predicate::str::contains(IDK))
        .stdout(predicate::str::contains("No close match in FAQ: fallback was used."))
        .stdout(predicate::str::contains(BALANCE_ANSWER).not());
}
