//! End-to-end tests of the `stx` binary.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn stx_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_stx"))
}

fn touch(path: &Path, secs: u64) {
    fs::write(path, b"%PDF-1.4\n").unwrap();
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

/// Temp root with `config/stx.toml` pointing at an empty `docs/` directory.
fn setup_test_env(with_metrics: bool) -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let docs = root.join("docs");
    fs::create_dir_all(&docs).unwrap();
    fs::create_dir_all(root.join("config")).unwrap();

    let mut config_content = format!(
        r#"[documents]
dir = "{}"

[logging]
level = "warn"
"#,
        docs.display()
    );
    if with_metrics {
        config_content.push_str(&format!(
            r#"
[metrics]
db_path = "{}/data/metrics.db"
"#,
            root.display()
        ));
    }

    let config_path = root.join("config").join("stx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path, docs)
}

fn run_stx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = stx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run stx binary at {:?}: {}", binary, e));

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

fn run_json(config_path: &Path, args: &[&str]) -> Value {
    let (stdout, stderr, ok) = run_stx(config_path, args);
    assert!(ok, "stx {:?} failed: {}", args, stderr);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("bad JSON ({}): {}", e, stdout))
}

fn scored(v: &Value) -> Vec<(String, i64)> {
    v["candidates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| {
            (
                c["record"]["filename"].as_str().unwrap().to_string(),
                c["score"].as_i64().unwrap(),
            )
        })
        .collect()
}

#[test]
fn test_find_ranks_transcript_above_bare_symbol() {
    let (_tmp, config, docs) = setup_test_env(false);
    touch(&docs.join("AARTIIND.pdf"), 1_000);
    touch(&docs.join("AARTIIND_Transcript.pdf"), 2_000);

    let v = run_json(&config, &["--json", "find", "AARTIIND"]);
    assert_eq!(v["outcome"], "symbol");
    assert_eq!(
        scored(&v),
        vec![
            ("AARTIIND_Transcript.pdf".to_string(), 150),
            ("AARTIIND.pdf".to_string(), 110)
        ]
    );
    assert_eq!(
        v["candidates"][0]["match_reason"],
        "exact symbol match, earnings transcript"
    );
}

#[test]
fn test_find_falls_back_for_unknown_symbol() {
    let (_tmp, config, docs) = setup_test_env(false);
    touch(&docs.join("AARTIIND.pdf"), 1_000);
    touch(&docs.join("AARTIIND_Transcript.pdf"), 2_000);

    let v = run_json(&config, &["--json", "find", "RELIANCE"]);
    assert_eq!(v["outcome"], "fallback");
    assert_eq!(
        scored(&v),
        vec![
            ("AARTIIND_Transcript.pdf".to_string(), 0),
            ("AARTIIND.pdf".to_string(), 0)
        ]
    );
    assert!(!v["suggestions"].as_array().unwrap().is_empty());

    let (stdout, _, ok) = run_stx(&config, &["find", "RELIANCE"]);
    assert!(ok);
    assert!(stdout.contains("fallback: no symbol match"));
    assert!(stdout.contains("RELIANCE_Transcript.pdf"));
}

#[test]
fn test_documents_lists_types() {
    let (_tmp, config, docs) = setup_test_env(false);
    touch(&docs.join("TCS_Annual_Report.pdf"), 1_000);
    touch(&docs.join("INFY_Q3.pdf"), 1_000);
    fs::write(docs.join("readme.txt"), "not a pdf").unwrap();

    let v = run_json(&config, &["--json", "documents"]);
    let docs: Vec<(&str, &str)> = v
        .as_array()
        .unwrap()
        .iter()
        .map(|d| (d["filename"].as_str().unwrap(), d["doc_type"].as_str().unwrap()))
        .collect();
    assert_eq!(
        docs,
        vec![("INFY_Q3.pdf", "EARNINGS"), ("TCS_Annual_Report.pdf", "ANNUAL_REPORT")]
    );

    let (stdout, _, ok) = run_stx(&config, &["documents"]);
    assert!(ok);
    assert!(stdout.contains("2 document(s)"));
}

#[test]
fn test_fundamentals_without_store_or_documents_succeeds() {
    let (_tmp, config, _docs) = setup_test_env(false);

    let v = run_json(&config, &["--json", "fundamentals", "TCS"]);
    assert_eq!(v["symbol"], "TCS");
    assert_eq!(v["metrics_status"], "not_configured");
    assert_eq!(v["document_outcome"], "no_documents");
    assert_eq!(v["total_document_count"], 0);
    assert!(v["document_insights"].as_array().unwrap().is_empty());
}

#[test]
fn test_fundamentals_with_empty_store_reports_not_found() {
    let (_tmp, config, docs) = setup_test_env(true);
    touch(&docs.join("TCS.pdf"), 1_000);

    let (_, stderr, ok) = run_stx(&config, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    // Running twice is harmless.
    let (_, _, ok) = run_stx(&config, &["init"]);
    assert!(ok);

    let v = run_json(&config, &["--json", "fundamentals", "TCS"]);
    assert_eq!(v["metrics_status"], "not_found");
    assert_eq!(v["matched_document_count"], 1);
    // The placeholder file is not a parseable PDF.
    assert_eq!(v["document_errors"].as_array().unwrap().len(), 1);
}

#[test]
fn test_analyze_rejects_escaping_path() {
    let (_tmp, config, docs) = setup_test_env(false);
    touch(&docs.join("TCS.pdf"), 1_000);

    let (_, stderr, ok) = run_stx(&config, &["analyze", "../config/stx.toml"]);
    assert!(!ok);
    assert!(stderr.contains("invalid document name"));

    let (_, stderr, ok) = run_stx(&config, &["analyze", "HDFC.pdf"]);
    assert!(!ok);
    assert!(stderr.contains("document not found"));
}

#[test]
fn test_missing_document_directory_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("stx.toml");
    fs::write(
        &config_path,
        format!("[documents]\ndir = \"{}/nope\"\n", tmp.path().display()),
    )
    .unwrap();

    let (_, stderr, ok) = run_stx(&config_path, &["documents"]);
    assert!(!ok);
    assert!(stderr.contains("does not exist"));
}
