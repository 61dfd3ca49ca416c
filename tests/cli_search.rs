//! CLI smoke tests for the `fes` binary.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

fn write_fixtures(dir: &std::path::Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let faqs = dir.join("faqs.csv");
    let funds = dir.join("funds.csv");
    fs::write(
        &faqs,
        "question,answer\n\
         What is a Sharpe ratio?,It measures risk-adjusted return.\n",
    )
    .unwrap();
    fs::write(
        &funds,
        "fund_id,fund_name,category,cagr_3yr (%),volatility (%),sharpe_ratio\n\
         F001,Quantum Bluechip Growth,Equity,16.4,12.1,1.31\n\
         F002,Meridian Short Duration Debt,Debt,6.2,2.4,0.68\n",
    )
    .unwrap();
    (faqs, funds)
}

#[test]
fn search_prints_ranked_json() {
    let dir = TempDir::new().unwrap();
    let (faqs, funds) = write_fixtures(dir.path());

    let output = cargo_bin_cmd!("fes")
        .args([
            "--faqs",
            faqs.to_str().unwrap(),
            "--funds",
            funds.to_str().unwrap(),
            "--data-dir",
            dir.path().join("cache").to_str().unwrap(),
            "search",
            "best fund by sharpe ratio",
            "--top-k",
            "3",
        ])
        .output()
        .expect("search command");
    assert!(
        output.status.success(),
        "search should succeed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let results: Value = serde_json::from_slice(&output.stdout).expect("JSON results");
    let results = results.as_array().expect("array of results");
    assert!(!results.is_empty());
    let top = &results[0];
    assert_eq!(top["rank"], 1);
    assert!(top["id"].is_string());
    assert!(top["score"].is_number());
    // Sharpe ranking puts the higher-sharpe fund first.
    assert_eq!(top["id"], "F001");
}

#[test]
fn invalid_mode_fails_with_message() {
    let dir = TempDir::new().unwrap();
    let (faqs, funds) = write_fixtures(dir.path());

    cargo_bin_cmd!("fes")
        .args([
            "--faqs",
            faqs.to_str().unwrap(),
            "--funds",
            funds.to_str().unwrap(),
            "--data-dir",
            dir.path().join("cache").to_str().unwrap(),
            "search",
            "anything",
            "--mode",
            "fuzzy",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown mode"));
}

#[test]
fn index_command_persists_artifacts() {
    let dir = TempDir::new().unwrap();
    let (faqs, funds) = write_fixtures(dir.path());
    let cache = dir.path().join("cache");

    let output = cargo_bin_cmd!("fes")
        .args([
            "--faqs",
            faqs.to_str().unwrap(),
            "--funds",
            funds.to_str().unwrap(),
            "--data-dir",
            cache.to_str().unwrap(),
            "index",
        ])
        .output()
        .expect("index command");
    assert!(
        output.status.success(),
        "index should succeed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(cache.join("vector_index.fvix").exists());
    assert!(cache.join("embedding_cache.db").exists());
}
