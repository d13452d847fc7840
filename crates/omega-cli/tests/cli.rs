//! Integration tests for the `omega` binary.
//!
//! Each test launches the binary via `assert_cmd`, writes any required
//! fixture files to a temp directory, and asserts on exit code + output.

use std::fs;
use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::{NamedTempFile, TempDir};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[allow(deprecated)]
fn omega() -> Command {
    let mut cmd = Command::cargo_bin("omega").expect("binary not found");
    cmd.env_remove("OMEGA_RULES").env_remove("RUST_LOG");
    cmd
}

/// Write `contents` to a temporary file with the given suffix and return it.
fn temp_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f.flush().unwrap();
    f
}

fn rules_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (name, contents) in files {
        fs::write(dir.path().join(name), contents).unwrap();
    }
    dir
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

const NITRO_RULE: &str = r#"
title: Nitro Scam
id: 00000000-0000-0000-0000-000000000001
status: test
level: high
tags:
    - scam
detection:
    bio:
        bio|contains: 'free nitro'
    name:
        username|startswith: nitro
    condition: bio or name
"#;

const BOT_RULE: &str = r#"
title: Bot Account
status: stable
level: low
detection:
    bot:
        bot: true
    condition: bot
"#;

const UNUSED_SELECTOR_RULE: &str = r#"
title: Unused
detection:
    used: [foo]
    spare: [bar]
    condition: used
"#;

const DANGLING_RULE: &str = r#"
title: Dangling
detection:
    sel: [foo]
    condition: sel and ghost
"#;

// ---------------------------------------------------------------------------
// parse
// ---------------------------------------------------------------------------

#[test]
fn parse_prints_typed_rule() {
    let rule = temp_file(".yml", NITRO_RULE);
    omega()
        .args(["parse", rule.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"title\":\"Nitro Scam\""))
        .stdout(predicate::str::contains("\"level\":\"high\""))
        .stdout(predicate::str::contains("bio|contains"));
}

#[test]
fn parse_missing_file_fails() {
    omega()
        .args(["parse", "/nonexistent/rule.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error parsing"));
}

// ---------------------------------------------------------------------------
// condition
// ---------------------------------------------------------------------------

#[test]
fn condition_prints_ast() {
    omega()
        .args(["condition", "a and not (b or c)"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"kind\": \"and\""))
        .stdout(predicate::str::contains("\"kind\": \"not\""))
        .stdout(predicate::str::contains("\"value\": \"c\""));
}

#[test]
fn condition_parse_error_exits_nonzero() {
    omega()
        .args(["condition", "a and"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Condition parse error"));
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[test]
fn validate_directory_reports_each_file() {
    let dir = rules_dir(&[
        ("nitro.yml", NITRO_RULE),
        ("bot.yaml", BOT_RULE),
        ("unused.yml", UNUSED_SELECTOR_RULE),
    ]);
    omega()
        .args(["validate", dir.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("nitro.yml: valid"))
        .stdout(predicate::str::contains("unused.yml: valid"))
        .stdout(predicate::str::contains("warning: Found unused property spare"))
        .stdout(predicate::str::contains("3 valid, 0 invalid"));
}

#[test]
fn validate_invalid_rule_exits_nonzero() {
    let rule = temp_file(".yml", DANGLING_RULE);
    omega()
        .args(["validate", rule.path().to_str().unwrap()])
        .assert()
        .failure()
        .stdout(predicate::str::contains(": invalid"))
        .stdout(predicate::str::contains(
            "error: condition references undefined selector 'ghost'",
        ));
}

// ---------------------------------------------------------------------------
// eval
// ---------------------------------------------------------------------------

#[test]
fn eval_single_event_match() {
    let dir = rules_dir(&[("nitro.yml", NITRO_RULE), ("bot.yml", BOT_RULE)]);
    omega()
        .args([
            "eval",
            "--rules",
            dir.path().to_str().unwrap(),
            "--event",
            r#"{"bio": "Get FREE NITRO here", "bot": false}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rule\":\"nitro\""))
        .stdout(predicate::str::contains("\"matched_selectors\":[\"bio\"]"))
        .stdout(predicate::str::contains("Bot Account").not());
}

#[test]
fn eval_single_event_no_match() {
    let rule = temp_file(".yml", NITRO_RULE);
    omega()
        .args([
            "eval",
            "-r",
            rule.path().to_str().unwrap(),
            "-e",
            r#"{"bio": "hello"}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("No matches."));
}

#[test]
fn eval_ndjson_stdin() {
    let dir = rules_dir(&[("nitro.yml", NITRO_RULE), ("bot.yml", BOT_RULE)]);
    let input = concat!(
        r#"{"username": "nitro_giveaway"}"#,
        "\n",
        "\n",
        r#"{"bot": true}"#,
        "\n",
        "not json\n",
        r#"{"username": "alice"}"#,
        "\n",
    );
    omega()
        .args(["eval", "--rules", dir.path().to_str().unwrap()])
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rule\":\"nitro\""))
        .stdout(predicate::str::contains("\"rule\":\"bot\""))
        .stderr(predicate::str::contains("Invalid JSON on line 4"))
        .stderr(predicate::str::contains("Processed 5 events, 2 matches."));
}

#[test]
fn eval_rules_from_environment() {
    let dir = rules_dir(&[("bot.yml", BOT_RULE)]);
    omega()
        .env("OMEGA_RULES", dir.path())
        .args(["eval", "--event", r#"{"bot": true}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"title\":\"Bot Account\""));
}

#[test]
fn eval_invalid_event_json_fails() {
    let rule = temp_file(".yml", BOT_RULE);
    omega()
        .args(["eval", "-r", rule.path().to_str().unwrap(), "-e", "{nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid JSON event"));
}

#[test]
fn eval_skips_rejected_rules() {
    let dir = rules_dir(&[("bot.yml", BOT_RULE), ("dangling.yml", DANGLING_RULE)]);
    omega()
        .args([
            "eval",
            "--rules",
            dir.path().to_str().unwrap(),
            "--event",
            r#"{"bot": true, "x": "foo"}"#,
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rule\":\"bot\""))
        .stdout(predicate::str::contains("dangling").not())
        .stderr(predicate::str::contains("1 rules rejected"));
}

#[test]
fn eval_without_usable_rules_fails() {
    let dir = rules_dir(&[("dangling.yml", DANGLING_RULE)]);
    omega()
        .args(["eval", "--rules", dir.path().to_str().unwrap(), "-e", "{}"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No usable rules"));
}

#[test]
fn verbose_flag_enables_debug_logging() {
    let rule = temp_file(".yml", BOT_RULE);
    omega()
        .args([
            "--verbose",
            "eval",
            "-r",
            rule.path().to_str().unwrap(),
            "-e",
            r#"{"bot": true}"#,
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("DEBUG"));
}
