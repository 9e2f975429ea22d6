use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

const TRANSCRIPT: &str = r#"{
  "conversations": [
    {
      "id": "g1",
      "name": "Dice night",
      "participants": ["Ann", "Bob", "Bot"],
      "group": true,
      "batches": [
        {"id": "b1", "author": {"kind": "named", "name": "Ann"},
         "entries": [{"id": "e1", "text": "evening all"}]},
        {"id": "b2", "author": {"kind": "named", "name": "Bob"},
         "entries": [{"id": "e2", "text": "@Bot echo hello there"},
                     {"id": "e3", "text": "no sticker", "quote": [{"kind": "text", "text": "evening all"}]}]},
        {"id": "b3", "author": {"kind": "self_authored"},
         "entries": [{"id": "e4", "text": "@Bot echo loop"}]}
      ]
    },
    {
      "id": "d1",
      "name": "Cat",
      "participants": ["Bot", "Cat"],
      "batches": []
    }
  ]
}"#;

fn convobot(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("convobot").unwrap();
    cmd.current_dir(dir).env("RUST_LOG", "warn");
    cmd
}

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn schema_prints_config_sections() {
    let dir = tempfile::tempdir().unwrap();
    convobot(dir.path())
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("retention_window"))
        .stdout(predicate::str::contains("command_prefixes"));
}

#[test]
fn replay_answers_addressed_commands_only() {
    let dir = tempfile::tempdir().unwrap();
    let transcript = write(dir.path(), "chat.json", TRANSCRIPT);
    convobot(dir.path())
        .arg("replay")
        .arg(&transcript)
        .assert()
        .success()
        .stdout(predicate::str::contains("# Bot in g1"))
        .stdout(predicate::str::contains("Bob: > evening all | no sticker"))
        .stdout(predicate::str::contains("  Bot: hello there"))
        .stdout(predicate::str::contains("Bot: loop").not());
}

#[test]
fn replay_json_lists_events() {
    let dir = tempfile::tempdir().unwrap();
    let transcript = write(dir.path(), "chat.json", TRANSCRIPT);
    let output = convobot(dir.path())
        .args(["replay", "--format", "json", "--bot-name", "Bot"])
        .arg(&transcript)
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let kinds: Vec<&str> = report["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["message", "message", "message", "reply", "message"]);
}

#[test]
fn replay_unknown_conversation_fails() {
    let dir = tempfile::tempdir().unwrap();
    let transcript = write(dir.path(), "chat.json", TRANSCRIPT);
    convobot(dir.path())
        .args(["replay", "--conversation", "zz"])
        .arg(&transcript)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("conversation zz not in transcript"));
}

#[test]
fn conversations_and_identity_from_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let transcript = write(dir.path(), "chat.json", TRANSCRIPT);
    convobot(dir.path())
        .args(["conversations", "--participants", "--transcript"])
        .arg(&transcript)
        .assert()
        .success()
        .stdout(predicate::str::contains("Dice night [g1]: Ann, Bob, Bot"))
        .stdout(predicate::str::contains("Cat [d1]: Bot, Cat"));

    convobot(dir.path())
        .args(["identity", "--transcript"])
        .arg(&transcript)
        .assert()
        .success()
        .stdout("Bot\n");
}

#[test]
fn messages_grouped_by_author() {
    let dir = tempfile::tempdir().unwrap();
    let transcript = write(dir.path(), "chat.json", TRANSCRIPT);
    convobot(dir.path())
        .args(["messages", "g1", "--grouped", "--transcript"])
        .arg(&transcript)
        .assert()
        .success()
        .stdout(predicate::str::contains("From Ann: [evening all]"))
        .stdout(predicate::str::contains(
            "From Bob: [@Bot echo hello there, > evening all | no sticker]",
        ))
        .stdout(predicate::str::contains("From Bot: [@Bot echo loop]"));
}

#[test]
fn missing_driver_maps_to_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        ".convobot.toml",
        "[transport]\nprogram = \"convobot-test-missing-driver\"\n",
    );
    convobot(dir.path())
        .arg("conversations")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("transport driver not found"));
}

#[test]
fn invalid_config_maps_to_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = write(dir.path(), "bad.toml", "[poll]\ninterval_ms = \"soon\"\n");
    convobot(dir.path())
        .args(["conversations", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("config error"));
}

#[test]
fn send_in_safe_mode_succeeds_without_driver_call() {
    let dir = tempfile::tempdir().unwrap();
    let transcript = write(dir.path(), "chat.json", TRANSCRIPT);
    convobot(dir.path())
        .args(["send", "g1", "hello", "--safe-mode", "--transcript"])
        .arg(&transcript)
        .assert()
        .success();

    convobot(dir.path())
        .args(["send", "nowhere", "hello", "--transcript"])
        .arg(&transcript)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("message not delivered"));
}
