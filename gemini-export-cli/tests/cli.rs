use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

const GENERATED_AT: &str = "2026-01-09T15:30:45+09:00";
const JA_CHAT_ID: &str = "ja0chat1";
const EN_CHAT_ID: &str = "en0chat2";

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn gemini_export() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("gemini-export"));
    cmd.env_remove("GEMINI_EXPORT_MAX_CHARS")
        .env_remove("GEMINI_EXPORT_DIR")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn prints_markdown_document_for_japanese_ui() {
    let expected_url =
        format!("<!-- gemini-export: source-url=https://gemini.google.com/app/{JA_CHAT_ID} -->");

    gemini_export()
        .arg(fixture("gemini-ja.html"))
        .arg("--generated-at")
        .arg(GENERATED_AT)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(format!(
            "<!-- gemini-export: generated-at={GENERATED_AT} -->\n{expected_url}\n\n"
        )))
        .stdout(predicate::str::contains("## User (12:34)\n\nWhat is Gemini?"))
        .stdout(predicate::str::contains("## Gemini\n\n"))
        .stdout(predicate::str::contains("Gemini is a multimodal model."))
        .stdout(predicate::str::contains("- Fast\n- Helpful"))
        .stdout(predicate::str::contains("```python\nprint(\"hi\")\n```"))
        .stdout(predicate::str::contains("| A | B |\n| --- | --- |\n| 1 | 2 |"))
        .stdout(predicate::str::contains("思考プロセスを表示").not())
        .stdout(predicate::str::contains("コードをコピー").not());
}

#[test]
fn code_block_elements_use_their_language_label() {
    gemini_export()
        .arg(fixture("gemini-en.html"))
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "source-url=https://gemini.google.com/app/{EN_CHAT_ID}"
        )))
        .stdout(predicate::str::contains("type=code id=msg-2-code-1 lang=markdown"))
        .stdout(predicate::str::contains("```markdown\nconsole.log(\"ok\");\n```"))
        .stdout(predicate::str::contains("content_copy").not())
        .stdout(predicate::str::contains("## User\n\nbye\n"));
}

#[test]
fn url_flag_overrides_embedded_url() {
    gemini_export()
        .arg(fixture("gemini-en.html"))
        .arg("--url")
        .arg("https://gemini.google.com/app/override9")
        .assert()
        .success()
        .stdout(predicate::str::contains("source-url=https://gemini.google.com/app/override9"));
}

#[test]
fn raw_outputs_export_response_json() {
    gemini_export()
        .arg(fixture("gemini-en.html"))
        .arg("--raw")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ok\": true"))
        .stdout(predicate::str::contains(format!("\"chatId\": \"{EN_CHAT_ID}\"")))
        .stdout(predicate::str::contains("\"role\": \"gemini\""))
        .stdout(predicate::str::contains("\"order\": 3"))
        .stdout(predicate::str::contains("\"error\"").not());
}

#[test]
fn raw_reports_failure_in_json_and_exit_code() {
    gemini_export()
        .arg(fixture("no-messages.html"))
        .arg("--raw")
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"ok\": false"))
        .stdout(predicate::str::contains(
            "\"error\": \"No messages were found in the current chat.\"",
        ))
        .stderr(predicate::str::contains("error: No messages were found"));
}

#[test]
fn max_chars_truncates_messages() {
    gemini_export()
        .arg(fixture("gemini-ja.html"))
        .arg("--max-chars")
        .arg("7")
        .assert()
        .success()
        .stdout(predicate::str::contains("## User (12:34)\n\nWhat is\n"))
        .stdout(predicate::str::contains("What is Gemini?").not());
}

#[test]
fn max_chars_env_is_honored() {
    gemini_export()
        .env("GEMINI_EXPORT_MAX_CHARS", "7")
        .arg(fixture("gemini-ja.html"))
        .assert()
        .success()
        .stdout(predicate::str::contains("What is Gemini?").not());
}

#[test]
fn rejects_invalid_max_chars() {
    gemini_export()
        .arg(fixture("gemini-ja.html"))
        .arg("--max-chars")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("positive integer"));

    gemini_export()
        .env("GEMINI_EXPORT_MAX_CHARS", "lots")
        .arg(fixture("gemini-ja.html"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: invalid configuration"));
}

#[test]
fn save_writes_chat_file_into_dir() {
    let temp = tempdir().expect("tempdir");
    let out_dir = temp.path().join("exports");

    gemini_export()
        .arg(fixture("gemini-ja.html"))
        .arg("--save")
        .arg("--dir")
        .arg(&out_dir)
        .arg("--generated-at")
        .arg(GENERATED_AT)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 messages to"))
        .stdout(predicate::str::contains(format!("{JA_CHAT_ID}.md")));

    let saved = fs::read_to_string(out_dir.join(format!("{JA_CHAT_ID}.md"))).expect("read export");
    assert!(saved.starts_with(&format!("<!-- gemini-export: generated-at={GENERATED_AT} -->\n")));
    assert!(saved.contains("## User (12:34)"));
    assert!(saved.ends_with("<!-- /gemini-export:block -->\n"));
}

#[test]
fn save_dir_comes_from_env() {
    let temp = tempdir().expect("tempdir");

    gemini_export()
        .env("GEMINI_EXPORT_DIR", temp.path())
        .arg(fixture("gemini-en.html"))
        .arg("--save")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 3 messages to"));

    assert!(temp.path().join(format!("{EN_CHAT_ID}.md")).exists());
}

#[test]
fn missing_thread_id_fails() {
    gemini_export()
        .arg(fixture("gemini-en.html"))
        .arg("--url")
        .arg("https://gemini.google.com/app")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "error: Open a Gemini chat thread before exporting.",
        ));
}

#[test]
fn empty_history_reports_root_not_found() {
    gemini_export()
        .arg(fixture("empty-root.html"))
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "error: Unable to locate the chat thread on this page.",
        ));
}

#[test]
fn no_messages_fails() {
    gemini_export()
        .arg(fixture("no-messages.html"))
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "error: No messages were found in the current chat.",
        ));
}

#[test]
fn turn_tags_do_not_depend_on_locale() {
    gemini_export()
        .arg(fixture("gemini-en.html"))
        .arg("--locale")
        .arg("ja")
        .arg("--raw")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"order\": 3"));
}

#[test]
fn rejects_unknown_locale() {
    gemini_export()
        .arg(fixture("gemini-en.html"))
        .arg("--locale")
        .arg("fr")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'fr'"));
}

#[test]
fn missing_snapshot_reports_io_error() {
    let temp = tempdir().expect("tempdir");

    gemini_export()
        .arg(temp.path().join("missing.html"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: i/o error on"));
}

#[test]
fn empty_snapshot_is_rejected() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("empty.html");
    fs::write(&path, "").expect("write");

    gemini_export()
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: snapshot file is empty"));
}
