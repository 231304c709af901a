//! End-to-end scenario across the store, grading, and export crates.

use classlog_core::{RecordInput, SessionLog};
use classlog_store_csv::CsvInteractionStore;

fn must<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("scenario failure: {err}"),
    }
}

fn input(student: &str, prompt: &str, response: &str) -> RecordInput {
    RecordInput {
        student_name: student.to_string(),
        prompt: prompt.to_string(),
        response: response.to_string(),
        recorded_at: None,
    }
}

#[test]
fn alice_and_bob_full_session() {
    let dir = must(tempfile::tempdir());
    let store = CsvInteractionStore::open(&dir.path().join("interactions.csv"));
    let mut session = SessionLog::new();

    session.push(must(store.append(&input(
        "Alice",
        "Explain recursion",
        "Recursion is...",
    ))));
    session.push(must(store.append(&input("Bob", "Define AI", "AI is..."))));

    let loaded = must(store.load_all());
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].student_name, "Alice");
    assert_eq!(loaded[0].prompt, "Explain recursion");
    assert_eq!(loaded[1].student_name, "Bob");
    assert_eq!(loaded[1].response, "AI is...");
    assert_eq!(loaded, session.records());

    must(store.set_score(0, 9));

    let graded = must(store.load_all());
    assert_eq!(graded[0].score, Some(9));
    assert_eq!(graded[1].score, None);
    assert_eq!(graded[1], loaded[1]);

    // Header plus two data rows in one openable workbook, whether exported
    // from the durable log or the session container.
    let from_store = must(classlog_export_xlsx::export(&graded));
    assert_eq!(&from_store[..4], b"PK\x03\x04");
    let from_session = must(classlog_export_xlsx::export(session.records()));
    assert_eq!(&from_session[..4], b"PK\x03\x04");
}

#[test]
fn store_survives_process_style_reopen() {
    let dir = must(tempfile::tempdir());
    let log_path = dir.path().join("interactions.csv");

    {
        let store = CsvInteractionStore::open(&log_path);
        must(store.append(&input("Alice", "p1", "r1")));
    }

    // A fresh handle over the same file sees the prior session's rows and
    // keeps appending after them.
    let reopened = CsvInteractionStore::open(&log_path);
    let appended = must(reopened.append(&input("Bob", "p2", "r2")));
    assert_eq!(appended.seq, 1);

    let loaded = must(reopened.load_all());
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].student_name, "Alice");
    assert_eq!(loaded[1].student_name, "Bob");
}
