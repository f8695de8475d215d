//! File sink behavior: CSV shaping, JSON lines, and mode mixing.

use serde_json::json;
use stream_scraper::{FileSink, ScrapeError, Sink};

fn sink_in(dir: &tempfile::TempDir, name: &str) -> (FileSink, std::path::PathBuf) {
    let path = dir.path().join(name);
    (FileSink::new(&path), path)
}

#[test]
fn first_mapping_fixes_the_csv_header() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sink, path) = sink_in(&dir, "out.csv");
    sink.write(&json!({"url": "https://a.com/1", "title": "one"}))
        .unwrap();
    sink.write(&json!({"url": "https://a.com/2", "title": "two"}))
        .unwrap();
    sink.close().unwrap();

    let content = std::fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines[0], "url,title");
    assert_eq!(lines[1], "https://a.com/1,one");
    assert_eq!(lines[2], "https://a.com/2,two");
}

#[test]
fn missing_keys_serialize_as_empty_cells() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sink, path) = sink_in(&dir, "out.csv");
    sink.write(&json!({"url": "https://a.com/1", "title": "one"}))
        .unwrap();
    sink.write(&json!({"url": "https://a.com/2"})).unwrap();
    sink.close().unwrap();

    let content = std::fs::read_to_string(path).unwrap();
    assert!(content.lines().nth(2).unwrap().ends_with(','));
}

#[test]
fn a_list_of_mappings_writes_several_rows() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sink, path) = sink_in(&dir, "out.csv");
    sink.write(&json!([
        {"url": "https://a.com/1"},
        {"url": "https://a.com/2"},
    ]))
    .unwrap();
    sink.close().unwrap();

    let content = std::fs::read_to_string(path).unwrap();
    assert_eq!(content.lines().count(), 3);
}

#[test]
fn non_mapping_records_become_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sink, path) = sink_in(&dir, "out.jsonl");
    sink.write(&json!("plain string")).unwrap();
    sink.write(&json!([1, 2, 3])).unwrap();
    sink.close().unwrap();

    let content = std::fs::read_to_string(path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines, ["\"plain string\"", "[1,2,3]"]);
}

#[test]
fn mixing_csv_then_json_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sink, _path) = sink_in(&dir, "out.csv");
    sink.write(&json!({"url": "https://a.com/1"})).unwrap();
    let err = sink.write(&json!(42)).unwrap_err();
    assert!(matches!(err, ScrapeError::InvalidSinkState));
}

#[test]
fn mixing_json_then_csv_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sink, _path) = sink_in(&dir, "out.jsonl");
    sink.write(&json!(42)).unwrap();
    let err = sink.write(&json!({"url": "https://a.com/1"})).unwrap_err();
    assert!(matches!(err, ScrapeError::InvalidSinkState));
}

#[test]
fn close_without_writes_is_a_noop() {
    let dir = tempfile::tempdir().unwrap();
    let (mut sink, path) = sink_in(&dir, "out.csv");
    sink.close().unwrap();
    assert!(!path.exists());
}
