use runquery::{run, QueryFileConfig, QuerySpec, RunQueryConfig};
use searchcore::analyzer::Analyzer;
use searchcore::corpus::CorpusRecord;
use searchcore::fields::{default_mappings, map_record};
use searchcore::index::{DocumentSink, IndexWriter};
use searchcore::metadata::KEY_SIMILARITY;
use std::fs;
use tempfile::tempdir;

fn build_tiny_index(dir: &std::path::Path, similarity: Option<&str>) {
    let writer = IndexWriter::create(dir, Analyzer::standard()).unwrap();
    if let Some(s) = similarity {
        writer.set_metadata(KEY_SIMILARITY, s);
    }
    let docs = [
        ("doc0", "rust is great, rust systems programming"),
        ("doc1", "learning rust"),
        ("doc0", "rust rust rust"),
        ("doc2", "gardening tips"),
    ];
    for (id, body) in docs {
        let record = CorpusRecord { id: id.into(), timestamp: Some(1), body: Some(body.into()) };
        writer.add(map_record(&record, &default_mappings()).unwrap()).unwrap();
    }
    writer.commit().unwrap();
}

fn query(number: &str, text: &str) -> QuerySpec {
    QuerySpec { number: number.into(), text: text.into() }
}

fn output(config: &RunQueryConfig) -> (runquery::RunSummary, Vec<String>) {
    let mut buf = Vec::new();
    let summary = run(config, &mut buf).unwrap();
    let lines = String::from_utf8(buf).unwrap().lines().map(String::from).collect();
    (summary, lines)
}

#[test]
fn ranked_run_lines_with_unique_keys() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), Some("method:bm25"));
    let config = RunQueryConfig {
        index: dir.path().display().to_string(),
        run_name: Some("r1".into()),
        queries: vec![query("7", "rust")],
        ..Default::default()
    };
    let (summary, lines) = output(&config);
    assert_eq!(summary.lines, 2);
    assert_eq!(lines.len(), 2);

    let keys: Vec<&str> = lines.iter().map(|l| l.split(' ').nth(2).unwrap()).collect();
    assert!(keys.contains(&"doc0") && keys.contains(&"doc1"));
    for (rank, line) in lines.iter().enumerate() {
        let cols: Vec<&str> = line.split(' ').collect();
        assert_eq!(cols.len(), 6);
        assert_eq!(cols[0], "7");
        assert_eq!(cols[1], "Q0");
        assert_eq!(cols[3], rank.to_string());
        assert!(cols[4].parse::<f32>().is_ok());
        assert_eq!(cols[5], "r1");
    }
}

#[test]
fn failing_query_does_not_stop_the_batch() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), None);
    let config = RunQueryConfig {
        index: dir.path().display().to_string(),
        queries: vec![query("1", "\"unterminated"), query("2", "gardening")],
        ..Default::default()
    };
    let (summary, lines) = output(&config);
    assert_eq!(summary.failed, vec!["1".to_string()]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("2 Q0 doc2 0 "));
    assert!(lines[0].ends_with(" default"));
}

#[test]
fn explicit_similarity_overrides_index_metadata() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), Some("method:jm,lambda:0.9"));
    let base = RunQueryConfig {
        index: dir.path().display().to_string(),
        queries: vec![query("1", "rust")],
        ..Default::default()
    };
    let (_, persisted) = output(&base);
    let (_, explicit) = output(&RunQueryConfig { similarity: Some("method:tfidf".into()), ..base });
    assert_eq!(persisted.len(), explicit.len());
    assert_ne!(persisted[0].split(' ').nth(4), explicit[0].split(' ').nth(4));
}

#[test]
fn index_without_metadata_uses_defaults() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), None);
    fs::remove_file(dir.path().join("index.metadata")).unwrap();
    let config = RunQueryConfig {
        index: dir.path().display().to_string(),
        queries: vec![query("1", "learning")],
        ..Default::default()
    };
    let (summary, lines) = output(&config);
    assert!(summary.failed.is_empty());
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("1 Q0 doc1 0 "));
}

#[test]
fn queries_from_json_file() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), None);
    let topics = dir.path().join("topics.json");
    fs::write(&topics, r#"{"queries":[{"title":"51","text":"rust"},{"title":"52","text":"gardening tips"}]}"#).unwrap();
    let config = RunQueryConfig {
        index: dir.path().display().to_string(),
        query_file: Some(QueryFileConfig { path: topics.display().to_string(), format: "json".into() }),
        ..Default::default()
    };
    let (summary, lines) = output(&config);
    assert_eq!(summary.queries, 2);
    assert_eq!(lines.iter().filter(|l| l.starts_with("51 ")).count(), 2);
    assert_eq!(lines.iter().filter(|l| l.starts_with("52 ")).count(), 1);
    assert!(lines.last().unwrap().starts_with("52 "));
}

#[test]
fn setup_failures_abort_the_run() {
    let dir = tempdir().unwrap();
    let missing = RunQueryConfig {
        index: dir.path().join("nope").display().to_string(),
        queries: vec![query("1", "rust")],
        ..Default::default()
    };
    assert!(run(&missing, &mut Vec::new()).is_err());

    build_tiny_index(dir.path(), None);
    let bad_param = RunQueryConfig {
        index: dir.path().display().to_string(),
        similarity: Some("method:bm25,k1:abc".into()),
        queries: vec![query("1", "rust")],
        ..Default::default()
    };
    assert!(run(&bad_param, &mut Vec::new()).is_err());
}

#[test]
fn punctuated_topics_still_retrieve() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), None);
    let topics = dir.path().join("topics.json");
    fs::write(
        &topics,
        r#"{"queries":[{"title":"1","text":"rust: systems"},{"title":"2","text":"learning - rust"},{"title":"3","text":"\"gardening"}]}"#,
    )
    .unwrap();
    let config = RunQueryConfig {
        index: dir.path().display().to_string(),
        query_file: Some(QueryFileConfig { path: topics.display().to_string(), format: "json".into() }),
        ..Default::default()
    };
    let (summary, lines) = output(&config);
    assert!(summary.failed.is_empty(), "{:?}", summary.failed);
    for id in ["1 ", "2 ", "3 "] {
        assert!(lines.iter().any(|l| l.starts_with(id)), "no lines for topic {id}");
    }
}
