use searchcore::analyzer::Analyzer;
use searchcore::corpus::{encode_records, open_corpus, CorpusRecord};
use searchcore::fields::default_mappings;
use searchcore::index::{DocumentSink, IndexWriter};
use searchcore::ingest::{ingest_file, ingest_path};
use searchcore::ranking::RankingModel;
use searchcore::retrieval::{QueryExecutor, QueryRequest};
use searchcore::{Error, IndexSearcher};
use std::fs;
use std::io::Write;
use std::path::Path;

fn record(id: &str, ts: Option<i64>, body: Option<&str>) -> CorpusRecord {
    CorpusRecord { id: id.into(), timestamp: ts, body: body.map(String::from) }
}

fn corpus() -> Vec<CorpusRecord> {
    vec![
        record("1330000000-a", Some(1_330_000_000), Some("the cat sat on the mat")),
        record("1330000001-b", Some(1_330_000_001), None),
        record("1330000002-c", None, Some("a dog chased the cat")),
        record("1330000003-d", Some(1_330_000_003), Some("birds sing")),
    ]
}

fn decode(path: &Path) -> Vec<CorpusRecord> {
    let (_, reader) = open_corpus(path).unwrap();
    reader.collect::<Result<Vec<_>, _>>().unwrap()
}

fn query(searcher: &IndexSearcher, analyzer: &Analyzer, model: &str, id: &str, text: &str) -> Vec<searchcore::retrieval::RankedResult> {
    let sim = RankingModel::parse(model).unwrap().model.similarity();
    QueryExecutor::new(searcher, analyzer, sim.as_ref())
        .run_tag("test")
        .execute(&QueryRequest { id: id.into(), text: text.into() })
        .unwrap()
}

#[test]
fn compression_is_transparent() {
    let dir = tempfile::tempdir().unwrap();
    let plain = encode_records(&corpus());

    let raw = dir.path().join("corpus.sc");
    fs::write(&raw, &plain).unwrap();

    let gz = dir.path().join("corpus.sc.gz");
    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(&plain).unwrap();
    fs::write(&gz, enc.finish().unwrap()).unwrap();

    let bz = dir.path().join("corpus.sc.bz2");
    let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    enc.write_all(&plain).unwrap();
    fs::write(&bz, enc.finish().unwrap()).unwrap();

    let xz = dir.path().join("corpus.sc.xz");
    let mut enc = xz2::write::XzEncoder::new(Vec::new(), 6);
    enc.write_all(&plain).unwrap();
    fs::write(&xz, enc.finish().unwrap()).unwrap();

    let zst = dir.path().join("corpus.sc.zst");
    fs::write(&zst, zstd::encode_all(&plain[..], 3).unwrap()).unwrap();

    let expected = decode(&raw);
    assert_eq!(expected, corpus());
    for path in [&gz, &bz, &xz, &zst] {
        assert_eq!(decode(path), expected, "{}", path.display());
    }
}

#[test]
fn two_record_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.sc");
    fs::write(&input, encode_records(&[record("doc1", None, Some("the cat sat")), record("doc2", None, Some(""))])).unwrap();

    let index_dir = dir.path().join("index");
    let writer = IndexWriter::create(&index_dir, Analyzer::standard()).unwrap();
    let stats = ingest_file(&input, &default_mappings(), &writer).unwrap();
    assert_eq!(stats.documents, 1);
    assert_eq!(writer.num_docs(), 1);
    writer.commit().unwrap();

    let searcher = IndexSearcher::open(&index_dir).unwrap();
    let results = query(&searcher, &Analyzer::standard(), "method:dirichlet,mu:2500", "1", "cat");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].doc_key, "doc1");
    assert_eq!(results[0].rank, 0);
}

#[test]
fn truncated_stream_keeps_committed_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("truncated.sc");
    let mut bytes = encode_records(&[record("doc1", Some(5), Some("the cat sat"))]);
    let second = encode_records(&[record("doc2", Some(6), Some("more text here"))]);
    bytes.extend_from_slice(&second[..second.len() / 2]);
    fs::write(&input, bytes).unwrap();

    let index_dir = dir.path().join("index");
    let writer = IndexWriter::create(&index_dir, Analyzer::standard()).unwrap();
    let err = ingest_path(&input, &default_mappings(), &writer, 1).unwrap_err();
    match &err {
        Error::Ingest { path, source } => {
            assert_eq!(path, &input);
            assert!(matches!(**source, Error::TruncatedRecord { record: 1, .. }));
        }
        other => panic!("unexpected {other:?}"),
    }
    writer.commit().unwrap();

    let searcher = IndexSearcher::open(&index_dir).unwrap();
    assert_eq!(searcher.num_docs(), 1);
    let results = query(&searcher, &Analyzer::standard(), "bm25", "1", "cat");
    assert_eq!(results[0].doc_key, "doc1");
}

#[test]
fn duplicate_keys_are_reported_once() {
    let dir = tempfile::tempdir().unwrap();
    let writer = IndexWriter::create(dir.path(), Analyzer::standard()).unwrap();
    let records = [
        record("dup", None, Some("cat cat cat")),
        record("other", None, Some("cat and dog")),
        record("dup", None, Some("cat")),
    ];
    for r in &records {
        writer.add(searchcore::fields::map_record(r, &default_mappings()).unwrap()).unwrap();
    }
    writer.commit().unwrap();

    let searcher = IndexSearcher::open(dir.path()).unwrap();
    for model in ["method:dir", "method:jm,lambda:0.7", "method:bm25", "method:tfidf"] {
        let results = query(&searcher, &Analyzer::standard(), model, "q", "cat");
        let keys: Vec<_> = results.iter().map(|r| r.doc_key.as_str()).collect();
        assert_eq!(keys.iter().filter(|k| **k == "dup").count(), 1, "{model}");
        assert_eq!(results.len(), 2, "{model}");
        assert_eq!(results.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![0, 1]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

#[test]
fn syntax_error_is_per_query() {
    let dir = tempfile::tempdir().unwrap();
    let writer = IndexWriter::create(dir.path(), Analyzer::standard()).unwrap();
    writer.add(searchcore::fields::map_record(&record("a", None, Some("cat")), &default_mappings()).unwrap()).unwrap();
    writer.commit().unwrap();
    let searcher = IndexSearcher::open(dir.path()).unwrap();
    let analyzer = Analyzer::standard();
    let sim = RankingModel::default().similarity();
    let exec = QueryExecutor::new(&searcher, &analyzer, sim.as_ref());
    let outcomes = exec.execute_batch(&[
        QueryRequest { id: "bad".into(), text: "\"cat".into() },
        QueryRequest { id: "good".into(), text: "cat".into() },
    ]);
    assert!(matches!(&outcomes[0], Err(Error::QuerySyntax { query_id, .. }) if query_id == "bad"));
    assert_eq!(outcomes[1].as_ref().unwrap().len(), 1);
}

#[test]
fn opening_a_missing_index_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(IndexSearcher::open(dir.path().join("absent")), Err(Error::IndexNotFound { .. })));
}
