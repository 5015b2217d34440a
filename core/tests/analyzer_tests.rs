use searchcore::analyzer::Analyzer;
use std::fs;

#[test]
fn it_normalizes_and_stems() {
    let analyzer = Analyzer::from_registry("english", None).unwrap();
    let words = analyzer.terms("Running Runners RUN! The café's menu.");
    // Stemming to "run" should appear
    assert!(words.contains(&"run".to_string()));
    // Unicode normalization keeps the accented letter as one token
    assert!(words.iter().any(|w| w.starts_with("caf")));
}

#[test]
fn it_filters_stopwords() {
    let analyzer = Analyzer::from_registry("english", None).unwrap();
    let words = analyzer.terms("The quick brown fox and the lazy dog");
    assert!(!words.contains(&"the".to_string()));
    assert!(!words.contains(&"and".to_string()));
}

#[test]
fn stopword_file_replaces_builtin_list() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stop.txt");
    fs::write(&path, "# custom list\nquick\n\nFOX\n").unwrap();
    let analyzer = Analyzer::from_registry("standard", Some(&path)).unwrap();
    assert_eq!(analyzer.terms("The quick brown fox"), vec!["the", "brown"]);
}

#[test]
fn missing_stopword_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Analyzer::from_registry("standard", Some(&dir.path().join("none.txt"))).is_err());
}

#[test]
fn whitespace_analyzer_keeps_punctuation() {
    let analyzer = Analyzer::from_registry("whitespace", None).unwrap();
    assert_eq!(analyzer.terms("U.S.A. Rocks"), vec!["u.s.a.", "rocks"]);
}

#[test]
fn snowball_uses_supplied_stopwords_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stop.txt");
    fs::write(&path, "brown\n").unwrap();
    let plain = Analyzer::from_registry("snowball", None).unwrap();
    assert!(plain.terms("The brown fox").contains(&"the".to_string()));
    let listed = Analyzer::from_registry("snowball", Some(&path)).unwrap();
    assert_eq!(listed.terms("The brown foxes"), vec!["the", "fox"]);
}
