//! Classic query syntax subset:
//!
//! ```text
//! query  := clause (WS clause)*
//! clause := ('+' | '-')? (field ':')? (term | '"' phrase '"') ('^' boost)?
//! ```
//!
//! Clauses without a field prefix expand into a disjunction over the default
//! fields. Text is run through the same analyzer used at index time.

use crate::analyzer::Analyzer;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
    Should,
    Must,
    MustNot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    Term { field: String, term: String },
    /// Terms with their positions relative to the first one.
    Phrase { field: String, terms: Vec<(String, u32)> },
}

/// One query clause: any matching alternative satisfies it.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub occur: Occur,
    pub boost: f32,
    pub alternatives: Vec<Leaf>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    pub clauses: Vec<Clause>,
}

impl Query {
    /// Clauses that count towards coordination (everything but prohibitions).
    pub fn scoring_clauses(&self) -> usize {
        self.clauses.iter().filter(|c| c.occur != Occur::MustNot).count()
    }
}

pub struct QueryParser<'a> {
    fields: Vec<String>,
    analyzer: &'a Analyzer,
}

/// Lexical form of a clause before analysis.
struct RawClause {
    occur: Occur,
    field: Option<String>,
    text: String,
    phrase: bool,
    boost: f32,
}

impl<'a> QueryParser<'a> {
    pub fn new(fields: Vec<String>, analyzer: &'a Analyzer) -> Self {
        Self { fields, analyzer }
    }

    pub fn parse(&self, query_id: &str, text: &str) -> Result<Query> {
        let raw = lex(text).map_err(|detail| Error::QuerySyntax { query_id: query_id.to_string(), detail })?;
        let mut query = Query::default();
        for clause in raw {
            let fields: Vec<String> = match &clause.field {
                Some(f) => vec![f.clone()],
                None => self.fields.clone(),
            };
            let tokens = self.analyzer.analyze(&clause.text);
            if tokens.is_empty() {
                continue;
            }
            let mut alternatives = Vec::new();
            for field in fields {
                if clause.phrase && tokens.len() > 1 {
                    let first = tokens[0].1;
                    let terms = tokens.iter().map(|(t, p)| (t.clone(), (*p - first) as u32)).collect();
                    alternatives.push(Leaf::Phrase { field, terms });
                } else {
                    for (term, _) in &tokens {
                        alternatives.push(Leaf::Term { field: field.clone(), term: term.clone() });
                    }
                }
            }
            query.clauses.push(Clause { occur: clause.occur, boost: clause.boost, alternatives });
        }
        Ok(query)
    }
}

fn is_field_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn lex(text: &str) -> std::result::Result<Vec<RawClause>, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut clauses = Vec::new();
    let mut i = 0;
    let skip_ws = |i: &mut usize| {
        while *i < chars.len() && chars[*i].is_whitespace() {
            *i += 1;
        }
    };
    skip_ws(&mut i);
    if i == chars.len() {
        return Err("empty query".into());
    }
    while i < chars.len() {
        let occur = match chars[i] {
            '+' => { i += 1; Occur::Must }
            '-' => { i += 1; Occur::MustNot }
            _ => Occur::Should,
        };
        if occur != Occur::Should && (i == chars.len() || chars[i].is_whitespace()) {
            return Err(format!("dangling modifier at offset {}", i - 1));
        }

        let mut field = None;
        let mut j = i;
        while j < chars.len() && is_field_char(chars[j]) {
            j += 1;
        }
        if j < chars.len() && chars[j] == ':' {
            if j == i {
                return Err(format!("empty field name at offset {i}"));
            }
            field = Some(chars[i..j].iter().collect::<String>());
            i = j + 1;
        }

        let (body, phrase) = if i < chars.len() && chars[i] == '"' {
            let start = i + 1;
            let end = chars[start..]
                .iter()
                .position(|c| *c == '"')
                .map(|p| start + p)
                .ok_or_else(|| format!("unterminated quote at offset {i}"))?;
            i = end + 1;
            (chars[start..end].iter().collect::<String>(), true)
        } else {
            let start = i;
            while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '^' && chars[i] != '"' {
                i += 1;
            }
            (chars[start..i].iter().collect::<String>(), false)
        };
        if body.is_empty() && !phrase {
            return Err(format!("missing term at offset {i}"));
        }

        let mut boost = 1.0f32;
        if i < chars.len() && chars[i] == '^' {
            let start = i + 1;
            i = start;
            while i < chars.len() && !chars[i].is_whitespace() {
                i += 1;
            }
            let raw: String = chars[start..i].iter().collect();
            boost = raw
                .parse::<f32>()
                .ok()
                .filter(|b| b.is_finite() && *b >= 0.0)
                .ok_or_else(|| format!("invalid boost '{raw}' at offset {start}"))?;
        }
        if i < chars.len() && !chars[i].is_whitespace() {
            return Err(format!("unexpected '{}' at offset {i}", chars[i]));
        }
        clauses.push(RawClause { occur, field, text: body, phrase, boost });
        skip_ws(&mut i);
    }
    Ok(clauses)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser(analyzer: &Analyzer) -> QueryParser<'_> {
        QueryParser::new(vec!["text".into(), "title".into()], analyzer)
    }

    #[test]
    fn bare_terms_expand_over_fields() {
        let a = Analyzer::standard();
        let q = parser(&a).parse("1", "Cat dog").unwrap();
        assert_eq!(q.clauses.len(), 2);
        assert_eq!(q.clauses[0].alternatives, vec![
            Leaf::Term { field: "text".into(), term: "cat".into() },
            Leaf::Term { field: "title".into(), term: "cat".into() },
        ]);
    }

    #[test]
    fn modifiers_fields_and_boosts() {
        let a = Analyzer::standard();
        let q = parser(&a).parse("1", "+title:cat^2.5 -dog").unwrap();
        assert_eq!(q.clauses[0].occur, Occur::Must);
        assert_eq!(q.clauses[0].boost, 2.5);
        assert_eq!(q.clauses[0].alternatives.len(), 1);
        assert_eq!(q.clauses[1].occur, Occur::MustNot);
        assert_eq!(q.scoring_clauses(), 1);
    }

    #[test]
    fn weighted_terms_from_topic_files() {
        let a = Analyzer::standard();
        let q = parser(&a).parse("7", "cat^1.0 sat^2.0").unwrap();
        assert_eq!(q.clauses[1].boost, 2.0);
    }

    #[test]
    fn phrase_keeps_relative_positions() {
        let a = Analyzer::from_registry("english", None).unwrap();
        let q = QueryParser::new(vec!["text".into()], &a).parse("1", "\"cats and dogs\"").unwrap();
        assert_eq!(q.clauses[0].alternatives, vec![Leaf::Phrase {
            field: "text".into(),
            terms: vec![("cat".into(), 0), ("dog".into(), 2)],
        }]);
    }

    #[test]
    fn stopword_only_clause_is_dropped() {
        let a = Analyzer::from_registry("english", None).unwrap();
        let q = parser(&a).parse("1", "the cat").unwrap();
        assert_eq!(q.clauses.len(), 1);
    }

    #[test]
    fn syntax_errors_name_the_query() {
        let a = Analyzer::standard();
        let p = parser(&a);
        for bad in ["", "   ", "\"open", ":cat", "cat^", "cat^x", "+ cat", "title:", "\"a\"b"] {
            match p.parse("q42", bad) {
                Err(Error::QuerySyntax { query_id, .. }) => assert_eq!(query_id, "q42"),
                other => panic!("expected syntax error for {bad:?}, got {other:?}"),
            }
        }
    }
}
