// Copyright 2026 Storysearch Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! User query parsing.
//!
//! Bare words are alternatives, `"quoted text"` is a phrase and a leading `-`
//! excludes the following word or phrase. Every clause is analyzed with the
//! index's [`Analyzer`] and rendered as an FTS5 match expression, so user
//! input never reaches FTS5 syntax directly.

use std::collections::BTreeSet;

use crate::analysis::Analyzer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    Term(String),
    Phrase(Vec<String>),
}

impl Clause {
    fn from_terms(mut terms: Vec<String>) -> Option<Self> {
        match terms.len() {
            0 => None,
            1 => terms.pop().map(Clause::Term),
            _ => Some(Clause::Phrase(terms)),
        }
    }

    fn to_fts(&self) -> String {
        match self {
            Clause::Term(term) => quote(term),
            Clause::Phrase(terms) => quote(&terms.join(" ")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub should: Vec<Clause>,
    pub must_not: Vec<Clause>,
}

impl ParsedQuery {
    pub fn parse(text: &str, analyzer: &Analyzer) -> Self {
        let mut parsed = ParsedQuery::default();
        for (raw, negated) in split_query(text) {
            let Some(clause) = Clause::from_terms(analyzer.terms(&raw)) else {
                continue;
            };
            let target = if negated {
                &mut parsed.must_not
            } else {
                &mut parsed.should
            };
            if !target.contains(&clause) {
                target.push(clause);
            }
        }
        parsed
    }

    pub fn is_empty(&self) -> bool {
        self.should.is_empty()
    }

    /// FTS5 expression, or `None` when no positive clause survived analysis.
    pub fn to_match_expression(&self) -> Option<String> {
        if self.should.is_empty() {
            return None;
        }
        let positive = join_or(&self.should);
        if self.must_not.is_empty() {
            return Some(positive);
        }
        Some(format!("({positive}) NOT ({})", join_or(&self.must_not)))
    }

    /// Analyzed terms of the positive clauses, used for highlighting.
    pub fn highlight_terms(&self) -> BTreeSet<String> {
        let mut terms = BTreeSet::new();
        for clause in &self.should {
            match clause {
                Clause::Term(term) => {
                    terms.insert(term.clone());
                }
                Clause::Phrase(words) => terms.extend(words.iter().cloned()),
            }
        }
        terms
    }
}

fn join_or(clauses: &[Clause]) -> String {
    clauses
        .iter()
        .map(Clause::to_fts)
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Splits raw query text into (fragment, negated) pairs.
fn split_query(text: &str) -> Vec<(String, bool)> {
    let mut parts = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        let mut negated = false;
        if ch == '-' {
            chars.next();
            negated = true;
        }
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut phrase = String::new();
            for next in chars.by_ref() {
                if next == '"' {
                    break;
                }
                phrase.push(next);
            }
            parts.push((phrase, negated));
            continue;
        }
        let mut word = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_whitespace() {
                break;
            }
            word.push(next);
            chars.next();
        }
        parts.push((word, negated));
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Language;

    fn english() -> Analyzer {
        Analyzer::new(Language::English)
    }

    #[test]
    fn bare_terms_are_alternatives() {
        let parsed = ParsedQuery::parse("Content alpha", &english());
        assert_eq!(
            parsed.to_match_expression().as_deref(),
            Some("\"content\" OR \"alpha\"")
        );
    }

    #[test]
    fn phrases_and_exclusions() {
        let parsed = ParsedQuery::parse("\"running shoes\" -red", &english());
        assert_eq!(
            parsed.should,
            vec![Clause::Phrase(vec!["run".into(), "shoe".into()])]
        );
        assert_eq!(parsed.must_not, vec![Clause::Term("red".into())]);
        assert_eq!(
            parsed.to_match_expression().as_deref(),
            Some("(\"run shoe\") NOT (\"red\")")
        );
    }

    #[test]
    fn unbalanced_quote_takes_the_rest() {
        let parsed = ParsedQuery::parse("alpha \"beta gamma", &english());
        assert_eq!(
            parsed.should,
            vec![
                Clause::Term("alpha".into()),
                Clause::Phrase(vec!["beta".into(), "gamma".into()])
            ]
        );
    }

    #[test]
    fn syntax_characters_never_leak() {
        let parsed = ParsedQuery::parse("NEAR(a b) AND title:* ^x", &english());
        let expr = parsed.to_match_expression().unwrap_or_default();
        assert!(!expr.contains('('));
        assert!(!expr.contains(':'));
        assert!(!expr.contains('*'));
    }

    #[test]
    fn stopwords_only_or_negative_only_is_empty() {
        assert!(ParsedQuery::parse("the of and", &english()).is_empty());
        assert_eq!(ParsedQuery::parse("-alpha", &english()).to_match_expression(), None);
        assert_eq!(ParsedQuery::parse("   ", &english()).to_match_expression(), None);
    }
}
