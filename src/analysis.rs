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

//! Locale-selected text analysis shared by indexing and querying.
//!
//! Text is split into alphanumeric runs, lowercased, folded (German only),
//! filtered against a stopword list, and Snowball-stemmed. The same
//! [`Analyzer`] must be used on both sides of the index.

use rust_stemmers::Algorithm;
use rust_stemmers::Stemmer;

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
    "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there",
    "these", "they", "this", "to", "was", "will", "with",
];

// Folded spellings; tokens are folded before the lookup.
const GERMAN_STOPWORDS: &[&str] = &[
    "als", "am", "an", "auch", "auf", "bei", "das", "dass", "dem", "den", "der", "des", "die",
    "ein", "eine", "einem", "einen", "einer", "eines", "es", "fur", "im", "in", "ist", "mit",
    "nicht", "oder", "sich", "sind", "und", "von", "war", "wie", "zu", "zum", "zur",
];

const SPANISH_STOPWORDS: &[&str] = &[
    "al", "como", "con", "de", "del", "el", "en", "es", "la", "las", "lo", "los", "no", "o",
    "para", "por", "que", "se", "su", "sus", "un", "una", "unas", "unos", "y",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    German,
    Spanish,
}

impl Language {
    /// Selects the language family from the primary subtag (`de-AT` is German).
    pub fn for_locale(locale: &str) -> Self {
        let primary = locale
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match primary.as_str() {
            "de" => Language::German,
            "es" => Language::Spanish,
            _ => Language::English,
        }
    }

    pub fn as_label(self) -> &'static str {
        match self {
            Language::English => "english",
            Language::German => "german",
            Language::Spanish => "spanish",
        }
    }

    fn algorithm(self) -> Algorithm {
        match self {
            Language::English => Algorithm::English,
            Language::German => Algorithm::German,
            Language::Spanish => Algorithm::Spanish,
        }
    }

    fn stopwords(self) -> &'static [&'static str] {
        match self {
            Language::English => ENGLISH_STOPWORDS,
            Language::German => GERMAN_STOPWORDS,
            Language::Spanish => SPANISH_STOPWORDS,
        }
    }
}

/// An analyzed term and the byte range of the word it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub start: usize,
    pub end: usize,
}

pub struct Analyzer {
    language: Language,
    stemmer: Stemmer,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("language", &self.language)
            .finish()
    }
}

impl Analyzer {
    pub fn new(language: Language) -> Self {
        Self {
            language,
            stemmer: Stemmer::create(language.algorithm()),
        }
    }

    pub fn for_locale(locale: &str) -> Self {
        Self::new(Language::for_locale(locale))
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn tokens(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut start = None;
        for (idx, ch) in text.char_indices() {
            match (ch.is_alphanumeric(), start) {
                (true, None) => start = Some(idx),
                (false, Some(begin)) => {
                    self.push_word(text, begin, idx, &mut tokens);
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(begin) = start {
            self.push_word(text, begin, text.len(), &mut tokens);
        }
        tokens
    }

    /// Analyzes a single word (no splitting); `None` for stopwords.
    pub fn term(&self, word: &str) -> Option<String> {
        let mut lowered = word.to_lowercase();
        if self.language == Language::German {
            lowered = fold_german(&lowered);
        }
        if lowered.is_empty() || self.language.stopwords().contains(&lowered.as_str()) {
            return None;
        }
        Some(self.stemmer.stem(&lowered).into_owned())
    }

    pub fn terms(&self, text: &str) -> Vec<String> {
        self.tokens(text).into_iter().map(|t| t.term).collect()
    }

    /// Space-joined terms, the form stored in the full-text columns.
    pub fn analyze(&self, text: &str) -> String {
        self.terms(text).join(" ")
    }

    fn push_word(&self, text: &str, start: usize, end: usize, tokens: &mut Vec<Token>) {
        if let Some(term) = self.term(&text[start..end]) {
            tokens.push(Token { term, start, end });
        }
    }
}

fn fold_german(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    for ch in word.chars() {
        match ch {
            'ä' => out.push('a'),
            'ö' => out.push('o'),
            'ü' => out.push('u'),
            'ß' => out.push_str("ss"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_from_primary_subtag() {
        assert_eq!(Language::for_locale("de"), Language::German);
        assert_eq!(Language::for_locale("de-AT"), Language::German);
        assert_eq!(Language::for_locale("ES_mx"), Language::Spanish);
        assert_eq!(Language::for_locale("en-US"), Language::English);
        assert_eq!(Language::for_locale("fr"), Language::English);
        assert_eq!(Language::for_locale(""), Language::English);
    }

    #[test]
    fn english_drops_stopwords_and_stems() {
        let analyzer = Analyzer::new(Language::English);
        assert_eq!(
            analyzer.terms("The Running of the Contents"),
            vec!["run".to_string(), "content".to_string()]
        );
    }

    #[test]
    fn offsets_point_at_original_words() {
        let analyzer = Analyzer::new(Language::English);
        let text = "Grüße, running!";
        let tokens = analyzer.tokens(text);
        assert_eq!(tokens.len(), 2);
        assert_eq!(&text[tokens[0].start..tokens[0].end], "Grüße");
        assert_eq!(&text[tokens[1].start..tokens[1].end], "running");
    }

    #[test]
    fn german_folds_umlauts_consistently() {
        let analyzer = Analyzer::new(Language::German);
        assert_eq!(analyzer.terms("Über"), analyzer.terms("uber"));
        assert_eq!(analyzer.terms("Straße"), analyzer.terms("strasse"));
        assert!(analyzer.terms("für die und").is_empty());
        assert_eq!(analyzer.terms("Inhalt"), vec!["inhalt".to_string()]);
    }
}
