use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::Path;

use log::debug;
use regex::{Regex, RegexBuilder};

use crate::error::LexiconError;

/// Punctuation allowed to trail a phrase or word match.
pub const TRAILING_PUNCTUATION: [char; 6] = ['!', ',', '?', '.', '\'', '"'];

/// A multi-token lexicon entry with its compiled matcher.
#[derive(Debug, Clone)]
pub struct PhraseEntry {
    phrase: String,
    weight: i32,
    pattern: Regex,
}

impl PhraseEntry {
    fn new(phrase: String, weight: i32) -> Result<Self, LexiconError> {
        let source = format!("{}[!,?.'\"]*", regex::escape(&phrase));
        let pattern = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|source| LexiconError::Pattern {
                phrase: phrase.clone(),
                source,
            })?;
        Ok(Self {
            phrase,
            weight,
            pattern,
        })
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn weight(&self) -> i32 {
        self.weight
    }

    /// Byte ranges of every whitespace-delimited occurrence in `text`, left to right,
    /// non-overlapping. Each range includes any trailing punctuation.
    pub fn find_spans(&self, text: &str) -> Vec<Range<usize>> {
        let mut spans = Vec::new();
        let mut at = 0;
        while let Some(m) = self.pattern.find_at(text, at) {
            if is_word_aligned(text, m.start(), m.end()) {
                spans.push(m.range());
                at = m.end();
            } else {
                at = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
            }
        }
        spans
    }

    /// Removes every occurrence from `text`, returning the remaining text and
    /// the number of occurrences removed. Text without a match is passed through.
    pub fn consume<'t>(&self, text: Cow<'t, str>) -> (Cow<'t, str>, usize) {
        let spans = self.find_spans(&text);
        if spans.is_empty() {
            return (text, 0);
        }
        let mut rest = String::with_capacity(text.len());
        let mut last = 0;
        for span in &spans {
            rest.push_str(&text[last..span.start]);
            last = span.end;
        }
        rest.push_str(&text[last..]);
        (Cow::Owned(rest), spans.len())
    }
}

fn is_word_aligned(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    before.is_none_or(char::is_whitespace) && after.is_none_or(char::is_whitespace)
}

/// Immutable sentiment table: single-token words plus ordered multi-token phrases.
///
/// Phrases keep the order of the source because scoring consumes text phrase by
/// phrase, and overlapping phrases resolve in favour of whichever comes first.
#[derive(Debug, Clone, Default)]
pub struct Lexicon {
    words: HashMap<String, i32>,
    phrases: Vec<PhraseEntry>,
}

impl Lexicon {
    /// Reads a tab-separated lexicon file (`entry<TAB>weight` per line).
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LexiconError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| LexiconError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let lexicon = Self::from_reader(BufReader::new(file)).map_err(|e| match e {
            LexiconError::Io { source, .. } => LexiconError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        debug!(
            "loaded lexicon {}: {} words, {} phrases",
            path.display(),
            lexicon.word_count(),
            lexicon.phrase_count()
        );
        Ok(lexicon)
    }

    /// Parses lexicon lines from any reader. Blank lines are ignored; any other
    /// line that fails to parse rejects the whole lexicon.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, LexiconError> {
        let mut entries = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|source| LexiconError::Io {
                path: Default::default(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push((index + 1, parse_line(index + 1, &line)?));
        }
        Self::build(entries)
    }

    /// Builds a lexicon from in-memory `(entry, weight)` pairs, in order.
    pub fn from_entries<I, S>(entries: I) -> Result<Self, LexiconError>
    where
        I: IntoIterator<Item = (S, i32)>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .enumerate()
            .map(|(index, (key, weight))| (index + 1, (normalize_key(key.as_ref()), weight)))
            .collect();
        Self::build(entries)
    }

    fn build(entries: Vec<(usize, (String, i32))>) -> Result<Self, LexiconError> {
        let mut seen = HashSet::new();
        let mut lexicon = Lexicon::default();
        for (line, (key, weight)) in entries {
            if key.is_empty() {
                return Err(LexiconError::MalformedEntry {
                    line,
                    content: key,
                    reason: "empty entry",
                });
            }
            if !seen.insert(key.clone()) {
                return Err(LexiconError::DuplicateEntry { line, key });
            }
            if key.contains(' ') {
                lexicon.phrases.push(PhraseEntry::new(key, weight)?);
            } else {
                lexicon.words.insert(key, weight);
            }
        }
        Ok(lexicon)
    }

    /// Multi-token entries in source order.
    pub fn phrase_entries(&self) -> &[PhraseEntry] {
        &self.phrases
    }

    /// Weight of a single token; unknown tokens (including `""`) weigh 0.
    pub fn word_weight(&self, token: &str) -> i32 {
        self.words.get(token).copied().unwrap_or(0)
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn phrase_count(&self) -> usize {
        self.phrases.len()
    }
}

fn normalize_key(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_line(line: usize, content: &str) -> Result<(String, i32), LexiconError> {
    let malformed = |reason| LexiconError::MalformedEntry {
        line,
        content: content.to_string(),
        reason,
    };
    // Columns past the weight are ignored.
    let mut fields = content.split('\t');
    let key = fields.next().unwrap_or_default();
    let weight = fields
        .next()
        .ok_or_else(|| malformed("missing tab separator"))?;
    let key = normalize_key(key);
    if key.is_empty() {
        return Err(malformed("empty entry"));
    }
    let weight = weight
        .trim()
        .parse::<i32>()
        .map_err(|_| malformed("weight is not an integer"))?;
    Ok((key, weight))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_words_from_phrases_and_keeps_phrase_order() {
        let src = "good\t3\nnot good\t-2\nbad\t-3\ndoes not work\t-3\n\n";
        let lex = Lexicon::from_reader(src.as_bytes()).unwrap();
        assert_eq!(lex.word_count(), 2);
        let phrases: Vec<&str> = lex.phrase_entries().iter().map(|p| p.phrase()).collect();
        assert_eq!(phrases, vec!["not good", "does not work"]);
        assert_eq!(lex.word_weight("good"), 3);
        assert_eq!(lex.word_weight("unknown"), 0);
        assert_eq!(lex.word_weight(""), 0);
        assert_eq!(lex.word_weight("not good"), 0);
    }

    #[test]
    fn malformed_lines_are_fatal() {
        let err = Lexicon::from_reader("good\t3\nbroken line\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LexiconError::MalformedEntry { line: 2, .. }));

        let err = Lexicon::from_reader("good\tthree\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LexiconError::MalformedEntry { line: 1, .. }));

        let err = Lexicon::from_reader("\t4\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LexiconError::MalformedEntry { .. }));
    }

    #[test]
    fn extra_columns_after_weight_are_ignored() {
        let lex = Lexicon::from_reader("good\t3\tpos\nnot good\t-2\t\n".as_bytes()).unwrap();
        assert_eq!(lex.word_weight("good"), 3);
        assert_eq!(lex.phrase_entries()[0].weight(), -2);
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = Lexicon::from_reader("Good\t3\ngood\t2\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LexiconError::DuplicateEntry { line: 2, .. }));
    }

    #[test]
    fn phrase_spans_are_word_aligned() {
        let lex = Lexicon::from_entries([("not good", -2)]).unwrap();
        let phrase = &lex.phrase_entries()[0];
        assert_eq!(phrase.find_spans("NOT GOOD!! at all"), vec![0..10]);
        assert!(phrase.find_spans("knot goods").is_empty());
        assert_eq!(phrase.find_spans("not good not good").len(), 2);
        assert!(phrase.find_spans("not good!x").is_empty());
    }

    #[test]
    fn consume_leaves_unmatched_text_borrowed() {
        let lex = Lexicon::from_entries([("so so", -1)]).unwrap();
        let phrase = &lex.phrase_entries()[0];
        let (rest, hits) = phrase.consume(Cow::Borrowed("fine today"));
        assert_eq!(hits, 0);
        assert!(matches!(rest, Cow::Borrowed("fine today")));

        let (rest, hits) = phrase.consume(Cow::Borrowed("so so, really so so"));
        assert_eq!(hits, 2);
        assert_eq!(rest, " really ");
    }
}
