use std::borrow::Cow;

use crate::lexicon::{Lexicon, TRAILING_PUNCTUATION};

/// Sentiment score of `text` against `lexicon`.
///
/// Phrases are applied first, in lexicon order: each one adds
/// `occurrences * weight` and removes its matched spans before the next phrase
/// looks at the text. Whatever survives is split on whitespace, stripped of
/// trailing punctuation, lowercased and scored word by word.
///
/// # Example
/// ```
/// use grid_sentiment::{Lexicon, score};
/// let lexicon = Lexicon::from_entries([("not good", -2), ("good", 3)]).unwrap();
/// assert_eq!(score(&lexicon, "Not good."), -2);
/// assert_eq!(score(&lexicon, "good!"), 3);
/// ```
pub fn score(lexicon: &Lexicon, text: &str) -> i64 {
    let (remaining, phrase_score) = lexicon.phrase_entries().iter().fold(
        (Cow::Borrowed(text), 0_i64),
        |(remaining, total), phrase| {
            let (remaining, hits) = phrase.consume(remaining);
            (remaining, total + hits as i64 * i64::from(phrase.weight()))
        },
    );
    phrase_score + word_score(lexicon, &remaining)
}

fn word_score(lexicon: &Lexicon, text: &str) -> i64 {
    text.split_whitespace()
        .map(|token| token.trim_end_matches(TRAILING_PUNCTUATION).to_lowercase())
        .map(|token| i64::from(lexicon.word_weight(&token)))
        .sum()
}
