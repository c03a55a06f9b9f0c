//! Sentence splitting for incremental synthesis.
//!
//! A response is spoken one utterance at a time, so the first sentence can
//! reach the animation service while the rest are still being synthesized.

use crate::error::{FacetalkError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_segmentation::UnicodeSegmentation;

/// Abbreviations that end in a period without ending a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr.", "mrs.", "ms.", "dr.", "prof.", "sr.", "jr.", "st.", "mt.", "vs.", "e.g.", "i.e.",
    "approx.", "no.", "fig.", "inc.", "ltd.", "co.",
];

/// Splitting strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SplitterKind {
    /// Split on `.`, `!` and `?`, keeping the punctuation with its sentence.
    #[default]
    Regex,
    /// Unicode sentence boundaries with abbreviation and initial handling.
    Linguistic,
}

impl std::str::FromStr for SplitterKind {
    type Err = FacetalkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "regex" => Ok(SplitterKind::Regex),
            "linguistic" | "nlp" => Ok(SplitterKind::Linguistic),
            other => Err(FacetalkError::UnsupportedEngine {
                kind: "splitter".to_string(),
                name: other.to_string(),
            }),
        }
    }
}

/// One sentence-like unit of text, never empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance(String);

impl Utterance {
    /// Creates an utterance from text, trimming it.
    ///
    /// Returns `None` if nothing but whitespace remains.
    pub fn new(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Utterance {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Splits response text into utterances using the configured strategy.
#[derive(Debug, Clone)]
pub struct SentenceSplitter {
    kind: SplitterKind,
    markers: Regex,
    terminators: Regex,
}

impl SentenceSplitter {
    pub fn new(kind: SplitterKind) -> Result<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| FacetalkError::Other(format!("Invalid pattern: {}", e)))
        };
        Ok(Self {
            kind,
            markers: compile(r"[#*]")?,
            terminators: compile(r"[.!?]+")?,
        })
    }

    pub fn kind(&self) -> SplitterKind {
        self.kind
    }

    /// Splits `text` into ordered, non-empty utterances.
    ///
    /// Formatting markers (`#`, `*`) are removed first. Text without any
    /// terminal punctuation comes back as a single utterance.
    ///
    /// # Errors
    /// Returns `FacetalkError::InvalidText` if the text is empty once trimmed
    /// and stripped of markers.
    pub fn split(&self, text: &str) -> Result<Vec<Utterance>> {
        let cleaned = self.markers.replace_all(text, "");
        if cleaned.trim().is_empty() {
            return Err(FacetalkError::InvalidText {
                message: "nothing to split after removing formatting markers".to_string(),
            });
        }

        let utterances = match self.kind {
            SplitterKind::Regex => self.split_on_terminators(&cleaned),
            SplitterKind::Linguistic => split_linguistic(&cleaned),
        };

        if utterances.is_empty() {
            // Only punctuation survived; speak the cleaned text as a whole.
            return Ok(Utterance::new(&cleaned).into_iter().collect());
        }
        Ok(utterances)
    }

    fn split_on_terminators(&self, text: &str) -> Vec<Utterance> {
        let mut utterances = Vec::new();
        let mut start = 0;

        for m in self.terminators.find_iter(text) {
            let body = &text[start..m.start()];
            if !body.trim().is_empty() {
                let sentence = format!("{}{}", body.trim(), m.as_str());
                utterances.extend(Utterance::new(&sentence));
            }
            start = m.end();
        }

        // Trailing text without terminal punctuation
        utterances.extend(Utterance::new(&text[start..]));
        utterances
    }
}

/// Unicode (UAX #29) sentence boundaries, re-joined where the boundary follows
/// an abbreviation or a single-letter initial.
fn split_linguistic(text: &str) -> Vec<Utterance> {
    let mut utterances: Vec<Utterance> = Vec::new();
    let mut pending = String::new();

    for sentence in text.unicode_sentences() {
        let trimmed = sentence.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !pending.is_empty() {
            pending.push(' ');
        }
        pending.push_str(trimmed);

        if !ends_with_abbreviation(&pending) {
            utterances.extend(Utterance::new(&pending));
            pending.clear();
        }
    }

    utterances.extend(Utterance::new(&pending));
    utterances
}

fn ends_with_abbreviation(sentence: &str) -> bool {
    let Some(last_word) = sentence.split_whitespace().last() else {
        return false;
    };
    let lower = last_word.to_lowercase();
    if ABBREVIATIONS.contains(&lower.as_str()) {
        return true;
    }
    // Initials such as "J." in "J. R. Tolkien"
    let mut chars = last_word.chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some(c), Some('.'), None) if c.is_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(kind: SplitterKind, text: &str) -> Vec<String> {
        SentenceSplitter::new(kind)
            .unwrap()
            .split(text)
            .unwrap()
            .into_iter()
            .map(Utterance::into_string)
            .collect()
    }

    #[test]
    fn test_regex_splits_and_keeps_punctuation() {
        assert_eq!(
            split(SplitterKind::Regex, "Hello there. How are you?"),
            vec!["Hello there.", "How are you?"]
        );
    }

    #[test]
    fn test_regex_handles_exclamation_and_runs() {
        assert_eq!(
            split(SplitterKind::Regex, "Wow!!! Really?! Yes..."),
            vec!["Wow!!!", "Really?!", "Yes..."]
        );
    }

    #[test]
    fn test_regex_strips_formatting_markers() {
        assert_eq!(
            split(SplitterKind::Regex, "## Title\n**Bold** point. *Next* one!"),
            vec!["Title\nBold point.", "Next one!"]
        );
    }

    #[test]
    fn test_regex_without_terminal_punctuation_returns_whole_text() {
        assert_eq!(
            split(SplitterKind::Regex, "  just some words  "),
            vec!["just some words"]
        );
    }

    #[test]
    fn test_regex_keeps_trailing_fragment() {
        assert_eq!(
            split(SplitterKind::Regex, "First sentence. and a tail"),
            vec!["First sentence.", "and a tail"]
        );
    }

    #[test]
    fn test_regex_skips_empty_fragments() {
        assert_eq!(
            split(SplitterKind::Regex, "One. . Two."),
            vec!["One.", "Two."]
        );
    }

    #[test]
    fn test_punctuation_only_input_is_spoken_whole() {
        assert_eq!(split(SplitterKind::Regex, "?!"), vec!["?!"]);
    }

    #[test]
    fn test_empty_text_is_rejected() {
        let splitter = SentenceSplitter::new(SplitterKind::Regex).unwrap();
        assert!(matches!(
            splitter.split("   "),
            Err(FacetalkError::InvalidText { .. })
        ));
        assert!(matches!(
            splitter.split("## **"),
            Err(FacetalkError::InvalidText { .. })
        ));
    }

    #[test]
    fn test_regex_preserves_order_and_content() {
        let text = "Alpha one. Beta two! Gamma three? Delta four.";
        let utterances = split(SplitterKind::Regex, text);
        assert_eq!(utterances.len(), 4);
        let rejoined = utterances.join(" ");
        assert_eq!(rejoined, text);
    }

    #[test]
    fn test_linguistic_basic_split() {
        assert_eq!(
            split(SplitterKind::Linguistic, "Hello there. How are you?"),
            vec!["Hello there.", "How are you?"]
        );
    }

    #[test]
    fn test_linguistic_keeps_abbreviations_together() {
        assert_eq!(
            split(
                SplitterKind::Linguistic,
                "Dr. Smith arrived at noon. He was late."
            ),
            vec!["Dr. Smith arrived at noon.", "He was late."]
        );
    }

    #[test]
    fn test_linguistic_keeps_decimal_numbers_together() {
        assert_eq!(
            split(SplitterKind::Linguistic, "It costs 3.5 dollars. Cheap!"),
            vec!["It costs 3.5 dollars.", "Cheap!"]
        );
    }

    #[test]
    fn test_linguistic_keeps_initials_together() {
        let utterances = split(
            SplitterKind::Linguistic,
            "The author is J. Tolkien. He wrote books.",
        );
        assert_eq!(utterances, vec!["The author is J. Tolkien.", "He wrote books."]);
    }

    #[test]
    fn test_linguistic_without_punctuation() {
        assert_eq!(
            split(SplitterKind::Linguistic, "no punctuation here"),
            vec!["no punctuation here"]
        );
    }

    #[test]
    fn test_splitter_kind_from_str() {
        assert_eq!("regex".parse::<SplitterKind>().unwrap(), SplitterKind::Regex);
        assert_eq!("NLP".parse::<SplitterKind>().unwrap(), SplitterKind::Linguistic);
        assert!("spacy".parse::<SplitterKind>().is_err());
    }

    #[test]
    fn test_utterance_rejects_blank_text() {
        assert!(Utterance::new("   ").is_none());
        assert_eq!(Utterance::new(" hi ").unwrap().as_str(), "hi");
    }
}
