//! Evidence locator: which field and sentence did the string-matching tagger use?
//!
//! Both the keyword and every candidate sentence are lowercased, stripped of
//! ASCII punctuation and stemmed word by word. The stemmed keyword must then
//! appear as a whole word (`\b`-anchored) in the stemmed sentence, so "pools"
//! finds "pool" but "pool" does not find "carpool".

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use tagjudge_core::{EvidenceField, EvidenceMatch, PoiRecord};

/// Sentence-like units are separated by periods, `<br>` markup and newlines.
const SENTENCE_BREAKS: [&str; 3] = [".", "<br>", "\n"];

pub struct EvidenceLocator {
    stemmer: Stemmer,
}

impl Default for EvidenceLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl EvidenceLocator {
    pub fn new() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    /// Find the first field (in `EvidenceField::PRIORITY` order) and the first
    /// sentence within it that contains `keyword`. Deterministic: no state is
    /// kept between calls.
    pub fn locate(&self, keyword: &str, record: &PoiRecord) -> Option<EvidenceMatch> {
        let pattern = self.keyword_pattern(keyword)?;

        EvidenceField::PRIORITY.iter().find_map(|&field| {
            let text = record.field(field)?;
            self.find_sentence(&pattern, text).map(|sentence| EvidenceMatch {
                field,
                sentence: sentence.to_string(),
            })
        })
    }

    /// Lowercase, de-punctuate and stem each whitespace-separated word.
    pub fn stem_phrase(&self, text: &str) -> String {
        text.split_whitespace()
            .map(|word| {
                let cleaned: String = word
                    .to_lowercase()
                    .chars()
                    .filter(|c| !c.is_ascii_punctuation())
                    .collect();
                if cleaned.is_empty() {
                    cleaned
                } else {
                    self.stemmer.stem(&cleaned).into_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn keyword_pattern(&self, keyword: &str) -> Option<Regex> {
        let stemmed = self.stem_phrase(keyword);
        if stemmed.trim().is_empty() {
            return None;
        }
        Regex::new(&format!(r"\b{}\b", regex::escape(&stemmed))).ok()
    }

    fn find_sentence<'t>(&self, pattern: &Regex, text: &'t str) -> Option<&'t str> {
        split_sentences(text)
            .find(|sentence| pattern.is_match(&self.stem_phrase(sentence)))
            .map(str::trim)
    }
}

fn split_sentences(text: &str) -> impl Iterator<Item = &str> {
    let mut units = vec![text];
    for sep in SENTENCE_BREAKS {
        units = units.into_iter().flat_map(|u| u.split(sep)).collect();
    }
    units.into_iter()
}
