use crate::model::{IntentCorpus, FALLBACK_TAG};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

/// Confidence reported when no intent matches at all.
const NO_MATCH_CONFIDENCE: f32 = 0.1;
/// Best scores at or below this floor degrade to the fallback intent.
const SCORE_FLOOR: f32 = 0.3;
/// Scanning an intent's patterns stops early past this score.
const EARLY_EXIT_SCORE: f32 = 0.9;

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Best-guess intent for one utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: String,
    pub confidence: f32,
}

impl Classification {
    fn fallback() -> Self {
        Self {
            intent: FALLBACK_TAG.to_string(),
            confidence: NO_MATCH_CONFIDENCE,
        }
    }
}

/// Lower-cases, strips punctuation, collapses whitespace runs and trims.
/// All matching happens on this normalized form.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Word-set overlap between two normalized strings: shared words over
/// distinct words across both. Equal strings score 1.0 unconditionally.
fn word_overlap(a: &str, b: &str) -> f32 {
    if a == b {
        return 1.0;
    }
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();
    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 0.0;
    }
    let shared = words_a.intersection(&words_b).count();
    shared as f32 / union as f32
}

/// Maps free-text utterances to intent tags by exact-phrase triggers and
/// word-overlap scoring against the corpus patterns.
pub struct IntentClassifier {
    corpus: Arc<IntentCorpus>,
    default_threshold: f32,
}

impl IntentClassifier {
    pub fn new(corpus: Arc<IntentCorpus>, default_threshold: f32) -> Self {
        Self {
            corpus,
            default_threshold,
        }
    }

    /// Classifies one utterance. Total over any input: blank or unmatched
    /// text yields the fallback intent, never an error.
    pub fn classify(&self, text: &str) -> Classification {
        let input = normalize(text);
        if input.is_empty() {
            return Classification::fallback();
        }

        // High-frequency phrases (greetings, farewells, thanks) resolve by
        // exact lookup before any scoring.
        for intent in self.corpus.iter() {
            if intent.triggers.iter().any(|t| normalize(t) == input) {
                return Classification {
                    intent: intent.tag.clone(),
                    confidence: 1.0,
                };
            }
        }

        let mut best: Option<(&str, f32)> = None;
        for intent in self.corpus.iter() {
            let mut top = 0.0f32;
            for pattern in &intent.patterns {
                let score = word_overlap(&input, &normalize(pattern));
                if score > top {
                    top = score;
                    if score > EARLY_EXIT_SCORE {
                        break;
                    }
                }
            }

            let threshold = intent.threshold.unwrap_or(self.default_threshold);
            if top >= threshold && best.map_or(true, |(_, current)| top > current) {
                best = Some((intent.tag.as_str(), top));
            }
        }

        match best {
            Some((tag, score)) if score > SCORE_FLOOR => Classification {
                intent: tag.to_string(),
                confidence: score,
            },
            _ => Classification::fallback(),
        }
    }
}
