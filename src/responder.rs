use crate::model::IntentCorpus;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;

/// Last-resort reply when even the fallback intent has nothing to say.
pub const APOLOGY: &str =
    "I'm having trouble generating a response right now. Could you try again?";

/// Default quick replies used when no intent-specific set applies.
pub const GENERIC_SUGGESTIONS: [&str; 3] = [
    "Tell me about your projects",
    "What skills do you have?",
    "How can I contact you?",
];

const MAX_SUGGESTIONS: usize = 4;
const MAX_QUESTION_SUGGESTIONS: usize = 3;
const MIN_SUGGESTIONS: usize = 2;

/// A reply plus the quick-reply suggestions that go with it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub response: String,
    pub suggestions: Vec<String>,
}

/// Picks replies and follow-up suggestions for resolved intents, purely from
/// the static corpus.
pub struct ResponseGenerator {
    corpus: Arc<IntentCorpus>,
    rng: Mutex<StdRng>,
}

impl ResponseGenerator {
    pub fn new(corpus: Arc<IntentCorpus>) -> Self {
        Self {
            corpus,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Fixed-seed constructor so tests can pin the reply draw.
    pub fn with_seed(corpus: Arc<IntentCorpus>, seed: u64) -> Self {
        Self {
            corpus,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Produces a reply for `tag`. Unrecognized tags and empty response
    /// pools degrade to the fallback intent's pool, then to a fixed apology;
    /// this never fails.
    pub fn generate(&self, tag: &str) -> Reply {
        let intent = self
            .corpus
            .get(tag)
            .filter(|i| !i.responses.is_empty())
            .or_else(|| self.corpus.fallback());

        let response = intent
            .and_then(|i| i.responses.choose(&mut *self.rng.lock()).cloned())
            .unwrap_or_else(|| APOLOGY.to_string());

        Reply {
            response,
            suggestions: self.suggestions_for(tag),
        }
    }

    /// Curated list first, then question-shaped patterns, padded with
    /// generic prompts when too few remain. Always non-empty, at most 4.
    fn suggestions_for(&self, tag: &str) -> Vec<String> {
        let intent = self.corpus.get(tag).or_else(|| self.corpus.fallback());

        let mut suggestions: Vec<String> = match intent {
            Some(i) if !i.suggestions.is_empty() => {
                i.suggestions.iter().take(MAX_SUGGESTIONS).cloned().collect()
            }
            Some(i) => i
                .patterns
                .iter()
                .filter(|p| p.contains('?'))
                .take(MAX_QUESTION_SUGGESTIONS)
                .cloned()
                .collect(),
            None => Vec::new(),
        };

        if suggestions.len() < MIN_SUGGESTIONS {
            let topic = tag.replace('_', " ");
            let generics = [
                format!("Tell me more about {topic}"),
                "Can you elaborate?".to_string(),
                "What else should I know?".to_string(),
            ];
            for generic in generics {
                if suggestions.len() >= MAX_QUESTION_SUGGESTIONS {
                    break;
                }
                if !suggestions.contains(&generic) {
                    suggestions.push(generic);
                }
            }
        }

        suggestions.truncate(MAX_SUGGESTIONS);
        suggestions
    }

    pub fn generic_suggestions() -> Vec<String> {
        GENERIC_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Intent, FALLBACK_TAG};

    fn intent(tag: &str, patterns: &[&str], responses: &[&str], suggestions: &[&str]) -> Intent {
        Intent {
            tag: tag.to_string(),
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
            responses: responses.iter().map(|s| s.to_string()).collect(),
            triggers: Vec::new(),
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
            threshold: None,
        }
    }

    fn corpus() -> Arc<IntentCorpus> {
        let intents = vec![
            intent(
                "greeting",
                &["hello there"],
                &["Hi!", "Hello!", "Hey there!"],
                &["What skills do you have?", "Show me your projects"],
            ),
            intent(
                "projects",
                &[
                    "what projects have you built?",
                    "show me your work",
                    "any web projects?",
                    "tell me about your portfolio",
                ],
                &["I've built a few things."],
                &[],
            ),
            intent("education", &["where did you study"], &["At university."], &[]),
            intent(
                FALLBACK_TAG,
                &[],
                &["Sorry, I didn't get that."],
                &["Tell me about your projects", "What skills do you have?"],
            ),
        ];
        Arc::new(IntentCorpus::new(intents).unwrap())
    }

    #[test]
    fn reply_comes_from_the_intents_pool() {
        let corpus = corpus();
        let generator = ResponseGenerator::new(corpus.clone());
        let pool = &corpus.get("greeting").unwrap().responses;
        for _ in 0..20 {
            let reply = generator.generate("greeting");
            assert!(pool.contains(&reply.response));
        }
    }

    #[test]
    fn seeded_generators_draw_identically() {
        let first = ResponseGenerator::with_seed(corpus(), 7);
        let second = ResponseGenerator::with_seed(corpus(), 7);
        for _ in 0..10 {
            assert_eq!(first.generate("greeting"), second.generate("greeting"));
        }
    }

    #[test]
    fn curated_suggestions_win() {
        let generator = ResponseGenerator::new(corpus());
        let reply = generator.generate("greeting");
        assert_eq!(
            reply.suggestions,
            vec!["What skills do you have?", "Show me your projects"]
        );
    }

    #[test]
    fn question_patterns_back_fill_suggestions() {
        let generator = ResponseGenerator::new(corpus());
        let reply = generator.generate("projects");
        assert_eq!(
            reply.suggestions,
            vec!["what projects have you built?", "any web projects?"]
        );
    }

    #[test]
    fn sparse_intents_get_generic_padding() {
        let generator = ResponseGenerator::new(corpus());
        let reply = generator.generate("education");
        assert_eq!(
            reply.suggestions,
            vec![
                "Tell me more about education",
                "Can you elaborate?",
                "What else should I know?"
            ]
        );
    }

    #[test]
    fn unrecognized_tag_uses_the_fallback_intent() {
        let generator = ResponseGenerator::new(corpus());
        let reply = generator.generate("no_such_intent");
        assert_eq!(reply.response, "Sorry, I didn't get that.");
        assert!(!reply.suggestions.is_empty());
    }

    #[test]
    fn suggestions_are_bounded() {
        let generator = ResponseGenerator::new(corpus());
        for tag in ["greeting", "projects", "education", "bogus"] {
            let reply = generator.generate(tag);
            assert!(!reply.suggestions.is_empty(), "tag: {tag}");
            assert!(reply.suggestions.len() <= 4, "tag: {tag}");
        }
    }

    #[test]
    fn missing_fallback_degrades_to_apology() {
        let intents = vec![intent("greeting", &["hello"], &["Hi!"], &[])];
        let generator = ResponseGenerator::new(Arc::new(IntentCorpus::new(intents).unwrap()));
        let reply = generator.generate("no_such_intent");
        assert_eq!(reply.response, APOLOGY);
        assert!(!reply.suggestions.is_empty());
    }
}
