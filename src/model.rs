use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::read_to_string;
use std::path::Path;

/// Tag of the catch-all intent used when nothing scores above threshold.
pub const FALLBACK_TAG: &str = "unknown";

/// One recognizable category of user request, loaded from the intents file.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Intent {
    pub tag: String,
    /// Example phrases scored against user input. May be empty only for the
    /// fallback intent.
    #[serde(default)]
    pub patterns: Vec<String>,
    pub responses: Vec<String>,
    /// Exact-phrase shortcuts answered with confidence 1.0, skipping scoring.
    #[serde(default)]
    pub triggers: Vec<String>,
    /// Curated quick-reply follow-ups shown after this intent.
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Per-intent acceptance threshold override.
    #[serde(default)]
    pub threshold: Option<f32>,
}

#[derive(Deserialize, Debug)]
struct IntentsFile {
    intents: Vec<Intent>,
}

/// The full intent corpus. Built once at startup, validated, and shared
/// read-only across workers.
#[derive(Debug, Clone)]
pub struct IntentCorpus {
    intents: Vec<Intent>,
    by_tag: HashMap<String, usize>,
}

impl IntentCorpus {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let content = read_to_string(path_ref)
            .with_context(|| format!("Failed to read intents file at '{}'", path_ref.display()))?;
        let file: IntentsFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse intents file at '{}'", path_ref.display()))?;
        Self::new(file.intents)
    }

    /// Validates the corpus: every intent needs responses, every non-fallback
    /// intent needs patterns, and tags must be unique.
    pub fn new(intents: Vec<Intent>) -> Result<Self> {
        let mut by_tag = HashMap::new();
        for (i, intent) in intents.iter().enumerate() {
            if intent.responses.is_empty() {
                bail!("Intent '{}' has an empty responses list", intent.tag);
            }
            if intent.patterns.is_empty() && intent.tag != FALLBACK_TAG {
                bail!("Intent '{}' has an empty patterns list", intent.tag);
            }
            if by_tag.insert(intent.tag.clone(), i).is_some() {
                bail!("Duplicate intent tag '{}'", intent.tag);
            }
        }
        Ok(Self { intents, by_tag })
    }

    pub fn get(&self, tag: &str) -> Option<&Intent> {
        self.by_tag.get(tag).map(|&i| &self.intents[i])
    }

    pub fn fallback(&self) -> Option<&Intent> {
        self.get(FALLBACK_TAG)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Intent> {
        self.intents.iter()
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}
