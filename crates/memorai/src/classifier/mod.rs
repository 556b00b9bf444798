//! Rule-based memory classification
//!
//! A deterministic cascade over lexical signals. The first rule that fires
//! decides the type; the order below is the precedence:
//!
//! 1. empty input -> `thread`
//! 2. personality (subject + trait word)
//! 3. preference (preference verb, stronger with the subject "user")
//! 4. emotion
//! 5. procedure (steps, imperatives, commands, file paths)
//! 6. task
//! 7. thread (questions, URLs)
//! 8. `fact` fallback
//!
//! Personality and preference outrank procedure, so "User prefers to run
//! tests first" is a preference even though it reads like an instruction.

use serde::{Deserialize, Serialize};

use crate::error::ClassificationError;
use crate::memory::types::{MemoryType, clamp_unit};

/// Inputs above this size are rejected rather than scanned
pub const MAX_CLASSIFIABLE_BYTES: usize = 100_000;

/// Outcome of classifying a piece of content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub memory_type: MemoryType,
    /// Confidence in [0, 1]
    pub confidence: f32,
    /// Importance estimate in [0, 1]
    pub importance: f32,
    /// Which rule fired
    pub reasoning: String,
}

impl Classification {
    fn new(memory_type: MemoryType, confidence: f32, importance: f32, reasoning: impl Into<String>) -> Self {
        Self {
            memory_type,
            confidence: clamp_unit(confidence),
            importance: clamp_unit(importance),
            reasoning: reasoning.into(),
        }
    }

    /// Default applied when classification fails
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self::new(MemoryType::Fact, 0.0, base_importance(MemoryType::Fact), reason)
    }
}

/// Anything that can classify memory content
pub trait ContentClassifier: Send + Sync {
    fn classify(&self, content: &str) -> Result<Classification, ClassificationError>;

    /// Classifier name for logging
    fn name(&self) -> &'static str;
}

const PERSONAL_SUBJECTS: &[&str] = &["user", "i", "i'm", "he", "she", "they", "my", "me"];

const TRAIT_WORDS: &[&str] = &[
    "personality",
    "introvert",
    "introverted",
    "extrovert",
    "extroverted",
    "patient",
    "impatient",
    "curious",
    "creative",
    "organized",
    "disorganized",
    "detail-oriented",
    "analytical",
    "shy",
    "outgoing",
    "friendly",
    "sarcastic",
    "optimistic",
    "pessimistic",
    "perfectionist",
    "ambitious",
    "stubborn",
    "honest",
    "funny",
    "calm",
    "anxious-type",
    "meticulous",
    "lazy",
    "diligent",
];

const PREFERENCE_MARKERS: &[&str] = &[
    "prefers",
    "prefer",
    "preferred",
    "preference",
    "likes",
    "like",
    "loves",
    "love",
    "hates",
    "hate",
    "dislikes",
    "dislike",
    "favorite",
    "favourite",
    "enjoys",
    "enjoy",
    "fan",
    "wants",
];

const PREFERENCE_PHRASES: &[&str] = &["would rather", "rather than", "instead of"];

const EMOTION_WORDS: &[&str] = &[
    "feel",
    "feels",
    "feeling",
    "felt",
    "happy",
    "sad",
    "angry",
    "upset",
    "frustrated",
    "excited",
    "anxious",
    "worried",
    "scared",
    "afraid",
    "stressed",
    "overwhelmed",
    "grateful",
    "lonely",
    "proud",
    "disappointed",
];

const IMPERATIVE_VERBS: &[&str] = &[
    "run",
    "install",
    "open",
    "click",
    "create",
    "add",
    "remove",
    "delete",
    "set",
    "configure",
    "use",
    "call",
    "build",
    "deploy",
    "execute",
    "type",
    "navigate",
    "restart",
    "update",
    "copy",
    "move",
    "start",
    "stop",
    "check",
    "make",
];

const STEP_PHRASES: &[&str] = &[
    "step 1",
    "step one",
    "first,",
    "then ",
    "next,",
    "finally,",
    "after that",
    "how to",
    "in order to",
];

const COMMAND_PREFIXES: &[&str] = &[
    "$ ", "cargo ", "npm ", "git ", "pip ", "docker ", "kubectl ", "sudo ", "make ",
];

const TASK_PHRASES: &[&str] = &[
    "todo",
    "to-do",
    "need to",
    "needs to",
    "remind",
    "reminder",
    "deadline",
    "due ",
    "by tomorrow",
    "by monday",
    "next week",
    "don't forget",
    "must ",
    "have to",
];

const EMPHASIS_MARKERS: &[&str] = &["important", "always", "never", "critical", "remember", "must"];

/// Deterministic lexical classifier
#[derive(Debug, Clone, Default)]
pub struct RuleClassifier;

impl RuleClassifier {
    pub fn new() -> Self {
        Self
    }

    fn detect(&self, content: &str) -> Classification {
        let lower = content.to_lowercase();
        let words = tokenize(&lower);

        if words.is_empty() && !lower.chars().any(|c| c.is_alphanumeric()) {
            return Classification::new(
                MemoryType::Thread,
                0.1,
                base_importance(MemoryType::Thread),
                "no lexical content",
            );
        }

        let has_subject = words.iter().any(|w| PERSONAL_SUBJECTS.contains(&w.as_str()));
        let mentions_user = words.iter().any(|w| w == "user" || w == "user's");

        if has_subject {
            if let Some(trait_word) = words.iter().find(|w| TRAIT_WORDS.contains(&w.as_str())) {
                return Classification::new(
                    MemoryType::Personality,
                    0.85,
                    base_importance(MemoryType::Personality),
                    format!("personal subject with trait word '{trait_word}'"),
                );
            }
        }

        let preference_word = words
            .iter()
            .find(|w| PREFERENCE_MARKERS.contains(&w.as_str()))
            .map(String::as_str)
            .or_else(|| PREFERENCE_PHRASES.iter().copied().find(|p| lower.contains(p)));
        if let Some(marker) = preference_word {
            let confidence = if mentions_user { 0.9 } else if has_subject { 0.8 } else { 0.65 };
            return Classification::new(
                MemoryType::Preference,
                confidence,
                base_importance(MemoryType::Preference),
                format!("preference marker '{marker}'"),
            );
        }

        if let Some(feeling) = words.iter().find(|w| EMOTION_WORDS.contains(&w.as_str())) {
            return Classification::new(
                MemoryType::Emotion,
                0.75,
                base_importance(MemoryType::Emotion),
                format!("emotion word '{feeling}'"),
            );
        }

        if let Some(signal) = procedural_signal(&lower, content, &words) {
            return Classification::new(
                MemoryType::Procedure,
                0.75,
                base_importance(MemoryType::Procedure),
                signal,
            );
        }

        if let Some(phrase) = TASK_PHRASES.iter().find(|p| lower.contains(*p)) {
            return Classification::new(
                MemoryType::Task,
                0.7,
                base_importance(MemoryType::Task),
                format!("task phrase '{}'", phrase.trim()),
            );
        }

        if lower.contains('?') {
            return Classification::new(
                MemoryType::Thread,
                0.6,
                base_importance(MemoryType::Thread),
                "question mark",
            );
        }

        if contains_url(&lower) {
            return Classification::new(
                MemoryType::Thread,
                0.6,
                base_importance(MemoryType::Thread),
                "URL reference",
            );
        }

        let specific = content.chars().any(|c| c.is_ascii_digit()) || has_proper_noun(content);
        Classification::new(
            MemoryType::Fact,
            if specific { 0.6 } else { 0.5 },
            base_importance(MemoryType::Fact),
            if specific {
                "fallback: specific statement"
            } else {
                "fallback: general statement"
            },
        )
    }
}

impl ContentClassifier for RuleClassifier {
    fn classify(&self, content: &str) -> Result<Classification, ClassificationError> {
        if content.len() > MAX_CLASSIFIABLE_BYTES {
            return Err(ClassificationError::InputTooLarge(content.len()));
        }

        let mut classification = self.detect(content);
        classification.importance = adjust_importance(classification.importance, content);
        Ok(classification)
    }

    fn name(&self) -> &'static str {
        "rules"
    }
}

fn base_importance(memory_type: MemoryType) -> f32 {
    match memory_type {
        MemoryType::Personality => 0.8,
        MemoryType::Task => 0.75,
        MemoryType::Preference => 0.7,
        MemoryType::Procedure => 0.7,
        MemoryType::Emotion => 0.6,
        MemoryType::Fact => 0.5,
        MemoryType::Thread => 0.3,
    }
}

fn adjust_importance(base: f32, content: &str) -> f32 {
    let lower = content.to_lowercase();
    let mut importance = base;

    let emphasis = EMPHASIS_MARKERS.iter().filter(|m| lower.contains(*m)).count() as f32;
    importance += (emphasis * 0.05).min(0.15);

    if content.contains('!') {
        importance += 0.05;
    }

    let length = content.chars().count();
    if length > 200 {
        importance += 0.05;
    } else if length < 12 {
        importance -= 0.1;
    }

    clamp_unit(importance)
}

fn tokenize(lower: &str) -> Vec<String> {
    lower
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | ';' | ':' | '!' | '?' | '(' | ')' | '"'))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn procedural_signal(lower: &str, original: &str, words: &[String]) -> Option<String> {
    if let Some(phrase) = STEP_PHRASES.iter().find(|p| lower.contains(*p)) {
        return Some(format!("step marker '{}'", phrase.trim()));
    }

    if original
        .lines()
        .filter(|line| is_numbered_line(line.trim_start()))
        .count()
        >= 2
    {
        return Some("numbered list".to_string());
    }

    if let Some(first) = words.first() {
        if IMPERATIVE_VERBS.contains(&first.as_str()) {
            return Some(format!("leading imperative '{first}'"));
        }
    }

    let trimmed = lower.trim_start();
    if let Some(prefix) = COMMAND_PREFIXES.iter().find(|p| trimmed.starts_with(*p)) {
        return Some(format!("shell command '{}'", prefix.trim()));
    }

    if lower
        .split_whitespace()
        .map(|w| w.trim_end_matches([',', ';', ':', '.', ')', '"']))
        .any(looks_like_path)
    {
        return Some("file path reference".to_string());
    }

    None
}

fn is_numbered_line(line: &str) -> bool {
    let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
    !digits.is_empty() && line[digits.len()..].starts_with(['.', ')'])
}

fn looks_like_path(word: &str) -> bool {
    if contains_url(word) {
        return false;
    }
    let unix = (word.starts_with('/') || word.starts_with("./") || word.starts_with("~/"))
        && word.len() > 2
        && word[1..].contains(|c: char| c.is_alphanumeric());
    let windows = word.len() > 3
        && word.as_bytes()[1] == b':'
        && (word.as_bytes()[2] == b'\\' || word.as_bytes()[2] == b'/');
    let has_extension = word.contains('/')
        && word
            .rsplit_once('.')
            .is_some_and(|(_, ext)| (1..=4).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    unix || windows || has_extension
}

fn contains_url(lower: &str) -> bool {
    lower.contains("http://") || lower.contains("https://") || lower.contains("www.")
}

fn has_proper_noun(content: &str) -> bool {
    content
        .split_whitespace()
        .skip(1)
        .any(|w| {
            let mut chars = w.chars();
            chars.next().is_some_and(|c| c.is_uppercase()) && chars.any(|c| c.is_lowercase())
        })
}
