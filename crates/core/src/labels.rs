//! Label vocabulary and labeling-task modes.

use serde::{Deserialize, Serialize};

/// A single text-quality label a worker can apply to a message.
///
/// The vocabulary mirrors what the acceptance evaluator reads directly
/// (`Spam`, `LangMismatch`) plus a handful of others that can be part of a
/// site's configured label set but do not feed `acceptance()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextLabel {
    Spam,
    LangMismatch,
    Quality,
    Toxicity,
    Helpful,
    Creativity,
    Violence,
    NotAppropriate,
    Pii,
    Hatespeech,
    Sexual,
    Political,
}

impl TextLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            TextLabel::Spam => "spam",
            TextLabel::LangMismatch => "lang_mismatch",
            TextLabel::Quality => "quality",
            TextLabel::Toxicity => "toxicity",
            TextLabel::Helpful => "helpful",
            TextLabel::Creativity => "creativity",
            TextLabel::Violence => "violence",
            TextLabel::NotAppropriate => "not_appropriate",
            TextLabel::Pii => "pii",
            TextLabel::Hatespeech => "hatespeech",
            TextLabel::Sexual => "sexual",
            TextLabel::Political => "political",
        }
    }
}

impl std::fmt::Display for TextLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a labeling task asks for the full configured label set or a
/// restricted mandatory-plus-spam set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelTaskMode {
    Full,
    Simple,
}

/// The label the task asks workers to prioritize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelTaskDisposition {
    Quality,
    Spam,
}
