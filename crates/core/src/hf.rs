//! Trait seam for the external scoring services run alongside the tree
//! manager (embeddings for near-duplicate detection, toxicity classification
//! for spam/abuse triage). Implementations live in `dendron-manager`; this
//! crate only defines the contract so the domain layer stays free of any
//! particular HTTP client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A toxicity classifier's verdict on a single piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToxicityScore {
    pub toxicity: f32,
    pub severe_toxicity: f32,
}

impl ToxicityScore {
    /// Whether this score clears a threshold on either axis.
    pub fn exceeds(&self, threshold: f32) -> bool {
        self.toxicity >= threshold || self.severe_toxicity >= threshold
    }
}

/// External text-scoring services used to enrich a message after it is
/// written: a fixed-size embedding for near-duplicate detection, and a
/// toxicity classification used to flag spam/abuse for moderation.
#[async_trait]
pub trait HfClient: Send + Sync {
    /// Compute an embedding vector for `text`.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Classify `text` for toxicity.
    async fn classify_toxicity(&self, text: &str) -> Result<ToxicityScore>;
}
