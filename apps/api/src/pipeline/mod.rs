// The pipeline: phase sequencing, the controller that owns the document, and drafts.

use std::time::Duration;

pub mod controller;
pub mod draft;
pub mod phase;

pub use controller::{PipelineController, PipelineError, SessionView};
pub use draft::{DraftError, DraftStore, MemoryDraftStore, RedisDraftStore};

/// Tunables shared by every controller.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub collaborator_timeout: Duration,
    /// Follow-up questions requested on the first pass through sector follow-ups.
    pub ai_question_cap: usize,
    /// Scores below this send the profile around the improvement loop.
    pub improve_score_threshold: f64,
    pub max_improve_loops: u32,
    /// Follow-up questions requested on each improvement loop.
    pub loop_question_cap: usize,
    pub min_summary_chars: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            collaborator_timeout: Duration::from_secs(60),
            ai_question_cap: 5,
            improve_score_threshold: 75.0,
            max_improve_loops: 2,
            loop_question_cap: 2,
            min_summary_chars: 60,
        }
    }
}
