//! Question Orchestrator — owns the phase-scoped queue of outstanding questions.
//!
//! Four sources feed the queue:
//! 1. structural gap-filling rules (`dialogue::structural`)
//! 2. one skill-detection question, put at the front of the structural queue
//! 3. skill-assessment questions, replacing the queue wholesale
//! 4. AI follow-up questions, replacing the queue wholesale, typo corrections first
//!
//! Answers always consume exactly the head of the queue. When the queue empties the
//! orchestrator reports which stage drained so the caller can pick the next phase.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::dialogue::answers::{apply_answer, ApplyError, ValidationError};
use crate::dialogue::question::{Answer, Question};
use crate::dialogue::structural::structural_questions;
use crate::profile::document::ProfileDocument;
use crate::profile::path::PathError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStage {
    #[default]
    Idle,
    Structural,
    SkillAssessment,
    AiFollowup,
}

/// Raised when a stage's queue empties. Each one leads to a different next phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainSignal {
    StructuralDone,
    SkillAssessmentDone,
    AiFollowupDone,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no question is waiting for an answer")]
    NoActiveQuestion,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    InvalidPath(#[from] PathError),
}

impl From<ApplyError> for SubmitError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::Validation(e) => SubmitError::Validation(e),
            ApplyError::Path(e) => SubmitError::InvalidPath(e),
        }
    }
}

/// Result of applying one answer.
#[derive(Debug)]
pub struct Submission {
    pub document: ProfileDocument,
    pub drained: Option<DrainSignal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionOrchestrator {
    queue: VecDeque<Question>,
    stage: QueueStage,
    /// Every AI question text shown in this session, normalised.
    asked: Vec<String>,
    /// AI question → answer pairs collected since the last improve call.
    collected: BTreeMap<String, String>,
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn is_typo_correction(question: &Question) -> bool {
    question
        .category
        .as_deref()
        .map(|c| {
            let c: String = c.chars().filter(|ch| ch.is_ascii_alphanumeric()).collect();
            c.eq_ignore_ascii_case("typo") || c.eq_ignore_ascii_case("typocorrection")
        })
        .unwrap_or(false)
}

impl QuestionOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> QueueStage {
        self.stage
    }

    pub fn current(&self) -> Option<&Question> {
        self.queue.front()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn asked_texts(&self) -> &[String] {
        &self.asked
    }

    /// Drains the question → answer pairs gathered for the next improve call.
    pub fn take_collected(&mut self) -> BTreeMap<String, String> {
        std::mem::take(&mut self.collected)
    }

    fn install(&mut self, stage: QueueStage, questions: VecDeque<Question>) -> Option<DrainSignal> {
        self.queue = questions;
        if self.queue.is_empty() {
            self.stage = QueueStage::Idle;
            Some(drain_signal(stage))
        } else {
            self.stage = stage;
            None
        }
    }

    /// Rebuilds the structural queue from `doc`, with the optional skill-detection
    /// question in front. Returns a drain signal when there is nothing to ask.
    pub fn load_structural(
        &mut self,
        doc: &ProfileDocument,
        skill_question: Option<Question>,
        min_summary_chars: usize,
    ) -> Result<Option<DrainSignal>, PathError> {
        let mut questions: VecDeque<Question> = structural_questions(doc, min_summary_chars)?.into();
        if let Some(question) = skill_question {
            questions.push_front(question);
        }
        info!(count = questions.len(), "structural queue loaded");
        Ok(self.install(QueueStage::Structural, questions))
    }

    pub fn load_skill_assessment(&mut self, questions: Vec<Question>) -> Option<DrainSignal> {
        info!(count = questions.len(), "skill-assessment queue loaded");
        self.install(QueueStage::SkillAssessment, questions.into())
    }

    /// Installs AI follow-ups: drops texts already asked this session, puts typo
    /// corrections first (uncapped), then at most `cap` other questions.
    pub fn load_ai_followups(&mut self, questions: Vec<Question>, cap: usize) -> Option<DrainSignal> {
        let fresh: Vec<Question> = questions
            .into_iter()
            .filter(|q| !self.asked.contains(&normalize(&q.text())))
            .collect();

        let (typos, others): (Vec<Question>, Vec<Question>) = fresh.into_iter().partition(is_typo_correction);
        let queue: VecDeque<Question> = typos.into_iter().chain(others.into_iter().take(cap)).collect();

        for question in &queue {
            let text = normalize(&question.text());
            if !self.asked.contains(&text) {
                self.asked.push(text);
            }
        }
        info!(count = queue.len(), cap, "AI follow-up queue loaded");
        self.install(QueueStage::AiFollowup, queue)
    }

    /// Applies `answer` to the head question and removes it.
    ///
    /// On a validation error nothing changes: the same question stays at the head and
    /// the document is untouched.
    pub fn submit(&mut self, doc: &ProfileDocument, answer: &Answer) -> Result<Submission, SubmitError> {
        let head = self.queue.front().ok_or(SubmitError::NoActiveQuestion)?;
        let document = apply_answer(doc, head, answer)?;

        if self.stage == QueueStage::AiFollowup {
            if let Answer::Text(text) = answer {
                if !text.trim().is_empty() {
                    self.collected.insert(head.text(), text.trim().to_string());
                }
            }
        }

        let answered = self.queue.pop_front();
        debug!(
            question = answered.as_ref().map(|q| q.id.as_str()).unwrap_or_default(),
            skipped = matches!(answer, Answer::Skipped),
            remaining = self.queue.len(),
            "answer applied"
        );

        let drained = if self.queue.is_empty() {
            let signal = drain_signal(self.stage);
            self.stage = QueueStage::Idle;
            Some(signal)
        } else {
            None
        };

        Ok(Submission { document, drained })
    }
}

fn drain_signal(stage: QueueStage) -> DrainSignal {
    match stage {
        QueueStage::SkillAssessment => DrainSignal::SkillAssessmentDone,
        QueueStage::AiFollowup => DrainSignal::AiFollowupDone,
        QueueStage::Structural | QueueStage::Idle => DrainSignal::StructuralDone,
    }
}
