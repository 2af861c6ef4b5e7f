//! External collaborators: the services the pipeline calls but does not implement.
//!
//! `ProfileServices` is the seam. The controller holds an `Arc<dyn ProfileServices>`;
//! production wires `LlmProfileServices`, tests wire an in-process fake.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dialogue::answers::{skill_name_from_key, SKILL_LEVELS};
use crate::dialogue::question::{AnswerKind, Choice, Prompt, Question, QuestionSource, SkillRef};
use crate::llm_client::LlmError;
use crate::profile::document::ProfileDocument;

#[cfg(test)]
pub mod fake;
pub mod llm;
pub mod prompts;

pub use llm::LlmProfileServices;

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{service} is unavailable: {reason}")]
    Unavailable { service: &'static str, reason: String },

    #[error("{service} did not answer within {secs}s")]
    Timeout { service: &'static str, secs: u64 },

    #[error("{service} returned a malformed response: {reason}")]
    Malformed { service: &'static str, reason: String },
}

impl CollaboratorError {
    pub fn from_llm(service: &'static str, err: LlmError) -> Self {
        match err {
            LlmError::Parse(e) => CollaboratorError::Malformed {
                service,
                reason: e.to_string(),
            },
            LlmError::EmptyContent => CollaboratorError::Malformed {
                service,
                reason: "empty response".to_string(),
            },
            other => CollaboratorError::Unavailable {
                service,
                reason: other.to_string(),
            },
        }
    }

    pub fn service(&self) -> &'static str {
        match self {
            CollaboratorError::Unavailable { service, .. }
            | CollaboratorError::Timeout { service, .. }
            | CollaboratorError::Malformed { service, .. } => service,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Response shapes
// ────────────────────────────────────────────────────────────────────────────

/// Result of profile-type detection. Every field may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileType {
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub seniority: Option<String>,
}

impl ProfileType {
    pub fn occupation(&self) -> Option<&str> {
        self.occupation.as_deref().map(str::trim).filter(|o| !o.is_empty())
    }
}

/// The single skill-detection question.
#[derive(Debug, Clone, Deserialize)]
pub struct SkillQuestion {
    pub prompt_text: String,
}

impl SkillQuestion {
    /// Wraps the prompt as a rating question; the answer names the skill and a level.
    pub fn into_question(self) -> Option<Question> {
        let text = self.prompt_text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Question::new(
            Prompt::Text(text.to_string()),
            AnswerKind::SkillRating { skill: None },
            QuestionSource::SkillDetection,
        ))
    }
}

/// One skill the assessment generator wants rated.
#[derive(Debug, Clone, Deserialize)]
pub struct SkillAssessmentItem {
    pub key: String,
    /// Derived from `key` when the generator leaves it out.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub question: Option<String>,
}

impl SkillAssessmentItem {
    pub fn into_question(self) -> Question {
        let name = if self.name.trim().is_empty() {
            skill_name_from_key(&self.key)
        } else {
            self.name
        };
        let text = self
            .question
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| format!("How would you rate your {name} skills?"));
        let mut choices: Vec<Choice> = SKILL_LEVELS.iter().map(|l| Choice::same(l)).collect();
        choices.push(Choice::new("None", None));

        Question::new(
            Prompt::Text(text),
            AnswerKind::SkillRating {
                skill: Some(SkillRef { key: self.key, name }),
            },
            QuestionSource::SkillAssessment,
        )
        .with_choices(choices)
    }
}

/// An AI follow-up question as returned by the generator.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestion {
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub is_multiple_choice: bool,
    #[serde(default)]
    pub choices: Vec<String>,
}

impl GeneratedQuestion {
    /// AI follow-ups are always freeform: answers land in `userAdditions` for the
    /// next improve call to merge.
    pub fn into_question(self) -> Option<Question> {
        let text = self.text.trim();
        if text.is_empty() {
            return None;
        }
        let mut question = Question::new(
            Prompt::Text(text.to_string()),
            AnswerKind::Freeform,
            QuestionSource::AiFollowup,
        );
        if let Some(id) = self.id.filter(|id| !id.trim().is_empty()) {
            question.id = format!("ai.{id}");
        }
        if self.is_multiple_choice {
            question.choices = self.choices.iter().map(|c| Choice::same(c)).collect();
        }
        question.category = self.category;
        question.hint = self.hint;
        Some(question)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// One method per external collaborator. Implementations report failures; the
/// controller decides the fallback.
#[async_trait]
pub trait ProfileServices: Send + Sync {
    /// Raw extracted text → skeleton document.
    async fn parse_profile(&self, raw_text: &str) -> Result<ProfileDocument, CollaboratorError>;

    async fn detect_profile_type(&self, doc: &ProfileDocument) -> Result<ProfileType, CollaboratorError>;

    /// `None` when the service has nothing to ask.
    async fn detect_skill(&self, doc: &ProfileDocument) -> Result<Option<SkillQuestion>, CollaboratorError>;

    async fn skill_assessment(
        &self,
        doc: &ProfileDocument,
        profile_type: &ProfileType,
    ) -> Result<Vec<SkillAssessmentItem>, CollaboratorError>;

    async fn followup_questions(
        &self,
        doc: &ProfileDocument,
        asked: &[String],
        max_count: usize,
    ) -> Result<Vec<GeneratedQuestion>, CollaboratorError>;

    /// Returns a full replacement document.
    async fn improve(
        &self,
        doc: &ProfileDocument,
        answers: &BTreeMap<String, String>,
    ) -> Result<ProfileDocument, CollaboratorError>;

    async fn score(&self, doc: &ProfileDocument) -> Result<ScoreReport, CollaboratorError>;
}
