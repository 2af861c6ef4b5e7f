use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::collaborators::prompts::{
    FOLLOWUP_PROMPT, IMPROVE_PROMPT, PARSE_PROMPT, PROFILE_TYPE_PROMPT, SCORE_PROMPT, SKILL_ASSESSMENT_PROMPT,
    SKILL_DETECTION_PROMPT,
};
use crate::collaborators::{
    CollaboratorError, GeneratedQuestion, ProfileServices, ProfileType, ScoreReport, SkillAssessmentItem,
    SkillQuestion,
};
use crate::llm_client::prompts::{JSON_ONLY_SYSTEM, NO_INVENTION_INSTRUCTION};
use crate::llm_client::LlmClient;
use crate::profile::document::ProfileDocument;

/// Every collaborator backed by one LLM prompt.
pub struct LlmProfileServices {
    llm: LlmClient,
}

impl LlmProfileServices {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    async fn ask<T: DeserializeOwned>(&self, service: &'static str, prompt: &str) -> Result<T, CollaboratorError> {
        debug!(service, prompt_chars = prompt.len(), "calling collaborator");
        self.llm
            .call_json(prompt, JSON_ONLY_SYSTEM)
            .await
            .map_err(|e| CollaboratorError::from_llm(service, e))
    }
}

fn to_json<T: serde::Serialize>(service: &'static str, value: &T) -> Result<String, CollaboratorError> {
    serde_json::to_string_pretty(value).map_err(|e| CollaboratorError::Malformed {
        service,
        reason: e.to_string(),
    })
}

fn or_unknown(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("unknown")
}

#[async_trait]
impl ProfileServices for LlmProfileServices {
    async fn parse_profile(&self, raw_text: &str) -> Result<ProfileDocument, CollaboratorError> {
        let prompt = PARSE_PROMPT
            .replace("{raw_text}", raw_text)
            .replace("{no_invention}", NO_INVENTION_INSTRUCTION);
        self.ask("parse", &prompt).await
    }

    async fn detect_profile_type(&self, doc: &ProfileDocument) -> Result<ProfileType, CollaboratorError> {
        let prompt = PROFILE_TYPE_PROMPT.replace("{profile_json}", &to_json("profile-type", doc)?);
        self.ask("profile-type", &prompt).await
    }

    async fn detect_skill(&self, doc: &ProfileDocument) -> Result<Option<SkillQuestion>, CollaboratorError> {
        let prompt = SKILL_DETECTION_PROMPT.replace("{profile_json}", &to_json("skill-detection", doc)?);
        let question: SkillQuestion = self.ask("skill-detection", &prompt).await?;
        Ok(Some(question).filter(|q| !q.prompt_text.trim().is_empty()))
    }

    async fn skill_assessment(
        &self,
        doc: &ProfileDocument,
        profile_type: &ProfileType,
    ) -> Result<Vec<SkillAssessmentItem>, CollaboratorError> {
        let prompt = SKILL_ASSESSMENT_PROMPT
            .replace("{occupation}", or_unknown(profile_type.occupation()))
            .replace("{sector}", or_unknown(profile_type.sector.as_deref()))
            .replace("{seniority}", or_unknown(profile_type.seniority.as_deref()))
            .replace("{profile_json}", &to_json("skill-assessment", doc)?);
        self.ask("skill-assessment", &prompt).await
    }

    async fn followup_questions(
        &self,
        doc: &ProfileDocument,
        asked: &[String],
        max_count: usize,
    ) -> Result<Vec<GeneratedQuestion>, CollaboratorError> {
        let prompt = FOLLOWUP_PROMPT
            .replace("{profile_json}", &to_json("follow-up", doc)?)
            .replace("{asked_json}", &to_json("follow-up", &asked)?)
            .replace("{max_count}", &max_count.to_string());
        self.ask("follow-up", &prompt).await
    }

    async fn improve(
        &self,
        doc: &ProfileDocument,
        answers: &BTreeMap<String, String>,
    ) -> Result<ProfileDocument, CollaboratorError> {
        let prompt = IMPROVE_PROMPT
            .replace("{profile_json}", &to_json("improve", doc)?)
            .replace("{answers_json}", &to_json("improve", answers)?)
            .replace("{no_invention}", NO_INVENTION_INSTRUCTION);
        self.ask("improve", &prompt).await
    }

    async fn score(&self, doc: &ProfileDocument) -> Result<ScoreReport, CollaboratorError> {
        let prompt = SCORE_PROMPT.replace("{profile_json}", &to_json("scoring", doc)?);
        let report: ScoreReport = self.ask("scoring", &prompt).await?;
        if !(0.0..=100.0).contains(&report.score) {
            return Err(CollaboratorError::Malformed {
                service: "scoring",
                reason: format!("score {} is outside 0-100", report.score),
            });
        }
        Ok(report)
    }
}
