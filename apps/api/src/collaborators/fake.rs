//! In-process `ProfileServices` for tests. Every response is configured up front and
//! every call is recorded.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::collaborators::{
    CollaboratorError, GeneratedQuestion, ProfileServices, ProfileType, ScoreReport, SkillAssessmentItem,
    SkillQuestion,
};
use crate::pipeline::{PipelineController, PipelineSettings};
use crate::profile::document::{EducationEntry, ExperienceEntry, LanguageEntry, ProfileDocument};

#[derive(Default)]
pub struct FakeServices {
    pub parsed: Option<ProfileDocument>,
    pub profile_type: ProfileType,
    pub type_delay: Option<Duration>,
    pub skill_prompt: Option<String>,
    pub assessment: Vec<SkillAssessmentItem>,
    pub followups: Vec<GeneratedQuestion>,
    pub improved: Option<ProfileDocument>,
    pub improve_fails: bool,
    pub scores: Mutex<VecDeque<f64>>,
    pub calls: Mutex<Vec<&'static str>>,
    pub followup_caps: Mutex<Vec<usize>>,
    pub improve_answers: Mutex<Vec<BTreeMap<String, String>>>,
}

impl FakeServices {
    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self, call: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == call).count()
    }

    fn unavailable(service: &'static str) -> CollaboratorError {
        CollaboratorError::Unavailable {
            service,
            reason: "connection refused".into(),
        }
    }
}

#[async_trait]
impl ProfileServices for FakeServices {
    async fn parse_profile(&self, _raw_text: &str) -> Result<ProfileDocument, CollaboratorError> {
        self.record("parse");
        self.parsed.clone().ok_or_else(|| Self::unavailable("parse"))
    }

    async fn detect_profile_type(&self, _doc: &ProfileDocument) -> Result<ProfileType, CollaboratorError> {
        self.record("profile-type");
        if let Some(delay) = self.type_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.profile_type.clone())
    }

    async fn detect_skill(&self, _doc: &ProfileDocument) -> Result<Option<SkillQuestion>, CollaboratorError> {
        self.record("skill-detection");
        Ok(self.skill_prompt.clone().map(|prompt_text| SkillQuestion { prompt_text }))
    }

    async fn skill_assessment(
        &self,
        _doc: &ProfileDocument,
        _profile_type: &ProfileType,
    ) -> Result<Vec<SkillAssessmentItem>, CollaboratorError> {
        self.record("skill-assessment");
        Ok(self.assessment.clone())
    }

    async fn followup_questions(
        &self,
        _doc: &ProfileDocument,
        _asked: &[String],
        max_count: usize,
    ) -> Result<Vec<GeneratedQuestion>, CollaboratorError> {
        self.record("follow-up");
        self.followup_caps.lock().unwrap().push(max_count);
        Ok(self.followups.clone())
    }

    async fn improve(
        &self,
        doc: &ProfileDocument,
        answers: &BTreeMap<String, String>,
    ) -> Result<ProfileDocument, CollaboratorError> {
        self.record("improve");
        self.improve_answers.lock().unwrap().push(answers.clone());
        if self.improve_fails {
            return Err(Self::unavailable("improve"));
        }
        Ok(self.improved.clone().unwrap_or_else(|| doc.clone()))
    }

    async fn score(&self, _doc: &ProfileDocument) -> Result<ScoreReport, CollaboratorError> {
        self.record("scoring");
        let score = self
            .scores
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Self::unavailable("scoring"))?;
        Ok(ScoreReport {
            score,
            strengths: vec![],
            weaknesses: vec![],
            suggestions: vec![],
        })
    }
}

pub fn complete_doc() -> ProfileDocument {
    let mut doc = ProfileDocument::default();
    doc.personal_info.name = Some("Grace Hopper".into());
    doc.personal_info.email = Some("grace@example.com".into());
    doc.personal_info.location = Some("Arlington".into());
    doc.personal_info.phone = Some("+1 555 0100".into());
    doc.summary = Some("Programme manager who led compiler and tooling teams for over twenty years.".into());
    doc.experience.push(ExperienceEntry {
        title: Some("Programme Manager".into()),
        company: Some("Navy".into()),
        location: Some("Arlington".into()),
        end_date: Some("1986".into()),
        ..Default::default()
    });
    doc.education.push(EducationEntry {
        institution: Some("Yale".into()),
        ..Default::default()
    });
    doc.languages.push(LanguageEntry {
        name: Some("English".into()),
        ..Default::default()
    });
    doc
}

pub fn followup(text: &str, category: &str) -> GeneratedQuestion {
    GeneratedQuestion {
        id: None,
        text: text.into(),
        category: Some(category.into()),
        hint: None,
        is_multiple_choice: false,
        choices: vec![],
    }
}

pub fn controller(services: Arc<FakeServices>) -> PipelineController {
    PipelineController::new(Uuid::new_v4(), services, PipelineSettings::default())
}

pub fn scores(values: &[f64]) -> Mutex<VecDeque<f64>> {
    Mutex::new(values.iter().copied().collect())
}
