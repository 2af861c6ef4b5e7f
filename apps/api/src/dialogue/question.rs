use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::profile::ProfilePath;

/// What the host shows for a question: a stable localisation key or literal text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Prompt {
    Key(String),
    Text(String),
}

impl Prompt {
    /// Literal text, or the English default for a known key.
    pub fn text(&self) -> String {
        match self {
            Prompt::Text(text) => text.clone(),
            Prompt::Key(key) => default_text(key)
                .map(str::to_string)
                .unwrap_or_else(|| key.clone()),
        }
    }
}

fn default_text(key: &str) -> Option<&'static str> {
    Some(match key {
        "personal.name" => "What is your full name?",
        "personal.email" => "What email address should employers use?",
        "personal.location" => "Where are you based (city, country)?",
        "personal.phone" => "What phone number can employers reach you on?",
        "summary" => "Describe your professional profile in two or three sentences.",
        "experience.add" => "Tell us about your most recent job (e.g. \"Engineer at Acme, Berlin, 2019 - 2023\").",
        "experience.current" => "Do you still work in your most recent position?",
        "experience.location" => "Where was this position located?",
        "education.add" => "What is your highest qualification (e.g. \"BSc Computer Science, TU Munich, 2018\")?",
        "languages" => "Which languages do you speak? Separate them with commas.",
        _ => return None,
    })
}

/// Declared answer semantics. Fixed when the question is created; never inferred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerKind {
    /// Overwrite the value at `path`.
    Scalar {
        path: ProfilePath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<ScalarFormat>,
    },
    /// Split the answer on commas/semicolons into a list at `path`, dropping negations.
    /// With `item_field`, each item is written as `{ item_field: token }`.
    DelimitedList {
        path: ProfilePath,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        item_field: Option<String>,
    },
    /// Upsert one skill with a proficiency level into `skills`, matched by key or name.
    SkillRating {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        skill: Option<SkillRef>,
    },
    /// Decompose the answer into a new list item appended at `path`.
    StructuredComposite { path: ProfilePath, shape: CompositeShape },
    /// Appended to `userAdditions` as a question/answer pair.
    Freeform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarFormat {
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositeShape {
    Experience,
    Education,
}

/// The skill a rating question is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRef {
    pub key: String,
    pub name: String,
}

/// A selectable answer. Picking it writes `value`; `None` writes nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Choice {
    pub fn new(label: &str, value: Option<&str>) -> Self {
        Self {
            label: label.to_string(),
            value: value.map(str::to_string),
        }
    }

    /// A choice whose label is also the value written.
    pub fn same(label: &str) -> Self {
        Self::new(label, Some(label))
    }
}

/// Where a question came from. Decides which drain signal it raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
    Structural,
    SkillDetection,
    SkillAssessment,
    AiFollowup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: Prompt,
    pub answer: AnswerKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    pub source: QuestionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Question {
    pub fn new(prompt: Prompt, answer: AnswerKind, source: QuestionSource) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            prompt,
            answer,
            choices: Vec::new(),
            source,
            category: None,
            hint: None,
        }
    }

    /// Structural question with a stable id derived from its prompt key.
    pub fn structural(key: &str, answer: AnswerKind) -> Self {
        Self {
            id: format!("structural.{key}"),
            ..Self::new(Prompt::Key(key.to_string()), answer, QuestionSource::Structural)
        }
    }

    pub fn with_choices(mut self, choices: Vec<Choice>) -> Self {
        self.choices = choices;
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_skill_assessment(&self) -> bool {
        self.source == QuestionSource::SkillAssessment
    }

    pub fn text(&self) -> String {
        self.prompt.text()
    }
}

/// A user's response to the head question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Answer {
    Text(String),
    Skipped,
}

#[cfg(test)]
impl Answer {
    pub fn text(value: impl Into<String>) -> Self {
        Answer::Text(value.into())
    }
}
