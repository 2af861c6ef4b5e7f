//! Gap-filling questions derived from the current document.
//!
//! Each rule inspects the document independently and the results are concatenated in a
//! fixed order. Rules run against the document as it is *now*, so an earlier answer can
//! only suppress a later question by filling the field that later rule looks at.

use tracing::debug;

use crate::dialogue::question::{AnswerKind, Choice, CompositeShape, Question, ScalarFormat};
use crate::profile::document::{is_blank_str, ProfileDocument};
use crate::profile::path::{get_str, PathError, ProfilePath};

const PLACEHOLDER_LOCATIONS: &[&str] = &["n/a", "na", "unknown", "tbd", "-", "?", "location", "city", "city, country"];

/// Personal fields in the order they are asked.
const PERSONAL_FIELDS: &[(&str, &str, Option<ScalarFormat>)] = &[
    ("personal.name", "personalInfo.name", None),
    ("personal.email", "personalInfo.email", Some(ScalarFormat::Email)),
    ("personal.location", "personalInfo.location", None),
    ("personal.phone", "personalInfo.phone", None),
];

pub const CURRENT_JOB_YES: &str = "Yes, I still work there";
pub const CURRENT_JOB_NO: &str = "No, it has ended";

pub fn is_placeholder_location(location: Option<&str>) -> bool {
    match location.map(str::trim) {
        None => true,
        Some(l) => l.is_empty() || PLACEHOLDER_LOCATIONS.contains(&l.to_lowercase().as_str()),
    }
}

fn scalar(path: ProfilePath) -> AnswerKind {
    AnswerKind::Scalar { path, format: None }
}

/// True when the string at `path` is absent or blank.
fn is_unset(doc: &ProfileDocument, path: &ProfilePath) -> bool {
    is_blank_str(get_str(doc, path).as_deref())
}

/// Builds the structural queue for `doc`, in rule order.
pub fn structural_questions(doc: &ProfileDocument, min_summary_chars: usize) -> Result<Vec<Question>, PathError> {
    let mut questions = Vec::new();

    for (key, raw, format) in PERSONAL_FIELDS {
        let path = ProfilePath::parse(raw)?;
        if is_unset(doc, &path) {
            questions.push(Question::structural(key, AnswerKind::Scalar { path, format: *format }));
        }
    }

    // A short summary is never complete, whatever else is filled in.
    let summary = ProfilePath::parse("summary")?;
    let summary_len = get_str(doc, &summary).map(|s| s.trim().chars().count()).unwrap_or(0);
    if summary_len < min_summary_chars {
        questions.push(Question::structural("summary", scalar(summary)));
    }

    questions.extend(experience_questions(doc)?);

    if doc.education.is_empty() {
        questions.push(Question::structural(
            "education.add",
            AnswerKind::StructuredComposite {
                path: ProfilePath::parse("education")?,
                shape: CompositeShape::Education,
            },
        ));
    }

    if doc.languages.is_empty() {
        questions.push(Question::structural(
            "languages",
            AnswerKind::DelimitedList {
                path: ProfilePath::parse("languages")?,
                item_field: Some("name".to_string()),
            },
        ));
    }

    debug!(count = questions.len(), "built structural queue");
    Ok(questions)
}

fn experience_questions(doc: &ProfileDocument) -> Result<Vec<Question>, PathError> {
    let mut questions = Vec::new();

    let Some(latest) = doc.experience.first() else {
        questions.push(Question::structural(
            "experience.add",
            AnswerKind::StructuredComposite {
                path: ProfilePath::parse("experience")?,
                shape: CompositeShape::Experience,
            },
        ));
        return Ok(questions);
    };

    // An explicit end date, including "Present", already answers this.
    let end_date = ProfilePath::parse("experience[0].endDate")?;
    if is_unset(doc, &end_date) {
        let mut question = Question::structural("experience.current", scalar(end_date)).with_choices(vec![
            Choice::new(CURRENT_JOB_YES, Some("Present")),
            Choice::new(CURRENT_JOB_NO, None),
        ]);
        question.hint = describe(latest.title.as_deref(), latest.company.as_deref());
        questions.push(question);
    }

    if let Some((index, entry)) = doc
        .experience
        .iter()
        .enumerate()
        .find(|(_, e)| is_placeholder_location(e.location.as_deref()))
    {
        let mut question = Question::structural(
            "experience.location",
            scalar(ProfilePath::parse("experience")?.index(index).key("location")),
        )
        .with_id(format!("structural.experience.location.{index}"));
        question.hint = describe(entry.title.as_deref(), entry.company.as_deref());
        questions.push(question);
    }

    Ok(questions)
}

fn describe(title: Option<&str>, company: Option<&str>) -> Option<String> {
    match (title.filter(|t| !t.trim().is_empty()), company.filter(|c| !c.trim().is_empty())) {
        (Some(t), Some(c)) => Some(format!("{t} at {c}")),
        (Some(t), None) => Some(t.to_string()),
        (None, Some(c)) => Some(c.to_string()),
        (None, None) => None,
    }
}
