//! Applying one answer to the profile, by declared answer kind.
//!
//! Every function here is pure: it takes the current document and returns the next one.
//! A skipped answer, an empty answer, or a negation ("none", "n/a", ...) never writes.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::dialogue::question::{Answer, AnswerKind, CompositeShape, Question, ScalarFormat, SkillRef};
use crate::profile::document::{ProfileDocument, SkillEntry};
use crate::profile::path::{self, PathError, ProfilePath};

/// A user answer that fails its declared format. The question stays at the head.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("'{value}' is not a valid email address")]
    InvalidEmail { value: String },
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Path(#[from] PathError),
}

const NEGATIONS: &[&str] = &[
    "none", "no", "n/a", "na", "nothing", "nope", "-", "skip", "not applicable", "keine", "aucun",
];

pub const SKILL_LEVELS: &[&str] = &["Beginner", "Intermediate", "Advanced", "Expert"];

const TITLE_COMPANY_SEPARATORS: &[&str] = &[" at ", " @ ", " - ", " – ", " | "];

pub fn is_negation(text: &str) -> bool {
    let t = text.trim().trim_end_matches('.').to_lowercase();
    NEGATIONS.contains(&t.as_str())
}

/// Applies `answer` to `question` against `doc` and returns the resulting document.
pub fn apply_answer(doc: &ProfileDocument, question: &Question, answer: &Answer) -> Result<ProfileDocument, ApplyError> {
    let raw = match answer {
        Answer::Skipped => return Ok(doc.clone()),
        Answer::Text(text) => text.trim(),
    };
    if raw.is_empty() {
        return Ok(doc.clone());
    }

    // A picked choice decides what gets written; a choice without a value writes nothing.
    let text = match question
        .choices
        .iter()
        .find(|c| c.label.eq_ignore_ascii_case(raw))
    {
        Some(choice) => match &choice.value {
            Some(value) => value.clone(),
            None => return Ok(doc.clone()),
        },
        None => raw.to_string(),
    };

    match &question.answer {
        AnswerKind::Scalar { path, format } => apply_scalar(doc, path, *format, &text),
        AnswerKind::DelimitedList { path, item_field } => {
            apply_delimited_list(doc, path, item_field.as_deref(), &text)
        }
        AnswerKind::SkillRating { skill } => apply_skill_rating(doc, skill.as_ref(), &text),
        AnswerKind::StructuredComposite { path, shape } => apply_composite(doc, path, *shape, &text),
        AnswerKind::Freeform => Ok(path::push(
            doc,
            &ProfilePath::parse("userAdditions")?,
            json!({ "question": question.text(), "answer": text }),
        )?),
    }
}

fn apply_scalar(
    doc: &ProfileDocument,
    path: &ProfilePath,
    format: Option<ScalarFormat>,
    text: &str,
) -> Result<ProfileDocument, ApplyError> {
    if let Some(ScalarFormat::Email) = format {
        if !is_valid_email(text) {
            return Err(ValidationError::InvalidEmail {
                value: text.to_string(),
            }
            .into());
        }
    }
    Ok(path::set(doc, path, Value::String(text.to_string()))?)
}

pub fn is_valid_email(text: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]{2,}$").expect("email regex"))
        .is_match(text)
}

/// Splits on commas, semicolons and newlines; drops blanks, negations and repeats.
pub fn split_list(text: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for token in text.split([',', ';', '\n']) {
        let token = token.trim();
        if token.is_empty() || is_negation(token) {
            continue;
        }
        if !items.iter().any(|i| i.eq_ignore_ascii_case(token)) {
            items.push(token.to_string());
        }
    }
    items
}

fn apply_delimited_list(
    doc: &ProfileDocument,
    path: &ProfilePath,
    item_field: Option<&str>,
    text: &str,
) -> Result<ProfileDocument, ApplyError> {
    let items = split_list(text);
    if items.is_empty() {
        return Ok(doc.clone());
    }
    let values = items
        .into_iter()
        .map(|item| match item_field {
            Some(field) => json!({ field: item }),
            None => Value::String(item),
        })
        .collect();
    Ok(path::set(doc, path, Value::Array(values))?)
}

/// `projectManagement` → `Project Management`
pub fn skill_name_from_key(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if i == 0 {
            name.extend(c.to_uppercase());
        } else if c.is_uppercase() {
            name.push(' ');
            name.push(c);
        } else {
            name.push(c);
        }
    }
    name
}

/// `Project Management` → `projectManagement`
pub fn skill_key_from_name(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    for (i, word) in name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .enumerate()
    {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                key.extend(first.to_lowercase());
            } else {
                key.extend(first.to_uppercase());
            }
            key.push_str(chars.as_str());
        }
    }
    key
}

fn canonical_level(level: &str) -> String {
    let level = level.trim().trim_end_matches(')').trim();
    SKILL_LEVELS
        .iter()
        .find(|l| l.eq_ignore_ascii_case(level))
        .map(|l| l.to_string())
        .unwrap_or_else(|| level.to_string())
}

/// Parses "Rust: Advanced", "Rust - Advanced", "Rust (Advanced)" or just "Rust".
fn parse_named_rating(text: &str) -> (SkillRef, Option<String>) {
    let split = [":", " - ", " – ", "("]
        .iter()
        .filter_map(|sep| text.find(sep).map(|i| (i, sep.len())))
        .min_by_key(|(i, _)| *i);

    let (name, level) = match split {
        Some((i, len)) => (text[..i].trim(), Some(canonical_level(&text[i + len..]))),
        None => (text.trim(), None),
    };
    let skill = SkillRef {
        key: skill_key_from_name(name),
        name: name.to_string(),
    };
    (skill, level.filter(|l| !l.is_empty()))
}

fn apply_skill_rating(
    doc: &ProfileDocument,
    skill: Option<&SkillRef>,
    text: &str,
) -> Result<ProfileDocument, ApplyError> {
    if is_negation(text) {
        return Ok(doc.clone());
    }
    let (skill, level) = match skill {
        Some(skill) => (skill.clone(), Some(canonical_level(text))),
        None => parse_named_rating(text),
    };
    if skill.name.trim().is_empty() || level.as_deref().map(is_negation).unwrap_or(false) {
        return Ok(doc.clone());
    }
    Ok(upsert_skill(doc, &skill, level))
}

/// Updates the skill matching by key (or, failing that, by name) or appends a new one.
pub fn upsert_skill(doc: &ProfileDocument, skill: &SkillRef, level: Option<String>) -> ProfileDocument {
    let mut next = doc.clone();
    let existing = next.skills.iter_mut().find(|s| {
        s.key.as_deref() == Some(skill.key.as_str())
            || s.name
                .as_deref()
                .map(|n| n.trim().eq_ignore_ascii_case(skill.name.trim()))
                .unwrap_or(false)
    });
    match existing {
        Some(entry) => {
            if level.is_some() {
                entry.level = level;
            }
            entry.key.get_or_insert_with(|| skill.key.clone());
            entry.name.get_or_insert_with(|| skill.name.clone());
        }
        None => next.skills.push(SkillEntry {
            name: Some(skill.name.clone()),
            level,
            key: Some(skill.key.clone()),
            ..Default::default()
        }),
    }
    next
}

fn apply_composite(
    doc: &ProfileDocument,
    path: &ProfilePath,
    shape: CompositeShape,
    text: &str,
) -> Result<ProfileDocument, ApplyError> {
    if is_negation(text) {
        return Ok(doc.clone());
    }
    let item = match shape {
        CompositeShape::Experience => parse_experience(text),
        CompositeShape::Education => parse_education(text),
    };
    if item.is_empty() {
        return Ok(doc.clone());
    }
    Ok(path::push(doc, path, Value::Object(item))?)
}

struct DateRange {
    start: Option<String>,
    end: Option<String>,
}

fn parse_date_segment(segment: &str) -> Option<DateRange> {
    static RANGE: OnceLock<Regex> = OnceLock::new();
    static SINGLE: OnceLock<Regex> = OnceLock::new();
    const DATE: &str = r"(?:[A-Za-z]{3,9}\.?\s+)?\d{4}|\d{1,2}/\d{4}";

    let range = RANGE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)^(?P<start>{DATE})\s*(?:-|–|to|until)\s*(?P<end>{DATE}|present|now|current|today)$"
        ))
        .expect("date range regex")
    });
    let single = SINGLE.get_or_init(|| Regex::new(&format!(r"^(?:{DATE})$")).expect("date regex"));

    let segment = segment.trim();
    if let Some(caps) = range.captures(segment) {
        let end = caps["end"].to_string();
        let end = if matches!(end.to_lowercase().as_str(), "present" | "now" | "current" | "today") {
            "Present".to_string()
        } else {
            end
        };
        return Some(DateRange {
            start: Some(caps["start"].to_string()),
            end: Some(end),
        });
    }
    single.is_match(segment).then(|| DateRange {
        start: None,
        end: Some(segment.to_string()),
    })
}

fn split_pair<'a>(text: &'a str, separators: &[&str]) -> Option<(&'a str, &'a str)> {
    let lower = text.to_ascii_lowercase();
    separators
        .iter()
        .filter_map(|sep| lower.find(sep).map(|i| (i, sep.len())))
        .min_by_key(|(i, _)| *i)
        .map(|(i, len)| (text[..i].trim(), text[i + len..].trim()))
        .filter(|(a, b)| !a.is_empty() && !b.is_empty())
}

fn put(item: &mut Map<String, Value>, key: &str, value: &str) {
    if !value.trim().is_empty() && !item.contains_key(key) {
        item.insert(key.to_string(), Value::String(value.trim().to_string()));
    }
}

/// "Engineer at Acme, Berlin, 2019 - 2023" → title, company, location, startDate, endDate.
///
/// The first comma segment holds the title, optionally followed by the company after
/// " at ", " @ ", " - " or " | ". Later segments fill, in order: a date range (or a single
/// start year), the company if still unknown, then the location.
pub fn parse_experience(text: &str) -> Map<String, Value> {
    let mut item = Map::new();
    let mut segments = text.split(',').map(str::trim).filter(|s| !s.is_empty());

    if let Some(first) = segments.next() {
        match split_pair(first, TITLE_COMPANY_SEPARATORS) {
            Some((title, company)) => {
                put(&mut item, "title", title);
                put(&mut item, "company", company);
            }
            None => put(&mut item, "title", first),
        }
    }

    for segment in segments {
        if let Some(range) = parse_date_segment(segment) {
            match range.start {
                Some(start) => {
                    put(&mut item, "startDate", &start);
                    put(&mut item, "endDate", range.end.as_deref().unwrap_or_default());
                }
                None => put(&mut item, "startDate", range.end.as_deref().unwrap_or_default()),
            }
        } else if !item.contains_key("company") {
            put(&mut item, "company", segment);
        } else {
            put(&mut item, "location", segment);
        }
    }
    item
}

/// "MSc in Physics, ETH Zurich, Zurich, 2016 - 2018" → degree, field, institution, location, dates.
///
/// The first segment is the degree, split into degree and field on " in ", or into degree
/// and institution on " at "/" - ". Later segments fill a date range (a single year is the
/// graduation date), the institution if still unknown, then the location.
pub fn parse_education(text: &str) -> Map<String, Value> {
    let mut item = Map::new();
    let mut segments = text.split(',').map(str::trim).filter(|s| !s.is_empty());

    if let Some(first) = segments.next() {
        let (degree, institution) = match split_pair(first, &[" at ", " - ", " @ "]) {
            Some((d, i)) => (d, Some(i)),
            None => (first, None),
        };
        match split_pair(degree, &[" in "]) {
            Some((d, field)) => {
                put(&mut item, "degree", d);
                put(&mut item, "field", field);
            }
            None => put(&mut item, "degree", degree),
        }
        if let Some(institution) = institution {
            put(&mut item, "institution", institution);
        }
    }

    for segment in segments {
        if let Some(range) = parse_date_segment(segment) {
            if let Some(start) = range.start {
                put(&mut item, "startDate", &start);
            }
            put(&mut item, "endDate", range.end.as_deref().unwrap_or_default());
        } else if !item.contains_key("institution") {
            put(&mut item, "institution", segment);
        } else {
            put(&mut item, "location", segment);
        }
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::question::{Choice, QuestionSource};

    fn path(raw: &str) -> ProfilePath {
        ProfilePath::parse(raw).unwrap()
    }

    fn question(kind: AnswerKind) -> Question {
        Question::structural("test", kind)
    }

    #[test]
    fn test_delimited_list_filters_negations_and_keeps_order() {
        let q = question(AnswerKind::DelimitedList {
            path: path("projects[0].technologies"),
            item_field: None,
        });
        let doc = apply_answer(&ProfileDocument::default(), &q, &Answer::text("Python, SQL, none")).unwrap();
        assert_eq!(doc.projects[0].technologies, vec!["Python", "SQL"]);
    }

    #[test]
    fn test_delimited_list_with_item_field() {
        let q = question(AnswerKind::DelimitedList {
            path: path("languages"),
            item_field: Some("name".into()),
        });
        let doc = apply_answer(&ProfileDocument::default(), &q, &Answer::text("English; German\nenglish")).unwrap();
        let names: Vec<_> = doc.languages.iter().map(|l| l.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["English", "German"]);
    }

    #[test]
    fn test_only_negations_writes_nothing() {
        let q = question(AnswerKind::DelimitedList {
            path: path("languages"),
            item_field: Some("name".into()),
        });
        let doc = apply_answer(&ProfileDocument::default(), &q, &Answer::text("None")).unwrap();
        assert!(doc.languages.is_empty());
    }

    #[test]
    fn test_invalid_email_is_rejected_without_mutation() {
        let q = question(AnswerKind::Scalar {
            path: path("personalInfo.email"),
            format: Some(ScalarFormat::Email),
        });
        let err = apply_answer(&ProfileDocument::default(), &q, &Answer::text("ada@nowhere")).unwrap_err();
        assert!(matches!(err, ApplyError::Validation(ValidationError::InvalidEmail { .. })));

        let doc = apply_answer(&ProfileDocument::default(), &q, &Answer::text(" ada@example.com ")).unwrap();
        assert_eq!(doc.personal_info.email.as_deref(), Some("ada@example.com"));
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_valid_email("a.b+c@mail.example.org"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("ada@example.c"));
    }

    #[test]
    fn test_skipped_answer_never_writes() {
        let q = question(AnswerKind::Scalar {
            path: path("personalInfo.name"),
            format: None,
        });
        let doc = apply_answer(&ProfileDocument::default(), &q, &Answer::Skipped).unwrap();
        assert!(doc.is_blank());

        let free = Question::new(
            crate::dialogue::question::Prompt::Text("Anything else?".into()),
            AnswerKind::Freeform,
            QuestionSource::AiFollowup,
        );
        let doc = apply_answer(&ProfileDocument::default(), &free, &Answer::Skipped).unwrap();
        assert!(doc.user_additions.is_empty());
    }

    #[test]
    fn test_freeform_appends_question_answer_pair() {
        let free = Question::new(
            crate::dialogue::question::Prompt::Text("Any volunteering?".into()),
            AnswerKind::Freeform,
            QuestionSource::AiFollowup,
        );
        let doc = apply_answer(&ProfileDocument::default(), &free, &Answer::text("Red Cross, 2 years")).unwrap();
        assert_eq!(doc.user_additions.len(), 1);
        assert_eq!(doc.user_additions[0].question, "Any volunteering?");
        assert_eq!(doc.user_additions[0].answer, "Red Cross, 2 years");
    }

    #[test]
    fn test_choice_maps_to_value() {
        let q = question(AnswerKind::Scalar {
            path: path("experience[0].endDate"),
            format: None,
        })
        .with_choices(vec![
            Choice::new("Yes", Some("Present")),
            Choice::new("No", None),
        ]);
        let doc = apply_answer(&ProfileDocument::default(), &q, &Answer::text("yes")).unwrap();
        assert_eq!(doc.experience[0].end_date.as_deref(), Some("Present"));

        let doc = apply_answer(&ProfileDocument::default(), &q, &Answer::text("No")).unwrap();
        assert!(doc.experience.is_empty());

        let doc = apply_answer(&ProfileDocument::default(), &q, &Answer::text("2021")).unwrap();
        assert_eq!(doc.experience[0].end_date.as_deref(), Some("2021"));
    }

    #[test]
    fn test_skill_assessment_none_does_not_insert() {
        let q = question(AnswerKind::SkillRating {
            skill: Some(SkillRef {
                key: "projectManagement".into(),
                name: skill_name_from_key("projectManagement"),
            }),
        });
        let doc = apply_answer(&ProfileDocument::default(), &q, &Answer::text("none")).unwrap();
        assert!(doc.skills.is_empty());
    }

    #[test]
    fn test_skill_assessment_upserts_by_key() {
        let q = question(AnswerKind::SkillRating {
            skill: Some(SkillRef {
                key: "projectManagement".into(),
                name: skill_name_from_key("projectManagement"),
            }),
        });
        let doc = apply_answer(&ProfileDocument::default(), &q, &Answer::text("Advanced")).unwrap();
        assert_eq!(
            doc.skills,
            vec![SkillEntry {
                name: Some("Project Management".into()),
                level: Some("Advanced".into()),
                key: Some("projectManagement".into()),
                ..Default::default()
            }]
        );

        let doc = apply_answer(&doc, &q, &Answer::text("expert")).unwrap();
        assert_eq!(doc.skills.len(), 1);
        assert_eq!(doc.skills[0].level.as_deref(), Some("Expert"));
    }

    #[test]
    fn test_skill_rating_matches_existing_name() {
        let mut doc = ProfileDocument::default();
        doc.skills.push(SkillEntry {
            name: Some("rust".into()),
            ..Default::default()
        });
        let q = question(AnswerKind::SkillRating { skill: None });
        let doc = apply_answer(&doc, &q, &Answer::text("Rust: intermediate")).unwrap();
        assert_eq!(doc.skills.len(), 1);
        assert_eq!(doc.skills[0].level.as_deref(), Some("Intermediate"));
        assert_eq!(doc.skills[0].key.as_deref(), Some("rust"));
    }

    #[test]
    fn test_named_rating_formats() {
        let (skill, level) = parse_named_rating("Machine Learning (Advanced)");
        assert_eq!(skill.key, "machineLearning");
        assert_eq!(level.as_deref(), Some("Advanced"));

        let (skill, level) = parse_named_rating("Docker");
        assert_eq!(skill.name, "Docker");
        assert_eq!(level, None);
    }

    #[test]
    fn test_key_name_conversions() {
        assert_eq!(skill_name_from_key("projectManagement"), "Project Management");
        assert_eq!(skill_key_from_name("Project Management"), "projectManagement");
        assert_eq!(skill_key_from_name("C++ / Qt"), "cQt");
    }

    #[test]
    fn test_parse_experience_title_at_company() {
        let item = parse_experience("Engineer at Acme, Berlin, 2019 - present");
        assert_eq!(item["title"], "Engineer");
        assert_eq!(item["company"], "Acme");
        assert_eq!(item["location"], "Berlin");
        assert_eq!(item["startDate"], "2019");
        assert_eq!(item["endDate"], "Present");
    }

    #[test]
    fn test_parse_experience_dash_separator() {
        let item = parse_experience("Engineer - Acme");
        assert_eq!(item["title"], "Engineer");
        assert_eq!(item["company"], "Acme");
        assert!(!item.contains_key("location"));
    }

    #[test]
    fn test_parse_experience_comma_company_and_single_year() {
        let item = parse_experience("Nurse, St Mary's Hospital, 2015");
        assert_eq!(item["title"], "Nurse");
        assert_eq!(item["company"], "St Mary's Hospital");
        assert_eq!(item["startDate"], "2015");
        assert!(!item.contains_key("endDate"));
    }

    #[test]
    fn test_parse_education() {
        let item = parse_education("MSc in Physics, ETH Zurich, Zurich, Sep 2016 - Jul 2018");
        assert_eq!(item["degree"], "MSc");
        assert_eq!(item["field"], "Physics");
        assert_eq!(item["institution"], "ETH Zurich");
        assert_eq!(item["location"], "Zurich");
        assert_eq!(item["startDate"], "Sep 2016");
        assert_eq!(item["endDate"], "Jul 2018");

        let item = parse_education("BSc Computer Science, TU Munich, 2018");
        assert_eq!(item["degree"], "BSc Computer Science");
        assert_eq!(item["endDate"], "2018");
    }

    #[test]
    fn test_composite_appends_new_entry() {
        let q = question(AnswerKind::StructuredComposite {
            path: path("experience"),
            shape: CompositeShape::Experience,
        });
        let doc = apply_answer(&ProfileDocument::default(), &q, &Answer::text("Engineer at Acme")).unwrap();
        assert_eq!(doc.experience.len(), 1);
        assert_eq!(doc.experience[0].company.as_deref(), Some("Acme"));

        let doc = apply_answer(&doc, &q, &Answer::text("none")).unwrap();
        assert_eq!(doc.experience.len(), 1);
    }
}
