//! Structural diff between two profile snapshots.
//!
//! Both documents are flattened into `path -> leaf value` maps (list items become
//! indexed sub-paths), the union of paths is classified, and paths that are empty on
//! both sides are dropped. The result is a pure function of its inputs: same documents,
//! same entries, same order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::profile::document::{ProfileDocument, SECTIONS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    Added,
    Removed,
    Modified,
}

/// One classified field-level difference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub path: String,
    pub label: String,
    pub section: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub kind: DiffKind,
}

/// Diff entries of one top-level section, for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct DiffGroup {
    pub section: String,
    pub label: String,
    pub changes: Vec<FieldDiff>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffCounts {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
}

/// Computes the field-level delta from `old` to `new`, sorted by label then path with
/// list positions compared as numbers.
pub fn diff(old: &ProfileDocument, new: &ProfileDocument) -> Vec<FieldDiff> {
    let old_flat = flatten_document(old);
    let new_flat = flatten_document(new);

    let paths: BTreeSet<&String> = old_flat.keys().chain(new_flat.keys()).collect();

    let mut changes: Vec<FieldDiff> = paths
        .into_iter()
        .filter_map(|path| {
            let before = old_flat.get(path).filter(|v| !is_empty_value(v));
            let after = new_flat.get(path).filter(|v| !is_empty_value(v));
            let kind = match (before, after) {
                (None, None) => return None,
                (None, Some(_)) => DiffKind::Added,
                (Some(_), None) => DiffKind::Removed,
                (Some(a), Some(b)) if a == b => return None,
                (Some(_), Some(_)) => DiffKind::Modified,
            };
            Some(FieldDiff {
                path: path.clone(),
                label: label_for(path),
                section: section_of(path).to_string(),
                old_value: before.cloned(),
                new_value: after.cloned(),
                kind,
            })
        })
        .collect();

    changes.sort_by(|a, b| {
        natural_key(&a.label)
            .cmp(&natural_key(&b.label))
            .then_with(|| natural_key(&a.path).cmp(&natural_key(&b.path)))
    });
    changes
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Chunk<'a> {
    Number(u64),
    Text(&'a str),
}

/// Splits `s` into digit and non-digit runs so that `#2` sorts before `#10`.
fn natural_key(s: &str) -> Vec<Chunk<'_>> {
    let mut chunks = Vec::new();
    let mut rest = s;
    while let Some(first) = rest.chars().next() {
        let digits = first.is_ascii_digit();
        let end = rest
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(rest.len());
        let (run, tail) = rest.split_at(end);
        chunks.push(match run.parse::<u64>() {
            Ok(n) if digits => Chunk::Number(n),
            _ => Chunk::Text(run),
        });
        rest = tail;
    }
    chunks
}

/// Groups diff entries by top-level section, in document section order.
pub fn group_by_section(changes: &[FieldDiff]) -> Vec<DiffGroup> {
    let mut by_section: BTreeMap<&str, Vec<FieldDiff>> = BTreeMap::new();
    for change in changes {
        by_section
            .entry(change.section.as_str())
            .or_default()
            .push(change.clone());
    }

    let mut groups = Vec::new();
    for section in SECTIONS {
        if let Some(changes) = by_section.remove(section) {
            groups.push(DiffGroup {
                section: section.to_string(),
                label: humanize_key(section),
                changes,
            });
        }
    }
    // Sections outside the known set keep alphabetical order after the known ones.
    for (section, changes) in by_section {
        groups.push(DiffGroup {
            section: section.to_string(),
            label: humanize_key(section),
            changes,
        });
    }
    groups
}

pub fn count_kinds(changes: &[FieldDiff]) -> DiffCounts {
    changes.iter().fold(DiffCounts::default(), |mut acc, c| {
        match c.kind {
            DiffKind::Added => acc.added += 1,
            DiffKind::Removed => acc.removed += 1,
            DiffKind::Modified => acc.modified += 1,
        }
        acc
    })
}

/// A proposed replacement document awaiting the user's accept/reject decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffReview {
    pub before: ProfileDocument,
    pub after: ProfileDocument,
    pub changes: Vec<FieldDiff>,
}

impl DiffReview {
    pub fn new(before: ProfileDocument, after: ProfileDocument) -> Self {
        let changes = diff(&before, &after);
        Self {
            before,
            after,
            changes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn groups(&self) -> Vec<DiffGroup> {
        group_by_section(&self.changes)
    }

    pub fn counts(&self) -> DiffCounts {
        count_kinds(&self.changes)
    }
}

/// Flattens a document into `path -> leaf` pairs. Empty lists and objects are kept as
/// leaves so that a whole section appearing or disappearing is still visible.
pub fn flatten_document(doc: &ProfileDocument) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    if let Ok(Value::Object(root)) = serde_json::to_value(doc) {
        for (key, value) in root {
            flatten_into(&key, value, &mut out);
        }
    }
    out
}

fn flatten_into(prefix: &str, value: Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(&format!("{prefix}.{key}"), child, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, child) in items.into_iter().enumerate() {
                flatten_into(&format!("{prefix}[{i}]"), child, out);
            }
        }
        leaf => {
            out.insert(prefix.to_string(), leaf);
        }
    }
}

/// Null, blank strings, and empty containers carry no content.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.iter().all(is_empty_value),
        Value::Object(map) => map.values().all(is_empty_value),
        _ => false,
    }
}

fn section_of(path: &str) -> &str {
    let end = path.find(['.', '[']).unwrap_or(path.len());
    &path[..end]
}

/// `experience[0].endDate` → `Experience #1 > End Date`
pub fn label_for(path: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    for piece in path.split('.') {
        let (key, indices) = match piece.find('[') {
            Some(i) => (&piece[..i], &piece[i..]),
            None => (piece, ""),
        };
        let mut part = humanize_key(key);
        for index in indices
            .split(['[', ']'])
            .filter_map(|s| s.parse::<usize>().ok())
        {
            part.push_str(&format!(" #{}", index + 1));
        }
        parts.push(part);
    }
    parts.join(" > ")
}

/// `personalInfo` → `Personal Info`
pub fn humanize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, c) in key.chars().enumerate() {
        if i == 0 {
            out.extend(c.to_uppercase());
        } else if c.is_uppercase() {
            out.push(' ');
            out.push(c);
        } else if c == '_' {
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::document::{ExperienceEntry, SkillEntry};
    use crate::profile::path::{self, ProfilePath};
    use proptest::prelude::*;
    use serde_json::json;

    fn sample() -> ProfileDocument {
        let mut doc = ProfileDocument::default();
        doc.personal_info.name = Some("Ada Lovelace".to_string());
        doc.summary = Some("Analyst".to_string());
        doc.experience.push(ExperienceEntry {
            title: Some("Engineer".to_string()),
            company: Some("Acme".to_string()),
            end_date: Some(String::new()),
            ..Default::default()
        });
        doc
    }

    #[test]
    fn test_identical_documents_have_no_diff() {
        assert!(diff(&sample(), &sample()).is_empty());
        assert!(diff(&ProfileDocument::default(), &ProfileDocument::default()).is_empty());
    }

    #[test]
    fn test_classifies_added_removed_modified() {
        let old = sample();
        let mut new = sample();
        new.summary = Some("Mathematician and analyst".to_string());
        new.personal_info.name = None;
        new.experience[0].end_date = Some("2020".to_string());

        let changes = diff(&old, &new);
        let by_path: BTreeMap<_, _> = changes.iter().map(|c| (c.path.as_str(), c)).collect();

        assert_eq!(by_path["summary"].kind, DiffKind::Modified);
        assert_eq!(by_path["personalInfo.name"].kind, DiffKind::Removed);
        assert_eq!(by_path["personalInfo.name"].new_value, None);
        // "" → "2020" is empty → non-empty
        assert_eq!(by_path["experience[0].endDate"].kind, DiffKind::Added);
        assert_eq!(by_path["experience[0].endDate"].old_value, None);
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn test_blank_to_missing_is_not_a_change() {
        let old = sample();
        let mut new = sample();
        new.experience[0].end_date = None;
        assert!(diff(&old, &new).is_empty());
    }

    #[test]
    fn test_new_list_item_fields_are_individually_added() {
        let old = ProfileDocument::default();
        let mut new = ProfileDocument::default();
        new.skills.push(SkillEntry {
            name: Some("Rust".to_string()),
            level: Some("Advanced".to_string()),
            ..Default::default()
        });
        let changes = diff(&old, &new);
        let paths: Vec<_> = changes.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["skills[0].level", "skills[0].name"]);
        assert!(changes.iter().all(|c| c.kind == DiffKind::Added));
        assert_eq!(changes[0].label, "Skills #1 > Level");
    }

    #[test]
    fn test_output_sorted_by_label() {
        let old = ProfileDocument::default();
        let new = sample();
        let changes = diff(&old, &new);
        let labels: Vec<_> = changes.iter().map(|c| c.label.clone()).collect();
        let mut sorted = labels.clone();
        sorted.sort_by(|a, b| natural_key(a).cmp(&natural_key(b)));
        assert_eq!(labels, sorted);
    }

    #[test]
    fn test_list_positions_sort_numerically() {
        let mut new = ProfileDocument::default();
        for i in 0..12 {
            new.experience.push(ExperienceEntry {
                title: Some(format!("Role {i}")),
                ..Default::default()
            });
        }
        let changes = diff(&ProfileDocument::default(), &new);
        let labels: Vec<_> = changes.iter().take(4).map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "Experience #1 > Title",
                "Experience #2 > Title",
                "Experience #3 > Title",
                "Experience #4 > Title",
            ]
        );
        assert_eq!(changes.last().unwrap().label, "Experience #12 > Title");
    }

    #[test]
    fn test_grouping_follows_section_order() {
        let new = sample();
        let groups = group_by_section(&diff(&ProfileDocument::default(), &new));
        let sections: Vec<_> = groups.iter().map(|g| g.section.as_str()).collect();
        assert_eq!(sections, vec!["personalInfo", "summary", "experience"]);
        assert_eq!(groups[0].label, "Personal Info");
    }

    #[test]
    fn test_counts_and_review() {
        let review = DiffReview::new(ProfileDocument::default(), sample());
        let counts = review.counts();
        assert_eq!(counts.added, 4);
        assert_eq!(counts.removed + counts.modified, 0);
        assert!(!review.is_empty());
    }

    #[test]
    fn test_label_for_nested_indices() {
        assert_eq!(label_for("projects[1].technologies[0]"), "Projects #2 > Technologies #1");
        assert_eq!(label_for("userAdditions[0].answer"), "User Additions #1 > Answer");
    }

    #[test]
    fn test_is_empty_value() {
        assert!(is_empty_value(&json!(null)));
        assert!(is_empty_value(&json!("  ")));
        assert!(is_empty_value(&json!([])));
        assert!(is_empty_value(&json!({"a": ""})));
        assert!(!is_empty_value(&json!(0)));
        assert!(!is_empty_value(&json!(false)));
    }

    fn doc_strategy() -> impl Strategy<Value = ProfileDocument> {
        let write = (
            prop_oneof![
                Just("summary".to_string()),
                Just("personalInfo.email".to_string()),
                (0usize..3).prop_map(|i| format!("experience[{i}].title")),
                (0usize..3).prop_map(|i| format!("experience[{i}].endDate")),
                (0usize..2, 0usize..2).prop_map(|(i, j)| format!("projects[{i}].technologies[{j}]")),
                (0usize..2).prop_map(|i| format!("skills[{i}].name")),
            ],
            prop_oneof![Just(String::new()), Just(" ".to_string()), "[a-z]{1,6}"],
        );
        prop::collection::vec(write, 0..8).prop_map(|writes| {
            writes.into_iter().fold(ProfileDocument::default(), |doc, (p, v)| {
                let p = ProfilePath::parse(&p).unwrap();
                path::set(&doc, &p, json!(v)).unwrap()
            })
        })
    }

    proptest! {
        #[test]
        fn prop_diff_is_reflexively_empty(doc in doc_strategy()) {
            prop_assert!(diff(&doc, &doc).is_empty());
        }

        #[test]
        fn prop_never_emits_empty_on_both_sides(old in doc_strategy(), new in doc_strategy()) {
            for change in diff(&old, &new) {
                prop_assert!(change.old_value.is_some() || change.new_value.is_some());
                if let (Some(a), Some(b)) = (&change.old_value, &change.new_value) {
                    prop_assert_ne!(a, b);
                }
            }
        }

        #[test]
        fn prop_diff_is_deterministic(old in doc_strategy(), new in doc_strategy()) {
            prop_assert_eq!(diff(&old, &new), diff(&old, &new));
        }
    }
}
