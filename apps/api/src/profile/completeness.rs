use serde::{Deserialize, Serialize};

use crate::profile::document::{is_blank_str, ProfileDocument};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Strong,
    Moderate,
    Weak,
    Missing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionHealth {
    pub section: String,
    pub score: f64,
    pub entry_count: usize,
    pub status: SectionStatus,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub overall_score: f64,
    pub sections: Vec<SectionHealth>,
    pub missing_sections: Vec<String>,
}

const SECTION_WEIGHTS: &[(&str, f64)] = &[
    ("personalInfo", 0.20),
    ("summary", 0.10),
    ("experience", 0.30),
    ("education", 0.15),
    ("skills", 0.15),
    ("languages", 0.05),
    ("projects", 0.05),
];

/// Scores how filled-in each weighted section is. Each section scores the fraction of
/// its expected fields that carry content, averaged over entries for list sections.
pub fn compute_completeness_report(doc: &ProfileDocument, min_summary_chars: usize) -> CompletenessReport {
    let mut sections = Vec::new();
    let mut weighted_score_sum = 0.0;
    let mut missing_sections = Vec::new();

    for (section, weight) in SECTION_WEIGHTS {
        let (entry_count, fill_ratios, mut recommendations) = measure(doc, section, min_summary_chars);

        let score = if fill_ratios.is_empty() {
            0.0
        } else {
            (fill_ratios.iter().sum::<f64>() / fill_ratios.len() as f64).clamp(0.0, 1.0)
        };

        let status = match score {
            s if s >= 0.8 => SectionStatus::Strong,
            s if s >= 0.5 => SectionStatus::Moderate,
            s if s > 0.0 => SectionStatus::Weak,
            _ => SectionStatus::Missing,
        };

        if status == SectionStatus::Missing {
            missing_sections.push(section.to_string());
            if recommendations.is_empty() {
                recommendations.push(format!("Add your {section} to complete the profile"));
            }
        }

        weighted_score_sum += score * weight;
        sections.push(SectionHealth {
            section: section.to_string(),
            score,
            entry_count,
            status,
            recommendations,
        });
    }

    let total_weight: f64 = SECTION_WEIGHTS.iter().map(|(_, w)| w).sum();
    let overall_score = if total_weight > 0.0 {
        (weighted_score_sum / total_weight).clamp(0.0, 1.0)
    } else {
        0.0
    };

    CompletenessReport {
        overall_score,
        sections,
        missing_sections,
    }
}

fn filled(fields: &[Option<&str>]) -> f64 {
    let present = fields.iter().filter(|f| !is_blank_str(**f)).count();
    present as f64 / fields.len() as f64
}

fn measure(doc: &ProfileDocument, section: &str, min_summary_chars: usize) -> (usize, Vec<f64>, Vec<String>) {
    let mut recommendations = Vec::new();
    match section {
        "personalInfo" => {
            let p = &doc.personal_info;
            let ratio = filled(&[
                p.name.as_deref(),
                p.email.as_deref(),
                p.phone.as_deref(),
                p.location.as_deref(),
            ]);
            if ratio < 1.0 {
                recommendations.push("Fill in name, email, phone and location".to_string());
            }
            (1, vec![ratio], recommendations)
        }
        "summary" => {
            let len = doc.summary.as_deref().map(|s| s.trim().chars().count()).unwrap_or(0);
            if len == 0 {
                return (0, vec![], recommendations);
            }
            if len < min_summary_chars {
                recommendations.push(format!("Expand the summary to at least {min_summary_chars} characters"));
                (1, vec![0.5], recommendations)
            } else {
                (1, vec![1.0], recommendations)
            }
        }
        "experience" => {
            let ratios: Vec<f64> = doc
                .experience
                .iter()
                .map(|e| {
                    filled(&[
                        e.title.as_deref(),
                        e.company.as_deref(),
                        e.start_date.as_deref(),
                        e.location.as_deref(),
                        e.description.as_deref(),
                    ])
                })
                .collect();
            if ratios.iter().any(|r| *r < 1.0) {
                recommendations.push("Some experience entries lack dates, location or a description".to_string());
            }
            (doc.experience.len(), ratios, recommendations)
        }
        "education" => {
            let ratios = doc
                .education
                .iter()
                .map(|e| filled(&[e.institution.as_deref(), e.degree.as_deref(), e.end_date.as_deref()]))
                .collect();
            (doc.education.len(), ratios, recommendations)
        }
        "skills" => {
            let ratios: Vec<f64> = doc
                .skills
                .iter()
                .map(|s| filled(&[s.name.as_deref(), s.level.as_deref()]))
                .collect();
            if !ratios.is_empty() && ratios.len() < 3 {
                recommendations.push("List at least three skills".to_string());
            }
            (doc.skills.len(), ratios, recommendations)
        }
        "languages" => {
            let ratios = doc
                .languages
                .iter()
                .map(|l| filled(&[l.name.as_deref()]))
                .collect();
            (doc.languages.len(), ratios, recommendations)
        }
        "projects" => {
            let ratios = doc
                .projects
                .iter()
                .map(|p| filled(&[p.name.as_deref(), p.description.as_deref()]))
                .collect();
            (doc.projects.len(), ratios, recommendations)
        }
        _ => (0, vec![], recommendations),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::document::{EducationEntry, ExperienceEntry, LanguageEntry, SkillEntry};

    #[test]
    fn test_empty_document_is_all_missing() {
        let report = compute_completeness_report(&ProfileDocument::default(), 60);
        assert_eq!(report.overall_score, 0.0);
        assert_eq!(report.missing_sections.len(), SECTION_WEIGHTS.len());
        assert!(report.sections.iter().all(|s| s.status == SectionStatus::Missing));
    }

    #[test]
    fn test_short_summary_is_weak_not_missing() {
        let mut doc = ProfileDocument::default();
        doc.summary = Some("Engineer.".to_string());
        let report = compute_completeness_report(&doc, 60);
        let summary = report.sections.iter().find(|s| s.section == "summary").unwrap();
        assert_eq!(summary.status, SectionStatus::Moderate);
        assert!(!summary.recommendations.is_empty());
    }

    #[test]
    fn test_full_document_scores_high() {
        let mut doc = ProfileDocument::default();
        doc.personal_info.name = Some("Ada".into());
        doc.personal_info.email = Some("ada@example.com".into());
        doc.personal_info.phone = Some("+44 1234".into());
        doc.personal_info.location = Some("London".into());
        doc.summary = Some("x".repeat(80));
        doc.experience.push(ExperienceEntry {
            title: Some("Engineer".into()),
            company: Some("Acme".into()),
            start_date: Some("2019".into()),
            location: Some("London".into()),
            description: Some("Built things".into()),
            ..Default::default()
        });
        doc.education.push(EducationEntry {
            institution: Some("UCL".into()),
            degree: Some("BSc".into()),
            end_date: Some("2018".into()),
            ..Default::default()
        });
        for name in ["Rust", "SQL", "Go"] {
            doc.skills.push(SkillEntry {
                name: Some(name.into()),
                level: Some("Advanced".into()),
                ..Default::default()
            });
        }
        doc.languages.push(LanguageEntry {
            name: Some("English".into()),
            ..Default::default()
        });

        let report = compute_completeness_report(&doc, 60);
        // projects missing → 0.95
        assert!((report.overall_score - 0.95).abs() < 1e-9, "score was {}", report.overall_score);
        assert_eq!(report.missing_sections, vec!["projects".to_string()]);
    }
}
