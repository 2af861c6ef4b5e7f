// Prompt templates for every collaborator call.
// Placeholders in braces are substituted with `str::replace` before sending.

pub const PARSE_PROMPT: &str = r#"Extract a structured CV profile from the text below.

INPUT TEXT:
{raw_text}

Return a JSON object with EXACTLY these top-level keys, every list present even when empty:
{
  "personalInfo": {"name": null, "email": null, "phone": null, "location": null, "headline": null},
  "summary": null,
  "experience": [{"title": "", "company": "", "location": "", "startDate": "", "endDate": "", "description": "", "highlights": []}],
  "education": [{"institution": "", "degree": "", "field": "", "location": "", "startDate": "", "endDate": ""}],
  "skills": [{"name": "", "level": null}],
  "projects": [{"name": "", "description": "", "url": null, "technologies": []}],
  "links": [{"label": "", "url": ""}],
  "certificates": [{"name": "", "issuer": "", "date": ""}],
  "languages": [{"name": "", "level": null}],
  "references": [{"name": "", "contact": "", "relation": ""}],
  "userAdditions": []
}

Rules:
- Order experience and education most recent first.
- Use "Present" as endDate only when the text says the position is ongoing.
- {no_invention}"#;

pub const PROFILE_TYPE_PROMPT: &str = r#"Classify the person described by this CV profile.

PROFILE JSON:
{profile_json}

Return a JSON object:
{"occupation": "string or null", "sector": "string or null", "seniority": "junior | mid | senior | lead | null"}

Use null for anything the profile does not make clear."#;

pub const SKILL_DETECTION_PROMPT: &str = r#"Read this CV profile and find the ONE skill that most defines the person's work but is missing or unrated in "skills".

PROFILE JSON:
{profile_json}

Return a JSON object:
{"prompt_text": "a single question asking the user to name that skill and rate it (Beginner, Intermediate, Advanced, Expert)"}

If nothing is missing, return {"prompt_text": ""}."#;

pub const SKILL_ASSESSMENT_PROMPT: &str = r#"The person is a {occupation} ({sector}, {seniority}). List the core skills for this occupation that the profile below does not yet rate.

PROFILE JSON:
{profile_json}

Return a JSON array:
[{"key": "camelCaseKey", "name": "Display Name", "question": "How would you rate your ... ?"}]

Return at most 6 skills. Return [] if every core skill is already rated."#;

pub const FOLLOWUP_PROMPT: &str = r#"Write follow-up questions that would let us strengthen this CV profile.

PROFILE JSON:
{profile_json}

ALREADY ASKED (never repeat or rephrase these):
{asked_json}

Return a JSON array of at most {max_count} questions, plus any typo corrections:
[{"id": "string", "text": "question", "category": "impact | leadership | tools | achievements | typo_correction", "hint": "string or null", "isMultipleChoice": false, "choices": []}]

Rules:
- A "typo_correction" question asks whether an apparent misspelling in the profile should be corrected.
- Ask about measurable outcomes, scope and responsibility before anything else."#;

pub const IMPROVE_PROMPT: &str = r#"Improve this CV profile using the user's answers.

PROFILE JSON:
{profile_json}

ANSWERS (question -> answer):
{answers_json}

Return the COMPLETE improved profile as JSON with the same top-level keys as the input.
Rules:
- Merge each answer into the section it belongs to, and remove it from "userAdditions" once merged.
- Tighten wording and fix spelling; keep every entry, date and employer.
- {no_invention}"#;

pub const SCORE_PROMPT: &str = r#"Rate this CV profile for completeness and quality on a 0-100 scale.

PROFILE JSON:
{profile_json}

Return a JSON object:
{"score": 0, "strengths": ["string"], "weaknesses": ["string"], "suggestions": ["string"]}"#;
