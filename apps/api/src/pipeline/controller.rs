//! Pipeline Controller — the single owner of a session's profile document.
//!
//! The controller runs phases until one needs user input (a question or a pending
//! review), then returns. Each entry point (`start`, `submit_answer`, `accept_review`,
//! `reject_review`, `resume`) picks up from there. Callers serialise access with one
//! mutex per session, so only one phase-advancing call is ever in flight.
//!
//! Collaborator failures never stop the pipeline: the phase that needed the call
//! falls back (empty queue, unknown type, unchanged document), a notice is recorded
//! and the pipeline moves on.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collaborators::{CollaboratorError, ProfileServices, ProfileType, ScoreReport};
use crate::dialogue::answers::ValidationError;
use crate::dialogue::orchestrator::{DrainSignal, QueueStage, QuestionOrchestrator, SubmitError};
use crate::dialogue::question::{Answer, Question};
use crate::pipeline::draft::{Draft, DraftExtras};
use crate::pipeline::phase::{Phase, PhaseMachine, TransitionError};
use crate::pipeline::PipelineSettings;
use crate::profile::diff::{DiffCounts, DiffReview};
use crate::profile::document::ProfileDocument;
use crate::profile::path::PathError;

const EVENT_CAPACITY: usize = 64;

// ────────────────────────────────────────────────────────────────────────────
// Errors, events, notices
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no question is waiting for an answer")]
    NoActiveQuestion,

    #[error("no review is pending")]
    NoPendingReview,

    #[error("session has already started")]
    AlreadyStarted,

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl From<PathError> for PipelineError {
    fn from(err: PathError) -> Self {
        PipelineError::InvariantViolation(err.to_string())
    }
}

impl From<SubmitError> for PipelineError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::NoActiveQuestion => PipelineError::NoActiveQuestion,
            SubmitError::Validation(e) => PipelineError::Validation(e),
            SubmitError::InvalidPath(e) => e.into(),
        }
    }
}

/// A dismissible warning shown to the user, e.g. after a collaborator fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub id: Uuid,
    pub service: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    PhaseChanged { from: Phase, to: Phase },
    QuestionReady { question_id: String },
    ReviewPending { counts: DiffCounts },
    Notice { notice: Notice },
    Completed,
}

/// What the host needs to render the session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub phase: Phase,
    pub completed: bool,
    pub question: Option<QuestionView>,
    pub pending_questions: usize,
    pub review: Option<DiffCounts>,
    pub notices: Vec<Notice>,
    pub score: Option<ScoreReport>,
    pub profile_type: Option<ProfileType>,
    pub improve_loops: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    #[serde(flatten)]
    pub question: Question,
    pub text: String,
    pub is_skill_assessment: bool,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        Self {
            text: question.text(),
            is_skill_assessment: question.is_skill_assessment(),
            question: question.clone(),
        }
    }
}

/// Outcome of entering a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Run the current phase's entry action.
    Enter,
    /// Move to the next phase.
    Next,
    /// Score below threshold: loop back for more questions.
    Reenter,
    /// Stop until the user acts.
    AwaitInput,
}

/// The queue stage that asks questions during `phase`.
fn queue_stage(phase: Phase) -> Option<QueueStage> {
    match phase {
        Phase::StructuralFollowups => Some(QueueStage::Structural),
        Phase::SkillAssessment => Some(QueueStage::SkillAssessment),
        Phase::SectorFollowups => Some(QueueStage::AiFollowup),
        _ => None,
    }
}

async fn with_timeout<T>(
    service: &'static str,
    limit: Duration,
    call: impl Future<Output = Result<T, CollaboratorError>>,
) -> Result<T, CollaboratorError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout {
            service,
            secs: limit.as_secs(),
        }),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Controller
// ────────────────────────────────────────────────────────────────────────────

pub struct PipelineController {
    id: Uuid,
    services: Arc<dyn ProfileServices>,
    settings: PipelineSettings,
    machine: PhaseMachine,
    document: ProfileDocument,
    orchestrator: QuestionOrchestrator,
    raw_text: Option<String>,
    profile_type: Option<ProfileType>,
    review: Option<DiffReview>,
    last_score: Option<ScoreReport>,
    notices: Vec<Notice>,
    started: bool,
    events: broadcast::Sender<PipelineEvent>,
}

impl PipelineController {
    pub fn new(id: Uuid, services: Arc<dyn ProfileServices>, settings: PipelineSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            id,
            machine: PhaseMachine::new(settings.max_improve_loops),
            services,
            settings,
            document: ProfileDocument::default(),
            orchestrator: QuestionOrchestrator::new(),
            raw_text: None,
            profile_type: None,
            review: None,
            last_score: None,
            notices: Vec::new(),
            started: false,
            events,
        }
    }

    /// Rebuilds a controller at the draft's phase with the draft's document, pending
    /// questions and pending review. Call `resume` afterwards.
    pub fn from_draft(draft: Draft, services: Arc<dyn ProfileServices>, settings: PipelineSettings) -> Self {
        let mut controller = Self::new(draft.id, services, settings);
        let extras = draft.extras;
        controller.machine =
            PhaseMachine::resume_at(draft.phase, extras.improve_loops, controller.settings.max_improve_loops);
        controller.document = draft.document;
        controller.orchestrator = extras.queue;
        controller.review = extras.pending_review;
        controller.profile_type = extras.profile_type;
        controller.last_score = extras.last_score;
        controller
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn current_phase(&self) -> Phase {
        self.machine.current()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.orchestrator.current()
    }

    /// Read-only view of the canonical document.
    pub fn snapshot(&self) -> &ProfileDocument {
        &self.document
    }

    pub fn pending_review(&self) -> Option<&DiffReview> {
        self.review.as_ref()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            id: self.id,
            phase: self.current_phase(),
            completed: self.current_phase().is_terminal(),
            question: self.current_question().map(QuestionView::from),
            pending_questions: self.orchestrator.pending(),
            review: self.review.as_ref().map(DiffReview::counts),
            notices: self.notices().to_vec(),
            score: self.last_score.clone(),
            profile_type: self.profile_type.clone(),
            improve_loops: self.machine.improve_loops(),
        }
    }

    pub fn to_draft(&self) -> Draft {
        Draft {
            id: self.id,
            document: self.document.clone(),
            phase: self.current_phase(),
            extras: DraftExtras {
                profile_type: self.profile_type.clone(),
                improve_loops: self.machine.improve_loops(),
                queue: self.orchestrator.clone(),
                pending_review: self.review.clone(),
                last_score: self.last_score.clone(),
            },
            saved_at: Utc::now(),
        }
    }

    /// Starts the pipeline. `None` skips the upload and begins with an empty profile.
    pub async fn start(&mut self, raw_text: Option<String>) -> Result<(), PipelineError> {
        if self.started {
            return Err(PipelineError::AlreadyStarted);
        }
        self.started = true;
        self.raw_text = raw_text;
        info!(session_id = %self.id, upload = self.raw_text.is_some(), "pipeline started");
        self.drive(Step::Enter).await
    }

    /// Continues after rehydration. A restored question queue or review is shown as
    /// it was saved; only a phase with nothing pending is entered again.
    pub async fn resume(&mut self) -> Result<(), PipelineError> {
        self.started = true;
        let phase = self.current_phase();
        info!(session_id = %self.id, %phase, "pipeline resumed from draft");

        if phase.is_terminal() || (phase == Phase::Polish && self.review.is_some()) {
            return Ok(());
        }
        if self.orchestrator.current().is_some() && Some(self.orchestrator.stage()) == queue_stage(phase) {
            debug!(session_id = %self.id, pending = self.orchestrator.pending(), "restored question queue");
            self.announce_question();
            return Ok(());
        }
        self.drive(Step::Enter).await
    }

    /// Applies `answer` to the head question. Answers are applied strictly in
    /// submission order; a validation error leaves the question and document as is.
    pub async fn submit_answer(&mut self, answer: Answer) -> Result<(), PipelineError> {
        let submission = self.orchestrator.submit(&self.document, &answer)?;
        self.document = submission.document;

        let Some(signal) = submission.drained else {
            self.announce_question();
            return Ok(());
        };

        let expected = match signal {
            DrainSignal::StructuralDone => Phase::StructuralFollowups,
            DrainSignal::SkillAssessmentDone => Phase::SkillAssessment,
            DrainSignal::AiFollowupDone => Phase::SectorFollowups,
        };
        if self.current_phase() != expected {
            return Err(PipelineError::InvariantViolation(format!(
                "{signal:?} raised during phase '{}'",
                self.current_phase()
            )));
        }
        self.drive(Step::Next).await
    }

    /// Makes the pending improve result canonical, replacing the whole document.
    pub async fn accept_review(&mut self) -> Result<(), PipelineError> {
        let review = self.review.take().ok_or(PipelineError::NoPendingReview)?;
        info!(session_id = %self.id, changes = review.changes.len(), "review accepted");
        self.document = review.after;
        let step = self.score_and_route().await;
        self.drive(step).await
    }

    /// Discards the pending improve result; the document stays as it was.
    pub async fn reject_review(&mut self) -> Result<(), PipelineError> {
        let review = self.review.take().ok_or(PipelineError::NoPendingReview)?;
        info!(session_id = %self.id, changes = review.changes.len(), "review rejected");
        let step = self.score_and_route().await;
        self.drive(step).await
    }

    pub fn dismiss_notice(&mut self, id: Uuid) -> bool {
        let before = self.notices.len();
        self.notices.retain(|n| n.id != id);
        self.notices.len() != before
    }

    pub fn dismiss_all_notices(&mut self) {
        self.notices.clear();
    }

    // ── Phase sequencing ────────────────────────────────────────────────────

    async fn drive(&mut self, mut step: Step) -> Result<(), PipelineError> {
        loop {
            match step {
                Step::AwaitInput => return Ok(()),
                Step::Enter => {}
                Step::Next => {
                    let from = self.current_phase();
                    let to = self.machine.next()?;
                    self.phase_changed(from, to);
                }
                Step::Reenter => {
                    let from = self.current_phase();
                    let to = self.machine.reenter_for_improvement()?;
                    self.phase_changed(from, to);
                }
            }
            step = self.enter_phase().await?;
        }
    }

    async fn enter_phase(&mut self) -> Result<Step, PipelineError> {
        match self.current_phase() {
            Phase::Source => {
                if self.raw_text.is_some() {
                    return Ok(Step::Next);
                }
                let from = self.current_phase();
                let to = self.machine.skip_upload()?;
                self.phase_changed(from, to);
                Ok(Step::Enter)
            }
            Phase::Parse => {
                self.parse().await;
                Ok(Step::Next)
            }
            Phase::DetectType => {
                self.detect_type().await;
                Ok(Step::Next)
            }
            Phase::StructuralFollowups => self.load_structural().await,
            Phase::SkillAssessment => self.load_skill_assessment().await,
            Phase::SectorFollowups => self.load_followups().await,
            Phase::Polish => self.polish().await,
            Phase::Render => {
                info!(session_id = %self.id, "pipeline completed");
                self.emit(PipelineEvent::Completed);
                Ok(Step::AwaitInput)
            }
        }
    }

    async fn parse(&mut self) {
        let raw_text = self.raw_text.take().unwrap_or_default();
        if raw_text.trim().is_empty() {
            debug!(session_id = %self.id, "empty upload, starting from an empty profile");
            return;
        }
        let limit = self.settings.collaborator_timeout;
        match with_timeout("parse", limit, self.services.parse_profile(&raw_text)).await {
            Ok(document) => self.document = document,
            Err(e) => self.fallback(e),
        }
    }

    async fn detect_type(&mut self) {
        let limit = self.settings.collaborator_timeout;
        match with_timeout("profile-type", limit, self.services.detect_profile_type(&self.document)).await {
            Ok(profile_type) => {
                info!(session_id = %self.id, occupation = ?profile_type.occupation(), "profile type detected");
                self.profile_type = Some(profile_type);
            }
            Err(e) => self.fallback(e),
        }
    }

    async fn load_structural(&mut self) -> Result<Step, PipelineError> {
        let limit = self.settings.collaborator_timeout;
        let skill_question = match with_timeout("skill-detection", limit, self.services.detect_skill(&self.document)).await
        {
            Ok(found) => found.and_then(|q| q.into_question()),
            Err(e) => {
                self.fallback(e);
                None
            }
        };
        let drained = self.orchestrator.load_structural(
            &self.document,
            skill_question,
            self.settings.min_summary_chars,
        )?;
        Ok(self.after_load(drained))
    }

    async fn load_skill_assessment(&mut self) -> Result<Step, PipelineError> {
        let Some(profile_type) = self
            .profile_type
            .clone()
            .filter(|t| t.occupation().is_some())
        else {
            debug!(session_id = %self.id, "no occupation detected, skipping skill assessment");
            let drained = self.orchestrator.load_skill_assessment(Vec::new());
            return Ok(self.after_load(drained));
        };

        let limit = self.settings.collaborator_timeout;
        let questions = match with_timeout(
            "skill-assessment",
            limit,
            self.services.skill_assessment(&self.document, &profile_type),
        )
        .await
        {
            Ok(items) => items.into_iter().map(|item| item.into_question()).collect(),
            Err(e) => {
                self.fallback(e);
                Vec::new()
            }
        };
        let drained = self.orchestrator.load_skill_assessment(questions);
        Ok(self.after_load(drained))
    }

    async fn load_followups(&mut self) -> Result<Step, PipelineError> {
        let cap = if self.machine.improve_loops() > 0 {
            self.settings.loop_question_cap
        } else {
            self.settings.ai_question_cap
        };
        let asked = self.orchestrator.asked_texts().to_vec();
        let limit = self.settings.collaborator_timeout;
        let questions = match with_timeout(
            "follow-up",
            limit,
            self.services.followup_questions(&self.document, &asked, cap),
        )
        .await
        {
            Ok(generated) => generated.into_iter().filter_map(|g| g.into_question()).collect(),
            Err(e) => {
                self.fallback(e);
                Vec::new()
            }
        };
        let drained = self.orchestrator.load_ai_followups(questions, cap);
        Ok(self.after_load(drained))
    }

    /// Calls improve against a snapshot taken right before the call. A non-empty
    /// diff waits for review; an improve failure leaves the document untouched and
    /// goes straight to render.
    async fn polish(&mut self) -> Result<Step, PipelineError> {
        if self.review.is_some() {
            return Ok(Step::AwaitInput);
        }
        let answers = self.orchestrator.take_collected();
        let before = self.document.clone();
        let limit = self.settings.collaborator_timeout;
        let after = match with_timeout("improve", limit, self.services.improve(&before, &answers)).await {
            Ok(after) => after,
            Err(e) => {
                self.fallback(e);
                return Ok(Step::Next);
            }
        };

        let review = DiffReview::new(before, after);
        if review.is_empty() {
            debug!(session_id = %self.id, "improve proposed no changes");
            return Ok(self.score_and_route().await);
        }
        let counts = review.counts();
        info!(
            session_id = %self.id,
            added = counts.added,
            removed = counts.removed,
            modified = counts.modified,
            "improve result awaiting review"
        );
        self.review = Some(review);
        self.emit(PipelineEvent::ReviewPending { counts });
        Ok(Step::AwaitInput)
    }

    async fn score_and_route(&mut self) -> Step {
        let limit = self.settings.collaborator_timeout;
        match with_timeout("scoring", limit, self.services.score(&self.document)).await {
            Ok(report) => {
                let below = report.score < self.settings.improve_score_threshold;
                info!(session_id = %self.id, score = report.score, loops = self.machine.improve_loops(), "profile scored");
                self.last_score = Some(report);
                if below && self.machine.can_reenter() {
                    Step::Reenter
                } else {
                    Step::Next
                }
            }
            Err(e) => {
                self.fallback(e);
                Step::Next
            }
        }
    }

    fn after_load(&mut self, drained: Option<DrainSignal>) -> Step {
        match drained {
            Some(_) => Step::Next,
            None => {
                self.announce_question();
                Step::AwaitInput
            }
        }
    }

    // ── Events and notices ──────────────────────────────────────────────────

    fn fallback(&mut self, err: CollaboratorError) {
        warn!(session_id = %self.id, phase = %self.current_phase(), error = %err, "collaborator failed, continuing");
        let notice = Notice {
            id: Uuid::new_v4(),
            service: err.service().to_string(),
            message: err.to_string(),
            created_at: Utc::now(),
        };
        self.notices.push(notice.clone());
        self.emit(PipelineEvent::Notice { notice });
    }

    fn phase_changed(&mut self, from: Phase, to: Phase) {
        info!(session_id = %self.id, %from, %to, "phase changed");
        self.emit(PipelineEvent::PhaseChanged { from, to });
    }

    fn announce_question(&self) {
        if let Some(question) = self.orchestrator.current() {
            self.emit(PipelineEvent::QuestionReady {
                question_id: question.id.clone(),
            });
        }
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
