use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::dialogue::Answer;
use crate::errors::AppError;
use crate::pipeline::{PipelineController, SessionView};
use crate::profile::completeness::{compute_completeness_report, CompletenessReport};
use crate::profile::diff::{DiffCounts, DiffGroup};
use crate::profile::ProfileDocument;
use crate::sessions::lock_now;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    /// Already-extracted CV text. Absent means the user skipped the upload.
    #[serde(default)]
    pub raw_text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub skip: bool,
}

impl AnswerRequest {
    fn into_answer(self) -> Result<Answer, AppError> {
        match (self.skip, self.value) {
            (true, _) => Ok(Answer::Skipped),
            (false, Some(value)) => Ok(Answer::Text(value)),
            (false, None) => Err(AppError::Validation("provide either 'value' or 'skip'".to_string())),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DismissRequest {
    /// Dismiss one notice; all of them when absent.
    #[serde(default)]
    pub id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct ReviewResponse {
    pub counts: DiffCounts,
    pub groups: Vec<DiffGroup>,
}

/// Persists the session. A failed save is logged; the session itself already moved on.
async fn save_draft(state: &AppState, controller: &PipelineController) {
    if let Err(e) = state.drafts.save(&controller.to_draft()).await {
        warn!(session_id = %controller.id(), error = %e, "failed to save draft");
    }
}

/// POST /api/v1/sessions
pub async fn handle_start_session(
    State(state): State<AppState>,
    body: Option<Json<StartSessionRequest>>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let controller = PipelineController::new(Uuid::new_v4(), state.services.clone(), state.settings.clone());
    let session = state.sessions.insert(controller).await?;

    let mut controller = lock_now(&session)?;
    controller.start(req.raw_text).await?;
    save_draft(&state, &controller).await;
    Ok((StatusCode::CREATED, Json(controller.view())))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.sessions.get(id).await?;
    let controller = session.lock().await;
    Ok(Json(controller.view()))
}

/// GET /api/v1/sessions/:id/document
pub async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileDocument>, AppError> {
    let session = state.sessions.get(id).await?;
    let controller = session.lock().await;
    Ok(Json(controller.snapshot().clone()))
}

/// GET /api/v1/sessions/:id/completeness
pub async fn handle_get_completeness(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CompletenessReport>, AppError> {
    let session = state.sessions.get(id).await?;
    let controller = session.lock().await;
    Ok(Json(compute_completeness_report(
        controller.snapshot(),
        state.settings.min_summary_chars,
    )))
}

/// POST /api/v1/sessions/:id/answer
pub async fn handle_submit_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<SessionView>, AppError> {
    let answer = req.into_answer()?;
    let session = state.sessions.get(id).await?;
    let mut controller = lock_now(&session)?;
    controller.submit_answer(answer).await?;
    save_draft(&state, &controller).await;
    Ok(Json(controller.view()))
}

/// GET /api/v1/sessions/:id/review
pub async fn handle_get_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReviewResponse>, AppError> {
    let session = state.sessions.get(id).await?;
    let controller = session.lock().await;
    let review = controller
        .pending_review()
        .ok_or_else(|| AppError::Conflict("no review is pending".to_string()))?;
    Ok(Json(ReviewResponse {
        counts: review.counts(),
        groups: review.groups(),
    }))
}

/// POST /api/v1/sessions/:id/review/accept
pub async fn handle_accept_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.sessions.get(id).await?;
    let mut controller = lock_now(&session)?;
    controller.accept_review().await?;
    save_draft(&state, &controller).await;
    Ok(Json(controller.view()))
}

/// POST /api/v1/sessions/:id/review/reject
pub async fn handle_reject_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.sessions.get(id).await?;
    let mut controller = lock_now(&session)?;
    controller.reject_review().await?;
    save_draft(&state, &controller).await;
    Ok(Json(controller.view()))
}

/// POST /api/v1/sessions/:id/notices/dismiss
pub async fn handle_dismiss_notices(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<DismissRequest>>,
) -> Result<Json<SessionView>, AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let session = state.sessions.get(id).await?;
    let mut controller = lock_now(&session)?;
    match req.id {
        Some(notice_id) => {
            if !controller.dismiss_notice(notice_id) {
                return Err(AppError::NotFound(format!("notice {notice_id}")));
            }
        }
        None => controller.dismiss_all_notices(),
    }
    Ok(Json(controller.view()))
}

/// GET /api/v1/sessions/:id/events
///
/// Server-sent pipeline events. A slow client that falls behind skips the events it
/// missed.
pub async fn handle_session_events(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let session = state.sessions.get(id).await?;
    let events = session.lock().await.subscribe();
    debug!(session_id = %id, "event subscriber attached");

    let stream = BroadcastStream::new(events)
        .filter_map(Result::ok)
        .map(|event| Event::default().json_data(event));
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// POST /api/v1/drafts/:id/resume
///
/// A session that is still live is returned as it is; its draft is only read when the
/// session is gone.
pub async fn handle_resume_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionView>, AppError> {
    if let Some(live) = state.sessions.find(id).await {
        let controller = lock_now(&live)?;
        info!(session_id = %id, phase = %controller.current_phase(), "session still live, draft not loaded");
        return Ok(Json(controller.view()));
    }

    let draft = state
        .drafts
        .load(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("draft {id}")))?;
    info!(session_id = %id, phase = %draft.phase, "rehydrating session from draft");

    let controller = PipelineController::from_draft(draft, state.services.clone(), state.settings.clone());
    let session = state.sessions.insert(controller).await?;
    let mut controller = lock_now(&session)?;
    controller.resume().await?;
    save_draft(&state, &controller).await;
    Ok(Json(controller.view()))
}
