pub mod health;
pub mod sessions;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Session API
        .route("/api/v1/sessions", post(sessions::handle_start_session))
        .route("/api/v1/sessions/:id", get(sessions::handle_get_session))
        .route(
            "/api/v1/sessions/:id/document",
            get(sessions::handle_get_document),
        )
        .route(
            "/api/v1/sessions/:id/completeness",
            get(sessions::handle_get_completeness),
        )
        .route(
            "/api/v1/sessions/:id/answer",
            post(sessions::handle_submit_answer),
        )
        .route("/api/v1/sessions/:id/review", get(sessions::handle_get_review))
        .route(
            "/api/v1/sessions/:id/review/accept",
            post(sessions::handle_accept_review),
        )
        .route(
            "/api/v1/sessions/:id/review/reject",
            post(sessions::handle_reject_review),
        )
        .route(
            "/api/v1/sessions/:id/notices/dismiss",
            post(sessions::handle_dismiss_notices),
        )
        .route(
            "/api/v1/sessions/:id/events",
            get(sessions::handle_session_events),
        )
        // Drafts
        .route(
            "/api/v1/drafts/:id/resume",
            post(sessions::handle_resume_draft),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::collaborators::fake::{complete_doc, scores, FakeServices};
    use crate::pipeline::{MemoryDraftStore, PipelineSettings};
    use crate::sessions::SessionRegistry;

    /// A router with its own session registry. Routers sharing `drafts` behave like
    /// one service before and after a restart.
    fn app_with(services: Arc<FakeServices>, drafts: Arc<MemoryDraftStore>) -> Router {
        build_router(AppState {
            sessions: Arc::new(SessionRegistry::new()),
            drafts,
            services,
            settings: PipelineSettings::default(),
        })
    }

    fn app(services: FakeServices) -> Router {
        app_with(Arc::new(services), Arc::new(MemoryDraftStore::new()))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(FakeServices::default());
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_start_without_upload_asks_for_name() {
        let app = app(FakeServices::default());
        let (status, body) = send(&app, "POST", "/api/v1/sessions", Some(json!({}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["phase"], "structural_followups");
        assert_eq!(body["question"]["id"], "structural.personal.name");
        assert_eq!(body["question"]["text"], "What is your full name?");

        let id = body["id"].as_str().unwrap();
        let (status, doc) = send(&app, "GET", &format!("/api/v1/sessions/{id}/document"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(doc["experience"], json!([]));
    }

    #[tokio::test]
    async fn test_invalid_email_is_rejected_inline() {
        let app = app(FakeServices::default());
        let (_, body) = send(&app, "POST", "/api/v1/sessions", None).await;
        let id = body["id"].as_str().unwrap().to_string();
        let answer = format!("/api/v1/sessions/{id}/answer");

        let (status, body) = send(&app, "POST", &answer, Some(json!({"value": "Ada Lovelace"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["question"]["id"], "structural.personal.email");

        let (status, body) = send(&app, "POST", &answer, Some(json!({"value": "ada@"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (_, body) = send(&app, "GET", &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(body["question"]["id"], "structural.personal.email");

        let (status, _) = send(&app, "POST", &answer, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "POST", &answer, Some(json!({"skip": true}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["question"]["id"], "structural.personal.location");
    }

    #[tokio::test]
    async fn test_unknown_session_is_404_and_missing_review_is_409() {
        let app = app(FakeServices::default());
        let (status, body) = send(&app, "GET", &format!("/api/v1/sessions/{}", uuid::Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");

        let (_, body) = send(&app, "POST", "/api/v1/sessions", None).await;
        let id = body["id"].as_str().unwrap();
        let (status, _) = send(&app, "POST", &format!("/api/v1/sessions/{id}/review/accept"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = send(&app, "GET", &format!("/api/v1/sessions/{id}/review"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_review_then_accept_reaches_render() {
        let mut improved = complete_doc();
        improved.personal_info.headline = Some("Rear Admiral".into());
        let app = app(FakeServices {
            parsed: Some(complete_doc()),
            improved: Some(improved),
            scores: scores(&[88.0]),
            ..Default::default()
        });
        let (status, body) = send(&app, "POST", "/api/v1/sessions", Some(json!({"raw_text": "Grace Hopper"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["phase"], "polish");
        assert_eq!(body["review"]["added"], 1);
        let id = body["id"].as_str().unwrap().to_string();

        let (status, review) = send(&app, "GET", &format!("/api/v1/sessions/{id}/review"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(review["groups"][0]["section"], "personalInfo");
        assert_eq!(review["groups"][0]["changes"][0]["path"], "personalInfo.headline");

        let (status, body) = send(&app, "POST", &format!("/api/v1/sessions/{id}/review/accept"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "render");
        assert_eq!(body["score"]["score"], 88.0);

        let (_, doc) = send(&app, "GET", &format!("/api/v1/sessions/{id}/document"), None).await;
        assert_eq!(doc["personalInfo"]["headline"], "Rear Admiral");

        let (status, report) = send(&app, "GET", &format!("/api/v1/sessions/{id}/completeness"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(report["overall_score"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_notices_can_be_dismissed() {
        // Parse is unavailable in the default fake.
        let app = app(FakeServices::default());
        let (_, body) = send(&app, "POST", "/api/v1/sessions", Some(json!({"raw_text": "cv"}))).await;
        assert_eq!(body["notices"].as_array().unwrap().len(), 1);
        let id = body["id"].as_str().unwrap();

        let (status, body) = send(&app, "POST", &format!("/api/v1/sessions/{id}/notices/dismiss"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["notices"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resume_from_draft_after_restart() {
        let services = Arc::new(FakeServices::default());
        let drafts = Arc::new(MemoryDraftStore::new());
        let before = app_with(services.clone(), drafts.clone());
        let (_, body) = send(&before, "POST", "/api/v1/sessions", None).await;
        let id = body["id"].as_str().unwrap().to_string();
        send(&before, "POST", &format!("/api/v1/sessions/{id}/answer"), Some(json!({"value": "Ada"}))).await;

        let after = app_with(services, drafts);
        let (status, _) = send(&after, "GET", &format!("/api/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&after, "POST", &format!("/api/v1/drafts/{id}/resume"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], id);
        assert_eq!(body["phase"], "structural_followups");
        assert_eq!(body["question"]["id"], "structural.personal.email");

        let (status, _) = send(&after, "POST", &format!("/api/v1/drafts/{}/resume", uuid::Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_resume_of_live_session_returns_it_unchanged() {
        let mut improved = complete_doc();
        improved.personal_info.headline = Some("Rear Admiral".into());
        let services = Arc::new(FakeServices {
            parsed: Some(complete_doc()),
            improved: Some(improved),
            ..Default::default()
        });
        let app = app_with(services.clone(), Arc::new(MemoryDraftStore::new()));
        let (_, body) = send(&app, "POST", "/api/v1/sessions", Some(json!({"raw_text": "Grace Hopper"}))).await;
        assert_eq!(body["phase"], "polish");
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "POST", &format!("/api/v1/drafts/{id}/resume"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "polish");
        assert_eq!(body["review"]["added"], 1);
        assert_eq!(services.calls("improve"), 1);

        let (status, _) = send(&app, "POST", &format!("/api/v1/sessions/{id}/review/accept"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_events_stream_is_served_as_sse() {
        let app = app(FakeServices::default());
        let (_, body) = send(&app, "POST", "/api/v1/sessions", None).await;
        let id = body["id"].as_str().unwrap();

        let request = Request::builder()
            .uri(format!("/api/v1/sessions/{id}/events"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");

        let request = Request::builder()
            .uri(format!("/api/v1/sessions/{}/events", uuid::Uuid::new_v4()))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
