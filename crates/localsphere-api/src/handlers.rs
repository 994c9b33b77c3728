//! Route handler functions for all API endpoints.
//!
//! Catalog handlers are pure reads over the static portal data. Session
//! handlers look up the visitor's [`SessionController`] and forward to it.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

use localsphere_chat::{
    parse_markup, ControllerView, Reply, Segment, SessionController, SkipReason, SubmitOutcome,
    Transcript,
};
use localsphere_core::portal::{CarouselSlide, DepartmentProfile, SiteBrand, SITE_BRAND};
use localsphere_core::types::{Department, Message, Role};

use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct DepartmentRequest {
    pub department: String,
}

#[derive(Debug, Deserialize)]
pub struct WidgetRequest {
    pub open: bool,
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub total_messages: u64,
    pub active_sessions: u64,
}

#[derive(Debug, Serialize)]
pub struct DepartmentSummary {
    pub id: Department,
    pub name: &'static str,
    pub icon: &'static str,
    /// Hero content; absent for the landing page.
    pub profile: Option<&'static DepartmentProfile>,
}

impl DepartmentSummary {
    fn of(department: Department) -> Self {
        Self {
            id: department,
            name: department.display_name(),
            icon: department.icon().glyph(),
            profile: department.profile(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CarouselResponse {
    pub interval_secs: u64,
    /// Slide showing right now, counted from server start.
    pub current: usize,
    pub slides: &'static [CarouselSlide],
}

#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub brand: SiteBrand,
    pub departments: Vec<DepartmentSummary>,
    pub carousel: CarouselResponse,
}

/// One rendered transcript line.
#[derive(Debug, Serialize)]
pub struct TranscriptEntry {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub department: Department,
    pub created_at: DateTime<Utc>,
    /// Assistant text split into text and link runs; user text is one run.
    pub segments: Vec<Segment>,
}

impl From<&Message> for TranscriptEntry {
    fn from(message: &Message) -> Self {
        let segments = match message.role {
            Role::Assistant => parse_markup(message.display_text()),
            Role::User => vec![Segment::Text {
                text: message.content.clone(),
            }],
        };
        Self {
            id: message.id.to_string(),
            role: message.role,
            content: message.content.clone(),
            department: message.department,
            created_at: message.created_at,
            segments,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub department: Department,
    pub messages: Vec<TranscriptEntry>,
}

impl From<&Transcript> for TranscriptResponse {
    fn from(transcript: &Transcript) -> Self {
        Self {
            department: transcript.department(),
            messages: transcript.messages().iter().map(TranscriptEntry::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// "sent" or "failed".
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<Reply>,
    pub session: ControllerView,
}

// =============================================================================
// Catalog
// =============================================================================

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let total_messages = state.store.repository().count()?;
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        total_messages,
        active_sessions: state.session_count() as u64,
    }))
}

/// GET /portal - brand, department cards and carousel.
pub async fn portal(State(state): State<AppState>) -> Json<PortalResponse> {
    let carousel = state.carousel();
    Json(PortalResponse {
        brand: SITE_BRAND,
        departments: Department::ALL.into_iter().map(DepartmentSummary::of).collect(),
        carousel: CarouselResponse {
            interval_secs: carousel.interval().as_secs(),
            current: carousel.slide_at(state.start_time.elapsed()),
            slides: carousel.slides(),
        },
    })
}

/// GET /departments/{id} - hero content for one department.
pub async fn department(Path(id): Path<String>) -> Result<Json<DepartmentSummary>, ApiError> {
    let department: Department = id.parse()?;
    Ok(Json(DepartmentSummary::of(department)))
}

// =============================================================================
// Sessions
// =============================================================================

/// POST /sessions - start a session for a new visitor load.
///
/// A failed sign-in still registers the session; it stays `awaiting_auth`.
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ControllerView>), ApiError> {
    let controller = state.new_controller();
    if let Err(e) = controller.mount().await {
        tracing::warn!(session = %controller.session_id(), error = %e, "Session created without identity");
    }
    let view = controller.view();
    state.register(controller)?;
    tracing::info!(session = %view.session_id, "Session created");
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /sessions/{id} - controller state.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ControllerView>, ApiError> {
    Ok(Json(state.session(&id)?.view()))
}

/// DELETE /sessions/{id} - unmount and forget a session.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let controller = state.remove_session(&id)?;
    controller.unmount();
    tracing::info!(session = %id, "Session closed");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /sessions/{id}/department - switch the active department.
pub async fn select_department(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<DepartmentRequest>,
) -> Result<Json<ControllerView>, ApiError> {
    let department: Department = body
        .department
        .parse()
        .map_err(|e: localsphere_core::PortalError| ApiError::BadRequest(e.to_string()))?;
    let controller = state.session(&id)?;
    controller.select_department(department);
    Ok(Json(controller.view()))
}

/// PUT /sessions/{id}/widget - open or close the chat widget.
pub async fn set_widget(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<WidgetRequest>,
) -> Result<Json<ControllerView>, ApiError> {
    let controller = state.session(&id)?;
    if body.open {
        controller.open_widget();
    } else {
        controller.close_widget();
    }
    Ok(Json(controller.view()))
}

/// PUT /sessions/{id}/input - replace the draft input.
pub async fn set_input(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TextRequest>,
) -> Result<Json<ControllerView>, ApiError> {
    let controller = state.session(&id)?;
    controller.set_input(body.text);
    Ok(Json(controller.view()))
}

/// POST /sessions/{id}/messages - type `text` and submit it.
pub async fn post_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TextRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let controller = state.session(&id)?;
    controller.set_input(body.text);
    submit(&controller).await
}

async fn submit(controller: &SessionController) -> Result<Json<SubmitResponse>, ApiError> {
    let (outcome, reply) = match controller.submit().await {
        SubmitOutcome::Sent { reply } => ("sent", Some(reply)),
        SubmitOutcome::Failed => ("failed", None),
        SubmitOutcome::Skipped(reason) => return Err(skipped(reason, controller)),
    };
    Ok(Json(SubmitResponse {
        outcome,
        reply,
        session: controller.view(),
    }))
}

fn skipped(reason: SkipReason, controller: &SessionController) -> ApiError {
    match reason {
        SkipReason::EmptyInput => ApiError::BadRequest("'text' must not be empty".to_string()),
        SkipReason::TooLong => ApiError::BadRequest("'text' is too long".to_string()),
        SkipReason::NoIdentity => ApiError::ServiceUnavailable(format!(
            "Session {} has no signed-in user",
            controller.session_id()
        )),
        SkipReason::Busy => ApiError::Conflict("A message is already being sent".to_string()),
    }
}

/// GET /sessions/{id}/transcript - the ordered transcript.
pub async fn transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TranscriptResponse>, ApiError> {
    let controller = state.session(&id)?;
    Ok(Json(TranscriptResponse::from(&controller.transcript())))
}

/// GET /sessions/{id}/stream - SSE `transcript` events.
///
/// Emits the current transcript first, then one event per published
/// transcript. Ends when the session is dropped.
pub async fn stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>> + Send>, ApiError> {
    let rx = state.session(&id)?.watch_transcript();
    let stream = WatchStream::new(rx).map(|transcript| {
        let data = serde_json::to_string(&TranscriptResponse::from(&transcript)).unwrap_or_default();
        Ok(Event::default().event("transcript").data(data))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
