use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use relay_agent::{ActionExecutor, ChatMessage, ExecutionOutcome, Orchestrator};
use relay_core::errors::InterfaceError;
use relay_core::orchestration::ApprovalData;

const USER_ID_HEADER: &str = "x-user-id";

/// In-process chat sessions. A session belongs to the user who opened it;
/// requests against someone else's session are refused.
struct Session {
    user_id: String,
    messages: Vec<ChatMessage>,
}

#[derive(Clone)]
pub struct ChatState {
    orchestrator: Arc<Orchestrator>,
    executor: Arc<ActionExecutor>,
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl ChatState {
    pub fn new(orchestrator: Arc<Orchestrator>, executor: Arc<ActionExecutor>) -> Self {
        Self { orchestrator, executor, sessions: Arc::new(RwLock::new(HashMap::new())) }
    }
}

pub fn router(state: ChatState) -> Router {
    Router::new()
        .route("/api/v1/chat/message", post(post_message))
        .route("/api/v1/chat/approve", post(post_approve))
        .route("/api/v1/chat/history/{session_id}", get(get_history))
        .route("/api/v1/chat/session/{session_id}", delete(delete_session))
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiError {
    error: String,
    correlation_id: String,
}

type ErrorResponse = (StatusCode, Json<ApiError>);

fn reject(error: InterfaceError) -> ErrorResponse {
    let status = match &error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
    };
    warn!(
        event_name = "system.chat.request_rejected",
        correlation_id = %error.correlation_id(),
        error = %error,
        "rejecting chat request"
    );
    (
        status,
        Json(ApiError {
            error: error.message().to_string(),
            correlation_id: error.correlation_id().to_string(),
        }),
    )
}

fn require_user_id(headers: &HeaderMap) -> Result<String, ErrorResponse> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| reject(InterfaceError::bad_request("missing x-user-id header")))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRequest {
    message: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessageResponse {
    session_id: String,
    message: String,
    requires_approval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    approval_data: Option<ApprovalData>,
    suggested_actions: Vec<String>,
    completed: bool,
}

async fn post_message(
    State(state): State<ChatState>,
    headers: HeaderMap,
    Json(request): Json<MessageRequest>,
) -> Result<Json<MessageResponse>, ErrorResponse> {
    let user_id = require_user_id(&headers)?;
    if request.message.trim().is_empty() {
        return Err(reject(InterfaceError::bad_request("message must not be empty")));
    }

    let session_id = request.session_id.unwrap_or_else(|| user_id.clone());
    let mut history = checkout_history(&state, &session_id, &user_id).await?;
    let seen = history.len();

    let response =
        state.orchestrator.process_request(&user_id, &request.message, &mut history).await;

    store_history(&state, &session_id, history, seen).await;

    Ok(Json(MessageResponse {
        session_id,
        message: response.message,
        requires_approval: response.requires_approval,
        approval_data: response.approval_data,
        suggested_actions: response.suggested_actions,
        completed: response.completed,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApproveRequest {
    action: String,
    #[serde(default)]
    details: Value,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    idempotency_key: Option<String>,
}

async fn post_approve(
    State(state): State<ChatState>,
    headers: HeaderMap,
    Json(request): Json<ApproveRequest>,
) -> Result<Json<ExecutionOutcome>, ErrorResponse> {
    let user_id = require_user_id(&headers)?;

    let session_id = request.session_id.unwrap_or_else(|| user_id.clone());
    let mut history = checkout_history(&state, &session_id, &user_id).await?;
    let seen = history.len();

    info!(
        event_name = "system.chat.approval_received",
        %user_id,
        action = %request.action,
        "executing approved action"
    );

    let outcome = state
        .executor
        .execute(
            &request.action,
            request.details,
            &user_id,
            request.idempotency_key.as_deref(),
        )
        .await;

    let summary = if outcome.success {
        format!("Action {} completed: {}", request.action, outcome.result)
    } else {
        format!("Action {} failed: {}", request.action, outcome.result)
    };
    history.push(ChatMessage::assistant(summary));
    store_history(&state, &session_id, history, seen).await;

    Ok(Json(outcome))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    session_id: String,
    messages: Vec<ChatMessage>,
}

async fn get_history(
    State(state): State<ChatState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, ErrorResponse> {
    let user_id = require_user_id(&headers)?;

    let sessions = state.sessions.read().await;
    let Some(session) = sessions.get(&session_id) else {
        return Err(reject(InterfaceError::not_found("session not found")));
    };
    if session.user_id != user_id {
        return Err(reject(InterfaceError::forbidden("session belongs to another user")));
    }

    Ok(Json(HistoryResponse { session_id, messages: session.messages.clone() }))
}

async fn delete_session(
    State(state): State<ChatState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ErrorResponse> {
    let user_id = require_user_id(&headers)?;

    let mut sessions = state.sessions.write().await;
    match sessions.get(&session_id) {
        None => Err(reject(InterfaceError::not_found("session not found"))),
        Some(session) if session.user_id != user_id => {
            Err(reject(InterfaceError::forbidden("session belongs to another user")))
        }
        Some(_) => {
            sessions.remove(&session_id);
            Ok(StatusCode::NO_CONTENT)
        }
    }
}

/// Takes a copy of the session transcript, creating the session on first use.
async fn checkout_history(
    state: &ChatState,
    session_id: &str,
    user_id: &str,
) -> Result<Vec<ChatMessage>, ErrorResponse> {
    let mut sessions = state.sessions.write().await;
    match sessions.get(session_id) {
        Some(session) if session.user_id != user_id => {
            Err(reject(InterfaceError::forbidden("session belongs to another user")))
        }
        Some(session) => Ok(session.messages.clone()),
        None => {
            sessions.insert(
                session_id.to_string(),
                Session { user_id: user_id.to_string(), messages: Vec::new() },
            );
            Ok(Vec::new())
        }
    }
}

/// Appends the messages added during this turn, skipping the `seen` prefix
/// copied out at checkout. Interleaved turns on one session each append their
/// own suffix instead of overwriting the other's.
async fn store_history(
    state: &ChatState,
    session_id: &str,
    messages: Vec<ChatMessage>,
    seen: usize,
) {
    let mut sessions = state.sessions.write().await;
    if let Some(session) = sessions.get_mut(session_id) {
        session.messages.extend(messages.into_iter().skip(seen));
    }
}
