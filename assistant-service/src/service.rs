use assistant_dispatch::{
    BackendEndpoint, BackendKind, BackendSet, DispatchError, Dispatcher, DispatcherConfig,
    InMemorySessionStorage, Message, SessionStorage, UploadKind, UploadedFile,
};
use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::{Json, Response},
    routing::{get, post, put},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::models::{
    ActionResponse, AiToggleRequest, BackendStatusResponse, ReconfigureRequest,
    SendMessageRequest, SessionSnapshot,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const CORRELATION_HEADER: &str = "x-correlation-id";

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "id": id
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn dispatch_error(e: DispatchError) -> ApiError {
    match e {
        DispatchError::Validation(message) => bad_request_error(&message),
        DispatchError::Unavailable { kind } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": format!("{} service is not connected", kind),
                "backend": kind.as_str()
            })),
        ),
        DispatchError::UnknownKind(kind) => not_found_error("Unknown kind", &kind),
        DispatchError::SessionNotFound(id) => not_found_error("Session not found", &id),
        other => internal_error("Request failed", &other.to_string()),
    }
}

/// Maps a failed action, attaching the notices it queued.
fn action_error(dispatcher: &Dispatcher, e: DispatchError) -> ApiError {
    let (status, Json(mut body)) = dispatch_error(e);
    body["notices"] = json!(dispatcher.drain_notices());
    (status, Json(body))
}

#[derive(Clone)]
pub struct AppState {
    pub session_storage: Arc<dyn SessionStorage>,
    pub config: DispatcherConfig,
    pub backends: BackendSet,
}

impl AppState {
    pub fn new(config: DispatcherConfig, backends: BackendSet) -> Self {
        Self {
            session_storage: Arc::new(InMemorySessionStorage::new()),
            config,
            backends,
        }
    }
}

pub fn create_app(config: DispatcherConfig) -> Router {
    build_router(AppState::new(config, BackendSet::http()))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route(
            "/sessions/{id}/messages",
            post(send_message).delete(clear_messages),
        )
        .route("/sessions/{id}/uploads/{kind}", put(select_upload))
        .route("/sessions/{id}/uploads/{kind}/submit", post(submit_upload))
        .route("/sessions/{id}/backends/{kind}", put(reconfigure_backend))
        .route("/sessions/{id}/ai", put(set_ai_enabled))
        .route("/sessions/{id}/notices", get(drain_notices))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(from_fn(correlation_id_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Tags every request with a correlation id, reusing the caller's if sent.
async fn correlation_id_middleware(mut request: Request<axum::body::Body>, next: Next) -> Response {
    let correlation_id = request
        .headers()
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert(CORRELATION_HEADER, value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_HEADER, value);
    }
    response
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "NeuroPath Assistant Service",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Health assistant chat with EEG seizure and MRI Alzheimer's analysis",
        "endpoints": {
            "POST /sessions": "Start a new conversation",
            "GET /sessions/{id}": "Get messages, connections and pending uploads",
            "DELETE /sessions/{id}": "End a conversation",
            "POST /sessions/{id}/messages": "Send a text message",
            "DELETE /sessions/{id}/messages": "Clear the conversation",
            "PUT /sessions/{id}/uploads/{kind}": "Select a file (eeg or alzheimer)",
            "POST /sessions/{id}/uploads/{kind}/submit": "Analyze the selected file",
            "PUT /sessions/{id}/backends/{kind}": "Change a backend URL",
            "PUT /sessions/{id}/ai": "Turn AI replies on or off",
            "GET /sessions/{id}/notices": "Fetch pending notices",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn find_session(state: &AppState, session_id: &str) -> Result<Arc<Dispatcher>, ApiError> {
    match state.session_storage.get(session_id).await {
        Ok(Some(dispatcher)) => Ok(dispatcher),
        Ok(None) => {
            warn!(session_id = %session_id, "Session not found");
            Err(dispatch_error(DispatchError::SessionNotFound(
                session_id.to_string(),
            )))
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to load session");
            Err(internal_error("Failed to load session", &e.to_string()))
        }
    }
}

fn messages_after(dispatcher: &Dispatcher, last_id: Option<u64>) -> Vec<Message> {
    dispatcher
        .messages()
        .into_iter()
        .filter(|m| last_id.is_none_or(|id| m.id > id))
        .collect()
}

fn last_message_id(dispatcher: &Dispatcher) -> Option<u64> {
    dispatcher.messages().last().map(|m| m.id)
}

fn action_response(dispatcher: &Dispatcher, messages: Vec<Message>) -> Json<ActionResponse> {
    Json(ActionResponse {
        session_id: dispatcher.id().to_string(),
        messages,
        notices: dispatcher.drain_notices(),
    })
}

async fn create_session(State(state): State<AppState>) -> ApiResult<SessionSnapshot> {
    let dispatcher = Arc::new(Dispatcher::new(
        state.config.clone(),
        state.backends.clone(),
    ));
    info!(session_id = %dispatcher.id(), "Creating session");

    dispatcher.initialize().await;
    state
        .session_storage
        .save(dispatcher.clone())
        .await
        .map_err(|e| {
            error!(session_id = %dispatcher.id(), error = %e, "Failed to save session");
            internal_error("Failed to create session", &e.to_string())
        })?;

    Ok(Json(SessionSnapshot::of(&dispatcher)))
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionSnapshot> {
    let dispatcher = find_session(&state, &session_id).await?;
    Ok(Json(SessionSnapshot::of(&dispatcher)))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    match state.session_storage.delete(&session_id).await {
        Ok(true) => {
            info!(session_id = %session_id, "Session deleted");
            Ok(Json(json!({ "session_id": session_id, "status": "deleted" })))
        }
        Ok(false) => Err(not_found_error("Session not found", &session_id)),
        Err(e) => Err(internal_error("Failed to delete session", &e.to_string())),
    }
}

async fn send_message(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> ApiResult<ActionResponse> {
    let dispatcher = find_session(&state, &session_id).await?;
    info!(
        session_id = %session_id,
        text_length = request.text.len(),
        "Processing message"
    );

    let last_id = last_message_id(&dispatcher);
    let messages = match dispatcher.handle_user_text(&request.text).await {
        Some(_) => messages_after(&dispatcher, last_id),
        None => Vec::new(),
    };
    Ok(action_response(&dispatcher, messages))
}

async fn clear_messages(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<ActionResponse> {
    let dispatcher = find_session(&state, &session_id).await?;
    dispatcher.clear();
    info!(session_id = %session_id, "Conversation cleared");
    Ok(action_response(&dispatcher, dispatcher.messages()))
}

async fn select_upload(
    State(state): State<AppState>,
    Path((session_id, kind)): Path<(String, String)>,
    mut multipart: Multipart,
) -> ApiResult<ActionResponse> {
    let kind = kind.parse::<UploadKind>().map_err(dispatch_error)?;
    let dispatcher = find_session(&state, &session_id).await?;

    let mut file = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request_error(&format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request_error(&format!("Failed to read file: {}", e)))?;
        file = Some(UploadedFile::new(file_name, content_type, bytes.to_vec()));
        break;
    }
    let file = file.ok_or_else(|| bad_request_error("Multipart field 'file' is required"))?;

    dispatcher
        .select_upload(kind, file)
        .map_err(|e| action_error(&dispatcher, e))?;
    Ok(action_response(&dispatcher, Vec::new()))
}

async fn submit_upload(
    State(state): State<AppState>,
    Path((session_id, kind)): Path<(String, String)>,
) -> ApiResult<ActionResponse> {
    let kind = kind.parse::<UploadKind>().map_err(dispatch_error)?;
    let dispatcher = find_session(&state, &session_id).await?;

    let message = dispatcher.submit_upload(kind).await.map_err(|e| {
        warn!(session_id = %session_id, error = %e, "Upload not submitted");
        action_error(&dispatcher, e)
    })?;
    Ok(action_response(&dispatcher, vec![message]))
}

async fn reconfigure_backend(
    State(state): State<AppState>,
    Path((session_id, kind)): Path<(String, String)>,
    Json(request): Json<ReconfigureRequest>,
) -> ApiResult<BackendStatusResponse> {
    let kind = kind.parse::<BackendKind>().map_err(dispatch_error)?;
    let dispatcher = find_session(&state, &session_id).await?;

    let endpoint = BackendEndpoint {
        base_url: request.base_url.trim().to_string(),
        credential: request.credential,
    };
    dispatcher
        .reconfigure(kind, endpoint)
        .await
        .map_err(|e| action_error(&dispatcher, e))?;

    let connection = dispatcher
        .connections()
        .into_iter()
        .find(|c| c.kind == kind)
        .ok_or_else(|| internal_error("Backend missing from session", kind.as_str()))?;

    Ok(Json(BackendStatusResponse {
        session_id,
        connection,
        notices: dispatcher.drain_notices(),
    }))
}

async fn set_ai_enabled(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<AiToggleRequest>,
) -> ApiResult<Value> {
    let dispatcher = find_session(&state, &session_id).await?;
    dispatcher.set_ai_enabled(request.enabled);
    info!(session_id = %session_id, enabled = request.enabled, "AI replies toggled");

    Ok(Json(json!({
        "session_id": session_id,
        "ai_enabled": dispatcher.ai_enabled()
    })))
}

async fn drain_notices(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    let dispatcher = find_session(&state, &session_id).await?;
    Ok(Json(json!({
        "session_id": session_id,
        "notices": dispatcher.drain_notices()
    })))
}
