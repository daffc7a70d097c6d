//! HTTP routes over the group task engine.
//!
//! Request bodies and responses are the JSON shapes in
//! [`groupwork_proto::api`]. The acting user is taken from the
//! `x-user-id` header and must be a registered user. Every failure is
//! returned as an [`ErrorBody`] with the status code in its `code` field.
//! Live notifications are pushed over server-sent events.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use futures_util::Stream;
use groupwork::Engine;
use groupwork::directory::DirectoryError;
use groupwork::i18n::MessageKey;
use groupwork::tasks::{EngineError, NewGroupTask, TaskRecord};
use groupwork_proto::api::{
    AddMemberRequest, CreateGroupRequest, CreateGroupTaskRequest, CreateUserRequest, ErrorBody,
    GroupTaskView, GroupTasksQuery, ManagerRequest, MemberTaskView, NOT_AUTHORIZED, ScoreResponse,
    TaskView, UpdateGroupTaskRequest, UpdateUserRequest,
};
use groupwork_proto::group::{Group, UserProfile};
use groupwork_proto::notification::Notification;
use groupwork_proto::task::{Direction, TaskId};
use tokio::sync::broadcast::error::RecvError;
use tower_http::trace::TraceLayer;

/// Header naming the acting user.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Shared state of every handler.
pub struct AppState {
    engine: Engine,
}

impl AppState {
    /// Wraps an engine.
    #[must_use]
    pub const fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// The wrapped engine.
    #[must_use]
    pub const fn engine(&self) -> &Engine {
        &self.engine
    }
}

/// Errors returned by handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Engine or directory failure.
    #[error(transparent)]
    Engine(#[from] EngineError),
    /// No acting user, or an unknown one.
    #[error("{0}")]
    Unauthenticated(String),
    /// Malformed path parameter.
    #[error("{0}")]
    BadRequest(String),
}

impl From<DirectoryError> for ApiError {
    fn from(e: DirectoryError) -> Self {
        Self::Engine(e.into())
    }
}

impl ApiError {
    /// Status code and error name.
    #[must_use]
    pub const fn status(&self) -> (u16, &'static str) {
        match self {
            Self::Engine(e) => (e.code(), e.name()),
            Self::Unauthenticated(_) => (401, NOT_AUTHORIZED),
            Self::BadRequest(_) => (400, "BadRequest"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, error) = self.status();
        tracing::debug!(code, error, message = %self, "request failed");
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            code,
            error: error.to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// The user named by the `x-user-id` header.
pub struct ActingUser(pub UserProfile);

impl FromRequestParts<Arc<AppState>> for ActingUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let engine = state.engine();
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|id| engine.directory().user(id).ok())
            .map(Self)
            .ok_or_else(|| {
                ApiError::Unauthenticated(engine.translator().translate(
                    MessageKey::MissingAuthHeaders,
                    &[],
                    engine.default_locale(),
                ))
            })
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_task_id(raw: &str) -> ApiResult<TaskId> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid task id: {raw}")))
}

/// Builds the router with every route and a per-request trace span.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/users", post(create_user))
        .route("/user", put(update_user))
        .route("/groups", post(create_group))
        .route("/groups/{group_id}/members", post(add_member))
        .route("/groups/{group_id}/add-manager", post(add_manager))
        .route("/groups/{group_id}/remove-manager", post(remove_manager))
        .route("/tasks/group/{group_id}", post(create_group_task).get(group_tasks))
        .route("/tasks/user", get(user_tasks))
        .route(
            "/tasks/{task_id}",
            get(get_task).put(update_group_task).delete(delete_group_task),
        )
        .route("/tasks/{task_id}/assign/{user_id}", post(assign_task))
        .route("/tasks/{task_id}/unassign/{user_id}", post(unassign_task))
        .route("/tasks/{task_id}/approve/{user_id}", post(approve_task))
        .route("/tasks/{task_id}/score/{direction}", post(score_task))
        .route("/user/notifications", get(pending_notifications))
        .route("/user/notifications/read", post(read_notifications))
        .route("/user/notifications/stream", get(notification_stream))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the server and returns the bound address and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<AppState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "server error");
        }
    });

    Ok((bound_addr, handle))
}

// ---------------------------------------------------------------------------
// Users and groups
// ---------------------------------------------------------------------------

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let user = state
        .engine()
        .register_user(&req.username, req.locale.as_deref())?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserProfile>> {
    Ok(Json(state.engine().set_locale(&actor.id, &req.locale)?))
}

async fn create_group(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Json(req): Json<CreateGroupRequest>,
) -> ApiResult<(StatusCode, Json<Group>)> {
    let group = state.engine().directory().create_group(&actor.id, &req.name)?;
    Ok((StatusCode::CREATED, Json(group)))
}

async fn add_member(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(group_id): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<Json<Group>> {
    let directory = state.engine().directory();
    directory.add_member(&group_id, &actor.id, &req.user_id)?;
    Ok(Json(directory.group(&group_id)?))
}

async fn add_manager(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(group_id): Path<String>,
    Json(req): Json<ManagerRequest>,
) -> ApiResult<Json<Group>> {
    let directory = state.engine().directory();
    directory.add_manager(&group_id, &actor.id, &req.manager_id)?;
    Ok(Json(directory.group(&group_id)?))
}

async fn remove_manager(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(group_id): Path<String>,
    Json(req): Json<ManagerRequest>,
) -> ApiResult<Json<Group>> {
    let directory = state.engine().directory();
    directory.remove_manager(&group_id, &actor.id, &req.manager_id)?;
    Ok(Json(directory.group(&group_id)?))
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

async fn create_group_task(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(group_id): Path<String>,
    Json(req): Json<CreateGroupTaskRequest>,
) -> ApiResult<(StatusCode, Json<GroupTaskView>)> {
    let new = NewGroupTask {
        text: req.text,
        task_type: req.task_type,
        requires_approval: req.requires_approval,
        shared_completion: req.shared_completion.unwrap_or_default(),
    };
    let task = state
        .engine()
        .tasks()
        .create_group_task(&actor.id, &group_id, new)?;
    Ok((StatusCode::CREATED, Json(GroupTaskView::from(&task))))
}

async fn group_tasks(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(group_id): Path<String>,
    Query(query): Query<GroupTasksQuery>,
) -> ApiResult<Json<Vec<GroupTaskView>>> {
    let tasks = state
        .engine()
        .tasks()
        .group_tasks(&actor.id, &group_id, query.filter)?;
    Ok(Json(tasks.iter().map(GroupTaskView::from).collect()))
}

async fn user_tasks(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
) -> ApiResult<Json<Vec<MemberTaskView>>> {
    let copies = state.engine().tasks().user_tasks(&actor.id)?;
    Ok(Json(copies.iter().map(MemberTaskView::from).collect()))
}

async fn get_task(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskView>> {
    let id = parse_task_id(&task_id)?;
    let view = match state.engine().tasks().get_task(&actor.id, &id)? {
        TaskRecord::Master(task) => TaskView::Master(GroupTaskView::from(&task)),
        TaskRecord::Copy(copy) => TaskView::Copy(MemberTaskView::from(&copy)),
    };
    Ok(Json(view))
}

async fn update_group_task(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(task_id): Path<String>,
    Json(req): Json<UpdateGroupTaskRequest>,
) -> ApiResult<Json<GroupTaskView>> {
    let id = parse_task_id(&task_id)?;
    let task = state
        .engine()
        .tasks()
        .update_group_task(&actor.id, &id, &req.text)?;
    Ok(Json(GroupTaskView::from(&task)))
}

async fn delete_group_task(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path(task_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_task_id(&task_id)?;
    state.engine().tasks().delete_group_task(&actor.id, &id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn assign_task(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path((task_id, user_id)): Path<(String, String)>,
) -> ApiResult<Json<MemberTaskView>> {
    let id = parse_task_id(&task_id)?;
    let copy = state.engine().tasks().assign_task(&actor.id, &id, &user_id)?;
    Ok(Json(MemberTaskView::from(&copy)))
}

async fn unassign_task(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path((task_id, user_id)): Path<(String, String)>,
) -> ApiResult<Json<GroupTaskView>> {
    let id = parse_task_id(&task_id)?;
    let task = state
        .engine()
        .tasks()
        .unassign_task(&actor.id, &id, &user_id)?;
    Ok(Json(GroupTaskView::from(&task)))
}

async fn approve_task(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path((task_id, user_id)): Path<(String, String)>,
) -> ApiResult<Json<MemberTaskView>> {
    let id = parse_task_id(&task_id)?;
    let copy = state
        .engine()
        .tasks()
        .approve_task(&actor.id, &id, &user_id)?;
    Ok(Json(MemberTaskView::from(&copy)))
}

async fn score_task(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
    Path((task_id, direction)): Path<(String, String)>,
) -> ApiResult<Json<ScoreResponse>> {
    let id = parse_task_id(&task_id)?;
    let direction: Direction = direction.parse().map_err(
        |e: groupwork_proto::task::InvalidDirection| ApiError::BadRequest(e.to_string()),
    )?;
    let copy = state.engine().tasks().score_task(&actor.id, &id, direction)?;
    Ok(Json(ScoreResponse {
        completed: copy.completed,
        date_completed: copy.date_completed,
    }))
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

async fn pending_notifications(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
) -> Json<Vec<Notification>> {
    Json(state.engine().notifications().pending(&actor.id))
}

async fn read_notifications(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
) -> Json<Vec<Notification>> {
    Json(state.engine().notifications().drain(&actor.id))
}

/// Pushes the acting user's notifications as they are emitted. Pending
/// notifications stay in the inbox; this stream only carries new ones.
async fn notification_stream(
    State(state): State<Arc<AppState>>,
    ActingUser(actor): ActingUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.engine().notifications().subscribe();
    tracing::debug!(user_id = %actor.id, "live notification stream opened");
    let stream = futures_util::stream::unfold((rx, actor.id), |(mut rx, user_id)| async move {
        loop {
            match rx.recv().await {
                Ok(delivery) if delivery.recipient == user_id => {
                    let event = Event::default()
                        .event("notification")
                        .json_data(&delivery.notification)
                        .unwrap_or_else(|e| Event::default().event("error").data(e.to_string()));
                    return Some((Ok(event), (rx, user_id)));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(user_id = %user_id, skipped, "live notification stream lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
