use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::CurrentUser,
    error::{ApiError, ApiResult},
    state::AppState,
    tasks::dto::{
        CreateTaskRequest, DeleteResponse, TaskListResponse, TaskResponse, UpdateTaskRequest,
    },
    tasks::repo::TaskFilter,
};

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
}

fn not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("Task with ID {id} not found"))
}

/// Task ids are opaque to the client; anything that is not one of ours is
/// simply an unknown resource, not a malformed request.
fn parse_task_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| not_found(id))
}

#[instrument(skip(state, user))]
pub async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Json<TaskListResponse>> {
    let tasks = state.tasks.list(user.id, &filter).await?;
    Ok(Json(TaskListResponse {
        success: true,
        count: tasks.len(),
        data: tasks,
    }))
}

#[instrument(skip(state, user))]
pub async fn get_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskResponse>> {
    let task_id = parse_task_id(&id)?;
    let task = state
        .tasks
        .get(user.id, task_id)
        .await?
        .ok_or_else(|| not_found(&id))?;

    Ok(Json(TaskResponse {
        success: true,
        data: task,
    }))
}

#[instrument(skip(state, user, payload))]
pub async fn create_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    let draft = payload.into_draft()?;
    let task = state.tasks.create(user.id, draft).await?;

    Ok((
        StatusCode::CREATED,
        Json(TaskResponse {
            success: true,
            data: task,
        }),
    ))
}

#[instrument(skip(state, user, payload))]
pub async fn update_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskResponse>> {
    let task_id = parse_task_id(&id)?;
    let patch = payload.into_patch()?;

    let task = state
        .tasks
        .update(user.id, task_id, patch)
        .await?
        .ok_or_else(|| not_found(&id))?;

    Ok(Json(TaskResponse {
        success: true,
        data: task,
    }))
}

#[instrument(skip(state, user))]
pub async fn delete_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let task_id = parse_task_id(&id)?;
    if !state.tasks.delete(user.id, task_id).await? {
        return Err(not_found(&id));
    }

    Ok(Json(DeleteResponse {
        success: true,
        message: "Task deleted successfully".to_string(),
    }))
}
