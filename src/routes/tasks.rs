use crate::{
    auth::CurrentUser,
    error::AppError,
    models::{Task, TaskCreate, TaskQuery, TaskUpdate},
};
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Hard ceiling on page size; also the default when `limit` is omitted.
const MAX_PAGE_SIZE: u32 = 100;

/// Retrieves the authenticated user's tasks.
///
/// Results are always scoped to the caller: another owner's tasks can never
/// appear here. Supports exact-match filtering by `priority` and `status`,
/// ordered by creation date descending, with `skip`/`limit` paging.
///
/// ## Query Parameters:
/// - `priority` (optional): "low", "medium", "high", or "urgent".
/// - `status` (optional): "pending", "in_progress", "completed", or "cancelled".
/// - `skip` (optional): offset into the result set, default 0.
/// - `limit` (optional): page size, default and maximum 100.
///
/// ## Responses:
/// - `200 OK`: JSON array of `Task` objects owned by the caller.
/// - `422 Unprocessable Entity`: `limit` above the ceiling.
#[get("")]
pub async fn list_tasks(
    pool: web::Data<PgPool>,
    query_params: web::Query<TaskQuery>,
    user: CurrentUser,
) -> Result<impl Responder, AppError> {
    let skip = query_params.skip.unwrap_or(0);
    let limit = query_params.limit.unwrap_or(MAX_PAGE_SIZE);
    if limit > MAX_PAGE_SIZE {
        return Err(AppError::ValidationError(format!(
            "limit must be less than or equal to {}",
            MAX_PAGE_SIZE
        )));
    }

    // Base query scoped to the owner; filter conditions are appended with
    // their placeholder numbers tracked by hand.
    let mut sql = String::from(
        "SELECT id, title, description, priority, status, due_date, created_at, updated_at, owner_id \
         FROM tasks WHERE owner_id = $1",
    );
    let mut param_count = 2;

    if query_params.priority.is_some() {
        sql.push_str(&format!(" AND priority = ${}", param_count));
        param_count += 1;
    }
    if query_params.status.is_some() {
        sql.push_str(&format!(" AND status = ${}", param_count));
        param_count += 1;
    }

    sql.push_str(&format!(
        " ORDER BY created_at DESC OFFSET ${} LIMIT ${}",
        param_count,
        param_count + 1
    ));

    let mut query_builder = sqlx::query_as::<_, Task>(&sql).bind(user.0.id);

    if let Some(priority) = query_params.priority {
        query_builder = query_builder.bind(priority);
    }
    if let Some(status) = query_params.status {
        query_builder = query_builder.bind(status);
    }

    let tasks = query_builder
        .bind(skip as i64)
        .bind(limit as i64)
        .fetch_all(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(tasks))
}

/// Creates a new task owned by the authenticated user.
///
/// The owner is always the caller; there is no way to create a task for
/// someone else. Priority defaults to medium, status always starts pending.
///
/// ## Responses:
/// - `201 Created`: the persisted `Task`, including its server-assigned id.
/// - `422 Unprocessable Entity`: title or description constraint violation.
#[post("")]
pub async fn create_task(
    pool: web::Data<PgPool>,
    task_data: web::Json<TaskCreate>,
    user: CurrentUser,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let task = Task::new(task_data.into_inner(), user.0.id);

    let created = sqlx::query_as::<_, Task>(
        "INSERT INTO tasks (id, title, description, priority, status, due_date, owner_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id, title, description, priority, status, due_date, created_at, updated_at, owner_id",
    )
    .bind(task.id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.priority)
    .bind(task.status)
    .bind(task.due_date)
    .bind(task.owner_id)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Created().json(created))
}

/// Retrieves a single task by id.
///
/// ## Responses:
/// - `200 OK`: the task.
/// - `404 Not Found`: no task with that id exists.
/// - `403 Forbidden`: the task belongs to another user.
#[get("/{id}")]
pub async fn get_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    user: CurrentUser,
) -> Result<impl Responder, AppError> {
    let task = find_task(&pool, task_id.into_inner()).await?;
    ensure_owner(&task, &user)?;

    Ok(HttpResponse::Ok().json(task))
}

/// Applies a partial update to a task.
///
/// Only the supplied fields change; everything else keeps its stored value.
/// The owner is never mutable. Concurrent updates to the same task are not
/// detected: last write wins.
///
/// ## Responses:
/// - `200 OK`: the updated task.
/// - `404 Not Found` / `403 Forbidden`: as for `GET /tasks/{id}`.
/// - `422 Unprocessable Entity`: constraint violation in a supplied field.
#[put("/{id}")]
pub async fn update_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    task_data: web::Json<TaskUpdate>,
    user: CurrentUser,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let mut task = find_task(&pool, task_id.into_inner()).await?;
    ensure_owner(&task, &user)?;

    task.apply(task_data.into_inner());

    let updated = sqlx::query_as::<_, Task>(
        "UPDATE tasks \
         SET title = $1, description = $2, priority = $3, status = $4, due_date = $5, updated_at = $6 \
         WHERE id = $7 \
         RETURNING id, title, description, priority, status, due_date, created_at, updated_at, owner_id",
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.priority)
    .bind(task.status)
    .bind(task.due_date)
    .bind(task.updated_at)
    .bind(task.id)
    .fetch_one(&**pool)
    .await?;

    Ok(HttpResponse::Ok().json(updated))
}

/// Deletes a task.
///
/// ## Responses:
/// - `200 OK`: `{"message": "Task deleted successfully"}`.
/// - `404 Not Found` / `403 Forbidden`: as for `GET /tasks/{id}`.
#[delete("/{id}")]
pub async fn delete_task(
    pool: web::Data<PgPool>,
    task_id: web::Path<Uuid>,
    user: CurrentUser,
) -> Result<impl Responder, AppError> {
    let task = find_task(&pool, task_id.into_inner()).await?;
    ensure_owner(&task, &user)?;

    sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(task.id)
        .execute(&**pool)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Task deleted successfully" })))
}

/// Fetches a task row or fails with 404.
async fn find_task(pool: &PgPool, id: Uuid) -> Result<Task, AppError> {
    sqlx::query_as::<_, Task>(
        "SELECT id, title, description, priority, status, due_date, created_at, updated_at, owner_id \
         FROM tasks WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
}

/// Owner gate shared by the single-task routes.
fn ensure_owner(task: &Task, user: &CurrentUser) -> Result<(), AppError> {
    if task.owner_id != user.0.id {
        return Err(AppError::Forbidden("Not enough permissions".to_string()));
    }
    Ok(())
}
