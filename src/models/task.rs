use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the priority of a task.
/// Corresponds to the `task_priority` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Represents the lifecycle state of a task.
/// Corresponds to the `task_status` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

/// Represents a task entity as stored in the database and returned by the API.
///
/// Invariant: every task has exactly one owner, fixed at creation; tasks are
/// visible and mutable only through routes scoped to that owner.
#[derive(Debug, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner_id: i32,
}

/// Input structure for creating a task.
///
/// Status is not accepted here; new tasks always start out pending.
#[derive(Debug, Deserialize, Validate)]
pub struct TaskCreate {
    #[validate(length(min = 1, max = 100))]
    pub title: String,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    /// Defaults to medium when omitted.
    pub priority: Option<TaskPriority>,

    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update payload: only supplied fields are changed, everything else
/// keeps its stored value. The owner is never mutable through this path.
#[derive(Debug, Deserialize, Validate)]
pub struct TaskUpdate {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    pub priority: Option<TaskPriority>,

    pub status: Option<TaskStatus>,

    pub due_date: Option<DateTime<Utc>>,
}

/// Query parameters for the list endpoint: exact-match filters plus paging.
#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
}

impl Task {
    /// Creates a new `Task` from a create payload and the owner's id,
    /// applying the default priority and the initial pending status.
    pub fn new(input: TaskCreate, owner_id: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            description: input.description,
            priority: input.priority.unwrap_or(TaskPriority::Medium),
            status: TaskStatus::Pending,
            due_date: input.due_date,
            created_at: now,
            updated_at: now,
            owner_id,
        }
    }

    /// Applies a partial update in place and refreshes `updated_at`.
    pub fn apply(&mut self, update: TaskUpdate) {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(description) = update.description {
            self.description = Some(description);
        }
        if let Some(priority) = update.priority {
            self.priority = priority;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(due_date) = update.due_date {
            self.due_date = Some(due_date);
        }
        self.updated_at = Utc::now();
    }
}
