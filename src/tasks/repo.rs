use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::storage::{DocumentStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// A task as persisted in its owner's document and returned to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Validated input for task creation, defaults already applied.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<OffsetDateTime>,
}

/// Validated partial update. A `None` field keeps the existing value;
/// `due_date` uses a second level so `Some(None)` clears the date.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Option<OffsetDateTime>>,
}

impl TaskPatch {
    /// Apply field-by-field over an existing task. `id`, `owner_id` and
    /// `created_at` are untouchable; `updated_at` never moves backward.
    fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        task.updated_at = OffsetDateTime::now_utc().max(task.updated_at);
    }
}

/// Equality filters applied at read time.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

/// Persists each owner's tasks in their own JSON document.
///
/// Mutations on the same owner are serialized by a per-owner mutex held
/// across the whole read-modify-persist cycle; different owners never
/// contend. Reads take no lock: the document store guarantees readers see
/// either the old or the new document, never a torn one.
#[derive(Clone)]
pub struct TaskStore {
    docs: Arc<dyn DocumentStore>,
    locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl TaskStore {
    pub fn new(docs: Arc<dyn DocumentStore>) -> Self {
        Self {
            docs,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn doc_name(owner_id: Uuid) -> String {
        format!("tasks_{owner_id}.json")
    }

    async fn owner_lock(&self, owner_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(owner_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn read_all(&self, owner_id: Uuid) -> Result<Vec<Task>, StoreError> {
        let doc = Self::doc_name(owner_id);
        let bytes = match self.docs.load(&doc).await? {
            Some(bytes) => bytes,
            None => return Ok(Vec::new()),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt { doc, source: e })
    }

    async fn write_all(&self, owner_id: Uuid, tasks: &[Task]) -> Result<(), StoreError> {
        let doc = Self::doc_name(owner_id);
        let bytes = serde_json::to_vec_pretty(tasks)
            .map_err(|e| StoreError::Encode { doc: doc.clone(), source: e })?;
        self.docs.persist(&doc, bytes).await
    }

    /// List the owner's tasks, filtered, most recently created first.
    pub async fn list(
        &self,
        owner_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self.read_all(owner_id).await?;

        if let Some(status) = filter.status {
            tasks.retain(|t| t.status == status);
        }
        if let Some(priority) = filter.priority {
            tasks.retain(|t| t.priority == priority);
        }

        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    /// Fetch one task. `None` means "not found for this owner".
    pub async fn get(&self, owner_id: Uuid, task_id: Uuid) -> Result<Option<Task>, StoreError> {
        let tasks = self.read_all(owner_id).await?;
        Ok(tasks.into_iter().find(|t| t.id == task_id))
    }

    /// Append a new task and persist before returning it.
    pub async fn create(&self, owner_id: Uuid, draft: TaskDraft) -> Result<Task, StoreError> {
        let lock = self.owner_lock(owner_id).await;
        let _guard = lock.lock().await;

        let mut tasks = self.read_all(owner_id).await?;

        let now = OffsetDateTime::now_utc();
        let task = Task {
            id: Uuid::new_v4(),
            owner_id,
            title: draft.title,
            description: draft.description,
            status: draft.status,
            priority: draft.priority,
            due_date: draft.due_date,
            created_at: now,
            updated_at: now,
        };

        tasks.push(task.clone());
        self.write_all(owner_id, &tasks).await?;

        info!(task_id = %task.id, owner_id = %owner_id, "task created");
        Ok(task)
    }

    /// Merge a patch into an existing task. `None` if no task matches.
    pub async fn update(
        &self,
        owner_id: Uuid,
        task_id: Uuid,
        patch: TaskPatch,
    ) -> Result<Option<Task>, StoreError> {
        let lock = self.owner_lock(owner_id).await;
        let _guard = lock.lock().await;

        let mut tasks = self.read_all(owner_id).await?;
        let Some(task) = tasks.iter_mut().find(|t| t.id == task_id) else {
            return Ok(None);
        };

        patch.apply(task);
        let updated = task.clone();
        self.write_all(owner_id, &tasks).await?;

        info!(task_id = %task_id, owner_id = %owner_id, "task updated");
        Ok(Some(updated))
    }

    /// Remove a task. `false` if no task matches (not an error).
    pub async fn delete(&self, owner_id: Uuid, task_id: Uuid) -> Result<bool, StoreError> {
        let lock = self.owner_lock(owner_id).await;
        let _guard = lock.lock().await;

        let mut tasks = self.read_all(owner_id).await?;
        let before = tasks.len();
        tasks.retain(|t| t.id != task_id);
        if tasks.len() == before {
            return Ok(false);
        }

        self.write_all(owner_id, &tasks).await?;
        info!(task_id = %task_id, owner_id = %owner_id, "task deleted");
        Ok(true)
    }
}
