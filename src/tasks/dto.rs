use serde::{Deserialize, Deserializer, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::error::ApiError;
use crate::tasks::repo::{Task, TaskDraft, TaskPatch, TaskPriority, TaskStatus};

const STATUS_VALUES: &str = "pending, in-progress, completed";
const PRIORITY_VALUES: &str = "low, medium, high";
const TITLE_MAX: usize = 200;

/// Request body for task creation. Enum-ish fields arrive as strings so the
/// API can answer with field-level validation messages instead of a bare
/// deserialization rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<String>,
}

/// Request body for task update. All fields optional; an absent field means
/// "no change". `dueDate` distinguishes absent (keep) from null (clear).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "some_if_present")]
    pub due_date: Option<Option<String>>,
}

/// Wraps a present-but-possibly-null field in an outer `Some`.
fn some_if_present<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl CreateTaskRequest {
    pub fn into_draft(self) -> Result<TaskDraft, ApiError> {
        let mut errors = Vec::new();

        let title = match self.title {
            Some(t) if !t.trim().is_empty() => {
                if t.len() > TITLE_MAX {
                    errors.push(format!("Title must be {TITLE_MAX} characters or less"));
                }
                t
            }
            _ => {
                errors.push("Title is required and must be a non-empty string".to_string());
                String::new()
            }
        };

        let status = parse_status(self.status.as_deref(), &mut errors);
        let priority = parse_priority(self.priority.as_deref(), &mut errors);
        let due_date = match self.due_date.as_deref() {
            Some(raw) => parse_due_date(raw, &mut errors),
            None => None,
        };

        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        Ok(TaskDraft {
            title,
            description: self.description.unwrap_or_default(),
            status: status.unwrap_or(TaskStatus::Pending),
            priority: priority.unwrap_or(TaskPriority::Medium),
            due_date,
        })
    }
}

impl UpdateTaskRequest {
    pub fn into_patch(self) -> Result<TaskPatch, ApiError> {
        let mut errors = Vec::new();

        let title = match self.title {
            Some(t) => {
                if t.trim().is_empty() {
                    errors.push("Title must be a non-empty string".to_string());
                } else if t.len() > TITLE_MAX {
                    errors.push(format!("Title must be {TITLE_MAX} characters or less"));
                }
                Some(t)
            }
            None => None,
        };

        let status = parse_status(self.status.as_deref(), &mut errors);
        let priority = parse_priority(self.priority.as_deref(), &mut errors);
        let due_date = match self.due_date {
            Some(Some(raw)) => match parse_due_date(&raw, &mut errors) {
                Some(date) => Some(Some(date)),
                None => None,
            },
            Some(None) => Some(None),
            None => None,
        };

        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        Ok(TaskPatch {
            title,
            description: self.description,
            status,
            priority,
            due_date,
        })
    }
}

fn parse_status(raw: Option<&str>, errors: &mut Vec<String>) -> Option<TaskStatus> {
    let raw = raw?;
    let status = TaskStatus::parse(raw);
    if status.is_none() {
        errors.push(format!("Status must be one of: {STATUS_VALUES}"));
    }
    status
}

fn parse_priority(raw: Option<&str>, errors: &mut Vec<String>) -> Option<TaskPriority> {
    let raw = raw?;
    let priority = TaskPriority::parse(raw);
    if priority.is_none() {
        errors.push(format!("Priority must be one of: {PRIORITY_VALUES}"));
    }
    priority
}

fn parse_due_date(raw: &str, errors: &mut Vec<String>) -> Option<OffsetDateTime> {
    match OffsetDateTime::parse(raw, &Rfc3339) {
        Ok(date) => Some(date),
        Err(_) => {
            errors.push("Due date must be a valid RFC 3339 date-time string".to_string());
            None
        }
    }
}

/// Response envelope for the task list.
#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub success: bool,
    pub count: usize,
    pub data: Vec<Task>,
}

/// Response envelope for a single task.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub success: bool,
    pub data: Task,
}

/// Response envelope for deletion.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_request(json: &str) -> CreateTaskRequest {
        serde_json::from_str(json).unwrap()
    }

    fn update_request(json: &str) -> UpdateTaskRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn create_applies_defaults() {
        let draft = create_request(r#"{"title":"Buy milk"}"#).into_draft().unwrap();
        assert_eq!(draft.title, "Buy milk");
        assert_eq!(draft.description, "");
        assert_eq!(draft.status, TaskStatus::Pending);
        assert_eq!(draft.priority, TaskPriority::Medium);
        assert!(draft.due_date.is_none());
    }

    #[test]
    fn create_requires_title() {
        let err = create_request(r#"{"description":"no title"}"#)
            .into_draft()
            .unwrap_err();
        let ApiError::Validation(messages) = err else {
            panic!("expected validation error");
        };
        assert_eq!(
            messages,
            vec!["Title is required and must be a non-empty string"]
        );
    }

    #[test]
    fn create_rejects_overlong_title() {
        let long = "x".repeat(201);
        let err = create_request(&format!(r#"{{"title":"{long}"}}"#))
            .into_draft()
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn create_rejects_unknown_status_and_priority() {
        let err = create_request(r#"{"title":"t","status":"done","priority":"urgent"}"#)
            .into_draft()
            .unwrap_err();
        let ApiError::Validation(messages) = err else {
            panic!("expected validation error");
        };
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("pending, in-progress, completed"));
        assert!(messages[1].contains("low, medium, high"));
    }

    #[test]
    fn create_parses_rfc3339_due_date() {
        let draft = create_request(r#"{"title":"t","dueDate":"2026-09-01T12:00:00Z"}"#)
            .into_draft()
            .unwrap();
        assert!(draft.due_date.is_some());

        let err = create_request(r#"{"title":"t","dueDate":"next tuesday"}"#)
            .into_draft()
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn update_with_empty_body_changes_nothing() {
        let patch = update_request("{}").into_patch().unwrap();
        assert!(patch.title.is_none());
        assert!(patch.description.is_none());
        assert!(patch.status.is_none());
        assert!(patch.priority.is_none());
        assert!(patch.due_date.is_none());
    }

    #[test]
    fn update_null_title_means_no_change() {
        let patch = update_request(r#"{"title":null}"#).into_patch().unwrap();
        assert!(patch.title.is_none());
    }

    #[test]
    fn update_rejects_blank_title() {
        let err = update_request(r#"{"title":"   "}"#).into_patch().unwrap_err();
        let ApiError::Validation(messages) = err else {
            panic!("expected validation error");
        };
        assert_eq!(messages, vec!["Title must be a non-empty string"]);
    }

    #[test]
    fn update_distinguishes_absent_and_null_due_date() {
        let absent = update_request(r#"{"status":"completed"}"#).into_patch().unwrap();
        assert!(absent.due_date.is_none());

        let null = update_request(r#"{"dueDate":null}"#).into_patch().unwrap();
        assert_eq!(null.due_date, Some(None));

        let set = update_request(r#"{"dueDate":"2026-09-01T12:00:00Z"}"#)
            .into_patch()
            .unwrap();
        assert!(matches!(set.due_date, Some(Some(_))));
    }
}
