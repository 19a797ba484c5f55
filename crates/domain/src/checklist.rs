use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use ptw_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::permit::PermitId;

/// Hours an issuer has to address a change request.
pub const CHANGES_TASK_DUE_HOURS: i64 = 48;

const TASK_TITLE_COMMENT_CHARS: usize = 120;

/// Checklist line that must be ticked before work may start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    /// Item identifier.
    pub id: Uuid,
    /// Owning permit.
    pub permit_id: PermitId,
    /// Item label.
    pub label: String,
    /// Required items gate the `active` transition.
    pub required: bool,
    /// Whether the item is ticked.
    pub checked: bool,
    /// Actor that last ticked the item.
    pub checked_by: Option<String>,
    /// When the item was ticked.
    pub checked_at: Option<DateTime<Utc>>,
}

impl ChecklistItem {
    /// Creates an unchecked checklist item.
    pub fn new(permit_id: PermitId, label: &str, required: bool) -> AppResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            permit_id,
            label: NonEmptyString::for_field("label", label)?.into(),
            required,
            checked: false,
            checked_by: None,
            checked_at: None,
        })
    }

    /// Ticks or clears the item on behalf of `actor_id`.
    pub fn set_checked(&mut self, checked: bool, actor_id: &str, now: DateTime<Utc>) {
        self.checked = checked;
        self.checked_by = Some(actor_id.to_owned());
        self.checked_at = checked.then_some(now);
    }
}

/// Returns labels of required items that are still unchecked.
#[must_use]
pub fn unchecked_required_labels(items: &[ChecklistItem]) -> Vec<String> {
    items
        .iter()
        .filter(|item| item.required && !item.checked)
        .map(|item| item.label.clone())
        .collect()
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for someone to act.
    Open,
    /// Completed.
    Done,
}

impl TaskStatus {
    /// Returns the stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Done => "done",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "open" => Ok(Self::Open),
            "done" => Ok(Self::Done),
            _ => Err(AppError::Validation(format!("unknown task status '{value}'"))),
        }
    }
}

/// Follow-up work item attached to a permit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitTask {
    /// Task identifier.
    pub id: Uuid,
    /// Owning permit.
    pub permit_id: PermitId,
    /// Task title.
    pub title: String,
    /// Task state.
    pub status: TaskStatus,
    /// Due timestamp.
    pub due_at: Option<DateTime<Utc>>,
    /// Assignee; `None` is a shared backlog item.
    pub assignee: Option<String>,
    /// Completion timestamp.
    pub completed_at: Option<DateTime<Utc>>,
}

impl PermitTask {
    /// Creates the unassigned backlog task that follows a change request.
    #[must_use]
    pub fn for_change_request(permit_id: PermitId, comment: &str, now: DateTime<Utc>) -> Self {
        let summary: String = comment.chars().take(TASK_TITLE_COMMENT_CHARS).collect();
        Self {
            id: Uuid::new_v4(),
            permit_id,
            title: format!("Address changes: {summary}"),
            status: TaskStatus::Open,
            due_at: Some(now + Duration::hours(CHANGES_TASK_DUE_HOURS)),
            assignee: None,
            completed_at: None,
        }
    }

    /// Marks the task done. Completing a done task keeps the first timestamp.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        if self.status == TaskStatus::Done {
            return;
        }

        self.status = TaskStatus::Done;
        self.completed_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{ChecklistItem, PermitTask, TaskStatus, unchecked_required_labels};
    use crate::permit::PermitId;

    #[test]
    fn only_unchecked_required_items_are_reported() {
        let permit_id = PermitId::new();
        let mut isolation = ChecklistItem::new(permit_id, "Isolation applied", true)
            .unwrap_or_else(|_| unreachable!());
        let gas_test =
            ChecklistItem::new(permit_id, "Gas test", true).unwrap_or_else(|_| unreachable!());
        let optional =
            ChecklistItem::new(permit_id, "Photos", false).unwrap_or_else(|_| unreachable!());
        isolation.set_checked(true, "issuer-1", Utc::now());

        let labels = unchecked_required_labels(&[isolation, gas_test, optional]);
        assert_eq!(labels, vec!["Gas test".to_owned()]);
    }

    #[test]
    fn blank_label_is_rejected() {
        assert!(ChecklistItem::new(PermitId::new(), "  ", true).is_err());
    }

    #[test]
    fn unchecking_clears_the_timestamp() {
        let mut item =
            ChecklistItem::new(PermitId::new(), "Barriers", true).unwrap_or_else(|_| unreachable!());
        item.set_checked(true, "a", Utc::now());
        assert!(item.checked_at.is_some());
        item.set_checked(false, "b", Utc::now());
        assert!(item.checked_at.is_none());
        assert_eq!(item.checked_by.as_deref(), Some("b"));
    }

    #[test]
    fn change_request_task_is_due_in_48_hours_and_unassigned() {
        let now = Utc::now();
        let task = PermitTask::for_change_request(PermitId::new(), "fix location", now);
        assert_eq!(task.title, "Address changes: fix location");
        assert_eq!(task.due_at, Some(now + Duration::hours(48)));
        assert_eq!(task.assignee, None);
        assert_eq!(task.status, TaskStatus::Open);
    }

    #[test]
    fn change_request_title_is_truncated() {
        let comment = "x".repeat(500);
        let task = PermitTask::for_change_request(PermitId::new(), &comment, Utc::now());
        assert_eq!(task.title.len(), "Address changes: ".len() + 120);
    }
}
