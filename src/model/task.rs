use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Task priority, as the server stores it. The wire value for the unset
/// variant is the empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    #[default]
    #[serde(rename = "")]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Parse user input (case-insensitive). Empty or "none" clears the field.
    pub fn parse(s: &str) -> Option<Priority> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "NONE" => Some(Priority::None),
            "LOW" => Some(Priority::Low),
            "MEDIUM" => Some(Priority::Medium),
            "HIGH" => Some(Priority::High),
            "CRITICAL" => Some(Priority::Critical),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::None => "",
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }
}

/// One close/reopen cycle in a task's audit history. At most one log per task
/// has `reopened_at == None`; that is the currently open closure record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosureLog {
    pub id: String,
    pub closed_at: DateTime<Utc>,
    pub reopened_at: Option<DateTime<Utc>>,
    pub reopen_reason: Option<String>,
}

/// A unit of work on the board. A "subtask" is any task with one or more
/// parents; parent links are many-to-many, so a task can appear under several
/// parents while living in at most one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,

    /// Column placement. None for subtasks that only render under a parent.
    #[serde(default)]
    pub column_id: Option<String>,

    /// Parent pointers. Empty means top-level.
    #[serde(default)]
    pub parent_task_ids: Vec<String>,
    /// The parent used for breadcrumbs and the default detail view.
    /// Must be a member of `parent_task_ids` when set.
    #[serde(default)]
    pub primary_parent_id: Option<String>,

    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub xp: i64,
    /// Estimated effort in seconds (edited as hours in the CLI).
    #[serde(default)]
    pub estimated_sec: i64,
    #[serde(default)]
    pub notes: String,
    /// Free-text external references, not FK-enforced.
    #[serde(default)]
    pub dependency_external_ids: Vec<String>,

    // Time tracking
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub log_hours: f64,

    // Audit
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closure_logs: Vec<ClosureLog>,
}

impl Task {
    /// Create a fresh open task in the given column.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        column_id: impl Into<String>,
    ) -> Self {
        Task {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            column_id: Some(column_id.into()),
            parent_task_ids: Vec::new(),
            primary_parent_id: None,
            external_id: None,
            state: String::new(),
            status: String::new(),
            priority: Priority::None,
            xp: 0,
            estimated_sec: 0,
            notes: String::new(),
            dependency_external_ids: Vec::new(),
            start_at: None,
            end_at: None,
            log_hours: 0.0,
            created_at: Utc::now(),
            closed_at: None,
            closure_logs: Vec::new(),
        }
    }

    /// Completion is derived from `closed_at`, never stored separately.
    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }

    /// True if this task renders as a subtask somewhere.
    pub fn has_parents(&self) -> bool {
        !self.parent_task_ids.is_empty()
    }
}
