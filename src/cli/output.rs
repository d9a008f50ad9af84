use serde::Serialize;

use crate::model::task::{ClosureLog, Priority, Task};
use crate::ops::search::SearchHit;
use crate::sync::api::ImportOutcome;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskJson {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_id: Option<String>,
    pub closed: bool,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub priority: &'static str,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub state: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
    pub xp: i64,
    pub estimated_sec: i64,
    pub log_hours: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parent_task_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_parent_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependency_external_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub closure_logs: Vec<ClosureLogJson>,
}

#[derive(Serialize)]
pub struct ClosureLogJson {
    pub closed_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reopened_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reopen_reason: Option<String>,
}

#[derive(Serialize)]
pub struct ColumnJson {
    pub id: String,
    pub name: String,
    pub tasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct BoardJson {
    pub id: String,
    pub name: String,
    pub columns: Vec<ColumnJson>,
}

#[derive(Serialize)]
pub struct ShowJson {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub breadcrumbs: Vec<String>,
    #[serde(flatten)]
    pub task: TaskJson,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<TaskJson>,
}

#[derive(Serialize)]
pub struct SearchHitJson {
    pub task_id: String,
    pub title: String,
    pub field: &'static str,
}

#[derive(Serialize)]
pub struct ImportJson {
    pub created: usize,
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn task_to_json(task: &Task) -> TaskJson {
    TaskJson {
        id: task.id.clone(),
        title: task.title.clone(),
        external_id: task.external_id.clone(),
        column_id: task.column_id.clone(),
        closed: task.is_closed(),
        priority: task.priority.as_str(),
        state: task.state.clone(),
        status: task.status.clone(),
        description: task.description.clone(),
        notes: task.notes.clone(),
        xp: task.xp,
        estimated_sec: task.estimated_sec,
        log_hours: task.log_hours,
        parent_task_ids: task.parent_task_ids.clone(),
        primary_parent_id: task.primary_parent_id.clone(),
        dependency_external_ids: task.dependency_external_ids.clone(),
        closure_logs: task.closure_logs.iter().map(closure_log_to_json).collect(),
    }
}

fn closure_log_to_json(log: &ClosureLog) -> ClosureLogJson {
    ClosureLogJson {
        closed_at: log.closed_at.to_rfc3339(),
        reopened_at: log.reopened_at.map(|t| t.to_rfc3339()),
        reopen_reason: log.reopen_reason.clone(),
    }
}

pub fn search_hit_to_json(hit: &SearchHit) -> SearchHitJson {
    SearchHitJson {
        task_id: hit.task_id.clone(),
        title: hit.title.clone(),
        field: hit.field.as_str(),
    }
}

pub fn import_to_json(outcome: ImportOutcome) -> ImportJson {
    ImportJson {
        created: outcome.created,
        skipped: outcome.skipped,
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn priority_marker(priority: Priority) -> &'static str {
    match priority {
        Priority::None => "",
        Priority::Low => " !",
        Priority::Medium => " !!",
        Priority::High => " !!!",
        Priority::Critical => " !!!!",
    }
}

/// Format a single task as a one-line summary
pub fn format_task_line(task: &Task) -> String {
    let marker = if task.is_closed() { "x" } else { " " };
    let ext = task
        .external_id
        .as_ref()
        .map(|e| format!(" ({})", e))
        .unwrap_or_default();
    format!(
        "[{}] {}{} {}{}",
        marker,
        task.id,
        ext,
        task.title,
        priority_marker(task.priority)
    )
}

/// Format the detailed task view
pub fn format_task_detail(task: &Task) -> Vec<String> {
    let mut lines = vec![format_task_line(task)];

    if !task.state.is_empty() {
        lines.push(format!("  state: {}", task.state));
    }
    if !task.status.is_empty() {
        lines.push(format!("  status: {}", task.status));
    }
    if task.estimated_sec > 0 {
        lines.push(format!(
            "  estimate: {:.1}h",
            task.estimated_sec as f64 / 3600.0
        ));
    }
    if task.log_hours > 0.0 {
        lines.push(format!("  logged: {:.1}h", task.log_hours));
    }
    if task.xp > 0 {
        lines.push(format!("  xp: {}", task.xp));
    }
    if !task.dependency_external_ids.is_empty() {
        lines.push(format!(
            "  deps: {}",
            task.dependency_external_ids.join(", ")
        ));
    }
    if !task.description.is_empty() {
        lines.push(String::new());
        for line in task.description.lines() {
            lines.push(format!("  {}", line));
        }
    }
    if !task.notes.is_empty() {
        lines.push(String::new());
        lines.push("  notes:".to_string());
        for line in task.notes.lines() {
            lines.push(format!("  {}", line));
        }
    }
    for log in &task.closure_logs {
        let mut entry = format!("  closed {}", log.closed_at.format("%Y-%m-%d %H:%M"));
        if let Some(reopened) = log.reopened_at {
            entry.push_str(&format!(", reopened {}", reopened.format("%Y-%m-%d %H:%M")));
        }
        if let Some(reason) = &log.reopen_reason {
            entry.push_str(&format!(" ({})", reason));
        }
        lines.push(entry);
    }
    lines
}

/// Format a breadcrumb chain, root first: `root > mid > leaf`
pub fn format_breadcrumbs(chain: &[&Task]) -> String {
    chain
        .iter()
        .map(|t| t.title.as_str())
        .collect::<Vec<_>>()
        .join(" > ")
}

pub fn format_search_hit(hit: &SearchHit) -> String {
    format!("{} [{}] {}", hit.task_id, hit.field.as_str(), hit.title)
}
