//! The persistence API boundary. The server owns canonical state; the client
//! talks to it through the `Persistence` trait so the mutation layer can be
//! driven by an in-memory fake in tests and by HTTP in production.

use std::io::Read;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::model::board::{Board, Column};
use crate::model::task::{Priority, Task};

/// Error type for persistence calls
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("server rejected the request ({status}): {message}")]
    Status { status: u16, message: String },
    #[error("could not reach the server: {0}")]
    Transport(String),
    #[error("could not decode the server response: {0}")]
    Decode(String),
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Decode(e.to_string())
    }
}

/// The nested board graph as the server returns it on initial load.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub columns: Vec<ColumnPayload>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl BoardPayload {
    /// Normalize the nested payload into the flat store shape: columns in
    /// position order, `task_ids` from the server's task order, tasks keyed
    /// by id.
    pub fn into_board(self) -> Board {
        let mut board = Board::new(self.id, self.name);
        let mut columns = self.columns;
        columns.sort_by_key(|c| c.position);
        for payload in columns {
            let mut column = Column::new(payload.id.clone(), payload.name);
            for task in payload.tasks {
                column.task_ids.push(task.id.clone());
                board.tasks.insert(task.id.clone(), task);
            }
            board.columns.insert(payload.id, column);
        }
        board
    }
}

/// Fields for a new task. Only title and column are required; a primary
/// parent, if set, must also appear in `parent_task_ids` (the session
/// enforces this before the draft is sent).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    pub column_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parent_task_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_parent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_sec: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency_external_ids: Option<Vec<String>>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, column_id: impl Into<String>) -> Self {
        TaskDraft {
            title: title.into(),
            column_id: column_id.into(),
            ..Default::default()
        }
    }
}

/// Result of a subtask spreadsheet import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImportOutcome {
    pub created: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

/// A wire patch: changed camelCase keys only, already encoded by the field
/// codec.
pub type WirePatch = serde_json::Map<String, Value>;

/// Everything the board client needs from the server.
pub trait Persistence {
    /// `GET /boards/{id}`: the full board graph, loaded once per session.
    fn fetch_board(&self, board_id: &str) -> Result<BoardPayload, ApiError>;
    /// `GET /tasks/{id}`: one task with closure logs and subtasks.
    fn fetch_task(&self, id: &str) -> Result<Task, ApiError>;
    /// `POST /tasks`: returns the created task with generated ids.
    fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError>;
    /// `PATCH /tasks`: body is `{id, ...changed fields}`; returns the full
    /// updated task (the server may recompute fields, e.g. `closedAt` when a
    /// schema variant maps "Done" columns to closure).
    fn patch_task(&self, id: &str, patch: &WirePatch) -> Result<Task, ApiError>;
    /// `DELETE /tasks/{id}`: the soft delete: closes the task and appends a
    /// closure log; returns the updated task.
    fn close_task(&self, id: &str) -> Result<Task, ApiError>;
    /// `POST /tasks/{id}/reopen`: finalizes the open closure log.
    fn reopen_task(&self, id: &str, reason: &str) -> Result<Task, ApiError>;
    /// `POST /tasks/{id}/import`: multipart spreadsheet upload; the server
    /// does the workbook parsing and returns created/skipped counts.
    fn import_subtasks(
        &self,
        id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<ImportOutcome, ApiError>;
    /// `GET /tasks/{id}/export?format=`: the task row plus its subtask rows.
    fn export_task(&self, id: &str, format: ExportFormat) -> Result<Vec<u8>, ApiError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

pub struct HttpApi {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(timeout_secs))
            .build();
        HttpApi {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Map a ureq error, pulling the server's `{"error": …}` message out of
/// non-2xx bodies when there is one.
fn map_err(e: ureq::Error) -> ApiError {
    match e {
        ureq::Error::Status(status, response) => {
            let message = response
                .into_json::<Value>()
                .ok()
                .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| format!("HTTP {}", status));
            ApiError::Status { status, message }
        }
        ureq::Error::Transport(t) => ApiError::Transport(t.to_string()),
    }
}

fn decode<T: serde::de::DeserializeOwned>(response: ureq::Response) -> Result<T, ApiError> {
    response.into_json().map_err(|e| ApiError::Decode(e.to_string()))
}

impl Persistence for HttpApi {
    fn fetch_board(&self, board_id: &str) -> Result<BoardPayload, ApiError> {
        let url = self.url(&format!("/boards/{}", board_id));
        debug!(%url, "fetch board");
        decode(self.agent.get(&url).call().map_err(map_err)?)
    }

    fn fetch_task(&self, id: &str) -> Result<Task, ApiError> {
        let url = self.url(&format!("/tasks/{}", id));
        debug!(%url, "fetch task");
        decode(self.agent.get(&url).call().map_err(map_err)?)
    }

    fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
        let url = self.url("/tasks");
        debug!(%url, title = %draft.title, "create task");
        decode(
            self.agent
                .post(&url)
                .send_json(serde_json::to_value(draft).map_err(|e| ApiError::Decode(e.to_string()))?)
                .map_err(map_err)?,
        )
    }

    fn patch_task(&self, id: &str, patch: &WirePatch) -> Result<Task, ApiError> {
        let url = self.url("/tasks");
        let mut body = patch.clone();
        body.insert("id".to_string(), Value::String(id.to_string()));
        debug!(%url, task = %id, keys = ?patch.keys().collect::<Vec<_>>(), "patch task");
        decode(
            self.agent
                .request("PATCH", &url)
                .send_json(Value::Object(body))
                .map_err(map_err)?,
        )
    }

    fn close_task(&self, id: &str) -> Result<Task, ApiError> {
        let url = self.url(&format!("/tasks/{}", id));
        debug!(%url, "close task");
        decode(self.agent.delete(&url).call().map_err(map_err)?)
    }

    fn reopen_task(&self, id: &str, reason: &str) -> Result<Task, ApiError> {
        let url = self.url(&format!("/tasks/{}/reopen", id));
        debug!(%url, "reopen task");
        decode(
            self.agent
                .post(&url)
                .send_json(serde_json::json!({ "reason": reason }))
                .map_err(map_err)?,
        )
    }

    fn import_subtasks(
        &self,
        id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<ImportOutcome, ApiError> {
        let url = self.url(&format!("/tasks/{}/import", id));
        debug!(%url, filename, size = bytes.len(), "import subtasks");
        let boundary = format!("----corkboard-{:x}", std::process::id() as u64 ^ bytes.len() as u64);
        let mut body = Vec::with_capacity(bytes.len() + 256);
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        decode(
            self.agent
                .post(&url)
                .set(
                    "Content-Type",
                    &format!("multipart/form-data; boundary={}", boundary),
                )
                .send_bytes(&body)
                .map_err(map_err)?,
        )
    }

    fn export_task(&self, id: &str, format: ExportFormat) -> Result<Vec<u8>, ApiError> {
        let url = self.url(&format!("/tasks/{}/export?format={}", id, format.as_str()));
        debug!(%url, "export task");
        let response = self.agent.get(&url).call().map_err(map_err)?;
        let mut bytes = Vec::new();
        response.into_reader().read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn board_payload_normalizes_by_position() {
        let payload: BoardPayload = serde_json::from_value(serde_json::json!({
            "id": "b1",
            "name": "Demo",
            "columns": [
                { "id": "c2", "name": "Done", "position": 1, "tasks": [] },
                { "id": "c1", "name": "To Do", "position": 0, "tasks": [
                    { "id": "t1", "title": "A", "columnId": "c1",
                      "createdAt": "2024-01-01T00:00:00Z" },
                    { "id": "t2", "title": "B", "columnId": "c1",
                      "createdAt": "2024-01-01T00:00:00Z" }
                ] }
            ]
        }))
        .unwrap();

        let board = payload.into_board();
        let order: Vec<_> = board.columns.keys().cloned().collect();
        assert_eq!(order, vec!["c1", "c2"]);
        assert_eq!(board.column("c1").unwrap().task_ids, vec!["t1", "t2"]);
        assert_eq!(board.tasks.len(), 2);
    }

    #[test]
    fn draft_omits_unset_fields_on_the_wire() {
        let draft = TaskDraft::new("Write proposal", "c1");
        let v = serde_json::to_value(&draft).unwrap();
        assert_eq!(v.get("title").unwrap(), "Write proposal");
        assert_eq!(v.get("columnId").unwrap(), "c1");
        assert!(v.get("parentTaskIds").is_none());
        assert!(v.get("primaryParentId").is_none());
        assert!(v.get("boardId").is_none());
    }
}
