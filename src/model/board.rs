use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use super::task::Task;

/// An ordered bucket of task ids (e.g. "To Do"). A task id appears in at most
/// one column's `task_ids` across the whole board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub task_ids: Vec<String>,
}

impl Column {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Column {
            id: id.into(),
            name: name.into(),
            task_ids: Vec::new(),
        }
    }
}

/// The normalized board aggregate: columns in display order, tasks keyed by
/// id. All reads go through here; all writes go through `store::apply`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub columns: IndexMap<String, Column>,
    #[serde(default)]
    pub tasks: IndexMap<String, Task>,
}

impl Board {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Board {
            id: id.into(),
            name: name.into(),
            columns: IndexMap::new(),
            tasks: IndexMap::new(),
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.get(id)
    }

    /// The column currently listing this task id, if any.
    pub fn column_holding(&self, task_id: &str) -> Option<&Column> {
        self.columns
            .values()
            .find(|c| c.task_ids.iter().any(|t| t == task_id))
    }
}
