//! The board state reducer: one explicit `Board` value, a closed set of
//! actions, and a single `apply` entry point. Column membership and the task
//! map always change together in one call, so readers never observe a task
//! half-moved between columns.

use tracing::debug;

use crate::model::board::{Board, Column, Task};
use crate::model::fields::{TaskPatch, apply_field};

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    UnknownTask(String),
    #[error("column not found: {0}")]
    UnknownColumn(String),
}

/// A state transition on the board.
#[derive(Debug, Clone)]
pub enum Action {
    /// Replace the whole board (initial load).
    Hydrate(Board),
    /// Insert a new task and append it to its column.
    AddTask(Task),
    /// Merge field edits into a task. Never changes column membership.
    PatchTask { id: String, patch: TaskPatch },
    /// Replace a task with the server's canonical copy, fixing column
    /// membership if the server moved it (e.g. Done-column recomputation).
    ReplaceTask(Task),
    /// Move a task to another column (append semantics).
    MoveTask { id: String, to_column_id: String },
}

/// Apply one action to the board. Unknown-task patches are no-ops; inserts
/// into unknown columns are reported as errors.
pub fn apply(board: &mut Board, action: Action) -> Result<(), StoreError> {
    match action {
        Action::Hydrate(next) => {
            *board = next;
            Ok(())
        }

        Action::AddTask(task) => {
            let col_id = task.column_id.clone().unwrap_or_default();
            if !board.columns.contains_key(&col_id) {
                return Err(StoreError::UnknownColumn(col_id));
            }
            detach_everywhere(board, &task.id);
            let col = board.columns.get_mut(&col_id).expect("column checked above");
            col.task_ids.push(task.id.clone());
            board.tasks.insert(task.id.clone(), task);
            Ok(())
        }

        Action::PatchTask { id, patch } => {
            let Some(task) = board.tasks.get_mut(&id) else {
                debug!(task = %id, "patch for unknown task ignored");
                return Ok(());
            };
            for (key, value) in &patch {
                apply_field(task, *key, value);
            }
            Ok(())
        }

        Action::ReplaceTask(task) => {
            let id = task.id.clone();
            let held = board.column_holding(&id).map(|c| c.id.clone());
            let target = task.column_id.clone();
            if held != target {
                detach_everywhere(board, &id);
                if let Some(col_id) = &target {
                    if let Some(col) = board.columns.get_mut(col_id) {
                        attach_once(col, &id);
                    }
                }
            }
            board.tasks.insert(id, task);
            Ok(())
        }

        Action::MoveTask { id, to_column_id } => {
            if !board.tasks.contains_key(&id) {
                return Err(StoreError::UnknownTask(id));
            }
            if !board.columns.contains_key(&to_column_id) {
                return Err(StoreError::UnknownColumn(to_column_id));
            }
            detach_everywhere(board, &id);
            let col = board
                .columns
                .get_mut(&to_column_id)
                .expect("column checked above");
            attach_once(col, &id);
            let task = board.tasks.get_mut(&id).expect("task checked above");
            task.column_id = Some(to_column_id);
            Ok(())
        }
    }
}

/// Tasks in a column, in the column's order, excluding tasks with parents
/// (those render nested under a parent, not as independent cards).
pub fn tasks_in_column<'a>(board: &'a Board, column_id: &str) -> Vec<&'a Task> {
    let Some(col) = board.columns.get(column_id) else {
        return Vec::new();
    };
    col.task_ids
        .iter()
        .filter_map(|id| board.tasks.get(id))
        .filter(|t| !t.has_parents())
        .collect()
}

/// Remove a task id from every column's list. Paired with an attach in the
/// same `apply` call so the single-column invariant holds at every return.
fn detach_everywhere(board: &mut Board, task_id: &str) {
    for col in board.columns.values_mut() {
        col.task_ids.retain(|t| t != task_id);
    }
}

/// Append a task id, deduplicating against double-insertion from replayed or
/// concurrent events.
fn attach_once(col: &mut Column, task_id: &str) {
    if !col.task_ids.iter().any(|t| t == task_id) {
        col.task_ids.push(task_id.to_string());
    }
}
