//! Drag-and-drop reordering, reduced to its decision core: given a picked-up
//! task and a drop target, either produce a move intent or nothing. Dropping
//! onto a card means "the column that card lives in", dropping within the
//! source column is a no-op, and the landing position is always the end of
//! the destination column.

use crate::model::board::Board;

/// A task picked up from its current column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragGesture {
    pub task_id: String,
    pub source_column_id: String,
}

/// Where the task was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// Empty space in a column
    Column(String),
    /// On top of another card; resolves to that card's column
    Card(String),
}

/// The move a completed drag asks for. `position` is 1-based and always the
/// end of the destination column (append semantics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveIntent {
    pub task_id: String,
    pub to_column_id: String,
    pub position: usize,
}

/// Start a drag. Returns None when the task is unknown or floats outside any
/// column (subtasks shown only in a parent's detail pane).
pub fn begin_drag(board: &Board, task_id: &str) -> Option<DragGesture> {
    let task = board.task(task_id)?;
    let source_column_id = task.column_id.clone()?;
    Some(DragGesture {
        task_id: task_id.to_string(),
        source_column_id,
    })
}

/// Finish a drag. Returns None when the drop resolves to the source column,
/// the target does not exist, or a card target has no column of its own.
pub fn resolve_drop(board: &Board, gesture: &DragGesture, target: &DropTarget) -> Option<MoveIntent> {
    let to_column_id = match target {
        DropTarget::Column(id) => {
            board.column(id)?;
            id.clone()
        }
        DropTarget::Card(card_id) => board.task(card_id)?.column_id.clone()?,
    };
    if to_column_id == gesture.source_column_id {
        return None;
    }
    let position = board.column(&to_column_id)?.task_ids.len() + 1;
    Some(MoveIntent {
        task_id: gesture.task_id.clone(),
        to_column_id,
        position,
    })
}
