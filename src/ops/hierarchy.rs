//! Derived views and edits over the flat parent-link set. Parent links are
//! many-to-many; one parent may be designated "primary" and drives breadcrumb
//! display. All derivations tolerate cyclic data from the server, and all
//! edits refuse to create cycles in the first place.

use std::collections::HashSet;

use crate::model::board::{Board, Task};

/// Error type for parent-link edits
#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    #[error("task not found: {0}")]
    UnknownTask(String),
    #[error("task {0} cannot be its own parent")]
    SelfLink(String),
    #[error("linking {child} under {parent} would create a cycle")]
    WouldCycle { child: String, parent: String },
}

/// The ancestor chain for a task, root first, ending with the task itself.
/// Walks the primary parent, falling back to the first listed parent. On
/// cyclic data the walk stops at the first revisited id and returns the
/// partial chain rather than looping.
pub fn breadcrumbs<'a>(board: &'a Board, task_id: &str) -> Vec<&'a Task> {
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut current = task_id.to_string();

    while let Some(task) = board.task(&current) {
        if !visited.insert(task.id.clone()) {
            break;
        }
        chain.push(task);
        let next = task
            .primary_parent_id
            .clone()
            .or_else(|| task.parent_task_ids.first().cloned());
        match next {
            Some(parent_id) => current = parent_id,
            None => break,
        }
    }

    chain.reverse();
    chain
}

/// True if `ancestor_id` is reachable from `task_id` through any chain of
/// parent links. Follows every parent, not just the primary one.
pub fn is_ancestor(board: &Board, ancestor_id: &str, task_id: &str) -> bool {
    let mut visited = HashSet::new();
    let mut stack: Vec<String> = board
        .task(task_id)
        .map(|t| t.parent_task_ids.clone())
        .unwrap_or_default();

    while let Some(id) = stack.pop() {
        if id == ancestor_id {
            return true;
        }
        if !visited.insert(id.clone()) {
            continue;
        }
        if let Some(task) = board.task(&id) {
            stack.extend(task.parent_task_ids.iter().cloned());
        }
    }
    false
}

/// Direct children of a task, in task-map order.
pub fn children_of<'a>(board: &'a Board, task_id: &str) -> Vec<&'a Task> {
    board
        .tasks
        .values()
        .filter(|t| t.parent_task_ids.iter().any(|p| p == task_id))
        .collect()
}

/// Link `child_id` under `parent_id`. Rejects self-links, unknown ids, and
/// any link that would make the child its own ancestor.
pub fn add_parent(board: &mut Board, child_id: &str, parent_id: &str) -> Result<(), HierarchyError> {
    validate_link(board, child_id, parent_id)?;
    let child = board
        .tasks
        .get_mut(child_id)
        .expect("child checked in validate_link");
    if !child.parent_task_ids.iter().any(|p| p == parent_id) {
        child.parent_task_ids.push(parent_id.to_string());
    }
    Ok(())
}

/// Unlink a parent. Removing the primary parent also clears the pointer.
pub fn remove_parent(
    board: &mut Board,
    child_id: &str,
    parent_id: &str,
) -> Result<(), HierarchyError> {
    let child = board
        .tasks
        .get_mut(child_id)
        .ok_or_else(|| HierarchyError::UnknownTask(child_id.to_string()))?;
    child.parent_task_ids.retain(|p| p != parent_id);
    if child.primary_parent_id.as_deref() == Some(parent_id) {
        child.primary_parent_id = None;
    }
    Ok(())
}

/// Designate a primary parent. A parent not yet in the set is added to it
/// first, as one combined operation.
pub fn set_primary_parent(
    board: &mut Board,
    child_id: &str,
    parent_id: &str,
) -> Result<(), HierarchyError> {
    add_parent(board, child_id, parent_id)?;
    let child = board
        .tasks
        .get_mut(child_id)
        .expect("child checked in add_parent");
    child.primary_parent_id = Some(parent_id.to_string());
    Ok(())
}

/// Detach the task from every parent, making it top-level again.
pub fn clear_parents(board: &mut Board, child_id: &str) -> Result<(), HierarchyError> {
    let child = board
        .tasks
        .get_mut(child_id)
        .ok_or_else(|| HierarchyError::UnknownTask(child_id.to_string()))?;
    child.parent_task_ids.clear();
    child.primary_parent_id = None;
    Ok(())
}

fn validate_link(board: &Board, child_id: &str, parent_id: &str) -> Result<(), HierarchyError> {
    if board.task(child_id).is_none() {
        return Err(HierarchyError::UnknownTask(child_id.to_string()));
    }
    if board.task(parent_id).is_none() {
        return Err(HierarchyError::UnknownTask(parent_id.to_string()));
    }
    if child_id == parent_id {
        return Err(HierarchyError::SelfLink(child_id.to_string()));
    }
    // The child being an ancestor of the prospective parent is exactly the
    // chain that would close into a cycle.
    if is_ancestor(board, child_id, parent_id) {
        return Err(HierarchyError::WouldCycle {
            child: child_id.to_string(),
            parent: parent_id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::board::Column;
    use crate::model::task::Task;
    use crate::store::{Action, apply};

    fn board_with_chain() -> Board {
        // root <- mid <- leaf via primary parents
        let mut board = Board::new("b1", "Demo");
        board
            .columns
            .insert("c1".to_string(), Column::new("c1", "To Do"));
        for id in ["root", "mid", "leaf", "other"] {
            apply(&mut board, Action::AddTask(Task::new(id, id, "c1"))).unwrap();
        }
        set_primary_parent(&mut board, "mid", "root").unwrap();
        set_primary_parent(&mut board, "leaf", "mid").unwrap();
        board
    }

    #[test]
    fn breadcrumbs_walk_root_first() {
        let board = board_with_chain();
        let ids: Vec<_> = breadcrumbs(&board, "leaf").iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["root", "mid", "leaf"]);
    }

    #[test]
    fn breadcrumbs_fall_back_to_first_parent_without_primary() {
        let mut board = board_with_chain();
        board.tasks.get_mut("leaf").unwrap().primary_parent_id = None;
        let ids: Vec<_> = breadcrumbs(&board, "leaf").iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["root", "mid", "leaf"]);
    }

    #[test]
    fn breadcrumbs_terminate_on_cyclic_data() {
        let mut board = board_with_chain();
        // Force a cycle the way bad server data could: root points at leaf.
        {
            let root = board.tasks.get_mut("root").unwrap();
            root.parent_task_ids = vec!["leaf".into()];
            root.primary_parent_id = Some("leaf".into());
        }
        let chain = breadcrumbs(&board, "leaf");
        assert!(chain.len() <= 3, "cycle guard must bound the walk");
        assert_eq!(chain.last().unwrap().id, "leaf");
    }

    #[test]
    fn add_parent_rejects_self_link() {
        let mut board = board_with_chain();
        assert!(matches!(
            add_parent(&mut board, "leaf", "leaf"),
            Err(HierarchyError::SelfLink(_))
        ));
    }

    #[test]
    fn add_parent_rejects_cycles_through_any_chain() {
        let mut board = board_with_chain();
        let result = add_parent(&mut board, "root", "leaf");
        assert!(matches!(result, Err(HierarchyError::WouldCycle { .. })));
        // A diamond is fine: other -> root alongside mid -> root.
        add_parent(&mut board, "other", "root").unwrap();
    }

    #[test]
    fn add_parent_is_idempotent() {
        let mut board = board_with_chain();
        add_parent(&mut board, "other", "root").unwrap();
        add_parent(&mut board, "other", "root").unwrap();
        assert_eq!(board.task("other").unwrap().parent_task_ids, vec!["root"]);
    }

    #[test]
    fn removing_the_primary_parent_clears_the_pointer() {
        let mut board = board_with_chain();
        remove_parent(&mut board, "leaf", "mid").unwrap();
        let leaf = board.task("leaf").unwrap();
        assert!(leaf.parent_task_ids.is_empty());
        assert_eq!(leaf.primary_parent_id, None);
    }

    #[test]
    fn set_primary_adds_to_the_parent_set_first() {
        let mut board = board_with_chain();
        set_primary_parent(&mut board, "other", "root").unwrap();
        let other = board.task("other").unwrap();
        assert_eq!(other.parent_task_ids, vec!["root"]);
        assert_eq!(other.primary_parent_id.as_deref(), Some("root"));
    }

    #[test]
    fn clear_parents_detaches_everything() {
        let mut board = board_with_chain();
        clear_parents(&mut board, "leaf").unwrap();
        let leaf = board.task("leaf").unwrap();
        assert!(leaf.parent_task_ids.is_empty());
        assert_eq!(leaf.primary_parent_id, None);
    }

    #[test]
    fn children_of_follows_any_parent_link() {
        let board = board_with_chain();
        let ids: Vec<_> = children_of(&board, "root").iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["mid"]);
    }
}
