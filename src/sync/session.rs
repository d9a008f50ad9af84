//! The mutation protocol. Every user-visible edit is one named operation:
//! validate, apply optimistically to the local board, send the request, then
//! merge the server's canonical copy back (server wins on conflicting
//! fields). On persistence failure the optimistic change is rolled back to
//! the captured pre-image and the error is surfaced; the per-field status map
//! keeps the failed intent visible so the caller can offer a retry.
//!
//! Single-threaded by design: the optimistic apply always completes before
//! the request is issued, so a read immediately after a mutation call sees
//! the pending value.

use std::collections::HashMap;

use chrono::Utc;
use tracing::warn;

use crate::model::board::{Board, Task};
use crate::model::fields::{FieldKey, TaskPatch};
use crate::ops::{closure, hierarchy};
use crate::store::{self, Action, StoreError};
use crate::sync::api::{ApiError, ExportFormat, ImportOutcome, Persistence, TaskDraft, WirePatch};

/// Save state of one field edit, driving the inline status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    /// The last attempt failed and was rolled back; the edit can be retried.
    Error,
}

/// Error type for mutation operations. Transport failures never reach the
/// store raw; they arrive here as `Persistence`.
#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("validation: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("persistence: {0}")]
    Persistence(#[from] ApiError),
}

impl From<StoreError> for MutationError {
    fn from(e: StoreError) -> Self {
        MutationError::NotFound(e.to_string())
    }
}

impl From<closure::ClosureError> for MutationError {
    fn from(e: closure::ClosureError) -> Self {
        MutationError::Validation(e.to_string())
    }
}

impl From<hierarchy::HierarchyError> for MutationError {
    fn from(e: hierarchy::HierarchyError) -> Self {
        match e {
            hierarchy::HierarchyError::UnknownTask(id) => MutationError::NotFound(id),
            other => MutationError::Validation(other.to_string()),
        }
    }
}

/// One user's live view of a board: local state plus the persistence channel.
pub struct Session {
    board: Board,
    api: Box<dyn Persistence>,
    statuses: HashMap<(String, FieldKey), SaveStatus>,
}

impl Session {
    /// Hydrate a session by fetching the full board graph once.
    pub fn connect(api: Box<dyn Persistence>, board_id: &str) -> Result<Session, MutationError> {
        let board = api.fetch_board(board_id)?.into_board();
        Ok(Session {
            board,
            api,
            statuses: HashMap::new(),
        })
    }

    /// Build a session around an already-hydrated board (tests, replays).
    pub fn with_board(api: Box<dyn Persistence>, board: Board) -> Session {
        Session {
            board,
            api,
            statuses: HashMap::new(),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn field_status(&self, task_id: &str, key: FieldKey) -> SaveStatus {
        self.statuses
            .get(&(task_id.to_string(), key))
            .copied()
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Operations
    // -----------------------------------------------------------------------

    /// Create a task. There is no optimistic insert; the server generates
    /// the id (and an external id when the draft has none), and the returned
    /// task is added to the store on success.
    pub fn create_task(&mut self, mut draft: TaskDraft) -> Result<Task, MutationError> {
        if draft.title.trim().is_empty() {
            return Err(MutationError::Validation("title is required".into()));
        }
        if draft.column_id.trim().is_empty() {
            return Err(MutationError::Validation("columnId is required".into()));
        }
        if self.board.column(&draft.column_id).is_none() {
            return Err(MutationError::NotFound(draft.column_id.clone()));
        }
        if let Some(primary) = &draft.primary_parent_id {
            if !draft.parent_task_ids.contains(primary) {
                draft.parent_task_ids.push(primary.clone());
            }
        }
        if draft.board_id.is_none() {
            draft.board_id = Some(self.board.id.clone());
        }

        let mut created = self.api.create_task(&draft)?;
        if created.external_id.is_none() {
            created.external_id = Some(gen_external_id("WI"));
        }
        store::apply(&mut self.board, Action::AddTask(created.clone()))?;
        Ok(created)
    }

    /// Merge field edits into a task: optimistic apply, then a PATCH with
    /// only the changed keys.
    pub fn patch_task(&mut self, id: &str, patch: TaskPatch) -> Result<(), MutationError> {
        if patch.is_empty() {
            return Ok(());
        }
        let pre = self.editable_task(id)?.clone();

        for (key, _) in &patch {
            self.set_status(id, *key, SaveStatus::Saving);
        }
        store::apply(
            &mut self.board,
            Action::PatchTask {
                id: id.to_string(),
                patch: patch.clone(),
            },
        )?;

        let mut wire = WirePatch::new();
        for (key, value) in &patch {
            wire.insert(key.wire_name().to_string(), key.encode(value));
        }

        match self.api.patch_task(id, &wire) {
            Ok(canonical) => {
                store::apply(&mut self.board, Action::ReplaceTask(canonical))?;
                for (key, _) in &patch {
                    self.set_status(id, *key, SaveStatus::Saved);
                }
                Ok(())
            }
            Err(e) => {
                warn!(task = %id, error = %e, "patch failed, rolling back");
                store::apply(&mut self.board, Action::ReplaceTask(pre))?;
                for (key, _) in &patch {
                    self.set_status(id, *key, SaveStatus::Error);
                }
                Err(e.into())
            }
        }
    }

    /// Move a task to another column (append semantics). The local move is
    /// applied first; on failure the task snaps back.
    pub fn move_task(&mut self, id: &str, to_column_id: &str) -> Result<(), MutationError> {
        let pre = self
            .board
            .task(id)
            .ok_or_else(|| MutationError::NotFound(id.to_string()))?
            .clone();
        if self.board.column(to_column_id).is_none() {
            return Err(MutationError::NotFound(to_column_id.to_string()));
        }

        store::apply(
            &mut self.board,
            Action::MoveTask {
                id: id.to_string(),
                to_column_id: to_column_id.to_string(),
            },
        )?;

        let mut wire = WirePatch::new();
        wire.insert(
            "columnId".to_string(),
            serde_json::Value::String(to_column_id.to_string()),
        );
        match self.api.patch_task(id, &wire) {
            Ok(canonical) => {
                store::apply(&mut self.board, Action::ReplaceTask(canonical))?;
                Ok(())
            }
            Err(e) => {
                warn!(task = %id, error = %e, "move failed, rolling back");
                store::apply(&mut self.board, Action::ReplaceTask(pre))?;
                Err(e.into())
            }
        }
    }

    /// Soft delete: close the task. No reason required; one closure log is
    /// appended.
    pub fn close_task(&mut self, id: &str) -> Result<(), MutationError> {
        let task = self
            .board
            .tasks
            .get_mut(id)
            .ok_or_else(|| MutationError::NotFound(id.to_string()))?;
        let pre = task.clone();
        closure::close(task, Utc::now())?;
        match self.api.close_task(id) {
            Ok(canonical) => {
                store::apply(&mut self.board, Action::ReplaceTask(canonical))?;
                Ok(())
            }
            Err(e) => {
                warn!(task = %id, error = %e, "close failed, rolling back");
                store::apply(&mut self.board, Action::ReplaceTask(pre))?;
                Err(e.into())
            }
        }
    }

    /// Reopen a closed task. The reason is required and ends up on the
    /// finalized closure log.
    pub fn reopen_task(&mut self, id: &str, reason: &str) -> Result<(), MutationError> {
        let task = self
            .board
            .tasks
            .get_mut(id)
            .ok_or_else(|| MutationError::NotFound(id.to_string()))?;
        let pre = task.clone();
        closure::reopen(task, reason, Utc::now())?;
        match self.api.reopen_task(id, reason.trim()) {
            Ok(canonical) => {
                store::apply(&mut self.board, Action::ReplaceTask(canonical))?;
                Ok(())
            }
            Err(e) => {
                warn!(task = %id, error = %e, "reopen failed, rolling back");
                store::apply(&mut self.board, Action::ReplaceTask(pre))?;
                Err(e.into())
            }
        }
    }

    /// Link a task under a parent.
    pub fn add_parent(&mut self, child_id: &str, parent_id: &str) -> Result<(), MutationError> {
        self.parent_edit(child_id, |board| hierarchy::add_parent(board, child_id, parent_id))
    }

    /// Unlink a parent (clears the primary pointer when it was the primary).
    pub fn remove_parent(&mut self, child_id: &str, parent_id: &str) -> Result<(), MutationError> {
        self.parent_edit(child_id, |board| {
            hierarchy::remove_parent(board, child_id, parent_id)
        })
    }

    /// Designate a primary parent, adding it to the parent set if needed.
    pub fn set_primary_parent(
        &mut self,
        child_id: &str,
        parent_id: &str,
    ) -> Result<(), MutationError> {
        self.parent_edit(child_id, |board| {
            hierarchy::set_primary_parent(board, child_id, parent_id)
        })
    }

    /// Detach the task from all parents. Destructive; callers confirm first.
    pub fn clear_parents(&mut self, child_id: &str) -> Result<(), MutationError> {
        self.parent_edit(child_id, |board| hierarchy::clear_parents(board, child_id))
    }

    /// Upload a spreadsheet of subtasks for a task, then refetch the board so
    /// the created subtasks (and their parent links) appear locally.
    pub fn import_subtasks(
        &mut self,
        id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<ImportOutcome, MutationError> {
        if self.board.task(id).is_none() {
            return Err(MutationError::NotFound(id.to_string()));
        }
        let outcome = self.api.import_subtasks(id, filename, bytes)?;
        let board = self.api.fetch_board(&self.board.id)?.into_board();
        store::apply(&mut self.board, Action::Hydrate(board))?;
        Ok(outcome)
    }

    /// Export a task with its subtask rows as CSV or XLSX bytes.
    pub fn export_task(&self, id: &str, format: ExportFormat) -> Result<Vec<u8>, MutationError> {
        if self.board.task(id).is_none() {
            return Err(MutationError::NotFound(id.to_string()));
        }
        Ok(self.api.export_task(id, format)?)
    }

    /// Replace one task with a fresh server copy (detail pane hydration).
    pub fn refresh_task(&mut self, id: &str) -> Result<(), MutationError> {
        let canonical = self.api.fetch_task(id)?;
        store::apply(&mut self.board, Action::ReplaceTask(canonical))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// A task that exists and is open for editing. Closed tasks reject all
    /// field and parent-link edits at this layer.
    fn editable_task(&self, id: &str) -> Result<&Task, MutationError> {
        let task = self
            .board
            .task(id)
            .ok_or_else(|| MutationError::NotFound(id.to_string()))?;
        if task.is_closed() {
            return Err(MutationError::Validation(format!(
                "task {} is closed; reopen it before editing",
                id
            )));
        }
        Ok(task)
    }

    /// Shared body of all parent-set edits: local edit, one PATCH carrying
    /// both `parentTaskIds` and `primaryParentId`, rollback on failure.
    fn parent_edit<F>(&mut self, child_id: &str, edit: F) -> Result<(), MutationError>
    where
        F: FnOnce(&mut Board) -> Result<(), hierarchy::HierarchyError>,
    {
        let pre = self.editable_task(child_id)?.clone();
        edit(&mut self.board)?;

        let task = self
            .board
            .task(child_id)
            .ok_or_else(|| MutationError::NotFound(child_id.to_string()))?;
        let mut wire = WirePatch::new();
        wire.insert(
            "parentTaskIds".to_string(),
            serde_json::json!(task.parent_task_ids),
        );
        wire.insert(
            "primaryParentId".to_string(),
            serde_json::json!(task.primary_parent_id),
        );

        match self.api.patch_task(child_id, &wire) {
            Ok(canonical) => {
                store::apply(&mut self.board, Action::ReplaceTask(canonical))?;
                Ok(())
            }
            Err(e) => {
                warn!(task = %child_id, error = %e, "parent edit failed, rolling back");
                store::apply(&mut self.board, Action::ReplaceTask(pre))?;
                Err(e.into())
            }
        }
    }

    fn set_status(&mut self, task_id: &str, key: FieldKey, status: SaveStatus) {
        self.statuses.insert((task_id.to_string(), key), status);
    }
}

/// Short, URL-safe external id like `WI-8F3K2Q1Z`, used only when the server
/// response lacks one.
fn gen_external_id(prefix: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
        .hash(&mut hasher);
    let mut n = hasher.finish();
    let alphabet = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut suffix = String::with_capacity(8);
    for _ in 0..8 {
        suffix.push(alphabet[(n % 36) as usize] as char);
        n /= 36;
    }
    format!("{}-{}", prefix, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::board::Column;
    use crate::model::fields::{FieldValue, read_field};
    use crate::model::task::ClosureLog;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// In-memory persistence: echoes patches onto stored tasks, flips to
    /// failure mode via the shared toggle the test keeps.
    struct FakeApi {
        tasks: RefCell<HashMap<String, Task>>,
        fail: Rc<Cell<bool>>,
        created: Cell<usize>,
    }

    impl FakeApi {
        fn seeded(board: &Board, fail: Rc<Cell<bool>>) -> FakeApi {
            FakeApi {
                tasks: RefCell::new(
                    board
                        .tasks
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                ),
                fail,
                created: Cell::new(0),
            }
        }

        fn check(&self) -> Result<(), ApiError> {
            if self.fail.get() {
                Err(ApiError::Transport("connection refused".into()))
            } else {
                Ok(())
            }
        }
    }

    impl Persistence for FakeApi {
        fn fetch_board(&self, board_id: &str) -> Result<crate::sync::api::BoardPayload, ApiError> {
            self.check()?;
            Err(ApiError::Status {
                status: 404,
                message: format!("no board {}", board_id),
            })
        }

        fn fetch_task(&self, id: &str) -> Result<Task, ApiError> {
            self.check()?;
            self.tasks.borrow().get(id).cloned().ok_or(ApiError::Status {
                status: 404,
                message: "not found".into(),
            })
        }

        fn create_task(&self, draft: &TaskDraft) -> Result<Task, ApiError> {
            self.check()?;
            let n = self.created.get() + 1;
            self.created.set(n);
            let mut task = Task::new(format!("srv-{}", n), draft.title.clone(), draft.column_id.clone());
            task.parent_task_ids = draft.parent_task_ids.clone();
            task.primary_parent_id = draft.primary_parent_id.clone();
            self.tasks.borrow_mut().insert(task.id.clone(), task.clone());
            Ok(task)
        }

        fn patch_task(&self, id: &str, patch: &WirePatch) -> Result<Task, ApiError> {
            self.check()?;
            let mut tasks = self.tasks.borrow_mut();
            let task = tasks.get(id).ok_or(ApiError::Status {
                status: 404,
                message: "not found".into(),
            })?;
            let mut v = serde_json::to_value(task).expect("task serializes");
            for (k, val) in patch {
                v[k] = val.clone();
            }
            let updated: Task =
                serde_json::from_value(v).map_err(|e| ApiError::Decode(e.to_string()))?;
            tasks.insert(id.to_string(), updated.clone());
            Ok(updated)
        }

        fn close_task(&self, id: &str) -> Result<Task, ApiError> {
            self.check()?;
            let mut tasks = self.tasks.borrow_mut();
            let task = tasks.get_mut(id).ok_or(ApiError::Status {
                status: 404,
                message: "not found".into(),
            })?;
            let now = Utc::now();
            task.closed_at = Some(now);
            task.closure_logs.push(ClosureLog {
                id: format!("log-{}", task.closure_logs.len() + 1),
                closed_at: now,
                reopened_at: None,
                reopen_reason: None,
            });
            Ok(task.clone())
        }

        fn reopen_task(&self, id: &str, reason: &str) -> Result<Task, ApiError> {
            self.check()?;
            let mut tasks = self.tasks.borrow_mut();
            let task = tasks.get_mut(id).ok_or(ApiError::Status {
                status: 404,
                message: "not found".into(),
            })?;
            if let Some(log) = task.closure_logs.iter_mut().find(|l| l.reopened_at.is_none()) {
                log.reopened_at = Some(Utc::now());
                log.reopen_reason = Some(reason.to_string());
            }
            task.closed_at = None;
            Ok(task.clone())
        }

        fn import_subtasks(&self, _: &str, _: &str, _: &[u8]) -> Result<ImportOutcome, ApiError> {
            self.check()?;
            Ok(ImportOutcome {
                created: 0,
                skipped: 0,
            })
        }

        fn export_task(&self, _: &str, _: ExportFormat) -> Result<Vec<u8>, ApiError> {
            self.check()?;
            Ok(b"id,title\n".to_vec())
        }
    }

    fn session() -> (Session, Rc<Cell<bool>>) {
        let mut board = Board::new("b1", "Demo");
        for (id, name) in [("c-todo", "To Do"), ("c-done", "Done")] {
            board.columns.insert(id.to_string(), Column::new(id, name));
        }
        for (id, title) in [("t1", "Write proposal"), ("t2", "Review proposal")] {
            store::apply(&mut board, Action::AddTask(Task::new(id, title, "c-todo"))).unwrap();
        }
        let fail = Rc::new(Cell::new(false));
        let api = Box::new(FakeApi::seeded(&board, fail.clone()));
        (Session::with_board(api, board), fail)
    }

    #[test]
    fn patch_applies_optimistically_and_reconciles() {
        let (mut s, _fail) = session();
        let patch = vec![(FieldKey::Title, FieldValue::Text("Write the proposal".into()))];
        s.patch_task("t1", patch).unwrap();
        assert_eq!(s.board().task("t1").unwrap().title, "Write the proposal");
        assert_eq!(s.field_status("t1", FieldKey::Title), SaveStatus::Saved);
    }

    #[test]
    fn patch_rolls_back_on_persistence_failure() {
        let (mut s, fail) = session();
        fail.set(true);
        let patch = vec![(FieldKey::Xp, FieldValue::Int(99))];
        let result = s.patch_task("t1", patch);
        assert!(matches!(result, Err(MutationError::Persistence(_))));
        assert_eq!(s.board().task("t1").unwrap().xp, 0);
        assert_eq!(s.field_status("t1", FieldKey::Xp), SaveStatus::Error);
    }

    #[test]
    fn patch_on_closed_task_is_rejected_before_any_call() {
        let (mut s, _fail) = session();
        s.close_task("t1").unwrap();
        let patch = vec![(FieldKey::Title, FieldValue::Text("nope".into()))];
        let result = s.patch_task("t1", patch);
        assert!(matches!(result, Err(MutationError::Validation(_))));
    }

    #[test]
    fn move_reconciles_membership_with_the_server_copy() {
        let (mut s, _fail) = session();
        s.move_task("t1", "c-done").unwrap();
        let board = s.board();
        assert_eq!(board.task("t1").unwrap().column_id.as_deref(), Some("c-done"));
        assert!(board.column("c-done").unwrap().task_ids.contains(&"t1".to_string()));
        assert!(!board.column("c-todo").unwrap().task_ids.contains(&"t1".to_string()));
    }

    #[test]
    fn move_rolls_back_on_failure() {
        let (mut s, fail) = session();
        fail.set(true);
        assert!(s.move_task("t1", "c-done").is_err());
        let board = s.board();
        assert_eq!(board.task("t1").unwrap().column_id.as_deref(), Some("c-todo"));
        assert!(board.column("c-todo").unwrap().task_ids.contains(&"t1".to_string()));
        assert!(!board.column("c-done").unwrap().task_ids.contains(&"t1".to_string()));
    }

    #[test]
    fn create_requires_title_and_column() {
        let (mut s, _fail) = session();
        assert!(matches!(
            s.create_task(TaskDraft::new("  ", "c-todo")),
            Err(MutationError::Validation(_))
        ));
        assert!(matches!(
            s.create_task(TaskDraft::new("New", "")),
            Err(MutationError::Validation(_))
        ));
    }

    #[test]
    fn create_forces_primary_into_parent_set() {
        let (mut s, _fail) = session();
        let mut draft = TaskDraft::new("Child", "c-todo");
        draft.primary_parent_id = Some("t1".into());
        let created = s.create_task(draft).unwrap();
        assert!(created.parent_task_ids.contains(&"t1".to_string()));
        assert!(s.board().task(&created.id).is_some());
    }

    #[test]
    fn created_tasks_get_an_external_id_fallback() {
        let (mut s, _fail) = session();
        let created = s.create_task(TaskDraft::new("New", "c-todo")).unwrap();
        let ext = created.external_id.unwrap();
        assert!(ext.starts_with("WI-"));
        assert_eq!(ext.len(), 11);
    }

    #[test]
    fn close_then_reopen_round_trip() {
        let (mut s, _fail) = session();
        s.close_task("t1").unwrap();
        assert!(s.board().task("t1").unwrap().is_closed());

        assert!(matches!(
            s.reopen_task("t1", "  "),
            Err(MutationError::Validation(_))
        ));

        s.reopen_task("t1", "closed by accident").unwrap();
        let task = s.board().task("t1").unwrap();
        assert!(!task.is_closed());
        assert!(task.closure_logs[0].reopened_at.is_some());
    }

    #[test]
    fn reopen_an_open_task_is_a_validation_error() {
        let (mut s, _fail) = session();
        assert!(matches!(
            s.reopen_task("t1", "why not"),
            Err(MutationError::Validation(_))
        ));
    }

    #[test]
    fn close_rolls_back_on_failure() {
        let (mut s, fail) = session();
        fail.set(true);
        assert!(s.close_task("t1").is_err());
        let task = s.board().task("t1").unwrap();
        assert!(!task.is_closed());
        assert!(task.closure_logs.is_empty());
    }

    #[test]
    fn parent_edits_persist_both_pointer_fields() {
        let (mut s, _fail) = session();
        s.set_primary_parent("t2", "t1").unwrap();
        let t2 = s.board().task("t2").unwrap();
        assert_eq!(t2.parent_task_ids, vec!["t1"]);
        assert_eq!(t2.primary_parent_id.as_deref(), Some("t1"));

        s.clear_parents("t2").unwrap();
        let t2 = s.board().task("t2").unwrap();
        assert!(t2.parent_task_ids.is_empty());
        assert_eq!(t2.primary_parent_id, None);
    }

    #[test]
    fn cyclic_parent_edit_is_rejected_locally() {
        let (mut s, _fail) = session();
        s.add_parent("t2", "t1").unwrap();
        let result = s.add_parent("t1", "t2");
        assert!(matches!(result, Err(MutationError::Validation(_))));
    }

    #[test]
    fn parent_edit_rolls_back_on_failure() {
        let (mut s, fail) = session();
        fail.set(true);
        assert!(s.add_parent("t2", "t1").is_err());
        assert!(s.board().task("t2").unwrap().parent_task_ids.is_empty());
    }

    #[test]
    fn pre_image_capture_covers_every_field_key() {
        // read_field must return a value for each key, or rollback would
        // silently drop edits.
        let task = Task::new("t1", "Write proposal", "c-todo");
        for key in FieldKey::ALL {
            let _ = read_field(&task, key);
        }
    }
}
