//! The close/reopen state machine. A task is OPEN (`closed_at == None`) or
//! CLOSED, and every CLOSED period is recorded as one `ClosureLog`. Soft
//! delete is modeled as closing; there is no separate "deleted" concept.

use chrono::{DateTime, Utc};

use crate::model::task::{ClosureLog, Task};

/// Error type for closure transitions
#[derive(Debug, thiserror::Error)]
pub enum ClosureError {
    #[error("task {0} is already closed")]
    AlreadyClosed(String),
    #[error("task {0} is not closed")]
    NotClosed(String),
    #[error("reopen reason must not be blank")]
    BlankReason,
    #[error("task {0} has no open closure log to finalize")]
    NoOpenLog(String),
}

/// OPEN → CLOSED: stamp `closed_at` and append a new open closure log.
/// The log id is a local placeholder until the server's copy is merged back.
pub fn close(task: &mut Task, now: DateTime<Utc>) -> Result<(), ClosureError> {
    if task.is_closed() {
        return Err(ClosureError::AlreadyClosed(task.id.clone()));
    }
    task.closed_at = Some(now);
    task.closure_logs.push(ClosureLog {
        id: format!("local-{}-{}", task.id, task.closure_logs.len() + 1),
        closed_at: now,
        reopened_at: None,
        reopen_reason: None,
    });
    Ok(())
}

/// CLOSED → OPEN: requires a non-blank reason. Finalizes the open closure log
/// with the reopen timestamp and reason, then clears `closed_at`.
pub fn reopen(task: &mut Task, reason: &str, now: DateTime<Utc>) -> Result<(), ClosureError> {
    if reason.trim().is_empty() {
        return Err(ClosureError::BlankReason);
    }
    if !task.is_closed() {
        return Err(ClosureError::NotClosed(task.id.clone()));
    }
    let id = task.id.clone();
    let log = open_log_mut(task).ok_or(ClosureError::NoOpenLog(id))?;
    log.reopened_at = Some(now);
    log.reopen_reason = Some(reason.trim().to_string());
    task.closed_at = None;
    Ok(())
}

/// The closure log for the current CLOSED period, if any. There is at most
/// one; when several are open (bad server data) the most recent wins.
pub fn open_log(task: &Task) -> Option<&ClosureLog> {
    task.closure_logs
        .iter()
        .filter(|l| l.reopened_at.is_none())
        .max_by_key(|l| l.closed_at)
}

fn open_log_mut(task: &mut Task) -> Option<&mut ClosureLog> {
    task.closure_logs
        .iter_mut()
        .filter(|l| l.reopened_at.is_none())
        .max_by_key(|l| l.closed_at)
}
