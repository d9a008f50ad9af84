use regex::Regex;

use crate::model::board::{Board, Task};

/// Which field of a task matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Title,
    Description,
    Notes,
    ExternalId,
}

impl MatchField {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchField::Title => "title",
            MatchField::Description => "description",
            MatchField::Notes => "notes",
            MatchField::ExternalId => "external-id",
        }
    }
}

/// A search hit in the hydrated board
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub task_id: String,
    pub field: MatchField,
    pub title: String,
}

/// Search the hydrated board by regex. Matches titles, descriptions, notes,
/// and external ids; closed tasks are included only when `include_closed`.
pub fn search_tasks(board: &Board, re: &Regex, include_closed: bool) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    for task in board.tasks.values() {
        if task.is_closed() && !include_closed {
            continue;
        }
        search_task(re, task, &mut hits);
    }
    hits
}

fn search_task(re: &Regex, task: &Task, hits: &mut Vec<SearchHit>) {
    let mut push = |field: MatchField| {
        hits.push(SearchHit {
            task_id: task.id.clone(),
            field,
            title: task.title.clone(),
        })
    };
    if re.is_match(&task.title) {
        push(MatchField::Title);
    }
    if re.is_match(&task.description) {
        push(MatchField::Description);
    }
    if re.is_match(&task.notes) {
        push(MatchField::Notes);
    }
    if let Some(ext) = &task.external_id {
        if re.is_match(ext) {
            push(MatchField::ExternalId);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::board::Column;
    use crate::store::{Action, apply};
    use chrono::Utc;

    fn sample_board() -> Board {
        let mut board = Board::new("b1", "Demo");
        board
            .columns
            .insert("c1".to_string(), Column::new("c1", "To Do"));
        let mut t1 = Task::new("t1", "Fix login crash", "c1");
        t1.notes = "seen on staging".into();
        t1.external_id = Some("WI-AB12".into());
        let mut t2 = Task::new("t2", "Write docs", "c1");
        t2.description = "crash course for new users".into();
        let mut t3 = Task::new("t3", "Old crash ticket", "c1");
        t3.closed_at = Some(Utc::now());
        for t in [t1, t2, t3] {
            apply(&mut board, Action::AddTask(t)).unwrap();
        }
        board
    }

    #[test]
    fn matches_across_fields() {
        let board = sample_board();
        let re = Regex::new("crash").unwrap();
        let hits = search_tasks(&board, &re, false);
        let fields: Vec<_> = hits.iter().map(|h| (h.task_id.as_str(), h.field)).collect();
        assert!(fields.contains(&("t1", MatchField::Title)));
        assert!(fields.contains(&("t2", MatchField::Description)));
        assert!(!fields.iter().any(|(id, _)| *id == "t3"));
    }

    #[test]
    fn closed_tasks_only_with_flag() {
        let board = sample_board();
        let re = Regex::new("crash").unwrap();
        let hits = search_tasks(&board, &re, true);
        assert!(hits.iter().any(|h| h.task_id == "t3"));
    }

    #[test]
    fn external_id_is_searchable() {
        let board = sample_board();
        let re = Regex::new("^WI-").unwrap();
        let hits = search_tasks(&board, &re, false);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].field, MatchField::ExternalId);
    }
}
