//! Spreadsheet subtask import: the row-mapping contract. Binary workbook
//! decoding stays on the server (the client uploads the file as-is), but the
//! mapping from header-keyed cells to subtask drafts is shared here so the
//! skip/keep rules can be exercised without a workbook in sight.
//!
//! A sheet is one main-task title plus rows of subtask fields. Headers are
//! matched case-insensitively; a row without a `Task` cell is skipped.

use indexmap::IndexMap;

use crate::model::fields::split_id_list;

/// One spreadsheet row mapped to subtask fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportedRow {
    /// "ID" column
    pub external_id: Option<String>,
    /// "Task" column; required, rows without it are skipped
    pub title: String,
    /// "description" merged with "Acceptance Criteria" and "Commands/How to Run"
    pub description: Option<String>,
    pub state: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    /// From "Est. Time (min)", converted to seconds
    pub estimated_sec: Option<i64>,
    pub xp: Option<i64>,
    pub notes: Option<String>,
    /// From "dependency", split on commas/semicolons/whitespace
    pub dependency_external_ids: Option<Vec<String>>,
}

/// One sheet: the main task plus its subtask rows and the skip count.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedSheet {
    pub main_task_title: String,
    pub rows: Vec<ImportedRow>,
    pub skipped: usize,
}

/// A raw row as a spreadsheet reader would hand it over: header → cell text.
pub type RawRow = IndexMap<String, String>;

/// Map a whole sheet. The sheet name is the main-task title; a blank name
/// falls back to the title derived from the filename.
pub fn map_sheet(sheet_name: &str, fallback_title: &str, raw_rows: &[RawRow]) -> ImportedSheet {
    let mut rows = Vec::new();
    let mut skipped = 0;
    for raw in raw_rows {
        match map_row(raw) {
            Some(row) => rows.push(row),
            None => skipped += 1,
        }
    }
    let name = sheet_name.trim();
    let main_task_title = if name.is_empty() {
        fallback_title.to_string()
    } else {
        name.to_string()
    };
    ImportedSheet {
        main_task_title,
        rows,
        skipped,
    }
}

/// Map one row, or None when the required title cell is missing/blank.
pub fn map_row(raw: &RawRow) -> Option<ImportedRow> {
    let title = cell(raw, "Task")?;

    let description = merged_description(
        cell(raw, "description"),
        cell(raw, "Acceptance Criteria"),
        cell(raw, "Commands/How to Run"),
    );

    Some(ImportedRow {
        external_id: cell(raw, "ID"),
        title,
        description,
        state: cell(raw, "State"),
        status: cell(raw, "status"),
        priority: cell(raw, "Priority"),
        estimated_sec: cell(raw, "Est. Time (min)").and_then(|m| seconds_from_minutes(&m)),
        xp: cell(raw, "XP").and_then(|v| v.parse().ok()),
        notes: cell(raw, "Notes"),
        dependency_external_ids: cell(raw, "dependency").map(|d| split_id_list(&d)),
    })
}

/// The main-task title to use when a sheet has no usable name: the filename
/// without its extension, with separators turned into spaces.
pub fn base_title_from_filename(filename: &str) -> String {
    let stem = filename
        .rsplit_once('.')
        .map(|(stem, ext)| {
            if ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xls") {
                stem
            } else {
                filename
            }
        })
        .unwrap_or(filename);
    let cleaned = stem.replace(['_', '-'], " ");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "Imported Task".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Case-insensitive header lookup; blank cells count as absent.
fn cell(raw: &RawRow, header: &str) -> Option<String> {
    raw.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(header))
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn seconds_from_minutes(minutes: &str) -> Option<i64> {
    let n: f64 = minutes.trim().parse().ok()?;
    Some((n * 60.0).round() as i64)
}

fn merged_description(
    desc: Option<String>,
    acceptance: Option<String>,
    how_to_run: Option<String>,
) -> Option<String> {
    let mut out = String::new();
    if let Some(d) = desc {
        out.push_str(&d);
    }
    if let Some(ac) = acceptance {
        out.push_str(&format!("\n\n**Acceptance Criteria**\n{}", ac));
    }
    if let Some(how) = how_to_run {
        out.push_str(&format!("\n\n**How to Run**\n{}", how));
    }
    if out.is_empty() { None } else { Some(out) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn rows_without_a_title_are_skipped_and_counted() {
        let rows = vec![row(&[("Task", "Fix bug")]), row(&[("Foo", "ignored")])];
        let sheet = map_sheet("Sprint 12", "fallback", &rows);
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.skipped, 1);
        assert_eq!(sheet.rows[0].title, "Fix bug");
    }

    #[test]
    fn headers_match_case_insensitively() {
        let r = map_row(&row(&[("task", "Fix bug"), ("priority", "HIGH"), ("id", "WI-7")])).unwrap();
        assert_eq!(r.title, "Fix bug");
        assert_eq!(r.priority.as_deref(), Some("HIGH"));
        assert_eq!(r.external_id.as_deref(), Some("WI-7"));
    }

    #[test]
    fn estimate_minutes_become_seconds() {
        let r = map_row(&row(&[("Task", "Fix bug"), ("Est. Time (min)", "90")])).unwrap();
        assert_eq!(r.estimated_sec, Some(5400));
    }

    #[test]
    fn unparseable_estimate_is_dropped_not_fatal() {
        let r = map_row(&row(&[("Task", "Fix bug"), ("Est. Time (min)", "soon")])).unwrap();
        assert_eq!(r.estimated_sec, None);
    }

    #[test]
    fn description_merges_acceptance_and_how_to_run() {
        let r = map_row(&row(&[
            ("Task", "Fix bug"),
            ("description", "It crashes."),
            ("Acceptance Criteria", "No crash."),
            ("Commands/How to Run", "cargo run"),
        ]))
        .unwrap();
        let desc = r.description.unwrap();
        assert!(desc.starts_with("It crashes."));
        assert!(desc.contains("**Acceptance Criteria**\nNo crash."));
        assert!(desc.contains("**How to Run**\ncargo run"));
    }

    #[test]
    fn dependencies_split_like_the_edit_view() {
        let r = map_row(&row(&[("Task", "Fix bug"), ("dependency", "WI-1, WI-2; WI-3")])).unwrap();
        assert_eq!(
            r.dependency_external_ids,
            Some(vec!["WI-1".into(), "WI-2".into(), "WI-3".into()])
        );
    }

    #[test]
    fn blank_sheet_name_falls_back_to_filename_title() {
        let sheet = map_sheet("  ", "quarterly plan", &[row(&[("Task", "a")])]);
        assert_eq!(sheet.main_task_title, "quarterly plan");
    }

    #[test]
    fn filename_stems_become_titles() {
        assert_eq!(base_title_from_filename("q3_launch-plan.xlsx"), "q3 launch plan");
        assert_eq!(base_title_from_filename("tasks.XLS"), "tasks");
        assert_eq!(base_title_from_filename(".xlsx"), "Imported Task");
    }
}
