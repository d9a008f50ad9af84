use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Value, json};

use super::task::{Priority, Task};

/// Error type for field parsing and validation
#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("field {0} cannot be edited directly")]
    ReadOnly(String),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// The closed set of directly editable task fields. Every key carries its own
/// decode (edit-view string → typed value), encode (typed value → wire JSON),
/// and validation, applied identically on optimistic apply and server merge.
///
/// Column membership is deliberately absent: moves go through their own
/// operation so membership arrays always change atomically with `column_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Title,
    Description,
    State,
    Status,
    Priority,
    Xp,
    /// Stored as seconds; edited as fractional hours.
    EstimatedSec,
    Notes,
    /// Stored as a list; edited as one delimiter-separated string.
    DependencyExternalIds,
    StartAt,
    EndAt,
    LogHours,
}

/// A typed field value, the unit of both optimistic patches and rollbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Float(f64),
    Priority(Priority),
    IdList(Vec<String>),
    Time(Option<DateTime<Utc>>),
}

/// A set of field changes to one task, in application order.
pub type TaskPatch = Vec<(FieldKey, FieldValue)>;

impl FieldKey {
    pub const ALL: [FieldKey; 12] = [
        FieldKey::Title,
        FieldKey::Description,
        FieldKey::State,
        FieldKey::Status,
        FieldKey::Priority,
        FieldKey::Xp,
        FieldKey::EstimatedSec,
        FieldKey::Notes,
        FieldKey::DependencyExternalIds,
        FieldKey::StartAt,
        FieldKey::EndAt,
        FieldKey::LogHours,
    ];

    /// The key name used on the wire (camelCase, matching the server schema).
    pub fn wire_name(self) -> &'static str {
        match self {
            FieldKey::Title => "title",
            FieldKey::Description => "description",
            FieldKey::State => "state",
            FieldKey::Status => "status",
            FieldKey::Priority => "priority",
            FieldKey::Xp => "xp",
            FieldKey::EstimatedSec => "estimatedSec",
            FieldKey::Notes => "notes",
            FieldKey::DependencyExternalIds => "dependencyExternalIds",
            FieldKey::StartAt => "startAt",
            FieldKey::EndAt => "endAt",
            FieldKey::LogHours => "logHours",
        }
    }

    /// The key name accepted from the CLI.
    pub fn cli_name(self) -> &'static str {
        match self {
            FieldKey::Title => "title",
            FieldKey::Description => "description",
            FieldKey::State => "state",
            FieldKey::Status => "status",
            FieldKey::Priority => "priority",
            FieldKey::Xp => "xp",
            FieldKey::EstimatedSec => "est-hours",
            FieldKey::Notes => "notes",
            FieldKey::DependencyExternalIds => "deps",
            FieldKey::StartAt => "start",
            FieldKey::EndAt => "end",
            FieldKey::LogHours => "log-hours",
        }
    }

    pub fn from_cli_name(name: &str) -> Result<FieldKey, FieldError> {
        FieldKey::ALL
            .iter()
            .copied()
            .find(|k| k.cli_name() == name)
            .ok_or_else(|| FieldError::UnknownField(name.to_string()))
    }

    /// Decode an edit-view string into a typed, validated value.
    pub fn decode(self, raw: &str) -> Result<FieldValue, FieldError> {
        match self {
            FieldKey::Title => {
                let t = raw.trim();
                if t.is_empty() {
                    return Err(FieldError::Invalid {
                        field: "title",
                        reason: "must not be blank".into(),
                    });
                }
                Ok(FieldValue::Text(t.to_string()))
            }
            FieldKey::Description | FieldKey::Notes | FieldKey::State | FieldKey::Status => {
                Ok(FieldValue::Text(raw.trim().to_string()))
            }
            FieldKey::Priority => Priority::parse(raw)
                .map(FieldValue::Priority)
                .ok_or_else(|| FieldError::Invalid {
                    field: "priority",
                    reason: format!("expected NONE/LOW/MEDIUM/HIGH/CRITICAL, got '{}'", raw),
                }),
            FieldKey::Xp => {
                let n: i64 = raw.trim().parse().map_err(|_| FieldError::Invalid {
                    field: "xp",
                    reason: format!("expected an integer, got '{}'", raw),
                })?;
                if n < 0 {
                    return Err(FieldError::Invalid {
                        field: "xp",
                        reason: "must be non-negative".into(),
                    });
                }
                Ok(FieldValue::Int(n))
            }
            FieldKey::EstimatedSec => {
                // Edited as hours, stored as whole seconds.
                let hours: f64 = raw.trim().parse().map_err(|_| FieldError::Invalid {
                    field: "est-hours",
                    reason: format!("expected a number of hours, got '{}'", raw),
                })?;
                if hours < 0.0 {
                    return Err(FieldError::Invalid {
                        field: "est-hours",
                        reason: "must be non-negative".into(),
                    });
                }
                Ok(FieldValue::Int((hours * 3600.0).round() as i64))
            }
            FieldKey::DependencyExternalIds => Ok(FieldValue::IdList(split_id_list(raw))),
            FieldKey::StartAt | FieldKey::EndAt => {
                let t = raw.trim();
                if t.is_empty() {
                    return Ok(FieldValue::Time(None));
                }
                let dt = DateTime::parse_from_rfc3339(t).map_err(|e| FieldError::Invalid {
                    field: match self {
                        FieldKey::StartAt => "start",
                        _ => "end",
                    },
                    reason: format!("expected RFC 3339 timestamp: {}", e),
                })?;
                Ok(FieldValue::Time(Some(dt.with_timezone(&Utc))))
            }
            FieldKey::LogHours => {
                let h: f64 = raw.trim().parse().map_err(|_| FieldError::Invalid {
                    field: "log-hours",
                    reason: format!("expected a number, got '{}'", raw),
                })?;
                if h < 0.0 {
                    return Err(FieldError::Invalid {
                        field: "log-hours",
                        reason: "must be non-negative".into(),
                    });
                }
                Ok(FieldValue::Float(h))
            }
        }
    }

    /// Encode a typed value as the wire JSON the server expects.
    pub fn encode(self, value: &FieldValue) -> Value {
        match value {
            FieldValue::Text(s) => json!(s),
            FieldValue::Int(n) => json!(n),
            FieldValue::Float(f) => json!(f),
            FieldValue::Priority(p) => json!(p.as_str()),
            FieldValue::IdList(ids) => json!(ids),
            FieldValue::Time(t) => match t {
                Some(dt) => json!(dt.to_rfc3339()),
                None => Value::Null,
            },
        }
    }
}

/// Read the current value of a field from a task (the rollback pre-image).
pub fn read_field(task: &Task, key: FieldKey) -> FieldValue {
    match key {
        FieldKey::Title => FieldValue::Text(task.title.clone()),
        FieldKey::Description => FieldValue::Text(task.description.clone()),
        FieldKey::State => FieldValue::Text(task.state.clone()),
        FieldKey::Status => FieldValue::Text(task.status.clone()),
        FieldKey::Priority => FieldValue::Priority(task.priority),
        FieldKey::Xp => FieldValue::Int(task.xp),
        FieldKey::EstimatedSec => FieldValue::Int(task.estimated_sec),
        FieldKey::Notes => FieldValue::Text(task.notes.clone()),
        FieldKey::DependencyExternalIds => {
            FieldValue::IdList(task.dependency_external_ids.clone())
        }
        FieldKey::StartAt => FieldValue::Time(task.start_at),
        FieldKey::EndAt => FieldValue::Time(task.end_at),
        FieldKey::LogHours => FieldValue::Float(task.log_hours),
    }
}

/// Write a typed value onto a task. Values are assumed validated by `decode`;
/// a mismatched variant is ignored rather than corrupting the field.
pub fn apply_field(task: &mut Task, key: FieldKey, value: &FieldValue) {
    match (key, value) {
        (FieldKey::Title, FieldValue::Text(s)) => task.title = s.clone(),
        (FieldKey::Description, FieldValue::Text(s)) => task.description = s.clone(),
        (FieldKey::State, FieldValue::Text(s)) => task.state = s.clone(),
        (FieldKey::Status, FieldValue::Text(s)) => task.status = s.clone(),
        (FieldKey::Priority, FieldValue::Priority(p)) => task.priority = *p,
        (FieldKey::Xp, FieldValue::Int(n)) => task.xp = *n,
        (FieldKey::EstimatedSec, FieldValue::Int(n)) => task.estimated_sec = *n,
        (FieldKey::Notes, FieldValue::Text(s)) => task.notes = s.clone(),
        (FieldKey::DependencyExternalIds, FieldValue::IdList(ids)) => {
            task.dependency_external_ids = ids.clone()
        }
        (FieldKey::StartAt, FieldValue::Time(t)) => task.start_at = *t,
        (FieldKey::EndAt, FieldValue::Time(t)) => task.end_at = *t,
        (FieldKey::LogHours, FieldValue::Float(h)) => task.log_hours = *h,
        _ => {}
    }
}

/// Split a delimiter-separated id list ("A-1, B-2; C-3") into clean entries.
/// Commas, semicolons, and whitespace all delimit, matching the edit view.
pub fn split_id_list(raw: &str) -> Vec<String> {
    let re = Regex::new(r"[,;\s]+").unwrap();
    re.split(raw)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn estimated_hours_round_trip_to_seconds() {
        let v = FieldKey::EstimatedSec.decode("1.5").unwrap();
        assert_eq!(v, FieldValue::Int(5400));
        assert_eq!(FieldKey::EstimatedSec.encode(&v), serde_json::json!(5400));
    }

    #[test]
    fn estimated_hours_rejects_negative() {
        assert!(FieldKey::EstimatedSec.decode("-2").is_err());
    }

    #[test]
    fn dependency_list_splits_on_mixed_delimiters() {
        let v = FieldKey::DependencyExternalIds
            .decode("WI-1, WI-2;WI-3  WI-4")
            .unwrap();
        assert_eq!(
            v,
            FieldValue::IdList(vec![
                "WI-1".into(),
                "WI-2".into(),
                "WI-3".into(),
                "WI-4".into()
            ])
        );
    }

    #[test]
    fn blank_title_is_rejected() {
        assert!(FieldKey::Title.decode("   ").is_err());
    }

    #[test]
    fn priority_decode_validates_enum() {
        assert_eq!(
            FieldKey::Priority.decode("high").unwrap(),
            FieldValue::Priority(Priority::High)
        );
        assert!(FieldKey::Priority.decode("sometime").is_err());
    }

    #[test]
    fn empty_time_clears_the_field() {
        assert_eq!(
            FieldKey::StartAt.decode("").unwrap(),
            FieldValue::Time(None)
        );
        assert_eq!(
            FieldKey::StartAt.encode(&FieldValue::Time(None)),
            Value::Null
        );
    }

    #[test]
    fn apply_and_read_are_inverse() {
        let mut task = Task::new("t1", "Old", "c1");
        let v = FieldKey::Title.decode("New title").unwrap();
        apply_field(&mut task, FieldKey::Title, &v);
        assert_eq!(read_field(&task, FieldKey::Title), v);
        assert_eq!(task.title, "New title");
    }

    #[test]
    fn cli_names_resolve_to_keys() {
        assert_eq!(
            FieldKey::from_cli_name("est-hours").unwrap(),
            FieldKey::EstimatedSec
        );
        assert!(FieldKey::from_cli_name("columnId").is_err());
    }
}
