use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use thiserror::Error;

use crate::model::{Priority, Status, Task, TaskId, DATE_FORMAT, TIME_FORMAT};

const REQUIRED_KEYS: [&str; 5] = ["name", "due_date", "due_time", "status", "priority"];

/// Reasons a persisted record is dropped on load.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record is not an object")]
    NotAnObject,
    #[error("missing required field '{0}'")]
    MissingField(&'static str),
    #[error("task name must be a non-empty string")]
    BadName,
    #[error("invalid status {0}")]
    BadStatus(String),
    #[error("invalid priority {0}")]
    BadPriority(String),
    #[error("invalid due date/time '{0} {1}'")]
    BadDue(String, String),
}

/// Trim a task name and reject it if nothing is left.
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        bail!("task title cannot be empty");
    }
    Ok(trimmed.to_string())
}

/// Combine a `YYYY-MM-DD` date and an `HH:MM` time into a naive local timestamp.
pub fn parse_due(date: &str, time: &str) -> Result<NaiveDateTime> {
    let d = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
        .with_context(|| format!("invalid due date '{date}': expected YYYY-MM-DD"))?;
    let t = NaiveTime::parse_from_str(time.trim(), TIME_FORMAT)
        .with_context(|| format!("invalid due time '{time}': expected HH:MM"))?;
    Ok(d.and_time(t))
}

/// Validate one persisted record.
///
/// A missing or malformed `id` gets a fresh identifier. A non-string
/// description and a non-list `files` fall back to their defaults instead of
/// rejecting the record.
pub fn task_from_value(value: &Value) -> Result<Task, RecordError> {
    let obj = value.as_object().ok_or(RecordError::NotAnObject)?;
    for key in REQUIRED_KEYS {
        if !obj.contains_key(key) {
            return Err(RecordError::MissingField(key));
        }
    }

    let name = obj["name"]
        .as_str()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(RecordError::BadName)?;

    let status = match obj["status"].as_str() {
        Some("Pending") => Status::Pending,
        Some("Completed") => Status::Completed,
        _ => return Err(RecordError::BadStatus(obj["status"].to_string())),
    };

    let priority = match obj["priority"].as_str() {
        Some("High") => Priority::High,
        Some("Medium") => Priority::Medium,
        Some("Low") => Priority::Low,
        _ => return Err(RecordError::BadPriority(obj["priority"].to_string())),
    };

    let date = obj["due_date"].as_str().unwrap_or_default();
    let time = obj["due_time"].as_str().unwrap_or_default();
    let due = parse_due(date, time).map_err(|_| {
        RecordError::BadDue(
            display_field(&obj["due_date"]),
            display_field(&obj["due_time"]),
        )
    })?;

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .and_then(TaskId::parse)
        .unwrap_or_default();

    let description = obj
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let files = match obj.get("files") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(PathBuf::from)
            .collect(),
        _ => Vec::new(),
    };

    Ok(Task {
        id,
        name: name.to_string(),
        description,
        due,
        priority,
        status,
        files,
    })
}

fn display_field(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
