use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::model::{Task, TaskId, TaskRecord};
use crate::validate::{task_from_value, RecordError};

/// A record dropped during load, with its position in the file.
#[derive(Debug, Clone)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct Loaded {
    pub tasks: Vec<Task>,
    pub skipped: Vec<SkippedRecord>,
    /// Set when the file exists but is not a JSON array of records. The task
    /// list is empty in that case.
    pub corrupt: Option<String>,
    /// Some task got an id that is not in the file (missing, unparsable or
    /// duplicate). The list must be saved back for ids to stay stable.
    pub ids_assigned: bool,
}

pub trait TaskStore: Send + Sync {
    /// Read and validate every record. Only read failures are errors.
    fn load(&self) -> Result<Loaded>;

    /// Rewrite the whole task list.
    fn save(&self, tasks: &[Task]) -> Result<()>;

    /// Append one line to the completion log.
    fn append_completion_log(&self, task: &Task, completed_at: NaiveDateTime) -> Result<()>;
}

/// Task list kept as a pretty-printed JSON array, plus a plain-text completion log.
pub struct JsonFileStore {
    tasks_path: PathBuf,
    log_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(tasks_path: impl Into<PathBuf>, log_path: impl Into<PathBuf>) -> Self {
        Self {
            tasks_path: tasks_path.into(),
            log_path: log_path.into(),
        }
    }

    pub fn tasks_path(&self) -> &Path {
        &self.tasks_path
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Validate a parsed document. Duplicate ids get a fresh one so every task
/// stays individually addressable.
pub fn parse_records(doc: &Value) -> Loaded {
    let Some(items) = doc.as_array() else {
        return Loaded {
            corrupt: Some("expected a JSON array of tasks".into()),
            ..Loaded::default()
        };
    };

    let mut loaded = Loaded::default();
    let mut seen = HashSet::new();
    for (index, item) in items.iter().enumerate() {
        match task_from_value(item) {
            Ok(mut task) => {
                let stored = item.get("id").and_then(Value::as_str).and_then(TaskId::parse);
                if stored != Some(task.id) {
                    loaded.ids_assigned = true;
                }
                if !seen.insert(task.id) {
                    warn!("Duplicate id {} for task '{}', assigning a new one", task.id, task.name);
                    task.id = TaskId::new();
                    seen.insert(task.id);
                    loaded.ids_assigned = true;
                }
                loaded.tasks.push(task);
            }
            Err(e) => {
                if matches!(e, RecordError::BadDue(..)) {
                    error!("Invalid date/time for task record {index}: {e}");
                } else {
                    warn!("Skipping task record {index}: {e}");
                }
                loaded.skipped.push(SkippedRecord {
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }
    loaded
}

impl TaskStore for JsonFileStore {
    fn load(&self) -> Result<Loaded> {
        let contents = match fs::read_to_string(&self.tasks_path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No task file at {}, starting empty", self.tasks_path.display());
                return Ok(Loaded::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read {}", self.tasks_path.display()))
            }
        };

        let doc: Value = match serde_json::from_str(&contents) {
            Ok(doc) => doc,
            Err(e) => {
                error!("Failed to load tasks: invalid JSON format ({e})");
                return Ok(Loaded {
                    corrupt: Some(format!("invalid JSON format: {e}")),
                    ..Loaded::default()
                });
            }
        };

        let loaded = parse_records(&doc);
        info!(
            "Loaded {} valid tasks from {} ({} skipped)",
            loaded.tasks.len(),
            self.tasks_path.display(),
            loaded.skipped.len()
        );
        Ok(loaded)
    }

    fn save(&self, tasks: &[Task]) -> Result<()> {
        ensure_parent(&self.tasks_path)?;
        let records: Vec<TaskRecord> = tasks.iter().map(TaskRecord::from).collect();

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        records.serialize(&mut ser)?;
        buf.push(b'\n');

        // Write beside the target and rename so readers never see a half-written file.
        let dir = match self.tasks_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
        tmp.write_all(&buf)
            .context("failed to write task list")?;
        tmp.persist(&self.tasks_path)
            .with_context(|| format!("failed to save tasks to {}", self.tasks_path.display()))?;

        info!("Saved {} tasks to {}", tasks.len(), self.tasks_path.display());
        Ok(())
    }

    fn append_completion_log(&self, task: &Task, completed_at: NaiveDateTime) -> Result<()> {
        ensure_parent(&self.log_path)?;
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("failed to open {}", self.log_path.display()))?;
        writeln!(f, "{}", completion_line(task, completed_at))
            .with_context(|| format!("failed to write {}", self.log_path.display()))?;
        info!("Logged completed task: {}", task.name);
        Ok(())
    }
}

pub fn completion_line(task: &Task, completed_at: NaiveDateTime) -> String {
    format!(
        "[{}] Completed: {} (Due: {} {}, Priority: {})",
        completed_at.format("%Y-%m-%d %H:%M:%S"),
        task.name,
        task.due_date(),
        task.due_time(),
        task.priority
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, Status};
    use crate::validate::parse_due;

    fn store_in(dir: &Path) -> JsonFileStore {
        JsonFileStore::new(dir.join("tasks.json"), dir.join("executed_tasks.txt"))
    }

    fn task(name: &str, due: &str, priority: Priority) -> Task {
        let (d, t) = due.split_once(' ').unwrap();
        Task {
            id: TaskId::new(),
            name: name.into(),
            description: format!("about {name}"),
            due: parse_due(d, t).unwrap(),
            priority,
            status: Status::Pending,
            files: vec![PathBuf::from(format!("/docs/{name}.txt"))],
        }
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = store_in(dir.path()).load().unwrap();
        assert!(loaded.tasks.is_empty());
        assert!(loaded.corrupt.is_none());
    }

    #[test]
    fn save_then_load_preserves_order_and_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let mut done = task("b", "2026-01-02 08:00", Priority::Low);
        done.status = Status::Completed;
        let tasks = vec![task("a", "2026-01-03 09:15", Priority::High), done];

        store.save(&tasks).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.tasks, tasks);
        assert!(loaded.skipped.is_empty());
    }

    #[test]
    fn saved_file_uses_split_due_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        store.save(&[task("a", "2026-01-03 09:15", Priority::High)]).unwrap();
        let raw = fs::read_to_string(store.tasks_path()).unwrap();
        assert!(raw.contains("\"due_date\": \"2026-01-03\""));
        assert!(raw.contains("\"due_time\": \"09:15\""));
        assert!(raw.contains("\"priority\": \"High\""));
        assert!(raw.contains("\"status\": \"Pending\""));
    }

    #[test]
    fn malformed_records_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let doc = r#"[
            {"name": "ok", "due_date": "2026-01-01", "due_time": "10:00", "priority": "Low", "status": "Pending"},
            {"name": "no-time", "due_date": "2026-01-01", "priority": "Low", "status": "Pending"},
            {"name": "bad-status", "due_date": "2026-01-01", "due_time": "10:00", "priority": "Low", "status": "Open"},
            {"name": "bad-date", "due_date": "tomorrow", "due_time": "10:00", "priority": "Low", "status": "Pending"},
            7
        ]"#;
        fs::write(store.tasks_path(), doc).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.tasks.len(), 1);
        assert_eq!(loaded.tasks[0].name, "ok");
        let skipped: Vec<usize> = loaded.skipped.iter().map(|s| s.index).collect();
        assert_eq!(skipped, vec![1, 2, 3, 4]);

        // Dropped records do not survive a rewrite.
        store.save(&loaded.tasks).unwrap();
        let again = store.load().unwrap();
        assert_eq!(again.tasks, loaded.tasks);
        assert!(again.skipped.is_empty());
    }

    #[test]
    fn invalid_json_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(store.tasks_path(), "{ not json").unwrap();
        let loaded = store.load().unwrap();
        assert!(loaded.tasks.is_empty());
        assert!(loaded.corrupt.is_some());
    }

    #[test]
    fn non_array_document_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        fs::write(store.tasks_path(), r#"{"name": "x"}"#).unwrap();
        assert!(store.load().unwrap().corrupt.is_some());
    }

    #[test]
    fn duplicate_ids_are_reassigned() {
        let t = task("a", "2026-01-03 09:15", Priority::High);
        let mut dup = task("b", "2026-01-03 10:15", Priority::High);
        dup.id = t.id;
        let doc = serde_json::to_value(vec![TaskRecord::from(&t), TaskRecord::from(&dup)]).unwrap();
        let loaded = parse_records(&doc);
        assert_eq!(loaded.tasks.len(), 2);
        assert_eq!(loaded.tasks[0].id, t.id);
        assert_ne!(loaded.tasks[1].id, t.id);
        assert!(loaded.ids_assigned);
    }

    #[test]
    fn records_without_ids_are_flagged() {
        let t = task("a", "2026-01-03 09:15", Priority::High);
        let doc = serde_json::to_value(vec![TaskRecord::from(&t)]).unwrap();
        assert!(!parse_records(&doc).ids_assigned);

        let legacy = serde_json::json!([{
            "name": "old", "description": "", "due_date": "2026-01-03",
            "due_time": "09:15", "priority": "Low", "status": "Pending", "files": []
        }]);
        let loaded = parse_records(&legacy);
        assert_eq!(loaded.tasks.len(), 1);
        assert!(loaded.ids_assigned);
    }

    #[test]
    fn completion_log_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());
        let t = task("rent", "2026-01-03 09:15", Priority::Medium);
        let at = parse_due("2026-01-02", "20:00").unwrap();
        store.append_completion_log(&t, at).unwrap();
        store.append_completion_log(&t, at).unwrap();

        let log = fs::read_to_string(store.log_path()).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "[2026-01-02 20:00:00] Completed: rent (Due: 2026-01-03 09:15, Priority: Medium)"
        );
    }

    #[test]
    fn save_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the final rename fail.
        let tasks_path = dir.path().join("tasks.json");
        fs::create_dir(&tasks_path).unwrap();
        fs::write(tasks_path.join("keep"), "x").unwrap();
        let store = JsonFileStore::new(&tasks_path, dir.path().join("log.txt"));
        assert!(store.save(&[]).is_err());
    }
}
