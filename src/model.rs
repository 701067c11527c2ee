use std::fmt;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// Stable task identifier, assigned once at creation and persisted with the task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }

    /// First eight hex digits, enough to address a task from the command line.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }

    pub fn as_simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Declaration order is scheduling order: High sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "High" | "high" => Ok(Self::High),
            "Medium" | "medium" => Ok(Self::Medium),
            "Low" | "low" => Ok(Self::Low),
            _ => anyhow::bail!("invalid priority '{s}': must be High, Medium, or Low"),
        }
    }

    pub fn rank(self) -> u8 {
        match self {
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Pending,
    Completed,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Completed => "Completed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub due: NaiveDateTime,
    pub priority: Priority,
    pub status: Status,
    pub files: Vec<PathBuf>,
}

impl Task {
    pub fn is_pending(&self) -> bool {
        self.status == Status::Pending
    }

    pub fn due_date(&self) -> String {
        self.due.format(DATE_FORMAT).to_string()
    }

    pub fn due_time(&self) -> String {
        self.due.format(TIME_FORMAT).to_string()
    }

    /// Sort key used by listings and the reminder queue.
    pub fn schedule_key(&self) -> (u8, NaiveDateTime) {
        (self.priority.rank(), self.due)
    }
}

/// On-disk shape of a task. Due date and time are stored as separate strings.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord<'a> {
    pub id: String,
    pub name: &'a str,
    pub description: &'a str,
    pub due_date: String,
    pub due_time: String,
    pub priority: Priority,
    pub status: Status,
    pub files: &'a [PathBuf],
}

impl<'a> From<&'a Task> for TaskRecord<'a> {
    fn from(task: &'a Task) -> Self {
        Self {
            id: task.id.to_string(),
            name: &task.name,
            description: &task.description,
            due_date: task.due_date(),
            due_time: task.due_time(),
            priority: task.priority,
            status: task.status,
            files: &task.files,
        }
    }
}
