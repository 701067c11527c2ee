use std::collections::HashMap;

use crate::model::{Task, TaskId, TaskRecord};
use crate::queue::QueueEntry;

pub fn format_task_list(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "No tasks.\n".to_string();
    }
    let name_width = tasks
        .iter()
        .map(|t| t.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Task Name".len());

    let mut out = String::new();
    out.push_str(&format!(
        "{:>4}  {:<name_width$}  {:<10}  {:<5}  {:<8}  {:<9}  {}\n",
        "S.No", "Task Name", "Due Date", "Time", "Priority", "Status", "Id"
    ));
    for (i, task) in tasks.iter().enumerate() {
        out.push_str(&format!(
            "{:>4}  {:<name_width$}  {:<10}  {:<5}  {:<8}  {:<9}  {}\n",
            i + 1,
            task.name,
            task.due_date(),
            task.due_time(),
            task.priority.as_str(),
            task.status.as_str(),
            task.id.short(),
        ));
    }
    out
}

pub fn format_task_detail(task: &Task) -> String {
    let mut out = String::new();
    out.push_str(&format!("Name:        {}\n", task.name));
    out.push_str(&format!("Id:          {}\n", task.id));
    out.push_str(&format!("Status:      {}\n", task.status));
    out.push_str(&format!("Priority:    {}\n", task.priority));
    out.push_str(&format!("Due:         {} {}\n", task.due_date(), task.due_time()));
    if !task.description.is_empty() {
        out.push_str(&format!("Description: {}\n", task.description));
    }
    if !task.files.is_empty() {
        out.push('\n');
        out.push_str("Files:\n");
        for (i, file) in task.files.iter().enumerate() {
            out.push_str(&format!("  [{i}] {}\n", file.display()));
        }
    }
    out
}

/// Pending reminders in the order they will be considered.
pub fn format_queue(entries: &[QueueEntry], tasks: &[Task]) -> String {
    if entries.is_empty() {
        return "No pending reminders.\n".to_string();
    }
    let names: HashMap<TaskId, &str> = tasks.iter().map(|t| (t.id, t.name.as_str())).collect();
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!(
            "{} {:<6} {}  {}\n",
            entry.task.short(),
            entry.priority.as_str(),
            entry.due.format("%Y-%m-%d %H:%M"),
            names.get(&entry.task).copied().unwrap_or("?"),
        ));
    }
    out
}

pub fn tasks_json(tasks: &[Task]) -> serde_json::Result<String> {
    let records: Vec<TaskRecord> = tasks.iter().map(TaskRecord::from).collect();
    serde_json::to_string_pretty(&records)
}

pub fn task_json(task: &Task) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&TaskRecord::from(task))
}
