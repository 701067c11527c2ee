//! The main actor: every user-triggered mutation goes through here.
//!
//! Mutations follow one pattern: copy the task list, change the copy, save
//! it, and only then swap it into the board and rebuild the queue. A failed
//! save leaves the in-memory state untouched.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{error, info, warn};

use crate::alert::{Alert, AlertSink};
use crate::board::{Board, SharedBoard};
use crate::clock::Clock;
use crate::model::{Priority, Status, Task, TaskId};
use crate::notifier::Notifier;
use crate::opener;
use crate::queue::QueueEntry;
use crate::schedule::{classify, Phase};
use crate::scheduler::{deliver, ReminderSettings, Scheduler, SchedulerHandle};
use crate::store::{Loaded, TaskStore};
use crate::validate::{parse_due, validate_name};

#[derive(Debug, Clone)]
pub struct NewTask {
    pub name: String,
    pub description: String,
    pub due_date: String,
    pub due_time: String,
    pub priority: Priority,
    pub files: Vec<PathBuf>,
}

/// What the creation-time reminder check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationReminder {
    /// Due later than the reminder window; the scheduler will handle it.
    Scheduled,
    Sent,
    Failed,
    /// Already past due; no notification.
    PastDue,
}

pub struct TaskManager {
    store: Arc<dyn TaskStore>,
    board: SharedBoard,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    alerts: AlertSink,
    settings: ReminderSettings,
}

/// Save the list back when loading had to invent ids, so the next load sees
/// the same ones.
fn persist_assigned_ids(store: &dyn TaskStore, alerts: &AlertSink, loaded: &Loaded) {
    if !loaded.ids_assigned {
        return;
    }
    match store.save(&loaded.tasks) {
        Ok(()) => info!("Saved newly assigned task ids"),
        Err(e) => {
            warn!("Failed to save assigned task ids: {e:#}");
            alerts.send(Alert::warning(
                "Warning",
                format!("Task ids could not be saved and may change: {e:#}"),
            ));
        }
    }
}

fn load_tasks(store: &dyn TaskStore, alerts: &AlertSink) -> Vec<Task> {
    match store.load() {
        Ok(loaded) => {
            persist_assigned_ids(store, alerts, &loaded);
            if let Some(problem) = &loaded.corrupt {
                alerts.send(Alert::error(
                    "Error",
                    format!("Failed to load tasks: {problem}"),
                ));
            }
            if !loaded.skipped.is_empty() {
                alerts.send(Alert::warning(
                    "Warning",
                    format!("Skipped {} invalid task record(s)", loaded.skipped.len()),
                ));
            }
            loaded.tasks
        }
        Err(e) => {
            error!("Failed to load tasks: {e:#}");
            alerts.send(Alert::error("Error", format!("Failed to load tasks: {e:#}")));
            Vec::new()
        }
    }
}

impl TaskManager {
    /// Load the store and build the initial queue. Load problems become
    /// alerts and leave the manager with whatever could be read.
    pub fn open(
        store: Arc<dyn TaskStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        alerts: AlertSink,
        settings: ReminderSettings,
    ) -> Self {
        let tasks = load_tasks(store.as_ref(), &alerts);
        Self {
            store,
            board: Board::new(tasks).into_shared(),
            notifier,
            clock,
            alerts,
            settings,
        }
    }

    pub fn board(&self) -> SharedBoard {
        self.board.clone()
    }

    /// Tasks in stored order.
    pub fn tasks(&self) -> Vec<Task> {
        self.board.lock().tasks.clone()
    }

    /// Tasks ordered by priority, then due time.
    pub fn tasks_sorted(&self) -> Vec<Task> {
        let mut tasks = self.tasks();
        tasks.sort_by_key(Task::schedule_key);
        tasks
    }

    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.board.lock().task(id).cloned()
    }

    pub fn queue_entries(&self) -> Vec<QueueEntry> {
        self.board.lock().queue.entries()
    }

    /// Find a task by id, id prefix, or exact name.
    pub fn resolve(&self, query: &str) -> Result<TaskId> {
        let query = query.trim();
        if query.is_empty() {
            bail!("no task given");
        }
        let board = self.board.lock();
        if let Some(id) = TaskId::parse(query) {
            if board.task(id).is_some() {
                return Ok(id);
            }
        }

        let needle = query.to_ascii_lowercase().replace('-', "");
        let by_prefix: Vec<TaskId> = board
            .tasks
            .iter()
            .filter(|t| !needle.is_empty() && t.id.as_simple().starts_with(&needle))
            .map(|t| t.id)
            .collect();
        let by_name: Vec<TaskId> = board
            .tasks
            .iter()
            .filter(|t| t.name == query)
            .map(|t| t.id)
            .collect();

        match (by_prefix.as_slice(), by_name.as_slice()) {
            ([], []) => bail!("task '{query}' not found"),
            ([p], [n]) if p == n => Ok(*p),
            ([id], []) | ([], [id]) => Ok(*id),
            _ => bail!("'{query}' matches more than one task; use a longer id"),
        }
    }

    fn require(&self, id: TaskId) -> Result<Task> {
        self.task(id).with_context(|| format!("task {id} not found"))
    }

    fn commit(&self, tasks: Vec<Task>) {
        let mut board = self.board.lock();
        board.tasks = tasks;
        board.rebuild();
    }

    pub fn add_task(&mut self, new: NewTask) -> Result<(TaskId, CreationReminder)> {
        let name = validate_name(&new.name)?;
        let due = parse_due(&new.due_date, &new.due_time)?;
        let task = Task {
            id: TaskId::new(),
            name,
            description: new.description.trim().to_string(),
            due,
            priority: new.priority,
            status: Status::Pending,
            files: new.files,
        };

        let mut tasks = self.tasks();
        tasks.push(task.clone());
        self.store.save(&tasks).context("failed to save tasks")?;
        self.commit(tasks);
        info!(
            "Added task: {}, Due: {} {}",
            task.name,
            task.due_date(),
            task.due_time()
        );

        let reminder = self.remind_on_creation(&task);
        Ok((task.id, reminder))
    }

    /// Creation-time version of the scheduler's due-soon check, run once on
    /// the caller's thread.
    fn remind_on_creation(&self, task: &Task) -> CreationReminder {
        let now = self.clock.now();
        info!(
            "Task {} time diff: {} seconds",
            task.name,
            (task.due - now).num_seconds()
        );
        match classify(task.due, now, self.settings.window) {
            Phase::Scheduled => CreationReminder::Scheduled,
            Phase::Expired => {
                info!("Task {} is past due, no notification sent", task.name);
                CreationReminder::PastDue
            }
            Phase::DueSoon => {
                let marked = self.board.lock().mark_reminded(task.id);
                if !marked {
                    return CreationReminder::Scheduled;
                }
                let notification = self.settings.creation_reminder(&task.name, task.priority);
                if deliver(self.notifier.as_ref(), &self.alerts, &notification, &task.name) {
                    CreationReminder::Sent
                } else {
                    CreationReminder::Failed
                }
            }
        }
    }

    /// Mark tasks completed. Already-completed tasks are skipped. Returns the
    /// number of tasks that changed.
    pub fn complete_tasks(&mut self, ids: &[TaskId]) -> Result<usize> {
        let mut tasks = self.tasks();
        let mut completed = Vec::new();
        for id in ids {
            let Some(task) = tasks.iter_mut().find(|t| t.id == *id) else {
                bail!("task {id} not found");
            };
            if task.is_pending() {
                task.status = Status::Completed;
                completed.push(task.clone());
            }
        }
        if completed.is_empty() {
            return Ok(0);
        }

        self.store.save(&tasks).context("failed to save tasks")?;
        let now = self.clock.now();
        for task in &completed {
            if let Err(e) = self.store.append_completion_log(task, now) {
                error!("Failed to log task {}: {e:#}", task.name);
                self.alerts
                    .send(Alert::error("Error", format!("Failed to log task: {e:#}")));
            }
        }
        self.commit(tasks);
        for task in &completed {
            info!("Marked task completed: {}", task.name);
        }
        Ok(completed.len())
    }

    pub fn delete_tasks(&mut self, ids: &[TaskId]) -> Result<usize> {
        let mut tasks = self.tasks();
        for id in ids {
            if !tasks.iter().any(|t| t.id == *id) {
                bail!("task {id} not found");
            }
        }
        let before = tasks.len();
        tasks.retain(|t| !ids.contains(&t.id));
        let removed = before - tasks.len();

        self.store.save(&tasks).context("failed to save tasks")?;
        self.commit(tasks);
        info!("Deleted {removed} task(s)");
        Ok(removed)
    }

    /// Re-read the store after an outside edit. An unreadable or corrupt file
    /// keeps the current in-memory list.
    pub fn reload(&mut self) -> Result<()> {
        let loaded = self.store.load().context("failed to reload tasks")?;
        if let Some(problem) = &loaded.corrupt {
            warn!("Ignoring unreadable task file on reload: {problem}");
            self.alerts.send(Alert::warning(
                "Warning",
                format!("Task file changed but could not be read: {problem}"),
            ));
            return Ok(());
        }
        if !loaded.skipped.is_empty() {
            self.alerts.send(Alert::warning(
                "Warning",
                format!("Skipped {} invalid task record(s)", loaded.skipped.len()),
            ));
        }
        persist_assigned_ids(self.store.as_ref(), &self.alerts, &loaded);
        self.commit(loaded.tasks);
        Ok(())
    }

    /// Open the `index`-th attachment of a task with the default handler.
    pub fn open_attachment(&self, id: TaskId, index: usize) -> Result<PathBuf> {
        let task = self.require(id)?;
        if task.files.is_empty() {
            bail!("task '{}' has no attached files", task.name);
        }
        let Some(path) = task.files.get(index) else {
            bail!(
                "task '{}' has {} attached file(s); index {index} is out of range",
                task.name,
                task.files.len()
            );
        };
        match opener::open_path(path) {
            Ok(()) => {
                info!("Opened file: {}", path.display());
                Ok(path.clone())
            }
            Err(e) => {
                error!("{e}");
                Err(e.into())
            }
        }
    }

    /// Send a one-off notification for a task, outside the reminder rules.
    pub fn test_notification(&self, id: TaskId) -> Result<()> {
        let task = self.require(id)?;
        let notification = self.settings.notification(
            "Test Notification",
            format!("Test: Task '{}' (Priority: {})", task.name, task.priority),
        );
        if let Err(e) = self.notifier.notify(&notification) {
            error!("Failed to send test notification for {}: {e:#}", task.name);
            self.alerts.send(Alert::error(
                "Notification Error",
                format!("Failed to send test notification: {e:#}"),
            ));
            return Err(e.context(format!(
                "failed to send test notification for '{}'",
                task.name
            )));
        }
        info!("Test notification sent for task: {}", task.name);
        Ok(())
    }

    /// Start the background reminder worker over this manager's board.
    pub fn start_scheduler(&self) -> Result<SchedulerHandle> {
        Scheduler::new(
            self.board.clone(),
            self.notifier.clone(),
            self.clock.clone(),
            self.alerts.clone(),
            self.settings.clone(),
        )
        .spawn()
    }
}
