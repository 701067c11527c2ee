//! Background reminder worker.
//!
//! Each tick snapshots the board under the lock, classifies the snapshot
//! with [`schedule::tick`], evicts the affected entries under the lock again,
//! and only then delivers notifications, so delivery never holds up the
//! main actor. An entry is evicted before its single delivery attempt, which
//! gives at-most-once delivery even if the notifier fails or panics.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::TimeDelta;
use log::{debug, error, info, warn};
use parking_lot::{Condvar, Mutex};

use crate::alert::{Alert, AlertSink};
use crate::board::SharedBoard;
use crate::clock::Clock;
use crate::config::Config;
use crate::model::Priority;
use crate::notifier::{Notification, Notifier};
use crate::schedule::{self, Action, EntrySnapshot, QueueSnapshot, TaskSnapshot};

#[derive(Debug, Clone)]
pub struct ReminderSettings {
    pub poll_interval: Duration,
    pub window: TimeDelta,
    pub app_name: String,
    pub timeout: Duration,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            window: schedule::default_window(),
            app_name: "taskbell".into(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl ReminderSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.reminders.poll_interval(),
            window: config.reminders.window(),
            app_name: config.notifications.app_name.clone(),
            timeout: config.notifications.timeout(),
        }
    }

    pub fn notification(&self, title: &str, message: String) -> Notification {
        Notification {
            title: title.into(),
            message,
            app_name: self.app_name.clone(),
            timeout: self.timeout,
        }
    }

    /// Reminder sent by the periodic scan.
    pub fn reminder(&self, name: &str, priority: Priority) -> Notification {
        self.notification(
            "Task Reminder",
            format!(
                "Task '{name}' (Priority: {priority}) is due in {}!",
                describe_window(self.window)
            ),
        )
    }

    /// Reminder sent right after creating a task that is already due soon.
    pub fn creation_reminder(&self, name: &str, priority: Priority) -> Notification {
        self.notification(
            "Task Reminder",
            format!("Task '{name}' (Priority: {priority}) is due soon!"),
        )
    }
}

/// "1 hour", "2 hours", "45 minutes".
pub fn describe_window(window: TimeDelta) -> String {
    let mins = window.num_minutes();
    if mins > 0 && mins % 60 == 0 {
        let hours = mins / 60;
        if hours == 1 {
            "1 hour".into()
        } else {
            format!("{hours} hours")
        }
    } else if mins == 1 {
        "1 minute".into()
    } else {
        format!("{mins} minutes")
    }
}

/// Attempt one delivery. Failures are logged and surfaced as an alert.
pub(crate) fn deliver(
    notifier: &dyn Notifier,
    alerts: &AlertSink,
    notification: &Notification,
    task_name: &str,
) -> bool {
    match notifier.notify(notification) {
        Ok(()) => {
            info!("Notification sent for task: {task_name}");
            true
        }
        Err(e) => {
            error!("Failed to send notification for {task_name}: {e:#}");
            alerts.send(Alert::error(
                "Notification Error",
                format!("Failed to send notification for '{task_name}': {e:#}"),
            ));
            false
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub notified: usize,
    pub failed: usize,
    pub expired: usize,
    pub discarded: usize,
    /// Due-soon entries evicted without notifying because the task was
    /// already reminded before a rebuild queued it again.
    pub repeats: usize,
}

pub struct Scheduler {
    board: SharedBoard,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    alerts: AlertSink,
    settings: ReminderSettings,
}

impl Scheduler {
    pub fn new(
        board: SharedBoard,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        alerts: AlertSink,
        settings: ReminderSettings,
    ) -> Self {
        Self {
            board,
            notifier,
            clock,
            alerts,
            settings,
        }
    }

    fn snapshot(&self) -> QueueSnapshot {
        let board = self.board.lock();
        let entries = board
            .queue
            .entries()
            .into_iter()
            .map(|entry| EntrySnapshot {
                entry,
                task: board.task(entry.task).map(|t| TaskSnapshot {
                    name: t.name.clone(),
                    priority: t.priority,
                    status: t.status,
                }),
            })
            .collect();
        QueueSnapshot {
            entries,
            now: self.clock.now(),
            window: self.settings.window,
        }
    }

    /// Evict entries named by `actions`, skipping any that a concurrent
    /// rebuild already removed. Returns the notifications still owed.
    fn apply(&self, actions: &[Action], report: &mut TickReport) -> Vec<(String, Notification)> {
        let mut owed = Vec::new();
        let mut board = self.board.lock();
        for action in actions {
            match action {
                Action::Notify {
                    task,
                    name,
                    priority,
                    remaining_secs,
                } => {
                    let pending = board.task(*task).is_some_and(|t| t.is_pending());
                    if !pending {
                        continue;
                    }
                    let queued = board.queue.contains(*task);
                    if board.mark_reminded(*task) {
                        debug!("Task {name} due in {remaining_secs}s, notifying");
                        owed.push((name.clone(), self.settings.reminder(name, *priority)));
                    } else if queued {
                        debug!("Task {name} was already reminded, evicted without notifying");
                        report.repeats += 1;
                    }
                }
                Action::Expire { task, name } => {
                    if board.queue.remove(*task).is_some() {
                        info!("Task {name} is past due, removed from queue");
                        report.expired += 1;
                    }
                }
                Action::Discard { task } => {
                    if board.queue.remove(*task).is_some() {
                        warn!("Queue entry {task} has no matching task, discarded");
                        report.discarded += 1;
                    }
                }
            }
        }
        owed
    }

    /// Run one scan. Public so callers can drive the scheduler without a thread.
    pub fn tick_once(&self) -> TickReport {
        let snapshot = self.snapshot();
        debug!(
            "Checking notifications at {}, queue size: {}",
            snapshot.now,
            snapshot.entries.len()
        );
        let actions = schedule::tick(&snapshot);
        let mut report = TickReport::default();
        if actions.is_empty() {
            return report;
        }

        let owed = self.apply(&actions, &mut report);
        for (name, notification) in owed {
            if deliver(self.notifier.as_ref(), &self.alerts, &notification, &name) {
                report.notified += 1;
            } else {
                report.failed += 1;
            }
        }
        report
    }

    fn run(&self, signal: &StopSignal) {
        info!(
            "Scheduler started (poll={}s, window={})",
            self.settings.poll_interval.as_secs(),
            describe_window(self.settings.window)
        );
        loop {
            if panic::catch_unwind(AssertUnwindSafe(|| self.tick_once())).is_err() {
                error!("Scheduler tick panicked; continuing");
            }
            if signal.wait(self.settings.poll_interval) {
                break;
            }
        }
        info!("Scheduler stopped");
    }

    /// Start the worker thread.
    pub fn spawn(self) -> Result<SchedulerHandle> {
        let signal = Arc::new(StopSignal::default());
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let worker_signal = signal.clone();
        let thread = std::thread::Builder::new()
            .name("taskbell-scheduler".into())
            .spawn(move || {
                // Dropped when the thread ends, which is what stop() waits for.
                let _done = done_tx;
                self.run(&worker_signal);
            })
            .context("failed to spawn scheduler thread")?;

        Ok(SchedulerHandle {
            signal,
            done: done_rx,
            thread: Some(thread),
        })
    }
}

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl StopSignal {
    fn stop(&self) {
        *self.stopped.lock() = true;
        self.cv.notify_all();
    }

    /// Sleep up to `timeout`; returns true once a stop was requested.
    fn wait(&self, timeout: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            while !*stopped {
                self.cv.wait(&mut stopped);
            }
            return true;
        };
        while !*stopped {
            if self.cv.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

pub struct SchedulerHandle {
    signal: Arc<StopSignal>,
    done: Receiver<()>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Ask the worker to stop and wait at most `timeout` for it. A tick in
    /// progress is allowed to finish. Returns false if the worker was still
    /// running at the deadline; it is then detached.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        self.signal.stop();
        let Some(thread) = self.thread.take() else {
            return true;
        };
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if thread.join().is_err() {
                    error!("Scheduler thread panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Scheduler did not stop within {}ms, continuing shutdown",
                    timeout.as_millis()
                );
                false
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.signal.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::clock::ManualClock;
    use crate::model::{Status, Task, TaskId};
    use crate::notifier::MemoryNotifier;
    use crate::validate::parse_due;
    use chrono::NaiveDateTime;

    fn now() -> NaiveDateTime {
        parse_due("2026-06-01", "12:00").unwrap()
    }

    fn task(name: &str, offset_mins: i64) -> Task {
        Task {
            id: TaskId::new(),
            name: name.into(),
            description: String::new(),
            due: now() + TimeDelta::minutes(offset_mins),
            priority: Priority::High,
            status: Status::Pending,
            files: vec![],
        }
    }

    struct Fixture {
        board: SharedBoard,
        notifier: Arc<MemoryNotifier>,
        clock: Arc<ManualClock>,
        alerts: Receiver<Alert>,
        scheduler: Scheduler,
    }

    fn fixture(tasks: Vec<Task>, fail: bool) -> Fixture {
        let board = Board::new(tasks).into_shared();
        let notifier = Arc::new(if fail {
            MemoryNotifier::failing()
        } else {
            MemoryNotifier::new()
        });
        let clock = Arc::new(ManualClock::new(now()));
        let (sink, alerts) = AlertSink::channel();
        let scheduler = Scheduler::new(
            board.clone(),
            notifier.clone(),
            clock.clone(),
            sink,
            ReminderSettings::default(),
        );
        Fixture {
            board,
            notifier,
            clock,
            alerts,
            scheduler,
        }
    }

    #[test]
    fn due_soon_task_notified_once_and_evicted() {
        let f = fixture(vec![task("soon", 30), task("later", 180)], false);
        let report = f.scheduler.tick_once();
        assert_eq!(report.notified, 1);
        assert_eq!(f.board.lock().queue.len(), 1);

        let sent = f.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "Task Reminder");
        assert_eq!(sent[0].message, "Task 'soon' (Priority: High) is due in 1 hour!");

        // A second scan does not notify again.
        assert_eq!(f.scheduler.tick_once(), TickReport::default());
        assert_eq!(f.notifier.sent().len(), 1);
    }

    #[test]
    fn failed_delivery_still_evicts_and_alerts() {
        let f = fixture(vec![task("soon", 30)], true);
        let report = f.scheduler.tick_once();
        assert_eq!(report.failed, 1);
        assert_eq!(report.notified, 0);
        assert!(f.board.lock().queue.is_empty());

        let alert = f.alerts.try_recv().unwrap();
        assert_eq!(alert.title, "Notification Error");

        f.scheduler.tick_once();
        assert_eq!(f.notifier.sent().len(), 1);
    }

    #[test]
    fn past_due_task_evicted_silently() {
        let f = fixture(vec![task("late", -5)], false);
        let report = f.scheduler.tick_once();
        assert_eq!(report.expired, 1);
        assert!(f.notifier.sent().is_empty());
        assert!(f.board.lock().queue.is_empty());
        // The task itself is untouched.
        assert_eq!(f.board.lock().tasks[0].status, Status::Pending);
    }

    #[test]
    fn task_becomes_due_soon_as_clock_advances() {
        let f = fixture(vec![task("meeting", 90)], false);
        assert_eq!(f.scheduler.tick_once(), TickReport::default());
        f.clock.advance(TimeDelta::minutes(31));
        assert_eq!(f.scheduler.tick_once().notified, 1);
    }

    #[test]
    fn rebuild_after_reminder_does_not_notify_again() {
        let f = fixture(vec![task("soon", 30), task("later", 180)], false);
        assert_eq!(f.scheduler.tick_once().notified, 1);

        f.board.lock().rebuild();
        assert_eq!(f.board.lock().queue.len(), 2);

        let report = f.scheduler.tick_once();
        assert_eq!(report.notified, 0);
        assert_eq!(report.repeats, 1);
        assert_eq!(f.board.lock().queue.len(), 1);
        assert_eq!(f.notifier.sent().len(), 1);
    }

    #[test]
    fn completed_without_rebuild_is_left_in_queue() {
        let f = fixture(vec![task("soon", 30)], false);
        {
            let mut board = f.board.lock();
            board.tasks[0].status = Status::Completed;
        }
        assert_eq!(f.scheduler.tick_once(), TickReport::default());
        assert_eq!(f.board.lock().queue.len(), 1);
        assert!(f.notifier.sent().is_empty());
    }

    #[test]
    fn empty_board_is_a_no_op() {
        let f = fixture(vec![], false);
        assert_eq!(f.scheduler.tick_once(), TickReport::default());
    }

    #[test]
    fn spawned_worker_stops_promptly() {
        let mut f = fixture(vec![task("soon", 30)], false);
        f.scheduler.settings.poll_interval = Duration::from_secs(3600);
        let notifier = f.notifier.clone();
        let mut handle = f.scheduler.spawn().unwrap();

        // First tick runs immediately on start.
        let deadline = Instant::now() + Duration::from_secs(5);
        while notifier.sent().is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(notifier.sent().len(), 1);

        assert!(handle.stop(Duration::from_secs(5)));
        assert!(!handle.is_running());
    }

    #[test]
    fn unbounded_wait_returns_on_stop() {
        let signal = Arc::new(StopSignal::default());
        let waiter = signal.clone();
        let thread = std::thread::spawn(move || waiter.wait(Duration::MAX));
        std::thread::sleep(Duration::from_millis(20));
        signal.stop();
        assert!(thread.join().unwrap());
        assert!(signal.wait(Duration::from_millis(1)));
    }

    #[test]
    fn window_descriptions() {
        assert_eq!(describe_window(TimeDelta::hours(1)), "1 hour");
        assert_eq!(describe_window(TimeDelta::hours(3)), "3 hours");
        assert_eq!(describe_window(TimeDelta::minutes(45)), "45 minutes");
        assert_eq!(describe_window(TimeDelta::minutes(1)), "1 minute");
    }
}
