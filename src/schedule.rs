use chrono::{NaiveDateTime, TimeDelta};

use crate::model::{Priority, Status, TaskId};
use crate::queue::QueueEntry;

pub fn default_window() -> TimeDelta {
    TimeDelta::hours(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// More than one window away.
    Scheduled,
    /// `0 < remaining <= window`.
    DueSoon,
    /// `remaining <= 0`.
    Expired,
}

pub fn classify(due: NaiveDateTime, now: NaiveDateTime, window: TimeDelta) -> Phase {
    let remaining = due - now;
    if remaining <= TimeDelta::zero() {
        Phase::Expired
    } else if remaining <= window {
        Phase::DueSoon
    } else {
        Phase::Scheduled
    }
}

#[derive(Debug, Clone)]
pub struct TaskSnapshot {
    pub name: String,
    pub priority: Priority,
    pub status: Status,
}

#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    pub entry: QueueEntry,
    /// None when the referenced task no longer exists.
    pub task: Option<TaskSnapshot>,
}

pub struct QueueSnapshot {
    pub entries: Vec<EntrySnapshot>,
    pub now: NaiveDateTime,
    pub window: TimeDelta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Evict and attempt one notification.
    Notify {
        task: TaskId,
        name: String,
        priority: Priority,
        remaining_secs: i64,
    },
    /// Evict silently; the due time has passed.
    Expire { task: TaskId, name: String },
    /// Evict an entry whose task is gone.
    Discard { task: TaskId },
}

impl Action {
    pub fn task(&self) -> TaskId {
        match self {
            Action::Notify { task, .. } | Action::Expire { task, .. } | Action::Discard { task } => *task,
        }
    }
}

/// Decide what to do with every entry of a snapshot. Entries of completed
/// tasks and entries still outside the window produce no action.
pub fn tick(snapshot: &QueueSnapshot) -> Vec<Action> {
    let mut actions = Vec::new();

    for item in &snapshot.entries {
        let id = item.entry.task;
        let Some(task) = &item.task else {
            actions.push(Action::Discard { task: id });
            continue;
        };
        if task.status != Status::Pending {
            continue;
        }
        match classify(item.entry.due, snapshot.now, snapshot.window) {
            Phase::Scheduled => {}
            Phase::DueSoon => actions.push(Action::Notify {
                task: id,
                name: task.name.clone(),
                priority: task.priority,
                remaining_secs: (item.entry.due - snapshot.now).num_seconds(),
            }),
            Phase::Expired => actions.push(Action::Expire {
                task: id,
                name: task.name.clone(),
            }),
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::parse_due;

    fn now() -> NaiveDateTime {
        parse_due("2026-06-01", "12:00").unwrap()
    }

    fn entry(name: &str, offset_mins: i64, status: Status) -> EntrySnapshot {
        EntrySnapshot {
            entry: QueueEntry {
                priority: Priority::Medium,
                due: now() + TimeDelta::minutes(offset_mins),
                task: TaskId::new(),
            },
            task: Some(TaskSnapshot {
                name: name.into(),
                priority: Priority::Medium,
                status,
            }),
        }
    }

    fn snapshot(entries: Vec<EntrySnapshot>) -> QueueSnapshot {
        QueueSnapshot {
            entries,
            now: now(),
            window: default_window(),
        }
    }

    #[test]
    fn classify_boundaries() {
        let w = default_window();
        let n = now();
        assert_eq!(classify(n, n, w), Phase::Expired);
        assert_eq!(classify(n - TimeDelta::seconds(1), n, w), Phase::Expired);
        assert_eq!(classify(n + TimeDelta::seconds(1), n, w), Phase::DueSoon);
        assert_eq!(classify(n + TimeDelta::minutes(30), n, w), Phase::DueSoon);
        assert_eq!(classify(n + TimeDelta::hours(1), n, w), Phase::DueSoon);
        assert_eq!(
            classify(n + TimeDelta::hours(1) + TimeDelta::seconds(1), n, w),
            Phase::Scheduled
        );
    }

    #[test]
    fn empty_queue_no_actions() {
        assert!(tick(&snapshot(vec![])).is_empty());
    }

    #[test]
    fn due_soon_notifies() {
        let e = entry("soon", 30, Status::Pending);
        let id = e.entry.task;
        let actions = tick(&snapshot(vec![e]));
        assert_eq!(
            actions,
            vec![Action::Notify {
                task: id,
                name: "soon".into(),
                priority: Priority::Medium,
                remaining_secs: 1800,
            }]
        );
    }

    #[test]
    fn past_due_expires_without_notification() {
        let e = entry("late", -5, Status::Pending);
        let id = e.entry.task;
        let actions = tick(&snapshot(vec![e]));
        assert_eq!(actions, vec![Action::Expire { task: id, name: "late".into() }]);
    }

    #[test]
    fn due_exactly_now_expires() {
        let actions = tick(&snapshot(vec![entry("now", 0, Status::Pending)]));
        assert!(matches!(actions[..], [Action::Expire { .. }]));
    }

    #[test]
    fn far_future_untouched() {
        assert!(tick(&snapshot(vec![entry("later", 120, Status::Pending)])).is_empty());
    }

    #[test]
    fn completed_tasks_left_alone() {
        let actions = tick(&snapshot(vec![
            entry("done-soon", 10, Status::Completed),
            entry("done-late", -10, Status::Completed),
        ]));
        assert!(actions.is_empty());
    }

    #[test]
    fn missing_task_discarded() {
        let mut e = entry("gone", 10, Status::Pending);
        e.task = None;
        let id = e.entry.task;
        assert_eq!(tick(&snapshot(vec![e])), vec![Action::Discard { task: id }]);
    }

    #[test]
    fn mixed_snapshot_yields_one_action_per_affected_entry() {
        let actions = tick(&snapshot(vec![
            entry("a", 5, Status::Pending),
            entry("b", -1, Status::Pending),
            entry("c", 90, Status::Pending),
            entry("d", 45, Status::Pending),
        ]));
        let kinds: Vec<&str> = actions
            .iter()
            .map(|a| match a {
                Action::Notify { .. } => "notify",
                Action::Expire { .. } => "expire",
                Action::Discard { .. } => "discard",
            })
            .collect();
        assert_eq!(kinds, vec!["notify", "expire", "notify"]);
    }
}
