use std::collections::HashSet;
use std::sync::Arc;

use log::info;
use parking_lot::Mutex;

use crate::model::{Task, TaskId};
use crate::queue::TaskQueue;

/// State shared by the task manager and the scheduler worker. One mutex
/// guards all three fields, so a tick never sees a queue built from a
/// different task list than the one it reads.
#[derive(Debug, Default)]
pub struct Board {
    pub tasks: Vec<Task>,
    pub queue: TaskQueue,
    /// Tasks that already had their one reminder attempt. Their entries are
    /// still rebuilt into the queue but are evicted without a second attempt.
    pub reminded: HashSet<TaskId>,
}

pub type SharedBoard = Arc<Mutex<Board>>;

impl Board {
    pub fn new(tasks: Vec<Task>) -> Self {
        let mut board = Self {
            tasks,
            ..Self::default()
        };
        board.rebuild();
        board
    }

    pub fn into_shared(self) -> SharedBoard {
        Arc::new(Mutex::new(self))
    }

    /// Replace the queue with one built from the current task list.
    pub fn rebuild(&mut self) {
        let tasks = &self.tasks;
        self.reminded.retain(|id| tasks.iter().any(|t| t.id == *id));
        self.queue = TaskQueue::build(&self.tasks);
        info!("Rebuilt priority queue with {} tasks", self.queue.len());
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Remove the task's queue entry and record the reminder attempt.
    /// Returns true only when a reminder is owed: the task had an entry and
    /// no earlier attempt.
    pub fn mark_reminded(&mut self, id: TaskId) -> bool {
        if self.queue.remove(id).is_none() {
            return false;
        }
        self.reminded.insert(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Priority, Status};
    use crate::validate::parse_due;

    fn task(name: &str) -> Task {
        Task {
            id: TaskId::new(),
            name: name.into(),
            description: String::new(),
            due: parse_due("2026-06-01", "12:00").unwrap(),
            priority: Priority::Medium,
            status: Status::Pending,
            files: vec![],
        }
    }

    #[test]
    fn rebuild_queues_every_pending_task() {
        let mut board = Board::new(vec![task("a"), task("b")]);
        let a = board.tasks[0].id;
        assert!(board.mark_reminded(a));
        assert!(!board.mark_reminded(a));
        assert_eq!(board.queue.len(), 1);

        board.rebuild();
        assert!(board.queue.contains(a));
        assert_eq!(board.queue.len(), 2);
        assert!(board.reminded.contains(&a));
    }

    #[test]
    fn reminded_task_is_evicted_without_a_second_attempt() {
        let mut board = Board::new(vec![task("a")]);
        let a = board.tasks[0].id;
        assert!(board.mark_reminded(a));
        board.rebuild();

        assert!(!board.mark_reminded(a));
        assert!(!board.queue.contains(a));
    }

    #[test]
    fn rebuild_forgets_deleted_tasks() {
        let mut board = Board::new(vec![task("a"), task("b")]);
        let a = board.tasks[0].id;
        board.mark_reminded(a);
        board.tasks.retain(|t| t.id != a);
        board.rebuild();
        assert!(board.reminded.is_empty());
        assert_eq!(board.queue.len(), 1);
    }

    #[test]
    fn completion_purges_on_rebuild() {
        let mut board = Board::new(vec![task("a"), task("b")]);
        let b = board.tasks[1].id;
        board.tasks[1].status = Status::Completed;
        assert!(board.queue.contains(b));
        board.rebuild();
        assert!(!board.queue.contains(b));
    }
}
