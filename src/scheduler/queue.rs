//! Queue types for the scheduler
//!
//! A [`QueuedTask`] carries its executor and its caller's reply channel as
//! type-erased closures, so one queue can hold tasks whose executors
//! produce different result types. The typed surface lives in
//! [`Scheduler::execute`](crate::scheduler::Scheduler::execute), which
//! erases on the way in and downcasts on the way out.

use std::any::Any;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;

use crate::error::TaskError;
use crate::task::Priority;

/// Type-erased success value produced by an executor
pub(crate) type TaskValue = Box<dyn Any + Send>;

/// One executor invocation
pub(crate) type AttemptFuture = BoxFuture<'static, Result<TaskValue, TaskError>>;

/// Factory for executor invocations; called once per attempt
pub(crate) type AttemptFn = Box<dyn FnMut() -> AttemptFuture + Send>;

/// Delivers the final outcome to the waiting caller
pub(crate) type ReplyFn = Box<dyn FnOnce(Result<TaskValue, TaskError>) + Send>;

/// A task waiting for, or holding, an execution slot
pub(crate) struct QueuedTask {
    pub id: String,
    pub priority: Priority,

    /// Per-attempt timeout
    pub timeout: Duration,

    /// Retries allowed after the first attempt
    pub max_retries: u32,

    /// Base backoff; the n-th retry waits n times this
    pub retry_delay: Duration,

    /// Retries consumed so far
    pub retry_count: u32,

    pub created_at: Instant,

    /// Admission order tiebreaker within a priority band
    pub seq: u64,

    /// Stamped when the task is admitted to a slot
    pub started_at: Option<Instant>,

    pub attempt: AttemptFn,

    /// Taken exactly once when the task settles
    pub reply: Option<ReplyFn>,
}

impl QueuedTask {
    /// Deliver the final outcome; later settlements are silently dropped
    pub fn settle(&mut self, outcome: Result<TaskValue, TaskError>) {
        if let Some(reply) = self.reply.take() {
            reply(outcome);
        }
    }
}

impl std::fmt::Debug for QueuedTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedTask")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("retry_count", &self.retry_count)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

/// Priority-banded FIFO queue
///
/// Tasks are kept in pop order: descending priority, and admission order
/// within a band. Insertion places a task after every task of equal or
/// higher priority, so same-priority tasks run first come, first served.
#[derive(Default)]
pub(crate) struct TaskQueue {
    tasks: Vec<QueuedTask>,
}

impl TaskQueue {
    pub fn insert(&mut self, task: QueuedTask) {
        let position = self
            .tasks
            .iter()
            .position(|queued| queued.priority < task.priority)
            .unwrap_or(self.tasks.len());
        self.tasks.insert(position, task);
    }

    /// Take the next task to run
    pub fn pop_head(&mut self) -> Option<QueuedTask> {
        if self.tasks.is_empty() {
            None
        } else {
            Some(self.tasks.remove(0))
        }
    }

    /// Remove a task by id, wherever it sits in the queue
    pub fn remove(&mut self, id: &str) -> Option<QueuedTask> {
        let position = self.tasks.iter().position(|queued| queued.id == id)?;
        Some(self.tasks.remove(position))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.iter().any(|queued| queued.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Empty the queue, handing back every task
    pub fn drain(&mut self) -> Vec<QueuedTask> {
        std::mem::take(&mut self.tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use proptest::prelude::*;

    fn task(id: &str, priority: Priority, seq: u64) -> QueuedTask {
        QueuedTask {
            id: id.to_string(),
            priority,
            timeout: Duration::from_secs(30),
            max_retries: 0,
            retry_delay: Duration::from_millis(10),
            retry_count: 0,
            created_at: Instant::now(),
            seq,
            started_at: None,
            attempt: Box::new(|| async { Ok(Box::new(()) as TaskValue) }.boxed()),
            reply: None,
        }
    }

    #[test]
    fn test_pop_order_by_priority() {
        let mut queue = TaskQueue::default();
        queue.insert(task("low", Priority::Low, 0));
        queue.insert(task("high", Priority::High, 1));
        queue.insert(task("normal", Priority::Normal, 2));

        assert_eq!(queue.pop_head().unwrap().id, "high");
        assert_eq!(queue.pop_head().unwrap().id, "normal");
        assert_eq!(queue.pop_head().unwrap().id, "low");
        assert!(queue.pop_head().is_none());
    }

    #[test]
    fn test_fifo_within_priority_band() {
        let mut queue = TaskQueue::default();
        queue.insert(task("first", Priority::Normal, 0));
        queue.insert(task("second", Priority::Normal, 1));
        queue.insert(task("third", Priority::Normal, 2));

        assert_eq!(queue.pop_head().unwrap().id, "first");
        assert_eq!(queue.pop_head().unwrap().id, "second");
        assert_eq!(queue.pop_head().unwrap().id, "third");
    }

    #[test]
    fn test_high_priority_jumps_ahead_of_waiting_normals() {
        let mut queue = TaskQueue::default();
        queue.insert(task("n1", Priority::Normal, 0));
        queue.insert(task("n2", Priority::Normal, 1));
        queue.insert(task("urgent", Priority::High, 2));

        assert_eq!(queue.pop_head().unwrap().id, "urgent");
        assert_eq!(queue.pop_head().unwrap().id, "n1");
    }

    #[test]
    fn test_remove_by_id() {
        let mut queue = TaskQueue::default();
        queue.insert(task("keep", Priority::Normal, 0));
        queue.insert(task("drop", Priority::Normal, 1));

        let removed = queue.remove("drop").unwrap();
        assert_eq!(removed.id, "drop");
        assert!(queue.remove("drop").is_none());
        assert!(queue.contains("keep"));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_drain_empties_queue() {
        let mut queue = TaskQueue::default();
        queue.insert(task("a", Priority::Low, 0));
        queue.insert(task("b", Priority::High, 1));

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_settle_is_take_once() {
        let (tx, rx) = std::sync::mpsc::channel();
        let mut queued = task("once", Priority::Normal, 0);
        queued.reply = Some(Box::new(move |outcome| {
            let _ = tx.send(outcome.is_ok());
        }));

        queued.settle(Ok(Box::new(7_u32) as TaskValue));
        queued.settle(Err(TaskError::Cancelled));

        assert_eq!(rx.try_recv(), Ok(true));
        assert!(rx.try_recv().is_err());
    }

    fn arbitrary_priority() -> impl Strategy<Value = Priority> {
        prop_oneof![
            Just(Priority::Low),
            Just(Priority::Normal),
            Just(Priority::High),
        ]
    }

    proptest! {
        #[test]
        fn test_pop_sequence_sorted_by_priority_then_admission(
            priorities in prop::collection::vec(arbitrary_priority(), 0..32)
        ) {
            let mut queue = TaskQueue::default();
            for (seq, priority) in priorities.iter().enumerate() {
                queue.insert(task(&format!("t{seq}"), *priority, seq as u64));
            }
            prop_assert_eq!(queue.len(), priorities.len());

            let mut popped = Vec::new();
            while let Some(next) = queue.pop_head() {
                popped.push((next.priority, next.seq));
            }
            prop_assert_eq!(popped.len(), priorities.len());

            for pair in popped.windows(2) {
                let (ahead, behind) = (pair[0], pair[1]);
                prop_assert!(
                    ahead.0 > behind.0 || (ahead.0 == behind.0 && ahead.1 < behind.1),
                    "out of order: {:?} before {:?}",
                    ahead,
                    behind
                );
            }
        }
    }
}
