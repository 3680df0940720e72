//! Scheduler implementation

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::eyre;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{Mutex, broadcast, oneshot};
use tracing::{debug, warn};

use crate::error::TaskError;
use crate::progress::{ProgressBus, ProgressEvent, ProgressStatus};
use crate::retry::RetryPolicy;
use crate::task::TaskOptions;

use super::config::SchedulerConfig;
use super::queue::{AttemptFn, AttemptFuture, QueuedTask, ReplyFn, TaskQueue, TaskValue};
use super::stats::{SchedulerStats, StatsRecorder};

/// A task holding an execution slot
struct ActiveTask {
    task: QueuedTask,

    /// Minted at admission; an attempt carrying a stale token is ignored
    token: u64,
}

/// A task waiting out its retry backoff
struct DelayedTask {
    task: QueuedTask,

    /// Matches the one sleeping timer allowed to promote this task
    token: u64,
}

/// Internal state protected by mutex
struct SchedulerInner {
    /// Tasks waiting for a slot, in pop order
    queue: TaskQueue,

    /// Tasks currently executing, by id
    active: HashMap<String, ActiveTask>,

    /// Tasks between a failed attempt and their next queue insertion
    delayed: HashMap<String, DelayedTask>,

    /// Statistics
    stats: StatsRecorder,

    /// Admission order counter
    next_seq: u64,

    /// Mint for admission and backoff-timer tokens
    next_token: u64,
}

impl SchedulerInner {
    fn mint_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn mint_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// An id is tracked while queued, executing, or waiting out a backoff
    fn holds(&self, id: &str) -> bool {
        self.queue.contains(id) || self.active.contains_key(id) || self.delayed.contains_key(id)
    }

    fn observe_depths(&mut self) {
        let active = self.active.len();
        let queued = self.queue.len();
        self.stats.observe_depths(active, queued);
    }

    /// Build a lifecycle event from the current counters
    fn task_event(&self, status: ProgressStatus, message: &str) -> ProgressEvent {
        ProgressEvent::new(
            status,
            self.stats.settled() as usize,
            self.stats.total_requests() as usize,
        )
        .with_message(message)
    }
}

/// State shared by every handle to one scheduler
struct SchedulerShared {
    config: SchedulerConfig,
    policy: RetryPolicy,
    bus: ProgressBus,
    inner: Mutex<SchedulerInner>,
}

/// The Scheduler runs submitted tasks with a concurrency cap, priority
/// queuing, per-attempt timeouts, and retries with linear backoff.
///
/// At most `max_concurrency` tasks execute at once; the rest wait in a
/// priority queue, first come first served within a band. Each attempt
/// races its timeout, failed attempts are retried under the scheduler's
/// [`RetryPolicy`], and lifecycle transitions are broadcast to anyone who
/// calls [`subscribe`](Self::subscribe).
///
/// `Scheduler` is a cheap handle; clones share one queue, one active set,
/// and one progress bus.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
}

impl Scheduler {
    /// Create a scheduler with the default retry policy
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_policy(config, RetryPolicy::default())
    }

    /// Create a scheduler with a custom retry policy
    pub fn with_policy(config: SchedulerConfig, policy: RetryPolicy) -> Self {
        let config = config.sanitize();
        debug!(?config, "Scheduler::with_policy: called");
        let bus = ProgressBus::new(config.channel_capacity);
        Self {
            shared: Arc::new(SchedulerShared {
                config,
                policy,
                bus,
                inner: Mutex::new(SchedulerInner {
                    queue: TaskQueue::default(),
                    active: HashMap::new(),
                    delayed: HashMap::new(),
                    stats: StatsRecorder::default(),
                    next_seq: 0,
                    next_token: 0,
                }),
            }),
        }
    }

    /// Run `executor` under the concurrency cap with default options
    ///
    /// Resolves once the task settles: with the executor's value, or with
    /// the error of its last attempt.
    pub async fn execute<F, Fut, T>(&self, id: &str, executor: F) -> Result<T, TaskError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
        T: Send + 'static,
    {
        self.execute_with(id, TaskOptions::new(), executor).await
    }

    /// Run `executor` with per-task overrides for timeout, retries, and
    /// priority
    ///
    /// `executor` is invoked once per attempt. Submitting an id that is
    /// already queued, executing, or waiting out a backoff fails with
    /// [`TaskError::Duplicate`] without touching the existing task.
    pub async fn execute_with<F, Fut, T>(
        &self,
        id: &str,
        options: TaskOptions,
        mut executor: F,
    ) -> Result<T, TaskError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
        T: Send + 'static,
    {
        debug!(%id, ?options, "Scheduler::execute_with: called");
        let (tx, rx) = oneshot::channel::<Result<T, TaskError>>();

        let attempt: AttemptFn = Box::new(move || {
            let fut = executor();
            async move {
                let value = fut.await?;
                Ok(Box::new(value) as TaskValue)
            }
            .boxed()
        });

        let reply: ReplyFn = Box::new(move |outcome| {
            let typed = outcome.and_then(|value| {
                value.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
                    TaskError::Execution(eyre!("executor settled with a value of an unexpected type"))
                })
            });
            let _ = tx.send(typed);
        });

        self.submit(id, options, attempt, reply).await?;

        rx.await
            .unwrap_or_else(|_| Err(TaskError::Execution(eyre!("scheduler dropped the task before it settled"))))
    }

    /// Queue a type-erased task and kick the admission loop
    async fn submit(
        &self,
        id: &str,
        options: TaskOptions,
        attempt: AttemptFn,
        reply: ReplyFn,
    ) -> Result<(), TaskError> {
        let config = &self.shared.config;
        let mut inner = self.shared.inner.lock().await;

        if inner.holds(id) {
            debug!(%id, "Scheduler::submit: id already tracked, rejecting");
            return Err(TaskError::Duplicate(id.to_string()));
        }

        let seq = inner.mint_seq();
        let task = QueuedTask {
            id: id.to_string(),
            priority: options.priority.unwrap_or(config.default_priority),
            timeout: options.timeout.unwrap_or_else(|| config.timeout()),
            max_retries: options.retry_count.unwrap_or(config.retry_count),
            retry_delay: options.retry_delay.unwrap_or_else(|| config.retry_delay()),
            retry_count: 0,
            created_at: Instant::now(),
            seq,
            started_at: None,
            attempt,
            reply: Some(reply),
        };

        debug!(%id, priority = %task.priority, seq, "Scheduler::submit: queued");
        inner.queue.insert(task);
        inner.stats.record_submitted();
        inner.observe_depths();
        drop(inner);

        self.drain().await;
        Ok(())
    }

    /// Admit queued tasks until the cap is reached or the queue is empty
    ///
    /// The inner lock serializes admission passes; attempts are spawned
    /// only after it is released. Returns a boxed future: retries re-enter
    /// admission through [`Self::promote_delayed`], and that cycle needs
    /// one explicitly `Send` edge.
    fn drain(&self) -> BoxFuture<'_, ()> {
        async move {
            let cap = self.shared.config.max_concurrency;
            let mut admitted = Vec::new();
            let mut events = Vec::new();

            let mut inner = self.shared.inner.lock().await;
            while inner.active.len() < cap {
                let Some(mut task) = inner.queue.pop_head() else {
                    break;
                };
                let token = inner.mint_token();
                let id = task.id.clone();
                let timeout = task.timeout;
                let queued_ms = task.created_at.elapsed().as_millis() as u64;
                debug!(%id, token, queued_ms, active = inner.active.len() + 1, "Scheduler::drain: admitting");

                task.started_at = Some(Instant::now());
                let fut = (task.attempt)();
                inner.active.insert(id.clone(), ActiveTask { task, token });
                events.push(inner.task_event(ProgressStatus::Started, &id));
                admitted.push((id, token, timeout, fut));
            }
            inner.observe_depths();
            drop(inner);

            for event in events {
                self.shared.bus.emit(event);
            }
            for (id, token, timeout, fut) in admitted {
                let scheduler = self.clone();
                tokio::spawn(async move {
                    scheduler.run_attempt(id, token, timeout, fut).await;
                });
            }
        }
        .boxed()
    }

    /// Race one executor invocation against its timeout
    ///
    /// The invocation runs in its own spawned task. When the timer wins,
    /// the invocation is left running in the background; its eventual
    /// result has nowhere to deliver and is dropped.
    async fn run_attempt(&self, id: String, token: u64, timeout: Duration, fut: AttemptFuture) {
        debug!(%id, token, ?timeout, "Scheduler::run_attempt: called");
        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = done_tx.send(fut.await);
        });

        let outcome = match tokio::time::timeout(timeout, done_rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(TaskError::Execution(eyre!("executor stopped before settling"))),
            Err(_) => {
                debug!(%id, token, "Scheduler::run_attempt: attempt timed out");
                Err(TaskError::Timeout(timeout))
            }
        };

        self.finish_attempt(&id, token, outcome).await;
    }

    /// Settle, retry, or discard a finished attempt
    async fn finish_attempt(&self, id: &str, token: u64, outcome: Result<TaskValue, TaskError>) {
        debug!(%id, token, ok = outcome.is_ok(), "Scheduler::finish_attempt: called");
        let mut events = Vec::new();

        let mut inner = self.shared.inner.lock().await;
        let mut task = match inner.active.remove(id) {
            Some(entry) if entry.token == token => entry.task,
            Some(entry) => {
                // A newer admission owns this id; leave it alone
                debug!(%id, token, "Scheduler::finish_attempt: stale token, discarding");
                inner.active.insert(id.to_string(), entry);
                return;
            }
            None => {
                debug!(%id, token, "Scheduler::finish_attempt: no longer active, discarding");
                return;
            }
        };

        match outcome {
            Ok(value) => {
                let execution_ms = task
                    .started_at
                    .map(|started| started.elapsed().as_millis() as u64)
                    .unwrap_or(0);
                debug!(%id, execution_ms, "Scheduler::finish_attempt: task succeeded");
                inner.stats.record_success(execution_ms);
                task.settle(Ok(value));
                events.push(inner.task_event(ProgressStatus::Completed, id));
            }
            Err(error) => {
                let retry = self
                    .shared
                    .policy
                    .should_retry(&error, task.retry_count, task.max_retries);
                if retry {
                    task.retry_count += 1;
                    let delay = self.shared.policy.delay_for(task.retry_count, task.retry_delay);
                    debug!(%id, retry_count = task.retry_count, ?delay, "Scheduler::finish_attempt: backing off before retry");
                    events.push(
                        inner
                            .task_event(ProgressStatus::Retrying, id)
                            .with_error(error.to_string()),
                    );

                    let delay_token = inner.mint_token();
                    inner.delayed.insert(id.to_string(), DelayedTask { task, token: delay_token });

                    let scheduler = self.clone();
                    let delayed_id = id.to_string();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        scheduler.promote_delayed(&delayed_id, delay_token).await;
                    });
                } else {
                    let message = error.to_string();
                    debug!(%id, %message, "Scheduler::finish_attempt: task failed");
                    inner.stats.record_failure();
                    task.settle(Err(error));
                    events.push(
                        inner
                            .task_event(ProgressStatus::Failed, id)
                            .with_error(message),
                    );
                }
            }
        }
        inner.observe_depths();
        drop(inner);

        for event in events {
            self.shared.bus.emit(event);
        }
        self.drain().await;
    }

    /// Requeue a task whose backoff has elapsed
    async fn promote_delayed(&self, id: &str, token: u64) {
        debug!(%id, token, "Scheduler::promote_delayed: called");
        let mut inner = self.shared.inner.lock().await;
        match inner.delayed.remove(id) {
            Some(delayed) if delayed.token == token => {
                debug!(%id, "Scheduler::promote_delayed: requeueing for retry");
                inner.queue.insert(delayed.task);
                inner.observe_depths();
            }
            Some(delayed) => {
                // A different backoff timer owns this id now
                debug!(%id, token, "Scheduler::promote_delayed: stale timer, discarding");
                inner.delayed.insert(id.to_string(), delayed);
                return;
            }
            None => {
                debug!(%id, token, "Scheduler::promote_delayed: no longer delayed");
                return;
            }
        }
        drop(inner);

        self.drain().await;
    }

    /// Cancel a task by id, best effort
    ///
    /// A queued task is removed before its executor ever runs. A task that
    /// is executing (or waiting out a backoff) fails its caller immediately
    /// with [`TaskError::Cancelled`], but an executor invocation already in
    /// flight is not interrupted: it runs to completion in the background
    /// and its result is dropped.
    ///
    /// Returns `false` when the id is not tracked.
    pub async fn cancel_request(&self, id: &str) -> bool {
        debug!(%id, "Scheduler::cancel_request: called");
        let mut inner = self.shared.inner.lock().await;

        let mut task = if let Some(task) = inner.queue.remove(id) {
            debug!(%id, "Scheduler::cancel_request: removed from queue");
            task
        } else if let Some(delayed) = inner.delayed.remove(id) {
            debug!(%id, "Scheduler::cancel_request: removed mid-backoff");
            delayed.task
        } else if let Some(active) = inner.active.remove(id) {
            debug!(%id, "Scheduler::cancel_request: was executing, abandoning the attempt");
            active.task
        } else {
            debug!(%id, "Scheduler::cancel_request: not tracked");
            return false;
        };

        inner.stats.record_failure();
        task.settle(Err(TaskError::Cancelled));
        let event = inner
            .task_event(ProgressStatus::Failed, id)
            .with_error(TaskError::Cancelled.to_string());
        inner.observe_depths();
        drop(inner);

        self.shared.bus.emit(event);
        self.drain().await;
        true
    }

    /// Fail every tracked task and empty the scheduler
    ///
    /// Queued, delayed, and active tasks all settle with
    /// [`TaskError::Cleanup`]. Executor invocations already in flight keep
    /// running in the background; their results are dropped. The scheduler
    /// stays usable afterwards.
    pub async fn cleanup(&self) {
        debug!("Scheduler::cleanup: called");
        let mut inner = self.shared.inner.lock().await;

        if inner.queue.is_empty() && inner.delayed.is_empty() && inner.active.is_empty() {
            debug!("Scheduler::cleanup: nothing tracked");
            return;
        }

        let mut tasks = inner.queue.drain();
        tasks.extend(inner.delayed.drain().map(|(_, delayed)| delayed.task));
        tasks.extend(inner.active.drain().map(|(_, active)| active.task));

        warn!(count = tasks.len(), "Scheduler::cleanup: failing all tracked tasks");
        for mut task in tasks {
            inner.stats.record_failure();
            task.settle(Err(TaskError::Cleanup));
        }
        let event = inner
            .task_event(ProgressStatus::Failed, "cleanup")
            .with_error(TaskError::Cleanup.to_string());
        inner.observe_depths();
        drop(inner);

        self.shared.bus.emit(event);
    }

    /// Get the scheduler statistics
    pub async fn stats(&self) -> SchedulerStats {
        debug!("Scheduler::stats: called");
        let inner = self.shared.inner.lock().await;
        inner.stats.snapshot(inner.active.len(), inner.queue.len())
    }

    /// Number of tasks currently holding an execution slot
    pub async fn active_request_count(&self) -> usize {
        self.shared.inner.lock().await.active.len()
    }

    /// Number of tasks waiting for a slot
    pub async fn queued_request_count(&self) -> usize {
        self.shared.inner.lock().await.queue.len()
    }

    /// Subscribe to task lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.shared.bus.subscribe()
    }

    /// The configuration this scheduler runs with, after sanitizing
    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }
}
