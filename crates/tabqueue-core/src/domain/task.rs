//! Task: one deferred unit of asynchronous work.
//!
//! A [`Task`] owns the caller's action and is consumed by
//! [`TaskQueue::enqueue`](crate::queue::TaskQueue::enqueue), so the same work
//! cannot be queued twice. Everything observable about it lives behind a
//! cloneable [`TaskHandle`], which the queue fills in as the task runs.
//!
//! # 所有権の分け方
//! - `Task<T>`: action（`FnOnce`）を持つ。`Clone` できないので二重投入は型で防がれる
//! - `TaskHandle<T>`: 状態・結果・時刻の共有ビュー。呼び出し側とキューの両方が持つ
//!
//! 状態の通知は `tokio::sync::watch` で行い、[`TaskHandle::settled`] はそれを待つだけ。
//! 結果（outcome）は一度だけ書き込まれ、その後は上書きされない。

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use super::{ActionError, TaskId, TaskState};

/// Boxed future returned by a task's action.
pub type ActionFuture<T> = Pin<Box<dyn Future<Output = Result<T, ActionError>> + Send + 'static>>;

pub(crate) type Action<T> = Box<dyn FnOnce(TaskHandle<T>) -> ActionFuture<T> + Send + 'static>;

/// A unit of work plus the extra delay to wait before starting it.
///
/// Constructing a task has no side effects. The action runs only when the
/// owning queue dispatches it, and it receives the task's own handle for
/// introspection.
pub struct Task<T> {
    handle: TaskHandle<T>,
    action: Action<T>,
}

impl<T: Send + 'static> Task<T> {
    /// Create a task with no extra delay.
    pub fn new<F, Fut>(action: F) -> Self
    where
        F: FnOnce(TaskHandle<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ActionError>> + Send + 'static,
    {
        Self::with_delay(Duration::ZERO, action)
    }

    /// Create a task that waits `delay` on top of the queue's inter-item
    /// delay before it starts.
    pub fn with_delay<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: FnOnce(TaskHandle<T>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, ActionError>> + Send + 'static,
    {
        Self {
            handle: TaskHandle::new(delay),
            action: Box::new(move |handle| -> ActionFuture<T> { Box::pin(action(handle)) }),
        }
    }
}

impl<T> Task<T> {
    pub fn id(&self) -> TaskId {
        self.handle.id()
    }

    pub fn delay(&self) -> Duration {
        self.handle.delay()
    }

    /// A handle for observing this task after it has been enqueued.
    pub fn handle(&self) -> TaskHandle<T> {
        self.handle.clone()
    }

    pub(crate) fn into_parts(self) -> (TaskHandle<T>, Action<T>) {
        (self.handle, self.action)
    }

    pub(crate) fn from_parts(handle: TaskHandle<T>, action: Action<T>) -> Self {
        Self { handle, action }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.handle.id())
            .field("delay", &self.handle.delay())
            .field("state", &self.handle.state())
            .finish_non_exhaustive()
    }
}

/// Shared view of a task's identity, state and outcome.
pub struct TaskHandle<T> {
    shared: Arc<TaskShared<T>>,
}

struct TaskShared<T> {
    id: TaskId,
    delay: Duration,
    state: watch::Sender<TaskState>,
    record: Mutex<ExecutionRecord<T>>,
}

struct ExecutionRecord<T> {
    outcome: Option<Result<T, ActionError>>,
    started_at: Option<Instant>,
    settled_at: Option<Instant>,
}

impl<T> TaskHandle<T> {
    fn new(delay: Duration) -> Self {
        let (state, _) = watch::channel(TaskState::Ready);
        Self {
            shared: Arc::new(TaskShared {
                id: TaskId::next(),
                delay,
                state,
                record: Mutex::new(ExecutionRecord {
                    outcome: None,
                    started_at: None,
                    settled_at: None,
                }),
            }),
        }
    }

    pub fn id(&self) -> TaskId {
        self.shared.id
    }

    pub fn delay(&self) -> Duration {
        self.shared.delay
    }

    pub fn state(&self) -> TaskState {
        *self.shared.state.borrow()
    }

    pub fn is_settled(&self) -> bool {
        self.state().is_terminal()
    }

    /// When the action was invoked. `None` until the start timer fires.
    pub fn started_at(&self) -> Option<Instant> {
        self.record().started_at
    }

    /// When the action settled.
    pub fn settled_at(&self) -> Option<Instant> {
        self.record().settled_at
    }

    /// The recorded failure, if the task was rejected.
    pub fn error(&self) -> Option<ActionError> {
        match &self.record().outcome {
            Some(Err(err)) => Some(err.clone()),
            _ => None,
        }
    }

    /// Inspect the outcome without cloning it.
    pub fn with_outcome<R>(&self, f: impl FnOnce(Option<&Result<T, ActionError>>) -> R) -> R {
        f(self.record().outcome.as_ref())
    }

    /// Wait until the task reaches a terminal state and return it.
    ///
    /// A task dropped by `clear()` before its action ran never settles.
    pub async fn settled(&self) -> TaskState {
        let mut rx = self.shared.state.subscribe();
        match rx.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            // The sender lives as long as `self`, so the channel cannot close.
            Err(_) => self.state(),
        }
    }

    pub(crate) fn ptr_eq(&self, other: &TaskHandle<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Move into `Running`. A task already in `Running` (rolled back by
    /// `stop()`) stays there.
    pub(crate) fn mark_running(&self) {
        self.shared.state.send_if_modified(|state| {
            debug_assert!(
                state.can_transition_to(TaskState::Running),
                "{} cannot start from {state:?}",
                self.shared.id
            );
            if *state == TaskState::Ready {
                *state = TaskState::Running;
                true
            } else {
                false
            }
        });
    }

    pub(crate) fn mark_started(&self) {
        self.record().started_at = Some(Instant::now());
    }

    /// Record the action's outcome and publish the terminal state.
    ///
    /// The outcome is written before the state changes, so anyone woken by
    /// [`settled`](Self::settled) can read it. A second call is ignored.
    pub(crate) fn settle(&self, outcome: Result<T, ActionError>) -> TaskState {
        let next = if outcome.is_ok() {
            TaskState::Resolved
        } else {
            TaskState::Rejected
        };

        {
            let mut record = self.record();
            if record.outcome.is_some() {
                return self.state();
            }
            record.outcome = Some(outcome);
            record.settled_at = Some(Instant::now());
        }

        self.shared.state.send_if_modified(|state| {
            if state.can_transition_to(next) {
                *state = next;
                true
            } else {
                false
            }
        });
        next
    }

    fn record(&self) -> MutexGuard<'_, ExecutionRecord<T>> {
        self.shared
            .record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Clone> TaskHandle<T> {
    /// The value produced by the action, if the task resolved.
    pub fn result(&self) -> Option<T> {
        match &self.record().outcome {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<Result<T, ActionError>> {
        self.record().outcome.clone()
    }
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.shared.id)
            .field("delay", &self.shared.delay)
            .field("state", &self.state())
            .finish()
    }
}
