//! Sequential task queue.
//!
//! Runs tasks strictly one at a time in submission order, waiting
//! `delay_between_items + task.delay` between a resolved task and the next
//! one. A rejected task's successor starts immediately (fast-fail-through).
//!
//! Design:
//! - All queue state sits behind one `std::sync::Mutex` that is never held
//!   across an `.await`, so `enqueue`/`stop`/`resume`/`clear` are plain
//!   synchronous calls.
//! - Each dispatch gets a fresh number. The spawned dispatch future only acts
//!   while the slot still carries its number, which makes a timer that lost a
//!   race against `stop()` or `clear()` harmless.
//! - The pre-run timer is cancelable, the action is not.
//!
//! # スロットの状態遷移
//! ```text
//! Idle --advance--> Waiting{dispatch} --timer--> Executing{dispatch} --settle--> advance
//!                      |
//!                      +-- stop()/clear() --> Idle（タスクは pending の先頭へ戻す / 捨てる）
//! ```
//!
//! # 注意点
//! - action はクロージャの呼び出しも含めて spawn したタスクの中で実行する。
//!   同期的に panic しても `JoinHandle` 経由で `Panicked` として記録され、キューは止まらない
//! - `action_timeout` を設定した場合のみ、期限切れの action を abort して `TimedOut` にする

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::QueueOptions;
use crate::domain::task::Action;
use crate::domain::{ActionError, Task, TaskHandle, TaskState};
use crate::observability::QueueStatus;

/// A paced, single-slot task queue.
///
/// Cloning yields another handle to the same queue. Every method that may
/// start a task (`enqueue`, `resume`) must be called from within a Tokio
/// runtime.
pub struct TaskQueue<T> {
    shared: Arc<QueueShared<T>>,
}

struct QueueShared<T> {
    options: QueueOptions,
    inner: Mutex<QueueInner<T>>,
}

struct QueueInner<T> {
    /// Tasks not yet selected, in run order.
    pending: VecDeque<Task<T>>,

    /// Task in the slot: waiting, executing, or (while stopped) settled.
    current: Option<TaskHandle<T>>,

    slot: Slot<T>,

    /// Terminal state of the last task that settled in the slot.
    last_settled: Option<TaskState>,

    stopped: bool,

    next_dispatch: u64,
}

enum Slot<T> {
    Idle,

    /// Start timer armed. Dropping `cancel` wakes the timer so it exits early.
    Waiting {
        dispatch: u64,
        action: Action<T>,
        cancel: oneshot::Sender<()>,
    },

    /// Action in flight.
    Executing { dispatch: u64 },
}

impl<T: Send + 'static> TaskQueue<T> {
    pub fn new(options: QueueOptions) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                options,
                inner: Mutex::new(QueueInner {
                    pending: VecDeque::new(),
                    current: None,
                    slot: Slot::Idle,
                    last_settled: None,
                    stopped: false,
                    next_dispatch: 0,
                }),
            }),
        }
    }

    pub fn options(&self) -> &QueueOptions {
        &self.shared.options
    }

    /// Append `task` to the pending list and try to start it.
    ///
    /// Never blocks. While another task occupies the slot this only grows the
    /// pending list.
    pub fn enqueue(&self, task: Task<T>) -> TaskHandle<T> {
        let handle = task.handle();
        let mut inner = self.shared.lock();
        inner.pending.push_back(task);
        debug!(task_id = %handle.id(), pending = inner.pending.len(), "task enqueued");
        self.shared.advance(&mut inner);
        handle
    }

    /// Stop pulling tasks from the pending list.
    ///
    /// A task still waiting for its start timer goes back to the front of the
    /// pending list. An action already executing is left to settle on its own.
    pub fn stop(&self) {
        let mut inner = self.shared.lock();
        inner.stopped = true;

        match mem::replace(&mut inner.slot, Slot::Idle) {
            Slot::Waiting { action, .. } => {
                if let Some(handle) = inner.current.take() {
                    info!(task_id = %handle.id(), "queue stopped, task returned to pending");
                    inner.pending.push_front(Task::from_parts(handle, action));
                }
            }
            other => {
                inner.slot = other;
                info!(pending = inner.pending.len(), "queue stopped");
            }
        }
    }

    /// Clear the stop flag and try to start the next task.
    pub fn resume(&self) {
        let mut inner = self.shared.lock();
        inner.stopped = false;
        info!(pending = inner.pending.len(), "queue resumed");
        self.shared.advance(&mut inner);
    }

    /// Drop every pending task and the current task reference.
    ///
    /// A pending start timer is cancelled. An action already executing still
    /// settles on its handle, and no new task starts until it has.
    pub fn clear(&self) {
        let mut inner = self.shared.lock();
        let dropped = inner.pending.len();
        inner.pending.clear();
        inner.current = None;
        inner.last_settled = None;
        if matches!(inner.slot, Slot::Waiting { .. }) {
            inner.slot = Slot::Idle;
        }
        info!(dropped, "queue cleared");
    }

    /// True while the current task is waiting to start or executing.
    pub fn is_running(&self) -> bool {
        let inner = self.shared.lock();
        inner
            .current
            .as_ref()
            .is_some_and(|handle| handle.state() == TaskState::Running)
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.lock().stopped
    }

    pub fn pending_len(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn status(&self) -> QueueStatus {
        let inner = self.shared.lock();
        QueueStatus {
            pending: inner.pending.len(),
            running: inner
                .current
                .as_ref()
                .is_some_and(|handle| handle.state() == TaskState::Running),
            stopped: inner.stopped,
            current: inner.current.as_ref().map(TaskHandle::id),
        }
    }
}

impl<T: Send + 'static> QueueShared<T> {
    fn lock(&self) -> MutexGuard<'_, QueueInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Select the next pending task and arm its start timer, if allowed.
    fn advance(self: &Arc<Self>, inner: &mut QueueInner<T>) {
        if inner.stopped {
            return;
        }

        // One task at a time.
        if !matches!(inner.slot, Slot::Idle) {
            return;
        }

        let Some(task) = inner.pending.pop_front() else {
            if let Some(last) = inner.current.take() {
                debug!(last_task_id = %last.id(), "queue drained");
            }
            inner.last_settled = None;
            return;
        };

        let delay = pacing_delay(
            inner.last_settled,
            self.options.delay_between_items,
            task.delay(),
        );

        let (handle, action) = task.into_parts();
        handle.mark_running();

        let dispatch = inner.next_dispatch;
        inner.next_dispatch += 1;

        let (cancel, cancelled) = oneshot::channel();
        inner.slot = Slot::Waiting {
            dispatch,
            action,
            cancel,
        };
        inner.current = Some(handle.clone());

        debug!(
            task_id = %handle.id(),
            delay = ?delay,
            pending = inner.pending.len(),
            "task scheduled"
        );

        tokio::spawn(Arc::clone(self).run_dispatch(handle, dispatch, delay, cancelled));
    }

    async fn run_dispatch(
        self: Arc<Self>,
        handle: TaskHandle<T>,
        dispatch: u64,
        delay: Duration,
        cancelled: oneshot::Receiver<()>,
    ) {
        if !delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancelled => return,
            }
        }

        let action = {
            let mut inner = self.lock();
            match mem::replace(&mut inner.slot, Slot::Idle) {
                Slot::Waiting {
                    dispatch: armed,
                    action,
                    ..
                } if armed == dispatch => {
                    inner.slot = Slot::Executing { dispatch };
                    action
                }
                other => {
                    // Stopped or cleared before the timer fired.
                    inner.slot = other;
                    return;
                }
            }
        };

        handle.mark_started();
        debug!(task_id = %handle.id(), "task started");

        let outcome = self.execute(action, handle.clone()).await;

        let mut inner = self.lock();
        let state = handle.settle(outcome);

        if matches!(inner.slot, Slot::Executing { dispatch: running } if running == dispatch) {
            inner.slot = Slot::Idle;
        }

        // A cleared task no longer counts as the previous one.
        if inner
            .current
            .as_ref()
            .is_some_and(|current| current.ptr_eq(&handle))
        {
            inner.last_settled = Some(state);
        }

        match handle.error() {
            Some(err) => warn!(task_id = %handle.id(), error = %err, "task rejected"),
            None => debug!(task_id = %handle.id(), "task resolved"),
        }

        self.advance(&mut inner);
    }

    /// Run the action on its own Tokio task so a panic is contained.
    ///
    /// The closure itself is called inside the spawned task too: a closure
    /// that panics before returning its future is rejected like any other.
    async fn execute(&self, action: Action<T>, handle: TaskHandle<T>) -> Result<T, ActionError> {
        let mut running = tokio::spawn(async move { action(handle).await });

        let joined = match self.options.action_timeout {
            None => running.await,
            Some(limit) => match tokio::time::timeout(limit, &mut running).await {
                Ok(joined) => joined,
                Err(_) => {
                    running.abort();
                    return Err(ActionError::TimedOut(limit));
                }
            },
        };

        match joined {
            Ok(outcome) => outcome,
            Err(err) if err.is_panic() => {
                Err(ActionError::Panicked(panic_message(err.into_panic())))
            }
            Err(_) => Err(ActionError::Cancelled),
        }
    }
}

/// Delay before the next task starts.
///
/// Zero for the first task and after a rejection, otherwise the queue's
/// baseline delay plus the task's own.
fn pacing_delay(previous: Option<TaskState>, between: Duration, task_delay: Duration) -> Duration {
    match previous {
        None | Some(TaskState::Rejected) => Duration::ZERO,
        Some(_) => between + task_delay,
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl<T> Clone for TaskQueue<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for TaskQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("options", &self.shared.options)
            .finish_non_exhaustive()
    }
}
