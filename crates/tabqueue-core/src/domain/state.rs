//! Task lifecycle state.

use serde::{Deserialize, Serialize};

/// Execution state of a task.
///
/// State transitions:
/// - Ready -> Running -> Resolved
/// - Ready -> Running -> Rejected
///
/// `Resolved` and `Rejected` are terminal. Nothing moves back to `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Constructed, not yet picked by a queue.
    Ready,

    /// Selected by the queue: waiting for its start timer or executing.
    Running,

    /// The action produced a result.
    Resolved,

    /// The action failed.
    Rejected,
}

impl TaskState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Resolved | TaskState::Rejected)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// `Running -> Running` is allowed: a task returned to the pending list by
    /// `stop()` is selected again without ever having left `Running`.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Ready, TaskState::Running)
                | (TaskState::Running, TaskState::Running)
                | (TaskState::Running, TaskState::Resolved)
                | (TaskState::Running, TaskState::Rejected)
        )
    }
}
