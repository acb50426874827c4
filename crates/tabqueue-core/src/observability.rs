use serde::{Deserialize, Serialize};

use crate::domain::TaskId;

/// Point-in-time view of a queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Tasks waiting to be selected.
    pub pending: usize,

    /// Whether the current task is waiting to start or executing.
    pub running: bool,

    pub stopped: bool,

    /// Task occupying the current slot, if any. After `stop()` this may be a
    /// task that has already settled.
    pub current: Option<TaskId>,
}
