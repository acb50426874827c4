//! Task identifiers.
//!
//! Ids come from a single process-wide counter owned by [`TaskId::next`].
//! They are unique and grow with construction order, but they carry no
//! scheduling meaning: the queue orders by its pending list only.
//!
//! # 設計メモ
//! - ULID ではなく連番。ログで `task-3` のように読めることを優先した
//! - 採番は [`TaskId::next`] の 1 箇所だけ。外から任意の値を作らせない
//! - serde では素の数値として出す（`#[serde(transparent)]`）

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of a [`Task`](super::Task), assigned at construction.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    /// Allocate the next id.
    pub(crate) fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}
