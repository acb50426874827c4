//! tabqueue-core
//!
//! Paced, strictly sequential task scheduling for "open all in tabs".
//!
//! # Modules
//! - **domain**: task identity, lifecycle state, action failures, [`Task`] / [`TaskHandle`]
//! - **queue**: [`TaskQueue`] and its [`QueueOptions`]
//! - **ports**: the [`TabOpener`] interface to the browser
//! - **batch**: [`TabBatch`], turning a link list into queued tasks
//! - **observability**: [`QueueStatus`] snapshots
//! - **error**: configuration errors
//!
//! # 設計メモ
//! - 実行スロットは常に 1 つ。2 つの action が同時に走ることはない
//! - 待ち時間は「直前のタスクが Resolved なら `delay_between_items + task.delay`、
//!   Rejected なら 0」。失敗したタブで後続を待たせない（fast-fail-through）
//! - `stop()` で止められるのは開始前の待機だけ。開いてしまったタブは取り消せないので、
//!   実行中の action は最後まで走らせる
//! - ブラウザ依存の部分は [`TabOpener`] port の向こう側に置き、core は tokio だけで完結させる

pub mod batch;
pub mod domain;
pub mod error;
pub mod observability;
pub mod ports;
pub mod queue;

pub use batch::{LinkItem, SortOrder, TabBatch};
pub use domain::{ActionError, ActionFuture, Task, TaskHandle, TaskId, TaskState};
pub use error::ConfigError;
pub use observability::QueueStatus;
pub use ports::{OpenRequest, OpenedTab, TabOpener};
pub use queue::{QueueOptions, TaskQueue};
