//! Queue module: pacing options and the sequential task queue.

mod options;
mod sequential;

pub use options::{ACTION_TIMEOUT_ENV, DELAY_BETWEEN_ITEMS_ENV, QueueOptions};
pub use sequential::TaskQueue;

pub(crate) use options::millis;
