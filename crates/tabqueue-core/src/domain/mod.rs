//! Domain model: task identity, lifecycle state, action failures.

pub mod errors;
pub mod ids;
pub mod state;
pub mod task;

pub use self::errors::ActionError;
pub use self::ids::TaskId;
pub use self::state::TaskState;
pub use self::task::{ActionFuture, Task, TaskHandle};
