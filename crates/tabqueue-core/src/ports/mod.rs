//! Ports: interfaces to the browser side of the system.

pub mod tab_opener;

pub use self::tab_opener::{OpenRequest, OpenedTab, TabOpener};
