//! TabOpener port - opens one browser tab.
//!
//! The real implementation lives with the browser integration. The queue only
//! needs "open this URL, foreground or not" and a success/failure answer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::ActionError;

/// What to open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRequest {
    pub url: String,

    /// Switch to the new tab once it is created.
    pub active: bool,
}

/// A tab the opener created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedTab {
    pub tab_id: u64,
    pub url: String,
    pub active: bool,
}

/// Opens tabs. Creating a tab cannot be undone or interrupted once issued,
/// so implementations should not expect to be cancelled.
#[async_trait]
pub trait TabOpener: Send + Sync {
    async fn open(&self, request: &OpenRequest) -> Result<OpenedTab, ActionError>;
}
