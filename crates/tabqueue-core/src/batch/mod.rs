//! Tab batches: the producer side of "open all in tabs".
//!
//! A batch turns a list of links into queue tasks. It owns the policy the
//! queue deliberately does not: dropping duplicates, choosing the order, and
//! deciding which tab (if any) comes to the foreground.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::{Task, TaskHandle};
use crate::ports::{OpenRequest, OpenedTab, TabOpener};
use crate::queue::TaskQueue;

/// One link to open, with the site's tab-load delay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkItem {
    pub url: String,

    #[serde(rename = "delay_ms", with = "crate::queue::millis", default)]
    pub delay: Duration,
}

impl LinkItem {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Order in which a batch's links are queued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Page order.
    #[default]
    AsListed,
    Reversed,
    ByUrl,
}

/// A deduplicated, ordered list of links ready to be queued.
#[derive(Debug, Clone)]
pub struct TabBatch {
    items: Vec<LinkItem>,
    activate_first: bool,
}

impl TabBatch {
    /// Build a batch, keeping the first occurrence of each URL and skipping
    /// blank ones.
    pub fn new(items: impl IntoIterator<Item = LinkItem>) -> Self {
        let mut seen = HashSet::new();
        let items = items
            .into_iter()
            .filter_map(|mut item| {
                item.url = item.url.trim().to_string();
                (!item.url.is_empty() && seen.insert(item.url.clone())).then_some(item)
            })
            .collect();

        Self {
            items,
            activate_first: true,
        }
    }

    /// Whether the first tab may come to the foreground (default: true).
    pub fn activate_first(mut self, activate: bool) -> Self {
        self.activate_first = activate;
        self
    }

    pub fn sorted(mut self, order: SortOrder) -> Self {
        match order {
            SortOrder::AsListed => {}
            SortOrder::Reversed => self.items.reverse(),
            SortOrder::ByUrl => self.items.sort_by(|a, b| a.url.cmp(&b.url)),
        }
        self
    }

    pub fn items(&self) -> &[LinkItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Queue one open-tab task per link, in batch order.
    ///
    /// The first tab is opened in the foreground only when the queue was idle
    /// before this batch; joining a batch already in flight never steals focus.
    pub fn enqueue_into(
        self,
        queue: &TaskQueue<OpenedTab>,
        opener: Arc<dyn TabOpener>,
    ) -> Vec<TaskHandle<OpenedTab>> {
        let foreground = self.activate_first && !queue.is_running();
        info!(tabs = self.items.len(), foreground, "queueing tab batch");

        self.items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let request = OpenRequest {
                    url: item.url,
                    active: foreground && index == 0,
                };
                let opener = Arc::clone(&opener);
                let task = Task::with_delay(item.delay, move |_| async move {
                    opener.open(&request).await
                });
                queue.enqueue(task)
            })
            .collect()
    }
}
