//! Tab openers available from the command line.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tabqueue_core::{ActionError, OpenRequest, OpenedTab, TabOpener};
use tokio::process::Command;

/// Logs each tab instead of opening it.
#[derive(Default)]
pub struct DryRunOpener {
    next_tab_id: AtomicU64,
}

#[async_trait]
impl TabOpener for DryRunOpener {
    async fn open(&self, request: &OpenRequest) -> Result<OpenedTab, ActionError> {
        let tab_id = self.next_tab_id.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::info!(tab_id, url = %request.url, active = request.active, "dry-run: open tab");
        Ok(OpenedTab {
            tab_id,
            url: request.url.clone(),
            active: request.active,
        })
    }
}

/// Runs `<program> <url>` per tab (e.g. `xdg-open`, `firefox --new-tab`).
///
/// The program string is split on whitespace; the URL is appended last.
pub struct CommandOpener {
    program: String,
    args: Vec<String>,
    next_tab_id: AtomicU64,
}

impl CommandOpener {
    pub fn new(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            next_tab_id: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl TabOpener for CommandOpener {
    async fn open(&self, request: &OpenRequest) -> Result<OpenedTab, ActionError> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&request.url)
            .status()
            .await
            .map_err(|e| ActionError::failed(format!("failed to run {}: {e}", self.program)))?;

        if !status.success() {
            return Err(ActionError::failed(format!(
                "{} exited with {status}",
                self.program
            )));
        }

        let tab_id = self.next_tab_id.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(tab_id, url = %request.url, program = %self.program, "tab opened");
        Ok(OpenedTab {
            tab_id,
            url: request.url.clone(),
            active: request.active,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> OpenRequest {
        OpenRequest {
            url: url.to_string(),
            active: false,
        }
    }

    #[tokio::test]
    async fn dry_run_assigns_increasing_tab_ids() {
        let opener = DryRunOpener::default();
        let a = opener.open(&request("https://a.example")).await.unwrap();
        let b = opener.open(&request("https://b.example")).await.unwrap();
        assert_eq!(a.tab_id, 1);
        assert_eq!(b.tab_id, 2);
        assert_eq!(b.url, "https://b.example");
    }

    #[test]
    fn command_splits_program_and_args() {
        let opener = CommandOpener::new("firefox --new-tab").unwrap();
        assert_eq!(opener.program, "firefox");
        assert_eq!(opener.args, ["--new-tab"]);
        assert!(CommandOpener::new("   ").is_none());
    }

    #[tokio::test]
    async fn missing_program_is_an_action_failure() {
        let opener = CommandOpener::new("tabqueue-definitely-not-installed").unwrap();
        let err = opener.open(&request("https://a.example")).await.unwrap_err();
        assert!(matches!(err, ActionError::Failed(msg) if msg.contains("failed to run")));
    }
}
