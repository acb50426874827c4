//! tabqueue CLI: open a list of links as tabs, one at a time, with pacing.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tabqueue_core::{
    LinkItem, OpenedTab, QueueOptions, SortOrder, TabBatch, TabOpener, TaskHandle, TaskId,
    TaskQueue, TaskState,
};
use tracing_subscriber::EnvFilter;

mod opener;

use opener::{CommandOpener, DryRunOpener};

#[derive(Parser)]
#[command(name = "tabqueue")]
#[command(author, version, long_about = None)]
#[command(about = "Open links as browser tabs through a paced queue")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open every link listed in a JSON file
    Open {
        /// JSON array of {"url": "...", "delay_ms": 500}
        file: PathBuf,

        /// Delay between two tabs in milliseconds
        /// (default: $TABQUEUE_DELAY_BETWEEN_ITEMS_MS or 0)
        #[arg(long)]
        delay_between_ms: Option<u64>,

        /// Give up on a tab after this many milliseconds, 0 to disable
        /// (default: $TABQUEUE_ACTION_TIMEOUT_MS or none)
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Order in which links are opened
        #[arg(long, value_enum, default_value_t = Order::AsListed)]
        order: Order,

        /// Never bring the first tab to the foreground
        #[arg(long)]
        no_activate: bool,

        /// Program used to open each URL (e.g. "xdg-open"); logs only when omitted
        #[arg(long)]
        command: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Order {
    AsListed,
    Reversed,
    ByUrl,
}

impl From<Order> for SortOrder {
    fn from(order: Order) -> Self {
        match order {
            Order::AsListed => SortOrder::AsListed,
            Order::Reversed => SortOrder::Reversed,
            Order::ByUrl => SortOrder::ByUrl,
        }
    }
}

/// What happened to one tab, as far as the user is concerned.
///
/// A task rolled back by `stop()` keeps the queue state `Running` even though
/// its action never ran, so the report reads `started_at` instead of trusting
/// the state alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum TabStatus {
    Opened,
    Failed,
    Opening,
    NotStarted,
}

impl TabStatus {
    fn of(handle: &TaskHandle<OpenedTab>) -> Self {
        match handle.state() {
            TaskState::Resolved => TabStatus::Opened,
            TaskState::Rejected => TabStatus::Failed,
            TaskState::Running if handle.started_at().is_some() => TabStatus::Opening,
            TaskState::Running | TaskState::Ready => TabStatus::NotStarted,
        }
    }
}

/// One line of the final report.
#[derive(Debug, Serialize)]
struct TabReport {
    id: TaskId,
    url: String,
    status: TabStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    tab_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl TabReport {
    fn new(url: String, handle: &TaskHandle<OpenedTab>) -> Self {
        Self {
            id: handle.id(),
            url,
            status: TabStatus::of(handle),
            tab_id: handle.result().map(|tab| tab.tab_id),
            error: handle.error().map(|e| e.to_string()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Open {
            file,
            delay_between_ms,
            timeout_ms,
            order,
            no_activate,
            command,
        } => {
            let mut options = QueueOptions::from_env()?;
            if let Some(ms) = delay_between_ms {
                options.delay_between_items = Duration::from_millis(ms);
            }
            if let Some(ms) = timeout_ms {
                options.action_timeout = (ms > 0).then(|| Duration::from_millis(ms));
            }

            let opener: Arc<dyn TabOpener> = match command.as_deref() {
                Some(command) => Arc::new(
                    CommandOpener::new(command).context("--command must name a program")?,
                ),
                None => Arc::new(DryRunOpener::default()),
            };

            open(file, options, order.into(), !no_activate, opener).await?;
        }
    }

    Ok(())
}

async fn open(
    file: PathBuf,
    options: QueueOptions,
    order: SortOrder,
    activate_first: bool,
    opener: Arc<dyn TabOpener>,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(&file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let items: Vec<LinkItem> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of links", file.display()))?;

    let batch = TabBatch::new(items)
        .sorted(order)
        .activate_first(activate_first);
    if batch.is_empty() {
        tracing::warn!("no links to open");
        println!("[]");
        return Ok(());
    }

    tracing::info!(
        tabs = batch.len(),
        delay_between = ?options.delay_between_items,
        "opening tabs"
    );

    let urls: Vec<String> = batch.items().iter().map(|item| item.url.clone()).collect();
    let queue = TaskQueue::new(options);
    let handles = batch.enqueue_into(&queue, opener);

    let all_settled = async {
        for handle in &handles {
            handle.settled().await;
        }
    };

    let interrupted = tokio::select! {
        _ = all_settled => false,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            queue.stop();
            tracing::warn!(pending = queue.pending_len(), "interrupted, queue stopped");

            // A tab already being opened cannot be called back; wait for it.
            while queue.is_running() {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            true
        }
    };

    let report: Vec<TabReport> = urls
        .into_iter()
        .zip(&handles)
        .map(|(url, handle)| TabReport::new(url, handle))
        .collect();
    println!("{}", serde_json::to_string_pretty(&report)?);

    verdict(&report, interrupted)
}

/// Exit status for a finished or interrupted batch: success only when every
/// tab was opened.
fn verdict(report: &[TabReport], interrupted: bool) -> Result<()> {
    let count = |status: TabStatus| report.iter().filter(|r| r.status == status).count();
    let opened = count(TabStatus::Opened);
    let failed = count(TabStatus::Failed);
    let skipped = report.len() - opened - failed;
    tracing::info!(opened, failed, skipped, total = report.len(), "batch finished");

    if interrupted && skipped > 0 {
        bail!("interrupted: {skipped} of {} tabs were not opened", report.len());
    }
    if failed > 0 {
        bail!("{failed} of {} tabs failed to open", report.len());
    }
    if skipped > 0 {
        bail!("{skipped} of {} tabs were not opened", report.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tabqueue_core::Task;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn tab(url: &str) -> Task<OpenedTab> {
        let url = url.to_string();
        Task::new(move |_| async move {
            Ok(OpenedTab {
                tab_id: 1,
                url,
                active: false,
            })
        })
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_open_flags() {
        let cli = Cli::try_parse_from([
            "tabqueue",
            "open",
            "links.json",
            "--delay-between-ms",
            "1000",
            "--order",
            "by-url",
            "--no-activate",
        ])
        .unwrap();

        let Commands::Open {
            file,
            delay_between_ms,
            order,
            no_activate,
            command,
            ..
        } = cli.command;
        assert_eq!(file, PathBuf::from("links.json"));
        assert_eq!(delay_between_ms, Some(1000));
        assert!(matches!(SortOrder::from(order), SortOrder::ByUrl));
        assert!(no_activate);
        assert!(command.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_batch_reports_rolled_back_tab_as_not_started() {
        let queue = TaskQueue::new(QueueOptions::new(ms(1000)));
        let a = queue.enqueue(tab("https://a.example"));
        let b = queue.enqueue(tab("https://b.example"));

        a.settled().await;
        // B is waiting out the pacing delay when the user interrupts.
        queue.stop();
        assert_eq!(b.state(), TaskState::Running);

        let report = vec![
            TabReport::new("https://a.example".into(), &a),
            TabReport::new("https://b.example".into(), &b),
        ];
        assert_eq!(report[0].status, TabStatus::Opened);
        assert_eq!(report[1].status, TabStatus::NotStarted);

        let json = serde_json::to_value(&report[1]).unwrap();
        assert_eq!(json["status"], "not_started");
        assert!(json.get("tab_id").is_none());

        let err = verdict(&report, true).unwrap_err();
        assert!(err.to_string().contains("1 of 2 tabs were not opened"));
    }

    #[test]
    fn never_enqueued_tab_is_not_started() {
        let task = tab("https://a.example");
        let report = TabReport::new("https://a.example".into(), &task.handle());
        assert_eq!(report.status, TabStatus::NotStarted);
        assert!(verdict(&[report], false).is_err());
    }

    #[tokio::test]
    async fn completed_batch_succeeds() {
        let queue = TaskQueue::new(QueueOptions::default());
        let a = queue.enqueue(tab("https://a.example"));
        a.settled().await;

        let report = [TabReport::new("https://a.example".into(), &a)];
        assert_eq!(report[0].status, TabStatus::Opened);
        assert!(verdict(&report, false).is_ok());
    }
}
