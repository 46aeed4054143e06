use crate::changes;
use crate::collection;
use crate::config::SyncConfig;
use crate::index;
use crate::karakeep::{BookmarkService, KarakeepClient};
use crate::reconcile::{Reconciler, RunSummary};
use crate::source::{self, ChatSource};
use crate::state::{StateStore, Watermark};
use eyre::{Context, Result};
use std::time::Instant;

/// Result of one run: what was done and where the watermark ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub summary: RunSummary,
    pub previous_watermark: Watermark,
    /// `Some` when the run moved the watermark forward and saved it.
    pub saved_watermark: Option<Watermark>,
}

/// The main entry point for the binary: wires the real database and API client
/// together, runs once and prints the summary.
pub fn execute(config: SyncConfig) -> Result<RunReport> {
    let started = Instant::now();
    tracing::info!(?config, "starting sync run");

    let source = source::open(&config.database)?;
    let service = KarakeepClient::new(
        config.api_url.clone(),
        config.api_key.clone(),
        config.page_size,
        config.timeout,
        config.request_delay,
    )
    .wrap_err("Failed to build HTTP client")?;
    let store = StateStore::new(&config.state_file);

    let report = run(source.as_ref(), &service, &store, &config.list_name)?;
    // Release the database before reporting.
    drop(source);

    let summary = &report.summary;
    tracing::info!(
        created = summary.created,
        updated = summary.updated,
        failed = summary.failed,
        elapsed = ?started.elapsed(),
        "sync run finished"
    );

    if !config.quiet {
        if summary.attempted() == 0 {
            eprintln!("Nothing to do.");
        } else {
            let mut line = format!(
                "Done. {} created, {} updated, {} failed.",
                summary.created, summary.updated, summary.failed
            );
            if summary.failed > 0 {
                line.push_str(" Failed chats will be retried on the next run.");
            }
            eprintln!("{}", line);
        }
    }

    Ok(report)
}

/// One full reconciliation pass against arbitrary collaborators.
///
/// Fatal errors (list resolution, index build, source query, state save) are
/// returned; per-chat failures only show up in the summary.
pub fn run<C, S>(source: &C, service: &S, store: &StateStore, list_name: &str) -> Result<RunReport>
where
    C: ChatSource + ?Sized,
    S: BookmarkService,
{
    let previous = store.load();

    let list = collection::resolve(service, list_name)?;
    let remote_index = index::build(service, &list)?;
    let units = changes::resolve(source, previous)?;

    let mut reconciler = Reconciler::new(service, &list, remote_index);
    for item in units {
        match item {
            Ok(unit) => {
                reconciler.apply(&unit);
            }
            Err(rejected) => reconciler.reject(rejected),
        }
    }
    let summary = reconciler.finish();

    if summary.attempted() == 0 {
        tracing::info!(watermark = %previous, "no chats changed since last sync");
    }

    let saved_watermark = summary.advanced_watermark(previous);
    match saved_watermark {
        Some(next) => store
            .save(next)
            .wrap_err_with(|| format!("Failed to save sync state to {}", store.path().display()))?,
        None if summary.failed > 0 => {
            tracing::warn!(
                watermark = %previous,
                failed = summary.failed,
                "watermark unchanged, failed chats will be retried"
            );
        }
        None => {}
    }

    Ok(RunReport {
        summary,
        previous_watermark: previous,
        saved_watermark,
    })
}
