//! Bounded concurrent batch fetching.
//!
//! Pulls items off a shared queue with at most `worker_count` fetches in
//! flight and waits for every item to reach a terminal outcome. A failed
//! item never fails the batch; it becomes an unsuccessful outcome in the
//! summary.

use std::path::Path;

use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;

use crate::fetcher::MediaFetchClient;
use crate::types::{BatchSummary, DownloadOutcome, Event, FetchProgress, ItemRef};

/// Fetch every item with bounded concurrency and a strict join barrier.
///
/// Each item is scheduled exactly once. Returns only after every item has
/// an outcome; completion order is arbitrary, so the outcome vec follows
/// completion order, not listing order.
pub(crate) async fn run_batch(
    client: &MediaFetchClient,
    items: Vec<ItemRef>,
    dest_dir: &Path,
    worker_count: usize,
    event_tx: &broadcast::Sender<Event>,
) -> (BatchSummary, Vec<DownloadOutcome>) {
    let total = items.len();
    let worker_count = worker_count.max(1);
    tracing::info!(total, workers = worker_count, "starting batch fetch");

    let outcomes: Vec<DownloadOutcome> = stream::iter(items.into_iter().enumerate())
        .map(|(position, item)| {
            let index = position + 1;
            async move { fetch_one(client, item, dest_dir, index, total, event_tx).await }
        })
        .buffer_unordered(worker_count)
        .collect()
        .await;

    let summary = BatchSummary::from_outcomes(&outcomes);
    event_tx
        .send(Event::BatchCompleted {
            success_count: summary.success_count,
            failure_count: summary.failure_count,
            total_count: summary.total_count,
        })
        .ok();
    tracing::info!(
        succeeded = summary.success_count,
        failed = summary.failure_count,
        total = summary.total_count,
        "batch finished"
    );

    (summary, outcomes)
}

/// Drive one item to a terminal outcome, reporting lifecycle events.
async fn fetch_one(
    client: &MediaFetchClient,
    item: ItemRef,
    dest_dir: &Path,
    index: usize,
    total: usize,
    event_tx: &broadcast::Sender<Event>,
) -> DownloadOutcome {
    event_tx
        .send(Event::ItemStarted {
            index,
            total,
            external_id: item.external_id.clone(),
        })
        .ok();
    tracing::info!(external_id = %item.external_id, "[{index}/{total}] fetching item");

    let progress_tx = event_tx.clone();
    let progress_id = item.external_id.clone();
    let on_progress = move |progress: FetchProgress| {
        progress_tx
            .send(Event::ItemProgress {
                external_id: progress_id.clone(),
                percent: progress.percent,
                downloaded_bytes: progress.downloaded_bytes,
                total_bytes: progress.total_bytes,
                speed_bytes_per_sec: progress.speed_bytes_per_sec,
                eta_seconds: progress.eta_seconds,
            })
            .ok();
    };

    let result = client.fetch(&item, dest_dir, &on_progress).await;

    if result.success {
        tracing::info!(external_id = %item.external_id, "[{index}/{total}] item fetched");
        event_tx
            .send(Event::ItemCompleted {
                index,
                total,
                external_id: item.external_id.clone(),
                title: result.title.clone(),
            })
            .ok();
    } else {
        let error = result
            .error_detail
            .clone()
            .unwrap_or_else(|| "fetch failed".to_string());
        tracing::warn!(
            external_id = %item.external_id,
            error = %error,
            "[{index}/{total}] item failed"
        );
        event_tx
            .send(Event::ItemFailed {
                index,
                total,
                external_id: item.external_id.clone(),
                error,
            })
            .ok();
    }

    DownloadOutcome {
        item,
        success: result.success,
        error_detail: result.error_detail,
    }
}
