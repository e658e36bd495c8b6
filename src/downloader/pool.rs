//! Worker pool: a fixed number of tasks draining a shared work queue.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::attempt::process_request;
use crate::config::BatchSettings;
use crate::fetch::ImageFetcher;
use crate::types::{DownloadOutcome, DownloadRequest, Event};
use crate::validate::ImageValidator;

/// Everything a worker needs, shared read-only across the pool
pub(super) struct WorkerContext {
    pub(super) fetcher: Arc<dyn ImageFetcher>,
    pub(super) validator: Arc<dyn ImageValidator>,
    pub(super) settings: BatchSettings,
    pub(super) event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl WorkerContext {
    pub(super) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}

type WorkQueue = Arc<Mutex<VecDeque<DownloadRequest>>>;
type Collector = Arc<Mutex<HashMap<String, DownloadOutcome>>>;

/// Run `pending` through at most `concurrency` workers
///
/// Each worker pops one request, runs its retry state machine to completion,
/// reports the outcome to the collector and pops the next. Returns once the
/// queue is drained and every worker has exited.
pub(super) async fn run_pool(
    ctx: Arc<WorkerContext>,
    pending: Vec<DownloadRequest>,
    concurrency: usize,
) -> HashMap<String, DownloadOutcome> {
    let worker_count = concurrency.min(pending.len());
    let collector: Collector = Arc::new(Mutex::new(HashMap::with_capacity(pending.len())));
    let queue: WorkQueue = Arc::new(Mutex::new(VecDeque::from(pending)));

    let handles: Vec<_> = (0..worker_count)
        .map(|worker_id| {
            tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&ctx),
                Arc::clone(&queue),
                Arc::clone(&collector),
            ))
        })
        .collect();

    for (worker_id, joined) in futures::future::join_all(handles)
        .await
        .into_iter()
        .enumerate()
    {
        if let Err(e) = joined {
            tracing::error!(worker = worker_id, error = %e, "Worker task terminated abnormally");
        }
    }

    let mut outcomes = collector.lock().await;
    std::mem::take(&mut *outcomes)
}

async fn worker_loop(
    worker_id: usize,
    ctx: Arc<WorkerContext>,
    queue: WorkQueue,
    collector: Collector,
) {
    let mut processed = 0usize;

    loop {
        // Hold the queue lock only long enough to pop
        let next = {
            let mut queue_guard = queue.lock().await;
            queue_guard.pop_front()
        };

        let Some(request) = next else {
            break;
        };

        let outcome = process_request(&ctx, &request).await;
        processed += 1;

        let mut collector_guard = collector.lock().await;
        collector_guard.insert(request.identifier, outcome);
    }

    tracing::trace!(worker = worker_id, processed, "Worker finished, queue drained");
}
