//! # Preload Scheduler
//!
//! Best-effort batch warming of the cache. A fixed number of workers drain a
//! shared queue of URLs through the [`DownloadCoordinator`]; a failed URL is
//! logged and dropped without affecting its siblings.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{DownloadCoordinator, ResolveOptions};

/// Aggregate outcome of a preload batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreloadSummary {
    /// URLs handed to the batch
    pub requested: usize,
    /// URLs that ended up in the cache
    pub cached: usize,
    /// URLs whose resolve failed
    pub failed: usize,
}

/// Preload `urls` with the coordinator's default options.
///
/// `concurrency <= 0` runs one worker per URL.
pub async fn preload<I, S>(
    urls: I,
    coordinator: &DownloadCoordinator,
    concurrency: isize,
) -> PreloadSummary
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    preload_with(urls, coordinator, coordinator.default_options(), concurrency).await
}

/// Preload `urls`, resolving each with `options`
pub async fn preload_with<I, S>(
    urls: I,
    coordinator: &DownloadCoordinator,
    options: &ResolveOptions,
    concurrency: isize,
) -> PreloadSummary
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let queue: VecDeque<String> = urls.into_iter().map(Into::into).collect();
    let requested = queue.len();
    if requested == 0 {
        return PreloadSummary::default();
    }

    // Workers beyond the queue length would exit immediately
    let workers = if concurrency <= 0 {
        requested
    } else {
        (concurrency as usize).min(requested)
    };

    let queue = Mutex::new(queue);
    let cached = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let started = Instant::now();

    debug!(urls = requested, workers, "Starting preload");

    join_all((0..workers).map(|worker| {
        let queue = &queue;
        let cached = &cached;
        let failed = &failed;
        async move {
            loop {
                // Lock released before the resolve is awaited
                let Some(url) = queue.lock().pop_front() else {
                    break;
                };
                match coordinator.resolve_with(&url, options).await {
                    Ok(_) => {
                        cached.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        debug!(worker, url = %url, error = %e, "Preload skipped URL");
                    }
                }
            }
        }
    }))
    .await;

    let summary = PreloadSummary {
        requested,
        cached: cached.into_inner(),
        failed: failed.into_inner(),
    };

    info!(
        requested = summary.requested,
        cached = summary.cached,
        failed = summary.failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Preload finished"
    );

    summary
}

/// Reusable preload configuration bound to one coordinator
#[derive(Clone)]
pub struct PreloadScheduler {
    coordinator: DownloadCoordinator,
    options: ResolveOptions,
    concurrency: isize,
}

impl PreloadScheduler {
    /// Scheduler with the coordinator's default options and one worker per URL
    pub fn new(coordinator: DownloadCoordinator) -> Self {
        let options = coordinator.default_options().clone();
        Self {
            coordinator,
            options,
            concurrency: 0,
        }
    }

    pub fn with_concurrency(mut self, concurrency: isize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    pub async fn run<I, S>(&self, urls: I) -> PreloadSummary
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        preload_with(urls, &self.coordinator, &self.options, self.concurrency).await
    }
}
