//! Fan-out and fan-in for both pipeline stages

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};

use super::Pipeline;
use crate::error::Error;
use crate::types::{Event, FetchOutcome, Job, PipelineReport, TransformOutcome};

impl Pipeline {
    /// Run both stages for `jobs` and return every drained outcome
    ///
    /// Exactly one [`FetchOutcome`] is drained per job. Every successful fetch
    /// dispatches one transform per configured profile as soon as it is
    /// drained, and exactly that many [`TransformOutcome`]s are drained after
    /// stage 1 completes. Failures never abort sibling jobs.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use imgfetch::{Config, Pipeline};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = Config::default();
    ///     let jobs = config.jobs();
    ///     let pipeline = Pipeline::new(config)?;
    ///
    ///     let report = pipeline.run(jobs).await;
    ///     println!(
    ///         "{} downloaded, {} transformed",
    ///         report.successful_fetches(),
    ///         report.transforms.len()
    ///     );
    ///     Ok(())
    /// }
    /// ```
    pub async fn run(&self, jobs: Vec<Job>) -> PipelineReport {
        let job_count = jobs.len();
        let profile_count = self.profiles.len();

        let fetch_limit = self
            .config
            .max_concurrent_fetches
            .map(|n| Arc::new(Semaphore::new(n)));
        let transform_limit = self
            .config
            .max_concurrent_transforms
            .map(|n| Arc::new(Semaphore::new(n)));

        // Capacities match the most producers that can ever write, so sends never block
        let (fetch_tx, mut fetch_rx) = mpsc::channel(queue_capacity(job_count));
        let (transform_tx, mut transform_rx) =
            mpsc::channel(queue_capacity(job_count.saturating_mul(profile_count)));

        tracing::info!(
            jobs = job_count,
            profiles = profile_count,
            fetch_limit = ?self.config.max_concurrent_fetches,
            transform_limit = ?self.config.max_concurrent_transforms,
            "starting pipeline"
        );

        for job in jobs {
            self.spawn_fetch(job, fetch_tx.clone(), fetch_limit.clone());
        }
        drop(fetch_tx);

        let mut report = PipelineReport {
            fetches: Vec::with_capacity(job_count),
            transforms: Vec::new(),
        };
        let mut dispatched = 0usize;

        for _ in 0..job_count {
            let Some(outcome) = fetch_rx.recv().await else {
                tracing::error!(
                    expected = job_count,
                    received = report.fetches.len(),
                    "fetch queue closed early, a fetch task was lost"
                );
                break;
            };

            self.emit_event(Event::from_fetch(&outcome));
            match &outcome.result {
                Ok(path) => {
                    tracing::info!(
                        index = outcome.job.index,
                        url = %outcome.job.url,
                        path = %path.display(),
                        "download successful"
                    );
                    for profile_index in 0..profile_count {
                        self.spawn_transform(
                            outcome.job.index,
                            path.clone(),
                            profile_index,
                            transform_tx.clone(),
                            transform_limit.clone(),
                        );
                    }
                    dispatched += profile_count;
                }
                Err(e) => {
                    tracing::warn!(
                        index = outcome.job.index,
                        url = %outcome.job.url,
                        error = %e,
                        code = e.code(),
                        "download failed, skipping transforms"
                    );
                }
            }
            report.fetches.push(outcome);
        }
        drop(transform_tx);

        report.transforms.reserve(dispatched);
        for _ in 0..dispatched {
            let Some(outcome) = transform_rx.recv().await else {
                tracing::error!(
                    expected = dispatched,
                    received = report.transforms.len(),
                    "transform queue closed early, a transform task was lost"
                );
                break;
            };

            self.emit_event(Event::from_transform(&outcome));
            match &outcome.result {
                Ok(reference) => {
                    tracing::info!(
                        index = outcome.job_index,
                        profile = %outcome.profile,
                        reference = %reference,
                        "transform successful"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        index = outcome.job_index,
                        profile = %outcome.profile,
                        error = %e,
                        code = e.code(),
                        "transform failed"
                    );
                }
            }
            report.transforms.push(outcome);
        }

        let finished = report.summary();
        tracing::info!(?finished, "pipeline finished");
        self.emit_event(finished);

        report
    }

    /// Start one stage 1 unit for `job`
    fn spawn_fetch(
        &self,
        job: Job,
        tx: mpsc::Sender<FetchOutcome>,
        limit: Option<Arc<Semaphore>>,
    ) {
        let fetcher = Arc::clone(&self.fetcher);
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            let url = job.url.clone();
            let destination = job.destination.clone();

            // The fetcher watches the token itself so it can clean up a partial file
            let result = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => Err(Error::Cancelled),
                permit = acquire(limit) => {
                    let _permit = permit;
                    fetcher.fetch(&url, &destination, &cancel_token).await
                }
            };

            if tx.send(FetchOutcome { job, result }).await.is_err() {
                tracing::debug!(url = %url, "fetch outcome dropped, coordinator is gone");
            }
        });
    }

    /// Start one stage 2 unit for a downloaded item and one profile
    fn spawn_transform(
        &self,
        job_index: usize,
        source: PathBuf,
        profile_index: usize,
        tx: mpsc::Sender<TransformOutcome>,
        limit: Option<Arc<Semaphore>>,
    ) {
        let transformer = Arc::clone(&self.transformer);
        let profiles = Arc::clone(&self.profiles);
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            let profile = &profiles[profile_index];

            let result = tokio::select! {
                biased;
                _ = cancel_token.cancelled() => Err(Error::Cancelled),
                result = async {
                    let _permit = acquire(limit).await;
                    transformer.transform(&source, profile).await
                } => result,
            };

            let outcome = TransformOutcome {
                job_index,
                source,
                profile: profile.name.clone(),
                result,
            };
            if tx.send(outcome).await.is_err() {
                tracing::debug!(job_index, "transform outcome dropped, coordinator is gone");
            }
        });
    }
}

/// Bounded mpsc channels need a non-zero capacity no larger than tokio allows
fn queue_capacity(producers: usize) -> usize {
    producers.clamp(1, Semaphore::MAX_PERMITS)
}

/// Wait for a worker slot when a concurrency limit is configured
async fn acquire(limit: Option<Arc<Semaphore>>) -> Option<OwnedSemaphorePermit> {
    match limit {
        Some(semaphore) => semaphore.acquire_owned().await.ok(),
        None => None,
    }
}
