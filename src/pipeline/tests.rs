// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use crate::error::Error;
use crate::transform::FixedDelay;
use crate::types::{Job, PipelineReport};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Fetcher that fails any URL containing "fail" and sleeps on URLs containing "slow"
#[derive(Default)]
struct StubFetcher {
    delay: Duration,
    slow_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    slow_finished_at: Mutex<Option<Instant>>,
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(
        &self,
        url: &str,
        destination: &str,
        cancel: &CancellationToken,
    ) -> crate::Result<PathBuf> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = if url.contains("slow") {
            self.slow_delay
        } else {
            self.delay
        };
        let cancelled = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(delay) => false,
        };
        if url.contains("slow") {
            *self.slow_finished_at.lock().unwrap() = Some(Instant::now());
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if cancelled {
            return Err(Error::Cancelled);
        }

        if url.contains("fail") {
            return Err(Error::BadStatus {
                url: url.to_string(),
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        Ok(PathBuf::from("/virtual").join(destination))
    }
}

/// Fetcher whose task panics for URLs containing "panic"
struct PanickingFetcher;

#[async_trait]
impl Fetcher for PanickingFetcher {
    async fn fetch(
        &self,
        url: &str,
        destination: &str,
        _cancel: &CancellationToken,
    ) -> crate::Result<PathBuf> {
        if url.contains("panic") {
            panic!("fetcher blew up");
        }
        Ok(PathBuf::from(destination))
    }
}

/// Transformer that records every call and optionally fails one profile
#[derive(Default)]
struct RecordingTransformer {
    delay: Duration,
    fail_profile: Option<String>,
    calls: Mutex<Vec<(PathBuf, String, Instant)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingTransformer {
    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transformer for RecordingTransformer {
    async fn transform(&self, source: &Path, profile: &SizeProfile) -> crate::Result<String> {
        self.calls.lock().unwrap().push((
            source.to_path_buf(),
            profile.name.clone(),
            Instant::now(),
        ));
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_profile.as_deref() == Some(profile.name.as_str()) {
            return Err(Error::Transform {
                item: source.display().to_string(),
                profile: profile.name.clone(),
                reason: "unsupported".to_string(),
            });
        }
        Ok(format!("{}:{}", source.display(), profile.name))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

fn profiles(count: usize) -> Vec<SizeProfile> {
    (0..count)
        .map(|i| SizeProfile::new(format!("p{i}"), 100 * (i as u32 + 1), 100))
        .collect()
}

fn config(urls: &[&str], profile_count: usize) -> Config {
    Config {
        urls: urls.iter().map(|u| u.to_string()).collect(),
        profiles: profiles(profile_count),
        ..Default::default()
    }
}

fn pipeline(
    config: Config,
    fetcher: Arc<dyn Fetcher>,
    transformer: Arc<dyn Transformer>,
) -> (Pipeline, Vec<Job>) {
    let jobs = config.jobs();
    let pipeline = Pipeline::with_components(config, fetcher, transformer).unwrap();
    (pipeline, jobs)
}

fn assert_drain_counts(report: &PipelineReport, jobs: usize, profiles: usize) {
    assert_eq!(report.fetches.len(), jobs, "one fetch outcome per job");
    assert_eq!(
        report.transforms.len(),
        report.successful_fetches() * profiles,
        "one transform outcome per (success, profile) pair"
    );
}

#[tokio::test]
async fn test_drains_exactly_n_fetches_and_s_times_m_transforms() {
    let cases: &[(&[&str], usize, usize)] = &[
        (&["http://ok/0", "http://ok/1", "http://ok/2"], 3, 3),
        (&["http://ok/0", "http://fail/1", "http://ok/2"], 2, 3),
        (&["http://fail/0", "http://fail/1"], 0, 2),
        (&["http://ok/0"], 1, 0),
        (&[], 0, 3),
    ];

    for (urls, expected_successes, profile_count) in cases {
        let transformer = Arc::new(RecordingTransformer::default());
        let (pipeline, jobs) = pipeline(
            config(urls, *profile_count),
            Arc::new(StubFetcher::default()),
            transformer.clone(),
        );

        let report = pipeline.run(jobs).await;

        assert_drain_counts(&report, urls.len(), *profile_count);
        assert_eq!(report.successful_fetches(), *expected_successes);
        assert_eq!(transformer.call_count(), expected_successes * profile_count);
    }
}

#[tokio::test]
async fn test_failed_fetch_spawns_no_transforms_for_its_job() {
    let transformer = Arc::new(RecordingTransformer::default());
    let (pipeline, jobs) = pipeline(
        config(&["http://ok/a", "http://fail/b"], 2),
        Arc::new(StubFetcher::default()),
        transformer.clone(),
    );

    let report = pipeline.run(jobs).await;

    assert_eq!(report.failed_fetches(), 1);
    let failed = report.fetches.iter().find(|o| !o.is_success()).unwrap();
    assert_eq!(failed.job.index, 1);
    assert!(matches!(failed.result, Err(Error::BadStatus { .. })));

    assert!(report.transforms.iter().all(|t| t.job_index == 0));
    let calls = transformer.calls.lock().unwrap();
    assert!(calls.iter().all(|(source, _, _)| source.ends_with("image_0.jpeg")));
    let mut profiles: Vec<_> = calls.iter().map(|(_, p, _)| p.clone()).collect();
    profiles.sort();
    assert_eq!(profiles, ["p0", "p1"]);
}

#[tokio::test]
async fn test_transforms_run_concurrently() {
    let delay = Duration::from_millis(100);
    let transformer = Arc::new(RecordingTransformer {
        delay,
        ..Default::default()
    });
    let (pipeline, jobs) = pipeline(
        config(&["http://ok/0", "http://ok/1", "http://ok/2"], 3),
        Arc::new(StubFetcher::default()),
        transformer.clone(),
    );

    let start = Instant::now();
    let report = pipeline.run(jobs).await;
    let elapsed = start.elapsed();

    assert_eq!(report.transforms.len(), 9);
    let serial_sum = delay * 9;
    assert!(
        elapsed < serial_sum / 2,
        "elapsed {elapsed:?} should be well under the serial sum {serial_sum:?}"
    );
    assert!(transformer.max_in_flight.load(Ordering::SeqCst) > 1);
}

#[tokio::test]
async fn test_stage_two_starts_before_stage_one_is_drained() {
    let fetcher = Arc::new(StubFetcher {
        slow_delay: Duration::from_millis(300),
        ..Default::default()
    });
    let transformer = Arc::new(RecordingTransformer::default());
    let (pipeline, jobs) = pipeline(
        config(&["http://ok/fast", "http://ok/slow"], 1),
        fetcher.clone(),
        transformer.clone(),
    );

    let report = pipeline.run(jobs).await;
    assert_drain_counts(&report, 2, 1);

    let slow_done = fetcher.slow_finished_at.lock().unwrap().unwrap();
    let calls = transformer.calls.lock().unwrap();
    let (_, _, fast_transform_at) = calls
        .iter()
        .find(|(source, _, _)| source.ends_with("image_0.jpeg"))
        .unwrap();
    assert!(*fast_transform_at < slow_done);
}

#[tokio::test]
async fn test_failed_transform_is_reported_and_draining_continues() {
    let transformer = Arc::new(RecordingTransformer {
        fail_profile: Some("p1".to_string()),
        ..Default::default()
    });
    let (pipeline, jobs) = pipeline(
        config(&["http://ok/0", "http://ok/1"], 3),
        Arc::new(StubFetcher::default()),
        transformer,
    );

    let report = pipeline.run(jobs).await;

    assert_drain_counts(&report, 2, 3);
    assert_eq!(report.failed_transforms(), 2);
    for outcome in report.transforms.iter().filter(|t| !t.is_success()) {
        assert_eq!(outcome.profile, "p1");
        assert!(matches!(outcome.result, Err(Error::Transform { .. })));
    }
}

#[tokio::test]
async fn test_transform_limit_bounds_concurrency_and_drains_everything() {
    let transformer = Arc::new(RecordingTransformer {
        delay: Duration::from_millis(20),
        ..Default::default()
    });
    let config = Config {
        max_concurrent_transforms: Some(2),
        ..config(&["http://ok/0", "http://ok/1", "http://ok/2"], 3)
    };
    let (pipeline, jobs) = pipeline(config, Arc::new(StubFetcher::default()), transformer.clone());

    let report = pipeline.run(jobs).await;

    assert_drain_counts(&report, 3, 3);
    assert_eq!(report.transforms.len(), 9);
    assert!(transformer.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_fetch_limit_bounds_concurrency_and_drains_everything() {
    let fetcher = Arc::new(StubFetcher {
        delay: Duration::from_millis(20),
        ..Default::default()
    });
    let config = Config {
        max_concurrent_fetches: Some(1),
        ..config(
            &["http://ok/0", "http://fail/1", "http://ok/2", "http://ok/3"],
            1,
        )
    };
    let (pipeline, jobs) = pipeline(
        config,
        fetcher.clone(),
        Arc::new(RecordingTransformer::default()),
    );

    let report = pipeline.run(jobs).await;

    assert_drain_counts(&report, 4, 1);
    assert_eq!(report.transforms.len(), 3);
    assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancelled_before_run_drains_every_job() {
    let transformer = Arc::new(RecordingTransformer::default());
    let (pipeline, jobs) = pipeline(
        config(&["http://ok/0", "http://ok/1"], 2),
        Arc::new(StubFetcher {
            delay: Duration::from_secs(10),
            ..Default::default()
        }),
        transformer.clone(),
    );

    pipeline.cancel();
    let report = tokio::time::timeout(Duration::from_secs(2), pipeline.run(jobs))
        .await
        .expect("cancelled run must not hang");

    assert_eq!(report.fetches.len(), 2);
    assert!(
        report
            .fetches
            .iter()
            .all(|o| matches!(o.result, Err(Error::Cancelled)))
    );
    assert!(report.transforms.is_empty());
    assert_eq!(transformer.call_count(), 0);
}

#[tokio::test]
async fn test_cancelling_mid_fetch_reaches_the_fetcher() {
    let transformer = Arc::new(RecordingTransformer::default());
    let fetcher = Arc::new(StubFetcher {
        delay: Duration::from_secs(10),
        ..Default::default()
    });
    let (pipeline, jobs) = pipeline(
        config(&["http://ok/0", "http://ok/1"], 2),
        fetcher.clone(),
        transformer.clone(),
    );

    let token = pipeline.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(2), pipeline.run(jobs))
        .await
        .expect("cancelled run must not hang");

    assert_eq!(report.fetches.len(), 2);
    assert!(
        report
            .fetches
            .iter()
            .all(|o| matches!(o.result, Err(Error::Cancelled)))
    );
    // Both fetches started, so the fetcher itself observed the cancellation
    assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 2);
    assert_eq!(fetcher.in_flight.load(Ordering::SeqCst), 0);
    assert_eq!(transformer.call_count(), 0);
}

#[tokio::test]
async fn test_cancelling_mid_transform_still_drains_every_transform() {
    let transformer = Arc::new(SimulatedTransformer::new(Arc::new(FixedDelay(
        Duration::from_secs(10),
    ))));
    let (pipeline, jobs) = pipeline(
        config(&["http://ok/0", "http://ok/1", "http://fail/2"], 3),
        Arc::new(StubFetcher::default()),
        transformer,
    );

    let token = pipeline.cancellation_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let report = tokio::time::timeout(Duration::from_secs(2), pipeline.run(jobs))
        .await
        .expect("cancelled run must not hang");

    assert_drain_counts(&report, 3, 3);
    assert_eq!(report.transforms.len(), 6);
    assert!(
        report
            .transforms
            .iter()
            .all(|t| matches!(t.result, Err(Error::Cancelled)))
    );
}

#[tokio::test]
async fn test_lost_fetch_task_does_not_deadlock() {
    let (pipeline, jobs) = pipeline(
        config(&["http://ok/0", "http://panic/1", "http://ok/2"], 1),
        Arc::new(PanickingFetcher),
        Arc::new(RecordingTransformer::default()),
    );

    let report = tokio::time::timeout(Duration::from_secs(2), pipeline.run(jobs))
        .await
        .expect("run must finish even if a fetch task panics");

    assert_eq!(report.fetches.len(), 2);
    assert_eq!(report.transforms.len(), 2);
}

#[tokio::test]
async fn test_events_follow_drain_order() {
    let (pipeline, jobs) = pipeline(
        config(&["http://ok/0", "http://fail/1"], 2),
        Arc::new(StubFetcher::default()),
        Arc::new(RecordingTransformer::default()),
    );
    let mut events = pipeline.subscribe();

    pipeline.run(jobs).await;

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }

    assert_eq!(received.len(), 2 + 2 + 1);
    assert!(received[..2].iter().all(|e| matches!(
        e,
        Event::Downloaded { .. } | Event::DownloadFailed { .. }
    )));
    assert!(
        received[2..4]
            .iter()
            .all(|e| matches!(e, Event::Transformed { index: 0, .. }))
    );
    assert_eq!(
        received[4],
        Event::Finished {
            downloaded: 1,
            download_failures: 1,
            transformed: 2,
            transform_failures: 0,
        }
    );
}

#[tokio::test]
async fn test_pipeline_can_run_twice() {
    let transformer = Arc::new(RecordingTransformer::default());
    let (pipeline, jobs) = pipeline(
        config(&["http://ok/0"], 2),
        Arc::new(StubFetcher::default()),
        transformer.clone(),
    );

    let first = pipeline.run(jobs.clone()).await;
    let second = pipeline.run(jobs).await;

    assert_eq!(first.transforms.len(), 2);
    assert_eq!(second.transforms.len(), 2);
    assert_eq!(transformer.call_count(), 4);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = Config {
        max_concurrent_transforms: Some(0),
        ..Default::default()
    };
    let result = Pipeline::with_components(
        config,
        Arc::new(StubFetcher::default()),
        Arc::new(RecordingTransformer::default()),
    );
    assert!(matches!(result, Err(Error::Config { .. })));
}
