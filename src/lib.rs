//! # imgfetch
//!
//! Concurrent image downloader with a per-download resize fan-out stage.
//!
//! A run has two stages. Stage 1 fetches every configured URL concurrently
//! and writes each body to `image_<index>.jpeg`. As soon as a download
//! succeeds, stage 2 starts one transform per size profile for it. The
//! coordinator drains exactly one outcome per job and exactly one outcome per
//! (successful download, profile) pair, in arrival order.
//!
//! ## Quick Start
//!
//! ```no_run
//! use imgfetch::{Config, Pipeline, cleanup::cleanup};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     cleanup(&config.output_dir, &config.cleanup_pattern)?;
//!
//!     let jobs = config.jobs();
//!     let pipeline = Pipeline::new(config)?;
//!
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = pipeline.run(jobs).await;
//!     println!("{} downloads failed", report.failed_fetches());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Stale output removal
pub mod cleanup;
/// Configuration types
pub mod config;
/// Binary entry point logic
pub mod driver;
/// Error types
pub mod error;
/// Stage 1 fetching
pub mod fetcher;
/// Stage coordinator
pub mod pipeline;
/// Stage 2 transforms
pub mod transform;
/// Core types and events
pub mod types;
/// File naming helpers
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use fetcher::{Fetcher, HttpFetcher};
pub use pipeline::Pipeline;
pub use transform::{DelaySource, FixedDelay, RandomDelay, SimulatedTransformer, Transformer};
pub use types::{Event, FetchOutcome, Job, PipelineReport, SizeProfile, TransformOutcome};

/// Cancel the pipeline when a termination signal arrives
///
/// Spawns a task that triggers the pipeline's cancellation token on SIGINT
/// (Ctrl+C) or, on Unix, SIGTERM. Work already in flight resolves to
/// [`Error::Cancelled`] and is still reported. The task ends on its own if
/// the token is cancelled some other way.
pub fn cancel_on_signal(pipeline: &Pipeline) -> tokio::task::JoinHandle<()> {
    let token = pipeline.cancellation_token();
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                tracing::warn!("cancelling outstanding work");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!(signal = "SIGTERM", "signal received"),
                _ = interrupt() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM unavailable, only Ctrl+C will cancel");
            interrupt().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    interrupt().await;
}

/// Resolve on Ctrl+C. Never resolves if the handler cannot be installed.
async fn interrupt() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!(signal = "SIGINT", "signal received"),
        Err(e) => {
            tracing::warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}
