//! The `imgfetch` run: cleanup, pipeline, console output
//!
//! Stale files matching the cleanup pattern are removed first; failing to
//! remove them is the only fatal error. Every download and resize outcome is
//! printed to stdout as it is collected.

use std::process::ExitCode;

use tokio::sync::broadcast::error::RecvError;

use crate::cancel_on_signal;
use crate::cleanup::cleanup;
use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::types::{Event, PipelineReport};

/// Run one full cleanup and download/transform pass for `config`
///
/// # Returns
///
/// [`ExitCode::FAILURE`] if cleanup fails or the pipeline cannot be built,
/// [`ExitCode::SUCCESS`] otherwise. Individual download and resize failures
/// are printed but do not change the exit status.
pub async fn run(config: Config) -> ExitCode {
    if let Err(e) = cleanup(&config.output_dir, &config.cleanup_pattern) {
        tracing::error!(error = %e, code = e.code(), "cleanup failed, aborting");
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let jobs = config.jobs();
    let pipeline = match Pipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            tracing::error!(error = %e, "failed to build pipeline");
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut events = pipeline.subscribe();
    let printer = tokio::spawn(async move {
        let mut lagged = false;
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "console output fell behind, events skipped");
                    lagged = true;
                }
                Err(RecvError::Closed) => break,
            }
        }
        lagged
    });

    let signal_task = cancel_on_signal(&pipeline);
    let report = pipeline.run(jobs).await;
    signal_task.abort();

    // Dropping the pipeline closes the event channel and lets the printer finish
    drop(pipeline);
    let lagged = match printer.await {
        Ok(lagged) => lagged,
        Err(e) => {
            tracing::error!(error = %e, "event printer task failed");
            true
        }
    };
    if lagged {
        println!("Some progress lines were skipped; full results follow.");
        print_report(&report);
    }

    tracing::debug!(
        downloads = report.fetches.len(),
        transforms = report.transforms.len(),
        "run complete"
    );

    ExitCode::SUCCESS
}

/// Print every outcome in drain order, then the summary
fn print_report(report: &PipelineReport) {
    for outcome in &report.fetches {
        print_event(&Event::from_fetch(outcome));
    }
    for outcome in &report.transforms {
        print_event(&Event::from_transform(outcome));
    }
    print_event(&report.summary());
}

fn print_event(event: &Event) {
    match event {
        Event::Downloaded { path, .. } => {
            println!("Download successful: {}", path.display());
        }
        Event::DownloadFailed { url, error, .. } => {
            println!("Error occurred during download of {url}: {error}");
        }
        Event::Transformed { reference, .. } => {
            println!("Resize successful: {reference}");
        }
        Event::TransformFailed {
            index,
            profile,
            error,
            ..
        } => {
            println!("Error occurred resizing image {index} to {profile}: {error}");
        }
        Event::Finished {
            downloaded,
            download_failures,
            transformed,
            transform_failures,
        } => {
            println!(
                "Done: {downloaded} downloaded, {download_failures} failed; \
                 {transformed} resized, {transform_failures} failed"
            );
        }
    }
}
