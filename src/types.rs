//! Core types and events for imgfetch

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// One unit of download work
///
/// Jobs are created once at startup from [`Config::jobs`](crate::Config::jobs)
/// and never change afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Position of the job in the configured URL list
    pub index: usize,
    /// URL to fetch
    pub url: String,
    /// File name (relative to the output directory) the body is written to
    pub destination: String,
}

impl Job {
    /// Create a new job
    pub fn new(index: usize, url: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            index,
            url: url.into(),
            destination: destination.into(),
        }
    }
}

/// Named target dimensions applied during the transform stage
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeProfile {
    /// Profile name, used in derived file names (e.g. "thumbnail")
    pub name: String,
    /// Maximum width in pixels
    pub max_width: u32,
    /// Maximum height in pixels
    pub max_height: u32,
}

impl SizeProfile {
    /// Create a new size profile
    pub fn new(name: impl Into<String>, max_width: u32, max_height: u32) -> Self {
        Self {
            name: name.into(),
            max_width,
            max_height,
        }
    }
}

/// Result of fetching a single [`Job`]
///
/// Produced exactly once per job. On success the path is absolute.
#[derive(Debug)]
pub struct FetchOutcome {
    /// The job this outcome belongs to
    pub job: Job,
    /// Absolute path of the written file, or why the fetch failed
    pub result: Result<PathBuf>,
}

impl FetchOutcome {
    /// Whether the fetch succeeded
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Path of the downloaded file, if the fetch succeeded
    pub fn path(&self) -> Option<&Path> {
        self.result.as_ref().ok().map(PathBuf::as_path)
    }
}

/// Result of transforming one downloaded item to one [`SizeProfile`]
#[derive(Debug)]
pub struct TransformOutcome {
    /// Index of the job whose download was transformed
    pub job_index: usize,
    /// Downloaded file the transform was applied to
    pub source: PathBuf,
    /// Name of the size profile
    pub profile: String,
    /// Reference to the derived artifact, or why the transform failed
    pub result: Result<String>,
}

impl TransformOutcome {
    /// Whether the transform succeeded
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Everything a pipeline run drained, in drain order
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Stage 1 outcomes, one per job
    pub fetches: Vec<FetchOutcome>,
    /// Stage 2 outcomes, one per (successful fetch, profile) pair
    pub transforms: Vec<TransformOutcome>,
}

impl PipelineReport {
    /// Number of fetches that produced a file
    pub fn successful_fetches(&self) -> usize {
        self.fetches.iter().filter(|o| o.is_success()).count()
    }

    /// Number of fetches that failed
    pub fn failed_fetches(&self) -> usize {
        self.fetches.len() - self.successful_fetches()
    }

    /// Number of transforms that failed
    pub fn failed_transforms(&self) -> usize {
        self.transforms.iter().filter(|o| !o.is_success()).count()
    }

    /// The [`Event::Finished`] summary for this report
    pub fn summary(&self) -> Event {
        let transform_failures = self.failed_transforms();
        Event::Finished {
            downloaded: self.successful_fetches(),
            download_failures: self.failed_fetches(),
            transformed: self.transforms.len() - transform_failures,
            transform_failures,
        }
    }
}

/// Event emitted as the pipeline drains its result queues
///
/// Events are broadcast in drain order. Subscribers that fall too far behind
/// miss events (see [`tokio::sync::broadcast`]); the [`PipelineReport`]
/// returned by [`Pipeline::run`](crate::Pipeline::run) is always complete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A job's file was written
    Downloaded {
        /// Job index
        index: usize,
        /// Source URL
        url: String,
        /// Absolute path of the written file
        path: PathBuf,
    },

    /// A job failed; no transforms are started for it
    DownloadFailed {
        /// Job index
        index: usize,
        /// Source URL
        url: String,
        /// Machine-readable error code
        code: String,
        /// Error message
        error: String,
    },

    /// A transform produced its derived artifact
    Transformed {
        /// Job index
        index: usize,
        /// Size profile name
        profile: String,
        /// Reference to the derived artifact
        reference: String,
    },

    /// A transform failed
    TransformFailed {
        /// Job index
        index: usize,
        /// Size profile name
        profile: String,
        /// Machine-readable error code
        code: String,
        /// Error message
        error: String,
    },

    /// Both stages have been fully drained
    Finished {
        /// Number of successful downloads
        downloaded: usize,
        /// Number of failed downloads
        download_failures: usize,
        /// Number of successful transforms
        transformed: usize,
        /// Number of failed transforms
        transform_failures: usize,
    },
}

impl Event {
    pub(crate) fn from_fetch(outcome: &FetchOutcome) -> Self {
        match &outcome.result {
            Ok(path) => Event::Downloaded {
                index: outcome.job.index,
                url: outcome.job.url.clone(),
                path: path.clone(),
            },
            Err(e) => Event::DownloadFailed {
                index: outcome.job.index,
                url: outcome.job.url.clone(),
                code: e.code().to_string(),
                error: e.to_string(),
            },
        }
    }

    pub(crate) fn from_transform(outcome: &TransformOutcome) -> Self {
        match &outcome.result {
            Ok(reference) => Event::Transformed {
                index: outcome.job_index,
                profile: outcome.profile.clone(),
                reference: reference.clone(),
            },
            Err(e) => Event::TransformFailed {
                index: outcome.job_index,
                profile: outcome.profile.clone(),
                code: e.code().to_string(),
                error: e.to_string(),
            },
        }
    }
}
