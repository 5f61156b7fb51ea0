//! Configuration types for imgfetch
//!
//! There is no configuration file: the driver builds a [`Config`] in process,
//! usually from [`Config::default`]. The types still derive serde so a caller
//! embedding the library can load them however it likes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{Job, SizeProfile};
use crate::utils::job_file_name;

/// Pipeline configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// URLs to download, in job order
    #[serde(default = "default_urls")]
    pub urls: Vec<String>,

    /// Size profiles applied to every successful download
    #[serde(default = "default_profiles")]
    pub profiles: Vec<SizeProfile>,

    /// Directory downloads are written to and cleaned up in (default: ".")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Prefix of downloaded file names (default: "image")
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Extension of downloaded file names (default: "jpeg")
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Glob matched against file names by the cleanup step (default: "*.jpeg")
    #[serde(default = "default_cleanup_pattern")]
    pub cleanup_pattern: String,

    /// Timeout for a single HTTP request (default: 30 seconds)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub fetch_timeout: Duration,

    /// Upper bound of the simulated transform delay (default: 5 seconds)
    #[serde(default = "default_transform_max_delay", with = "duration_serde")]
    pub transform_max_delay: Duration,

    /// Maximum fetches running at once (None = one task per job, unbounded)
    #[serde(default)]
    pub max_concurrent_fetches: Option<usize>,

    /// Maximum transforms running at once (None = unbounded)
    #[serde(default)]
    pub max_concurrent_transforms: Option<usize>,

    /// Remove a partially written file when copying the body fails (default: false)
    ///
    /// When disabled the partial file stays on disk and is removed by the
    /// next run's cleanup step.
    #[serde(default)]
    pub remove_partial_downloads: bool,

    /// Capacity of the event broadcast channel (default: 1024)
    ///
    /// A subscriber that falls more than this many events behind misses the
    /// oldest ones and gets `RecvError::Lagged`. The [`PipelineReport`]
    /// returned by a run always holds every outcome.
    ///
    /// [`PipelineReport`]: crate::types::PipelineReport
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            urls: default_urls(),
            profiles: default_profiles(),
            output_dir: default_output_dir(),
            file_prefix: default_file_prefix(),
            file_extension: default_file_extension(),
            cleanup_pattern: default_cleanup_pattern(),
            fetch_timeout: default_fetch_timeout(),
            transform_max_delay: default_transform_max_delay(),
            max_concurrent_fetches: None,
            max_concurrent_transforms: None,
            remove_partial_downloads: false,
            event_buffer: default_event_buffer(),
        }
    }
}

impl Config {
    /// Build the job list from the configured URLs
    ///
    /// Job `i` downloads `urls[i]` into `<file_prefix>_<i>.<file_extension>`.
    pub fn jobs(&self) -> Vec<Job> {
        self.urls
            .iter()
            .enumerate()
            .map(|(index, url)| {
                Job::new(
                    index,
                    url.clone(),
                    job_file_name(&self.file_prefix, index, &self.file_extension),
                )
            })
            .collect()
    }

    /// Check the configuration for values the pipeline cannot work with
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if:
    /// - a URL does not parse or is not http(s)
    /// - a profile has an empty name, a duplicate name, or a zero dimension
    /// - a concurrency limit or the event buffer is zero
    /// - the file prefix is empty
    pub fn validate(&self) -> Result<()> {
        for url in &self.urls {
            let parsed = url::Url::parse(url)
                .map_err(|e| Error::config(format!("invalid URL '{url}': {e}"), Some("urls")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::config(
                    format!("unsupported URL scheme '{}' in '{url}'", parsed.scheme()),
                    Some("urls"),
                ));
            }
        }

        let mut seen = HashSet::new();
        for profile in &self.profiles {
            if profile.name.is_empty() {
                return Err(Error::config("profile name must not be empty", Some("profiles")));
            }
            if !seen.insert(profile.name.as_str()) {
                return Err(Error::config(
                    format!("duplicate profile name '{}'", profile.name),
                    Some("profiles"),
                ));
            }
            if profile.max_width == 0 || profile.max_height == 0 {
                return Err(Error::config(
                    format!("profile '{}' has a zero dimension", profile.name),
                    Some("profiles"),
                ));
            }
        }

        if self.file_prefix.is_empty() {
            return Err(Error::config("file prefix must not be empty", Some("file_prefix")));
        }
        if self.max_concurrent_fetches == Some(0) {
            return Err(Error::config(
                "concurrency limit must be at least 1",
                Some("max_concurrent_fetches"),
            ));
        }
        if self.max_concurrent_transforms == Some(0) {
            return Err(Error::config(
                "concurrency limit must be at least 1",
                Some("max_concurrent_transforms"),
            ));
        }
        if self.event_buffer == 0 {
            return Err(Error::config(
                "event buffer must be at least 1",
                Some("event_buffer"),
            ));
        }

        Ok(())
    }
}

// Default value functions
fn default_urls() -> Vec<String> {
    vec![
        "https://www.placecage.com/800/1300".to_string(),
        "https://www.fillmurray.com/1000/1500".to_string(),
        "https://www.stevensegallery.com/1500/1000".to_string(),
    ]
}

fn default_profiles() -> Vec<SizeProfile> {
    vec![
        SizeProfile::new("thumbnail", 150, 150),
        SizeProfile::new("medium", 640, 480),
        SizeProfile::new("large", 1280, 1280),
    ]
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_file_prefix() -> String {
    "image".to_string()
}

fn default_file_extension() -> String {
    "jpeg".to_string()
}

fn default_cleanup_pattern() -> String {
    "*.jpeg".to_string()
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_transform_max_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_event_buffer() -> usize {
    1024
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
