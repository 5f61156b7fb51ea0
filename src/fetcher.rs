//! Stage 1: fetching a URL into a local file

use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result};

/// Retrieves a URL and persists its body
///
/// Implementations must be safe to call from many tasks at once; the
/// pipeline shares one instance across every job.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` into a file called `destination`
    ///
    /// # Returns
    ///
    /// The absolute path of the written file.
    ///
    /// # Errors
    ///
    /// - [`Error::Network`] if the request cannot be completed
    /// - [`Error::BadStatus`] if the response is not 200 OK
    /// - [`Error::Io`] if the file cannot be created or the body cannot be copied
    /// - [`Error::Cancelled`] if `cancel` fires before the file is complete
    async fn fetch(
        &self,
        url: &str,
        destination: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf>;
}

/// [`Fetcher`] backed by a shared `reqwest` client
///
/// Files are written into the configured output directory. A body copy that
/// fails or is cancelled partway leaves the partial file on disk unless
/// [`Config::remove_partial_downloads`] is set.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    output_dir: PathBuf,
    remove_partial: bool,
}

impl HttpFetcher {
    /// Build a fetcher from the pipeline configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be created.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .user_agent(concat!("imgfetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}"), None))?;

        Ok(Self {
            client,
            output_dir: config.output_dir.clone(),
            remove_partial: config.remove_partial_downloads,
        })
    }

    /// Directory files are written into
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        destination: &str,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            sent = self.client.get(url).send() => sent,
        };
        let mut response = sent.map_err(|source| Error::Network {
            url: url.to_string(),
            source,
        })?;

        if response.status() != StatusCode::OK {
            return Err(Error::BadStatus {
                url: url.to_string(),
                status: response.status(),
            });
        }

        let path = self.output_dir.join(destination);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;

        let copied = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CopyFailure::Cancelled),
            copied = copy_body(&mut response, &mut file) => copied.map_err(CopyFailure::Io),
        };

        match copied {
            Ok(bytes) => {
                tracing::debug!(url, path = %path.display(), bytes, "download written");
            }
            Err(failure) => {
                drop(file);
                self.discard_partial(&path).await;
                return Err(match failure {
                    CopyFailure::Cancelled => Error::Cancelled,
                    CopyFailure::Io(source) => Error::Io { path, source },
                });
            }
        }

        std::path::absolute(&path).map_err(|source| Error::Io { path, source })
    }
}

impl HttpFetcher {
    /// Apply the partial download policy to an incomplete file
    async fn discard_partial(&self, path: &Path) {
        if !self.remove_partial {
            tracing::warn!(path = %path.display(), "partial download left on disk");
            return;
        }
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to remove partial download"
            );
        }
    }
}

/// Why a body copy stopped before the end
enum CopyFailure {
    Cancelled,
    Io(std::io::Error),
}

/// Stream the response body into `file`, returning the number of bytes written
async fn copy_body(
    response: &mut reqwest::Response,
    file: &mut tokio::fs::File,
) -> std::io::Result<u64> {
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await.map_err(std::io::Error::other)? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
