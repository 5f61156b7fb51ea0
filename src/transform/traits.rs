//! Trait for transform implementations

use async_trait::async_trait;
use std::path::Path;

use crate::types::SizeProfile;

/// Produces a derived artifact from a downloaded item and a size profile
///
/// Implementations must be safe to call from many tasks at once; the pipeline
/// shares one instance across every (download, profile) pair and calls it
/// concurrently.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Transform the downloaded file at `source` to fit `profile`
    ///
    /// # Returns
    ///
    /// A reference to the derived artifact (a path, a name, or a description,
    /// depending on the implementation).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transform`](crate::Error::Transform) if the artifact
    /// cannot be produced.
    async fn transform(&self, source: &Path, profile: &SizeProfile) -> crate::Result<String>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
