//! Placeholder transformer with simulated latency

use async_trait::async_trait;
use rand::Rng;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::traits::Transformer;
use crate::types::SizeProfile;
use crate::utils::derived_file_name;

/// Source of the artificial delay applied to each simulated transform
pub trait DelaySource: Send + Sync {
    /// Delay for the next transform
    fn next_delay(&self) -> Duration;
}

/// Uniformly random delay between zero and `max` (inclusive)
#[derive(Clone, Copy, Debug)]
pub struct RandomDelay {
    /// Upper bound of the delay
    pub max: Duration,
}

impl RandomDelay {
    /// Create a random delay bounded by `max`
    pub fn new(max: Duration) -> Self {
        Self { max }
    }
}

impl DelaySource for RandomDelay {
    fn next_delay(&self) -> Duration {
        let max_millis = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(0..=max_millis))
    }
}

/// The same delay every time
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedDelay(pub Duration);

impl DelaySource for FixedDelay {
    fn next_delay(&self) -> Duration {
        self.0
    }
}

/// Stub [`Transformer`] that sleeps and describes the artifact it would produce
///
/// Always succeeds. The returned reference names the derived file
/// (`image_0.jpeg` with profile `thumbnail` gives `image_0_thumbnail.jpeg`)
/// and the target bounds; nothing is written to disk.
#[derive(Clone)]
pub struct SimulatedTransformer {
    delay: Arc<dyn DelaySource>,
}

impl SimulatedTransformer {
    /// Create a transformer using the given delay source
    pub fn new(delay: Arc<dyn DelaySource>) -> Self {
        Self { delay }
    }

    /// Transformer with random delays up to `max`
    pub fn with_max_delay(max: Duration) -> Self {
        Self::new(Arc::new(RandomDelay::new(max)))
    }

    /// Transformer that completes without delay
    pub fn instant() -> Self {
        Self::new(Arc::new(FixedDelay(Duration::ZERO)))
    }
}

impl std::fmt::Debug for SimulatedTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedTransformer").finish_non_exhaustive()
    }
}

#[async_trait]
impl Transformer for SimulatedTransformer {
    async fn transform(&self, source: &Path, profile: &SizeProfile) -> crate::Result<String> {
        let delay = self.delay.next_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let derived = derived_file_name(source, &profile.name);
        tracing::trace!(
            source = %source.display(),
            profile = %profile.name,
            delay_ms = delay.as_millis() as u64,
            "simulated transform complete"
        );

        Ok(format!(
            "{} (fit within {}x{} from {})",
            derived,
            profile.max_width,
            profile.max_height,
            source.display()
        ))
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
