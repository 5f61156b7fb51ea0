//! Two-stage download/transform pipeline
//!
//! Stage 1 fetches every job concurrently. As each fetch result is drained,
//! a success immediately fans out into one transform per size profile, so
//! stage 2 work for early downloads overlaps with later downloads. Once all
//! fetch results are in, the coordinator knows how many transforms it
//! dispatched and drains exactly that many.

mod stages;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::transform::{SimulatedTransformer, Transformer};
use crate::types::{Event, SizeProfile};

/// Stage coordinator for the download and transform waves
///
/// A pipeline can be run any number of times; each [`run`](Pipeline::run)
/// is independent apart from sharing the cancellation token.
pub struct Pipeline {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Size profiles, shared read-only by every transform task
    pub(crate) profiles: Arc<[SizeProfile]>,
    /// Stage 1 implementation (trait object for pluggable implementations)
    pub(crate) fetcher: Arc<dyn Fetcher>,
    /// Stage 2 implementation (trait object for pluggable implementations)
    pub(crate) transformer: Arc<dyn Transformer>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Cancels every unit of work that has not finished yet
    pub(crate) cancel_token: CancellationToken,
}

impl Pipeline {
    /// Create a pipeline with the HTTP fetcher and the simulated transformer
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration is
    /// invalid or the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config)?);
        let transformer = Arc::new(SimulatedTransformer::with_max_delay(
            config.transform_max_delay,
        ));
        Self::with_components(config, fetcher, transformer)
    }

    /// Create a pipeline with caller-provided stage implementations
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration is invalid.
    pub fn with_components(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        transformer: Arc<dyn Transformer>,
    ) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(config.event_buffer);
        let profiles: Arc<[SizeProfile]> = config.profiles.clone().into();

        tracing::debug!(transformer = transformer.name(), "pipeline created");

        Ok(Self {
            config: Arc::new(config),
            profiles,
            fetcher,
            transformer,
            event_tx,
            cancel_token: CancellationToken::new(),
        })
    }

    /// Subscribe to outcome events
    ///
    /// Events are sent in drain order: every fetch outcome, then every
    /// transform outcome, then [`Event::Finished`].
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cancel all unfinished work
    ///
    /// Units that have not completed resolve to
    /// [`Error::Cancelled`](crate::Error::Cancelled) and are still drained, so
    /// a running [`run`](Pipeline::run) returns a complete report.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Token that cancels this pipeline when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers the event is dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
