//! Stage 2: deriving per-profile artifacts from downloaded items
//!
//! The core abstraction is the [`Transformer`] trait. The pipeline only ever
//! talks to the trait, so a real image-processing implementation can replace
//! the stub without touching the coordinator.
//!
//! - [`SimulatedTransformer`]: placeholder that sleeps for a jittered delay and
//!   returns a descriptive reference. No image data is read or written.
//!
//! Latency comes from a [`DelaySource`]. [`RandomDelay`] gives the bounded
//! jitter used by the driver; [`FixedDelay`] makes tests deterministic.
//!
//! ## Usage
//!
//! ```
//! use imgfetch::transform::{SimulatedTransformer, Transformer};
//! use imgfetch::SizeProfile;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transformer = SimulatedTransformer::instant();
//!     let profile = SizeProfile::new("thumbnail", 150, 150);
//!
//!     let reference = transformer
//!         .transform(Path::new("/tmp/image_0.jpeg"), &profile)
//!         .await?;
//!     assert!(reference.contains("image_0_thumbnail.jpeg"));
//!     Ok(())
//! }
//! ```

mod simulated;
mod traits;

pub use simulated::{DelaySource, FixedDelay, RandomDelay, SimulatedTransformer};
pub use traits::Transformer;
