//! Download the placeholder images, then simulate resizing each one to every
//! size profile.
//!
//! Usage: `imgfetch` (set `RUST_LOG=imgfetch=debug` for more detail)
//!
//! Stale `*.jpeg` files in the working directory are removed first; failing
//! to remove them is the only fatal error. Every download and resize outcome
//! is printed to stdout as it is collected.

use std::process::ExitCode;

use imgfetch::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();
    imgfetch::driver::run(Config::default()).await
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("imgfetch=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
