//! Shim binary that calls into the `likesync_relay` library's `inner_main`.
use clap::Parser as _;
use eyre::Result;
use likesync_relay::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Delegate to library entrypoint
    likesync_relay::inner_main(Cli::parse()).await
}
