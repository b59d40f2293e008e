//! IMG.LY Batch Canvas CLI Tool
//!
//! Command-line interface that removes backgrounds, crops every image to its
//! subject and centers it on a fixed-size canvas, writing a zip archive.

#[cfg(feature = "cli")]
use imgly_bgcanvas::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
