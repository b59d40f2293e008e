//! Service layer
//!
//! Infrastructure concerns (encoding, file I/O, progress reporting) kept apart
//! from the image pipeline.

pub mod format;
pub mod io;
pub mod progress;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
pub use progress::{
    ConsoleProgressReporter, ItemProgress, NoOpProgressReporter, ProgressReporter,
    ProgressTracker,
};
