//! Segmentation backend implementations
//!
//! - Tract backend (pure Rust, no external dependencies) for the U²-Net family

#[cfg(feature = "tract")]
pub mod tract;

// Test utilities for backend testing
#[cfg(test)]
pub mod test_utils;

#[cfg(feature = "tract")]
pub use self::tract::{TractSession, TractSessionFactory};
