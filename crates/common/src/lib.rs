//! Shared types and utilities for tender-harvest.
//!
//! This crate provides common functionality used across all tender-harvest
//! crates:
//! - Attachment description sanitization
//! - Randomized pacing and backoff delays
//! - Shared tuning constants

pub mod constants;
pub mod pacing;
pub mod sanitize;

// Re-export commonly used items at crate root
pub use constants::*;
pub use pacing::{sleep_range, PacingSettings};
pub use sanitize::sanitize_description;
