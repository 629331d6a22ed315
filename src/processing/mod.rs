//! # Processing Module
//!
//! Turns a captured photo into the bounded JPEG payload sent for analysis.

pub mod normalize;

// Re-export commonly used types for convenience
pub use normalize::{ImageNormalizer, NormalizedImage};
