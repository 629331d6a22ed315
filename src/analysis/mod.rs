//! # Analysis Module
//!
//! The remote half of the pipeline: a fixed instruction plus the normalized
//! photo go out in one request, a validated [`ReadingSet`] comes back.

pub mod client;
pub mod readings;
pub mod transport;

pub use client::{ANALYSIS_INSTRUCTION, AnalysisClient};
pub use readings::ReadingSet;
pub use transport::{ChatCompletionsTransport, InferenceRequest, InferenceTransport};
