//! # Configuration Module
//!
//! Analyzer configuration (endpoint, model, credential, normalization settings)
//! and the persisted settings file that carries the inference credential.

pub mod config;
pub mod settings;

pub use config::AnalyzerConfig;
pub use settings::Settings;
