//! Configuration inputs: settings templates and batch manifests.
//!
//! - [`jsonc`] parses JSON-with-comments settings templates
//! - [`merge`] deep-merges a template over existing settings
//! - [`manifest`] loads an artifact batch from a TOML manifest

pub mod jsonc;
pub mod manifest;
pub mod merge;
