//! # ct-corpus
//!
//! Loads the tab-delimited training-sample manifest into typed
//! [`ct_types::SampleRecord`]s.

pub mod manifest;

pub use manifest::load_manifest;
