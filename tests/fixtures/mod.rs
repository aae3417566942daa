//! Test fixtures and data generators
//!
//! Builders that lay out raw VGM bytes for the integration tests.

pub mod builders;

pub use builders::*;
