//! Shared test utilities for docmerge integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated service instances backed by temp directories
//! - Builders for configs, DOCX documents and PDFs

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
