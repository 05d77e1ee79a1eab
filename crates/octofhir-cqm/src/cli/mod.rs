//! CLI functionality for the measure tool
//!
//! This module contains all CLI-related functionality including:
//! - Evaluating a patient snapshot against measures
//! - Replaying a clinical event through the runner
//! - Listing bundled measures
//! - Measure, value-set and period resolution
//! - Output formatting

pub mod evaluate;
pub mod event;
pub mod measures;
pub mod output;
pub mod resolver;
