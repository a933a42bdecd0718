//! Verification engine module.
//!
//! Provides check orchestration, bounded polling and result aggregation.

pub mod orchestrator;
pub mod poll;
pub mod result;
