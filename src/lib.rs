//! Case-management backend for export-licence applications.
//!
//! The library owns the flagging-rule evaluator, the case-status state
//! machine, and the flag aggregation view, behind trait seams for the
//! case store, flag registry, and audit trail.

pub mod casework;
pub mod config;
pub mod error;
pub mod telemetry;
