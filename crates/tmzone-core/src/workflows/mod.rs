//! # Workflows Module
//!
//! High-level entry points that run the complete pipeline on one structure.
//!
//! - **Annotation Workflow** ([`annotate`]) - Chain selection, membrane placement,
//!   transformation into the membrane frame and region annotation, returning a
//!   serializable report.

pub mod annotate;
