//! # Engine Module
//!
//! Stateful machinery of the membrane placement and the region annotation.
//!
//! ## Overview
//!
//! Data flows in one direction: candidate normals from the [`sweep`] are scored by the
//! [`optimizer`], the winning placement defines the membranes, the [`side_detector`]
//! classifies every residue against them, and the [`annotator`] (with the
//! [`beta_annotator`] for strand-dominated chains) turns the classification into
//! finalized regions through the run-length primitives of [`region_handler`].
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Tuned constants of every stage, loadable from TOML
//! - **Normal Sweep** ([`sweep`]) - Symmetry candidates and the spherical sampling
//! - **Optimizer** ([`optimizer`]) - Slice fitness profile and membrane window emission
//! - **Side Detection** ([`side_detector`]) - Per-residue depth and side classification
//! - **Region Handling** ([`region_handler`]) - Run finding, replacement and finalization
//! - **Annotation** ([`annotator`], [`beta_annotator`]) - Helix, loop and barrel heuristics
//! - **Spatial Queries** ([`neighbors`]) - k-d tree over alpha carbons
//! - **Progress Monitoring** ([`progress`]) - Progress reporting for hosts
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod annotator;
pub mod beta_annotator;
pub mod config;
pub mod error;
pub(crate) mod neighbors;
pub mod optimizer;
pub mod progress;
pub mod region_handler;
pub mod scratch;
pub mod side_detector;
pub mod sweep;
