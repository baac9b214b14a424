//! # tmzone
//!
//! Membrane placement and transmembrane region annotation for 3-D protein structures.
//!
//! Given a structure with per-atom accessible surface and secondary structure, the
//! library finds the membrane normal and slab(s) that best explain its hydrophobic belt,
//! moves the structure into the membrane frame and labels every residue as membrane
//! helix, beta strand, re-entrant loop, interfacial helix, barrel interior or one of the
//! membrane sides.
//!
//! ## Architecture
//!
//! - **[`core`]: The Foundation.** Stateless structure models (`Protein`, `Chain`,
//!   `Residue`, `Membrane`, `Region`) and the physicochemical and geometric helpers.
//!
//! - **[`engine`]: The Logic Core.** The normal sweep, the slice fitness optimizer, side
//!   detection, the region heuristics and barrel detection, together with configuration,
//!   error and progress types.
//!
//! - **[`workflows`]: The Public API.** End-to-end entry points tying `engine` and `core`
//!   together, from a materialized structure to an
//!   [`AnnotationReport`](workflows::annotate::AnnotationReport).

pub mod core;
pub mod engine;
pub mod workflows;
