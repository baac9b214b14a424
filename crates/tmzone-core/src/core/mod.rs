//! # Core Module
//!
//! Stateless foundations of the library: the structure model and the physicochemical
//! and geometric helpers the engine builds on.
//!
//! ## Architecture
//!
//! - **Structure Representation** ([`models`]) - Proteins, chains, residues, atoms, membranes and regions
//! - **Utilities** ([`utils`]) - Residue property tables and vector geometry

pub mod models;
pub mod utils;
