//! # Core Models Module
//!
//! Data structures describing a protein structure and the results of its membrane
//! placement.
//!
//! ## Key Components
//!
//! - [`protein`] - The structure root: chains, the atom arena, membranes and the overall type
//! - [`chain`] - A polypeptide chain with its finalized regions
//! - [`residue`] - Residue identity, secondary structure and surface values
//! - [`atom`] - Atom coordinates and per-atom accessible surface
//! - [`region`] - Region types and the immutable region records produced by annotation
//! - [`membrane`] - Plane and curved membrane geometry
//! - [`sec_str_vec`] - Directional summaries of helices and strands
//! - [`ids`] - Identifier types for atoms and residues
//!
//! ## Usage
//!
//! ```ignore
//! use tmzone::core::models::{atom::Atom, protein::Protein};
//!
//! let mut protein = Protein::new("1abc");
//! let chain = protein.add_chain("A");
//! let residue = protein.add_residue(chain, 1, ' ', 1, "LEU").unwrap();
//! protein.add_atom(Atom::new("CA", residue, Point3::new(0.0, 0.0, 0.0)));
//! ```

pub mod atom;
pub mod chain;
pub mod ids;
pub mod membrane;
pub mod protein;
pub mod region;
pub mod residue;
pub mod sec_str_vec;
