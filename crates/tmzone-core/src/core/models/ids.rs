use serde::Serialize;
use slotmap::new_key_type;

new_key_type! {
    pub struct AtomId;
}

/// Stable position of a residue inside a [`Protein`](super::protein::Protein).
///
/// Residues are addressed by the index of their chain and their sequence index within
/// that chain, so no back-pointers are needed between chains, residues and atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResidueIndex {
    pub chain: usize,
    pub residue: usize,
}

impl ResidueIndex {
    pub fn new(chain: usize, residue: usize) -> Self {
        Self { chain, residue }
    }
}
