use nalgebra::{Point3, Vector3};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VectorKind {
    Alpha,
    Beta,
}

/// Directional summary of one helix or strand.
///
/// `begin_residue` and `end_residue` are inclusive sequence indices within `chain`.
/// `sheet` and `barrel` are assigned by the beta annotation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SecStrVec {
    pub kind: VectorKind,
    pub begin: Point3<f64>,
    pub end: Point3<f64>,
    pub chain: usize,
    pub begin_residue: usize,
    pub end_residue: usize,
    pub sheet: Option<usize>,
    pub barrel: Option<usize>,
}

impl SecStrVec {
    pub fn new(
        kind: VectorKind,
        begin: Point3<f64>,
        end: Point3<f64>,
        chain: usize,
        begin_residue: usize,
        end_residue: usize,
    ) -> Self {
        Self {
            kind,
            begin,
            end,
            chain,
            begin_residue,
            end_residue,
            sheet: None,
            barrel: None,
        }
    }

    pub fn direction(&self) -> Vector3<f64> {
        self.end - self.begin
    }

    pub fn midpoint(&self) -> Point3<f64> {
        nalgebra::center(&self.begin, &self.end)
    }

    pub fn residue_count(&self) -> usize {
        self.end_residue.saturating_sub(self.begin_residue) + 1
    }

    /// Residue indices of the vector as a slice range, or `None` when the range is
    /// reversed or runs past a chain of `chain_len` residues.
    pub fn residue_range(&self, chain_len: usize) -> Option<Range<usize>> {
        (self.begin_residue <= self.end_residue && self.end_residue < chain_len)
            .then(|| self.begin_residue..self.end_residue + 1)
    }

    pub fn covers(&self, chain: usize, residue: usize) -> bool {
        self.chain == chain && (self.begin_residue..=self.end_residue).contains(&residue)
    }
}
