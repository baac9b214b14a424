use super::ids::ResidueIndex;
use nalgebra::Point3;

/// A heavy atom of the structure together with its solvent accessibility.
///
/// Surface values are supplied by an external surface calculator; `out_surface` is the
/// part of the accessible surface that faces the outside of the protein (for a barrel,
/// the part not pointing into the pore).
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Atom name as found in the structure file (e.g. "CA", "CB").
    pub name: String,
    /// The residue this atom belongs to.
    pub residue: ResidueIndex,
    /// Cartesian coordinates in Angstroms.
    pub position: Point3<f64>,
    /// Solvent accessible surface in square Angstroms.
    pub surface: f64,
    /// Outward facing accessible surface in square Angstroms.
    pub out_surface: f64,
}

impl Atom {
    pub fn new(name: &str, residue: ResidueIndex, position: Point3<f64>) -> Self {
        Self {
            name: name.trim().to_string(),
            residue,
            position,
            surface: 0.0,
            out_surface: 0.0,
        }
    }

    pub fn with_surface(mut self, surface: f64, out_surface: f64) -> Self {
        self.surface = surface;
        self.out_surface = out_surface;
        self
    }

    pub fn is_alpha_carbon(&self) -> bool {
        self.name == "CA"
    }

    pub fn is_backbone(&self) -> bool {
        matches!(self.name.as_str(), "N" | "CA" | "C" | "O" | "OXT")
    }
}
