use crate::core::models::residue::ResidueType;
use phf::{Map, phf_map};

/// Magnitude of the most hydrophilic value on the hydrophobicity scale (ARG).
pub const HYDROPHOBICITY_SPAN: f64 = 12.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResidueProperties {
    /// 1.0 for residues whose side chain is counted as apolar surface, 0.0 otherwise.
    pub apolar: f64,
    /// Hydrophobicity scale value; positive is hydrophobic.
    pub hydrophobicity: f64,
}

const fn props(apolar: f64, hydrophobicity: f64) -> ResidueProperties {
    ResidueProperties {
        apolar,
        hydrophobicity,
    }
}

static RESIDUE_PROPERTIES: Map<&'static str, ResidueProperties> = phf_map! {
    "ALA" => props(0.0, 1.6),
    "CYS" => props(0.0, 2.0),
    "ASP" => props(0.0, -9.2),
    "GLU" => props(0.0, -8.2),
    "PHE" => props(1.0, 3.7),
    "GLY" => props(1.0, 1.0),
    "HIS" => props(0.0, -3.0),
    "ILE" => props(1.0, 3.1),
    "LYS" => props(0.0, -8.8),
    "LEU" => props(1.0, 2.8),
    "MET" => props(1.0, 3.4),
    "ASN" => props(0.0, -4.8),
    "PRO" => props(0.0, -0.2),
    "GLN" => props(0.0, -4.1),
    "ARG" => props(0.0, -12.3),
    "SER" => props(0.0, 0.6),
    "THR" => props(0.0, 1.2),
    "VAL" => props(1.0, 2.6),
    "TRP" => props(1.0, 1.9),
    "TYR" => props(1.0, -0.7),
    "UNK" => props(0.0, 0.0),
};

pub fn properties(residue_type: ResidueType) -> ResidueProperties {
    RESIDUE_PROPERTIES
        .get(residue_type.to_three_letter())
        .copied()
        .unwrap_or(props(0.0, 0.0))
}

pub fn apolarity(residue_type: ResidueType) -> f64 {
    properties(residue_type).apolar
}

pub fn hydrophobicity(residue_type: ResidueType) -> f64 {
    properties(residue_type).hydrophobicity
}

/// Apolarity estimate for residues of alpha-carbon-only models, scaled into `[0, 1]`.
pub fn low_resolution_apolarity(residue_type: ResidueType) -> f64 {
    (hydrophobicity(residue_type) + HYDROPHOBICITY_SPAN) / 16.0
}

/// Hydrophobicity scaled into `[-1, 1]`.
pub fn normalized_hydrophobicity(residue_type: ResidueType) -> f64 {
    hydrophobicity(residue_type) / HYDROPHOBICITY_SPAN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_residue_type_has_properties() {
        for name in [
            "ALA", "ARG", "ASN", "ASP", "CYS", "GLN", "GLU", "GLY", "HIS", "ILE", "LEU", "LYS",
            "MET", "PHE", "PRO", "SER", "THR", "TRP", "TYR", "VAL", "UNK",
        ] {
            assert!(RESIDUE_PROPERTIES.contains_key(name), "{name}");
        }
    }

    #[test]
    fn leucine_is_apolar_and_lysine_is_not() {
        assert_eq!(apolarity(ResidueType::Leu), 1.0);
        assert_eq!(apolarity(ResidueType::Lys), 0.0);
        assert_eq!(hydrophobicity(ResidueType::Arg), -12.3);
    }

    #[test]
    fn low_resolution_apolarity_is_bounded() {
        assert!(low_resolution_apolarity(ResidueType::Arg).abs() < 1e-12);
        let phe = low_resolution_apolarity(ResidueType::Phe);
        assert!((phe - 1.0).abs() < 1e-12);
        assert!(normalized_hydrophobicity(ResidueType::Arg) == -1.0);
    }
}
