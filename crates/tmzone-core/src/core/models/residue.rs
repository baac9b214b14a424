use super::ids::AtomId;
use super::region::SeqPosition;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Ratio of outward facing to total accessible surface below which a residue is
/// considered to point into a barrel pore.
const INSIDE_SURFACE_RATIO: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResidueType {
    Ala,
    Arg,
    Asn,
    Asp,
    Cys,
    Gln,
    Glu,
    Gly,
    His,
    Ile,
    Leu,
    Lys,
    Met,
    Phe,
    Pro,
    Ser,
    Thr,
    Trp,
    Tyr,
    Val,
    #[default]
    Unknown,
}

#[derive(Debug, Error)]
#[error("Invalid residue type string: {0}")]
pub struct ParseResidueTypeError(String);

impl ResidueType {
    pub fn to_three_letter(&self) -> &'static str {
        match self {
            ResidueType::Ala => "ALA",
            ResidueType::Arg => "ARG",
            ResidueType::Asn => "ASN",
            ResidueType::Asp => "ASP",
            ResidueType::Cys => "CYS",
            ResidueType::Gln => "GLN",
            ResidueType::Glu => "GLU",
            ResidueType::Gly => "GLY",
            ResidueType::His => "HIS",
            ResidueType::Ile => "ILE",
            ResidueType::Leu => "LEU",
            ResidueType::Lys => "LYS",
            ResidueType::Met => "MET",
            ResidueType::Phe => "PHE",
            ResidueType::Pro => "PRO",
            ResidueType::Ser => "SER",
            ResidueType::Thr => "THR",
            ResidueType::Trp => "TRP",
            ResidueType::Tyr => "TYR",
            ResidueType::Val => "VAL",
            ResidueType::Unknown => "UNK",
        }
    }

    /// Maps a residue name to its type, falling back to [`ResidueType::Unknown`] for
    /// anything that is not one of the twenty standard amino acids.
    pub fn from_name_lossy(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl FromStr for ResidueType {
    type Err = ParseResidueTypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ALA" => Ok(ResidueType::Ala),
            "ARG" => Ok(ResidueType::Arg),
            "ASN" => Ok(ResidueType::Asn),
            "ASP" => Ok(ResidueType::Asp),
            "CYS" => Ok(ResidueType::Cys),
            "GLN" => Ok(ResidueType::Gln),
            "GLU" => Ok(ResidueType::Glu),
            "GLY" => Ok(ResidueType::Gly),
            "HIS" | "HSE" | "HSD" | "HSP" => Ok(ResidueType::His),
            "ILE" => Ok(ResidueType::Ile),
            "LEU" => Ok(ResidueType::Leu),
            "LYS" => Ok(ResidueType::Lys),
            "MET" | "MSE" => Ok(ResidueType::Met),
            "PHE" => Ok(ResidueType::Phe),
            "PRO" => Ok(ResidueType::Pro),
            "SER" => Ok(ResidueType::Ser),
            "THR" => Ok(ResidueType::Thr),
            "TRP" => Ok(ResidueType::Trp),
            "TYR" => Ok(ResidueType::Tyr),
            "VAL" => Ok(ResidueType::Val),
            "UNK" => Ok(ResidueType::Unknown),
            _ => Err(ParseResidueTypeError(s.to_string())),
        }
    }
}

impl fmt::Display for ResidueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_three_letter())
    }
}

/// Secondary structure class of a residue, as assigned by a DSSP-like provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SecStructure {
    AlphaHelix,
    ThreeTenHelix,
    PiHelix,
    Strand,
    Bridge,
    Turn,
    Bend,
    #[default]
    Coil,
}

impl SecStructure {
    pub fn from_code(code: char) -> Self {
        match code {
            'H' => SecStructure::AlphaHelix,
            'G' => SecStructure::ThreeTenHelix,
            'I' => SecStructure::PiHelix,
            'E' => SecStructure::Strand,
            'B' => SecStructure::Bridge,
            'T' => SecStructure::Turn,
            'S' => SecStructure::Bend,
            _ => SecStructure::Coil,
        }
    }

    pub fn code(&self) -> char {
        match self {
            SecStructure::AlphaHelix => 'H',
            SecStructure::ThreeTenHelix => 'G',
            SecStructure::PiHelix => 'I',
            SecStructure::Strand => 'E',
            SecStructure::Bridge => 'B',
            SecStructure::Turn => 'T',
            SecStructure::Bend => 'S',
            SecStructure::Coil => '-',
        }
    }

    pub fn is_alpha(&self) -> bool {
        matches!(
            self,
            SecStructure::AlphaHelix | SecStructure::ThreeTenHelix | SecStructure::PiHelix
        )
    }

    pub fn is_beta(&self) -> bool {
        matches!(self, SecStructure::Strand)
    }

    pub fn is_turn(&self) -> bool {
        matches!(
            self,
            SecStructure::Turn | SecStructure::Bridge | SecStructure::Bend
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Residue {
    pub auth_id: i32,                       // Author residue number
    pub auth_icode: char,                   // Insertion code, ' ' when absent
    pub label_id: i32,                      // Sequence (label) residue number
    pub name: String,                       // Residue name as found in the structure
    pub residue_type: ResidueType,          // Parsed standard amino acid type
    pub selected: bool,                     // Participates in placement and annotation
    pub sec_structure: SecStructure,        // Secondary structure class
    pub surface: f64,                       // Accessible surface of the whole residue
    pub out_surface: f64,                   // Outward facing accessible surface
    pub(crate) atoms: Vec<AtomId>,          // Atoms of this residue in input order
    atom_name_map: HashMap<String, AtomId>, // Atom name lookup
}

impl Residue {
    pub(crate) fn new(auth_id: i32, auth_icode: char, label_id: i32, name: &str) -> Self {
        let name = name.trim().to_uppercase();
        Self {
            auth_id,
            auth_icode,
            label_id,
            residue_type: ResidueType::from_name_lossy(&name),
            name,
            selected: true,
            sec_structure: SecStructure::Coil,
            surface: 0.0,
            out_surface: 0.0,
            atoms: Vec::new(),
            atom_name_map: HashMap::new(),
        }
    }

    pub(crate) fn add_atom(&mut self, atom_name: &str, atom_id: AtomId) {
        self.atoms.push(atom_id);
        self.atom_name_map
            .entry(atom_name.trim().to_string())
            .or_insert(atom_id);
    }

    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }

    pub fn atom_id_by_name(&self, name: &str) -> Option<AtomId> {
        self.atom_name_map.get(name).copied()
    }

    /// Returns the atom standing in for the alpha carbon: CA, or the nearest backbone
    /// substitute when CA is missing.
    pub fn representative_atom(&self) -> Option<AtomId> {
        ["CA", "CB", "C", "N"]
            .iter()
            .find_map(|name| self.atom_id_by_name(name))
    }

    /// Returns `true` when the residue points into a barrel pore.
    pub fn is_inside(&self) -> bool {
        self.out_surface / (self.surface + 0.1) < INSIDE_SURFACE_RATIO
    }

    pub fn position(&self) -> SeqPosition {
        SeqPosition {
            auth_id: self.auth_id,
            auth_icode: self.auth_icode,
            label_id: self.label_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn dummy_atom_id(n: u64) -> AtomId {
        AtomId::from(KeyData::from_ffi(n))
    }

    #[test]
    fn residue_type_parses_standard_and_variant_names() {
        assert_eq!("leu".parse::<ResidueType>().unwrap(), ResidueType::Leu);
        assert_eq!("HSP".parse::<ResidueType>().unwrap(), ResidueType::His);
        assert_eq!("MSE".parse::<ResidueType>().unwrap(), ResidueType::Met);
        assert!("HOH".parse::<ResidueType>().is_err());
        assert_eq!(ResidueType::from_name_lossy("HOH"), ResidueType::Unknown);
    }

    #[test]
    fn sec_structure_codes_map_to_classes() {
        assert!(SecStructure::from_code('G').is_alpha());
        assert!(SecStructure::from_code('E').is_beta());
        assert!(SecStructure::from_code('S').is_turn());
        assert_eq!(SecStructure::from_code('x'), SecStructure::Coil);
        assert_eq!(SecStructure::from_code('I').code(), 'I');
    }

    #[test]
    fn representative_atom_falls_back_when_ca_is_missing() {
        let mut residue = Residue::new(5, ' ', 5, "ALA");
        residue.add_atom("N", dummy_atom_id(1));
        residue.add_atom("CB", dummy_atom_id(2));
        assert_eq!(residue.representative_atom(), Some(dummy_atom_id(2)));

        residue.add_atom("CA", dummy_atom_id(3));
        assert_eq!(residue.representative_atom(), Some(dummy_atom_id(3)));
    }

    #[test]
    fn residue_with_mostly_buried_outer_surface_is_inside() {
        let mut residue = Residue::new(1, ' ', 1, "PHE");
        residue.surface = 100.0;
        residue.out_surface = 20.0;
        assert!(residue.is_inside());
        residue.out_surface = 90.0;
        assert!(!residue.is_inside());
    }

    #[test]
    fn position_carries_author_and_label_numbering() {
        let residue = Residue::new(12, 'A', 30, "GLY");
        let position = residue.position();
        assert_eq!(position.auth_id, 12);
        assert_eq!(position.auth_icode, 'A');
        assert_eq!(position.label_id, 30);
    }
}
