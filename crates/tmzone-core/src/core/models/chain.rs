use super::region::Region;
use super::residue::Residue;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChainType {
    Alpha,
    Beta,
    NonTm,
    LowRes,
    #[default]
    Unknown,
    NotSelected,
}

#[derive(Debug, Error)]
#[error("Invalid chain type string")]
pub struct ParseChainTypeError;

impl FromStr for ChainType {
    type Err = ParseChainTypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "alpha" => Ok(ChainType::Alpha),
            "beta" => Ok(ChainType::Beta),
            "non_tm" => Ok(ChainType::NonTm),
            "low_res" => Ok(ChainType::LowRes),
            "unknown" => Ok(ChainType::Unknown),
            "not_selected" => Ok(ChainType::NotSelected),
            _ => Err(ParseChainTypeError),
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ChainType::Alpha => "alpha",
                ChainType::Beta => "beta",
                ChainType::NonTm => "non_tm",
                ChainType::LowRes => "low_res",
                ChainType::Unknown => "unknown",
                ChainType::NotSelected => "not_selected",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub id: String,                        // Chain identifier (e.g. "A")
    pub index: usize,                      // Position of the chain inside the protein
    pub selected: bool,                    // Participates in placement and annotation
    pub chain_type: ChainType,             // Dominant membrane topology of the chain
    pub numtm: usize,                      // Number of stored transmembrane regions
    pub signal_peptide: Option<Region>,    // Upstream detected signal peptide, if any
    pub(crate) residues: Vec<Residue>,     // Residues in sequence order
    pub(crate) regions: Vec<Region>,       // Finalized annotation
}

impl Chain {
    pub(crate) fn new(id: &str, index: usize) -> Self {
        Self {
            id: id.to_string(),
            index,
            selected: true,
            chain_type: ChainType::Unknown,
            numtm: 0,
            signal_peptide: None,
            residues: Vec::new(),
            regions: Vec::new(),
        }
    }

    pub fn residues(&self) -> &[Residue] {
        &self.residues
    }

    pub fn residues_mut(&mut self) -> &mut [Residue] {
        &mut self.residues
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    pub fn selected_residue_count(&self) -> usize {
        self.residues.iter().filter(|r| r.selected).count()
    }

    /// Sequence distance between two residues measured in label numbering.
    ///
    /// Returns `0` when either index is out of range. Two residues are contiguous when
    /// the distance is exactly `1`; a larger value marks a gap in the model.
    pub fn order_distance(&self, first: usize, second: usize) -> i32 {
        match (self.residues.get(first), self.residues.get(second)) {
            (Some(a), Some(b)) => b.label_id - a.label_id,
            _ => 0,
        }
    }

    pub(crate) fn clear_annotation(&mut self) {
        self.regions.clear();
        self.numtm = 0;
    }
}
