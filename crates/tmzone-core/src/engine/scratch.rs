use crate::core::models::ids::ResidueIndex;
use crate::core::models::protein::Protein;
use crate::core::models::region::RegionType;

/// Selects which of the three per-residue classifications a pass reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKey {
    /// Classification against the real membrane geometry, refined by annotation.
    Type,
    /// Baseline side classification against zero-thickness membranes.
    ZType,
    /// Classification against the thin membrane core.
    TType,
}

/// Working state of one residue during an annotation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResidueScratch {
    /// Signed offset from the local membrane centre; set once, by the first pass.
    pub z: Option<f64>,
    /// Distance from the closest membrane surface, from the last pass.
    pub hz: Option<f64>,
    pub region_type: Option<RegionType>,
    pub ztype: Option<RegionType>,
    pub ttype: Option<RegionType>,
    /// Windowed change of `z` along the chain.
    pub direction: Option<f64>,
    /// Sheet the residue belongs to during barrel detection.
    pub sheet: Option<usize>,
}

impl ResidueScratch {
    pub fn get(&self, key: TypeKey) -> Option<RegionType> {
        match key {
            TypeKey::Type => self.region_type,
            TypeKey::ZType => self.ztype,
            TypeKey::TType => self.ttype,
        }
    }

    pub fn set(&mut self, key: TypeKey, value: RegionType) {
        *self.slot_mut(key) = Some(value);
    }

    /// Sets `key` only if it has no value yet.
    pub fn set_if_unset(&mut self, key: TypeKey, value: RegionType) {
        self.slot_mut(key).get_or_insert(value);
    }

    fn slot_mut(&mut self, key: TypeKey) -> &mut Option<RegionType> {
        match key {
            TypeKey::Type => &mut self.region_type,
            TypeKey::ZType => &mut self.ztype,
            TypeKey::TType => &mut self.ttype,
        }
    }

    pub fn z_or_zero(&self) -> f64 {
        self.z.unwrap_or(0.0)
    }

    pub fn hz_or_zero(&self) -> f64 {
        self.hz.unwrap_or(0.0)
    }
}

/// Per-residue scratch for every chain of a protein, indexed like the chains.
#[derive(Debug, Clone, Default)]
pub struct Scratch {
    chains: Vec<Vec<ResidueScratch>>,
}

impl Scratch {
    pub fn for_protein(protein: &Protein) -> Self {
        Self {
            chains: protein
                .chains()
                .iter()
                .map(|chain| vec![ResidueScratch::default(); chain.len()])
                .collect(),
        }
    }

    pub fn chain(&self, chain: usize) -> &[ResidueScratch] {
        &self.chains[chain]
    }

    pub fn chain_mut(&mut self, chain: usize) -> &mut [ResidueScratch] {
        &mut self.chains[chain]
    }

    pub fn get(&self, index: ResidueIndex) -> Option<&ResidueScratch> {
        self.chains.get(index.chain)?.get(index.residue)
    }

    pub fn get_mut(&mut self, index: ResidueIndex) -> Option<&mut ResidueScratch> {
        self.chains.get_mut(index.chain)?.get_mut(index.residue)
    }
}
