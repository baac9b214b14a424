use super::atom::Atom;
use super::chain::{Chain, ChainType};
use super::ids::{AtomId, ResidueIndex};
use super::membrane::Membrane;
use super::residue::Residue;
use super::sec_str_vec::SecStrVec;
use nalgebra::{Isometry3, Point3, Vector3};
use serde::Serialize;
use slotmap::SlotMap;
use std::collections::HashMap;

/// Overall membrane topology class of a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProteinType {
    TmAlpha,
    TmBeta,
    TmMixed,
    #[default]
    Soluble,
    /// Transmembrane structure built from alpha carbons only.
    CaTm,
    /// Globular structure built from alpha carbons only.
    CaGlobular,
}

impl ProteinType {
    pub fn is_transmembrane(&self) -> bool {
        matches!(
            self,
            ProteinType::TmAlpha | ProteinType::TmBeta | ProteinType::TmMixed | ProteinType::CaTm
        )
    }
}

/// A complete protein structure together with its membrane placement.
///
/// The protein owns all chains (in input order), all atoms (in a slot map arena) and the
/// secondary structure vectors. Residues are addressed through [`ResidueIndex`], atoms
/// through [`AtomId`].
#[derive(Debug, Clone, Default)]
pub struct Protein {
    /// Identifier of the structure (e.g. a PDB code).
    pub code: String,
    /// Primary storage for atoms.
    atoms: SlotMap<AtomId, Atom>,
    /// Chains in input order.
    chains: Vec<Chain>,
    /// Lookup map from chain identifier to chain index.
    chain_index_map: HashMap<String, usize>,
    /// Directional summaries of helices and strands.
    pub sec_str_vecs: Vec<SecStrVec>,
    /// Zero, one or two membranes in the canonical frame.
    pub membranes: Vec<Membrane>,
    /// Best fitness score of the membrane placement.
    pub q_value: f64,
    /// Whether the structure was found to be transmembrane.
    pub tmp: bool,
    pub protein_type: ProteinType,
    /// Transformation that moved the input coordinates into the canonical frame.
    pub transformation: Option<Isometry3<f64>>,
}

impl Protein {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            ..Self::default()
        }
    }

    /// Adds a chain, or returns the index of the existing chain with the same identifier.
    pub fn add_chain(&mut self, id: &str) -> usize {
        if let Some(&index) = self.chain_index_map.get(id) {
            return index;
        }
        let index = self.chains.len();
        self.chains.push(Chain::new(id, index));
        self.chain_index_map.insert(id.to_string(), index);
        index
    }

    /// Appends a residue to the end of a chain.
    ///
    /// # Arguments
    ///
    /// * `chain` - Index of the owning chain.
    /// * `auth_id` - Author residue number.
    /// * `auth_icode` - Insertion code (`' '` when absent).
    /// * `label_id` - Sequence numbering used to detect gaps.
    /// * `name` - Residue name.
    ///
    /// # Return
    ///
    /// Returns the index of the new residue, or `None` if the chain does not exist.
    pub fn add_residue(
        &mut self,
        chain: usize,
        auth_id: i32,
        auth_icode: char,
        label_id: i32,
        name: &str,
    ) -> Option<ResidueIndex> {
        let chain_ref = self.chains.get_mut(chain)?;
        let residue = chain_ref.residues.len();
        chain_ref
            .residues
            .push(Residue::new(auth_id, auth_icode, label_id, name));
        Some(ResidueIndex::new(chain, residue))
    }

    /// Stores an atom and registers it with the residue it names.
    ///
    /// # Return
    ///
    /// Returns the new atom's ID, or `None` if the atom's residue does not exist.
    pub fn add_atom(&mut self, atom: Atom) -> Option<AtomId> {
        let index = atom.residue;
        self.residue(index)?;
        let name = atom.name.clone();
        let atom_id = self.atoms.insert(atom);
        if let Some(residue) = self.residue_mut(index) {
            residue.add_atom(&name, atom_id);
        }
        Some(atom_id)
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    pub fn atom_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(id)
    }

    pub fn atoms_iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atoms.iter()
    }

    pub fn chain(&self, index: usize) -> Option<&Chain> {
        self.chains.get(index)
    }

    pub fn chain_mut(&mut self, index: usize) -> Option<&mut Chain> {
        self.chains.get_mut(index)
    }

    pub fn chain_by_id(&self, id: &str) -> Option<&Chain> {
        self.chain_index_map.get(id).map(|&i| &self.chains[i])
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn chains_mut(&mut self) -> &mut [Chain] {
        &mut self.chains
    }

    pub fn selected_chains(&self) -> impl Iterator<Item = &Chain> {
        self.chains.iter().filter(|c| c.selected)
    }

    pub fn residue(&self, index: ResidueIndex) -> Option<&Residue> {
        self.chains.get(index.chain)?.residues.get(index.residue)
    }

    pub fn residue_mut(&mut self, index: ResidueIndex) -> Option<&mut Residue> {
        self.chains
            .get_mut(index.chain)?
            .residues
            .get_mut(index.residue)
    }

    /// Iterates over every selected residue of every selected chain in sequence order.
    pub fn selected_residues(&self) -> impl Iterator<Item = (ResidueIndex, &Residue)> {
        self.chains
            .iter()
            .enumerate()
            .filter(|(_, chain)| chain.selected)
            .flat_map(|(c, chain)| {
                chain
                    .residues
                    .iter()
                    .enumerate()
                    .filter(|(_, residue)| residue.selected)
                    .map(move |(r, residue)| (ResidueIndex::new(c, r), residue))
            })
    }

    /// Returns the position of the residue's alpha carbon, or of its nearest backbone
    /// substitute.
    pub fn ca_position(&self, index: ResidueIndex) -> Option<Point3<f64>> {
        let residue = self.residue(index)?;
        let atom_id = residue.representative_atom()?;
        self.atom(atom_id).map(|atom| atom.position)
    }

    /// Geometric centre of all atoms of the selected residues.
    pub fn centre(&self) -> Option<Point3<f64>> {
        let mut sum = Vector3::zeros();
        let mut count = 0usize;
        for (_, residue) in self.selected_residues() {
            for atom in residue.atoms.iter().filter_map(|&id| self.atom(id)) {
                sum += atom.position.coords;
                count += 1;
            }
        }
        (count > 0).then(|| Point3::from(sum / count as f64))
    }

    /// Moves every atom and secondary structure vector by `isometry`, accumulating it in
    /// [`Protein::transformation`].
    pub fn transform(&mut self, isometry: &Isometry3<f64>) {
        for (_, atom) in self.atoms.iter_mut() {
            atom.position = isometry * atom.position;
        }
        for vector in &mut self.sec_str_vecs {
            vector.begin = isometry * vector.begin;
            vector.end = isometry * vector.end;
        }
        self.transformation = Some(match self.transformation {
            Some(previous) => isometry * previous,
            None => *isometry,
        });
    }

    /// Marks the structure as not transmembrane and drops every membrane dependent result.
    pub fn set_non_transmembrane(&mut self) {
        self.membranes.clear();
        self.tmp = false;
        self.protein_type = ProteinType::Soluble;
        for chain in self.chains.iter_mut() {
            chain.clear_annotation();
            if chain.selected {
                chain.chain_type = ChainType::NonTm;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::models::residue::SecStructure;
    use nalgebra::Vector3;

    /// Builds a chain of CA + CB residues, one per CA position, with the given residue
    /// names and secondary structure and uniform outer surface.
    pub(crate) fn push_chain(
        protein: &mut Protein,
        id: &str,
        positions: &[Point3<f64>],
        name: impl Fn(usize) -> &'static str,
        ss: SecStructure,
    ) -> usize {
        let chain = protein.add_chain(id);
        for (i, position) in positions.iter().enumerate() {
            let index = protein
                .add_residue(chain, i as i32 + 1, ' ', i as i32 + 1, name(i))
                .unwrap();
            {
                let residue = protein.residue_mut(index).unwrap();
                residue.sec_structure = ss;
                residue.surface = 40.0;
                residue.out_surface = 40.0;
            }
            protein
                .add_atom(Atom::new("CA", index, *position).with_surface(20.0, 20.0))
                .unwrap();
            protein
                .add_atom(
                    Atom::new("CB", index, position + Vector3::new(0.8, 0.6, 0.0))
                        .with_surface(20.0, 20.0),
                )
                .unwrap();
        }
        chain
    }

    /// Positions of a straight rod along z, starting at `z0` with the given rise.
    pub(crate) fn rod(x: f64, y: f64, z0: f64, rise: f64, n: usize) -> Vec<Point3<f64>> {
        (0..n)
            .map(|i| Point3::new(x, y, z0 + rise * i as f64))
            .collect()
    }

    #[test]
    fn add_chain_is_idempotent() {
        let mut protein = Protein::new("1abc");
        let a = protein.add_chain("A");
        let b = protein.add_chain("B");
        assert_eq!(protein.add_chain("A"), a);
        assert_ne!(a, b);
        assert_eq!(protein.chains().len(), 2);
        assert_eq!(protein.chain_by_id("B").unwrap().index, b);
    }

    #[test]
    fn add_residue_and_atom_link_together() {
        let mut protein = Protein::new("1abc");
        let chain = protein.add_chain("A");
        let index = protein.add_residue(chain, 10, ' ', 1, "LEU").unwrap();
        let atom_id = protein
            .add_atom(Atom::new("CA", index, Point3::new(1.0, 2.0, 3.0)))
            .unwrap();

        let residue = protein.residue(index).unwrap();
        assert_eq!(residue.atoms(), &[atom_id]);
        assert_eq!(protein.ca_position(index), Some(Point3::new(1.0, 2.0, 3.0)));
    }

    #[test]
    fn add_residue_and_atom_reject_missing_owners() {
        let mut protein = Protein::new("1abc");
        assert!(protein.add_residue(3, 1, ' ', 1, "ALA").is_none());
        let orphan = Atom::new("CA", ResidueIndex::new(0, 0), Point3::origin());
        assert!(protein.add_atom(orphan).is_none());
    }

    #[test]
    fn centre_ignores_unselected_chains() {
        let mut protein = Protein::new("1abc");
        push_chain(
            &mut protein,
            "A",
            &rod(0.0, 0.0, -1.0, 2.0, 2),
            |_| "ALA",
            SecStructure::Coil,
        );
        let b = push_chain(
            &mut protein,
            "B",
            &rod(100.0, 0.0, 0.0, 1.0, 3),
            |_| "ALA",
            SecStructure::Coil,
        );
        protein.chain_mut(b).unwrap().selected = false;

        let centre = protein.centre().unwrap();
        assert!((centre.x - 0.4).abs() < 1e-9);
        assert!((centre.y - 0.3).abs() < 1e-9);
        assert!(centre.z.abs() < 1e-9);
    }

    #[test]
    fn transform_moves_atoms_and_vectors_and_accumulates() {
        let mut protein = Protein::new("1abc");
        let chain = push_chain(
            &mut protein,
            "A",
            &rod(0.0, 0.0, 0.0, 1.0, 2),
            |_| "ALA",
            SecStructure::Coil,
        );
        protein.sec_str_vecs.push(SecStrVec::new(
            crate::core::models::sec_str_vec::VectorKind::Alpha,
            Point3::origin(),
            Point3::new(0.0, 0.0, 1.0),
            chain,
            0,
            1,
        ));
        let shift = Isometry3::translation(0.0, 0.0, 5.0);
        protein.transform(&shift);
        protein.transform(&shift);

        let ca = protein.ca_position(ResidueIndex::new(chain, 0)).unwrap();
        assert_eq!(ca, Point3::new(0.0, 0.0, 10.0));
        assert_eq!(protein.sec_str_vecs[0].end, Point3::new(0.0, 0.0, 11.0));
        let total = protein.transformation.unwrap();
        assert_eq!(total.translation.vector, Vector3::new(0.0, 0.0, 10.0));
    }

    #[test]
    fn set_non_transmembrane_clears_results() {
        let mut protein = Protein::new("1abc");
        push_chain(
            &mut protein,
            "A",
            &rod(0.0, 0.0, 0.0, 1.0, 2),
            |_| "ALA",
            SecStructure::Coil,
        );
        protein.membranes.push(Membrane::plane(0.0, 15.0));
        protein.tmp = true;
        protein.protein_type = ProteinType::TmAlpha;
        protein.chains_mut()[0].numtm = 3;

        protein.set_non_transmembrane();

        assert!(protein.membranes.is_empty());
        assert!(!protein.tmp);
        assert_eq!(protein.protein_type, ProteinType::Soluble);
        assert_eq!(protein.chains()[0].chain_type, ChainType::NonTm);
        assert_eq!(protein.chains()[0].numtm, 0);
    }
}
