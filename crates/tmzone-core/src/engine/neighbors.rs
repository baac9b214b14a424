use crate::core::models::ids::ResidueIndex;
use crate::core::models::protein::Protein;
use crate::core::models::residue::Residue;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Point3;

/// Spatial index over residue alpha carbons.
pub struct NeighborIndex {
    tree: KdTree<f64, 3>,
    residues: Vec<ResidueIndex>,
}

impl NeighborIndex {
    pub fn new(points: &[(ResidueIndex, Point3<f64>)]) -> Self {
        let positions: Vec<[f64; 3]> = points.iter().map(|(_, p)| [p.x, p.y, p.z]).collect();
        Self {
            tree: (&positions).into(),
            residues: points.iter().map(|(index, _)| *index).collect(),
        }
    }

    /// Indexes the CA (or substitute) of every selected residue accepted by `filter`.
    pub fn build(protein: &Protein, filter: impl Fn(ResidueIndex, &Residue) -> bool) -> Self {
        let points: Vec<(ResidueIndex, Point3<f64>)> = protein
            .selected_residues()
            .filter(|(index, residue)| filter(*index, residue))
            .filter_map(|(index, _)| protein.ca_position(index).map(|p| (index, p)))
            .collect();
        Self::new(&points)
    }

    pub fn len(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    /// Residues within `radius` Å of `point`, in sequence order.
    pub fn within(&self, point: &Point3<f64>, radius: f64) -> Vec<ResidueIndex> {
        if self.is_empty() {
            return Vec::new();
        }
        let query = [point.x, point.y, point.z];
        let mut found: Vec<ResidueIndex> = self
            .tree
            .within_unsorted::<SquaredEuclidean>(&query, radius * radius)
            .into_iter()
            .filter_map(|neighbour| self.residues.get(neighbour.item as usize).copied())
            .collect();
        found.sort_unstable();
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::protein::tests::{push_chain, rod};
    use crate::core::models::residue::SecStructure;

    #[test]
    fn within_returns_residues_in_sequence_order() {
        let mut protein = Protein::new("nb");
        push_chain(&mut protein, "A", &rod(0.0, 0.0, 0.0, 3.8, 5), |_| "ALA", SecStructure::Coil);
        push_chain(&mut protein, "B", &rod(4.5, 0.0, 0.0, 3.8, 5), |_| "ALA", SecStructure::Coil);
        let index = NeighborIndex::build(&protein, |_, _| true);
        assert_eq!(index.len(), 10);

        let found = index.within(&Point3::new(0.0, 0.0, 3.8), 5.0);
        assert_eq!(
            found,
            vec![
                ResidueIndex::new(0, 0),
                ResidueIndex::new(0, 1),
                ResidueIndex::new(0, 2),
                ResidueIndex::new(1, 1),
            ]
        );
    }

    #[test]
    fn filter_and_empty_index() {
        let mut protein = Protein::new("nb");
        push_chain(&mut protein, "A", &rod(0.0, 0.0, 0.0, 3.8, 4), |_| "ALA", SecStructure::Coil);
        let index = NeighborIndex::build(&protein, |i, _| i.chain == 1);
        assert!(index.is_empty());
        assert!(index.within(&Point3::origin(), 10.0).is_empty());
    }
}
