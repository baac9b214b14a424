use serde::Serialize;
use std::fmt;

/// Classification of a residue or a run of residues relative to the membrane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionType {
    /// Inside the membrane slab but not (yet) explained by any structural element.
    Membrane,
    /// Transmembrane alpha helix.
    Helix,
    /// Transmembrane beta strand.
    Beta,
    /// Above the (upper) membrane.
    Side1,
    /// Below the (lower) membrane.
    Side2,
    /// Re-entrant membrane loop formed by one helix.
    Loop,
    /// Re-entrant membrane loop formed by two helices.
    TwoHelixLoop,
    /// Helix lying on the membrane surface.
    InterfacialHelix,
    /// Within the membrane slab, but inside a beta barrel pore.
    MembraneInside,
    /// Between the two membranes of a double-membrane placement.
    Intermembrane,
    Inside,
    Outside,
    Periplasm,
    /// Cleaved signal peptide.
    Signal,
    ErrorFP,
    ErrorFN,
    Unknown,
}

impl RegionType {
    pub fn code(&self) -> char {
        match self {
            RegionType::Membrane => 'M',
            RegionType::Helix => 'H',
            RegionType::Beta => 'B',
            RegionType::Side1 => '1',
            RegionType::Side2 => '2',
            RegionType::Loop => 'L',
            RegionType::TwoHelixLoop => 'l',
            RegionType::InterfacialHelix => 'F',
            RegionType::MembraneInside => 'N',
            RegionType::Intermembrane => '3',
            RegionType::Inside => 'I',
            RegionType::Outside => 'O',
            RegionType::Periplasm => 'E',
            RegionType::Signal => 'S',
            RegionType::ErrorFP => 'X',
            RegionType::ErrorFN => 'Y',
            RegionType::Unknown => 'U',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        let region_type = match code {
            'M' => RegionType::Membrane,
            'H' => RegionType::Helix,
            'B' => RegionType::Beta,
            '1' => RegionType::Side1,
            '2' => RegionType::Side2,
            'L' => RegionType::Loop,
            'l' => RegionType::TwoHelixLoop,
            'F' => RegionType::InterfacialHelix,
            'N' => RegionType::MembraneInside,
            '3' => RegionType::Intermembrane,
            'I' => RegionType::Inside,
            'O' => RegionType::Outside,
            'E' => RegionType::Periplasm,
            'S' => RegionType::Signal,
            'X' => RegionType::ErrorFP,
            'Y' => RegionType::ErrorFN,
            'U' => RegionType::Unknown,
            _ => return None,
        };
        Some(region_type)
    }

    pub fn is_alpha(&self) -> bool {
        matches!(
            self,
            RegionType::Helix | RegionType::Loop | RegionType::TwoHelixLoop
        )
    }

    pub fn is_beta(&self) -> bool {
        matches!(self, RegionType::Beta)
    }

    pub fn is_annotated_transmembrane(&self) -> bool {
        matches!(self, RegionType::Helix | RegionType::Beta)
    }

    pub fn is_annotated_membrane(&self) -> bool {
        matches!(
            self,
            RegionType::Helix
                | RegionType::Beta
                | RegionType::Loop
                | RegionType::TwoHelixLoop
                | RegionType::MembraneInside
        )
    }

    pub fn is_not_annotated_membrane(&self) -> bool {
        matches!(self, RegionType::Membrane)
    }

    pub fn is_membrane_inside(&self) -> bool {
        matches!(self, RegionType::MembraneInside)
    }

    pub fn is_not_membrane(&self) -> bool {
        matches!(
            self,
            RegionType::Side1
                | RegionType::Side2
                | RegionType::Intermembrane
                | RegionType::Inside
                | RegionType::Outside
                | RegionType::Periplasm
        )
    }
}

impl fmt::Display for RegionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Sequence identity of a residue as reported to downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SeqPosition {
    pub auth_id: i32,
    pub auth_icode: char,
    pub label_id: i32,
}

/// A finalized, immutable run of residues sharing one [`RegionType`].
///
/// `begin_index` and `end_index` are inclusive sequence indices into the owning chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub begin: SeqPosition,
    pub end: SeqPosition,
    pub begin_index: usize,
    pub end_index: usize,
    pub region_type: RegionType,
}

impl Region {
    pub fn len(&self) -> usize {
        self.end_index + 1 - self.begin_index
    }

    pub fn is_empty(&self) -> bool {
        self.end_index < self.begin_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RegionType; 17] = [
        RegionType::Membrane,
        RegionType::Helix,
        RegionType::Beta,
        RegionType::Side1,
        RegionType::Side2,
        RegionType::Loop,
        RegionType::TwoHelixLoop,
        RegionType::InterfacialHelix,
        RegionType::MembraneInside,
        RegionType::Intermembrane,
        RegionType::Inside,
        RegionType::Outside,
        RegionType::Periplasm,
        RegionType::Signal,
        RegionType::ErrorFP,
        RegionType::ErrorFN,
        RegionType::Unknown,
    ];

    #[test]
    fn codes_are_unique() {
        let mut codes: Vec<char> = ALL.iter().map(|t| t.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ALL.len());
        assert_eq!(RegionType::from_code('N'), Some(RegionType::MembraneInside));
        assert_eq!(RegionType::from_code('?'), None);
    }

    #[test]
    fn membrane_predicates_do_not_overlap() {
        for t in ALL {
            let classes = [
                t.is_annotated_membrane(),
                t.is_not_annotated_membrane(),
                t.is_not_membrane(),
            ];
            assert!(classes.iter().filter(|&&c| c).count() <= 1, "{t:?}");
        }
    }

    #[test]
    fn transmembrane_types_are_annotated_membrane() {
        for t in ALL.iter().filter(|t| t.is_annotated_transmembrane()) {
            assert!(t.is_annotated_membrane());
        }
        assert!(RegionType::TwoHelixLoop.is_alpha());
        assert!(!RegionType::InterfacialHelix.is_alpha());
    }

    #[test]
    fn region_length_is_inclusive() {
        let position = SeqPosition {
            auth_id: 1,
            auth_icode: ' ',
            label_id: 1,
        };
        let region = Region {
            begin: position,
            end: position,
            begin_index: 4,
            end_index: 9,
            region_type: RegionType::Helix,
        };
        assert_eq!(region.len(), 6);
        assert!(!region.is_empty());
    }
}
