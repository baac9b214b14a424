use super::config::BetaConfig;
use super::neighbors::NeighborIndex;
use super::region_handler::{self, RegionHandler};
use super::scratch::{Scratch, TypeKey};
use super::side_detector::MembraneGeometry;
use crate::core::models::ids::ResidueIndex;
use crate::core::models::protein::Protein;
use crate::core::models::region::RegionType;
use crate::core::models::sec_str_vec::VectorKind;
use crate::core::utils::geometry::{angle_between_degrees, angle_to_plane_degrees};
use itertools::Itertools;
use nalgebra::Vector3;
use std::collections::HashMap;
use std::ops::Range;
use tracing::{debug, info, instrument};

const SMALL_BARREL_SHEETS: usize = 8;
const SHORT_STRAND: usize = 3;
const STRICT_CONTACTS: usize = 3;
const CONTACT_SHARE: f64 = 0.2;
const INSIDE_GAP: usize = 10;

/// A membrane-crossing strand taking part in barrel detection.
#[derive(Debug, Clone, PartialEq)]
struct Sheet {
    vector: usize,
    chain: usize,
    residues: Range<usize>,
}

/// Sheet-to-sheet contact counts and the sheets each residue touches.
#[derive(Debug, Clone, Default)]
struct Contacts {
    matrix: Vec<Vec<usize>>,
    residues: HashMap<ResidueIndex, Vec<usize>>,
}

/// Groups the membrane strands of `chains` into barrels and annotates their residues.
///
/// Returns the number of barrels found. Nothing changes when fewer than
/// `min_candidate_sheets` strands cross the membrane over all of `chains` together.
#[instrument(skip_all, name = "beta_annotation")]
pub fn annotate_barrels(
    protein: &mut Protein,
    scratch: &mut Scratch,
    chains: &[usize],
    config: &BetaConfig,
) -> usize {
    let sheets = sheets(protein, scratch, chains, config);
    if sheets.len() < config.min_candidate_sheets {
        debug!(sheets = sheets.len(), "Too few candidate sheets for a barrel.");
        return 0;
    }
    for (s, sheet) in sheets.iter().enumerate() {
        protein.sec_str_vecs[sheet.vector].sheet = Some(s);
        for residue in &mut scratch.chain_mut(sheet.chain)[sheet.residues.clone()] {
            if residue.region_type.is_some_and(is_membrane_type) {
                residue.sheet.get_or_insert(s);
            }
        }
    }

    let contacts = set_connections(protein, scratch, sheets.len(), config);
    let barrels = detect_barrels(&contacts.matrix, config);
    for (b, members) in barrels.iter().enumerate() {
        for &s in members {
            protein.sec_str_vecs[sheets[s].vector].barrel = Some(b);
        }
        info!(barrel = b, sheets = members.len(), "Barrel found.");
    }
    if barrels.is_empty() {
        return 0;
    }

    let barrel_chains: Vec<usize> = barrels
        .iter()
        .flatten()
        .map(|&s| sheets[s].chain)
        .sorted_unstable()
        .dedup()
        .collect();
    set_barrel(protein, scratch, &sheets, &barrels, &contacts, &barrel_chains);
    detect_barrel_inside(protein, scratch, &barrel_chains, config);
    barrels.len()
}

fn is_membrane_type(region_type: RegionType) -> bool {
    region_type.is_not_annotated_membrane() || region_type.is_annotated_membrane()
}

/// Beta vectors of `chains` that reach into the membrane and stand upright.
fn sheets(
    protein: &Protein,
    scratch: &Scratch,
    chains: &[usize],
    config: &BetaConfig,
) -> Vec<Sheet> {
    let geometry = MembraneGeometry::for_membranes(&protein.membranes);
    protein
        .sec_str_vecs
        .iter()
        .enumerate()
        .filter(|(_, v)| v.kind == VectorKind::Beta && chains.contains(&v.chain))
        .filter_map(|(index, vector)| {
            let chain = protein.chain(vector.chain).filter(|c| c.selected)?;
            let residues = vector.residue_range(chain.len())?;
            let touches = scratch.chain(vector.chain)[residues.clone()]
                .iter()
                .zip(&chain.residues()[residues.clone()])
                .any(|(s, r)| r.selected && s.region_type.is_some_and(is_membrane_type));
            let normal = geometry.normal_at(&vector.midpoint());
            let upright = angle_to_plane_degrees(&vector.direction(), &normal)
                .is_some_and(|angle| angle > config.min_sheet_plane_angle);
            (touches && upright).then_some(Sheet {
                vector: index,
                chain: vector.chain,
                residues,
            })
        })
        .collect()
}

fn carbonyl(protein: &Protein, index: ResidueIndex) -> Option<Vector3<f64>> {
    let residue = protein.residue(index)?;
    let c = protein.atom(residue.atom_id_by_name("C")?)?;
    let o = protein.atom(residue.atom_id_by_name("O")?)?;
    Some(o.position - c.position)
}

/// Counts backbone contacts between residues of different sheets.
fn set_connections(
    protein: &Protein,
    scratch: &Scratch,
    sheet_count: usize,
    config: &BetaConfig,
) -> Contacts {
    let on_sheet = |index: ResidueIndex| scratch.get(index).and_then(|s| s.sheet);
    let index = NeighborIndex::build(protein, |i, _| on_sheet(i).is_some());
    let mut contacts = Contacts {
        matrix: vec![vec![0; sheet_count]; sheet_count],
        residues: HashMap::new(),
    };

    for (residue, _) in protein.selected_residues() {
        let Some(sheet) = on_sheet(residue) else {
            continue;
        };
        let (Some(position), Some(co)) = (protein.ca_position(residue), carbonyl(protein, residue))
        else {
            continue;
        };
        for neighbour in index.within(&position, config.neighbor_radius) {
            let Some(other) = on_sheet(neighbour).filter(|&t| t != sheet) else {
                continue;
            };
            let Some(target) = protein.ca_position(neighbour) else {
                continue;
            };
            let parallel = angle_between_degrees(&co, &(target - position))
                .is_some_and(|a| a < config.contact_angle || a > 180.0 - config.contact_angle);
            if parallel {
                contacts.matrix[sheet][other] += 1;
                contacts.matrix[other][sheet] += 1;
                contacts.residues.entry(residue).or_default().push(other);
            }
        }
    }
    contacts
}

/// Grows sheet clusters along the strongest contacts; large clusters are barrels.
fn detect_barrels(matrix: &[Vec<usize>], config: &BetaConfig) -> Vec<Vec<usize>> {
    let total = |s: usize| matrix[s].iter().sum::<usize>();
    let mut assigned = vec![false; matrix.len()];
    let mut barrels = Vec::new();

    for seed in 0..matrix.len() {
        if assigned[seed] {
            continue;
        }
        assigned[seed] = true;
        let mut members = vec![seed];
        let mut stack = vec![seed];
        while let Some(current) = stack.pop() {
            let best = (0..matrix.len())
                .filter(|&t| !assigned[t])
                .fold(None, |best: Option<(usize, usize)>, t| match best {
                    Some((_, count)) if count >= matrix[current][t] => best,
                    _ => Some((t, matrix[current][t])),
                });
            let Some((next, count)) = best else {
                continue;
            };
            let qualifies = count >= config.min_contacts
                && (config.min_contacts >= STRICT_CONTACTS
                    || count as f64 >= CONTACT_SHARE * total(current) as f64);
            if qualifies {
                assigned[next] = true;
                members.push(next);
                stack.push(current);
                stack.push(next);
            }
        }
        debug!(?members, "Sheet cluster grown.");
        if members.len() >= config.min_barrel_sheets {
            members.sort_unstable();
            barrels.push(members);
        }
    }
    barrels
}

fn set_barrel(
    protein: &Protein,
    scratch: &mut Scratch,
    sheets: &[Sheet],
    barrels: &[Vec<usize>],
    contacts: &Contacts,
    barrel_chains: &[usize],
) {
    let mut barrel_of = vec![None; sheets.len()];
    for (b, members) in barrels.iter().enumerate() {
        for &s in members {
            barrel_of[s] = Some(b);
        }
    }

    for (&index, others) in &contacts.residues {
        let Some(residue) = scratch.get_mut(index) else {
            continue;
        };
        let Some(barrel) = residue.sheet.and_then(|s| barrel_of[s]) else {
            continue;
        };
        if residue.region_type == Some(RegionType::Membrane)
            && others.iter().any(|&t| barrel_of[t] == Some(barrel))
        {
            residue.region_type = Some(RegionType::Beta);
        }
    }

    let small_barrel = barrels.len() == 1 && barrels[0].len() == SMALL_BARREL_SHEETS;
    for &c in barrel_chains {
        let Some(chain) = protein.chain(c) else {
            continue;
        };
        let mut handler = RegionHandler::new(chain, scratch.chain_mut(c));

        for run in handler.runs(TypeKey::Type) {
            if handler.value(run.start, TypeKey::Type) != Some(RegionType::Beta)
                || handler.value(run.start, TypeKey::ZType)
                    == handler.value(run.end - 1, TypeKey::ZType)
            {
                continue;
            }
            if handler.before(&run, TypeKey::Type) == Some(RegionType::Membrane) {
                handler.replace(run.start - 1..run.start, RegionType::Beta, TypeKey::Type, None);
            }
            if handler.after(&run, TypeKey::Type) == Some(RegionType::Membrane) {
                handler.replace(run.end..run.end + 1, RegionType::Beta, TypeKey::Type, None);
            }
        }

        if small_barrel {
            let all = 0..handler.len();
            handler.replace(
                all,
                RegionType::Beta,
                TypeKey::Type,
                Some(RegionType::Membrane),
            );
        }

        for run in handler.runs(TypeKey::Type) {
            if handler.value(run.start, TypeKey::Type) == Some(RegionType::Beta)
                && run.len() < SHORT_STRAND
            {
                handler.revert_to_ztype(run, TypeKey::Type);
            }
        }
    }
}

/// Marks membrane residues lining the barrel pore.
fn detect_barrel_inside(
    protein: &Protein,
    scratch: &mut Scratch,
    barrel_chains: &[usize],
    config: &BetaConfig,
) {
    for &c in barrel_chains {
        let Some(chain) = protein.chain(c) else {
            continue;
        };
        let mut handler = RegionHandler::new(chain, scratch.chain_mut(c));

        for (i, residue) in chain.residues().iter().enumerate() {
            let s = handler.scratch_mut(i);
            if residue.selected
                && s.region_type == Some(RegionType::Membrane)
                && residue.is_inside()
            {
                s.region_type = if s.hz_or_zero() > config.inside_depth {
                    Some(RegionType::MembraneInside)
                } else {
                    s.ztype
                };
            }
        }

        let inside = Some(RegionType::MembraneInside);
        for run in handler.runs(TypeKey::Type) {
            if handler.value(run.start, TypeKey::Type) == Some(RegionType::Membrane)
                && (handler.before(&run, TypeKey::Type) == inside
                    || handler.after(&run, TypeKey::Type) == inside)
            {
                handler.replace(run, RegionType::MembraneInside, TypeKey::Type, None);
            }
        }

        for run in handler.runs(TypeKey::Type) {
            let gap = handler
                .value(run.start, TypeKey::Type)
                .is_some_and(|t| t.is_not_membrane());
            if gap
                && run.len() < INSIDE_GAP
                && handler.before(&run, TypeKey::Type) == inside
                && handler.after(&run, TypeKey::Type) == inside
            {
                handler.replace(run, RegionType::MembraneInside, TypeKey::Type, None);
            }
        }
        debug!(
            chain = %chain.id,
            types = %region_handler::type_string(chain, scratch.chain(c), TypeKey::Type),
            "Barrel interior marked."
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::chain::ChainType;
    use crate::core::models::membrane::Membrane;
    use crate::core::models::protein::ProteinType;
    use crate::core::models::protein::tests::push_chain;
    use crate::core::models::residue::SecStructure;
    use crate::core::models::sec_str_vec::SecStrVec;
    use crate::engine::annotator::annotate;
    use crate::engine::config::AnnotationConfig;
    use crate::engine::side_detector::SideDetector;
    use nalgebra::Point3;
    use std::f64::consts::FRAC_PI_4;

    const RADIUS: f64 = 6.1;
    const STRAND: usize = 9;

    /// CA positions and carbonyl directions of `strands` up-and-down strands standing on
    /// a circle, with carbonyls tangent to the circle.
    fn ring(strands: usize) -> Vec<(Point3<f64>, Vector3<f64>)> {
        let mut residues = Vec::new();
        for k in 0..strands {
            let theta = k as f64 * FRAC_PI_4;
            let (x, y) = (RADIUS * theta.cos(), RADIUS * theta.sin());
            for i in 0..STRAND {
                let step = if k % 2 == 0 { i } else { STRAND - 1 - i };
                residues.push((
                    Point3::new(x, y, -13.2 + 3.3 * step as f64),
                    Vector3::new(-theta.sin(), theta.cos(), 0.0),
                ));
            }
        }
        residues
    }

    /// Adds one chain over whole strands of a ring and a beta vector for the first
    /// `vectors` strands.
    fn push_strands(
        protein: &mut Protein,
        id: &str,
        residues: &[(Point3<f64>, Vector3<f64>)],
        ss: SecStructure,
        vectors: usize,
    ) -> usize {
        let positions: Vec<_> = residues.iter().map(|(p, _)| *p).collect();
        let chain = push_chain(protein, id, &positions, |_| "VAL", ss);
        for (r, (position, tangent)) in residues.iter().enumerate() {
            let index = ResidueIndex::new(chain, r);
            let c = position + Vector3::new(0.0, 0.0, 0.5);
            protein.add_atom(Atom::new("C", index, c)).unwrap();
            protein.add_atom(Atom::new("O", index, c + tangent * 1.2)).unwrap();
        }
        for k in 0..vectors {
            let (begin, end) = (k * STRAND, (k + 1) * STRAND - 1);
            protein.sec_str_vecs.push(SecStrVec::new(
                VectorKind::Beta,
                positions[begin],
                positions[end],
                chain,
                begin,
                end,
            ));
        }
        chain
    }

    /// One chain of `strands` strands, `vectors` of which carry a beta vector.
    fn barrel(strands: usize, vectors: usize) -> Protein {
        let mut protein = Protein::new("barrel");
        push_strands(&mut protein, "A", &ring(strands), SecStructure::Strand, vectors);
        protein.membranes = vec![Membrane::plane(0.0, 10.0)];
        protein
    }

    /// An 8-strand ring split over two chains of four strands each.
    fn split_barrel(second_chain_ss: SecStructure) -> Protein {
        let residues = ring(8);
        let (first, second) = residues.split_at(4 * STRAND);
        let mut protein = Protein::new("split");
        push_strands(&mut protein, "A", first, SecStructure::Strand, 4);
        push_strands(&mut protein, "B", second, second_chain_ss, 4);
        protein.membranes = vec![Membrane::plane(0.0, 10.0)];
        protein
    }

    fn detected(protein: &Protein) -> Scratch {
        let mut scratch = Scratch::for_protein(protein);
        SideDetector::new(protein, 4.0).unwrap().run(&mut scratch);
        scratch
    }

    fn types(protein: &Protein, scratch: &Scratch) -> String {
        region_handler::type_string(&protein.chains()[0], scratch.chain(0), TypeKey::Type)
    }

    #[test]
    fn eight_strand_ring_becomes_one_barrel() {
        let mut protein = barrel(8, 8);
        let mut scratch = detected(&protein);

        let found = annotate_barrels(&mut protein, &mut scratch, &[0], &BetaConfig::default());

        assert_eq!(found, 1);
        assert!(protein.sec_str_vecs.iter().all(|v| v.barrel == Some(0)));
        let sheets: Vec<_> = protein.sec_str_vecs.iter().map(|v| v.sheet).collect();
        assert_eq!(sheets, (0..8).map(Some).collect::<Vec<_>>());
        let expected: String = (0..8)
            .map(|k| if k % 2 == 0 { "2BBBBBBB1" } else { "1BBBBBBB2" })
            .collect();
        assert_eq!(types(&protein, &scratch), expected);
    }

    #[test]
    fn too_few_sheets_leave_the_membrane_untouched() {
        let mut protein = barrel(8, 7);
        let mut scratch = detected(&protein);

        let found = annotate_barrels(&mut protein, &mut scratch, &[0], &BetaConfig::default());

        assert_eq!(found, 0);
        assert!(protein.sec_str_vecs.iter().all(|v| v.sheet.is_none()));
        assert!(!types(&protein, &scratch).contains('B'));
    }

    #[test]
    fn barrel_protein_is_annotated_as_beta() {
        let mut protein = barrel(8, 8);

        let outcome = annotate(&mut protein, &AnnotationConfig::default()).unwrap();

        assert!(outcome.accepted);
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(protein.protein_type, ProteinType::TmBeta);
        assert_eq!(protein.chains()[0].numtm, 8);
    }

    #[test]
    fn barrel_spanning_two_chains_is_found() {
        let mut protein = split_barrel(SecStructure::Strand);
        let mut scratch = detected(&protein);

        let found = annotate_barrels(&mut protein, &mut scratch, &[0, 1], &BetaConfig::default());

        assert_eq!(found, 1);
        assert!(protein.sec_str_vecs.iter().all(|v| v.barrel == Some(0)));
        for c in 0..2 {
            let expected: String = (0..4)
                .map(|k| if k % 2 == 0 { "2BBBBBBB1" } else { "1BBBBBBB2" })
                .collect();
            let chain = &protein.chains()[c];
            assert_eq!(
                region_handler::type_string(chain, scratch.chain(c), TypeKey::Type),
                expected
            );
        }
    }

    #[test]
    fn chain_without_strand_residues_joins_a_shared_barrel() {
        let mut protein = split_barrel(SecStructure::Coil);

        let outcome = annotate(&mut protein, &AnnotationConfig::default()).unwrap();

        assert!(outcome.accepted);
        assert_eq!(protein.protein_type, ProteinType::TmBeta);
        let chains = protein.chains();
        assert_eq!((chains[0].numtm, chains[1].numtm), (4, 4));
        assert_eq!(chains[1].chain_type, ChainType::Beta);
    }

    #[test]
    fn reversed_strand_vector_is_skipped() {
        let mut protein = barrel(8, 8);
        let (begin, end) = (protein.sec_str_vecs[0].begin, protein.sec_str_vecs[0].end);
        protein
            .sec_str_vecs
            .push(SecStrVec::new(VectorKind::Beta, begin, end, 0, 20, 12));

        let outcome = annotate(&mut protein, &AnnotationConfig::default()).unwrap();

        assert!(outcome.accepted);
        assert_eq!(protein.chains()[0].numtm, 8);
        assert_eq!(protein.sec_str_vecs[8].sheet, None);
        assert_eq!(protein.sec_str_vecs[8].barrel, None);
    }

    #[test]
    fn cluster_growth_follows_strong_contacts() {
        let n = 10;
        let mut matrix = vec![vec![0; n]; n];
        for s in 0..8 {
            let t = (s + 1) % 8;
            matrix[s][t] = 10;
            matrix[t][s] = 10;
        }
        matrix[8][9] = 10;
        matrix[9][8] = 10;
        matrix[0][8] = 1;
        matrix[8][0] = 1;

        let barrels = detect_barrels(&matrix, &BetaConfig::default());

        assert_eq!(barrels, vec![(0..8).collect::<Vec<_>>()]);
    }

    #[test]
    fn weak_share_does_not_join_a_cluster() {
        let mut matrix = vec![vec![0; 3]; 3];
        matrix[0][1] = 100;
        matrix[1][0] = 100;
        matrix[0][2] = 2;
        matrix[2][0] = 2;
        let config = BetaConfig {
            min_barrel_sheets: 2,
            ..BetaConfig::default()
        };

        let barrels = detect_barrels(&matrix, &config);

        assert_eq!(barrels, vec![vec![0, 1]]);
    }

    fn pore(types: &str, inside: impl Fn(usize) -> bool) -> (Protein, Scratch) {
        let positions: Vec<_> = (0..types.len())
            .map(|i| Point3::new(i as f64, 0.0, 0.0))
            .collect();
        let mut protein = Protein::new("pore");
        push_chain(&mut protein, "A", &positions, |_| "SER", SecStructure::Strand);
        let mut scratch = Scratch::for_protein(&protein);
        for (i, (s, t)) in scratch.chain_mut(0).iter_mut().zip(types.chars()).enumerate() {
            s.region_type = RegionType::from_code(t);
            s.ztype = Some(RegionType::Side1);
            s.hz = Some(5.0);
            if inside(i) {
                protein.residue_mut(ResidueIndex::new(0, i)).unwrap().out_surface = 0.0;
            }
        }
        (protein, scratch)
    }

    #[test]
    fn pore_facing_membrane_residues_become_membrane_inside() {
        let (protein, mut scratch) = pore("BBMMMMBB", |i| i == 2 || i == 3);
        detect_barrel_inside(&protein, &mut scratch, &[0], &BetaConfig::default());
        assert_eq!(types(&protein, &scratch), "BBNNNNBB");
    }

    #[test]
    fn short_gap_between_pore_runs_is_closed() {
        let (protein, mut scratch) = pore("MM111MM", |_| true);
        detect_barrel_inside(&protein, &mut scratch, &[0], &BetaConfig::default());
        assert_eq!(types(&protein, &scratch), "NNNNNNN");
    }
}
