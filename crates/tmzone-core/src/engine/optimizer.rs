use super::config::OptimizerConfig;
use super::error::EngineError;
use super::progress::{Progress, ProgressReporter};
use super::sweep::NormalCandidate;
use crate::core::models::chain::ChainType;
use crate::core::models::ids::ResidueIndex;
use crate::core::models::membrane::Membrane;
use crate::core::models::protein::Protein;
use crate::core::models::sec_str_vec::VectorKind;
use crate::core::utils::geometry::{abs_cos_angle, angle_to_plane_degrees};
use crate::core::utils::physchem;
use nalgebra::{Point3, Unit, Vector3};
use std::collections::HashMap;
use tracing::{debug, info, instrument, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Distances of the trial sphere centres behind the mass centre in curved mode, in Å.
pub const CURVED_SPHERE_OFFSETS: [f64; 25] = [
    10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 17.0, 20.0, 25.0, 30.0, 40.0, 50.0, 60.0, 80.0, 100.0,
    120.0, 140.0, 150.0, 160.0, 200.0, 250.0, 300.0, 350.0, 400.0, 10000.0,
];

const SLICE_MARGIN: f64 = 3.0;
const STRAIGHTNESS_STEP: usize = 3;
const MIN_CHORD: f64 = 1.0;
const RATIO_SMOOTHING: usize = 2;
const Q_SMOOTHING: usize = 8;
const Q_SCALE: f64 = 130.0;
const MIN_WINDOW_WIDTH: usize = 5;
const SECONDARY_STRUCTURE_LIMIT: usize = 10;

/// Accumulated and scored contents of one 1 Å slice along the normal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slice {
    pub num_ca: f64,
    pub straight: f64,
    pub surf: f64,
    pub apol: f64,
    pub ss_end: f64,
    pub ifh: f64,
    pub raw_q: f64,
    pub q_value: f64,
    pub ifh_fraction: f64,
}

/// One trial placement: a normal through a working origin, optionally bent around a
/// sphere whose centre sits `sphere_offset` Å behind the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub normal: Unit<Vector3<f64>>,
    pub origin: Point3<f64>,
    pub sphere_offset: Option<f64>,
}

impl Candidate {
    fn sphere_centre(&self, offset: f64) -> Point3<f64> {
        self.origin - self.normal.into_inner() * offset
    }

    /// Signed distance along the normal, or the radius for a curved candidate.
    pub fn distance(&self, point: &Point3<f64>) -> f64 {
        match self.sphere_offset {
            None => self.normal.dot(&(point - self.origin)),
            Some(offset) => (point - self.sphere_centre(offset)).norm(),
        }
    }

    /// Membrane normal at `point`; radial for a curved candidate.
    pub fn local_normal(&self, point: &Point3<f64>) -> Vector3<f64> {
        match self.sphere_offset {
            None => self.normal.into_inner(),
            Some(offset) => (point - self.sphere_centre(offset))
                .try_normalize(1e-12)
                .unwrap_or_else(|| self.normal.into_inner()),
        }
    }
}

/// Scored slices of one candidate together with its best membrane window.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub candidate: Candidate,
    pub q_value: f64,
    pub best_slice: usize,
    /// Distance at the lower edge of slice 0.
    pub offset: f64,
    pub slices: Vec<Slice>,
}

/// Outcome of the whole normal sweep.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub q_value: f64,
    pub placement: Option<Placement>,
}

/// Accepted membrane placement before the protein is moved into the membrane frame.
#[derive(Debug, Clone)]
pub struct Placement {
    pub q_value: f64,
    pub normal: Unit<Vector3<f64>>,
    /// Working origin after the shift onto the first membrane's centre.
    pub origin: Point3<f64>,
    pub membranes: Vec<Membrane>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Partners {
    Terminal,
    Missing,
    Pair {
        before: usize,
        after: usize,
        chord: f64,
    },
}

#[derive(Debug, Clone)]
struct ResidueSample {
    position: Point3<f64>,
    surface: f64,
    apolar: f64,
    low_res: bool,
    partners: Partners,
}

#[derive(Debug, Clone)]
struct VectorSample {
    begin: Point3<f64>,
    end: Point3<f64>,
    kind: VectorKind,
}

/// Per-structure data shared by every candidate evaluation.
///
/// Everything that does not depend on the normal is computed once here, so that
/// [`OptimizerRun::evaluate`] is a pure function of the candidate.
pub struct OptimizerRun<'a> {
    config: &'a OptimizerConfig,
    mass_centre: Point3<f64>,
    samples: Vec<ResidueSample>,
    vectors: Vec<VectorSample>,
    residue_straightness: bool,
}

impl<'a> OptimizerRun<'a> {
    pub fn new(protein: &Protein, config: &'a OptimizerConfig) -> Result<Self, EngineError> {
        let mass_centre = protein.centre().ok_or(EngineError::NoSelectedResidues)?;

        let mut indices: Vec<ResidueIndex> = Vec::new();
        let mut sample_of: HashMap<ResidueIndex, usize> = HashMap::new();
        let mut samples = Vec::new();
        for (index, residue) in protein.selected_residues() {
            // Residues without a backbone atom are binned by their last atom.
            let position = protein.ca_position(index).or_else(|| {
                let last = residue.atoms().last()?;
                protein.atom(*last).map(|atom| atom.position)
            });
            let Some(position) = position else {
                continue;
            };
            let low_res = protein
                .chain(index.chain)
                .is_some_and(|c| c.chain_type == ChainType::LowRes);
            let (surface, apolar) = if low_res {
                (1.0, physchem::low_resolution_apolarity(residue.residue_type))
            } else {
                let beta = residue.sec_structure.is_beta();
                let surface_weight = if beta { 1.4 } else { 0.9 };
                let apolar_weight = if beta { 1.2 } else { 0.9 };
                let apolarity = physchem::apolarity(residue.residue_type);
                residue
                    .atoms()
                    .iter()
                    .filter_map(|&id| protein.atom(id))
                    .fold((0.0, 0.0), |(surf, apol), atom| {
                        (
                            surf + atom.out_surface * surface_weight,
                            apol + apolarity * atom.out_surface * apolar_weight,
                        )
                    })
            };
            sample_of.insert(index, samples.len());
            indices.push(index);
            samples.push(ResidueSample {
                position,
                surface,
                apolar,
                low_res,
                partners: Partners::Missing,
            });
        }

        for (sample, &index) in samples.iter_mut().zip(&indices) {
            sample.partners = partners(protein, index, &sample_of);
        }

        let vectors: Vec<VectorSample> = protein
            .sec_str_vecs
            .iter()
            .filter(|v| {
                protein
                    .chain(v.chain)
                    .is_some_and(|c| c.selected && v.residue_range(c.len()).is_some())
            })
            .map(|v| VectorSample {
                begin: v.begin,
                end: v.end,
                kind: v.kind,
            })
            .collect();

        debug!(
            residues = samples.len(),
            vectors = vectors.len(),
            "Optimizer run prepared."
        );
        Ok(Self {
            config,
            mass_centre,
            samples,
            vectors,
            residue_straightness: protein.sec_str_vecs.len() < SECONDARY_STRUCTURE_LIMIT,
        })
    }

    pub fn mass_centre(&self) -> Point3<f64> {
        self.mass_centre
    }

    /// Expands the candidate normals into trial placements, in evaluation order.
    pub fn trial_candidates(&self, normals: &[NormalCandidate]) -> Vec<Candidate> {
        normals
            .iter()
            .flat_map(|candidate| {
                let origin = candidate.origin.unwrap_or(self.mass_centre);
                let offsets: Vec<Option<f64>> = if self.config.curved {
                    CURVED_SPHERE_OFFSETS.iter().map(|&r| Some(r)).collect()
                } else {
                    vec![None]
                };
                offsets.into_iter().map(move |sphere_offset| Candidate {
                    normal: candidate.normal,
                    origin,
                    sphere_offset,
                })
            })
            .collect()
    }

    /// Slices the structure along one candidate and finds its best membrane window.
    ///
    /// Returns `None` when no window satisfies the thickness and quality limits.
    pub fn evaluate(&self, candidate: &Candidate) -> Option<Evaluation> {
        let distances: Vec<f64> = self
            .samples
            .iter()
            .map(|s| candidate.distance(&s.position))
            .collect();
        let (low, high) = distances
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &d| {
                (lo.min(d), hi.max(d))
            });
        if !low.is_finite() || !high.is_finite() {
            return None;
        }
        let offset = low - SLICE_MARGIN;
        let count = (high + SLICE_MARGIN - offset) as usize;
        if count == 0 {
            return None;
        }

        let mut slices = vec![Slice::default(); count];
        self.sum_up_residues(&mut slices, &distances, offset);
        self.sum_up_vectors(&mut slices, candidate, offset);
        smooth_q_values(&mut slices);

        let (best_slice, q_value) = best_window(&slices, self.config)?;
        Some(Evaluation {
            candidate: *candidate,
            q_value,
            best_slice,
            offset,
            slices,
        })
    }

    fn sum_up_residues(&self, slices: &mut [Slice], distances: &[f64], offset: f64) {
        for (sample, &distance) in self.samples.iter().zip(distances) {
            let slice = &mut slices[slice_index(distance - offset, slices.len())];
            if self.residue_straightness || sample.low_res {
                slice.straight += straightness(sample, distance, distances);
                slice.num_ca += 1.0;
            }
            slice.surf += sample.surface;
            slice.apol += sample.apolar;
        }
    }

    fn sum_up_vectors(&self, slices: &mut [Slice], candidate: &Candidate, offset: f64) {
        let count = slices.len();
        for vector in &self.vectors {
            let direction = vector.end - vector.begin;
            let normal = candidate.local_normal(&nalgebra::center(&vector.begin, &vector.end));
            let cos = abs_cos_angle(&normal, &direction);
            let weight = if vector.kind == VectorKind::Beta { 1.5 } else { 1.0 };
            let lying = vector.kind == VectorKind::Alpha
                && angle_to_plane_degrees(&direction, &normal)
                    .is_some_and(|angle| angle < self.config.ifh_parallel_angle);

            let d1 = candidate.distance(&vector.begin).trunc();
            let d2 = candidate.distance(&vector.end).trunc();
            let first = slice_index(d1.min(d2) - offset, count);
            let last = slice_index(d1.max(d2) - offset, count);
            for slice in &mut slices[first..=last] {
                slice.straight += cos * weight;
                slice.num_ca += 1.0;
                if lying {
                    slice.ifh += 1.0;
                }
            }
            slices[first].ss_end += 1.0;
            slices[last].ss_end += 1.0;
        }
    }
}

fn partners(
    protein: &Protein,
    index: ResidueIndex,
    sample_of: &HashMap<ResidueIndex, usize>,
) -> Partners {
    let Some(chain) = protein.chain(index.chain) else {
        return Partners::Missing;
    };
    if index.residue < STRAIGHTNESS_STEP || index.residue + STRAIGHTNESS_STEP >= chain.len() {
        return Partners::Terminal;
    }
    let before = ResidueIndex::new(index.chain, index.residue - STRAIGHTNESS_STEP);
    let after = ResidueIndex::new(index.chain, index.residue + STRAIGHTNESS_STEP);
    let alpha_carbon = |i: ResidueIndex| {
        protein
            .residue(i)
            .and_then(|r| r.atom_id_by_name("CA"))
            .and_then(|id| protein.atom(id))
            .map(|atom| atom.position)
    };
    match (
        sample_of.get(&before),
        sample_of.get(&after),
        alpha_carbon(before),
        alpha_carbon(after),
    ) {
        (Some(&b), Some(&a), Some(ca1), Some(ca3)) => Partners::Pair {
            before: b,
            after: a,
            chord: (ca3 - ca1).norm(),
        },
        _ => Partners::Missing,
    }
}

/// How straight the chain runs across the slices around one residue, in `[0, 1]` for
/// monotone segments; 1 when it cannot be measured.
fn straightness(sample: &ResidueSample, distance: f64, distances: &[f64]) -> f64 {
    match sample.partners {
        Partners::Terminal => 0.0,
        Partners::Missing => 1.0,
        Partners::Pair {
            before,
            after,
            chord,
        } => {
            let (d1, d3) = (distances[before], distances[after]);
            if (distance - d1) * (d3 - distance) > 0.0 && chord > MIN_CHORD {
                (d3 - d1).abs() / chord
            } else {
                1.0
            }
        }
    }
}

fn slice_index(relative: f64, count: usize) -> usize {
    if relative <= 0.0 {
        0
    } else {
        (relative as usize).min(count - 1)
    }
}

/// Ratio clamped to `[0, 1]`; zero for a vanishing denominator.
fn divide(numerator: f64, denominator: f64) -> f64 {
    if denominator < 1e-5 {
        0.0
    } else {
        (numerator / denominator).min(1.0)
    }
}

fn column(slices: &[Slice], field: impl Fn(&Slice) -> f64) -> Vec<f64> {
    slices.iter().map(field).collect()
}

fn window_mean(values: &[f64], centre: usize, half_width: usize) -> f64 {
    let begin = centre.saturating_sub(half_width);
    let end = (centre + half_width + 1).min(values.len());
    values[begin..end].iter().sum::<f64>() / (end - begin) as f64
}

/// Computes `raw_q` from 5-slice averaged ratios and `q_value` as its 17-slice average.
fn smooth_q_values(slices: &mut [Slice]) {
    let straight = column(slices, |s| s.straight);
    let apol = column(slices, |s| s.apol);
    let surf = column(slices, |s| s.surf);
    let ss_end = column(slices, |s| s.ss_end);
    let ifh = column(slices, |s| s.ifh);
    let num_ca = column(slices, |s| s.num_ca);

    for i in 0..slices.len() {
        let ca = window_mean(&num_ca, i, RATIO_SMOOTHING);
        let straight = divide(window_mean(&straight, i, RATIO_SMOOTHING), ca);
        let apol = divide(
            window_mean(&apol, i, RATIO_SMOOTHING),
            window_mean(&surf, i, RATIO_SMOOTHING),
        );
        let ss_end = divide(window_mean(&ss_end, i, RATIO_SMOOTHING), ca);
        let ifh = divide(window_mean(&ifh, i, RATIO_SMOOTHING), ca);
        slices[i].ifh_fraction = ifh;
        slices[i].raw_q = Q_SCALE * straight * (1.0 - ifh) * (1.0 - ss_end) * apol;
    }

    let raw_q = column(slices, |s| s.raw_q);
    for (i, slice) in slices.iter_mut().enumerate() {
        slice.q_value = window_mean(&raw_q, i, Q_SMOOTHING);
    }
}

/// Extent of the window around `centre` whose slices stay above the membrane quality
/// and below the interfacial-helix ceiling.
fn width(slices: &[Slice], centre: usize, config: &OptimizerConfig) -> (usize, usize) {
    let open = |i: usize| {
        slices[i].q_value > config.membrane_q_value && slices[i].ifh_fraction <= config.ifh_ceiling
    };
    let mut min_z = centre;
    while min_z > 0 && open(min_z) {
        min_z -= 1;
    }
    let mut max_z = centre + 1;
    while max_z < slices.len() && open(max_z) {
        max_z += 1;
    }
    (min_z, max_z)
}

fn best_window(slices: &[Slice], config: &OptimizerConfig) -> Option<(usize, f64)> {
    let min_half_width = config.min_half_thickness as usize;
    if slices.len() <= 2 * min_half_width {
        return None;
    }
    let mut best: Option<(usize, f64)> = None;
    for i in min_half_width..slices.len() - min_half_width {
        let (min_z, max_z) = width(slices, i, config);
        let q = slices[i].q_value;
        if i - min_z > min_half_width
            && max_z - i > min_half_width
            && q > config.minimum_q_value
            && best.is_none_or(|(_, best_q)| q > best_q)
        {
            best = Some((i, q));
        }
    }
    best
}

/// Window of one emitted membrane, in slice units.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Window {
    centre: usize,
    half_thickness: f64,
}

/// Takes the best remaining window out of `q` and clears it together with a margin.
fn next_window(q: &mut [f64], emitted: usize, config: &OptimizerConfig) -> Option<Window> {
    let n = q.len();
    let (best_z, best_q) = q
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, value)| {
            if value > best.1 { (i, value) } else { best }
        });
    if n == 0 || best_q < config.minimum_q_value {
        debug!(q = best_q, "No further membrane: quality too low.");
        return None;
    }
    let margin = config.second_membrane_edge_margin;
    if emitted > 0 && (best_z < margin || best_z > n.saturating_sub(margin)) {
        debug!(slice = best_z, "No further membrane: too close to the edge.");
        return None;
    }

    let max_half = config.max_half_thickness;
    let within = |from: usize, to: usize| ((to - from) as f64) < max_half;
    let mut min_z = best_z;
    while min_z > 0 && q[min_z] > config.minimum_q_value && within(min_z, best_z) {
        min_z -= 1;
    }
    let mut max_z = best_z;
    while max_z < n && q[max_z] > config.minimum_q_value && within(best_z, max_z) {
        max_z += 1;
    }
    if max_z - min_z < MIN_WINDOW_WIDTH {
        debug!(min_z, best_z, max_z, "No further membrane: window too narrow.");
        return None;
    }
    while min_z > 2 && q[min_z] > config.membrane_q_value && within(min_z, best_z) {
        min_z -= 1;
    }
    while max_z < n && q[max_z] > config.membrane_q_value && within(best_z, max_z) {
        max_z += 1;
    }
    let half_thickness = ((max_z - min_z) / 2) as f64;
    if half_thickness < config.min_half_thickness {
        debug!(half_thickness, "No further membrane: too thin.");
        return None;
    }

    let mut i = best_z;
    while i > 0 && q[i] > config.membrane_q_value {
        q[i] = 0.0;
        i -= 1;
    }
    let mut cleared = 0;
    while i > 0 && cleared < config.cleared_margin {
        q[i] = 0.0;
        i -= 1;
        cleared += 1;
    }
    let mut i = best_z + 1;
    while i < n && q[i] > config.membrane_q_value {
        q[i] = 0.0;
        i += 1;
    }
    let mut cleared = 0;
    while i < n && cleared < config.cleared_margin {
        q[i] = 0.0;
        i += 1;
        cleared += 1;
    }

    debug!(min_z, best_z, max_z, half_thickness, "Membrane window found.");
    Some(Window {
        centre: (min_z + max_z) / 2,
        half_thickness,
    })
}

/// Emits up to two non-overlapping membranes from the best evaluation.
///
/// Plane membranes shift the working origin onto the first membrane's centre; a second
/// membrane is stored relative to it. Curved placements emit a single membrane.
pub fn emit_membranes(
    evaluation: &Evaluation,
    config: &OptimizerConfig,
) -> (Vec<Membrane>, Point3<f64>) {
    let candidate = &evaluation.candidate;
    let limit = if config.single_membrane || candidate.sphere_offset.is_some() {
        1
    } else {
        2
    };
    let mut q: Vec<f64> = evaluation.slices.iter().map(|s| s.q_value).collect();
    let mut origin = candidate.origin;
    let mut first_centre: Option<f64> = None;
    let mut membranes = Vec::new();

    while membranes.len() < limit {
        let Some(window) = next_window(&mut q, membranes.len(), config) else {
            break;
        };
        let centre = window.centre as f64 + evaluation.offset;
        let membrane = match (candidate.sphere_offset, first_centre) {
            (Some(offset), _) => Membrane::curved(-offset, window.half_thickness, centre),
            (None, None) => {
                origin += candidate.normal.into_inner() * centre;
                first_centre = Some(centre);
                Membrane::plane(0.0, window.half_thickness)
            }
            (None, Some(first)) => Membrane::plane(centre - first, window.half_thickness),
        };
        membranes.push(membrane);
    }
    (membranes, origin)
}

/// Sweeps every candidate and keeps the best-scoring placement.
///
/// Candidates are reduced in their given order with a strict improvement test, so an
/// earlier candidate wins a tie whether or not the evaluation runs in parallel.
#[instrument(skip_all, name = "membrane_optimization")]
pub fn optimize(
    protein: &Protein,
    normals: &[NormalCandidate],
    config: &OptimizerConfig,
    reporter: &ProgressReporter,
) -> Result<OptimizationResult, EngineError> {
    let run = OptimizerRun::new(protein, config)?;
    let candidates = run.trial_candidates(normals);
    info!(candidates = candidates.len(), "Sweeping membrane normals.");
    reporter.report(Progress::TaskStart {
        total_steps: candidates.len() as u64,
    });

    #[cfg(not(feature = "parallel"))]
    let iterator = candidates.iter();

    #[cfg(feature = "parallel")]
    let iterator = candidates.par_iter();

    let evaluations: Vec<Option<Evaluation>> = iterator
        .map(|candidate| {
            let evaluation = run.evaluate(candidate);
            reporter.report(Progress::TaskIncrement);
            evaluation
        })
        .collect();
    reporter.report(Progress::TaskFinish);

    let best = evaluations
        .into_iter()
        .flatten()
        .fold(None::<Evaluation>, |best, evaluation| match best {
            Some(b) if evaluation.q_value <= b.q_value => Some(b),
            _ => Some(evaluation),
        });

    let Some(best) = best else {
        info!("No candidate produced a membrane window.");
        return Ok(OptimizationResult {
            q_value: 0.0,
            placement: None,
        });
    };
    for (i, slice) in best.slices.iter().enumerate() {
        trace!(
            slice = i,
            q = slice.q_value,
            raw_q = slice.raw_q,
            ifh = slice.ifh_fraction,
            "Best slice profile."
        );
    }
    info!(
        q_value = best.q_value,
        normal = ?best.candidate.normal.into_inner(),
        sphere_offset = ?best.candidate.sphere_offset,
        "Best membrane normal selected."
    );

    if best.q_value <= config.minimum_q_value {
        return Ok(OptimizationResult {
            q_value: best.q_value,
            placement: None,
        });
    }
    let (membranes, origin) = emit_membranes(&best, config);
    let placement = (!membranes.is_empty()).then(|| Placement {
        q_value: best.q_value,
        normal: best.candidate.normal,
        origin,
        membranes,
    });
    Ok(OptimizationResult {
        q_value: best.q_value,
        placement,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::Atom;
    use crate::core::models::membrane::MembraneShape;
    use crate::core::models::protein::tests::{push_chain, rod};
    use crate::core::models::residue::SecStructure;
    use crate::engine::sweep::{SymmetryCandidate, candidates};

    const ROD_AXES: [(f64, f64); 7] = [
        (0.0, 0.0),
        (10.0, 0.0),
        (-10.0, 0.0),
        (0.0, 10.0),
        (0.0, -10.0),
        (7.0, 7.0),
        (-7.0, -7.0),
    ];

    /// Seven straight rods along z; apolar inside `|z| < 15`, charged outside.
    fn slab(apolar_core: bool) -> Protein {
        let mut protein = Protein::new("slab");
        for (k, &(x, y)) in ROD_AXES.iter().enumerate() {
            let positions = rod(x, y, -30.0, 1.5, 41);
            let name = move |i: usize| {
                let z = -30.0 + 1.5 * i as f64;
                if apolar_core && z.abs() < 15.0 { "LEU" } else { "LYS" }
            };
            let id = ((b'A' + k as u8) as char).to_string();
            push_chain(&mut protein, &id, &positions, name, SecStructure::AlphaHelix);
        }
        protein
    }

    fn sweep(
        protein: &Protein,
        symmetry: &[SymmetryCandidate],
        config: &OptimizerConfig,
    ) -> OptimizationResult {
        let normals = candidates(symmetry, config).unwrap();
        optimize(protein, &normals, config, &ProgressReporter::new()).unwrap()
    }

    #[test]
    fn slab_of_apolar_rods_is_placed_along_z() {
        let protein = slab(true);
        let config = OptimizerConfig::default();
        let result = sweep(&protein, &[], &config);

        let placement = result.placement.expect("slab must be transmembrane");
        assert!(placement.q_value > config.minimum_q_value);
        assert!(placement.normal.z.abs() > 0.95);
        assert_eq!(placement.membranes.len(), 1);
        let membrane = &placement.membranes[0];
        assert_eq!(membrane.shape, MembraneShape::Plane);
        assert_eq!(membrane.origin, 0.0);
        assert!(membrane.half_thickness >= config.min_half_thickness);
        assert!(membrane.half_thickness <= config.max_half_thickness);
    }

    #[test]
    fn residue_without_backbone_atoms_is_binned_by_its_last_atom() {
        let mut protein = Protein::new("side");
        push_chain(&mut protein, "A", &rod(0.0, 0.0, 0.0, 1.5, 5), |_| "SER", SecStructure::Coil);
        let index = protein.add_residue(0, 6, ' ', 6, "SER").unwrap();
        protein
            .add_atom(Atom::new("OG", index, Point3::new(0.0, 0.0, 9.0)))
            .unwrap();
        let config = OptimizerConfig::default();

        let run = OptimizerRun::new(&protein, &config).unwrap();

        assert_eq!(run.samples.len(), 6);
        assert_eq!(run.samples[5].position, Point3::new(0.0, 0.0, 9.0));
    }

    #[test]
    fn polar_structure_is_rejected() {
        let protein = slab(false);
        let result = sweep(&protein, &[], &OptimizerConfig::default());
        assert!(result.placement.is_none());
        assert!(result.q_value <= OptimizerConfig::default().minimum_q_value);
    }

    #[test]
    fn equal_quality_keeps_the_first_candidate() {
        let protein = slab(true);
        let centre = protein.centre().unwrap();
        let shifted = centre + Vector3::new(5.0, 0.0, 0.0);
        let symmetry = [
            SymmetryCandidate {
                normal: Vector3::z(),
                origin: Some(shifted),
            },
            SymmetryCandidate {
                normal: Vector3::z(),
                origin: Some(centre),
            },
        ];
        let result = sweep(&protein, &symmetry, &OptimizerConfig::default());
        let placement = result.placement.unwrap();
        assert!((placement.origin.x - shifted.x).abs() < 1e-9);
        assert!((placement.origin.y - shifted.y).abs() < 1e-9);
    }

    #[test]
    fn curved_mode_emits_one_curved_membrane() {
        let protein = slab(true);
        let config = OptimizerConfig {
            curved: true,
            ball_distance: 0.3,
            ..OptimizerConfig::default()
        };
        let result = sweep(&protein, &[], &config);
        let placement = result.placement.unwrap();
        assert_eq!(placement.membranes.len(), 1);
        let membrane = &placement.membranes[0];
        assert!(membrane.is_curved());
        assert!(membrane.origin < 0.0);
        assert!(membrane.sphere_radius > 0.0);
    }

    fn plateaus(len: usize, plateaus: &[(usize, usize, f64)]) -> Evaluation {
        let mut slices = vec![Slice::default(); len];
        for &(begin, end, q) in plateaus {
            for slice in &mut slices[begin..end] {
                slice.q_value = q;
            }
        }
        Evaluation {
            candidate: Candidate {
                normal: Vector3::z_axis(),
                origin: Point3::origin(),
                sphere_offset: None,
            },
            q_value: 100.0,
            best_slice: plateaus.first().map_or(0, |p| p.0),
            offset: -100.0,
            slices,
        }
    }

    #[test]
    fn two_separated_windows_give_two_membranes() {
        let evaluation = plateaus(200, &[(30, 50, 100.0), (140, 160, 90.0)]);
        let (membranes, origin) = emit_membranes(&evaluation, &OptimizerConfig::default());

        assert_eq!(membranes.len(), 2);
        assert_eq!(membranes[0].origin, 0.0);
        assert_eq!(membranes[0].half_thickness, 8.0);
        assert_eq!(membranes[1].origin, 110.0);
        assert!((origin.z - (37.0 - 100.0)).abs() < 1e-12);
    }

    #[test]
    fn second_window_at_the_edge_is_ignored() {
        let evaluation = plateaus(200, &[(30, 50, 100.0), (190, 200, 90.0)]);
        let (membranes, _) = emit_membranes(&evaluation, &OptimizerConfig::default());
        assert_eq!(membranes.len(), 1);

        let evaluation = plateaus(200, &[(30, 50, 100.0), (140, 160, 90.0)]);
        let single = OptimizerConfig {
            single_membrane: true,
            ..OptimizerConfig::default()
        };
        assert_eq!(emit_membranes(&evaluation, &single).0.len(), 1);
    }

    #[test]
    fn divide_clamps_and_guards_small_denominators() {
        assert_eq!(divide(3.0, 0.0), 0.0);
        assert_eq!(divide(3.0, 2.0), 1.0);
        assert_eq!(divide(1.0, 4.0), 0.25);
    }
}
