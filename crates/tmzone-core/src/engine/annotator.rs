use super::beta_annotator;
use super::config::{AnnotationConfig, AnnotatorConfig};
use super::error::EngineError;
use super::region_handler::{self, Diagnostic, DiagnosticKind, RegionHandler};
use super::scratch::{Scratch, TypeKey};
use super::side_detector::{MembraneGeometry, SideDetector};
use crate::core::models::chain::{Chain, ChainType};
use crate::core::models::protein::{Protein, ProteinType};
use crate::core::models::region::RegionType;
use crate::core::models::residue::Residue;
use crate::core::models::sec_str_vec::VectorKind;
use crate::core::utils::geometry::angle_to_plane_degrees;
use crate::core::utils::physchem;
use itertools::Itertools;
use nalgebra::Point3;
use serde::Serialize;
use std::ops::Range;
use tracing::{debug, info, warn};

const SHORT_RUN: usize = 3;
const DOMINANCE_RATIO: usize = 3;
const LOOP_EDGE: usize = 5;
const LOOP_WINDOW: usize = 4;
const LOOP_MIN_DEPTH: f64 = 7.0;
const LOOP_MAX_HZ: f64 = 8.0;
const HELIX_WHEEL_STEP_DEGREES: f64 = 100.0;

/// Which kind of transmembrane element dominates a chain inside the membrane band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainDominance {
    Alpha,
    Beta,
    #[default]
    None,
}

/// Result of one annotation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnnotationOutcome {
    /// `false` when the placement was rejected and the protein marked non-transmembrane.
    pub accepted: bool,
    pub unresolved_membrane_residues: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Working state of the region annotation of one protein.
///
/// Owns the per-residue scratch for the duration of the pass; the protein only receives
/// the finalized regions, chain types and the acceptance decision.
pub struct AnnotationContext<'a> {
    protein: &'a mut Protein,
    config: &'a AnnotationConfig,
    scratch: Scratch,
    dominance: Vec<ChainDominance>,
}

/// Annotates the regions of a protein that already carries its membranes.
pub fn annotate(
    protein: &mut Protein,
    config: &AnnotationConfig,
) -> Result<AnnotationOutcome, EngineError> {
    AnnotationContext::new(protein, config).run()
}

impl<'a> AnnotationContext<'a> {
    pub fn new(protein: &'a mut Protein, config: &'a AnnotationConfig) -> Self {
        let scratch = Scratch::for_protein(protein);
        let dominance = vec![ChainDominance::None; protein.chains().len()];
        Self {
            protein,
            config,
            scratch,
            dominance,
        }
    }

    pub fn scratch(&self) -> &Scratch {
        &self.scratch
    }

    pub fn dominance(&self, chain: usize) -> ChainDominance {
        self.dominance.get(chain).copied().unwrap_or_default()
    }

    /// Runs the whole pass and either stores the regions or rejects the placement.
    pub fn run(mut self) -> Result<AnnotationOutcome, EngineError> {
        let all_low_res = self.all_selected_low_res();
        self.detect_sides()?;
        self.set_chain_types();

        for c in self.selected_chains() {
            self.apply_chain_heuristics(c);
        }
        self.detect_interfacial_helices();

        let selected = self.selected_chains();
        if beta_annotator::annotate_barrels(
            self.protein,
            &mut self.scratch,
            &selected,
            &self.config.beta,
        ) > 0
        {
            self.adopt_barrel_chains();
        }

        let unresolved_per_chain = self.finalize_chains();
        let unresolved: usize = unresolved_per_chain.iter().map(|(_, n)| n).sum();
        if unresolved > self.config.annotator.max_unresolved_membrane_residues {
            let diagnostics = unresolved_per_chain
                .iter()
                .filter(|(_, n)| *n > 0)
                .map(|(c, n)| {
                    let chain = self.chain_id(*c);
                    let message = format!("{n} membrane residues could not be annotated");
                    warn!(chain = %chain, "{}", message);
                    Diagnostic {
                        chain,
                        kind: DiagnosticKind::UnresolvedMembrane,
                        message,
                    }
                })
                .collect();
            self.reject(all_low_res);
            return Ok(AnnotationOutcome {
                accepted: false,
                unresolved_membrane_residues: unresolved,
                diagnostics,
            });
        }

        for c in self.selected_chains() {
            if let Some(chain) = self.protein.chain_mut(c) {
                region_handler::store(chain, self.scratch.chain(c));
            }
        }
        let diagnostics: Vec<Diagnostic> = self
            .protein
            .selected_chains()
            .flat_map(region_handler::structure_diagnostics)
            .collect();

        let accepted = self.final_check();
        if accepted {
            self.accept(all_low_res);
        } else {
            self.reject(all_low_res);
        }
        Ok(AnnotationOutcome {
            accepted,
            unresolved_membrane_residues: unresolved,
            diagnostics,
        })
    }

    /// Smoothing and loop detection for one chain, plus the helix rules on alpha chains.
    pub fn apply_chain_heuristics(&mut self, c: usize) {
        self.smooth_regions(c, TypeKey::Type);
        self.smooth_regions(c, TypeKey::TType);
        self.detect_loops(c);
        if self.dominance[c] == ChainDominance::Alpha {
            self.detect_reentrant_loops(c);
            self.detect_transmembrane_helices(c);
        }
        debug!(chain = c, types = %self.type_string(c), "Chain heuristics applied.");
    }

    /// Chains without a dominant element that received barrel strands become beta chains.
    fn adopt_barrel_chains(&mut self) {
        for c in self.selected_chains() {
            if self.dominance[c] != ChainDominance::None
                || !self
                    .scratch
                    .chain(c)
                    .iter()
                    .any(|s| s.region_type == Some(RegionType::Beta))
            {
                continue;
            }
            self.dominance[c] = ChainDominance::Beta;
            if let Some(chain) = self.protein.chain_mut(c) {
                debug!(chain = %chain.id, "Chain joins a barrel.");
                chain.chain_type = ChainType::Beta;
            }
        }
    }

    fn selected_chains(&self) -> Vec<usize> {
        self.protein
            .chains()
            .iter()
            .enumerate()
            .filter(|(_, chain)| chain.selected)
            .map(|(c, _)| c)
            .collect()
    }

    fn chain_id(&self, c: usize) -> String {
        self.protein
            .chain(c)
            .map(|chain| chain.id.clone())
            .unwrap_or_default()
    }

    fn type_string(&self, c: usize) -> String {
        self.protein
            .chain(c)
            .map(|chain| region_handler::type_string(chain, self.scratch.chain(c), TypeKey::Type))
            .unwrap_or_default()
    }

    fn all_selected_low_res(&self) -> bool {
        let mut selected = self.protein.selected_chains().peekable();
        selected.peek().is_some() && selected.all(|c| c.chain_type == ChainType::LowRes)
    }

    /// Clears earlier annotation and classifies every residue against the membranes.
    pub fn detect_sides(&mut self) -> Result<(), EngineError> {
        for chain in self.protein.chains_mut() {
            chain.clear_annotation();
        }
        self.scratch = Scratch::for_protein(self.protein);
        SideDetector::new(self.protein, self.config.annotator.core_half_thickness)?
            .run(&mut self.scratch);
        Ok(())
    }

    /// Decides per chain whether helices or strands make up its membrane residues.
    pub fn set_chain_types(&mut self) {
        for c in self.selected_chains() {
            let Some(chain) = self.protein.chain(c) else {
                continue;
            };
            let (alpha, beta) = chain
                .residues()
                .iter()
                .zip(self.scratch.chain(c))
                .filter(|(residue, s)| {
                    residue.selected && s.region_type == Some(RegionType::Membrane)
                })
                .fold((0usize, 0usize), |(alpha, beta), (residue, _)| {
                    (
                        alpha + usize::from(residue.sec_structure.is_alpha()),
                        beta + usize::from(residue.sec_structure.is_beta()),
                    )
                });

            let low_res = chain.chain_type == ChainType::LowRes;
            let dominance = if low_res || (alpha > DOMINANCE_RATIO * beta && alpha > 0) {
                ChainDominance::Alpha
            } else if beta > 0 {
                ChainDominance::Beta
            } else {
                ChainDominance::None
            };
            debug!(chain = %chain.id, alpha, beta, ?dominance, "Chain dominance set.");

            self.dominance[c] = dominance;
            if let Some(chain) = self.protein.chain_mut(c) {
                if !low_res {
                    chain.chain_type = match dominance {
                        ChainDominance::Alpha => ChainType::Alpha,
                        ChainDominance::Beta => ChainType::Beta,
                        ChainDominance::None => ChainType::NonTm,
                    };
                }
            }
        }
    }

    /// Absorbs very short membrane runs and the short gaps between them.
    pub fn smooth_regions(&mut self, c: usize, key: TypeKey) {
        let Some(chain) = self.protein.chain(c) else {
            return;
        };
        let mut handler = RegionHandler::new(chain, self.scratch.chain_mut(c));

        for (previous, run, next) in handler.runs(key).into_iter().tuple_windows() {
            let bridged = handler.value(run.start, key) != Some(RegionType::Membrane)
                && run.len() < SHORT_RUN
                && is_short_membrane(&handler, &previous, key)
                && is_short_membrane(&handler, &next, key)
                && previous.end == run.start
                && run.end == next.start
                && handler.is_contiguous(run.start - 1, run.start)
                && handler.is_contiguous(run.end - 1, run.end);
            if bridged {
                handler.replace(run, RegionType::Membrane, key, None);
            }
        }

        for run in handler.runs(key) {
            if handler.value(run.start, key) != Some(RegionType::Membrane) || run.len() >= SHORT_RUN
            {
                continue;
            }
            let before = handler.before(&run, key);
            let after = handler.after(&run, key);
            match (before, after) {
                (Some(b), Some(a)) if a == b && b.is_not_membrane() => {
                    handler.replace(run, b, key, None);
                }
                _ => handler.revert_to_ztype(run, key),
            }
        }
    }

    /// Splits membrane runs at residues where the chain touches a surface and turns back.
    pub fn detect_loops(&mut self, c: usize) {
        let Some(chain) = self.protein.chain(c) else {
            return;
        };
        let mut handler = RegionHandler::new(chain, self.scratch.chain_mut(c));
        let hz = |h: &RegionHandler, i: usize| h.scratch(i).hz_or_zero();
        let z = |h: &RegionHandler, i: usize| h.scratch(i).z_or_zero();

        let mut turns = Vec::new();
        for run in handler.runs(TypeKey::Type) {
            if handler.value(run.start, TypeKey::Type) != Some(RegionType::Membrane)
                || run.len() < 2 * LOOP_EDGE + 1
            {
                continue;
            }
            for i in run.start + LOOP_EDGE..run.end - LOOP_EDGE {
                let depth = hz(&handler, i);
                let local_minimum = (i - LOOP_WINDOW..=i + LOOP_WINDOW)
                    .filter(|&j| j != i)
                    .all(|j| depth < hz(&handler, j));
                let zi = z(&handler, i);
                let deep_enough = zi.abs() > LOOP_MIN_DEPTH || depth < LOOP_MAX_HZ;
                let opposite_leaflet = run.clone().any(|j| z(&handler, j) * zi < 0.0);
                if local_minimum && deep_enough && opposite_leaflet {
                    turns.push(i);
                }
            }
        }
        for i in turns {
            debug!(chain = %handler.chain().id, residue = i, "Membrane turn found.");
            handler.revert_to_ztype(i..i + 1, TypeKey::Type);
        }
    }

    /// Marks membrane runs that enter and leave on the same side around a helix as loops.
    pub fn detect_reentrant_loops(&mut self, c: usize) {
        let Some(chain) = self.protein.chain(c) else {
            return;
        };
        let settings = &self.config.annotator;
        let helices: Vec<Range<usize>> = self
            .protein
            .sec_str_vecs
            .iter()
            .filter(|v| v.chain == c && v.kind == VectorKind::Alpha)
            .filter_map(|v| v.residue_range(chain.len()))
            .unique()
            .collect();
        let mut handler = RegionHandler::new(chain, self.scratch.chain_mut(c));

        for run in handler.runs(TypeKey::Type) {
            if handler.value(run.start, TypeKey::Type) != Some(RegionType::Membrane) {
                continue;
            }
            let (first, last) = (handler.scratch(run.start), handler.scratch(run.end - 1));
            if first.z_or_zero() * last.z_or_zero() <= 0.0
                || first.hz_or_zero() >= settings.loop_max_boundary_depth
                || last.hz_or_zero() >= settings.loop_max_boundary_depth
            {
                continue;
            }
            let region_type = match helix_turn_loop(&handler, &run, &helices, settings) {
                0 => continue,
                1 => RegionType::Loop,
                _ => RegionType::TwoHelixLoop,
            };
            handler.replace(run, region_type, TypeKey::Type, None);
        }
    }

    /// Promotes long membrane runs that cross from one side to the other to helices.
    pub fn detect_transmembrane_helices(&mut self, c: usize) {
        let Some(chain) = self.protein.chain(c) else {
            return;
        };
        let settings = &self.config.annotator;
        let mut handler = RegionHandler::new(chain, self.scratch.chain_mut(c));

        for run in handler.runs(TypeKey::Type) {
            if handler.value(run.start, TypeKey::Type) != Some(RegionType::Membrane) {
                continue;
            }
            let terminal = run.start == 0 || run.end == handler.len();
            let long_enough = run.len() > settings.min_helix_length
                || (terminal && run.len() > settings.min_terminal_helix_length);
            let crosses = handler.scratch(run.start).z_or_zero()
                * handler.scratch(run.end - 1).z_or_zero()
                < 0.0;
            if long_enough && crosses {
                handler.replace(run, RegionType::Helix, TypeKey::Type, None);
            }
        }
    }

    /// Labels amphipathic helices lying on a membrane surface.
    pub fn detect_interfacial_helices(&mut self) {
        let settings = &self.config.annotator;
        let geometry = MembraneGeometry::for_membranes(&self.protein.membranes);
        let mut marked: Vec<(usize, Range<usize>)> = Vec::new();

        for membrane in &self.protein.membranes {
            for vector in &self.protein.sec_str_vecs {
                if vector.kind != VectorKind::Alpha
                    || vector.residue_count() < settings.ifh_min_length
                {
                    continue;
                }
                let Some(chain) = self.protein.chain(vector.chain).filter(|c| c.selected) else {
                    continue;
                };
                let Some(range) = vector.residue_range(chain.len()) else {
                    continue;
                };
                let midpoint = vector.midpoint();
                let distance = surface_distance(
                    geometry,
                    membrane.origin,
                    membrane.sphere_radius,
                    membrane.half_thickness,
                    &midpoint,
                );
                let normal = geometry.normal_at(&midpoint);
                let lying = angle_to_plane_degrees(&vector.direction(), &normal)
                    .is_some_and(|angle| angle <= settings.ifh_max_plane_angle);
                if !lying || distance > settings.ifh_max_surface_distance {
                    continue;
                }

                let residues = &chain.residues()[range.clone()];
                let mean_surface =
                    residues.iter().map(|r| r.surface).sum::<f64>() / residues.len() as f64;
                let scratch = &self.scratch.chain(vector.chain)[range.clone()];
                let same_side = scratch.iter().map(|s| s.ztype).all_equal()
                    && scratch
                        .first()
                        .and_then(|s| s.ztype)
                        .is_some_and(|t| t.is_not_membrane());
                let moment = hydrophobic_moment(residues);
                if mean_surface >= settings.ifh_min_mean_surface
                    && same_side
                    && moment >= settings.ifh_min_hydrophobic_moment
                {
                    debug!(
                        chain = %chain.id,
                        from = residues[0].auth_id,
                        moment,
                        "Interfacial helix found."
                    );
                    marked.push((vector.chain, range));
                }
            }
        }

        for (c, range) in marked {
            for residue in &mut self.scratch.chain_mut(c)[range] {
                if matches!(
                    residue.region_type,
                    Some(RegionType::Side1) | Some(RegionType::Side2)
                ) {
                    residue.region_type = Some(RegionType::InterfacialHelix);
                }
            }
        }
    }

    /// Runs the final clean-up on every selected chain; returns unresolved counts per chain.
    fn finalize_chains(&mut self) -> Vec<(usize, usize)> {
        let mut counts = Vec::new();
        for c in self.selected_chains() {
            let Some(chain) = self.protein.chain(c) else {
                continue;
            };
            let unresolved = RegionHandler::new(chain, self.scratch.chain_mut(c)).finalize();
            counts.push((c, unresolved));
        }
        counts
    }

    /// Checks that the stored regions are consistent with the chain dominance.
    pub fn final_check(&self) -> bool {
        let chains: Vec<&Chain> = self.protein.selected_chains().collect();
        let regions = || chains.iter().flat_map(|c| c.regions().iter());
        let alpha_regions = regions().filter(|r| r.region_type.is_alpha()).count();
        let beta_regions = regions().filter(|r| r.region_type.is_beta()).count();
        let beta_residues: usize = regions()
            .filter(|r| r.region_type.is_beta())
            .map(|r| r.len())
            .sum();
        let has = |d: ChainDominance| self.dominance.contains(&d);

        if has(ChainDominance::Beta) && beta_residues < self.config.annotator.min_beta_residues {
            info!(beta_residues, "Rejected: too few membrane strand residues.");
            return false;
        }
        if alpha_regions == 0 && beta_regions == 0 {
            info!("Rejected: no transmembrane element annotated.");
            return false;
        }
        if has(ChainDominance::Alpha) && alpha_regions == 0 {
            info!("Rejected: helical chains without membrane helices.");
            return false;
        }
        true
    }

    fn accept(&mut self, all_low_res: bool) {
        let size = footprint_radius(self.protein);
        for membrane in &mut self.protein.membranes {
            membrane.size = size;
        }
        self.protein.tmp = true;

        let regions: Vec<RegionType> = self
            .protein
            .selected_chains()
            .flat_map(|c| c.regions().iter().map(|r| r.region_type))
            .collect();
        let alpha = regions.iter().any(|t| t.is_alpha());
        let beta = regions.iter().any(|t| t.is_beta());
        self.protein.protein_type = if all_low_res {
            ProteinType::CaTm
        } else {
            match (alpha, beta) {
                (true, true) => ProteinType::TmMixed,
                (true, false) => ProteinType::TmAlpha,
                (false, true) => ProteinType::TmBeta,
                (false, false) => ProteinType::Soluble,
            }
        };
        info!(
            protein_type = ?self.protein.protein_type,
            footprint = size,
            "Annotation accepted."
        );
    }

    fn reject(&mut self, all_low_res: bool) {
        self.protein.set_non_transmembrane();
        if all_low_res {
            self.protein.protein_type = ProteinType::CaGlobular;
        }
        info!("Annotation rejected; protein marked non-transmembrane.");
    }
}

fn is_short_membrane(handler: &RegionHandler, run: &Range<usize>, key: TypeKey) -> bool {
    handler.value(run.start, key) == Some(RegionType::Membrane) && run.len() < SHORT_RUN
}

/// Number of distinct helices that occupy enough of a deep, same-side membrane run.
fn helix_turn_loop(
    handler: &RegionHandler,
    run: &Range<usize>,
    helices: &[Range<usize>],
    settings: &AnnotatorConfig,
) -> usize {
    let deepest = run
        .clone()
        .map(|i| handler.scratch(i).hz_or_zero())
        .fold(f64::NEG_INFINITY, f64::max);
    let boundary = handler
        .scratch(run.start)
        .hz_or_zero()
        .max(handler.scratch(run.end - 1).hz_or_zero());
    if deepest - boundary <= settings.loop_depth_rise {
        return 0;
    }
    helices
        .iter()
        .filter(|helix| {
            let low = helix.start.max(run.start);
            let high = helix.end.min(run.end);
            high > low && (high - low) as f64 / run.len() as f64 >= settings.loop_helix_occupancy
        })
        .count()
}

/// Distance of `point` from the nearer surface of one membrane.
fn surface_distance(
    geometry: MembraneGeometry,
    origin: f64,
    sphere_radius: f64,
    half_thickness: f64,
    point: &Point3<f64>,
) -> f64 {
    let centre = match geometry {
        MembraneGeometry::Plane => origin,
        MembraneGeometry::Sphere { .. } => sphere_radius,
    };
    let distance = geometry.distance(point);
    let outer = (distance - (centre + half_thickness)).abs();
    let inner = (distance - (centre - half_thickness)).abs();
    outer.min(inner)
}

/// Mean hydrophobic moment of a helix on a 100° helical wheel.
pub fn hydrophobic_moment(residues: &[Residue]) -> f64 {
    if residues.is_empty() {
        return 0.0;
    }
    let (x, y) = residues
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(x, y), (k, residue)| {
            let h = physchem::normalized_hydrophobicity(residue.residue_type);
            let angle = (HELIX_WHEEL_STEP_DEGREES * k as f64).to_radians();
            (x + h * angle.cos(), y + h * angle.sin())
        });
    x.hypot(y) / residues.len() as f64
}

/// Half of the diagonal of the XY bounding box of all atoms.
fn footprint_radius(protein: &Protein) -> f64 {
    let bounds = protein
        .atoms_iter()
        .fold(None::<(f64, f64, f64, f64)>, |bounds, (_, atom)| {
            let p = atom.position;
            Some(match bounds {
                None => (p.x, p.x, p.y, p.y),
                Some((min_x, max_x, min_y, max_y)) => {
                    (min_x.min(p.x), max_x.max(p.x), min_y.min(p.y), max_y.max(p.y))
                }
            })
        });
    bounds.map_or(0.0, |(min_x, max_x, min_y, max_y)| {
        (max_x - min_x).hypot(max_y - min_y) / 2.0
    })
}
