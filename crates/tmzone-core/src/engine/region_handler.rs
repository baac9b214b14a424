use super::scratch::{ResidueScratch, TypeKey};
use crate::core::models::chain::{Chain, ChainType};
use crate::core::models::region::{Region, RegionType};
use itertools::Itertools;
use serde::Serialize;
use std::ops::Range;
use tracing::{debug, warn};

const SAME_DIRECTION_LIMIT: f64 = 8.0;
const UNRESOLVED_MIN_RUN: usize = 4;
const UNRESOLVED_MIN_DEPTH: f64 = 10.0;
const SHORT_BETA_TERMINAL_RUN: usize = 3;
const SHORT_MEMBRANE_INSIDE_RUN: usize = 6;
const SHORT_ALTERNATION_RUN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Too many membrane residues could not be explained by any structural element.
    UnresolvedMembrane,
    /// A beta chain crosses the membrane an odd number of times.
    OddBetaStrandCount,
    /// Side and membrane regions alternate with implausibly short runs.
    ShortAlternation,
}

/// A structural inconsistency found while annotating. Never fatal by itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub chain: String,
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Finds the next run of equal, defined values of `key` starting at or after `begin`.
///
/// A run never spans a sequence gap: consecutive residues belong to the same run only
/// when their order distance is exactly one.
pub fn next_run_in(
    chain: &Chain,
    scratch: &[ResidueScratch],
    begin: usize,
    key: TypeKey,
) -> Option<Range<usize>> {
    let len = scratch.len();
    let begin = (begin..len).find(|&i| scratch[i].get(key).is_some())?;
    let value = scratch[begin].get(key);
    let mut end = begin + 1;
    while end < len && scratch[end].get(key) == value && chain.order_distance(end - 1, end) == 1 {
        end += 1;
    }
    Some(begin..end)
}

/// All runs of `key` in sequence order.
pub fn runs_in(chain: &Chain, scratch: &[ResidueScratch], key: TypeKey) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut begin = 0;
    while let Some(run) = next_run_in(chain, scratch, begin, key) {
        begin = run.end;
        runs.push(run);
    }
    runs
}

/// Run-length view over one chain's per-residue classification.
pub struct RegionHandler<'a> {
    chain: &'a Chain,
    scratch: &'a mut [ResidueScratch],
}

impl<'a> RegionHandler<'a> {
    pub fn new(chain: &'a Chain, scratch: &'a mut [ResidueScratch]) -> Self {
        Self { chain, scratch }
    }

    pub fn chain(&self) -> &Chain {
        self.chain
    }

    pub fn len(&self) -> usize {
        self.scratch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scratch.is_empty()
    }

    pub fn scratch(&self, i: usize) -> &ResidueScratch {
        &self.scratch[i]
    }

    pub fn scratch_mut(&mut self, i: usize) -> &mut ResidueScratch {
        &mut self.scratch[i]
    }

    pub fn value(&self, i: usize, key: TypeKey) -> Option<RegionType> {
        self.scratch.get(i).and_then(|s| s.get(key))
    }

    pub fn next_run(&self, begin: usize, key: TypeKey) -> Option<Range<usize>> {
        next_run_in(self.chain, self.scratch, begin, key)
    }

    pub fn runs(&self, key: TypeKey) -> Vec<Range<usize>> {
        runs_in(self.chain, self.scratch, key)
    }

    /// Overwrites `key` over `range`; with a guard, only where the current value equals it.
    pub fn replace(
        &mut self,
        range: Range<usize>,
        new_type: RegionType,
        key: TypeKey,
        guard: Option<RegionType>,
    ) {
        if range.is_empty() {
            return;
        }
        debug!(
            chain = %self.chain.id,
            from = self.chain.residues[range.start].auth_id,
            to = self.chain.residues[range.end - 1].auth_id,
            old = ?self.value(range.start, key),
            new = ?new_type,
            "replace"
        );
        for residue in &mut self.scratch[range] {
            if guard.is_none_or(|g| residue.get(key) == Some(g)) {
                residue.set(key, new_type);
            }
        }
    }

    /// Sets `key` of every residue in `range` to its own baseline classification.
    pub fn revert_to_ztype(&mut self, range: Range<usize>, key: TypeKey) {
        for residue in &mut self.scratch[range] {
            let baseline = residue.ztype.unwrap_or(RegionType::Unknown);
            residue.set(key, baseline);
        }
    }

    pub fn is_contiguous(&self, first: usize, second: usize) -> bool {
        self.chain.order_distance(first, second) == 1
    }

    /// Value of `key` at the residue right before `run`, if it is selected and contiguous.
    pub fn before(&self, run: &Range<usize>, key: TypeKey) -> Option<RegionType> {
        let previous = run.start.checked_sub(1)?;
        if !self.chain.residues[previous].selected || !self.is_contiguous(previous, run.start) {
            return None;
        }
        self.value(previous, key)
    }

    /// Value of `key` at the residue right after `run`, if it is selected and contiguous.
    pub fn after(&self, run: &Range<usize>, key: TypeKey) -> Option<RegionType> {
        let next = run.end;
        if next >= self.len()
            || run.is_empty()
            || !self.chain.residues[next].selected
            || !self.is_contiguous(next - 1, next)
        {
            return None;
        }
        self.value(next, key)
    }

    /// Both residues move along the membrane normal in the same sense, and fast.
    pub fn same_direction(&self, first: usize, second: usize) -> bool {
        match (self.scratch[first].direction, self.scratch[second].direction) {
            (Some(d1), Some(d2)) => {
                d1 * d2 > 0.0 && d1.abs() > SAME_DIRECTION_LIMIT && d2.abs() > SAME_DIRECTION_LIMIT
            }
            _ => false,
        }
    }

    /// Final clean-up of the `type` classification before the regions are stored.
    ///
    /// Returns the number of membrane residues that crossed the whole slab but could not
    /// be explained by any structural element.
    pub fn finalize(&mut self) -> usize {
        let mut unresolved = 0;
        let mut begin = 0;
        while let Some(run) = self.next_run(begin, TypeKey::Type) {
            begin = run.end;
            let Some(run_type) = self.value(run.start, TypeKey::Type) else {
                continue;
            };

            if is_membrane_like(run_type) {
                let before = self.before(&run, TypeKey::Type);
                let after = self.after(&run, TypeKey::Type);
                if let (Some(b), Some(a)) = (before, after) {
                    if b.is_not_membrane() && b == a {
                        self.replace(run.clone(), b, TypeKey::Type, None);
                    }
                }
            }

            let current = self.value(run.start, TypeKey::Type).unwrap_or(run_type);
            let terminal_limit = if current.is_beta() {
                SHORT_BETA_TERMINAL_RUN
            } else {
                0
            };
            if is_membrane_like(current)
                && (run.start == 0 || run.end == self.len())
                && run.len() < terminal_limit
            {
                let neighbour = if run.start == 0 && run.end < self.len() {
                    Some(run.end)
                } else {
                    run.start.checked_sub(1)
                };
                match neighbour.and_then(|n| self.value(n, TypeKey::ZType)) {
                    Some(baseline) => self.replace(run.clone(), baseline, TypeKey::Type, None),
                    None => self.revert_to_ztype(run.clone(), TypeKey::Type),
                }
            }

            let current = self.value(run.start, TypeKey::Type).unwrap_or(run_type);
            if current.is_membrane_inside()
                && run.len() < SHORT_MEMBRANE_INSIDE_RUN
                && self.before(&run, TypeKey::Type) == Some(RegionType::Beta)
                && self.after(&run, TypeKey::Type) == Some(RegionType::Beta)
            {
                self.replace(run.clone(), RegionType::Beta, TypeKey::Type, None);
            }

            let current = self.value(run.start, TypeKey::Type).unwrap_or(run_type);
            if current.is_not_annotated_membrane() {
                if run.len() > UNRESOLVED_MIN_RUN {
                    let z_first = self.scratch[run.start].z_or_zero();
                    let z_last = self.scratch[run.end - 1].z_or_zero();
                    if z_first.abs() > UNRESOLVED_MIN_DEPTH
                        && z_last.abs() > UNRESOLVED_MIN_DEPTH
                        && z_first * z_last < 0.0
                    {
                        unresolved += run.len();
                    }
                }
                self.revert_to_ztype(run, TypeKey::Type);
            }
        }
        unresolved
    }
}

fn is_membrane_like(region_type: RegionType) -> bool {
    region_type.is_annotated_transmembrane() || region_type.is_not_annotated_membrane()
}

/// Converts the `type` runs of a chain into its finalized regions.
///
/// Existing regions are replaced, so storing twice without changing `type` gives the
/// same result. Returns the number of transmembrane regions.
pub fn store(chain: &mut Chain, scratch: &[ResidueScratch]) -> usize {
    let regions: Vec<Region> = runs_in(chain, scratch, TypeKey::Type)
        .into_iter()
        .filter_map(|run| {
            let region_type = scratch[run.start].region_type?;
            let first = &chain.residues[run.start];
            let last = &chain.residues[run.end - 1];
            Some(Region {
                begin: first.position(),
                end: last.position(),
                begin_index: run.start,
                end_index: run.end - 1,
                region_type,
            })
        })
        .collect();

    chain.clear_annotation();
    if let Some(signal) = chain.signal_peptide.clone() {
        chain.regions.push(signal);
    }
    chain.numtm = regions
        .iter()
        .filter(|r| r.region_type.is_annotated_transmembrane())
        .count();
    chain.regions.extend(regions);
    if chain.numtm == 0 {
        chain.chain_type = ChainType::NonTm;
    }
    debug!(
        chain = %chain.id,
        regions = chain.regions.len(),
        numtm = chain.numtm,
        "Regions stored."
    );
    chain.numtm
}

/// One character per selected residue showing the classification under `key`.
pub fn type_string(chain: &Chain, scratch: &[ResidueScratch], key: TypeKey) -> String {
    chain
        .residues
        .iter()
        .zip(scratch)
        .filter(|(residue, _)| residue.selected)
        .map(|(_, s)| s.get(key).map_or('-', |t| t.code()))
        .collect()
}

/// Checks the stored regions of a chain for patterns that real structures do not show.
pub fn structure_diagnostics(chain: &Chain) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let regions: Vec<&Region> = chain
        .regions
        .iter()
        .filter(|r| r.region_type != RegionType::Signal)
        .collect();

    for (a, b, c, d, e) in regions.iter().tuple_windows() {
        let sides = [a, c, e].iter().all(|r| r.region_type.is_not_membrane());
        let membranes = [b, d].iter().all(|r| is_membrane_region(r.region_type));
        let short = [b, c, d].iter().all(|r| r.len() < SHORT_ALTERNATION_RUN);
        if sides && membranes && short {
            let message = format!(
                "short side/membrane alternation between residues {} and {}",
                b.begin.auth_id, d.end.auth_id
            );
            warn!(chain = %chain.id, "{}", message);
            diagnostics.push(Diagnostic {
                chain: chain.id.clone(),
                kind: DiagnosticKind::ShortAlternation,
                message,
            });
        }
    }

    let strands = regions
        .iter()
        .filter(|r| r.region_type == RegionType::Beta)
        .count();
    if chain.chain_type == ChainType::Beta && strands % 2 == 1 {
        let message = format!("beta chain has an odd number ({strands}) of membrane strands");
        warn!(chain = %chain.id, "{}", message);
        diagnostics.push(Diagnostic {
            chain: chain.id.clone(),
            kind: DiagnosticKind::OddBetaStrandCount,
            message,
        });
    }
    diagnostics
}

fn is_membrane_region(region_type: RegionType) -> bool {
    region_type.is_annotated_membrane() || region_type.is_not_annotated_membrane()
}
