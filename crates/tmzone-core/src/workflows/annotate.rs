use crate::core::models::chain::ChainType;
use crate::core::models::membrane::Membrane;
use crate::core::models::protein::{Protein, ProteinType};
use crate::core::models::region::Region;
use crate::core::utils::geometry::canonical_frame;
use crate::engine::annotator;
use crate::engine::config::AnnotationConfig;
use crate::engine::error::EngineError;
use crate::engine::optimizer::{self, Placement};
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::region_handler::Diagnostic;
use crate::engine::sweep::{self, SymmetryCandidate};
use serde::Serialize;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Serialize)]
pub struct ChainReport {
    pub id: String,
    pub chain_type: ChainType,
    pub numtm: usize,
    pub regions: Vec<Region>,
}

/// Everything a downstream writer needs to report one structure.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotationReport {
    pub code: String,
    pub q_value: f64,
    pub transmembrane: bool,
    pub protein_type: ProteinType,
    pub membranes: Vec<Membrane>,
    pub chains: Vec<ChainReport>,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnnotationReport {
    fn from_protein(protein: &Protein, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            code: protein.code.clone(),
            q_value: protein.q_value,
            transmembrane: protein.tmp,
            protein_type: protein.protein_type,
            membranes: protein.membranes.clone(),
            chains: protein
                .chains()
                .iter()
                .map(|chain| ChainReport {
                    id: chain.id.clone(),
                    chain_type: chain.chain_type,
                    numtm: chain.numtm,
                    regions: chain.regions().to_vec(),
                })
                .collect(),
            diagnostics,
        }
    }
}

/// Places the membrane(s) of `protein` and annotates its transmembrane regions.
///
/// On success the protein is moved into the membrane frame (normal along z, first
/// membrane centred on the origin). A structure that does not fit into a membrane is not
/// an error; the report then has `transmembrane == false`.
#[instrument(skip_all, name = "annotation_workflow")]
pub fn run(
    protein: &mut Protein,
    symmetry: &[SymmetryCandidate],
    config: &AnnotationConfig,
    reporter: &ProgressReporter,
) -> Result<AnnotationReport, EngineError> {
    config.validate()?;

    // === Phase 1: Chain selection ===
    reporter.phase("Chain Selection", || {
        select_chains(protein, config.annotator.min_residues_in_chain)
    })?;
    let all_low_res = protein
        .selected_chains()
        .all(|c| c.chain_type == ChainType::LowRes);

    // === Phase 2: Normal sweep ===
    reporter.report(Progress::PhaseStart {
        name: "Membrane Placement",
    });
    let normals = sweep::candidates(symmetry, &config.optimizer)?;
    let result = optimizer::optimize(protein, &normals, &config.optimizer, reporter)?;
    reporter.report(Progress::PhaseFinish);
    protein.q_value = result.q_value;

    let Some(placement) = result.placement else {
        info!(q_value = result.q_value, "Structure is not transmembrane.");
        protein.set_non_transmembrane();
        if all_low_res {
            protein.protein_type = ProteinType::CaGlobular;
        }
        return Ok(AnnotationReport::from_protein(protein, Vec::new()));
    };

    // === Phase 3: Membrane frame ===
    reporter.phase("Membrane Frame", || move_into_membrane_frame(protein, placement))?;

    // === Phase 4: Region annotation (optional) ===
    let diagnostics = if config.annotate {
        let outcome = reporter.phase("Region Annotation", || annotator::annotate(protein, config))?;
        outcome.diagnostics
    } else {
        Vec::new()
    };

    let report = AnnotationReport::from_protein(protein, diagnostics);
    info!(
        transmembrane = report.transmembrane,
        protein_type = ?report.protein_type,
        membranes = report.membranes.len(),
        "Workflow complete."
    );
    Ok(report)
}

/// Drops chains too short to annotate and flags alpha-carbon-only chains.
fn select_chains(protein: &mut Protein, min_residues: usize) -> Result<(), EngineError> {
    let low_res: Vec<bool> = protein
        .chains()
        .iter()
        .map(|chain| {
            let selected: Vec<_> = chain.residues().iter().filter(|r| r.selected).collect();
            let backbone_only = selected
                .iter()
                .filter(|r| {
                    r.atoms()
                        .iter()
                        .filter_map(|&id| protein.atom(id))
                        .all(|atom| atom.is_backbone())
                })
                .count();
            2 * backbone_only > selected.len()
        })
        .collect();

    for (chain, low_res) in protein.chains_mut().iter_mut().zip(low_res) {
        if chain.selected_residue_count() < min_residues {
            if chain.selected {
                warn!(chain = %chain.id, "Chain too short; left out of the placement.");
            }
            chain.selected = false;
            chain.chain_type = ChainType::NotSelected;
        } else if low_res {
            info!(chain = %chain.id, "Chain has alpha carbons only.");
            chain.chain_type = ChainType::LowRes;
        }
    }

    if protein.selected_chains().next().is_none() {
        return Err(EngineError::NoSelectedResidues);
    }
    Ok(())
}

fn move_into_membrane_frame(
    protein: &mut Protein,
    placement: Placement,
) -> Result<(), EngineError> {
    let isometry = canonical_frame(&placement.normal, &placement.origin).ok_or_else(|| {
        EngineError::Internal("membrane normal cannot define a coordinate frame".to_string())
    })?;
    protein.transform(&isometry);
    protein.membranes = placement.membranes;
    protein.tmp = true;
    info!(
        q_value = placement.q_value,
        membranes = protein.membranes.len(),
        "Protein moved into the membrane frame."
    );
    Ok(())
}
