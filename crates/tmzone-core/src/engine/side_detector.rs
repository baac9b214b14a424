use super::error::EngineError;
use super::scratch::{ResidueScratch, Scratch, TypeKey};
use crate::core::models::membrane::Membrane;
use crate::core::models::protein::Protein;
use crate::core::models::region::RegionType;
use nalgebra::{Point3, Vector3};
use tracing::{debug, trace};

const DIRECTION_WINDOW: usize = 3;

/// How the distance of a point from the membrane is measured in the canonical frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MembraneGeometry {
    /// Flat bilayers perpendicular to z; the distance is the z coordinate.
    Plane,
    /// Spherical bilayer around `(0, 0, centre_z)`; the distance is the radius.
    Sphere { centre_z: f64 },
}

impl MembraneGeometry {
    pub fn for_membranes(membranes: &[Membrane]) -> Self {
        match membranes.first() {
            Some(membrane) if membrane.is_curved() => MembraneGeometry::Sphere {
                centre_z: membrane.origin,
            },
            _ => MembraneGeometry::Plane,
        }
    }

    pub fn distance(&self, point: &Point3<f64>) -> f64 {
        match *self {
            MembraneGeometry::Plane => point.z,
            MembraneGeometry::Sphere { centre_z } => {
                (point - Point3::new(0.0, 0.0, centre_z)).norm()
            }
        }
    }

    /// Unit membrane normal at `point`; radial for a sphere, `z` at its centre.
    pub fn normal_at(&self, point: &Point3<f64>) -> Vector3<f64> {
        match *self {
            MembraneGeometry::Plane => Vector3::z(),
            MembraneGeometry::Sphere { centre_z } => (point - Point3::new(0.0, 0.0, centre_z))
                .try_normalize(1e-12)
                .unwrap_or_else(Vector3::z),
        }
    }
}

/// Result of classifying one distance against the membrane boundaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SideClassification {
    pub region_type: RegionType,
    /// Signed offset from the central surface of the nearest membrane.
    pub rz: f64,
    /// Distance from the nearest membrane surface, never negative.
    pub hz: f64,
}

/// Boundary surfaces `z1 >= z2 >= z3 >= z4` and the two membrane centres.
///
/// With a single membrane only `z1` and `z4` bound it and `z2 == z4`, `z3 == z1` are
/// never consulted.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Boundaries {
    z1: f64,
    z2: f64,
    z3: f64,
    z4: f64,
    o1: f64,
    o2: f64,
    double: bool,
}

impl Boundaries {
    fn new(
        membranes: &[Membrane],
        geometry: MembraneGeometry,
        half_thickness: impl Fn(&Membrane) -> f64,
    ) -> Option<Self> {
        let first = membranes.first()?;
        if let MembraneGeometry::Sphere { .. } = geometry {
            let h = half_thickness(first);
            let r = first.sphere_radius;
            return Some(Self::single(r, h));
        }
        match membranes.get(1) {
            None => Some(Self::single(first.origin, half_thickness(first))),
            Some(second) => {
                let (upper, lower) = if first.origin >= second.origin {
                    (first, second)
                } else {
                    (second, first)
                };
                let (hu, hl) = (half_thickness(upper), half_thickness(lower));
                Some(Self {
                    z1: upper.origin + hu,
                    z2: upper.origin - hu,
                    z3: lower.origin + hl,
                    z4: lower.origin - hl,
                    o1: upper.origin,
                    o2: lower.origin,
                    double: true,
                })
            }
        }
    }

    fn single(origin: f64, h: f64) -> Self {
        Self {
            z1: origin + h,
            z2: origin - h,
            z3: origin + h,
            z4: origin - h,
            o1: origin,
            o2: origin,
            double: false,
        }
    }

    fn classify(&self, z: f64) -> SideClassification {
        if z > self.z1 {
            return SideClassification {
                region_type: RegionType::Side1,
                rz: z - self.o1,
                hz: z - self.z1,
            };
        }
        if z < self.z4 {
            return SideClassification {
                region_type: RegionType::Side2,
                rz: z - self.o2,
                hz: self.z4 - z,
            };
        }
        if !self.double {
            return SideClassification {
                region_type: RegionType::Membrane,
                rz: z - self.o1,
                hz: (self.z1 - z).min(z - self.z4),
            };
        }

        let rz = if z < (self.z2 + self.z3) / 2.0 {
            z - self.o2
        } else {
            z - self.o1
        };
        if z > self.z2 {
            SideClassification {
                region_type: RegionType::Membrane,
                rz,
                hz: (self.z1 - z).min(z - self.z2),
            }
        } else if z < self.z3 {
            SideClassification {
                region_type: RegionType::Membrane,
                rz,
                hz: (self.z3 - z).min(z - self.z4),
            }
        } else {
            SideClassification {
                region_type: RegionType::Intermembrane,
                rz,
                hz: (self.z2 - z).min(z - self.z3),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Core,
    Baseline,
    Real,
}

impl Pass {
    fn key(self) -> TypeKey {
        match self {
            Pass::Core => TypeKey::TType,
            Pass::Baseline => TypeKey::ZType,
            Pass::Real => TypeKey::Type,
        }
    }
}

/// Classifies every selected residue against the placed membranes.
pub struct SideDetector<'a> {
    protein: &'a Protein,
    geometry: MembraneGeometry,
    core_half_thickness: f64,
}

impl<'a> SideDetector<'a> {
    pub fn new(protein: &'a Protein, core_half_thickness: f64) -> Result<Self, EngineError> {
        if protein.membranes.is_empty() {
            return Err(EngineError::InvalidInput(
                "side detection requires at least one membrane".to_string(),
            ));
        }
        Ok(Self {
            protein,
            geometry: MembraneGeometry::for_membranes(&protein.membranes),
            core_half_thickness,
        })
    }

    pub fn geometry(&self) -> MembraneGeometry {
        self.geometry
    }

    /// Classifies `z` against the real membrane geometry.
    pub fn side_by_z(&self, z: f64) -> Option<SideClassification> {
        Boundaries::new(&self.protein.membranes, self.geometry, |m| m.half_thickness)
            .map(|b| b.classify(z))
    }

    /// Runs the core, baseline and real passes, then the direction signal.
    pub fn run(&self, scratch: &mut Scratch) {
        for pass in [Pass::Core, Pass::Baseline, Pass::Real] {
            self.pass(scratch, pass);
        }
        self.set_direction(scratch);
        debug!(geometry = ?self.geometry, "Side detection finished.");
    }

    fn pass(&self, scratch: &mut Scratch, pass: Pass) {
        let core = self.core_half_thickness;
        let boundaries = Boundaries::new(&self.protein.membranes, self.geometry, |m| match pass {
            Pass::Core => core.min(m.half_thickness),
            Pass::Baseline => 0.0,
            Pass::Real => m.half_thickness,
        });
        let Some(boundaries) = boundaries else {
            return;
        };
        let key = pass.key();

        for (index, _) in self.protein.selected_residues() {
            let Some(residue_scratch) = scratch.get_mut(index) else {
                continue;
            };
            let Some(position) = self.protein.ca_position(index) else {
                residue_scratch.set(key, RegionType::Unknown);
                residue_scratch.z.get_or_insert(0.0);
                residue_scratch.hz.get_or_insert(0.0);
                continue;
            };

            let side = boundaries.classify(self.geometry.distance(&position));
            let region_type = match (pass, side.region_type) {
                (Pass::Baseline, RegionType::Membrane) if side.rz >= 0.0 => RegionType::Side1,
                (Pass::Baseline, RegionType::Membrane) => RegionType::Side2,
                (_, region_type) => region_type,
            };
            residue_scratch.set(key, region_type);
            residue_scratch.z.get_or_insert(side.rz);
            // Overwritten by every pass; the real-geometry pass runs last and its depth
            // is the one the heuristics read.
            residue_scratch.hz = Some(side.hz);
        }
        trace!(?pass, "Side pass finished.");
    }

    /// Windowed change of `z` along each chain; zero near the chain ends.
    pub fn set_direction(&self, scratch: &mut Scratch) {
        for (c, chain) in self.protein.chains().iter().enumerate() {
            if !chain.selected {
                continue;
            }
            let residues = scratch.chain_mut(c);
            let directions = directions(residues);
            for (residue, direction) in residues.iter_mut().zip(directions) {
                residue.direction = Some(direction);
            }
        }
    }
}

fn directions(residues: &[ResidueScratch]) -> Vec<f64> {
    let len = residues.len();
    (0..len)
        .map(|i| {
            if i < DIRECTION_WINDOW || i + DIRECTION_WINDOW >= len {
                return 0.0;
            }
            let ahead: f64 = residues[i + 1..=i + DIRECTION_WINDOW]
                .iter()
                .map(ResidueScratch::z_or_zero)
                .sum();
            let behind: f64 = residues[i - DIRECTION_WINDOW..i]
                .iter()
                .map(ResidueScratch::z_or_zero)
                .sum();
            ahead - behind
        })
        .collect()
}
