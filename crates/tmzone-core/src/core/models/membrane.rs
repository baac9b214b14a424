use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MembraneShape {
    #[default]
    Plane,
    Curved,
}

/// Geometric placement of one lipid bilayer in the canonical membrane frame.
///
/// The membrane normal is the z axis of that frame. For a plane membrane `origin` is
/// the z coordinate of its central plane; for a curved membrane the sphere centre sits
/// at `(0, 0, origin)` and `sphere_radius` is the radius of its central surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Membrane {
    pub origin: f64,
    pub half_thickness: f64,
    pub sphere_radius: f64,
    /// Radius of the membrane footprint drawn around the protein.
    pub size: f64,
    pub shape: MembraneShape,
}

impl Membrane {
    pub fn plane(origin: f64, half_thickness: f64) -> Self {
        Self {
            origin,
            half_thickness,
            sphere_radius: 0.0,
            size: 0.0,
            shape: MembraneShape::Plane,
        }
    }

    pub fn curved(origin: f64, half_thickness: f64, sphere_radius: f64) -> Self {
        Self {
            origin,
            half_thickness,
            sphere_radius,
            size: 0.0,
            shape: MembraneShape::Curved,
        }
    }

    pub fn is_curved(&self) -> bool {
        self.shape == MembraneShape::Curved
    }
}
