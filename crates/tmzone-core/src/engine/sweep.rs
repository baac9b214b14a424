use super::config::OptimizerConfig;
use super::error::EngineError;
use nalgebra::{Point3, Unit, Vector3};
use std::f64::consts::{FRAC_PI_2, PI, TAU};
use tracing::debug;

const POLE_EPSILON: f64 = 1e-10;
const ANGLE_EPSILON: f64 = 1e-12;

/// A membrane normal proposed by an external symmetry analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetryCandidate {
    pub normal: Vector3<f64>,
    /// Point on the symmetry axis; the mass centre is used when absent.
    pub origin: Option<Point3<f64>>,
}

/// A normalized candidate direction, in the order it must be evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalCandidate {
    pub normal: Unit<Vector3<f64>>,
    pub origin: Option<Point3<f64>>,
}

/// Spherical sampling of membrane normals.
///
/// The polar angle `alpha` advances by `step` radians from the +z pole. For every
/// `alpha` the azimuth advances by `step / sin(alpha)`, so neighbouring directions stay
/// roughly `step` apart on the unit sphere; a pole yields a single direction.
#[derive(Debug, Clone)]
pub struct NormalSweep {
    step: f64,
    max_alpha: f64,
    alpha_index: usize,
    beta: f64,
}

impl NormalSweep {
    pub fn new(step: f64, full_sphere: bool) -> Self {
        Self {
            step,
            max_alpha: if full_sphere { PI } else { FRAC_PI_2 },
            alpha_index: 0,
            beta: 0.0,
        }
    }

    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self::new(config.ball_distance, config.full_sphere || config.curved)
    }
}

impl Iterator for NormalSweep {
    type Item = Unit<Vector3<f64>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.step <= 0.0 {
            return None;
        }
        loop {
            let alpha = self.alpha_index as f64 * self.step;
            if alpha > self.max_alpha + ANGLE_EPSILON {
                return None;
            }
            if self.beta >= TAU {
                self.alpha_index += 1;
                self.beta = 0.0;
                continue;
            }
            let sin_alpha = alpha.sin();
            let beta = self.beta;
            self.beta = if sin_alpha < POLE_EPSILON {
                TAU
            } else {
                beta + self.step / sin_alpha
            };
            let normal = Vector3::new(
                beta.cos() * sin_alpha,
                beta.sin() * sin_alpha,
                alpha.cos(),
            );
            return Some(Unit::new_normalize(normal));
        }
    }
}

/// Symmetry-derived candidates first, then the spherical sweep.
///
/// Earlier candidates win ties during optimization, so the order is significant.
pub fn candidates(
    symmetry: &[SymmetryCandidate],
    config: &OptimizerConfig,
) -> Result<Vec<NormalCandidate>, EngineError> {
    let mut candidates = symmetry
        .iter()
        .map(|candidate| {
            Unit::try_new(candidate.normal, ANGLE_EPSILON)
                .map(|normal| NormalCandidate {
                    normal,
                    origin: candidate.origin,
                })
                .ok_or_else(|| {
                    EngineError::InvalidInput("symmetry candidate has a zero normal".to_string())
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    candidates.extend(
        NormalSweep::from_config(config).map(|normal| NormalCandidate {
            normal,
            origin: None,
        }),
    );
    debug!(
        symmetry = symmetry.len(),
        total = candidates.len(),
        "Candidate normals prepared."
    );
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sweep_starts_at_the_pole_with_a_single_direction() {
        let normals: Vec<_> = NormalSweep::new(0.15, false).collect();
        assert!((normals[0].into_inner() - Vector3::z()).norm() < 1e-12);
        assert!(normals[1].z < 1.0 - 1e-6);
        assert!(normals.iter().all(|n| (n.norm() - 1.0).abs() < 1e-12));
    }

    #[test]
    fn hemisphere_sweep_stays_above_the_equator() {
        let normals: Vec<_> = NormalSweep::new(0.15, false).collect();
        assert!(normals.iter().all(|n| n.z >= 0.0));
        let full: Vec<_> = NormalSweep::new(0.15, true).collect();
        assert!(full.len() > normals.len());
        assert!(full.iter().any(|n| n.z < -0.9));
    }

    #[test]
    fn sweep_covers_the_hemisphere_within_one_step() {
        let step = 0.15;
        let normals: Vec<_> = NormalSweep::new(step, false).collect();
        for target in [
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::new(1.0, -2.0, 0.3),
            Vector3::new(-1.0, 0.0, 0.1),
            Vector3::z(),
        ] {
            let target = target.normalize();
            let closest = normals
                .iter()
                .map(|n| n.dot(&target).clamp(-1.0, 1.0).acos())
                .fold(f64::INFINITY, f64::min);
            assert!(closest <= step, "closest angle {closest} for {target:?}");
        }
    }

    #[test]
    fn symmetry_candidates_come_first_and_are_normalized() {
        let symmetry = [SymmetryCandidate {
            normal: Vector3::new(0.0, 3.0, 0.0),
            origin: Some(Point3::new(1.0, 2.0, 3.0)),
        }];
        let all = candidates(&symmetry, &OptimizerConfig::default()).unwrap();
        assert_eq!(all[0].normal.into_inner(), Vector3::y());
        assert_eq!(all[0].origin, Some(Point3::new(1.0, 2.0, 3.0)));
        assert!(all[1..].iter().all(|c| c.origin.is_none()));
    }

    #[test]
    fn zero_symmetry_normal_is_invalid_input() {
        let symmetry = [SymmetryCandidate {
            normal: Vector3::zeros(),
            origin: None,
        }];
        assert!(matches!(
            candidates(&symmetry, &OptimizerConfig::default()),
            Err(EngineError::InvalidInput(_))
        ));
    }
}
