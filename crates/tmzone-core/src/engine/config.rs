use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Parameters of the normal sweep and the slice fitness scan.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerConfig {
    /// Angular step of the normal sweep in radians.
    pub ball_distance: f64,
    /// Sample the whole sphere of normals instead of one hemisphere.
    pub full_sphere: bool,
    pub min_half_thickness: f64,
    pub max_half_thickness: f64,
    /// Q value a slice window must exceed to count as a membrane.
    pub minimum_q_value: f64,
    /// Q value that bounds the extent of an accepted membrane window.
    pub membrane_q_value: f64,
    /// Maximum interfacial helix fraction of a slice at the window edge.
    pub ifh_ceiling: f64,
    /// Maximum angle (degrees) between an alpha vector and the plane for it to count as
    /// interfacial in the slice score.
    pub ifh_parallel_angle: f64,
    /// A second membrane centred closer than this many slices to the slice array edge is
    /// discarded.
    pub second_membrane_edge_margin: usize,
    /// Slices cleared on both sides of an emitted membrane.
    pub cleared_margin: usize,
    pub single_membrane: bool,
    /// Fit a spherical membrane surface instead of a plane.
    pub curved: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            ball_distance: 0.15,
            full_sphere: false,
            min_half_thickness: 6.5,
            max_half_thickness: 15.0,
            minimum_q_value: 48.0,
            membrane_q_value: 40.0,
            ifh_ceiling: 0.07,
            ifh_parallel_angle: 20.0,
            second_membrane_edge_margin: 12,
            cleared_margin: 60,
            single_membrane: false,
            curved: false,
        }
    }
}

/// Parameters of the region annotation heuristics.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnotatorConfig {
    /// Chains with fewer selected residues are left out.
    pub min_residues_in_chain: usize,
    /// Half-thickness of the membrane core used for the `ttype` pass.
    pub core_half_thickness: f64,
    /// A membrane run must be longer than this to become a transmembrane helix.
    pub min_helix_length: usize,
    /// Same as `min_helix_length` for runs touching a chain terminus.
    pub min_terminal_helix_length: usize,
    /// Fraction of a membrane run one helix must cover to form a re-entrant loop.
    pub loop_helix_occupancy: f64,
    /// Depth a re-entrant loop must reach beyond its boundary residues.
    pub loop_depth_rise: f64,
    /// Both ends of a re-entrant loop candidate must be shallower than this.
    pub loop_max_boundary_depth: f64,
    /// Unresolved membrane residue count above which the placement is rejected.
    pub max_unresolved_membrane_residues: usize,
    /// Beta-dominant proteins need at least this many beta residues.
    pub min_beta_residues: usize,
    /// Alpha vectors with fewer residues are not considered as interfacial helices.
    pub ifh_min_length: usize,
    /// Maximum angle (degrees) between an interfacial helix and the membrane plane.
    pub ifh_max_plane_angle: f64,
    /// Maximum distance between the helix midpoint and the membrane surface.
    pub ifh_max_surface_distance: f64,
    /// Minimum mean accessible surface per helix residue.
    pub ifh_min_mean_surface: f64,
    pub ifh_min_hydrophobic_moment: f64,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            min_residues_in_chain: 15,
            core_half_thickness: 4.0,
            min_helix_length: 10,
            min_terminal_helix_length: 6,
            loop_helix_occupancy: 0.29,
            loop_depth_rise: 3.0,
            loop_max_boundary_depth: 10.0,
            max_unresolved_membrane_residues: 1000,
            min_beta_residues: 8,
            ifh_min_length: 3,
            ifh_max_plane_angle: 30.0,
            ifh_max_surface_distance: 9.0,
            ifh_min_mean_surface: 20.0,
            ifh_min_hydrophobic_moment: 0.2,
        }
    }
}

/// Parameters of sheet and barrel detection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BetaConfig {
    /// Barrel detection runs only with at least this many candidate sheets.
    pub min_candidate_sheets: usize,
    /// Strands lying flatter than this angle (degrees) to the plane are not sheets.
    pub min_sheet_plane_angle: f64,
    /// Neighbour search radius between alpha carbons.
    pub neighbor_radius: f64,
    /// Carbonyl angles below this or above its supplement count as a contact.
    pub contact_angle: f64,
    /// Contacts needed to join a sheet to a growing barrel.
    pub min_contacts: usize,
    pub min_barrel_sheets: usize,
    /// Pore residues deeper than this become membrane-inside.
    pub inside_depth: f64,
}

impl Default for BetaConfig {
    fn default() -> Self {
        Self {
            min_candidate_sheets: 8,
            min_sheet_plane_angle: 10.0,
            neighbor_radius: 5.5,
            contact_angle: 50.0,
            min_contacts: 2,
            min_barrel_sheets: 8,
            inside_depth: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnnotationConfig {
    /// Run region annotation after the membrane placement.
    pub annotate: bool,
    pub optimizer: OptimizerConfig,
    pub annotator: AnnotatorConfig,
    pub beta: BetaConfig,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            annotate: true,
            optimizer: OptimizerConfig::default(),
            annotator: AnnotatorConfig::default(),
            beta: BetaConfig::default(),
        }
    }
}

impl AnnotationConfig {
    /// Reads a configuration from a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let o = &self.optimizer;
        if !(o.ball_distance > 0.0 && o.ball_distance < std::f64::consts::PI) {
            return Err(invalid("ball_distance", "must lie in (0, pi)"));
        }
        if !(o.min_half_thickness > 0.0) {
            return Err(invalid("min_half_thickness", "must be positive"));
        }
        if o.max_half_thickness < o.min_half_thickness {
            return Err(invalid(
                "max_half_thickness",
                "must not be smaller than min_half_thickness",
            ));
        }
        if o.membrane_q_value > o.minimum_q_value {
            return Err(invalid(
                "membrane_q_value",
                "must not exceed minimum_q_value",
            ));
        }
        if !(0.0..=1.0).contains(&o.ifh_ceiling) {
            return Err(invalid("ifh_ceiling", "must lie in [0, 1]"));
        }
        let a = &self.annotator;
        if !(0.0..=1.0).contains(&a.loop_helix_occupancy) {
            return Err(invalid("loop_helix_occupancy", "must lie in [0, 1]"));
        }
        if a.core_half_thickness < 0.0 {
            return Err(invalid("core_half_thickness", "must not be negative"));
        }
        let b = &self.beta;
        if !(b.neighbor_radius > 0.0) {
            return Err(invalid("neighbor_radius", "must be positive"));
        }
        if !(0.0..=90.0).contains(&b.contact_angle) {
            return Err(invalid("contact_angle", "must lie in [0, 90]"));
        }
        if b.min_barrel_sheets == 0 {
            return Err(invalid("min_barrel_sheets", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

#[derive(Default)]
pub struct AnnotationConfigBuilder {
    config: AnnotationConfig,
}

impl AnnotationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn annotate(mut self, annotate: bool) -> Self {
        self.config.annotate = annotate;
        self
    }
    pub fn ball_distance(mut self, radians: f64) -> Self {
        self.config.optimizer.ball_distance = radians;
        self
    }
    pub fn full_sphere(mut self, full_sphere: bool) -> Self {
        self.config.optimizer.full_sphere = full_sphere;
        self
    }
    pub fn half_thickness_range(mut self, min: f64, max: f64) -> Self {
        self.config.optimizer.min_half_thickness = min;
        self.config.optimizer.max_half_thickness = max;
        self
    }
    pub fn single_membrane(mut self, single: bool) -> Self {
        self.config.optimizer.single_membrane = single;
        self
    }
    pub fn curved(mut self, curved: bool) -> Self {
        self.config.optimizer.curved = curved;
        self
    }
    pub fn min_residues_in_chain(mut self, n: usize) -> Self {
        self.config.annotator.min_residues_in_chain = n;
        self
    }
    pub fn optimizer(mut self, optimizer: OptimizerConfig) -> Self {
        self.config.optimizer = optimizer;
        self
    }
    pub fn annotator(mut self, annotator: AnnotatorConfig) -> Self {
        self.config.annotator = annotator;
        self
    }
    pub fn beta(mut self, beta: BetaConfig) -> Self {
        self.config.beta = beta;
        self
    }

    pub fn build(self) -> Result<AnnotationConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn builder_defaults_are_valid() {
        let config = AnnotationConfigBuilder::new().build().unwrap();
        assert_eq!(config, AnnotationConfig::default());
        assert!(config.annotate);
        assert_eq!(config.optimizer.minimum_q_value, 48.0);
        assert_eq!(config.beta.min_barrel_sheets, 8);
        assert_eq!(config.annotator.min_residues_in_chain, 15);
        assert_eq!(config.annotator.ifh_min_length, 3);
    }

    #[test]
    fn builder_rejects_inverted_half_thickness_range() {
        let result = AnnotationConfigBuilder::new()
            .half_thickness_range(15.0, 6.5)
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                field: "max_half_thickness",
                ..
            })
        ));
    }

    #[test]
    fn builder_rejects_zero_ball_distance() {
        let result = AnnotationConfigBuilder::new().ball_distance(0.0).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue {
                field: "ball_distance",
                ..
            })
        ));
    }

    #[test]
    fn load_reads_partial_toml_and_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tmzone.toml");
        let mut file = File::create(&path).unwrap();
        writeln!(
            file,
            r#"
            annotate = false

            [optimizer]
            single_membrane = true
            max_half_thickness = 20.0

            [beta]
            neighbor_radius = 6.0
            "#
        )
        .unwrap();

        let config = AnnotationConfig::load(&path).unwrap();
        assert!(!config.annotate);
        assert!(config.optimizer.single_membrane);
        assert_eq!(config.optimizer.max_half_thickness, 20.0);
        assert_eq!(config.optimizer.min_half_thickness, 6.5);
        assert_eq!(config.beta.neighbor_radius, 6.0);
        assert_eq!(config.annotator, AnnotatorConfig::default());
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[optimizer]\nthickness = 3.0\n").unwrap();
        assert!(matches!(
            AnnotationConfig::load(&path),
            Err(ConfigError::Toml { .. })
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(matches!(
            AnnotationConfig::load(&path),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn load_validates_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.toml");
        std::fs::write(&path, "[beta]\ncontact_angle = 120.0\n").unwrap();
        assert!(matches!(
            AnnotationConfig::load(&path),
            Err(ConfigError::InvalidValue {
                field: "contact_angle",
                ..
            })
        ));
    }
}
