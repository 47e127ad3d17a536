//! Configuration for the registration pipeline (spec.md §6).

use crate::error::{Error, Result};
use crate::point::Point3f;

/// Which outlier-pruning operator component C3 (the graph pruner) applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum RobinMode {
    /// No graph pruning; C2's output is used as-is.
    None,
    /// Iteratively strip vertices of degree below the max non-empty k-core.
    #[default]
    MaxKCore,
    /// Exact maximum-clique extraction, falling back to max-k-core above
    /// [`RegistrationConfig::max_clique_vertices`].
    MaxClique,
}

/// Full, validated configuration for a [`crate::pipeline::Pipeline`].
///
/// Constructed with [`RegistrationConfig::new`], which applies the defaults
/// from spec.md §6 to any field the caller does not override via the
/// builder-style `with_*` methods, then validates eagerly.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegistrationConfig {
    /// Downsample grid size (m). Required; no default.
    pub voxel_size: f64,
    /// Apply voxel downsampling before C1.
    pub use_voxel_sampling: bool,
    /// C1 neighborhood radius for normal estimation.
    pub normal_radius: f64,
    /// C1 radius for the FPFH-style descriptor.
    pub fpfh_radius: f64,
    /// Reject neighborhoods with linearity `L >= thr_linearity`.
    pub thr_linearity: f64,
    /// `epsilon` used in the C3 edge-consistency test.
    pub robin_noise_bound: f64,
    /// Upper cap on the number of correspondences kept after C2.
    pub num_max_corr: usize,
    /// Geometric length-ratio tolerance for the C2 tuple-consistency filter.
    /// `0.0` disables the filter.
    pub tuple_scale: f64,
    /// Which pruning operator C3 applies.
    pub robin_mode: RobinMode,
    /// Enable the Lowe-style descriptor ratio test in C2.
    pub use_ratio_test: bool,
    /// Use the 2-DoF (yaw-only) Quatro rotation estimator instead of full
    /// GNC-TLS.
    pub use_quatro: bool,
    /// `c_hat` noise bound used by the GNC-TLS / Quatro rotation estimator
    /// and by the translation TLS estimator.
    pub solver_noise_bound: f64,
    /// Above this vertex count, [`RobinMode::MaxClique`] falls back to
    /// [`RobinMode::MaxKCore`] rather than paying for branch-and-bound.
    pub max_clique_vertices: usize,
    /// Minimum neighborhood size below which a point is dropped in C1.
    pub min_neighbors: usize,
    /// Known sensor position for C1 normal sign disambiguation. When
    /// `None`, normals are instead oriented consistently against the
    /// cloud centroid.
    pub sensor_origin: Option<Point3f>,
}

impl RegistrationConfig {
    /// Creates a configuration with spec.md §6 defaults derived from
    /// `voxel_size`, then validates it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `voxel_size` is not finite and
    /// positive.
    pub fn new(voxel_size: f64) -> Result<Self> {
        if !(voxel_size.is_finite() && voxel_size > 0.0) {
            return Err(Error::Configuration(format!(
                "voxel_size must be finite and positive, got {voxel_size}"
            )));
        }
        let cfg = Self {
            voxel_size,
            use_voxel_sampling: true,
            normal_radius: 2.0 * voxel_size,
            fpfh_radius: 5.0 * voxel_size,
            thr_linearity: 1.0,
            robin_noise_bound: 2.0 * voxel_size,
            num_max_corr: 5000,
            tuple_scale: 0.95,
            robin_mode: RobinMode::MaxKCore,
            use_ratio_test: false,
            use_quatro: false,
            solver_noise_bound: 2.0 * voxel_size,
            max_clique_vertices: 1000,
            min_neighbors: 4,
            sensor_origin: None,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks every field against the invariants of spec.md §6-§7.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("voxel_size", self.voxel_size),
            ("normal_radius", self.normal_radius),
            ("fpfh_radius", self.fpfh_radius),
            ("robin_noise_bound", self.robin_noise_bound),
            ("solver_noise_bound", self.solver_noise_bound),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Configuration(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.thr_linearity) {
            return Err(Error::Configuration(format!(
                "thr_linearity must be in [0, 1], got {}",
                self.thr_linearity
            )));
        }
        if !(self.tuple_scale == 0.0 || (0.0..1.0).contains(&self.tuple_scale)) {
            return Err(Error::Configuration(format!(
                "tuple_scale must be 0 (disabled) or in (0, 1), got {}",
                self.tuple_scale
            )));
        }
        if self.num_max_corr == 0 {
            return Err(Error::Configuration("num_max_corr must be positive".to_string()));
        }
        if self.min_neighbors < 3 {
            // Fewer than 3 neighbors cannot yield a rank-3 covariance matrix.
            return Err(Error::Configuration(format!(
                "min_neighbors must be >= 3, got {}",
                self.min_neighbors
            )));
        }
        Ok(())
    }

    /// Builder method overriding `normal_radius`.
    #[must_use]
    pub fn with_normal_radius(mut self, r: f64) -> Self {
        self.normal_radius = r;
        self
    }

    /// Builder method overriding `fpfh_radius`.
    #[must_use]
    pub fn with_fpfh_radius(mut self, r: f64) -> Self {
        self.fpfh_radius = r;
        self
    }

    /// Builder method overriding `thr_linearity`.
    #[must_use]
    pub fn with_thr_linearity(mut self, t: f64) -> Self {
        self.thr_linearity = t;
        self
    }

    /// Builder method overriding `robin_noise_bound`.
    #[must_use]
    pub fn with_robin_noise_bound(mut self, eps: f64) -> Self {
        self.robin_noise_bound = eps;
        self
    }

    /// Builder method overriding `robin_mode`.
    #[must_use]
    pub fn with_robin_mode(mut self, mode: RobinMode) -> Self {
        self.robin_mode = mode;
        self
    }

    /// Builder method overriding `tuple_scale`.
    #[must_use]
    pub fn with_tuple_scale(mut self, scale: f64) -> Self {
        self.tuple_scale = scale;
        self
    }

    /// Builder method overriding `use_ratio_test`.
    #[must_use]
    pub fn with_ratio_test(mut self, enabled: bool) -> Self {
        self.use_ratio_test = enabled;
        self
    }

    /// Builder method overriding `use_quatro`.
    #[must_use]
    pub fn with_quatro(mut self, enabled: bool) -> Self {
        self.use_quatro = enabled;
        self
    }

    /// Builder method overriding `solver_noise_bound`.
    #[must_use]
    pub fn with_solver_noise_bound(mut self, c_hat: f64) -> Self {
        self.solver_noise_bound = c_hat;
        self
    }

    /// Builder method overriding `use_voxel_sampling`.
    #[must_use]
    pub fn with_voxel_sampling(mut self, enabled: bool) -> Self {
        self.use_voxel_sampling = enabled;
        self
    }

    /// Builder method overriding `sensor_origin`.
    #[must_use]
    pub fn with_sensor_origin(mut self, origin: Point3f) -> Self {
        self.sensor_origin = Some(origin);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_derived_from_voxel_size() -> Result<()> {
        let cfg = RegistrationConfig::new(0.1)?;
        assert!((cfg.normal_radius - 0.2).abs() < 1e-12);
        assert!((cfg.fpfh_radius - 0.5).abs() < 1e-12);
        assert!((cfg.robin_noise_bound - 0.2).abs() < 1e-12);
        assert_eq!(cfg.robin_mode, RobinMode::MaxKCore);
        Ok(())
    }

    #[test]
    fn rejects_non_positive_voxel_size() {
        assert!(RegistrationConfig::new(0.0).is_err());
        assert!(RegistrationConfig::new(-1.0).is_err());
    }

    #[test]
    fn rejects_bad_tuple_scale() {
        let cfg = RegistrationConfig::new(0.1).unwrap().with_tuple_scale(1.5);
        assert!(cfg.validate().is_err());
    }
}
