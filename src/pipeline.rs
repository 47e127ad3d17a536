//! C5: the end-to-end registration façade (spec.md §4.5), wiring C1-C4
//! together and exposing per-phase diagnostics.

use std::time::{Duration, Instant};

use rand::Rng;

use crate::config::RegistrationConfig;
use crate::correspondence::{search, CorrespondenceSet};
use crate::descriptor::{self, KeypointSet};
use crate::graph;
use crate::point::{Point3f, PointCloud};
use crate::solver::{RegistrationSolution, Solver};
use crate::voxel::{GridVoxelDownsampler, VoxelDownsampler};

/// Wall-clock duration of each phase of the most recent [`Pipeline::estimate`]
/// or [`Pipeline::match_clouds`] call. Zeroed before the relevant call runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    /// Voxel downsampling of both input clouds.
    pub downsample: Duration,
    /// C1 descriptor extraction over both clouds.
    pub extract: Duration,
    /// C2 correspondence search plus C3 graph pruning.
    pub correspond: Duration,
    /// C4 robust SE(3) solving.
    pub solve: Duration,
}

/// A reusable registration pipeline over a fixed [`RegistrationConfig`].
///
/// One instance is meant to be reused across many cloud pairs: it owns no
/// per-call state beyond the last call's diagnostics, so instantiation cost
/// (config validation) is paid once.
pub struct Pipeline {
    cfg: RegistrationConfig,
    downsampler: GridVoxelDownsampler,
    solver: Solver,
    timings: PhaseTimings,
    initial_correspondences: usize,
    pruned_correspondences: usize,
}

impl Pipeline {
    /// Builds a pipeline over `cfg`.
    #[must_use]
    pub fn new(cfg: RegistrationConfig) -> Self {
        Self {
            cfg,
            downsampler: GridVoxelDownsampler,
            solver: Solver::new(),
            timings: PhaseTimings::default(),
            initial_correspondences: 0,
            pruned_correspondences: 0,
        }
    }

    /// The configuration this pipeline was built with.
    #[must_use]
    pub fn config(&self) -> &RegistrationConfig {
        &self.cfg
    }

    /// Per-phase timings from the most recent [`Self::estimate`] or
    /// [`Self::match_clouds`] call.
    #[must_use]
    pub fn timings(&self) -> PhaseTimings {
        self.timings
    }

    /// Number of correspondences C2 produced, before C3 pruning.
    #[must_use]
    pub fn initial_correspondence_count(&self) -> usize {
        self.initial_correspondences
    }

    /// Number of correspondences remaining after C3 pruning.
    #[must_use]
    pub fn pruned_correspondence_count(&self) -> usize {
        self.pruned_correspondences
    }

    /// Rotation inliers from the most recent [`Self::estimate`] call, if any.
    #[must_use]
    pub fn rotation_inlier_count(&self) -> usize {
        self.solver.last().map_or(0, |s| s.rot_inliers.len())
    }

    /// Translation inliers from the most recent [`Self::estimate`] call, if
    /// any.
    #[must_use]
    pub fn translation_inlier_count(&self) -> usize {
        self.solver.last().map_or(0, |s| s.trans_inliers.len())
    }

    /// Runs C1 -> C2 -> C3 and returns the matched point pairs (spec.md §4.5
    /// contract: `match(S, T) -> (S_matched, T_matched)`), in correspondence
    /// order.
    pub fn match_clouds(
        &mut self,
        src: &PointCloud,
        tgt: &PointCloud,
        rng: &mut impl Rng,
    ) -> (Vec<Point3f>, Vec<Point3f>) {
        let t0 = Instant::now();
        let (src_prepped, tgt_prepped) = self.downsample_both(src, tgt);
        self.timings.downsample = t0.elapsed();

        let t1 = Instant::now();
        let src_keypoints = descriptor::extractor::compute(&src_prepped, &self.cfg);
        let tgt_keypoints = descriptor::extractor::compute(&tgt_prepped, &self.cfg);
        self.timings.extract = t1.elapsed();

        let t2 = Instant::now();
        let (matched_src, matched_tgt, corr_initial, corr_pruned) =
            self.correspond(&src_keypoints, &tgt_keypoints, rng);
        self.timings.correspond = t2.elapsed();
        self.initial_correspondences = corr_initial;
        self.pruned_correspondences = corr_pruned;

        (matched_src, matched_tgt)
    }

    /// Runs [`Self::match_clouds`] then C4, returning a
    /// [`RegistrationSolution`] (spec.md §4.5 contract: `estimate(S, T) ->
    /// RegistrationSolution`).
    pub fn estimate(
        &mut self,
        src: &PointCloud,
        tgt: &PointCloud,
        rng: &mut impl Rng,
    ) -> RegistrationSolution {
        let (matched_src, matched_tgt) = self.match_clouds(src, tgt, rng);

        let t3 = Instant::now();
        let s_m = crate::promote::to_matrix(&matched_src);
        let t_m = crate::promote::to_matrix(&matched_tgt);
        let solution = self.solver.solve(&s_m, &t_m, &self.cfg, rng);
        self.timings.solve = t3.elapsed();

        solution
    }

    fn downsample_both(&self, src: &PointCloud, tgt: &PointCloud) -> (PointCloud, PointCloud) {
        if !self.cfg.use_voxel_sampling {
            return (src.clone(), tgt.clone());
        }
        (
            self.downsampler.downsample(src, self.cfg.voxel_size),
            self.downsampler.downsample(tgt, self.cfg.voxel_size),
        )
    }

    fn correspond(
        &self,
        src_keypoints: &KeypointSet,
        tgt_keypoints: &KeypointSet,
        rng: &mut impl Rng,
    ) -> (Vec<Point3f>, Vec<Point3f>, usize, usize) {
        let initial = search::establish_correspondences(src_keypoints, tgt_keypoints, &self.cfg, rng);
        let initial_count = initial.len();

        let pruned: CorrespondenceSet = graph::prune_correspondences(
            &initial,
            src_keypoints.points(),
            tgt_keypoints.points(),
            self.cfg.robin_noise_bound,
            self.cfg.robin_mode,
            self.cfg.max_clique_vertices,
        );

        let matched_src: Vec<Point3f> = pruned.as_slice().iter().map(|c| src_keypoints.points()[c.src]).collect();
        let matched_tgt: Vec<Point3f> = pruned.as_slice().iter().map(|c| tgt_keypoints.points()[c.tgt]).collect();

        (matched_src, matched_tgt, initial_count, pruned.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_clouds_yield_invalid_solution_with_no_solve_cost() {
        let cfg = RegistrationConfig::new(0.1).unwrap();
        let mut pipeline = Pipeline::new(cfg);
        let mut rng = crate::rng::from_seed(0);
        let empty = PointCloud::default();

        let solution = pipeline.estimate(&empty, &empty, &mut rng);
        assert!(!solution.valid);
        assert_eq!(pipeline.initial_correspondence_count(), 0);
        assert_eq!(pipeline.pruned_correspondence_count(), 0);
    }
}
