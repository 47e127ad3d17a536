//! Voxel-grid downsampling (spec.md §4.1 preprocessing step, out of scope
//! for the extractor itself but a required collaborator ahead of it).
//!
//! Downsampling is modeled behind a trait so an alternative (e.g. random or
//! farthest-point sampling) can be swapped in without touching C1; the
//! default keeps one representative point (its centroid) per occupied grid
//! cell, the common registration-preprocessing scheme.

use std::collections::HashMap;

use crate::point::{Point3f, PointCloud};

/// A point-cloud downsampling strategy.
pub trait VoxelDownsampler {
    /// Returns a new cloud with at most one point per occupied cell of a
    /// grid with edge length `voxel_size`.
    fn downsample(&self, cloud: &PointCloud, voxel_size: f64) -> PointCloud;
}

/// Groups points into cubic cells and replaces each occupied cell with the
/// centroid of the points that fell into it.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridVoxelDownsampler;

impl VoxelDownsampler for GridVoxelDownsampler {
    fn downsample(&self, cloud: &PointCloud, voxel_size: f64) -> PointCloud {
        if cloud.is_empty() || voxel_size <= 0.0 {
            return cloud.clone();
        }

        let mut cells: HashMap<(i64, i64, i64), (nalgebra::Vector3<f64>, usize)> = HashMap::new();
        for p in cloud.points() {
            let key = cell_key(*p, voxel_size);
            let entry = cells.entry(key).or_insert((nalgebra::Vector3::zeros(), 0));
            entry.0 += crate::promote::to_point(*p).coords;
            entry.1 += 1;
        }

        let mut keys: Vec<(i64, i64, i64)> = cells.keys().copied().collect();
        // Deterministic output order regardless of hash-map iteration order.
        keys.sort_unstable();

        let points: Vec<Point3f> = keys
            .into_iter()
            .map(|k| {
                let (sum, count) = cells[&k];
                #[allow(clippy::cast_precision_loss)]
                let mean = sum / (count as f64);
                Point3f::new(mean.x as f32, mean.y as f32, mean.z as f32)
            })
            .collect();
        PointCloud::new(points)
    }
}

fn cell_key(p: Point3f, voxel_size: f64) -> (i64, i64, i64) {
    #[allow(clippy::cast_possible_truncation)]
    let to_cell = |v: f32| (f64::from(v) / voxel_size).floor() as i64;
    (to_cell(p.x), to_cell(p.y), to_cell(p.z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_points_within_the_same_cell() {
        let cloud = PointCloud::new(vec![
            Point3f::new(0.01, 0.01, 0.01),
            Point3f::new(0.02, -0.01, 0.0),
            Point3f::new(5.0, 5.0, 5.0),
        ]);
        let down = GridVoxelDownsampler.downsample(&cloud, 0.1);
        assert_eq!(down.len(), 2);
    }

    #[test]
    fn empty_cloud_stays_empty() {
        let cloud = PointCloud::default();
        let down = GridVoxelDownsampler.downsample(&cloud, 0.1);
        assert!(down.is_empty());
    }
}
