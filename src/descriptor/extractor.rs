//! C1: normal estimation plus a fast, 33-bin point-feature-histogram
//! descriptor (spec.md §4.1).

use nalgebra::{Matrix3, SymmetricEigen, Vector3};
use rayon::prelude::*;

use crate::config::RegistrationConfig;
use crate::point::{Point3f, PointCloud};
use crate::spatial::{BallTree, NeighborIndex};

use super::{Descriptor, KeypointSet, DESCRIPTOR_BINS};

const ANGLE_BINS: usize = 11;

/// Computes keypoints and descriptors for `cloud` (spec.md §4.1 contract:
/// `compute(cloud) -> (keypoints, descriptors)`).
///
/// Points whose normal-radius neighborhood is too small, or whose
/// neighborhood is too linear (an edge rather than a surface patch), are
/// dropped; this never fails, it only shrinks the keypoint set (spec.md §4.1
/// Failure semantics).
#[must_use]
pub fn compute(cloud: &PointCloud, cfg: &RegistrationConfig) -> KeypointSet {
    if cloud.is_empty() {
        return KeypointSet::default();
    }

    let index = BallTree::build(cloud.points());
    let centroid = cloud.centroid();

    // Step 2-3: per-point neighborhood, covariance eigendecomposition,
    // linearity filter, normal estimation. Independent across points, so
    // this loop is data-parallel (spec.md §5).
    let normals: Vec<Option<Vector3<f64>>> = cloud
        .points()
        .par_iter()
        .map(|p| estimate_normal(p, &index, cloud, cfg, centroid))
        .collect();

    let surviving: Vec<usize> = normals
        .iter()
        .enumerate()
        .filter_map(|(i, n)| n.is_some().then_some(i))
        .collect();

    if surviving.is_empty() {
        log::warn!("descriptor extraction: no point survived the linearity/neighbor-count filter");
        return KeypointSet::default();
    }

    // Step 4: per-surviving-point histogram, against the fpfh-radius
    // neighborhood within the *surviving* set restricted to the original
    // cloud's neighbors (neighbors that were themselves filtered out still
    // contribute no normal, so they are skipped inside `histogram`).
    let descriptors: Vec<Descriptor> = surviving
        .par_iter()
        .map(|&i| histogram(i, cloud, &normals, &index, cfg))
        .collect();

    let points: Vec<Point3f> = surviving.iter().map(|&i| cloud[i]).collect();
    KeypointSet::new(points, descriptors, surviving)
}

/// Returns `Some(normal)` if `p`'s normal-radius neighborhood has at least
/// `cfg.min_neighbors` points and linearity `L < cfg.thr_linearity`.
fn estimate_normal(
    p: &Point3f,
    index: &BallTree<Point3f>,
    cloud: &PointCloud,
    cfg: &RegistrationConfig,
    centroid: Point3f,
) -> Option<Vector3<f64>> {
    let neighbors = index.query_radius(p, cfg.normal_radius);
    if neighbors.len() < cfg.min_neighbors {
        return None;
    }

    let pts: Vec<Vector3<f64>> = neighbors
        .iter()
        .map(|(idx, _)| crate::promote::to_point(cloud[*idx]).coords)
        .collect();
    #[allow(clippy::cast_precision_loss)]
    let n = pts.len() as f64;
    let mean = pts.iter().fold(Vector3::zeros(), |acc, v| acc + v) / n;

    let mut cov = Matrix3::zeros();
    for v in &pts {
        let d = v - mean;
        cov += d * d.transpose();
    }
    cov /= n;

    let eigen = SymmetricEigen::new(cov);
    // `SymmetricEigen` does not guarantee ordering; sort descending.
    let mut pairs: Vec<(f64, Vector3<f64>)> = (0..3)
        .map(|i| (eigen.eigenvalues[i], eigen.eigenvectors.column(i).into_owned()))
        .collect();
    pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(core::cmp::Ordering::Equal));
    let (lambda0, _) = pairs[0];
    let (lambda1, _) = pairs[1];
    let (_, normal) = pairs[2];

    if lambda0 <= 0.0 {
        return None;
    }
    let linearity = (lambda0 - lambda1) / lambda0;
    if linearity >= cfg.thr_linearity {
        return None;
    }

    Some(disambiguate_sign(normal, *p, centroid, cfg.sensor_origin))
}

/// Sign-disambiguation rule resolved by spec.md §9 Open Questions: point the
/// normal toward the sensor origin when known, else orient it consistently
/// against the cloud centroid so the extractor stays deterministic without
/// a sensor pose.
fn disambiguate_sign(normal: Vector3<f64>, at: Point3f, centroid: Point3f, sensor_origin: Option<Point3f>) -> Vector3<f64> {
    let reference = sensor_origin.unwrap_or(centroid);
    let to_reference = crate::promote::to_point(reference).coords - crate::promote::to_point(at).coords;
    if normal.dot(&to_reference) < 0.0 {
        -normal
    } else {
        normal
    }
}

/// Builds the 33-bin descriptor for keypoint `i` (an index into `cloud`,
/// i.e. the pre-filter index, matching the indices stored in `normals`).
fn histogram(
    i: usize,
    cloud: &PointCloud,
    normals: &[Option<Vector3<f64>>],
    index: &BallTree<Point3f>,
    cfg: &RegistrationConfig,
) -> Descriptor {
    let p = cloud[i];
    let n_p = normals[i].unwrap_or_else(|| unreachable!("histogram called only for surviving points"));

    let mut alpha_bins = [0.0_f32; ANGLE_BINS];
    let mut phi_bins = [0.0_f32; ANGLE_BINS];
    let mut theta_bins = [0.0_f32; ANGLE_BINS];

    let neighbors = index.query_radius(&p, cfg.fpfh_radius);
    for (j, _) in neighbors {
        if j == i {
            continue;
        }
        let Some(n_q) = normals[j] else { continue };
        let q = cloud[j];

        let d = crate::promote::to_point(q).coords - crate::promote::to_point(p).coords;
        let nd = d.norm();
        if nd <= f64::EPSILON {
            continue;
        }
        let d_hat = d / nd;

        let u = n_p;
        let v = u.cross(&d_hat);
        let w = u.cross(&v);

        let alpha = v.dot(&n_q);
        let phi = u.dot(&d_hat);
        let theta = w.dot(&n_q).atan2(u.dot(&n_q));

        bump(&mut alpha_bins, alpha, -1.0, 1.0);
        bump(&mut phi_bins, phi, -1.0, 1.0);
        bump(&mut theta_bins, theta, -core::f64::consts::FRAC_PI_2, core::f64::consts::FRAC_PI_2);
    }

    let mut bins = [0.0_f32; DESCRIPTOR_BINS];
    bins[0..ANGLE_BINS].copy_from_slice(&alpha_bins);
    bins[ANGLE_BINS..2 * ANGLE_BINS].copy_from_slice(&phi_bins);
    bins[2 * ANGLE_BINS..3 * ANGLE_BINS].copy_from_slice(&theta_bins);

    let mut descriptor = Descriptor(bins);
    descriptor.l1_normalize();
    descriptor
}

/// Increments the bin of `histogram` that `value` (clamped to `[lo, hi]`)
/// falls into.
fn bump(histogram: &mut [f32; ANGLE_BINS], value: f64, lo: f64, hi: f64) {
    let clamped = value.clamp(lo, hi);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let bin = (((clamped - lo) / (hi - lo)) * (ANGLE_BINS as f64)).floor() as usize;
    let bin = bin.min(ANGLE_BINS - 1);
    histogram[bin] += 1.0;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane_cloud() -> PointCloud {
        let mut pts = Vec::new();
        for x in -5..=5 {
            for y in -5..=5 {
                pts.push(Point3f::new(f32::from(x) * 0.1, f32::from(y) * 0.1, 0.0));
            }
        }
        PointCloud::new(pts)
    }

    #[test]
    fn drops_points_with_too_few_neighbors_or_linear_patches() {
        let cloud = plane_cloud();
        let cfg = RegistrationConfig::new(0.1).unwrap().with_thr_linearity(0.99);
        let keypoints = compute(&cloud, &cfg);
        // Interior points of a flat grid have isotropic (planar) neighborhoods
        // and survive; the extreme corners may not have enough neighbors.
        assert!(!keypoints.is_empty());
        assert!(keypoints.len() <= cloud.len());
    }

    #[test]
    fn descriptors_are_l1_normalized() {
        let cloud = plane_cloud();
        let cfg = RegistrationConfig::new(0.1).unwrap().with_thr_linearity(0.99);
        let keypoints = compute(&cloud, &cfg);
        for d in keypoints.descriptors() {
            let sum: f32 = d.0.iter().sum();
            assert!(sum <= 100.0 + 1e-3);
        }
    }

    #[test]
    fn empty_cloud_yields_empty_keypoints() {
        let cloud = PointCloud::new(Vec::new());
        let cfg = RegistrationConfig::new(0.1).unwrap();
        assert!(compute(&cloud, &cfg).is_empty());
    }
}
