//! End-to-end scenarios over the [`robin_register::Pipeline`] façade.

use nalgebra::{Rotation3, Vector3};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use robin_register::{Point3f, PointCloud, RegistrationConfig, RobinMode};

fn uniform_cloud(n: usize, rng: &mut impl Rng) -> PointCloud {
    let dist = Uniform::new(0.0_f32, 1.0_f32);
    let points: Vec<Point3f> = (0..n)
        .map(|_| Point3f::new(dist.sample(rng), dist.sample(rng), dist.sample(rng)))
        .collect();
    PointCloud::new(points)
}

fn apply_rigid(cloud: &PointCloud, r: &Rotation3<f32>, t: Vector3<f32>) -> PointCloud {
    let points: Vec<Point3f> = cloud.points().iter().map(|p| r * p + t).collect();
    PointCloud::new(points)
}

#[test]
fn unit_cube_corner_translation_is_recovered() {
    let mut rng = robin_register::rng::from_seed(1);
    let dist = Uniform::new(0.0_f32, 0.2_f32); // a corner patch, not the full cube
    let src_points: Vec<Point3f> = (0..1000)
        .map(|_| Point3f::new(dist.sample(&mut rng), dist.sample(&mut rng), dist.sample(&mut rng)))
        .collect();
    let src = PointCloud::new(src_points);
    let tgt = apply_rigid(&src, &Rotation3::identity(), Vector3::new(0.3, 0.0, 0.0));

    let cfg = RegistrationConfig::new(0.02).unwrap();
    let mut pipeline = robin_register::Pipeline::new(cfg);
    let solution = pipeline.estimate(&src, &tgt, &mut rng);

    assert!(solution.valid);
    let expected = nalgebra::Vector3::new(0.3_f64, 0.0, 0.0);
    assert!((solution.translation - expected).norm() < 0.01);
}

#[test]
fn rotation_is_recovered_under_heavy_descriptor_mismatch() {
    let mut rng = robin_register::rng::from_seed(2);
    let src = uniform_cloud(300, &mut rng);
    let yaw = 30.0_f32.to_radians();
    let r_true = Rotation3::from_axis_angle(&Vector3::z_axis(), yaw);
    let tgt = apply_rigid(&src, &r_true, Vector3::zeros());

    let cfg = RegistrationConfig::new(0.03).unwrap().with_robin_mode(RobinMode::MaxKCore);
    let mut pipeline = robin_register::Pipeline::new(cfg);
    let solution = pipeline.estimate(&src, &tgt, &mut rng);

    assert!(solution.valid);
    let recovered_yaw = solution.rotation[(1, 0)].atan2(solution.rotation[(0, 0)]);
    assert!((recovered_yaw.to_degrees() - 30.0).abs() < 2.0, "got {}", recovered_yaw.to_degrees());
}

#[test]
fn coplanar_input_is_invalid() {
    let mut rng = robin_register::rng::from_seed(3);
    let dist = Uniform::new(-1.0_f32, 1.0_f32);
    let src_points: Vec<Point3f> = (0..200)
        .map(|_| Point3f::new(dist.sample(&mut rng), dist.sample(&mut rng), 0.0))
        .collect();
    let src = PointCloud::new(src_points);
    let tgt = apply_rigid(&src, &Rotation3::identity(), Vector3::new(0.1, -0.05, 0.0));

    let cfg = RegistrationConfig::new(0.1).unwrap();
    let mut pipeline = robin_register::Pipeline::new(cfg);
    let solution = pipeline.estimate(&src, &tgt, &mut rng);

    assert!(!solution.valid);
}

#[test]
fn empty_inputs_are_invalid_with_no_solve_work() {
    let mut rng = robin_register::rng::from_seed(4);
    let cfg = RegistrationConfig::new(0.1).unwrap();
    let mut pipeline = robin_register::Pipeline::new(cfg);
    let empty = PointCloud::default();

    let solution = pipeline.estimate(&empty, &empty, &mut rng);

    assert!(!solution.valid);
    assert_eq!(solution.rotation, nalgebra::Matrix3::identity());
    assert_eq!(solution.translation, Vector3::zeros());
    assert_eq!(pipeline.initial_correspondence_count(), 0);
}

#[test]
fn non_overlapping_clouds_prune_to_a_small_set_and_do_not_panic() {
    let mut rng = robin_register::rng::from_seed(5);
    let src = uniform_cloud(200, &mut rng);
    let far_dist = Uniform::new(1000.0_f32, 1001.0_f32);
    let tgt_points: Vec<Point3f> = (0..200)
        .map(|_| Point3f::new(far_dist.sample(&mut rng), far_dist.sample(&mut rng), far_dist.sample(&mut rng)))
        .collect();
    let tgt = PointCloud::new(tgt_points);

    let cfg = RegistrationConfig::new(0.05).unwrap();
    let mut pipeline = robin_register::Pipeline::new(cfg);
    let _solution = pipeline.estimate(&src, &tgt, &mut rng);

    assert!(pipeline.pruned_correspondence_count() <= pipeline.initial_correspondence_count());
}

#[test]
fn quatro_recovers_yaw_on_a_ground_aligned_scan() {
    let mut rng = robin_register::rng::from_seed(6);
    let dist_xy = Uniform::new(-1.0_f32, 1.0_f32);
    let dist_z = Uniform::new(0.0_f32, 0.1_f32); // thin, ground-aligned slab
    let src_points: Vec<Point3f> = (0..400)
        .map(|_| Point3f::new(dist_xy.sample(&mut rng), dist_xy.sample(&mut rng), dist_z.sample(&mut rng)))
        .collect();
    let src = PointCloud::new(src_points);
    let r_true = Rotation3::from_axis_angle(&Vector3::z_axis(), 45.0_f32.to_radians());
    let tgt = apply_rigid(&src, &r_true, Vector3::zeros());

    let cfg = RegistrationConfig::new(0.03).unwrap().with_quatro(true);
    let mut pipeline = robin_register::Pipeline::new(cfg);
    let solution = pipeline.estimate(&src, &tgt, &mut rng);

    assert!(solution.valid);
    let recovered_yaw = solution.rotation[(1, 0)].atan2(solution.rotation[(0, 0)]);
    assert!((recovered_yaw.to_degrees() - 45.0).abs() < 1.0, "got {}", recovered_yaw.to_degrees());
}
