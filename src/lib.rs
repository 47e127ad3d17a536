//! Correspondence-based rigid registration of 3D point clouds under heavy
//! (90-99%) outlier correspondence ratios.
//!
//! The pipeline runs four stages end to end:
//!
//! - C1 ([`descriptor`]): per-point normal estimation and a 33-bin
//!   point-feature-histogram descriptor.
//! - C2 ([`correspondence`]): mutual-nearest-neighbor matching in
//!   descriptor space, with optional ratio and tuple-consistency filters.
//! - C3 ([`graph`]): graph-theoretic outlier pruning (max-k-core or
//!   max-clique) over a pairwise length-consistency graph.
//! - C4 ([`solver`]): a robust `SE(3)` solver decoupling rotation
//!   (GNC-TLS or the 2-DoF Quatro variant) from translation (componentwise
//!   adaptive TLS).
//!
//! [`pipeline::Pipeline`] wires all four stages together; [`config`],
//! [`point`], and [`error`] are shared across every stage.

pub mod config;
pub mod correspondence;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod point;
pub mod promote;
pub mod rng;
pub mod solver;
pub mod spatial;
mod utils;
pub mod voxel;

pub use config::{RegistrationConfig, RobinMode};
pub use error::{Error, Result};
pub use pipeline::{PhaseTimings, Pipeline};
pub use point::{Point3d, Point3f, PointCloud};
pub use solver::RegistrationSolution;
