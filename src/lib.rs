//! Procedural city block subdivision and building massing.
//!
//! Blocks produced by the road network are cut into lots along their
//! straight skeleton and a family of parallel dividers, resolved through an
//! exact planar arrangement. Lots are then filled by developers, and each
//! building footprint is extruded into walls plus a styled roof.
//!
//! - [`geom`]: exact and floating-point kernels, triangulation
//! - [`procgen`]: shapes, skeletons, arrangements, subdivision, roofs

pub mod error;
pub mod geom;
pub mod procgen;

pub use error::{GeometryError, GeometryResult};
pub use procgen::ProcgenPlugin;
