//! Error taxonomy for geometry construction.

use thiserror::Error;

/// Local, synchronous failures reported to the immediate caller.
///
/// Orchestrators (block subdivision, roof building) never surface these;
/// they log and fall back to a trivial result instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("polygon needs at least {required} vertices, got {actual}")]
    TooFewVertices { required: usize, actual: usize },

    #[error("polygon has zero area")]
    ZeroArea,

    #[error("no interior point found after {attempts} samples")]
    SamplingExhausted { attempts: usize },

    #[error("straight skeleton construction failed: {0}")]
    Skeleton(String),

    #[error("triangulation failed: {0}")]
    Triangulation(String),
}

pub type GeometryResult<T> = Result<T, GeometryError>;
