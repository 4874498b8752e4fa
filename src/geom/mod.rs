//! Geometric kernels.
//!
//! Two numeric worlds that meet only through [`to_exact`] and [`to_inexact`]:
//! [`exact`] decides arrangement topology, [`inexact`] handles everything
//! that ends up rendered.

pub mod exact;
pub mod inexact;
pub mod triangulate;

use bevy::math::DVec2;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{ToPrimitive, Zero};

pub use exact::{ExactPoint, ExactSegment};
pub use triangulate::TriangleMesh;

/// Bits kept in numerator and denominator when a rational is rounded back
/// to a float.
const MAX_CONVERSION_BITS: u64 = 1000;

/// Converts a float point into the exact kernel without rounding.
pub fn to_exact(p: DVec2) -> ExactPoint {
    ExactPoint::new(rational_from_f64(p.x), rational_from_f64(p.y))
}

/// Rounds an exact point to the nearest representable float point.
pub fn to_inexact(p: &ExactPoint) -> DVec2 {
    DVec2::new(rational_to_f64(&p.x), rational_to_f64(&p.y))
}

pub fn segment_to_exact(a: DVec2, b: DVec2) -> ExactSegment {
    ExactSegment::new(to_exact(a), to_exact(b))
}

/// Closed ring as exact segments, skipping zero-length edges.
pub fn ring_to_exact_segments(ring: &[DVec2]) -> Vec<ExactSegment> {
    let n = ring.len();
    (0..n)
        .map(|i| segment_to_exact(ring[i], ring[(i + 1) % n]))
        .filter(|s| !s.is_degenerate())
        .collect()
}

fn rational_from_f64(v: f64) -> BigRational {
    BigRational::from_float(v).unwrap_or_else(BigRational::zero)
}

fn rational_to_f64(r: &BigRational) -> f64 {
    let (numer, denom) = (r.numer(), r.denom());
    let excess = numer.bits().max(denom.bits()).saturating_sub(MAX_CONVERSION_BITS) as usize;
    let numer: BigInt = numer.clone() >> excess;
    let denom: BigInt = denom.clone() >> excess;
    match (numer.to_f64(), denom.to_f64()) {
        (Some(n), Some(d)) if d != 0.0 => n / d,
        _ => 0.0,
    }
}
