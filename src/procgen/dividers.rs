//! Parallel cut-lines across a shape.
//!
//! Used for straight block division and for orchard/field rows. Dividers are
//! candidates only: callers clip them against the real outline.

use bevy::math::DVec2;

use crate::geom::inexact::{bounds, rotate};

/// Fraction of the box height by which each divider overshoots the box on
/// both ends, so clipping always finds the boundary crossing after the
/// rotation round trip.
const OVERSHOOT: f64 = 0.01;

/// Cut-lines perpendicular to `angle`, stepped along it every `spacing`.
///
/// Points are rotated by `-angle` about the origin, so the stepping axis
/// becomes x. Starting one step in from the left edge of the rotated
/// bounding box, a full-height vertical segment is emitted while strictly
/// left of the right edge, i.e. `ceil(W / spacing) - 1` dividers. The
/// segments are rotated back and returned flat: `2k` points for `k`
/// dividers.
pub fn compute_dividers(outline: &[DVec2], angle: f64, spacing: f64) -> Vec<DVec2> {
    if !(spacing.is_finite() && spacing > 0.0) || outline.len() < 2 {
        return Vec::new();
    }
    let rotated: Vec<DVec2> = outline.iter().map(|&p| rotate(p, -angle)).collect();
    let (min, max) = bounds(&rotated);
    if max.x - min.x < spacing {
        return Vec::new();
    }

    let pad = (max.y - min.y) * OVERSHOOT;
    let mut points = Vec::new();
    let mut step = 1;
    loop {
        let x = min.x + spacing * step as f64;
        if x >= max.x {
            break;
        }
        points.push(rotate(DVec2::new(x, min.y - pad), angle));
        points.push(rotate(DVec2::new(x, max.y + pad), angle));
        step += 1;
    }
    points
}

/// Pairs up the flat output of [`compute_dividers`].
pub fn divider_pairs(points: &[DVec2]) -> impl Iterator<Item = (DVec2, DVec2)> + '_ {
    points.chunks_exact(2).map(|pair| (pair[0], pair[1]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rect(w: f64, h: f64) -> Vec<DVec2> {
        vec![DVec2::ZERO, DVec2::new(w, 0.0), DVec2::new(w, h), DVec2::new(0.0, h)]
    }

    #[test]
    fn count_is_ceil_minus_one() {
        assert_eq!(compute_dividers(&rect(100.0, 10.0), 0.0, 30.0).len(), 2 * 3);
        // Exact multiple: the last step would land on the boundary.
        assert_eq!(compute_dividers(&rect(100.0, 10.0), 0.0, 25.0).len(), 2 * 3);
        assert_eq!(compute_dividers(&rect(100.0, 10.0), 0.0, 99.0).len(), 2);
    }

    #[test]
    fn angle_zero_gives_vertical_cuts_inside_the_box() {
        let points = compute_dividers(&rect(100.0, 10.0), 0.0, 30.0);
        for (i, (a, b)) in divider_pairs(&points).enumerate() {
            assert_relative_eq!(a.x, 30.0 * (i + 1) as f64, epsilon = 1e-9);
            assert_relative_eq!(a.x, b.x, epsilon = 1e-9);
            assert!(a.x > 0.0 && a.x < 100.0);
            assert!(a.y < 0.0 && b.y > 10.0);
        }
    }

    #[test]
    fn quarter_turn_gives_horizontal_cuts() {
        let points = compute_dividers(&rect(10.0, 100.0), std::f64::consts::FRAC_PI_2, 40.0);
        assert_eq!(points.len(), 4);
        for (a, b) in divider_pairs(&points) {
            assert_relative_eq!(a.y, b.y, epsilon = 1e-9);
            assert!(a.y > 0.0 && a.y < 100.0);
        }
    }

    #[test]
    fn degenerate_spacing_yields_nothing() {
        assert!(compute_dividers(&rect(100.0, 10.0), 0.0, 0.0).is_empty());
        assert!(compute_dividers(&rect(100.0, 10.0), 0.0, -5.0).is_empty());
        assert!(compute_dividers(&rect(100.0, 10.0), 0.0, f64::NAN).is_empty());
        assert!(compute_dividers(&rect(100.0, 10.0), 0.0, f64::INFINITY).is_empty());
        assert!(compute_dividers(&rect(20.0, 10.0), 0.0, 40.0).is_empty());
    }
}
