//! Exact rational kernel.
//!
//! Everything that decides combinatorial structure (which segments cross,
//! where they cross, in what order along a segment) runs on `BigRational`
//! coordinates, so two computed intersection points compare equal exactly
//! when they are the same point.

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

/// A point with arbitrary precision rational coordinates.
///
/// Ordering is lexicographic on `(x, y)`, which lets points key ordered maps.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExactPoint {
    pub x: BigRational,
    pub y: BigRational,
}

impl ExactPoint {
    pub fn new(x: BigRational, y: BigRational) -> Self {
        Self { x, y }
    }

    pub fn from_integers(x: i64, y: i64) -> Self {
        Self::new(
            BigRational::from_integer(BigInt::from(x)),
            BigRational::from_integer(BigInt::from(y)),
        )
    }

    pub fn midpoint(&self, other: &ExactPoint) -> ExactPoint {
        let two = BigRational::from_integer(BigInt::from(2));
        ExactPoint::new((&self.x + &other.x) / &two, (&self.y + &other.y) / &two)
    }
}

fn cross(ax: &BigRational, ay: &BigRational, bx: &BigRational, by: &BigRational) -> BigRational {
    ax * by - ay * bx
}

/// Turn direction of `a -> b -> c`: `Greater` for a left turn, `Less` for a
/// right turn, `Equal` when collinear.
pub fn orientation(a: &ExactPoint, b: &ExactPoint, c: &ExactPoint) -> Ordering {
    let turn = cross(&(&b.x - &a.x), &(&b.y - &a.y), &(&c.x - &a.x), &(&c.y - &a.y));
    turn.cmp(&BigRational::zero())
}

/// Twice the signed area of a closed ring (positive when counter-clockwise).
pub fn twice_signed_area<'a>(ring: impl IntoIterator<Item = &'a ExactPoint>) -> BigRational {
    let points: Vec<&ExactPoint> = ring.into_iter().collect();
    let mut sum = BigRational::zero();
    for (i, a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        sum += &a.x * &b.y - &b.x * &a.y;
    }
    sum
}

/// Even-odd containment of `p` against an unordered set of boundary edges.
///
/// Points exactly on an edge are not classified reliably; callers only pass
/// points known to be off the boundary.
pub fn parity_inside<'a>(
    p: &ExactPoint,
    edges: impl IntoIterator<Item = (&'a ExactPoint, &'a ExactPoint)>,
) -> bool {
    let mut inside = false;
    for (a, b) in edges {
        if (a.y > p.y) != (b.y > p.y) {
            let x = &a.x + (&p.y - &a.y) * (&b.x - &a.x) / (&b.y - &a.y);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

/// A directed segment between two exact points.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExactSegment {
    pub source: ExactPoint,
    pub target: ExactPoint,
}

impl ExactSegment {
    pub fn new(source: ExactPoint, target: ExactPoint) -> Self {
        Self { source, target }
    }

    pub fn is_degenerate(&self) -> bool {
        self.source == self.target
    }

    fn direction(&self) -> (BigRational, BigRational) {
        (&self.target.x - &self.source.x, &self.target.y - &self.source.y)
    }

    /// Position of `p` along the segment, 0 at the source and 1 at the
    /// target. `p` is projected onto the supporting line.
    pub fn parameter_of(&self, p: &ExactPoint) -> BigRational {
        let (dx, dy) = self.direction();
        let len2 = &dx * &dx + &dy * &dy;
        if len2.is_zero() {
            return BigRational::zero();
        }
        ((&p.x - &self.source.x) * &dx + (&p.y - &self.source.y) * &dy) / len2
    }

    pub fn point_at(&self, t: &BigRational) -> ExactPoint {
        let (dx, dy) = self.direction();
        ExactPoint::new(&self.source.x + dx * t, &self.source.y + dy * t)
    }
}

/// Result of intersecting two closed segments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SegmentIntersection {
    Disjoint,
    Point(ExactPoint),
    /// Collinear overlap, endpoints ordered along the first segment.
    Overlap(ExactPoint, ExactPoint),
}

pub fn intersect(s: &ExactSegment, t: &ExactSegment) -> SegmentIntersection {
    if s.is_degenerate() || t.is_degenerate() {
        return SegmentIntersection::Disjoint;
    }
    let (dx1, dy1) = s.direction();
    let (dx2, dy2) = t.direction();
    let ox = &t.source.x - &s.source.x;
    let oy = &t.source.y - &s.source.y;
    let zero = BigRational::zero();
    let one = BigRational::one();

    let denom = cross(&dx1, &dy1, &dx2, &dy2);
    if !denom.is_zero() {
        let a = cross(&ox, &oy, &dx2, &dy2) / &denom;
        let b = cross(&ox, &oy, &dx1, &dy1) / &denom;
        if a < zero || a > one || b < zero || b > one {
            return SegmentIntersection::Disjoint;
        }
        return SegmentIntersection::Point(s.point_at(&a));
    }

    // Parallel: only collinear segments can still touch.
    if !cross(&ox, &oy, &dx1, &dy1).is_zero() {
        return SegmentIntersection::Disjoint;
    }
    let t0 = s.parameter_of(&t.source);
    let t1 = s.parameter_of(&t.target);
    let (lo, hi) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
    let lo = if lo < zero { zero } else { lo };
    let hi = if hi > one { one } else { hi };
    match lo.cmp(&hi) {
        Ordering::Greater => SegmentIntersection::Disjoint,
        Ordering::Equal => SegmentIntersection::Point(s.point_at(&lo)),
        Ordering::Less => SegmentIntersection::Overlap(s.point_at(&lo), s.point_at(&hi)),
    }
}

/// Every point where `query` meets one of `segments`, ordered from the
/// query's source towards its target, without duplicates. Collinear
/// overlaps contribute both of their ends.
pub fn intersections_along(query: &ExactSegment, segments: &[ExactSegment]) -> Vec<ExactPoint> {
    let mut hits: Vec<(BigRational, ExactPoint)> = Vec::new();
    for segment in segments {
        match intersect(query, segment) {
            SegmentIntersection::Disjoint => {}
            SegmentIntersection::Point(p) => hits.push((query.parameter_of(&p), p)),
            SegmentIntersection::Overlap(p, q) => {
                hits.push((query.parameter_of(&p), p));
                hits.push((query.parameter_of(&q), q));
            }
        }
    }
    hits.sort_by(|a, b| a.0.cmp(&b.0));
    hits.dedup_by(|a, b| a.1 == b.1);
    hits.into_iter().map(|(_, p)| p).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(ax: i64, ay: i64, bx: i64, by: i64) -> ExactSegment {
        ExactSegment::new(ExactPoint::from_integers(ax, ay), ExactPoint::from_integers(bx, by))
    }

    #[test]
    fn crossing_segments_meet_at_exact_midpoint() {
        let hit = intersect(&seg(0, 0, 2, 2), &seg(0, 2, 2, 0));
        assert_eq!(hit, SegmentIntersection::Point(ExactPoint::from_integers(1, 1)));
    }

    #[test]
    fn touching_at_endpoint_is_an_intersection() {
        let hit = intersect(&seg(0, 0, 4, 0), &seg(4, 0, 4, 3));
        assert_eq!(hit, SegmentIntersection::Point(ExactPoint::from_integers(4, 0)));
    }

    #[test]
    fn collinear_overlap_reports_both_ends() {
        let hit = intersect(&seg(0, 0, 10, 0), &seg(12, 0, 4, 0));
        assert_eq!(
            hit,
            SegmentIntersection::Overlap(
                ExactPoint::from_integers(4, 0),
                ExactPoint::from_integers(10, 0)
            )
        );
    }

    #[test]
    fn parallel_segments_are_disjoint() {
        assert_eq!(intersect(&seg(0, 0, 10, 0), &seg(0, 1, 10, 1)), SegmentIntersection::Disjoint);
    }

    #[test]
    fn intersections_are_ordered_along_query() {
        let square = vec![seg(0, 0, 10, 0), seg(10, 0, 10, 10), seg(10, 10, 0, 10), seg(0, 10, 0, 0)];
        let query = seg(5, 20, 5, -20);
        let points = intersections_along(&query, &square);
        assert_eq!(
            points,
            vec![ExactPoint::from_integers(5, 10), ExactPoint::from_integers(5, 0)]
        );
    }

    #[test]
    fn shared_corner_is_reported_once() {
        let square = vec![seg(0, 0, 10, 0), seg(10, 0, 10, 10), seg(10, 10, 0, 10), seg(0, 10, 0, 0)];
        let diagonal = seg(-5, -5, 15, 15);
        let points = intersections_along(&diagonal, &square);
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn parity_handles_concave_rings() {
        // U shape open to the top
        let ring = [(0, 0), (30, 0), (30, 30), (20, 30), (20, 10), (10, 10), (10, 30), (0, 30)]
            .map(|(x, y)| ExactPoint::from_integers(x, y));
        let edges: Vec<(&ExactPoint, &ExactPoint)> =
            (0..ring.len()).map(|i| (&ring[i], &ring[(i + 1) % ring.len()])).collect();
        assert!(parity_inside(&ExactPoint::from_integers(5, 20), edges.iter().copied()));
        assert!(!parity_inside(&ExactPoint::from_integers(15, 20), edges.iter().copied()));
        assert!(twice_signed_area(ring.iter()) > BigRational::zero());
    }
}
