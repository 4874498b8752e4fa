//! Floating-point kernel for rendering-facing geometry.
//!
//! Skeletons, heights, offsets and sampling only need approximate answers,
//! so they work on plain `DVec2`.

use bevy::math::DVec2;

/// Tolerance for orientation and parallelism tests.
pub const EPSILON: f64 = 1e-9;

/// Longest miter, in multiples of the offset distance, before it is clamped.
const MITER_LIMIT: f64 = 4.0;

/// Signed polygon area via the shoelace formula (positive when CCW).
pub fn signed_area(ring: &[DVec2]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    let n = ring.len();
    for i in 0..n {
        let j = (i + 1) % n;
        area += ring[i].x * ring[j].y;
        area -= ring[j].x * ring[i].y;
    }
    area / 2.0
}

pub fn is_ccw(ring: &[DVec2]) -> bool {
    signed_area(ring) > 0.0
}

/// Axis-aligned bounding box as `(min, max)`.
pub fn bounds(points: &[DVec2]) -> (DVec2, DVec2) {
    let mut min = DVec2::splat(f64::MAX);
    let mut max = DVec2::splat(f64::MIN);
    for &p in points {
        min = min.min(p);
        max = max.max(p);
    }
    (min, max)
}

/// Rotates `p` counter-clockwise about the origin.
pub fn rotate(p: DVec2, angle: f64) -> DVec2 {
    DVec2::from_angle(angle).rotate(p)
}

/// Left-hand normal of a direction, the interior side of a CCW ring edge.
pub fn left_normal(direction: DVec2) -> DVec2 {
    DVec2::new(-direction.y, direction.x).normalize_or_zero()
}

/// Velocity of a vertex whose two incident edges move along their normals
/// at unit speed. `None` when the edges fold back onto each other.
pub fn bisector_velocity(normal_in: DVec2, normal_out: DVec2) -> Option<DVec2> {
    let denom = 1.0 + normal_in.dot(normal_out);
    if denom < EPSILON {
        return None;
    }
    Some((normal_in + normal_out) / denom)
}

/// Even-odd point in polygon test.
pub fn point_in_ring(p: DVec2, ring: &[DVec2]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > p.y) != (b.y > p.y) && p.x < (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Even-odd test over several rings at once (an outline and its holes).
pub fn point_in_rings<'a>(p: DVec2, rings: impl IntoIterator<Item = &'a [DVec2]>) -> bool {
    rings
        .into_iter()
        .fold(false, |inside, ring| inside ^ point_in_ring(p, ring))
}

/// Intersection of segments `a1-a2` and `b1-b2`, returned as the parameter
/// along the first segment and the point.
pub fn segment_intersection(a1: DVec2, a2: DVec2, b1: DVec2, b2: DVec2) -> Option<(f64, DVec2)> {
    let d1 = a2 - a1;
    let d2 = b2 - b1;
    let denom = d1.perp_dot(d2);
    if denom.abs() < EPSILON {
        return None;
    }
    let offset = b1 - a1;
    let t = offset.perp_dot(d2) / denom;
    let u = offset.perp_dot(d1) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some((t, a1 + d1 * t))
    } else {
        None
    }
}

/// The pieces of segment `a-b` that lie inside `rings` (even-odd), merged
/// where they touch.
pub fn clip_segment(a: DVec2, b: DVec2, rings: &[&[DVec2]]) -> Vec<(DVec2, DVec2)> {
    let mut cuts = vec![0.0, 1.0];
    for ring in rings {
        let n = ring.len();
        for i in 0..n {
            if let Some((t, _)) = segment_intersection(a, b, ring[i], ring[(i + 1) % n]) {
                cuts.push(t);
            }
        }
    }
    cuts.sort_by(f64::total_cmp);
    cuts.dedup_by(|x, y| (*x - *y).abs() < EPSILON);

    let mut pieces: Vec<(f64, f64)> = Vec::new();
    for pair in cuts.windows(2) {
        let mid = a.lerp(b, (pair[0] + pair[1]) / 2.0);
        if !point_in_rings(mid, rings.iter().copied()) {
            continue;
        }
        match pieces.last_mut() {
            Some(last) if (last.1 - pair[0]).abs() < EPSILON => last.1 = pair[1],
            _ => pieces.push((pair[0], pair[1])),
        }
    }
    pieces
        .into_iter()
        .map(|(t0, t1)| (a.lerp(b, t0), a.lerp(b, t1)))
        .collect()
}

/// Drops repeated vertices, including a closing vertex equal to the first.
pub fn dedup_ring(ring: &[DVec2], tolerance: f64) -> Vec<DVec2> {
    let mut out: Vec<DVec2> = Vec::with_capacity(ring.len());
    for &p in ring {
        if out.last().map_or(true, |last| last.distance(p) > tolerance) {
            out.push(p);
        }
    }
    while out.len() > 1 && out[0].distance(out[out.len() - 1]) <= tolerance {
        out.pop();
    }
    out
}

/// Drops vertices whose two incident edges are collinear.
pub fn remove_collinear(ring: &[DVec2], tolerance: f64) -> Vec<DVec2> {
    let mut points = dedup_ring(ring, tolerance);
    let mut changed = true;
    while changed && points.len() > 3 {
        changed = false;
        let n = points.len();
        for i in 0..n {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            let d1 = (points[i] - prev).normalize_or_zero();
            let d2 = (next - points[i]).normalize_or_zero();
            if d1.perp_dot(d2).abs() < tolerance && d1.dot(d2) > 0.0 {
                points.remove(i);
                changed = true;
                break;
            }
        }
    }
    points
}

/// Mitered offset of a ring. Positive `distance` grows a CCW ring outward.
pub fn miter_offset(ring: &[DVec2], distance: f64) -> Vec<DVec2> {
    let n = ring.len();
    if n < 3 || distance == 0.0 {
        return ring.to_vec();
    }
    let sign = if is_ccw(ring) { 1.0 } else { -1.0 };
    (0..n)
        .map(|i| {
            let prev = ring[(i + n - 1) % n];
            let next = ring[(i + 1) % n];
            let n_in = left_normal(ring[i] - prev) * sign;
            let n_out = left_normal(next - ring[i]) * sign;
            let mut miter = bisector_velocity(n_in, n_out).unwrap_or(n_in);
            if miter.length() > MITER_LIMIT {
                miter = miter.normalize() * MITER_LIMIT;
            }
            ring[i] - miter * distance
        })
        .collect()
}
