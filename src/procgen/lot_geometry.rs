//! Shapes with holes: the footprint model shared by blocks, lots and
//! buildings.
//!
//! `area`, `centroid`, `contains` and `random_interior_point` only look at
//! the outer outline. Holes are ignored there on purpose so existing
//! callers keep their numbers; use `net_area` and `contains_excluding_holes`
//! for hole-aware answers.

use std::sync::OnceLock;

use bevy::log::warn;
use bevy::math::DVec2;
use rand::Rng;

use super::skeleton::offset_polygon;
use crate::error::{GeometryError, GeometryResult};
use crate::geom::inexact::{self, point_in_ring, point_in_rings, signed_area};
use crate::geom::triangulate::{triangulate_rings, TriangleMesh};

/// Rejection-sampling attempts before `random_interior_point` gives up.
pub const MAX_SAMPLE_ATTEMPTS: usize = 1000;

/// An outer outline plus hole outlines. Outlines are implicitly closed.
#[derive(Clone, Debug, Default)]
pub struct Shape {
    outline: Vec<DVec2>,
    holes: Vec<Vec<DVec2>>,
    mesh: OnceLock<TriangleMesh>,
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.outline == other.outline && self.holes == other.holes
    }
}

impl Shape {
    pub fn new(outline: Vec<DVec2>) -> Self {
        Self::with_holes(outline, Vec::new())
    }

    pub fn with_holes(outline: Vec<DVec2>, holes: Vec<Vec<DVec2>>) -> Self {
        Self {
            outline,
            holes,
            mesh: OnceLock::new(),
        }
    }

    pub fn outline(&self) -> &[DVec2] {
        &self.outline
    }

    pub fn holes(&self) -> &[Vec<DVec2>] {
        &self.holes
    }

    /// Replaces the outline; the cached mesh is rebuilt on next access.
    pub fn set_outline(&mut self, outline: Vec<DVec2>) {
        self.outline = outline;
        self.mesh = OnceLock::new();
    }

    pub fn set_holes(&mut self, holes: Vec<Vec<DVec2>>) {
        self.holes = holes;
        self.mesh = OnceLock::new();
    }

    /// Outline followed by holes.
    pub fn rings(&self) -> impl Iterator<Item = &[DVec2]> {
        std::iter::once(self.outline.as_slice()).chain(self.holes.iter().map(Vec::as_slice))
    }

    /// Area of the outer outline. Holes are not subtracted.
    pub fn area(&self) -> f64 {
        signed_area(&self.outline).abs()
    }

    /// Outer area minus hole areas.
    pub fn net_area(&self) -> f64 {
        let holes: f64 = self.holes.iter().map(|h| signed_area(h).abs()).sum();
        (self.area() - holes).max(0.0)
    }

    /// Mean of the outer outline vertices (not the area centroid).
    pub fn centroid(&self) -> DVec2 {
        if self.outline.is_empty() {
            return DVec2::ZERO;
        }
        self.outline.iter().copied().sum::<DVec2>() / self.outline.len() as f64
    }

    pub fn bounds(&self) -> (DVec2, DVec2) {
        inexact::bounds(&self.outline)
    }

    /// Point in the outer outline; holes are not excluded.
    pub fn contains(&self, p: DVec2) -> bool {
        point_in_ring(p, &self.outline)
    }

    pub fn contains_excluding_holes(&self, p: DVec2) -> bool {
        point_in_rings(p, self.rings())
    }

    /// Every ring edge, outline first.
    pub fn segments(&self) -> Vec<(DVec2, DVec2)> {
        self.rings()
            .flat_map(|ring| (0..ring.len()).map(move |i| (ring[i], ring[(i + 1) % ring.len()])))
            .collect()
    }

    /// Copy with the outline counter-clockwise and holes clockwise.
    pub fn normalized(&self) -> Shape {
        let orient = |ring: &[DVec2], ccw: bool| {
            let mut ring = inexact::dedup_ring(ring, 0.0);
            if inexact::is_ccw(&ring) != ccw {
                ring.reverse();
            }
            ring
        };
        Shape::with_holes(
            orient(&self.outline, true),
            self.holes.iter().map(|h| orient(h, false)).collect(),
        )
    }

    /// Inward offset by `distance`. A polygon that pinches comes back as
    /// several shapes; one that vanishes comes back empty.
    pub fn contract(&self, distance: f64) -> Vec<Shape> {
        match offset_polygon(&self.outline, &self.holes, distance) {
            Ok(pieces) => pieces
                .into_iter()
                .map(|(outline, holes)| Shape::with_holes(outline, holes))
                .collect(),
            Err(err) => {
                warn!("Could not contract shape by {}: {}", distance, err);
                Vec::new()
            }
        }
    }

    /// Mitered outward offset, used for roof overhangs. Holes shrink by the
    /// same distance.
    pub fn expand(&self, distance: f64) -> Shape {
        let normalized = self.normalized();
        Shape::with_holes(
            inexact::miter_offset(&normalized.outline, distance),
            normalized
                .holes
                .iter()
                .map(|h| inexact::miter_offset(h, -distance))
                .collect(),
        )
    }

    /// Triangulation of the outline minus holes, computed once per
    /// outline/holes assignment.
    pub fn triangulated_mesh(&self) -> &TriangleMesh {
        self.mesh.get_or_init(|| {
            triangulate_rings(&self.outline, &self.holes).unwrap_or_else(|err| {
                warn!("Shape triangulation failed: {}", err);
                TriangleMesh::default()
            })
        })
    }

    /// Uniform sample inside the outer outline by rejection from the
    /// bounding box. Holes are not excluded.
    pub fn random_interior_point<R: Rng>(&self, rng: &mut R) -> GeometryResult<DVec2> {
        if self.outline.len() < 3 {
            return Err(GeometryError::TooFewVertices {
                required: 3,
                actual: self.outline.len(),
            });
        }
        let (min, max) = self.bounds();
        if !(min.x < max.x && min.y < max.y) {
            return Err(GeometryError::ZeroArea);
        }
        for _ in 0..MAX_SAMPLE_ATTEMPTS {
            let p = DVec2::new(rng.gen_range(min.x..max.x), rng.gen_range(min.y..max.y));
            if self.contains(p) {
                return Ok(p);
            }
        }
        Err(GeometryError::SamplingExhausted {
            attempts: MAX_SAMPLE_ATTEMPTS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<DVec2> {
        vec![
            DVec2::new(x0, y0),
            DVec2::new(x1, y0),
            DVec2::new(x1, y1),
            DVec2::new(x0, y1),
        ]
    }

    fn courtyard() -> Shape {
        Shape::with_holes(rect(0.0, 0.0, 20.0, 20.0), vec![rect(5.0, 5.0, 15.0, 15.0)])
    }

    #[test]
    fn outer_only_queries_ignore_holes() {
        let shape = courtyard();
        assert_relative_eq!(shape.area(), 400.0);
        assert_relative_eq!(shape.net_area(), 300.0);
        assert!(shape.contains(DVec2::new(10.0, 10.0)));
        assert!(!shape.contains_excluding_holes(DVec2::new(10.0, 10.0)));
        assert!(shape.contains_excluding_holes(DVec2::new(2.0, 10.0)));
    }

    #[test]
    fn centroid_is_vertex_mean() {
        // Extra vertex on the bottom edge pulls the mean, not the area centroid.
        let shape = Shape::new(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(5.0, 0.0),
            DVec2::new(10.0, 0.0),
            DVec2::new(10.0, 10.0),
            DVec2::new(0.0, 10.0),
        ]);
        let c = shape.centroid();
        assert_relative_eq!(c.x, 5.0);
        assert_relative_eq!(c.y, 4.0);
    }

    #[test]
    fn mesh_is_cached_until_outline_changes() {
        let mut shape = courtyard();
        let first = shape.triangulated_mesh() as *const TriangleMesh;
        let again = shape.triangulated_mesh() as *const TriangleMesh;
        assert_eq!(first, again);
        assert_relative_eq!(shape.triangulated_mesh().area(), 300.0, epsilon = 1e-9);

        shape.set_holes(Vec::new());
        assert_relative_eq!(shape.triangulated_mesh().area(), 400.0, epsilon = 1e-9);
    }

    #[test]
    fn contract_applies_setback() {
        let lot = Shape::new(rect(0.0, 0.0, 30.0, 20.0));
        let inner = lot.contract(5.0);
        assert_eq!(inner.len(), 1);
        assert_relative_eq!(inner[0].area(), 20.0 * 10.0, epsilon = 1e-9);
        assert!(lot.contract(11.0).is_empty());
    }

    #[test]
    fn expand_grows_outline() {
        let grown = Shape::new(rect(0.0, 0.0, 20.0, 10.0)).expand(0.5);
        assert_relative_eq!(grown.area(), 21.0 * 11.0, epsilon = 1e-9);
    }

    #[test]
    fn random_points_land_inside() {
        let shape = Shape::new(vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(40.0, 0.0),
            DVec2::new(40.0, 10.0),
            DVec2::new(10.0, 10.0),
            DVec2::new(10.0, 40.0),
            DVec2::new(0.0, 40.0),
        ]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let p = shape.random_interior_point(&mut rng).unwrap();
            assert!(shape.contains(p));
        }
    }

    #[test]
    fn sampling_a_flat_shape_fails_instead_of_spinning() {
        let flat = Shape::new(vec![DVec2::ZERO, DVec2::new(10.0, 0.0), DVec2::new(20.0, 0.0)]);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(flat.random_interior_point(&mut rng), Err(GeometryError::ZeroArea));

        let sliver = Shape::new(vec![
            DVec2::ZERO,
            DVec2::new(1000.0, 0.0),
            DVec2::new(1000.0, 1000.0),
            DVec2::new(999.999_999, 0.0),
        ]);
        assert!(matches!(
            sliver.random_interior_point(&mut rng),
            Err(GeometryError::SamplingExhausted { .. })
        ));
    }
}
