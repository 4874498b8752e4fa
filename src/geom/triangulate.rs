//! Constrained Delaunay triangulation of polygon rings.

use bevy::math::{DVec2, DVec3};
use spade::handles::FixedVertexHandle;
use spade::{ConstrainedDelaunayTriangulation, Point2, Triangulation};

use super::inexact::{point_in_rings, EPSILON};
use crate::error::{GeometryError, GeometryResult};

/// Plan-view triangle mesh. Triangles index into `vertices` and wind
/// counter-clockwise.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TriangleMesh {
    pub vertices: Vec<DVec2>,
    pub triangles: Vec<[u32; 3]>,
}

impl TriangleMesh {
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|i| self.vertices[i as usize]);
                (b - a).perp_dot(c - a) / 2.0
            })
            .sum()
    }
}

/// Triangulates the region inside `outline` and outside every hole.
///
/// Each input vertex appears once in the output (coincident inputs are
/// merged), in ring order: outline first, then holes.
pub fn triangulate_rings(outline: &[DVec2], holes: &[Vec<DVec2>]) -> GeometryResult<TriangleMesh> {
    if outline.len() < 3 {
        return Err(GeometryError::TooFewVertices {
            required: 3,
            actual: outline.len(),
        });
    }
    let rings: Vec<&[DVec2]> = std::iter::once(outline)
        .chain(holes.iter().map(Vec::as_slice))
        .collect();

    let mut cdt = ConstrainedDelaunayTriangulation::<Point2<f64>>::new();
    let mut vertices = Vec::new();
    let mut slot_of_handle: Vec<Option<u32>> = Vec::new();
    let mut ring_handles: Vec<Vec<FixedVertexHandle>> = Vec::with_capacity(rings.len());

    for ring in &rings {
        let mut handles = Vec::with_capacity(ring.len());
        for &p in ring.iter() {
            let handle = cdt
                .insert(Point2::new(p.x, p.y))
                .map_err(|e| GeometryError::Triangulation(format!("{e:?}")))?;
            let index = handle.index();
            if slot_of_handle.len() <= index {
                slot_of_handle.resize(index + 1, None);
            }
            if slot_of_handle[index].is_none() {
                slot_of_handle[index] = Some(vertices.len() as u32);
                vertices.push(p);
            }
            handles.push(handle);
        }
        ring_handles.push(handles);
    }

    for handles in &ring_handles {
        let n = handles.len();
        for i in 0..n {
            let (a, b) = (handles[i], handles[(i + 1) % n]);
            if a != b && cdt.can_add_constraint(a, b) {
                cdt.add_constraint(a, b);
            }
        }
    }

    let mut triangles = Vec::new();
    for face in cdt.inner_faces() {
        let corners = face.vertices();
        let positions = corners.map(|v| {
            let p = v.position();
            DVec2::new(p.x, p.y)
        });
        let center = (positions[0] + positions[1] + positions[2]) / 3.0;
        if !point_in_rings(center, rings.iter().copied()) {
            continue;
        }
        let slots = corners.map(|v| slot_of_handle.get(v.fix().index()).copied().flatten());
        if let [Some(a), Some(b), Some(c)] = slots {
            triangles.push([a, b, c]);
        }
    }

    Ok(TriangleMesh { vertices, triangles })
}

/// Triangulates a planar polygon in 3D by projecting it onto its own plane.
/// Triangles wind counter-clockwise around the polygon's Newell normal, so
/// a polygon that is CCW in plan yields upward-facing triangles.
pub fn triangulate_planar_face(points: &[DVec3]) -> GeometryResult<Vec<[u32; 3]>> {
    if points.len() < 3 {
        return Err(GeometryError::TooFewVertices {
            required: 3,
            actual: points.len(),
        });
    }
    let n = points.len();
    let mut normal = DVec3::ZERO;
    for i in 0..n {
        let (a, b) = (points[i], points[(i + 1) % n]);
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    if normal.length() < EPSILON {
        return Err(GeometryError::ZeroArea);
    }
    let normal = normal.normalize();
    let u = normal.any_orthonormal_vector();
    let v = normal.cross(u);
    let projected: Vec<DVec2> = points
        .iter()
        .map(|p| DVec2::new(p.dot(u), p.dot(v)))
        .collect();

    let mesh = triangulate_rings(&projected, &[])?;
    // Map merged vertices back to the caller's indices.
    let remap: Vec<u32> = mesh
        .vertices
        .iter()
        .map(|q| {
            projected
                .iter()
                .position(|p| p == q)
                .map_or(0, |i| i as u32)
        })
        .collect();
    Ok(mesh
        .triangles
        .iter()
        .map(|t| t.map(|i| remap[i as usize]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(min: f64, max: f64) -> Vec<DVec2> {
        vec![
            DVec2::new(min, min),
            DVec2::new(max, min),
            DVec2::new(max, max),
            DVec2::new(min, max),
        ]
    }

    #[test]
    fn rectangle_gives_two_triangles() {
        let mesh = triangulate_rings(&square(0.0, 10.0), &[]).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.triangles.len(), 2);
        assert_relative_eq!(mesh.area(), 100.0, epsilon = 1e-9);
    }

    #[test]
    fn hole_is_left_open() {
        let mesh = triangulate_rings(&square(0.0, 10.0), &[square(4.0, 6.0)]).unwrap();
        assert_relative_eq!(mesh.area(), 96.0, epsilon = 1e-9);
    }

    #[test]
    fn concave_outline_is_respected() {
        let l = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(20.0, 0.0),
            DVec2::new(20.0, 10.0),
            DVec2::new(10.0, 10.0),
            DVec2::new(10.0, 20.0),
            DVec2::new(0.0, 20.0),
        ];
        let mesh = triangulate_rings(&l, &[]).unwrap();
        assert_relative_eq!(mesh.area(), 300.0, epsilon = 1e-9);
    }

    #[test]
    fn vertical_face_is_triangulated_in_its_plane() {
        let wall = [
            DVec3::new(0.0, 0.0, 0.0),
            DVec3::new(10.0, 0.0, 0.0),
            DVec3::new(5.0, 0.0, 4.0),
        ];
        let tris = triangulate_planar_face(&wall).unwrap();
        assert_eq!(tris.len(), 1);
        let [a, b, c] = tris[0].map(|i| wall[i as usize]);
        // Winding follows the input ring, whose normal points to -y.
        assert!((b - a).cross(c - a).y < 0.0);
    }
}
