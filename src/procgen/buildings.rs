//! Building massing: extruded walls plus a styled roof.
//!
//! Coordinates are z-up. Walls rise from `z = 0` to `floor_height × floors`;
//! roofs sit on the wall tops. Hipped and gabled roofs are lifted from the
//! straight skeleton of the (optionally overhanging) roof outline, one face
//! per eave edge. Shed and sawtooth roofs use a height field in x that the
//! wall tops follow too, so walls and roof meet.

use bevy::log::{debug, warn};
use bevy::math::{DVec2, DVec3};
use bytemuck::{Pod, Zeroable};
use rand::Rng;

use super::arrangement::{Arrangement, FaceRole};
use super::lot_geometry::Shape;
use super::skeleton::StraightSkeleton;
use crate::error::{GeometryError, GeometryResult};
use crate::geom::inexact::bounds;
use crate::geom::triangulate::{triangulate_planar_face, triangulate_rings};
use crate::geom::{ring_to_exact_segments, segment_to_exact};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoofStyle {
    Flat,
    Hipped,
    Gabled,
    Shed,
    Sawtooth,
    /// Picks one of the other styles when the mesh is built.
    Random,
}

impl RoofStyle {
    pub const CONCRETE: [RoofStyle; 5] = [
        RoofStyle::Flat,
        RoofStyle::Hipped,
        RoofStyle::Gabled,
        RoofStyle::Shed,
        RoofStyle::Sawtooth,
    ];

    /// Resolves `Random` with a uniform draw; other styles pass through.
    pub fn resolve<R: Rng>(self, rng: &mut R) -> RoofStyle {
        match self {
            RoofStyle::Random => Self::CONCRETE[rng.gen_range(0..Self::CONCRETE.len())],
            style => style,
        }
    }
}

/// Repeating up-slope / down-slope profile along x.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SawtoothProfile {
    pub up_width: f64,
    pub ridge_height: f64,
    pub down_width: f64,
}

impl SawtoothProfile {
    pub fn period(&self) -> f64 {
        self.up_width + self.down_width
    }

    /// Height above the wall top at `x`, with a valley at `origin`.
    pub fn height_at(&self, x: f64, origin: f64) -> f64 {
        let period = self.period();
        if period <= 0.0 {
            return 0.0;
        }
        let phase = (x - origin).rem_euclid(period);
        if phase < self.up_width {
            self.ridge_height * phase / self.up_width
        } else {
            self.ridge_height * (period - phase) / self.down_width
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoofConfig {
    /// Height of one storey.
    pub floor_height: f64,
    /// Outward offset of the roof outline past the walls.
    pub overhang: f64,
    /// Rise per unit of skeleton offset; 1.0 is a 45° roof.
    pub pitch: f64,
    /// Rise per unit of x for shed roofs.
    pub shed_slope: f64,
    pub sawtooth: SawtoothProfile,
}

impl Default for RoofConfig {
    fn default() -> Self {
        Self {
            floor_height: 10.0,
            overhang: 0.0,
            pitch: 1.0,
            shed_slope: 0.25,
            sawtooth: SawtoothProfile {
                up_width: 6.0,
                ridge_height: 3.0,
                down_width: 2.0,
            },
        }
    }
}

/// Positions plus triangle indices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshPart {
    pub positions: Vec<DVec3>,
    pub indices: Vec<u32>,
}

impl MeshPart {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn push_triangles(&mut self, positions: impl IntoIterator<Item = DVec3>, triangles: &[[u32; 3]]) {
        let base = self.positions.len() as u32;
        self.positions.extend(positions);
        self.indices
            .extend(triangles.iter().flat_map(|t| t.map(|i| base + i)));
    }

    fn append(&mut self, other: &MeshPart) {
        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.indices.extend(other.indices.iter().map(|i| base + i));
    }
}

/// Per-vertex data for an external batching layer (16 bytes).
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
#[repr(C)]
pub struct MeshVertex {
    /// World position, z up.
    pub position: [f32; 3],
    /// 0 = wall, 1 = roof.
    pub part: u32,
}

/// Walls and roof of one building. `style` is the style actually built,
/// which differs from the request when `Random` was resolved or a roof
/// fell back to flat.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildingMesh {
    pub walls: MeshPart,
    pub roof: MeshPart,
    pub style: RoofStyle,
}

impl BuildingMesh {
    fn empty(style: RoofStyle) -> Self {
        Self {
            walls: MeshPart::default(),
            roof: MeshPart::default(),
            style,
        }
    }

    /// Walls followed by roof, as one indexed mesh.
    pub fn combined(&self) -> MeshPart {
        let mut mesh = self.walls.clone();
        mesh.append(&self.roof);
        mesh
    }

    /// Vertices in the order of [`combined`](Self::combined).
    pub fn vertex_data(&self) -> Vec<MeshVertex> {
        let tag = |part: u32| {
            move |p: &DVec3| MeshVertex {
                position: p.as_vec3().to_array(),
                part,
            }
        };
        self.walls
            .positions
            .iter()
            .map(tag(0))
            .chain(self.roof.positions.iter().map(tag(1)))
            .collect()
    }
}

/// Builds walls and roof, drawing from the thread-local generator when the
/// style is `Random`.
pub fn build_building_mesh(
    footprint: &Shape,
    floors: u32,
    style: RoofStyle,
    config: &RoofConfig,
) -> BuildingMesh {
    build_building_mesh_with_rng(footprint, floors, style, config, &mut rand::thread_rng())
}

/// Builds walls and roof. A roof that cannot be built degrades to flat, and
/// a flat roof that cannot be triangulated is left empty.
pub fn build_building_mesh_with_rng<R: Rng>(
    footprint: &Shape,
    floors: u32,
    style: RoofStyle,
    config: &RoofConfig,
    rng: &mut R,
) -> BuildingMesh {
    let style = style.resolve(rng);
    let footprint = footprint.normalized();
    if footprint.outline().len() < 3 {
        warn!(
            "Footprint with {} vertices has no walls or roof",
            footprint.outline().len()
        );
        return BuildingMesh::empty(style);
    }
    let wall_top = config.floor_height * floors as f64;
    let roof_shape = if config.overhang > 0.0 {
        footprint.expand(config.overhang)
    } else {
        footprint.clone()
    };

    let built = match style {
        RoofStyle::Flat | RoofStyle::Random => flat_roof(&roof_shape, wall_top).map(|roof| {
            (roof, build_walls(footprint.rings(), |_| wall_top))
        }),
        RoofStyle::Hipped => skeleton_roof(&roof_shape, wall_top, config.pitch, false)
            .map(|roof| (roof, build_walls(footprint.rings(), |_| wall_top))),
        RoofStyle::Gabled => skeleton_roof(&roof_shape, wall_top, config.pitch, true)
            .map(|roof| (roof, build_walls(footprint.rings(), |_| wall_top))),
        RoofStyle::Shed => {
            let (min, _) = bounds(roof_shape.outline());
            let top = |p: DVec2| wall_top + config.shed_slope * (p.x - min.x);
            shed_roof(&roof_shape, top).map(|roof| (roof, build_walls(footprint.rings(), top)))
        }
        RoofStyle::Sawtooth => sawtooth_roof(&footprint, &roof_shape, wall_top, &config.sawtooth),
    };

    match built {
        Ok((roof, walls)) => {
            debug!(
                "{:?} roof: {} wall triangles, {} roof triangles",
                style,
                walls.triangle_count(),
                roof.triangle_count()
            );
            BuildingMesh { walls, roof, style }
        }
        Err(err) => {
            warn!("{:?} roof failed ({}), falling back to flat", style, err);
            let walls = build_walls(footprint.rings(), |_| wall_top);
            let roof = flat_roof(&roof_shape, wall_top).unwrap_or_else(|err| {
                warn!("Flat roof failed too ({}), leaving it empty", err);
                MeshPart::default()
            });
            BuildingMesh {
                walls,
                roof,
                style: RoofStyle::Flat,
            }
        }
    }
}

/// Vertical quads along every ring: a bottom and a top vertex per ring
/// vertex, two triangles per side, facing out of the footprint.
fn build_walls<'a>(
    rings: impl IntoIterator<Item = &'a [DVec2]>,
    top: impl Fn(DVec2) -> f64,
) -> MeshPart {
    let mut walls = MeshPart::default();
    for ring in rings {
        let n = ring.len() as u32;
        if n < 2 {
            continue;
        }
        let positions = ring
            .iter()
            .flat_map(|&p| [p.extend(0.0), p.extend(top(p))]);
        let triangles: Vec<[u32; 3]> = (0..n)
            .flat_map(|i| {
                let j = (i + 1) % n;
                let (bi, ti, bj, tj) = (2 * i, 2 * i + 1, 2 * j, 2 * j + 1);
                [[bi, bj, tj], [bi, tj, ti]]
            })
            .collect();
        walls.push_triangles(positions, &triangles);
    }
    walls
}

fn flat_roof(roof: &Shape, height: f64) -> GeometryResult<MeshPart> {
    let mesh = triangulate_rings(roof.outline(), roof.holes())?;
    let mut part = MeshPart::default();
    part.push_triangles(mesh.vertices.iter().map(|p| p.extend(height)), &mesh.triangles);
    Ok(part)
}

/// Hip roof from the skeleton faces. With `gable`, every hip apex that has
/// a single ridge neighbour is pulled out to the middle of its eave edge.
fn skeleton_roof(roof: &Shape, wall_top: f64, pitch: f64, gable: bool) -> GeometryResult<MeshPart> {
    let skeleton = StraightSkeleton::build(roof.outline(), roof.holes())?;
    let adjustments = if gable {
        skeleton.gable_adjustments()
    } else {
        Vec::new()
    };

    let mut part = MeshPart::default();
    for face in skeleton.faces() {
        let points: Vec<DVec3> = face
            .nodes
            .iter()
            .map(|&n| {
                let node = skeleton.node(n);
                let plan = adjustments
                    .iter()
                    .find(|adj| adj.apex == n)
                    .map_or(node.position, |adj| adj.midpoint);
                plan.extend(wall_top + pitch * node.height())
            })
            .collect();
        let triangles = triangulate_planar_face(&points)?;
        part.push_triangles(points, &triangles);
    }
    if part.is_empty() {
        return Err(GeometryError::Skeleton("no walkable faces".into()));
    }
    Ok(part)
}

fn shed_roof(roof: &Shape, top: impl Fn(DVec2) -> f64) -> GeometryResult<MeshPart> {
    let mesh = triangulate_rings(roof.outline(), roof.holes())?;
    let mut part = MeshPart::default();
    part.push_triangles(mesh.vertices.iter().map(|&p| p.extend(top(p))), &mesh.triangles);
    Ok(part)
}

/// Cuts the roof outline at every valley and ridge line, triangulates each
/// strip and lifts it onto the sawtooth profile. Walls are refined at the
/// same x positions so their tops follow the profile.
fn sawtooth_roof(
    footprint: &Shape,
    roof: &Shape,
    wall_top: f64,
    profile: &SawtoothProfile,
) -> GeometryResult<(MeshPart, MeshPart)> {
    if profile.period() <= 0.0 {
        return Err(GeometryError::Triangulation("sawtooth period must be positive".into()));
    }
    let (min, max) = bounds(roof.outline());
    let pad = (max.y - min.y).max(1.0) * 0.01;
    let mut cut_xs = Vec::new();
    let mut valley = min.x;
    loop {
        let ridge = valley + profile.up_width;
        valley += profile.period();
        for x in [ridge, valley] {
            if x > min.x && x < max.x {
                cut_xs.push(x);
            }
        }
        if valley >= max.x {
            break;
        }
    }
    cut_xs.dedup();

    let mut arrangement = Arrangement::new();
    arrangement.insert_exact(
        &roof
            .rings()
            .flat_map(ring_to_exact_segments)
            .collect::<Vec<_>>(),
    );
    let cuts: Vec<_> = cut_xs
        .iter()
        .map(|&x| segment_to_exact(DVec2::new(x, min.y - pad), DVec2::new(x, max.y + pad)))
        .collect();
    arrangement.insert(&cuts);

    let lift = |p: DVec2| p.extend(wall_top + profile.height_at(p.x, min.x));
    let mut part = MeshPart::default();
    for face in arrangement.bounded_faces() {
        if arrangement.face(face).role != FaceRole::Shape {
            continue;
        }
        let outline = arrangement.extract_face_outline(face);
        let holes = arrangement.face_hole_outlines(face);
        let mesh = triangulate_rings(&outline, &holes)?;
        part.push_triangles(mesh.vertices.iter().map(|&p| lift(p)), &mesh.triangles);
    }
    if part.is_empty() {
        return Err(GeometryError::Triangulation("sawtooth roof has no faces".into()));
    }

    let rings: Vec<Vec<DVec2>> = footprint
        .rings()
        .map(|ring| refine_ring(ring, &cut_xs))
        .collect();
    let walls = build_walls(rings.iter().map(Vec::as_slice), |p| {
        wall_top + profile.height_at(p.x, min.x)
    });
    Ok((part, walls))
}

/// Inserts a vertex wherever an edge crosses one of the vertical lines.
fn refine_ring(ring: &[DVec2], xs: &[f64]) -> Vec<DVec2> {
    let n = ring.len();
    let mut refined = Vec::with_capacity(n);
    for i in 0..n {
        let (a, b) = (ring[i], ring[(i + 1) % n]);
        refined.push(a);
        if a.x == b.x {
            continue;
        }
        let mut ts: Vec<f64> = xs
            .iter()
            .map(|&x| (x - a.x) / (b.x - a.x))
            .filter(|t| *t > 0.0 && *t < 1.0)
            .collect();
        ts.sort_by(f64::total_cmp);
        refined.extend(ts.into_iter().map(|t| a.lerp(b, t)));
    }
    refined
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn footprint(w: f64, h: f64) -> Shape {
        Shape::new(vec![
            DVec2::ZERO,
            DVec2::new(w, 0.0),
            DVec2::new(w, h),
            DVec2::new(0.0, h),
        ])
    }

    fn build(style: RoofStyle, config: &RoofConfig) -> BuildingMesh {
        build_building_mesh_with_rng(
            &footprint(20.0, 10.0),
            1,
            style,
            config,
            &mut StdRng::seed_from_u64(3),
        )
    }

    fn max_z(part: &MeshPart) -> f64 {
        part.positions.iter().map(|p| p.z).fold(f64::MIN, f64::max)
    }

    #[test]
    fn flat_box_has_expected_counts() {
        let mesh = build(RoofStyle::Flat, &RoofConfig::default());

        assert_eq!(mesh.walls.positions.len(), 8);
        assert_eq!(mesh.walls.indices.len(), 24);
        assert_eq!(mesh.roof.triangle_count(), 2);
        assert!(mesh.roof.positions.iter().all(|p| p.z == 10.0));
        assert_eq!(mesh.style, RoofStyle::Flat);
    }

    #[test]
    fn walls_face_outward() {
        let mesh = build(RoofStyle::Flat, &RoofConfig::default());
        let center = DVec3::new(10.0, 5.0, 5.0);
        for tri in mesh.walls.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|k| mesh.walls.positions[tri[k] as usize]);
            let normal = (b - a).cross(c - a);
            let outward = (a + b + c) / 3.0 - center;
            assert!(normal.dot(outward) > 0.0);
        }
    }

    #[test]
    fn overhang_widens_flat_roof() {
        let config = RoofConfig {
            overhang: 1.0,
            ..Default::default()
        };
        let mesh = build(RoofStyle::Flat, &config);
        let xs: Vec<f64> = mesh.roof.positions.iter().map(|p| p.x).collect();
        assert_relative_eq!(xs.iter().copied().fold(f64::MAX, f64::min), -1.0, epsilon = 1e-9);
        assert_relative_eq!(xs.iter().copied().fold(f64::MIN, f64::max), 21.0, epsilon = 1e-9);
        // Walls stay on the footprint.
        assert!(mesh.walls.positions.iter().all(|p| (0.0..=20.0).contains(&p.x)));
    }

    #[test]
    fn hipped_roof_rises_to_half_the_width() {
        let mesh = build(RoofStyle::Hipped, &RoofConfig::default());
        assert_eq!(mesh.style, RoofStyle::Hipped);
        // Two trapezoids and two triangles.
        assert_eq!(mesh.roof.triangle_count(), 6);
        assert_relative_eq!(max_z(&mesh.roof), 15.0, epsilon = 1e-9);
        assert!(mesh.roof.positions.iter().all(|p| p.z >= 10.0 - 1e-9));
    }

    #[test]
    fn gabled_roof_moves_hips_to_gable_ends() {
        let mesh = build(RoofStyle::Gabled, &RoofConfig::default());
        let has = |x: f64| {
            mesh.roof.positions.iter().any(|p| {
                (p.x - x).abs() < 1e-9 && (p.y - 5.0).abs() < 1e-9 && (p.z - 15.0).abs() < 1e-9
            })
        };
        assert!(has(0.0));
        assert!(has(20.0));
        assert!(!has(5.0));
    }

    #[test]
    fn shed_walls_meet_the_roof() {
        let config = RoofConfig::default();
        let mesh = build(RoofStyle::Shed, &config);
        let top_right = 10.0 + 20.0 * config.shed_slope;
        assert_relative_eq!(max_z(&mesh.roof), top_right, epsilon = 1e-9);
        assert_relative_eq!(max_z(&mesh.walls), top_right, epsilon = 1e-9);
        for p in &mesh.roof.positions {
            assert_relative_eq!(p.z, 10.0 + config.shed_slope * p.x, epsilon = 1e-9);
        }
    }

    #[test]
    fn sawtooth_follows_profile() {
        let config = RoofConfig::default();
        let mesh = build(RoofStyle::Sawtooth, &config);
        assert_eq!(mesh.style, RoofStyle::Sawtooth);
        let profile = config.sawtooth;
        for p in &mesh.roof.positions {
            assert_relative_eq!(p.z, 10.0 + profile.height_at(p.x, 0.0), epsilon = 1e-9);
        }
        assert_relative_eq!(max_z(&mesh.roof), 10.0 + profile.ridge_height, epsilon = 1e-9);
        // Cuts at 6, 8, 14, 16 refine both long walls.
        assert_eq!(mesh.walls.positions.len(), 2 * (4 + 2 * 4));
    }

    #[test]
    fn sawtooth_profile_is_continuous() {
        let profile = RoofConfig::default().sawtooth;
        assert_relative_eq!(profile.height_at(0.0, 0.0), 0.0);
        assert_relative_eq!(profile.height_at(3.0, 0.0), 1.5);
        assert_relative_eq!(profile.height_at(6.0, 0.0), 3.0);
        assert_relative_eq!(profile.height_at(7.0, 0.0), 1.5);
        assert_relative_eq!(profile.height_at(8.0, 0.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn concrete_styles_are_deterministic() {
        let config = RoofConfig {
            overhang: 0.5,
            ..Default::default()
        };
        for style in RoofStyle::CONCRETE {
            let a = build_building_mesh(&footprint(20.0, 10.0), 2, style, &config);
            let b = build_building_mesh(&footprint(20.0, 10.0), 2, style, &config);
            assert_eq!(a, b, "{:?}", style);
        }
    }

    #[test]
    fn random_style_is_seeded() {
        let config = RoofConfig::default();
        let pick = |seed| {
            build_building_mesh_with_rng(
                &footprint(20.0, 10.0),
                1,
                RoofStyle::Random,
                &config,
                &mut StdRng::seed_from_u64(seed),
            )
        };
        let mesh = pick(11);
        assert_ne!(mesh.style, RoofStyle::Random);
        assert_eq!(mesh, pick(11));
    }

    #[test]
    fn degenerate_footprint_builds_nothing() {
        let line = Shape::new(vec![DVec2::ZERO, DVec2::new(5.0, 0.0)]);
        let mesh = build_building_mesh(&line, 1, RoofStyle::Hipped, &RoofConfig::default());
        assert!(mesh.walls.is_empty());
        assert!(mesh.roof.is_empty());
    }

    #[test]
    fn vertex_data_tags_parts() {
        let mesh = build(RoofStyle::Flat, &RoofConfig::default());
        let data = mesh.vertex_data();
        assert_eq!(data.len(), mesh.combined().positions.len());
        assert_eq!(data.iter().filter(|v| v.part == 1).count(), mesh.roof.positions.len());
        assert_eq!(bytemuck::cast_slice::<MeshVertex, u8>(&data).len(), data.len() * 16);

        let combined = mesh.combined();
        let wall_count = mesh.walls.positions.len() as u32;
        assert!(combined.indices[mesh.walls.indices.len()..]
            .iter()
            .all(|&i| i >= wall_count));
    }
}
