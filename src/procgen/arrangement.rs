//! Planar arrangement of exact segments, stored as a half-edge structure.
//!
//! Vertices, half-edges and faces live in flat arenas addressed by index
//! handles. Every insertion re-resolves the whole segment set: pairwise
//! intersections are computed exactly, overlapping pieces are merged, and the
//! `next`/`twin`/`face` links are rebuilt by sorting outgoing edges around
//! each vertex. Roles survive re-resolution. Exterior edges stay exterior,
//! and each new face takes the role of the face it was carved from.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use bevy::log::debug;
use bevy::math::DVec2;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use smallvec::SmallVec;

use crate::geom::exact::{
    intersect, intersections_along, parity_inside, twice_signed_area, ExactPoint, ExactSegment,
    SegmentIntersection,
};
use crate::geom::to_inexact;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HalfEdgeId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceId(pub usize);

/// The face outside every bounded cycle.
pub const UNBOUNDED_FACE: FaceId = FaceId(0);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaceRole {
    /// Inside the outline: usable area.
    Shape,
    /// Outside the outline or inside one of its holes.
    Hole,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeRole {
    /// Part of the inserted outline.
    Exterior,
    /// Skeleton or divider cut.
    Divider,
}

#[derive(Clone, Debug)]
pub struct Vertex {
    pub point: ExactPoint,
    /// Payload carried through overlays, e.g. roof height.
    pub height: Option<f64>,
    pub incident: Option<HalfEdgeId>,
}

#[derive(Clone, Copy, Debug)]
pub struct HalfEdge {
    pub origin: VertexId,
    pub twin: HalfEdgeId,
    pub next: HalfEdgeId,
    pub prev: HalfEdgeId,
    /// Face on the left.
    pub face: FaceId,
    pub role: EdgeRole,
}

#[derive(Clone, Debug)]
pub struct Face {
    /// Counter-clockwise boundary; `None` for the unbounded face.
    pub outer: Option<HalfEdgeId>,
    /// One half-edge per clockwise inner boundary.
    pub inner: Vec<HalfEdgeId>,
    pub role: FaceRole,
}

/// A face carved out of an existing one by an insertion. `parent` is the
/// handle of the old face in the arrangement as it was before the insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceSplit {
    pub parent: FaceId,
    pub face: FaceId,
    pub was_hole: bool,
}

#[derive(Clone, Debug)]
struct Source {
    segment: ExactSegment,
    role: EdgeRole,
    heights: Option<[f64; 2]>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Classify {
    /// Even-odd against the exterior edges.
    Parity,
    /// Role of the enclosing face before the insert.
    Inherit,
}

#[derive(Clone, Debug)]
pub struct Arrangement {
    vertices: Vec<Vertex>,
    half_edges: Vec<HalfEdge>,
    faces: Vec<Face>,
    sources: Vec<Source>,
}

impl Default for Arrangement {
    fn default() -> Self {
        Self::new()
    }
}

impl Arrangement {
    /// An empty plane: just the unbounded face, tagged as a hole.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            half_edges: Vec::new(),
            faces: vec![Face {
                outer: None,
                inner: Vec::new(),
                role: FaceRole::Hole,
            }],
            sources: Vec::new(),
        }
    }

    /// Inserts outline segments. Bounded faces are classified by even-odd
    /// parity against all exterior edges, so an outline with holes yields
    /// shape faces between the rings and hole faces inside them.
    pub fn insert_exact(&mut self, segments: &[ExactSegment]) -> Vec<FaceSplit> {
        self.add_sources(segments.iter().map(|s| (s, EdgeRole::Exterior, None)));
        self.resolve(Classify::Parity)
    }

    /// Inserts interior cuts. New edges are dividers unless they coincide
    /// with an exterior edge; new faces inherit the role of the face they
    /// split.
    pub fn insert(&mut self, segments: &[ExactSegment]) -> Vec<FaceSplit> {
        self.add_sources(segments.iter().map(|s| (s, EdgeRole::Divider, None)));
        self.resolve(Classify::Inherit)
    }

    /// Like [`insert`](Self::insert), with a height at each segment end.
    /// Intersection vertices interpolate the height of the segment they lie
    /// on; vertices that already exist keep theirs.
    pub fn insert_with_heights(&mut self, segments: &[(ExactSegment, [f64; 2])]) -> Vec<FaceSplit> {
        self.add_sources(
            segments
                .iter()
                .map(|(s, heights)| (s, EdgeRole::Divider, Some(*heights))),
        );
        self.resolve(Classify::Inherit)
    }

    /// Overlays another arrangement's segments, roles and heights.
    pub fn overlay(&mut self, other: &Arrangement) -> Vec<FaceSplit> {
        self.sources.extend(other.sources.iter().cloned());
        self.resolve(Classify::Inherit)
    }

    fn add_sources<'a>(
        &mut self,
        segments: impl Iterator<Item = (&'a ExactSegment, EdgeRole, Option<[f64; 2]>)>,
    ) {
        for (segment, role, heights) in segments {
            if !segment.is_degenerate() {
                self.sources.push(Source {
                    segment: segment.clone(),
                    role,
                    heights,
                });
            }
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn half_edges(&self) -> &[HalfEdge] {
        &self.half_edges
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }

    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.0]
    }

    pub fn half_edge(&self, id: HalfEdgeId) -> &HalfEdge {
        &self.half_edges[id.0]
    }

    pub fn face(&self, id: FaceId) -> &Face {
        &self.faces[id.0]
    }

    pub fn target(&self, id: HalfEdgeId) -> VertexId {
        let twin = self.half_edges[id.0].twin;
        self.half_edges[twin.0].origin
    }

    pub fn bounded_faces(&self) -> impl Iterator<Item = FaceId> + '_ {
        (1..self.faces.len()).map(FaceId)
    }

    /// Half-edges of the cycle through `start`, following `next` until the
    /// walk returns to `start`.
    pub fn cycle(&self, start: HalfEdgeId) -> Vec<HalfEdgeId> {
        let mut cycle = vec![start];
        let mut current = self.half_edges[start.0].next;
        while current != start && cycle.len() <= self.half_edges.len() {
            cycle.push(current);
            current = self.half_edges[current.0].next;
        }
        cycle
    }

    /// Edges whose twin lies in the same face: spurs and bridges that do
    /// not separate the face from anything.
    fn is_dangling(&self, id: HalfEdgeId) -> bool {
        let edge = &self.half_edges[id.0];
        self.half_edges[edge.twin.0].face == edge.face
    }

    fn boundary_half_edges(&self, face: FaceId) -> Vec<HalfEdgeId> {
        let f = &self.faces[face.0];
        f.outer
            .iter()
            .chain(f.inner.iter())
            .flat_map(|&start| self.cycle(start))
            .collect()
    }

    fn endpoints(&self, id: HalfEdgeId) -> (&ExactPoint, &ExactPoint) {
        (
            &self.vertices[self.half_edges[id.0].origin.0].point,
            &self.vertices[self.target(id).0].point,
        )
    }

    /// Exact boundary of a face's outer cycle, as target vertices in walk
    /// order. Dangling edges are skipped.
    pub fn extract_face_outline_exact(&self, face: FaceId) -> Vec<ExactPoint> {
        match self.faces[face.0].outer {
            Some(start) => self.cycle_points(start),
            None => Vec::new(),
        }
    }

    fn cycle_points(&self, start: HalfEdgeId) -> Vec<ExactPoint> {
        self.cycle(start)
            .into_iter()
            .filter(|&h| !self.is_dangling(h))
            .map(|h| self.vertices[self.target(h).0].point.clone())
            .collect()
    }

    /// Closed outline of a face, counter-clockwise, without a repeated
    /// closing point.
    pub fn extract_face_outline(&self, face: FaceId) -> Vec<DVec2> {
        self.extract_face_outline_exact(face)
            .iter()
            .map(to_inexact)
            .collect()
    }

    /// Inner boundaries of a face that enclose area (clockwise rings).
    pub fn face_hole_outlines(&self, face: FaceId) -> Vec<Vec<DVec2>> {
        self.faces[face.0]
            .inner
            .iter()
            .map(|&start| self.cycle_points(start))
            .filter(|ring| ring.len() >= 3 && !twice_signed_area(ring.iter()).is_zero())
            .map(|ring| ring.iter().map(to_inexact).collect())
            .collect()
    }

    /// Area of a face: outer cycle minus its inner boundaries.
    pub fn face_area(&self, face: FaceId) -> f64 {
        let f = &self.faces[face.0];
        let cycle_area = |start: HalfEdgeId| {
            let points: Vec<&ExactPoint> = self
                .cycle(start)
                .into_iter()
                .map(|h| &self.vertices[self.half_edges[h.0].origin.0].point)
                .collect();
            twice_signed_area(points).abs()
        };
        let outer = f.outer.map(cycle_area).unwrap_or_else(BigRational::zero);
        let inner = f
            .inner
            .iter()
            .map(|&h| cycle_area(h))
            .fold(BigRational::zero(), |acc, a| acc + a);
        ((outer - inner) / BigRational::from_integer(BigInt::from(2)))
            .to_f64()
            .unwrap_or(0.0)
    }

    /// A point strictly inside a bounded face.
    ///
    /// Scans horizontal lines halfway between consecutive vertex heights of
    /// the face boundary. The first span between boundary crossings is cut
    /// at any dangling edges it meets, and the midpoint of its first piece is
    /// returned.
    pub fn sample_point(&self, face: FaceId) -> Option<ExactPoint> {
        let (separating, dangling): (Vec<HalfEdgeId>, Vec<HalfEdgeId>) = self
            .boundary_half_edges(face)
            .into_iter()
            .partition(|&h| !self.is_dangling(h));
        let walls: Vec<(&ExactPoint, &ExactPoint)> =
            separating.iter().map(|&h| self.endpoints(h)).collect();
        let spurs: Vec<(&ExactPoint, &ExactPoint)> =
            dangling.iter().map(|&h| self.endpoints(h)).collect();

        let mut ys: Vec<&BigRational> = walls.iter().chain(&spurs).map(|(a, _)| &a.y).collect();
        ys.sort();
        ys.dedup();

        let two = BigRational::from_integer(BigInt::from(2));
        for pair in ys.windows(2) {
            let y = (pair[0] + pair[1]) / &two;
            let mut xs = crossings(&walls, &y);
            xs.sort();
            let cuts = crossings(&spurs, &y);
            for span in xs.chunks_exact(2) {
                let mut stops: Vec<&BigRational> = cuts
                    .iter()
                    .filter(|x| **x > span[0] && **x < span[1])
                    .chain([&span[0], &span[1]])
                    .collect();
                stops.sort();
                stops.dedup();
                if let [first, second, ..] = stops.as_slice() {
                    return Some(ExactPoint::new((*first + *second) / &two, y));
                }
            }
        }
        None
    }

    fn face_contains(&self, face: FaceId, p: &ExactPoint) -> bool {
        let edges: Vec<(&ExactPoint, &ExactPoint)> = self
            .boundary_half_edges(face)
            .into_iter()
            .filter(|&h| !self.is_dangling(h))
            .map(|h| self.endpoints(h))
            .collect();
        parity_inside(p, edges)
    }

    /// The face containing `p`. Points on edges resolve to whichever
    /// adjacent face is tested first.
    pub fn locate(&self, p: &ExactPoint) -> FaceId {
        self.bounded_faces()
            .find(|&f| self.face_contains(f, p))
            .unwrap_or(UNBOUNDED_FACE)
    }

    fn resolve(&mut self, mode: Classify) -> Vec<FaceSplit> {
        let mut next = self.rebuild();

        let exterior: Vec<(&ExactPoint, &ExactPoint)> = next
            .half_edges
            .iter()
            .enumerate()
            .step_by(2)
            .filter(|(_, e)| e.role == EdgeRole::Exterior)
            .map(|(i, _)| next.endpoints(HalfEdgeId(i)))
            .collect();

        let mut roles = Vec::with_capacity(next.faces.len());
        let mut parents = Vec::with_capacity(next.faces.len());
        for face in next.bounded_faces() {
            let sample = next.sample_point(face);
            let parent = sample
                .as_ref()
                .map_or(UNBOUNDED_FACE, |p| self.locate(p));
            let role = match (mode, &sample) {
                (Classify::Parity, Some(p)) if parity_inside(p, exterior.iter().copied()) => {
                    FaceRole::Shape
                }
                (Classify::Parity, _) => FaceRole::Hole,
                (Classify::Inherit, _) => self.faces[parent.0].role,
            };
            roles.push(role);
            parents.push(parent);
        }
        drop(exterior);

        let mut children: BTreeMap<FaceId, usize> = BTreeMap::new();
        for parent in &parents {
            *children.entry(*parent).or_default() += 1;
        }
        let mut splits = Vec::new();
        for (i, (role, parent)) in roles.into_iter().zip(parents).enumerate() {
            let face = FaceId(i + 1);
            next.faces[face.0].role = role;
            if parent == UNBOUNDED_FACE || children[&parent] > 1 {
                splits.push(FaceSplit {
                    parent,
                    face,
                    was_hole: self.faces[parent.0].role == FaceRole::Hole,
                });
            }
        }

        debug!(
            "Arrangement resolved: {} segments, {} vertices, {} faces",
            next.sources.len(),
            next.vertices.len(),
            next.faces.len()
        );
        *self = next;
        splits
    }

    /// Fresh topology for the current sources. Face roles default to hole.
    fn rebuild(&self) -> Arrangement {
        let sources = &self.sources;

        let mut cuts: Vec<Vec<ExactPoint>> = sources
            .iter()
            .map(|s| vec![s.segment.source.clone(), s.segment.target.clone()])
            .collect();
        for i in 0..sources.len() {
            for j in (i + 1)..sources.len() {
                let (a, b) = (&sources[i].segment, &sources[j].segment);
                if !boxes_overlap(a, b) {
                    continue;
                }
                match intersect(a, b) {
                    SegmentIntersection::Disjoint => {}
                    SegmentIntersection::Point(p) => {
                        cuts[i].push(p.clone());
                        cuts[j].push(p);
                    }
                    SegmentIntersection::Overlap(p, q) => {
                        cuts[i].extend([p.clone(), q.clone()]);
                        cuts[j].extend([p, q]);
                    }
                }
            }
        }

        let mut known_heights: BTreeMap<ExactPoint, f64> = self
            .vertices
            .iter()
            .filter_map(|v| v.height.map(|h| (v.point.clone(), h)))
            .collect();
        for source in sources {
            if let Some([h0, h1]) = source.heights {
                known_heights.entry(source.segment.source.clone()).or_insert(h0);
                known_heights.entry(source.segment.target.clone()).or_insert(h1);
            }
        }

        let mut index_of: BTreeMap<ExactPoint, usize> = BTreeMap::new();
        let mut vertices: Vec<Vertex> = Vec::new();
        let mut edges: BTreeMap<(usize, usize), EdgeRole> = BTreeMap::new();

        for (source, points) in sources.iter().zip(cuts) {
            let segment = &source.segment;
            let mut keyed: Vec<(BigRational, ExactPoint)> = points
                .into_iter()
                .map(|p| (segment.parameter_of(&p), p))
                .collect();
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            keyed.dedup_by(|a, b| a.1 == b.1);

            let mut ids = Vec::with_capacity(keyed.len());
            for (t, p) in keyed {
                let id = *index_of.entry(p.clone()).or_insert_with(|| {
                    vertices.push(Vertex {
                        point: p.clone(),
                        height: None,
                        incident: None,
                    });
                    vertices.len() - 1
                });
                if vertices[id].height.is_none() {
                    vertices[id].height = known_heights.get(&p).copied().or_else(|| {
                        let [h0, h1] = source.heights?;
                        let t = t.to_f64()?;
                        Some(h0 + (h1 - h0) * t)
                    });
                }
                ids.push(id);
            }
            for pair in ids.windows(2) {
                let key = (pair[0].min(pair[1]), pair[0].max(pair[1]));
                let role = edges.entry(key).or_insert(source.role);
                if source.role == EdgeRole::Exterior {
                    *role = EdgeRole::Exterior;
                }
            }
        }

        let mut half_edges: Vec<HalfEdge> = Vec::with_capacity(edges.len() * 2);
        for (k, (&(u, v), &role)) in edges.iter().enumerate() {
            for (origin, twin) in [(u, 2 * k + 1), (v, 2 * k)] {
                half_edges.push(HalfEdge {
                    origin: VertexId(origin),
                    twin: HalfEdgeId(twin),
                    next: HalfEdgeId(0),
                    prev: HalfEdgeId(0),
                    face: UNBOUNDED_FACE,
                    role,
                });
            }
        }

        // Outgoing half-edges around each vertex, counter-clockwise from +x.
        let mut outgoing: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); vertices.len()];
        for (h, edge) in half_edges.iter().enumerate() {
            outgoing[edge.origin.0].push(h);
        }
        let direction = |h: usize| {
            let from = &vertices[half_edges[h].origin.0].point;
            let to = &vertices[half_edges[half_edges[h].twin.0].origin.0].point;
            (&to.x - &from.x, &to.y - &from.y)
        };
        for around in outgoing.iter_mut() {
            around.sort_by(|&a, &b| compare_directions(&direction(a), &direction(b)));
        }

        // Arriving along h, the face on the left continues with the outgoing
        // edge just clockwise of h's twin.
        for around in &outgoing {
            let n = around.len();
            for (i, &out) in around.iter().enumerate() {
                let arriving = half_edges[out].twin.0;
                let turn = around[(i + n - 1) % n];
                half_edges[arriving].next = HalfEdgeId(turn);
                half_edges[turn].prev = HalfEdgeId(arriving);
            }
        }
        for (v, around) in outgoing.iter().enumerate() {
            vertices[v].incident = around.first().map(|&h| HalfEdgeId(h));
        }

        let mut arrangement = Arrangement {
            vertices,
            half_edges,
            faces: vec![Face {
                outer: None,
                inner: Vec::new(),
                role: FaceRole::Hole,
            }],
            sources: self.sources.clone(),
        };
        arrangement.link_faces();
        arrangement
    }

    /// Groups half-edges into cycles, turns counter-clockwise cycles into
    /// faces and hangs every other cycle inside the smallest face of another
    /// component that encloses it.
    fn link_faces(&mut self) {
        let mut visited = vec![false; self.half_edges.len()];
        let mut outer_cycles: Vec<(Vec<HalfEdgeId>, BigRational)> = Vec::new();
        let mut inner_cycles: Vec<Vec<HalfEdgeId>> = Vec::new();

        for start in 0..self.half_edges.len() {
            if visited[start] {
                continue;
            }
            let cycle = self.cycle(HalfEdgeId(start));
            for h in &cycle {
                visited[h.0] = true;
            }
            let area = twice_signed_area(
                cycle
                    .iter()
                    .map(|h| &self.vertices[self.half_edges[h.0].origin.0].point),
            );
            if area.is_positive() {
                outer_cycles.push((cycle, area));
            } else {
                inner_cycles.push(cycle);
            }
        }

        let mut components = DisjointSet::new(self.vertices.len());
        for edge in self.half_edges.iter().step_by(2) {
            let twin = &self.half_edges[edge.twin.0];
            components.union(edge.origin.0, twin.origin.0);
        }

        for (cycle, _) in &outer_cycles {
            let face = FaceId(self.faces.len());
            self.faces.push(Face {
                outer: Some(cycle[0]),
                inner: Vec::new(),
                role: FaceRole::Hole,
            });
            for h in cycle {
                self.half_edges[h.0].face = face;
            }
        }

        for cycle in inner_cycles {
            let origin = self.half_edges[cycle[0].0].origin.0;
            let component = components.find(origin);
            let point = &self.vertices[origin].point;
            let owner = outer_cycles
                .iter()
                .enumerate()
                .filter(|(_, (outer, _))| {
                    let other = self.half_edges[outer[0].0].origin.0;
                    components.find(other) != component
                        && parity_inside(point, outer.iter().map(|&h| self.endpoints(h)))
                })
                .min_by(|a, b| a.1 .1.cmp(&b.1 .1))
                .map_or(UNBOUNDED_FACE, |(i, _)| FaceId(i + 1));
            self.faces[owner.0].inner.push(cycle[0]);
            for h in &cycle {
                self.half_edges[h.0].face = owner;
            }
        }
    }
}

/// Every point where the last segment meets the others, ordered along the
/// last segment. Callers append a query segment to a working set, read its
/// crossings, and pop it again.
pub fn compute_intersection_points(segments: &[ExactSegment]) -> Vec<ExactPoint> {
    match segments.split_last() {
        Some((query, rest)) => intersections_along(query, rest),
        None => Vec::new(),
    }
}

fn boxes_overlap(a: &ExactSegment, b: &ExactSegment) -> bool {
    fn span<'a>(p: &'a BigRational, q: &'a BigRational) -> (&'a BigRational, &'a BigRational) {
        if p <= q {
            (p, q)
        } else {
            (q, p)
        }
    }
    let (ax, bx) = (span(&a.source.x, &a.target.x), span(&b.source.x, &b.target.x));
    let (ay, by) = (span(&a.source.y, &a.target.y), span(&b.source.y, &b.target.y));
    ax.0 <= bx.1 && bx.0 <= ax.1 && ay.0 <= by.1 && by.0 <= ay.1
}

/// X coordinates where edges cross the horizontal line at `y`.
fn crossings(edges: &[(&ExactPoint, &ExactPoint)], y: &BigRational) -> Vec<BigRational> {
    edges
        .iter()
        .filter(|(a, b)| (&a.y > y) != (&b.y > y))
        .map(|(a, b)| &a.x + (y - &a.y) * (&b.x - &a.x) / (&b.y - &a.y))
        .collect()
}

/// Counter-clockwise order of direction vectors, starting at +x.
fn compare_directions(a: &(BigRational, BigRational), b: &(BigRational, BigRational)) -> Ordering {
    let half = |(x, y): &(BigRational, BigRational)| {
        if y.is_positive() || (y.is_zero() && x.is_positive()) {
            0
        } else {
            1
        }
    };
    half(a).cmp(&half(b)).then_with(|| {
        let cross = &a.0 * &b.1 - &a.1 * &b.0;
        BigRational::zero().cmp(&cross)
    })
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&self, mut x: usize) -> usize {
        while self.parent[x] != x {
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }
}
