//! Straight skeleton of polygons with holes.
//!
//! Every boundary vertex moves along its angle bisector at the speed that
//! keeps both incident edges translating inward at unit speed. Two kinds of
//! events change the wavefront:
//!
//! - edge event: an edge shrinks to nothing and its two vertices merge
//! - split event: a reflex vertex runs into an opposite edge and cuts the
//!   wavefront in two
//!
//! The time of each event is the offset distance at which it happens, so it
//! doubles as a roof height. The result is stored in a petgraph graph of
//! contour and skeleton nodes; faces (one per contour edge) are recovered by
//! walking the arcs labelled with that edge.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

use bevy::log::{debug, warn};
use bevy::math::DVec2;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::error::{GeometryError, GeometryResult};
use crate::geom::inexact::{
    bisector_velocity, bounds, left_normal, point_in_ring, remove_collinear, signed_area, EPSILON,
};

/// Relative tolerance used to fuse skeleton nodes created by simultaneous
/// events.
const MERGE_TOLERANCE: f64 = 1e-7;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Vertex of the input polygon.
    Contour,
    /// Wavefront event inside the polygon.
    Skeleton,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkeletonNode {
    pub position: DVec2,
    /// Offset distance at which the node was created.
    pub time: f64,
    pub kind: NodeKind,
}

impl SkeletonNode {
    /// Height field value: event time for skeleton nodes, zero on the contour.
    pub fn height(&self) -> f64 {
        match self.kind {
            NodeKind::Contour => 0.0,
            NodeKind::Skeleton => self.time,
        }
    }
}

/// Arc of the skeleton, traced between the wavefronts of two contour edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SkeletonArc {
    pub faces: [usize; 2],
}

impl SkeletonArc {
    fn borders(&self, edge: usize) -> bool {
        self.faces[0] == edge || self.faces[1] == edge
    }
}

/// The region swept by one contour edge, counter-clockwise, starting with
/// the edge's own endpoints.
#[derive(Clone, Debug)]
pub struct SkeletonFace {
    pub edge: usize,
    pub nodes: Vec<NodeIndex>,
}

/// A triangular face whose apex has a single skeleton neighbour. Moving the
/// apex to `midpoint` turns the hip into a gable end.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GableAdjustment {
    pub face: usize,
    pub apex: NodeIndex,
    pub ridge_end: NodeIndex,
    pub midpoint: DVec2,
}

#[derive(Clone, Debug)]
pub struct StraightSkeleton {
    graph: UnGraph<SkeletonNode, SkeletonArc>,
    /// Contour nodes per ring, outer ring first, in wavefront order.
    rings: Vec<Vec<NodeIndex>>,
    /// `(start, end)` contour nodes of each edge.
    edges: Vec<(NodeIndex, NodeIndex)>,
    faces: Vec<SkeletonFace>,
}

impl StraightSkeleton {
    /// Builds the interior skeleton. The outline is reoriented to CCW and
    /// holes to CW; duplicate and collinear vertices are dropped first.
    pub fn build(outline: &[DVec2], holes: &[Vec<DVec2>]) -> GeometryResult<Self> {
        let rings = prepare_rings(outline, holes)?;
        let mut wavefront = Wavefront::new(&rings);
        wavefront.run(None);
        wavefront.collapse_leftovers();
        Ok(Self::assemble(&rings, wavefront))
    }

    fn assemble(rings: &[Vec<DVec2>], wavefront: Wavefront) -> Self {
        let merge_tolerance = wavefront.scale * MERGE_TOLERANCE;
        let mut graph = UnGraph::new_undirected();
        let mut representative: Vec<NodeIndex> = Vec::with_capacity(wavefront.nodes.len());
        let mut skeleton_nodes: Vec<NodeIndex> = Vec::new();

        for node in &wavefront.nodes {
            let existing = match node.kind {
                NodeKind::Contour => None,
                NodeKind::Skeleton => skeleton_nodes.iter().copied().find(|&idx| {
                    let other: &SkeletonNode = &graph[idx];
                    other.position.distance(node.position) <= merge_tolerance
                }),
            };
            let idx = match existing {
                Some(idx) => idx,
                None => {
                    let idx = graph.add_node(*node);
                    if node.kind == NodeKind::Skeleton {
                        skeleton_nodes.push(idx);
                    }
                    idx
                }
            };
            representative.push(idx);
        }

        let mut seen = BTreeSet::new();
        for &(a, b, faces) in &wavefront.arcs {
            let (a, b) = (representative[a], representative[b]);
            if a == b {
                continue;
            }
            let key = (a.index().min(b.index()), a.index().max(b.index()));
            if seen.insert(key) {
                graph.add_edge(a, b, SkeletonArc { faces });
            }
        }

        let mut ring_nodes = Vec::with_capacity(rings.len());
        let mut edges = Vec::new();
        let mut offset = 0;
        for ring in rings {
            let nodes: Vec<NodeIndex> = (0..ring.len()).map(|i| representative[offset + i]).collect();
            for i in 0..nodes.len() {
                edges.push((nodes[i], nodes[(i + 1) % nodes.len()]));
            }
            offset += ring.len();
            ring_nodes.push(nodes);
        }

        let mut skeleton = Self {
            graph,
            rings: ring_nodes,
            edges,
            faces: Vec::new(),
        };
        skeleton.faces = (0..skeleton.edges.len())
            .filter_map(|edge| skeleton.walk_face(edge))
            .collect();
        debug!(
            "Straight skeleton: {} nodes, {} arcs, {}/{} faces",
            skeleton.graph.node_count(),
            skeleton.graph.edge_count(),
            skeleton.faces.len(),
            skeleton.edges.len()
        );
        skeleton
    }

    /// Follows the arcs bordering `edge` from its end back to its start.
    fn walk_face(&self, edge: usize) -> Option<SkeletonFace> {
        let (start, end) = self.edges[edge];
        let mut nodes = vec![start, end];
        let mut used = Vec::new();
        let mut current = end;
        let limit = self.graph.edge_count() + 1;

        for _ in 0..limit {
            let candidates: Vec<_> = self
                .graph
                .edges(current)
                .filter(|e| e.weight().borders(edge) && !used.contains(&e.id()))
                .map(|e| (e.id(), if e.source() == current { e.target() } else { e.source() }))
                .collect();
            // Prefer closing the face, then interior nodes over stray contour nodes.
            let step = candidates
                .iter()
                .find(|(_, n)| *n == start)
                .or_else(|| {
                    candidates
                        .iter()
                        .find(|(_, n)| self.graph[*n].kind == NodeKind::Skeleton)
                })
                .or_else(|| candidates.first())
                .copied();
            let (arc, next) = match step {
                Some(step) => step,
                None => break,
            };
            used.push(arc);
            if next == start {
                return Some(SkeletonFace { edge, nodes });
            }
            nodes.push(next);
            current = next;
        }
        warn!("Skeleton face for contour edge {} could not be closed", edge);
        None
    }

    pub fn graph(&self) -> &UnGraph<SkeletonNode, SkeletonArc> {
        &self.graph
    }

    pub fn node(&self, idx: NodeIndex) -> &SkeletonNode {
        &self.graph[idx]
    }

    pub fn faces(&self) -> &[SkeletonFace] {
        &self.faces
    }

    pub fn contour_edge_count(&self) -> usize {
        self.edges.len()
    }

    /// The oriented input rings the skeleton was built from.
    pub fn contour_rings(&self) -> Vec<Vec<DVec2>> {
        self.rings
            .iter()
            .map(|ring| ring.iter().map(|&n| self.graph[n].position).collect())
            .collect()
    }

    /// Closed border walk over every ring.
    pub fn contour_segments(&self) -> Vec<(DVec2, DVec2)> {
        self.edges
            .iter()
            .map(|&(a, b)| (self.graph[a].position, self.graph[b].position))
            .collect()
    }

    /// Arcs joining two skeleton nodes, once per arc.
    pub fn interior_segments(&self) -> Vec<(DVec2, DVec2)> {
        self.interior_arcs()
            .map(|(a, b)| (self.graph[a].position, self.graph[b].position))
            .collect()
    }

    fn interior_arcs(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex)> + '_ {
        self.graph.edge_references().filter_map(|e| {
            let (a, b) = (e.source(), e.target());
            let interior = self.graph[a].kind == NodeKind::Skeleton
                && self.graph[b].kind == NodeKind::Skeleton;
            interior.then_some((a, b))
        })
    }

    /// Direction of the longest skeleton-to-skeleton arc. It runs along the
    /// polygon's long axis, so cuts laid across it form natural lot rows.
    pub fn dominant_angle(&self) -> Option<f64> {
        self.interior_segments()
            .into_iter()
            .map(|(a, b)| b - a)
            .filter(|d| d.length() > EPSILON)
            .max_by(|a, b| a.length().total_cmp(&b.length()))
            .map(|d| d.y.atan2(d.x))
    }

    /// Triangular faces `[start, end, apex]` whose apex has exactly one
    /// skeleton neighbour.
    pub fn gable_adjustments(&self) -> Vec<GableAdjustment> {
        let mut adjustments = Vec::new();
        for (face_idx, face) in self.faces.iter().enumerate() {
            if face.nodes.len() != 3 {
                continue;
            }
            let apex = face.nodes[2];
            if self.graph[apex].kind != NodeKind::Skeleton {
                continue;
            }
            let interior: Vec<NodeIndex> = self
                .graph
                .neighbors(apex)
                .filter(|&n| self.graph[n].kind == NodeKind::Skeleton)
                .collect();
            if let &[ridge_end] = interior.as_slice() {
                let midpoint = (self.graph[face.nodes[0]].position
                    + self.graph[face.nodes[1]].position)
                    / 2.0;
                adjustments.push(GableAdjustment {
                    face: face_idx,
                    apex,
                    ridge_end,
                    midpoint,
                });
            }
        }
        adjustments
    }

    /// Ridge arcs stretched out to the midpoint of the contour edge they
    /// face, one per gable adjustment.
    pub fn adjusted_segments(&self) -> Vec<(DVec2, DVec2)> {
        self.gable_adjustments()
            .into_iter()
            .map(|adj| (adj.midpoint, self.graph[adj.ridge_end].position))
            .collect()
    }

    pub fn max_height(&self) -> f64 {
        self.graph
            .node_weights()
            .map(SkeletonNode::height)
            .fold(0.0, f64::max)
    }
}

/// Inward offset of a polygon with holes by running the wavefront until
/// `distance`. Pinched polygons come back as several pieces; each piece is
/// an outline plus the holes that ended up inside it.
pub fn offset_polygon(
    outline: &[DVec2],
    holes: &[Vec<DVec2>],
    distance: f64,
) -> GeometryResult<Vec<(Vec<DVec2>, Vec<Vec<DVec2>>)>> {
    let rings = prepare_rings(outline, holes)?;
    if distance <= 0.0 {
        let (outer, inner) = rings.split_first().ok_or(GeometryError::ZeroArea)?;
        return Ok(vec![(outer.clone(), inner.to_vec())]);
    }
    let mut wavefront = Wavefront::new(&rings);
    wavefront.run(Some(distance));

    let min_area = (wavefront.scale * 1e-6).powi(2);
    let mut outers: Vec<(Vec<DVec2>, Vec<Vec<DVec2>>)> = Vec::new();
    let mut inners = Vec::new();
    for ring in wavefront.rings_at(distance) {
        let area = signed_area(&ring);
        if area > min_area {
            outers.push((ring, Vec::new()));
        } else if area < -min_area {
            inners.push(ring);
        }
    }
    for hole in inners {
        if let Some(owner) = outers
            .iter_mut()
            .filter(|(outer, _)| point_in_ring(hole[0], outer))
            .min_by(|a, b| signed_area(&a.0).total_cmp(&signed_area(&b.0)))
        {
            owner.1.push(hole);
        }
    }
    Ok(outers)
}

/// Cleans, validates and orients the input rings: outline CCW, holes CW.
fn prepare_rings(outline: &[DVec2], holes: &[Vec<DVec2>]) -> GeometryResult<Vec<Vec<DVec2>>> {
    let (min, max) = bounds(outline);
    let tolerance = (max - min).max_element().max(1.0) * EPSILON;

    let mut outer = remove_collinear(outline, tolerance);
    if outer.len() < 3 {
        return Err(GeometryError::TooFewVertices {
            required: 3,
            actual: outer.len(),
        });
    }
    let area = signed_area(&outer);
    if area.abs() <= tolerance {
        return Err(GeometryError::ZeroArea);
    }
    if area < 0.0 {
        outer.reverse();
    }

    let mut rings = vec![outer];
    for hole in holes {
        let mut ring = remove_collinear(hole, tolerance);
        if ring.len() < 3 || signed_area(&ring).abs() <= tolerance {
            continue;
        }
        if signed_area(&ring) > 0.0 {
            ring.reverse();
        }
        rings.push(ring);
    }
    Ok(rings)
}

struct WaveEdge {
    start: DVec2,
    direction: DVec2,
    normal: DVec2,
}

#[derive(Clone, Copy)]
struct WaveVertex {
    origin: DVec2,
    start_time: f64,
    velocity: DVec2,
    edge_in: usize,
    edge_out: usize,
    prev: usize,
    next: usize,
    node: usize,
    reflex: bool,
    /// Incident edges fold onto each other; the vertex waits for its
    /// neighbours to close the wavefront around it.
    stalled: bool,
    alive: bool,
}

impl WaveVertex {
    fn position_at(&self, time: f64) -> DVec2 {
        self.origin + self.velocity * (time - self.start_time)
    }

    /// Position extrapolated back to time zero.
    fn anchor(&self) -> DVec2 {
        self.origin - self.velocity * self.start_time
    }
}

#[derive(Clone, Copy, Debug)]
enum EventKind {
    Edge { left: usize, right: usize },
    Split { vertex: usize, edge: usize },
}

#[derive(Clone, Copy, Debug)]
struct Event {
    time: f64,
    order: u64,
    point: DVec2,
    kind: EventKind,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    // Reversed so the max-heap pops the earliest event.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.order.cmp(&self.order))
    }
}

struct Wavefront {
    edges: Vec<WaveEdge>,
    vertices: Vec<WaveVertex>,
    queue: BinaryHeap<Event>,
    nodes: Vec<SkeletonNode>,
    arcs: Vec<(usize, usize, [usize; 2])>,
    order: u64,
    scale: f64,
    tolerance: f64,
}

impl Wavefront {
    fn new(rings: &[Vec<DVec2>]) -> Self {
        let all: Vec<DVec2> = rings.iter().flatten().copied().collect();
        let (min, max) = bounds(&all);
        let scale = (max - min).max_element().max(1.0);
        let mut wavefront = Self {
            edges: Vec::new(),
            vertices: Vec::new(),
            queue: BinaryHeap::new(),
            nodes: Vec::new(),
            arcs: Vec::new(),
            order: 0,
            scale,
            tolerance: scale * EPSILON,
        };

        for ring in rings {
            let base = wavefront.vertices.len();
            let n = ring.len();
            for i in 0..n {
                let direction = (ring[(i + 1) % n] - ring[i]).normalize_or_zero();
                wavefront.edges.push(WaveEdge {
                    start: ring[i],
                    direction,
                    normal: left_normal(direction),
                });
            }
            for (i, &p) in ring.iter().enumerate() {
                wavefront.nodes.push(SkeletonNode {
                    position: p,
                    time: 0.0,
                    kind: NodeKind::Contour,
                });
                let mut vertex = WaveVertex {
                    origin: p,
                    start_time: 0.0,
                    velocity: DVec2::ZERO,
                    edge_in: base + (i + n - 1) % n,
                    edge_out: base + i,
                    prev: base + (i + n - 1) % n,
                    next: base + (i + 1) % n,
                    node: base + i,
                    reflex: false,
                    stalled: false,
                    alive: true,
                };
                wavefront.orient(&mut vertex);
                wavefront.vertices.push(vertex);
            }
        }

        for v in 0..wavefront.vertices.len() {
            let next = wavefront.vertices[v].next;
            wavefront.push_edge_event(v, next);
            wavefront.push_split_events(v);
        }
        wavefront
    }

    fn orient(&self, vertex: &mut WaveVertex) {
        let e_in = &self.edges[vertex.edge_in];
        let e_out = &self.edges[vertex.edge_out];
        match bisector_velocity(e_in.normal, e_out.normal) {
            Some(velocity) => vertex.velocity = velocity,
            None => {
                vertex.velocity = DVec2::ZERO;
                vertex.stalled = true;
            }
        }
        vertex.reflex = e_in.direction.perp_dot(e_out.direction) < -EPSILON;
    }

    fn push(&mut self, time: f64, point: DVec2, kind: EventKind) {
        self.order += 1;
        self.queue.push(Event {
            time,
            order: self.order,
            point,
            kind,
        });
    }

    fn push_edge_event(&mut self, left: usize, right: usize) {
        let (a, b) = (self.vertices[left], self.vertices[right]);
        if a.stalled || b.stalled || left == right {
            return;
        }
        let edge = &self.edges[a.edge_out];
        // Length of the shared edge changes at this rate; it must shrink.
        let rate = (b.velocity - a.velocity).dot(edge.direction);
        if rate > -EPSILON {
            return;
        }
        let time = (a.anchor() - b.anchor()).dot(edge.direction) / rate;
        let earliest = a.start_time.max(b.start_time);
        if time < earliest - self.tolerance {
            return;
        }
        let time = time.max(earliest);
        let point = (a.position_at(time) + b.position_at(time)) / 2.0;
        self.push(time, point, EventKind::Edge { left, right });
    }

    fn push_split_events(&mut self, v: usize) {
        let vertex = self.vertices[v];
        if !vertex.reflex || vertex.stalled {
            return;
        }
        for e in 0..self.edges.len() {
            if e == vertex.edge_in || e == vertex.edge_out {
                continue;
            }
            let edge = &self.edges[e];
            let closing = 1.0 - vertex.velocity.dot(edge.normal);
            if closing < EPSILON {
                continue;
            }
            let ahead = (vertex.origin - edge.start).dot(edge.normal) - vertex.start_time;
            if ahead < -self.tolerance {
                continue;
            }
            let time = (vertex.anchor() - edge.start).dot(edge.normal) / closing;
            if time <= vertex.start_time + self.tolerance {
                continue;
            }
            let point = vertex.anchor() + vertex.velocity * time;
            self.push(time, point, EventKind::Split { vertex: v, edge: e });
        }
    }

    fn run(&mut self, stop: Option<f64>) {
        let n = self.vertices.len();
        let budget = 8 * n * n + 64;
        let mut handled = 0;
        while let Some(event) = self.queue.pop() {
            if stop.is_some_and(|limit| event.time >= limit) {
                break;
            }
            let applied = match event.kind {
                EventKind::Edge { left, right } => self.edge_event(left, right, &event),
                EventKind::Split { vertex, edge } => self.split_event(vertex, edge, &event),
            };
            if applied {
                handled += 1;
                if handled > budget {
                    warn!("Straight skeleton stopped after {} events", handled);
                    break;
                }
            }
        }
    }

    fn add_node(&mut self, position: DVec2, time: f64) -> usize {
        self.nodes.push(SkeletonNode {
            position,
            time,
            kind: NodeKind::Skeleton,
        });
        self.nodes.len() - 1
    }

    fn terminate(&mut self, v: usize, node: usize) {
        let vertex = &mut self.vertices[v];
        vertex.alive = false;
        self.arcs
            .push((vertex.node, node, [vertex.edge_in, vertex.edge_out]));
    }

    fn spawn(
        &mut self,
        point: DVec2,
        time: f64,
        edges: (usize, usize),
        neighbours: (usize, usize),
        node: usize,
    ) -> usize {
        let mut vertex = WaveVertex {
            origin: point,
            start_time: time,
            velocity: DVec2::ZERO,
            edge_in: edges.0,
            edge_out: edges.1,
            prev: neighbours.0,
            next: neighbours.1,
            node,
            reflex: false,
            stalled: false,
            alive: true,
        };
        self.orient(&mut vertex);
        let idx = self.vertices.len();
        self.vertices.push(vertex);
        self.vertices[neighbours.0].next = idx;
        self.vertices[neighbours.1].prev = idx;
        idx
    }

    fn edge_event(&mut self, left: usize, right: usize, event: &Event) -> bool {
        let (a, b) = (self.vertices[left], self.vertices[right]);
        if !a.alive || !b.alive || a.next != right {
            return false;
        }
        let node = self.add_node(event.point, event.time);
        self.terminate(left, node);
        self.terminate(right, node);

        if a.prev == right {
            return true;
        }
        if a.prev == b.next {
            // Last triangle of this wavefront loop.
            self.terminate(a.prev, node);
            return true;
        }
        let w = self.spawn(
            event.point,
            event.time,
            (a.edge_in, b.edge_out),
            (a.prev, b.next),
            node,
        );
        self.schedule(w);
        true
    }

    fn split_event(&mut self, v: usize, e: usize, event: &Event) -> bool {
        let vertex = self.vertices[v];
        if !vertex.alive {
            return false;
        }
        let Some((y, x)) = self.active_piece(e, v, event) else {
            return false;
        };
        let node = self.add_node(event.point, event.time);
        self.terminate(v, node);

        let first = self.spawn(
            event.point,
            event.time,
            (vertex.edge_in, e),
            (vertex.prev, x),
            node,
        );
        let second = self.spawn(
            event.point,
            event.time,
            (e, vertex.edge_out),
            (y, vertex.next),
            node,
        );
        for w in [first, second] {
            self.settle_small_loop(w, node);
        }
        for w in [first, second] {
            if self.vertices[w].alive {
                self.schedule(w);
            }
        }
        true
    }

    /// The live stretch of edge `e` that contains the split point, as the
    /// pair of wavefront vertices bounding it.
    fn active_piece(&self, e: usize, v: usize, event: &Event) -> Option<(usize, usize)> {
        let direction = self.edges[e].direction;
        let slack = self.tolerance * 10.0;
        self.vertices
            .iter()
            .enumerate()
            .filter(|(y, vy)| vy.alive && vy.edge_out == e && *y != v)
            .find_map(|(y, vy)| {
                let x = vy.next;
                if x == v || self.vertices[x].edge_in != e {
                    return None;
                }
                let from = vy.position_at(event.time);
                let to = self.vertices[x].position_at(event.time);
                let span = (to - from).dot(direction);
                let along = (event.point - from).dot(direction);
                (along >= -slack && along <= span + slack).then_some((y, x))
            })
    }

    /// Loops of one or two vertices left behind by a split collapse at once.
    fn settle_small_loop(&mut self, w: usize, node: usize) {
        let vertex = self.vertices[w];
        if !vertex.alive {
            return;
        }
        if vertex.next == w {
            self.vertices[w].alive = false;
        } else if vertex.next == vertex.prev {
            self.terminate(w, node);
            self.terminate(vertex.next, node);
        }
    }

    fn schedule(&mut self, w: usize) {
        let (prev, next) = (self.vertices[w].prev, self.vertices[w].next);
        self.push_edge_event(prev, w);
        self.push_edge_event(w, next);
        self.push_split_events(w);
    }

    /// Wavefront loops still alive, as rings evaluated at `time`.
    fn rings_at(&self, time: f64) -> Vec<Vec<DVec2>> {
        let mut visited = vec![false; self.vertices.len()];
        let mut rings = Vec::new();
        for start in 0..self.vertices.len() {
            if visited[start] || !self.vertices[start].alive {
                continue;
            }
            let mut ring = Vec::new();
            let mut current = start;
            while !visited[current] {
                visited[current] = true;
                let p = self.vertices[current].position_at(time);
                if ring.last().map_or(true, |last: &DVec2| last.distance(p) > self.tolerance) {
                    ring.push(p);
                }
                current = self.vertices[current].next;
            }
            if ring.len() >= 3 {
                rings.push(ring);
            }
        }
        rings
    }

    /// Closes loops the event queue could not finish (stalled vertices on
    /// zero-width wavefronts). Their vertices are joined in order along the
    /// line they collapsed onto.
    fn collapse_leftovers(&mut self) {
        let mut visited = vec![false; self.vertices.len()];
        for start in 0..self.vertices.len() {
            if visited[start] || !self.vertices[start].alive {
                continue;
            }
            let mut members = Vec::new();
            let mut current = start;
            while !visited[current] {
                visited[current] = true;
                members.push(current);
                current = self.vertices[current].next;
            }
            let time = members
                .iter()
                .map(|&v| self.vertices[v].start_time)
                .fold(0.0, f64::max);
            warn!(
                "Collapsing {} unresolved wavefront vertices at t={:.3}",
                members.len(),
                time
            );

            let ends: Vec<(usize, DVec2)> = members
                .iter()
                .map(|&v| (v, self.vertices[v].position_at(time)))
                .collect();
            let (first, last) = ends
                .iter()
                .flat_map(|a| ends.iter().map(move |b| (a.1, b.1)))
                .max_by(|a, b| a.0.distance(a.1).total_cmp(&b.0.distance(b.1)))
                .unwrap_or((DVec2::ZERO, DVec2::ZERO));
            let axis = (last - first).normalize_or_zero();

            let mut chain: Vec<(f64, usize, usize)> = Vec::new();
            for &(v, p) in &ends {
                let node = self.add_node(p, time);
                self.terminate(v, node);
                chain.push(((p - first).dot(axis), node, v));
            }
            chain.sort_by(|a, b| a.0.total_cmp(&b.0));
            for pair in chain.windows(2) {
                let (a, b) = (self.vertices[pair[0].2], self.vertices[pair[1].2]);
                self.arcs.push((pair[0].1, pair[1].1, [a.edge_out, b.edge_in]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rect(w: f64, h: f64) -> Vec<DVec2> {
        vec![DVec2::ZERO, DVec2::new(w, 0.0), DVec2::new(w, h), DVec2::new(0.0, h)]
    }

    fn skeleton_nodes(skeleton: &StraightSkeleton) -> Vec<SkeletonNode> {
        skeleton
            .graph()
            .node_weights()
            .filter(|n| n.kind == NodeKind::Skeleton)
            .copied()
            .collect()
    }

    #[test]
    fn rectangle_has_single_ridge() {
        let skeleton = StraightSkeleton::build(&rect(20.0, 10.0), &[]).unwrap();
        let nodes = skeleton_nodes(&skeleton);
        assert_eq!(nodes.len(), 2);
        for node in &nodes {
            assert_relative_eq!(node.time, 5.0, epsilon = 1e-9);
            assert_relative_eq!(node.position.y, 5.0, epsilon = 1e-9);
        }
        let ridge = skeleton.interior_segments();
        assert_eq!(ridge.len(), 1);
        assert_relative_eq!(ridge[0].0.distance(ridge[0].1), 10.0, epsilon = 1e-9);
        assert_eq!(skeleton.faces().len(), 4);
    }

    #[test]
    fn dominant_angle_follows_long_axis() {
        let skeleton = StraightSkeleton::build(&rect(20.0, 10.0), &[]).unwrap();
        let angle = skeleton.dominant_angle().unwrap();
        assert_relative_eq!(angle.sin(), 0.0, epsilon = 1e-9);

        let tall = StraightSkeleton::build(&rect(10.0, 30.0), &[]).unwrap();
        let angle = tall.dominant_angle().unwrap();
        assert_relative_eq!(angle.cos(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn square_collapses_to_one_node() {
        let skeleton = StraightSkeleton::build(&rect(10.0, 10.0), &[]).unwrap();
        let nodes = skeleton_nodes(&skeleton);
        assert_eq!(nodes.len(), 1);
        assert_relative_eq!(nodes[0].position.x, 5.0, epsilon = 1e-9);
        assert!(skeleton.interior_segments().is_empty());
        assert!(skeleton.gable_adjustments().is_empty());
        assert_eq!(skeleton.faces().len(), 4);
    }

    #[test]
    fn clockwise_input_is_reoriented() {
        let mut cw = rect(20.0, 10.0);
        cw.reverse();
        let skeleton = StraightSkeleton::build(&cw, &[]).unwrap();
        let ring = &skeleton.contour_rings()[0];
        assert!(signed_area(ring) > 0.0);
        assert_eq!(skeleton_nodes(&skeleton).len(), 2);
    }

    #[test]
    fn convex_heights_are_bounded_by_inradius() {
        let radius = 10.0;
        let hexagon: Vec<DVec2> = (0..6)
            .map(|i| {
                let a = std::f64::consts::TAU * i as f64 / 6.0;
                DVec2::new(a.cos(), a.sin()) * radius
            })
            .collect();
        let inradius = radius * (std::f64::consts::PI / 6.0).cos();
        let skeleton = StraightSkeleton::build(&hexagon, &[]).unwrap();
        for node in skeleton_nodes(&skeleton) {
            assert!(node.time > 0.0);
            assert!(node.time <= inradius + 1e-9);
        }
        assert_relative_eq!(skeleton.max_height(), inradius, epsilon = 1e-6);
    }

    #[test]
    fn l_shape_ridges_meet_at_the_elbow() {
        let l = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(40.0, 0.0),
            DVec2::new(40.0, 10.0),
            DVec2::new(10.0, 10.0),
            DVec2::new(10.0, 40.0),
            DVec2::new(0.0, 40.0),
        ];
        let skeleton = StraightSkeleton::build(&l, &[]).unwrap();
        let total: f64 = skeleton
            .interior_segments()
            .iter()
            .map(|(a, b)| a.distance(*b))
            .sum();
        assert_relative_eq!(total, 60.0, epsilon = 1e-6);
        assert!(skeleton
            .graph()
            .node_weights()
            .any(|n| n.position.distance(DVec2::new(5.0, 5.0)) < 1e-6));
        assert_eq!(skeleton.faces().len(), 6);
    }

    #[test]
    fn rectangle_ends_become_gables() {
        let skeleton = StraightSkeleton::build(&rect(20.0, 10.0), &[]).unwrap();
        let adjustments = skeleton.gable_adjustments();
        assert_eq!(adjustments.len(), 2);
        let mut midpoints: Vec<DVec2> = adjustments.iter().map(|a| a.midpoint).collect();
        midpoints.sort_by(|a, b| a.x.total_cmp(&b.x));
        assert_relative_eq!(midpoints[0].x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(midpoints[0].y, 5.0, epsilon = 1e-9);
        assert_relative_eq!(midpoints[1].x, 20.0, epsilon = 1e-9);
    }

    #[test]
    fn offset_shrinks_rectangle() {
        let pieces = offset_polygon(&rect(20.0, 10.0), &[], 2.0).unwrap();
        assert_eq!(pieces.len(), 1);
        assert_relative_eq!(signed_area(&pieces[0].0), 16.0 * 6.0, epsilon = 1e-9);
    }

    #[test]
    fn offset_splits_a_dumbbell() {
        // Two 20x20 rooms joined by a 4-wide corridor
        let dumbbell = vec![
            DVec2::new(0.0, 0.0),
            DVec2::new(20.0, 0.0),
            DVec2::new(20.0, 8.0),
            DVec2::new(30.0, 8.0),
            DVec2::new(30.0, 0.0),
            DVec2::new(50.0, 0.0),
            DVec2::new(50.0, 20.0),
            DVec2::new(30.0, 20.0),
            DVec2::new(30.0, 12.0),
            DVec2::new(20.0, 12.0),
            DVec2::new(20.0, 20.0),
            DVec2::new(0.0, 20.0),
        ];
        let pieces = offset_polygon(&dumbbell, &[], 3.0).unwrap();
        assert_eq!(pieces.len(), 2);
        for (ring, _) in &pieces {
            assert_relative_eq!(signed_area(ring), 14.0 * 14.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn offset_keeps_holes_with_their_outline() {
        let hole = vec![
            DVec2::new(20.0, 20.0),
            DVec2::new(30.0, 20.0),
            DVec2::new(30.0, 30.0),
            DVec2::new(20.0, 30.0),
        ];
        let pieces = offset_polygon(&rect(60.0, 50.0), &[hole], 1.0).unwrap();
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].1.len(), 1);
        assert_relative_eq!(signed_area(&pieces[0].1[0]).abs(), 144.0, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_outline_is_rejected() {
        let line = vec![DVec2::ZERO, DVec2::X, DVec2::new(2.0, 0.0)];
        assert!(StraightSkeleton::build(&line, &[]).is_err());
    }
}
