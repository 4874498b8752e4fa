//! Parcel subdivision using the straight skeleton and parallel dividers.
//!
//! Converts city blocks into buildable lots. The block's skeleton supplies
//! both a first set of cuts (the ridge lines, stretched out to the middle of
//! the short sides) and the orientation of the lot rows. Divider lines are
//! then laid across the ridge every `lot_width`, clipped to the block, and
//! everything is resolved in one exact arrangement whose shape faces become
//! the lots.

use bevy::log::{debug, warn};
use bevy::math::DVec2;

use super::arrangement::{compute_intersection_points, Arrangement, FaceRole};
use super::dividers::{compute_dividers, divider_pairs};
use super::lot_geometry::Shape;
use super::skeleton::StraightSkeleton;
use crate::geom::exact::{parity_inside, ExactSegment};
use crate::geom::inexact::dedup_ring;
use crate::geom::segment_to_exact;

/// Configuration for subdivision.
#[derive(Clone, Debug, PartialEq)]
pub struct SubdivisionConfig {
    /// Target distance between dividers.
    pub lot_width: f64,
    /// Blocks smaller than this stay whole.
    pub min_block_area: f64,
    /// Faces smaller than this are dropped.
    pub min_lot_area: f64,
    pub division_enabled: bool,
}

impl Default for SubdivisionConfig {
    fn default() -> Self {
        Self {
            lot_width: 25.0,       // 25 m frontage
            min_block_area: 400.0, // 400 m²
            min_lot_area: 50.0,    // 50 m²
            division_enabled: true,
        }
    }
}

/// A buildable lot (subdivision result).
#[derive(Clone, Debug, PartialEq)]
pub struct Lot {
    pub shape: Shape,
    /// Area net of holes.
    pub area: f64,
}

impl Lot {
    pub fn new(shape: Shape) -> Self {
        let area = shape.net_area();
        Self { shape, area }
    }
}

/// Lots plus the arrangement they were read from. The arrangement is only
/// there for visual debugging and is `None` when the block was kept whole.
#[derive(Clone, Debug, Default)]
pub struct Subdivision {
    pub lots: Vec<Lot>,
    pub arrangement: Option<Arrangement>,
}

/// Subdivide a block into lots.
pub fn subdivide_block(block: &Shape, config: &SubdivisionConfig) -> Vec<Lot> {
    subdivide_block_with_diagnostics(block, config).lots
}

/// Subdivide a block and hand back the resolved arrangement as well.
///
/// Blocks with fewer than four distinct vertices, below `min_block_area`, or with
/// division disabled come back as a single lot. So does a block whose
/// skeleton cannot be built.
pub fn subdivide_block_with_diagnostics(block: &Shape, config: &SubdivisionConfig) -> Subdivision {
    if !config.division_enabled
        || dedup_ring(block.outline(), 0.0).len() < 4
        || block.area() < config.min_block_area
    {
        return whole_block(block);
    }

    let skeleton = match StraightSkeleton::build(block.outline(), block.holes()) {
        Ok(skeleton) => skeleton,
        Err(err) => {
            warn!("Keeping block whole, skeleton failed: {}", err);
            return whole_block(block);
        }
    };

    let outline = to_exact_segments(skeleton.contour_segments());
    let ridges = to_exact_segments(
        skeleton
            .interior_segments()
            .into_iter()
            .chain(skeleton.adjusted_segments()),
    );
    let angle = skeleton
        .dominant_angle()
        .unwrap_or_else(|| longest_edge_angle(block.outline()));
    let candidates = compute_dividers(block.outline(), angle, config.lot_width);
    let dividers = clip_dividers(&candidates, &outline, &ridges);

    let mut arrangement = Arrangement::new();
    arrangement.insert_exact(&outline);
    arrangement.insert(&ridges);
    arrangement.insert(&dividers);

    let lots: Vec<Lot> = arrangement
        .bounded_faces()
        .filter(|&face| arrangement.face(face).role == FaceRole::Shape)
        .map(|face| {
            Lot::new(Shape::with_holes(
                arrangement.extract_face_outline(face),
                arrangement.face_hole_outlines(face),
            ))
        })
        .filter(|lot| lot.area >= config.min_lot_area)
        .collect();

    debug!(
        "Subdivided block of {:.0} m²: {} ridge cuts, {} divider pieces, {} faces, {} lots",
        block.net_area(),
        ridges.len(),
        dividers.len(),
        arrangement.faces().len(),
        lots.len()
    );

    Subdivision {
        lots,
        arrangement: Some(arrangement),
    }
}

fn whole_block(block: &Shape) -> Subdivision {
    Subdivision {
        lots: vec![Lot::new(block.clone())],
        arrangement: None,
    }
}

fn to_exact_segments(segments: impl IntoIterator<Item = (DVec2, DVec2)>) -> Vec<ExactSegment> {
    segments
        .into_iter()
        .map(|(a, b)| segment_to_exact(a, b))
        .filter(|s| !s.is_degenerate())
        .collect()
}

/// Clips every divider candidate on its own against the outline and ridge
/// cuts. Each candidate is appended to the working set, its crossings are
/// read off in order, and it is removed again, so dividers never cut each
/// other here. Pieces between consecutive crossings that lie inside the
/// outline are kept.
fn clip_dividers(
    candidates: &[DVec2],
    outline: &[ExactSegment],
    ridges: &[ExactSegment],
) -> Vec<ExactSegment> {
    let mut working: Vec<ExactSegment> = outline.iter().chain(ridges).cloned().collect();
    let mut pieces = Vec::new();
    for (a, b) in divider_pairs(candidates) {
        let candidate = segment_to_exact(a, b);
        if candidate.is_degenerate() {
            continue;
        }
        working.push(candidate);
        let crossings = compute_intersection_points(&working);
        working.pop();

        for pair in crossings.windows(2) {
            let mid = pair[0].midpoint(&pair[1]);
            if parity_inside(&mid, outline.iter().map(|s| (&s.source, &s.target))) {
                pieces.push(ExactSegment::new(pair[0].clone(), pair[1].clone()));
            }
        }
    }
    pieces
}

/// Direction of the longest outline edge, in radians.
pub(crate) fn longest_edge_angle(outline: &[DVec2]) -> f64 {
    let n = outline.len();
    (0..n)
        .map(|i| outline[(i + 1) % n] - outline[i])
        .max_by(|a, b| a.length_squared().total_cmp(&b.length_squared()))
        .map_or(0.0, |d| d.y.atan2(d.x))
}
