//! Lot developers that fill subdivided lots with buildings, trees and crops.
//!
//! A [`Developer`] is a closed set of strategies. Each one decides whether a
//! lot suits it ([`Developer::is_valid_for`]) and turns the lot into
//! [`Placement`]s ([`Developer::build_in`]). The plugin runs the zoning's
//! developers over every lot in [`CityLots`] with a seeded generator and
//! builds a mesh for every placed building.

use bevy::math::DVec2;
use bevy::prelude::*;
use noise::{NoiseFn, Perlin};
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::arrangement::{Arrangement, FaceRole};
use super::block_extractor::CityLots;
use super::buildings::{build_building_mesh_with_rng, BuildingMesh, RoofStyle};
use super::dividers::{compute_dividers, divider_pairs};
use super::lot_geometry::Shape;
use super::parcels::{longest_edge_angle, Lot};
use super::zoning::ZoningConfig;
use crate::error::{GeometryError, GeometryResult};
use crate::geom::inexact::clip_segment;
use crate::geom::{ring_to_exact_segments, segment_to_exact};

/// Smallest lot a warehouse is put on.
const WAREHOUSE_MIN_AREA: f64 = 600.0;
const HOME_MAX_FLOORS: u32 = 2;
/// Scale for the park density noise (smaller = larger clumps).
const PARK_NOISE_SCALE: f64 = 0.08;
/// Trees are planted where the noise exceeds this.
const PARK_DENSITY_CUTOFF: f64 = -0.2;

pub struct LotDevelopmentPlugin;

impl Plugin for LotDevelopmentPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ZoningConfig>()
            .init_resource::<CityBuildings>()
            .add_systems(Update, develop_lots.run_if(should_develop_lots));
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Developer {
    /// Trees on a jittered grid, thinned by a noise mask.
    Park { tree_spacing: f64 },
    /// One low building on the setback core of a small lot.
    SingleFamilyHome,
    /// Sawtooth-roofed sheds covering the setback core of a large lot.
    Warehouse,
    /// One building covering the whole lot.
    FullLot,
    /// Picks uniformly among the members valid for the lot.
    Group(Vec<Developer>),
    /// Square cells of `spacing`, one building per cell.
    SquareGrid { spacing: f64 },
    /// Rows parallel to the longest lot edge, planted with trees.
    FarmOrchard { row_spacing: f64, tree_spacing: f64 },
    /// Rows parallel to the longest lot edge.
    FarmField { row_spacing: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Placement {
    Building {
        footprint: Shape,
        floors: u32,
        roof: RoofStyle,
    },
    Tree {
        position: DVec2,
    },
    CropRow {
        from: DVec2,
        to: DVec2,
    },
}

impl Developer {
    pub fn is_valid_for(&self, lot: &Lot, zoning: &ZoningConfig) -> bool {
        if lot.area <= 0.0 {
            return false;
        }
        match self {
            Developer::Park { tree_spacing } => *tree_spacing > 0.0,
            Developer::FullLot => true,
            Developer::SingleFamilyHome => {
                lot.area <= zoning.max_lot_area && !lot.shape.contract(zoning.setback).is_empty()
            }
            Developer::Warehouse => {
                lot.area >= WAREHOUSE_MIN_AREA && !lot.shape.contract(zoning.setback).is_empty()
            }
            Developer::Group(members) => members.iter().any(|d| d.is_valid_for(lot, zoning)),
            Developer::SquareGrid { spacing } => {
                let (min, max) = lot.shape.bounds();
                *spacing > 0.0 && (max - min).min_element() >= *spacing
            }
            Developer::FarmOrchard { row_spacing, .. } | Developer::FarmField { row_spacing } => {
                *row_spacing > 0.0 && lot.area >= zoning.max_lot_area
            }
        }
    }

    pub fn build_in<R: Rng>(
        &self,
        lot: &Lot,
        zoning: &ZoningConfig,
        rng: &mut R,
    ) -> GeometryResult<Vec<Placement>> {
        match self {
            Developer::Park { tree_spacing } => Ok(plant_park(lot, *tree_spacing, rng)),
            Developer::SingleFamilyHome => {
                let footprint = lot
                    .shape
                    .contract(zoning.setback)
                    .into_iter()
                    .max_by(|a, b| a.net_area().total_cmp(&b.net_area()))
                    .ok_or(GeometryError::ZeroArea)?;
                Ok(vec![Placement::Building {
                    footprint,
                    floors: rng.gen_range(1..=HOME_MAX_FLOORS),
                    roof: zoning.roof_style,
                }])
            }
            Developer::Warehouse => Ok(lot
                .shape
                .contract(zoning.setback)
                .into_iter()
                .map(|footprint| Placement::Building {
                    footprint,
                    floors: 1,
                    roof: RoofStyle::Sawtooth,
                })
                .collect()),
            Developer::FullLot => Ok(vec![Placement::Building {
                footprint: lot.shape.clone(),
                floors: zoning.floors(rng),
                roof: zoning.roof_style,
            }]),
            Developer::Group(members) => {
                let valid: Vec<&Developer> = members
                    .iter()
                    .filter(|d| d.is_valid_for(lot, zoning))
                    .collect();
                if valid.is_empty() {
                    return Ok(Vec::new());
                }
                let pick = valid[rng.gen_range(0..valid.len())];
                pick.build_in(lot, zoning, rng)
            }
            Developer::SquareGrid { spacing } => Ok(grid_buildings(lot, *spacing, zoning, rng)),
            Developer::FarmOrchard {
                row_spacing,
                tree_spacing,
            } => Ok(crop_rows(lot, *row_spacing, zoning.setback)
                .into_iter()
                .flat_map(|(from, to)| trees_along(from, to, *tree_spacing))
                .map(|position| Placement::Tree { position })
                .collect()),
            Developer::FarmField { row_spacing } => Ok(crop_rows(lot, *row_spacing, zoning.setback)
                .into_iter()
                .map(|(from, to)| Placement::CropRow { from, to })
                .collect()),
        }
    }
}

fn plant_park<R: Rng>(lot: &Lot, spacing: f64, rng: &mut R) -> Vec<Placement> {
    if spacing <= 0.0 {
        return Vec::new();
    }
    let perlin = Perlin::new(rng.gen());
    let (min, max) = lot.shape.bounds();
    let jitter = spacing * 0.25;

    let mut trees = Vec::new();
    let mut y = min.y + spacing / 2.0;
    while y < max.y {
        let mut x = min.x + spacing / 2.0;
        while x < max.x {
            let p = DVec2::new(
                x + rng.gen_range(-jitter..jitter),
                y + rng.gen_range(-jitter..jitter),
            );
            let density = perlin.get([p.x * PARK_NOISE_SCALE, p.y * PARK_NOISE_SCALE]);
            if density > PARK_DENSITY_CUTOFF && lot.shape.contains_excluding_holes(p) {
                trees.push(Placement::Tree { position: p });
            }
            x += spacing;
        }
        y += spacing;
    }
    trees
}

/// Cuts the lot into a square grid with an arrangement and puts one
/// building on the setback core of every cell.
fn grid_buildings<R: Rng>(
    lot: &Lot,
    spacing: f64,
    zoning: &ZoningConfig,
    rng: &mut R,
) -> Vec<Placement> {
    let mut arrangement = Arrangement::new();
    let outline: Vec<_> = lot.shape.rings().flat_map(ring_to_exact_segments).collect();
    arrangement.insert_exact(&outline);

    let cuts: Vec<_> = [0.0, std::f64::consts::FRAC_PI_2]
        .into_iter()
        .flat_map(|angle| {
            let points = compute_dividers(lot.shape.outline(), angle, spacing);
            divider_pairs(&points)
                .map(|(a, b)| segment_to_exact(a, b))
                .collect::<Vec<_>>()
        })
        .collect();
    arrangement.insert(&cuts);

    let mut placements = Vec::new();
    for face in arrangement.bounded_faces() {
        if arrangement.face(face).role != FaceRole::Shape {
            continue;
        }
        let cell = Shape::with_holes(
            arrangement.extract_face_outline(face),
            arrangement.face_hole_outlines(face),
        );
        for footprint in cell.contract(zoning.setback) {
            placements.push(Placement::Building {
                footprint,
                floors: zoning.floors(rng),
                roof: zoning.roof_style,
            });
        }
    }
    placements
}

/// Row segments parallel to the lot's longest edge, clipped to its setback
/// core.
fn crop_rows(lot: &Lot, spacing: f64, setback: f64) -> Vec<(DVec2, DVec2)> {
    let angle = longest_edge_angle(lot.shape.outline()) + std::f64::consts::FRAC_PI_2;
    let mut rows = Vec::new();
    for core in lot.shape.contract(setback) {
        let rings: Vec<&[DVec2]> = core.rings().collect();
        let points = compute_dividers(core.outline(), angle, spacing);
        for (a, b) in divider_pairs(&points) {
            rows.extend(clip_segment(a, b, &rings));
        }
    }
    rows
}

fn trees_along(from: DVec2, to: DVec2, spacing: f64) -> Vec<DVec2> {
    if spacing <= 0.0 {
        return Vec::new();
    }
    let count = (from.distance(to) / spacing).floor().max(1.0) as usize;
    (0..count)
        .map(|k| from.lerp(to, (k as f64 + 0.5) / count as f64))
        .collect()
}

/// Developed lots and meshes for every building placed on them.
#[derive(Resource, Default)]
pub struct CityBuildings {
    pub developed: Vec<DevelopedLot>,
    pub meshes: Vec<BuildingMesh>,
    pub generated: bool,
}

#[derive(Clone, Debug)]
pub struct DevelopedLot {
    pub lot_index: usize,
    pub placements: Vec<Placement>,
}

fn should_develop_lots(lots: Res<CityLots>, buildings: Res<CityBuildings>) -> bool {
    !lots.lots.is_empty() && !buildings.generated
}

fn develop_lots(
    lots: Res<CityLots>,
    zoning: Res<ZoningConfig>,
    mut buildings: ResMut<CityBuildings>,
) {
    info!("Developing {} lots", lots.lots.len());

    let mut rng = StdRng::seed_from_u64(zoning.seed);
    let mut developed = Vec::new();
    let mut meshes = Vec::new();

    for (lot_index, lot) in lots.lots.iter().enumerate() {
        let Some(developer) = zoning
            .developers
            .iter()
            .find(|d| d.is_valid_for(lot, &zoning))
        else {
            continue;
        };
        match developer.build_in(lot, &zoning, &mut rng) {
            Ok(placements) => {
                for placement in &placements {
                    if let Placement::Building {
                        footprint,
                        floors,
                        roof,
                    } = placement
                    {
                        meshes.push(build_building_mesh_with_rng(
                            footprint,
                            *floors,
                            *roof,
                            &zoning.roof,
                            &mut rng,
                        ));
                    }
                }
                developed.push(DevelopedLot {
                    lot_index,
                    placements,
                });
            }
            Err(err) => warn!("Lot {} left empty: {}", lot_index, err),
        }
    }

    info!(
        "Developed {} lots with {} buildings",
        developed.len(),
        meshes.len()
    );
    buildings.developed = developed;
    buildings.meshes = meshes;
    buildings.generated = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procgen::block_extractor::{BlockSubdivisionPlugin, CityBlocks};
    use approx::assert_relative_eq;

    fn lot(w: f64, h: f64) -> Lot {
        Lot::new(Shape::new(vec![
            DVec2::ZERO,
            DVec2::new(w, 0.0),
            DVec2::new(w, h),
            DVec2::new(0.0, h),
        ]))
    }

    fn buildings(placements: &[Placement]) -> Vec<&Shape> {
        placements
            .iter()
            .filter_map(|p| match p {
                Placement::Building { footprint, .. } => Some(footprint),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn home_sits_inside_setback() {
        let zoning = ZoningConfig::default();
        let lot = lot(30.0, 40.0);
        let mut rng = StdRng::seed_from_u64(1);

        assert!(Developer::SingleFamilyHome.is_valid_for(&lot, &zoning));
        let placements = Developer::SingleFamilyHome
            .build_in(&lot, &zoning, &mut rng)
            .unwrap();
        let homes = buildings(&placements);
        assert_eq!(homes.len(), 1);
        assert_relative_eq!(homes[0].area(), 24.0 * 34.0, epsilon = 1e-6);
        match &placements[0] {
            Placement::Building { floors, roof, .. } => {
                assert!((1..=HOME_MAX_FLOORS).contains(floors));
                assert_eq!(*roof, zoning.roof_style);
            }
            other => panic!("unexpected placement {:?}", other),
        }
    }

    #[test]
    fn validity_follows_lot_size() {
        let zoning = ZoningConfig::default();
        let small = lot(20.0, 10.0);
        let huge = lot(100.0, 60.0);
        let field = Developer::FarmField { row_spacing: 3.0 };

        assert!(!Developer::Warehouse.is_valid_for(&small, &zoning));
        assert!(Developer::Warehouse.is_valid_for(&huge, &zoning));
        assert!(!Developer::SingleFamilyHome.is_valid_for(&huge, &zoning));
        assert!(!field.is_valid_for(&small, &zoning));
        assert!(field.is_valid_for(&huge, &zoning));
        assert!(Developer::Group(vec![Developer::Warehouse, field]).is_valid_for(&huge, &zoning));
        assert!(!Developer::SquareGrid { spacing: 15.0 }.is_valid_for(&small, &zoning));
    }

    #[test]
    fn group_picks_a_valid_member() {
        let zoning = ZoningConfig::default();
        let group = Developer::Group(vec![Developer::Warehouse, Developer::SingleFamilyHome]);
        let small = lot(20.0, 10.0);
        let mut rng = StdRng::seed_from_u64(9);
        let placements = group.build_in(&small, &zoning, &mut rng).unwrap();
        let homes = buildings(&placements);
        assert_eq!(homes.len(), 1);
        assert_relative_eq!(homes[0].area(), 14.0 * 4.0, epsilon = 1e-6);
    }

    #[test]
    fn square_grid_builds_one_per_cell() {
        let zoning = ZoningConfig {
            setback: 1.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(2);
        let placements = Developer::SquareGrid { spacing: 20.0 }
            .build_in(&lot(40.0, 40.0), &zoning, &mut rng)
            .unwrap();
        let cells = buildings(&placements);
        assert_eq!(cells.len(), 4);
        for cell in cells {
            assert_relative_eq!(cell.area(), 18.0 * 18.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn full_lot_covers_the_lot() {
        let zoning = ZoningConfig::default();
        let lot = lot(20.0, 10.0);
        let mut rng = StdRng::seed_from_u64(4);
        let placements = Developer::FullLot.build_in(&lot, &zoning, &mut rng).unwrap();
        assert_eq!(buildings(&placements), vec![&lot.shape]);
    }

    #[test]
    fn field_rows_run_along_the_long_side() {
        let zoning = ZoningConfig::default();
        let mut rng = StdRng::seed_from_u64(0);
        let placements = Developer::FarmField { row_spacing: 10.0 }
            .build_in(&lot(100.0, 60.0), &zoning, &mut rng)
            .unwrap();
        assert_eq!(placements.len(), 5);
        for placement in &placements {
            let Placement::CropRow { from, to } = placement else {
                panic!("expected crop rows");
            };
            assert!((to.y - from.y).abs() < 1e-6);
            assert_relative_eq!(from.distance(*to), 94.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn orchard_plants_along_rows() {
        let zoning = ZoningConfig::default();
        let mut rng = StdRng::seed_from_u64(0);
        let placements = Developer::FarmOrchard {
            row_spacing: 10.0,
            tree_spacing: 10.0,
        }
        .build_in(&lot(100.0, 60.0), &zoning, &mut rng)
        .unwrap();
        // Five rows of 94 m, nine trees each.
        assert_eq!(placements.len(), 45);
        assert!(placements
            .iter()
            .all(|p| matches!(p, Placement::Tree { .. })));
    }

    #[test]
    fn park_is_seeded_and_inside() {
        let zoning = ZoningConfig::default();
        let park = Developer::Park { tree_spacing: 5.0 };
        let lot = Lot::new(Shape::with_holes(
            lot(60.0, 60.0).shape.outline().to_vec(),
            vec![vec![
                DVec2::new(20.0, 20.0),
                DVec2::new(40.0, 20.0),
                DVec2::new(40.0, 40.0),
                DVec2::new(20.0, 40.0),
            ]],
        ));

        let plant = |seed| {
            park.build_in(&lot, &zoning, &mut StdRng::seed_from_u64(seed))
                .unwrap()
        };
        let trees = plant(8);
        assert_eq!(trees, plant(8));
        assert!(!trees.is_empty());
        for tree in &trees {
            let Placement::Tree { position } = tree else {
                panic!("parks only plant trees");
            };
            assert!(lot.shape.contains_excluding_holes(*position));
        }
    }

    #[test]
    fn plugin_develops_subdivided_blocks() {
        let mut app = App::new();
        app.add_plugins((BlockSubdivisionPlugin, LotDevelopmentPlugin));
        app.world_mut()
            .resource_mut::<CityBlocks>()
            .submit(vec![Shape::new(vec![
                DVec2::ZERO,
                DVec2::new(100.0, 0.0),
                DVec2::new(100.0, 30.0),
                DVec2::new(0.0, 30.0),
            ])]);

        app.update();
        app.update();

        let buildings = app.world().resource::<CityBuildings>();
        assert!(buildings.generated);
        assert!(!buildings.developed.is_empty());
        assert!(!buildings.meshes.is_empty());
        assert!(buildings.meshes.iter().all(|m| !m.walls.is_empty()));
    }
}
