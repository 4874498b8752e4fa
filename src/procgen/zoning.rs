//! Zoning configuration for block subdivision and lot development.
//!
//! A [`ZoningConfig`] bundles everything the subdivider and the developers
//! read: lot sizing, setbacks, roof parameters and which developers may
//! build. Presets per [`ZoneType`] give typical settings.

use bevy::prelude::*;
use rand::Rng;

use super::building_factory::Developer;
use super::buildings::{RoofConfig, RoofStyle};
use super::parcels::SubdivisionConfig;

/// Zone types for land use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ZoneType {
    Residential,
    Commercial,
    Industrial,
    Agricultural,
    Park,
}

impl ZoneType {
    pub fn all() -> &'static [ZoneType] {
        &[
            ZoneType::Residential,
            ZoneType::Commercial,
            ZoneType::Industrial,
            ZoneType::Agricultural,
            ZoneType::Park,
        ]
    }
}

#[derive(Resource, Clone, Debug, PartialEq)]
pub struct ZoningConfig {
    pub subdivision: SubdivisionConfig,
    pub roof: RoofConfig,
    /// Largest lot a single-building developer will take.
    pub max_lot_area: f64,
    /// Inset from lot edges before anything is placed.
    pub setback: f64,
    pub roof_style: RoofStyle,
    pub min_floors: u32,
    pub max_floors: u32,
    /// Tried in order; the first developer valid for a lot builds on it.
    pub developers: Vec<Developer>,
    /// Seed to keep development deterministic between runs.
    pub seed: u64,
}

impl Default for ZoningConfig {
    fn default() -> Self {
        Self::for_zone(ZoneType::Residential)
    }
}

impl ZoningConfig {
    pub fn for_zone(zone: ZoneType) -> Self {
        let base = Self {
            subdivision: SubdivisionConfig::default(),
            roof: RoofConfig::default(),
            max_lot_area: 1500.0,
            setback: 3.0,
            roof_style: RoofStyle::Gabled,
            min_floors: 1,
            max_floors: 2,
            developers: Vec::new(),
            seed: 42,
        };
        match zone {
            ZoneType::Residential => Self {
                developers: vec![Developer::SingleFamilyHome, Developer::Park { tree_spacing: 6.0 }],
                ..base
            },
            ZoneType::Commercial => Self {
                subdivision: SubdivisionConfig {
                    lot_width: 40.0,
                    ..SubdivisionConfig::default()
                },
                setback: 1.5,
                roof_style: RoofStyle::Flat,
                min_floors: 3,
                max_floors: 8,
                developers: vec![Developer::SquareGrid { spacing: 20.0 }, Developer::FullLot],
                ..base
            },
            ZoneType::Industrial => Self {
                subdivision: SubdivisionConfig {
                    lot_width: 60.0,
                    ..SubdivisionConfig::default()
                },
                max_lot_area: 6000.0,
                roof_style: RoofStyle::Sawtooth,
                max_floors: 1,
                developers: vec![Developer::Warehouse, Developer::FullLot],
                ..base
            },
            ZoneType::Agricultural => Self {
                subdivision: SubdivisionConfig {
                    division_enabled: false,
                    ..SubdivisionConfig::default()
                },
                max_lot_area: 800.0,
                developers: vec![
                    Developer::Group(vec![
                        Developer::FarmOrchard {
                            row_spacing: 6.0,
                            tree_spacing: 5.0,
                        },
                        Developer::FarmField { row_spacing: 3.0 },
                    ]),
                    Developer::SingleFamilyHome,
                ],
                ..base
            },
            ZoneType::Park => Self {
                developers: vec![Developer::Park { tree_spacing: 8.0 }],
                ..base
            },
        }
    }

    /// Floor count drawn uniformly from the configured range.
    pub fn floors<R: Rng>(&self, rng: &mut R) -> u32 {
        rng.gen_range(self.min_floors..=self.max_floors.max(self.min_floors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn every_zone_has_developers() {
        for &zone in ZoneType::all() {
            let config = ZoningConfig::for_zone(zone);
            assert!(!config.developers.is_empty(), "{:?}", zone);
            assert!(config.min_floors <= config.max_floors);
        }
    }

    #[test]
    fn floors_stay_in_range() {
        let config = ZoningConfig::for_zone(ZoneType::Commercial);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..50 {
            let floors = config.floors(&mut rng);
            assert!((3..=8).contains(&floors));
        }
    }

    #[test]
    fn inverted_floor_range_collapses_to_minimum() {
        let config = ZoningConfig {
            min_floors: 4,
            max_floors: 2,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(config.floors(&mut rng), 4);
    }
}
