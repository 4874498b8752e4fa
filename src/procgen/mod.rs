//! Procedural generation systems.
//!
//! - Straight skeletons and wavefront offsets
//! - Exact arrangements for block subdivision
//! - Roof massing for building footprints
//! - Lot developers for parks, homes, warehouses and farms

use bevy::prelude::*;

pub mod arrangement;
pub mod block_extractor;
pub mod building_factory;
pub mod buildings;
pub mod dividers;
pub mod lot_geometry;
pub mod parcels;
pub mod skeleton;
pub mod zoning;

pub struct ProcgenPlugin;

impl Plugin for ProcgenPlugin {
    fn build(&self, app: &mut App) {
        // Blocks must be divided before lots can be developed.
        app.add_plugins(block_extractor::BlockSubdivisionPlugin)
            .add_plugins(building_factory::LotDevelopmentPlugin);
    }
}
