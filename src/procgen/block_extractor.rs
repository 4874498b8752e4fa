//! City block subdivision into buildable lots.
//!
//! Blocks are handed in through [`CityBlocks`]; the plugin subdivides every
//! pending block once with the zoning's subdivision settings and publishes
//! the result in [`CityLots`].

use bevy::prelude::*;

use super::arrangement::Arrangement;
use super::lot_geometry::Shape;
use super::parcels::{subdivide_block_with_diagnostics, Lot};
use super::zoning::ZoningConfig;

pub struct BlockSubdivisionPlugin;

impl Plugin for BlockSubdivisionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CityBlocks>()
            .init_resource::<CityLots>()
            .init_resource::<LastArrangement>()
            .init_resource::<ZoningConfig>()
            .add_systems(Update, subdivide_blocks.run_if(should_subdivide_blocks));
    }
}

fn should_subdivide_blocks(blocks: Res<CityBlocks>) -> bool {
    !blocks.blocks.is_empty() && !blocks.subdivided
}

/// City blocks waiting to be split into lots.
#[derive(Resource, Default)]
pub struct CityBlocks {
    pub blocks: Vec<Shape>,
    pub subdivided: bool,
}

impl CityBlocks {
    /// Replaces the blocks and schedules them for subdivision.
    pub fn submit(&mut self, blocks: Vec<Shape>) {
        self.blocks = blocks;
        self.subdivided = false;
    }
}

/// Resource containing buildable lots.
#[derive(Resource, Default)]
pub struct CityLots {
    pub lots: Vec<Lot>,
}

/// Arrangement of the last block that was actually divided. Kept for
/// visual debugging only; its layout is not a stable interface.
#[derive(Resource, Default)]
pub struct LastArrangement(pub Option<Arrangement>);

fn subdivide_blocks(
    zoning: Res<ZoningConfig>,
    mut blocks: ResMut<CityBlocks>,
    mut lots: ResMut<CityLots>,
    mut last: ResMut<LastArrangement>,
) {
    info!("Subdividing {} blocks...", blocks.blocks.len());

    let mut all_lots = Vec::new();
    for block in &blocks.blocks {
        let subdivision = subdivide_block_with_diagnostics(block, &zoning.subdivision);
        all_lots.extend(subdivision.lots);
        if subdivision.arrangement.is_some() {
            last.0 = subdivision.arrangement;
        }
    }

    info!("Found {} buildable lots", all_lots.len());

    blocks.subdivided = true;
    lots.lots = all_lots;
}
