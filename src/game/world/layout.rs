//! Zone-specific block layouts

use std::f32::consts::PI;

use super::{
    block_center, Bench, BlockKey, BuildingSpec, Park, ParkKind, Sidewalk, WorldBuilder, ZoneKind,
    BLOCKS_X, BLOCKS_Z, CELL, PLOT, ROAD,
};

const PAVEMENT_WIDTH: f32 = 3.2;
const BIKE_LANE_WIDTH: f32 = 2.1;

/// Basket court including its apron
pub const BASKET_COURT: (f32, f32) = (28.0 + 2.6 * 2.0, 15.0 + 2.6 * 2.0);
/// Tennis concourse
pub const TENNIS_COURT: (f32, f32) = (10.97 + 4.2 * 2.0 + 10.0, 23.77 + 4.2 * 2.0 + 12.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Density {
    High,
    Mid,
}

/// Park kind for a green block. A few central blocks are pinned.
pub fn pick_park(ix: usize, iz: usize) -> ParkKind {
    match (ix, iz) {
        (2, 2) | (3, 2) | (2, 3) => ParkKind::Basket,
        (3, 3) => ParkKind::Tennis,
        _ if (ix + iz) % 2 == 0 => ParkKind::Tennis,
        _ => ParkKind::Basket,
    }
}

impl WorldBuilder<'_> {
    pub(super) fn layout_blocks(&mut self) {
        for ix in 0..BLOCKS_X {
            for iz in 0..BLOCKS_Z {
                let key = BlockKey::new(ix, iz);
                match self.world.grid.zone(ix, iz) {
                    ZoneKind::Green => self.place_park(key),
                    ZoneKind::Civic => self.place_civic_core(key, "CIVIC"),
                    ZoneKind::Plaza => self.place_civic_core(key, "PLAZA"),
                    ZoneKind::Campus => self.place_campus(key),
                    ZoneKind::Gateway => self.place_gateway(key),
                    ZoneKind::ResHigh => self.layout_residential(key, Density::High),
                    ZoneKind::ResMid => self.layout_residential(key, Density::Mid),
                }
            }
        }
    }

    fn layout_residential(&mut self, key: BlockKey, density: Density) {
        let (cx, cz) = block_center(key.ix, key.iz);
        self.add_sidewalk(key);

        let (spread, base_floors, width, depth) = match density {
            Density::High => (PLOT * 0.32, 10, 38.0, 30.0),
            Density::Mid => (PLOT * 0.26, 7, 32.0, 26.0),
        };
        let slots: &[(f32, f32)] = match density {
            Density::High => &[
                (-spread, -PLOT * 0.18),
                (spread, -PLOT * 0.1),
                (0.0, PLOT * 0.16),
                (0.0, -PLOT * 0.36),
            ],
            Density::Mid => &[(-spread, -PLOT * 0.14), (spread, 0.0), (0.0, PLOT * 0.2)],
        };

        for (idx, (dx, dz)) in slots.iter().enumerate() {
            let spec = BuildingSpec::new(cx + dx, cz + dz, base_floors + idx as u32, width, depth)
                .in_plot(key);
            self.add_building(spec);
        }
    }

    fn place_civic_core(&mut self, key: BlockKey, label: &'static str) {
        let (cx, cz) = block_center(key.ix, key.iz);
        self.world
            .plots
            .register_area(key, cx, cz, PLOT * 0.95, PLOT * 0.95);
        self.add_sidewalk(key);
        self.add_park(ParkKind::Green, cx, cz, PLOT * 0.9, PLOT * 0.9);

        // Lands inside the reserved square, so the core stays open
        self.add_building(
            BuildingSpec::new(cx, cz - 8.0, 9, 58.0, 42.0)
                .in_plot(key)
                .labelled(label, true),
        );
        self.add_civic_benches(cx, cz);
    }

    fn place_campus(&mut self, key: BlockKey) {
        let (cx, cz) = block_center(key.ix, key.iz);
        self.world
            .plots
            .register_area(key, cx, cz, PLOT * 0.9, PLOT * 0.9);
        self.add_sidewalk(key);
        self.add_building(
            BuildingSpec::new(cx - PLOT * 0.18, cz - 10.0, 6, 40.0, 24.0)
                .in_plot(key)
                .labelled("LAB", false),
        );
        self.add_building(
            BuildingSpec::new(cx + PLOT * 0.14, cz + 12.0, 5, 34.0, 26.0)
                .in_plot(key)
                .labelled("DORMS", false),
        );
        self.add_court(ParkKind::Basket, cx, cz);
    }

    fn place_gateway(&mut self, key: BlockKey) {
        let (cx, cz) = block_center(key.ix, key.iz);
        self.world
            .plots
            .register_area(key, cx, cz, PLOT * 0.9, PLOT * 0.9);
        self.add_sidewalk(key);
        self.add_court(ParkKind::Basket, cx, cz);
        self.add_building(
            BuildingSpec::new(cx - PLOT * 0.18, cz + PLOT * 0.22, 8, 36.0, 32.0).in_plot(key),
        );
        self.add_building(
            BuildingSpec::new(cx + PLOT * 0.2, cz - PLOT * 0.16, 7, 32.0, 24.0).in_plot(key),
        );
    }

    fn place_park(&mut self, key: BlockKey) {
        let (cx, cz) = block_center(key.ix, key.iz);
        self.world
            .plots
            .register_area(key, cx, cz, PLOT * 0.9, PLOT * 0.9);
        match pick_park(key.ix, key.iz) {
            ParkKind::Green => self.add_park(ParkKind::Green, cx, cz, PLOT * 0.9, PLOT * 0.9),
            kind => self.add_court(kind, cx, cz),
        }
        self.add_civic_benches(cx, cz);
    }

    pub(super) fn add_court(&mut self, kind: ParkKind, cx: f32, cz: f32) {
        let (w, d) = match kind {
            ParkKind::Tennis => TENNIS_COURT,
            ParkKind::Basket => BASKET_COURT,
            ParkKind::Green => (PLOT * 0.9, PLOT * 0.9),
        };
        self.add_park(kind, cx, cz, w, d);
    }

    pub(super) fn add_park(&mut self, kind: ParkKind, x: f32, z: f32, width: f32, depth: f32) {
        self.world.parks.push(Park {
            kind,
            x,
            z,
            width,
            depth,
        });
    }

    fn add_civic_benches(&mut self, cx: f32, cz: f32) {
        let r = PLOT * 0.32;
        let benches = [
            (cx + r, cz, PI / 2.0),
            (cx - r, cz, -PI / 2.0),
            (cx, cz + r, 0.0),
            (cx, cz - r, PI),
        ];
        self.world
            .benches
            .extend(benches.iter().map(|&(x, z, heading)| Bench { x, z, heading }));
    }

    fn add_sidewalk(&mut self, key: BlockKey) {
        let (x, z) = block_center(key.ix, key.iz);
        debug_assert!(CELL - ROAD > PLOT);
        self.world.sidewalks.push(Sidewalk {
            block: key,
            x,
            z,
            pavement_width: PAVEMENT_WIDTH,
            bike_lane_width: BIKE_LANE_WIDTH,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::PhysicsWorld;
    use crate::game::world::{WorldGrid, WorldState};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn world() -> WorldState {
        let mut physics = PhysicsWorld::new();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        WorldBuilder::new(WorldGrid::default(), &mut physics, &mut rng, 9)
            .generate()
            .unwrap()
    }

    #[test]
    fn park_overrides_are_pinned() {
        assert_eq!(pick_park(2, 2), ParkKind::Basket);
        assert_eq!(pick_park(3, 3), ParkKind::Tennis);
        assert_eq!(pick_park(1, 1), ParkKind::Tennis);
        assert_eq!(pick_park(1, 0), ParkKind::Basket);
    }

    #[test]
    fn civic_core_stays_open() {
        let world = world();
        assert!(world
            .buildings
            .iter()
            .all(|b| b.label.as_deref() != Some("CIVIC") && b.label.as_deref() != Some("PLAZA")));
        let civic = BlockKey::new(2, 0);
        assert_eq!(world.plots.rects(civic).len(), 1);
    }

    #[test]
    fn residential_blocks_fill_their_slots() {
        let world = world();
        let high = world
            .buildings
            .iter()
            .filter(|b| b.block == Some(BlockKey::new(0, 0)))
            .count();
        let mid = world
            .buildings
            .iter()
            .filter(|b| b.block == Some(BlockKey::new(0, 1)))
            .count();
        assert!(high >= 1 && high <= 4);
        assert!(mid >= 1 && mid <= 3);
        let first = world
            .buildings
            .iter()
            .find(|b| b.block == Some(BlockKey::new(0, 0)))
            .unwrap();
        assert_eq!(first.floors, 10);
    }

    #[test]
    fn campus_and_gateway_buildings_are_skipped_inside_the_reserved_square() {
        let world = world();
        assert!(world
            .buildings
            .iter()
            .all(|b| b.block != Some(BlockKey::new(5, 2))));
        assert!(world
            .buildings
            .iter()
            .all(|b| b.block != Some(BlockKey::new(0, 2))));
    }

    #[test]
    fn every_block_gets_a_layout() {
        let world = world();
        let green_blocks = WorldGrid::default().count(ZoneKind::Green);
        assert_eq!(green_blocks, 12);
        assert!(world.benches.len() >= green_blocks * 4);
    }
}
