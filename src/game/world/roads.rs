//! Street grid, ring road, signals and the outer walls

use std::f32::consts::PI;

use glam::Vec2;

use super::{
    Crosswalk, Road, RoadKind, StreetLight, TrafficLightSite, Wall, WorldBuilder, BLOCKS_X,
    BLOCKS_Z, CELL, CITY_HALF_X, CITY_HALF_Z, RING_WIDTH, ROAD,
};
use crate::game::physics::{Aabb, StaticTag};

pub const NORTH_SOUTH_STREETS: [&str; BLOCKS_X + 1] = [
    "Kombinat Street",
    "Kavaja Street",
    "Martyrs Street",
    "Myslym Shyri Street",
    "Ismail Qemali Street",
    "Abdyl Frasheri Street",
    "Bajram Curri Street",
];

pub const EAST_WEST_STREETS: [&str; BLOCKS_Z + 1] = [
    "Mother Teresa Blvd",
    "Skanderbeg Street",
    "Ismail Ndroqi Street",
    "Ali Demi Street",
    "Petro Nini Street",
    "Teuta Street",
    "Don Bosko Street",
];

pub const RING_ROAD_NAME: &str = "Ring Road";

const WALL_HEIGHT: f32 = 11.0;
const WALL_THICKNESS: f32 = 2.4;

/// Seconds between neighbouring junction signals
const JUNCTION_STAGGER: f32 = 2.0;

/// Connector segments splicing the grid onto the ring
pub fn connector_segments(ring_radius: f32) -> [(Vec2, Vec2); 8] {
    let (hx, hz, r) = (CITY_HALF_X, CITY_HALF_Z, ring_radius);
    let edge = ROAD * 0.5;
    [
        (Vec2::new(hx + edge, 0.0), Vec2::new(r - 8.0, 0.0)),
        (Vec2::new(-hx - edge, 0.0), Vec2::new(-r + 8.0, 0.0)),
        (Vec2::new(0.0, hz + edge), Vec2::new(0.0, r - 8.0)),
        (Vec2::new(0.0, -hz - edge), Vec2::new(0.0, -r + 8.0)),
        (Vec2::new(hx + edge, hz * 0.6), Vec2::new(r - 10.0, r * 0.6)),
        (Vec2::new(-hx - edge, -hz * 0.6), Vec2::new(-r + 10.0, -r * 0.6)),
        (Vec2::new(hx * 0.25, hz + edge), Vec2::new(r * 0.25, r - 10.0)),
        (Vec2::new(-hx * 0.25, -hz - edge), Vec2::new(-r * 0.25, -r + 10.0)),
    ]
}

impl WorldBuilder<'_> {
    pub(super) fn lay_grid_roads(&mut self) {
        let half_len_x = CELL * BLOCKS_X as f32 * 0.5 + ROAD * 0.5;
        let half_len_z = CELL * BLOCKS_Z as f32 * 0.5 + ROAD * 0.5;

        for (ix, name) in NORTH_SOUTH_STREETS.iter().enumerate() {
            let x = ix as f32 * CELL - CITY_HALF_X;
            self.world.roads.push(Road {
                kind: RoadKind::Grid,
                name: name.to_string(),
                from: Vec2::new(x, -half_len_z),
                to: Vec2::new(x, half_len_z),
                width: ROAD,
                radius: None,
            });
        }
        for (iz, name) in EAST_WEST_STREETS.iter().enumerate() {
            let z = iz as f32 * CELL - CITY_HALF_Z;
            self.world.roads.push(Road {
                kind: RoadKind::Grid,
                name: name.to_string(),
                from: Vec2::new(-half_len_x, z),
                to: Vec2::new(half_len_x, z),
                width: ROAD,
                radius: None,
            });
        }

        for ix in 0..=BLOCKS_X {
            for iz in 0..=BLOCKS_Z {
                let x = ix as f32 * CELL - CITY_HALF_X;
                let z = iz as f32 * CELL - CITY_HALF_Z;
                self.world.crosswalks.push(Crosswalk { x, z, along_x: true });
                self.world.crosswalks.push(Crosswalk { x, z, along_x: false });
                if (ix + iz) % 2 == 0 {
                    self.world.street_lights.push(StreetLight {
                        x: x + ROAD * 0.5,
                        z: z + ROAD * 0.5,
                    });
                }
            }
        }
    }

    /// Grid-edge signals, then one signal on the ring at every connector junction
    pub(super) fn place_traffic_lights(&mut self) {
        let half_z = BLOCKS_Z as f32 * CELL * 0.5;
        let n = BLOCKS_X as i32;
        for i in (-n..=n).step_by(2) {
            let x = i as f32 * CELL * 0.5;
            self.world.traffic_lights.push(TrafficLightSite {
                x,
                z: -half_z,
                heading: 0.0,
                phase_offset: 0.0,
            });
            self.world.traffic_lights.push(TrafficLightSite {
                x,
                z: half_z,
                heading: PI,
                phase_offset: 0.0,
            });
        }

        let ring = self.world.ring_radius;
        for (idx, (_, to)) in connector_segments(ring).iter().enumerate() {
            let bearing = to.y.atan2(to.x);
            self.world.traffic_lights.push(TrafficLightSite {
                x: bearing.cos() * ring,
                z: bearing.sin() * ring,
                heading: bearing + PI * 0.5,
                phase_offset: idx as f32 * JUNCTION_STAGGER,
            });
        }
    }

    pub(super) fn lay_ring_road(&mut self) {
        let ring = self.world.ring_radius;
        self.world.roads.push(Road {
            kind: RoadKind::Ring,
            name: RING_ROAD_NAME.to_string(),
            from: Vec2::ZERO,
            to: Vec2::ZERO,
            width: RING_WIDTH,
            radius: Some(ring),
        });

        for (from, to) in connector_segments(ring) {
            if from.distance(to) < 1.0 {
                continue;
            }
            self.world.roads.push(Road {
                kind: RoadKind::Connector,
                name: RING_ROAD_NAME.to_string(),
                from,
                to,
                width: ROAD,
                radius: None,
            });
        }
    }

    pub(super) fn build_perimeter_walls(&mut self) {
        let span_x = BLOCKS_X as f32 * CELL;
        let span_z = BLOCKS_Z as f32 * CELL;
        let off_x = span_x / 2.0 + ROAD + 5.0;
        let off_z = span_z / 2.0 + ROAD + 5.0;
        let len_x = span_x + ROAD * 2.0 + 14.0;
        let len_z = span_z + ROAD * 2.0 + 14.0;

        let walls = [
            (0.0, -off_z, len_x, WALL_THICKNESS),
            (0.0, off_z, len_x, WALL_THICKNESS),
            (-off_x, 0.0, WALL_THICKNESS, len_z),
            (off_x, 0.0, WALL_THICKNESS, len_z),
        ];
        for (x, z, w, d) in walls {
            let bounds = Aabb::from_footprint(x, z, w, d, WALL_HEIGHT);
            self.physics.add_static(bounds, StaticTag::Wall);
            self.world.walls.push(Wall { bounds });
        }
    }
}
