//! Points of interest, institutions, parked fleet and spawn points

use std::f32::consts::PI;

use glam::Vec3;
use rand::Rng;

use super::{
    BuildingSpec, Institution, InstitutionKind, Landmark, ParkKind, ParkedSpot, PickupSource,
    PickupSpot, Poi, PoiKind, WorldBuilder, CELL, CITY_HALF_X, CITY_HALF_Z, PLOT, ROAD,
    ROAD_SURFACE_Y, START_X, START_Z,
};
use crate::game::vehicles::{EmergencyKind, VehicleKind};

pub const ENEMY_SPAWN_COUNT: usize = 8;
pub const MIN_STREET_PICKUPS: usize = 12;

const PICKUP_LIFT: f32 = 0.08;
const ROOF_LIFT: f32 = 0.32;

/// Institution sites as block-grid fractions from the first block centre
const INSTITUTIONS: [(InstitutionKind, f32, f32); 5] = [
    (InstitutionKind::Police, 0.6, 0.8),
    (InstitutionKind::Hospital, 4.6, 3.0),
    (InstitutionKind::School, 2.4, 4.4),
    (InstitutionKind::Fire, 0.8, 4.8),
    (InstitutionKind::Mall, 3.6, 1.4),
];

/// Street parking as block-grid fractions, heading in units of π
const COMMON_SPOTS: [(VehicleKind, f32, f32, f32); 14] = [
    (VehicleKind::Sedan, 0.9, 1.3, 0.18),
    (VehicleKind::Car, 1.6, 1.1, -0.22),
    (VehicleKind::Motorcycle, 1.95, 1.55, -0.12),
    (VehicleKind::Sedan, 2.3, 1.8, 0.36),
    (VehicleKind::Bus, 3.1, 2.35, -0.48),
    (VehicleKind::Car, 2.4, 3.1, 0.52),
    (VehicleKind::Sedan, 4.0, 1.6, -0.12),
    (VehicleKind::Motorcycle, 4.2, 2.05, 0.08),
    (VehicleKind::Sedan, 1.2, 2.85, -0.38),
    (VehicleKind::Car, 3.65, 3.25, 0.72),
    (VehicleKind::Car, 5.0, 2.6, -0.08),
    (VehicleKind::Motorcycle, 5.2, 1.35, 0.28),
    (VehicleKind::Sedan, 2.85, 0.9, 0.12),
    (VehicleKind::Bus, 0.6, 3.6, -0.58),
];

fn grid_point(fx: f32, fz: f32) -> (f32, f32) {
    (START_X + CELL * fx, START_Z + CELL * fz)
}

fn parked_length(kind: VehicleKind) -> f32 {
    match kind {
        VehicleKind::Bus => 9.2,
        VehicleKind::Motorcycle => 2.3,
        _ => 4.6,
    }
}

impl WorldBuilder<'_> {
    pub(super) fn place_extra_parks(&mut self) {
        for f in [0.6, 4.6] {
            let (x, z) = grid_point(f, f);
            self.add_park(ParkKind::Green, x, z, PLOT * 0.9, PLOT * 0.9);
        }
        let (x, z) = grid_point(2.4, -1.2);
        self.add_court(ParkKind::Basket, x, z);
        let (x, z) = grid_point(3.6, 1.2);
        self.add_court(ParkKind::Basket, x, z);
    }

    pub(super) fn place_pois(&mut self) {
        let ring = self.world.ring_radius;

        let (ax, az) = (ring * 0.9, -ring * 0.6);
        self.world.pois.push(Poi {
            kind: PoiKind::Airport,
            x: ax,
            z: az,
        });
        self.push_landmark(ax, az, "Airport");

        let (sx, sz) = (-ring * 0.6, ring * 0.85);
        self.add_building(
            BuildingSpec::new(sx + 30.0, sz - 8.0, 5, 50.0, 16.0).labelled("STATION", false),
        );
        self.world.pois.push(Poi {
            kind: PoiKind::TrainStation,
            x: sx,
            z: sz,
        });
        self.push_landmark(sx, sz, "Station");
    }

    pub(super) fn place_institutions(&mut self) {
        for (kind, fx, fz) in INSTITUTIONS {
            let (x, z) = grid_point(fx, fz);
            let (floors, width, depth) = match kind {
                InstitutionKind::Mall => (6, 70.0, 60.0),
                _ => (7, 48.0, 40.0),
            };
            let spec = BuildingSpec::new(x, z, floors, width, depth).labelled(kind.label(), false);
            let Some(building) = self.add_building(spec) else {
                continue;
            };
            self.world.institutions.push(Institution {
                kind,
                x,
                z,
                width,
                depth,
                building,
            });
            self.push_landmark(x, z, kind.label());
        }
    }

    pub(super) fn place_parked_fleet(&mut self) {
        for (kind, fx, fz, heading) in COMMON_SPOTS {
            let (x, z) = grid_point(fx, fz);
            self.world.parked.push(ParkedSpot {
                kind,
                x,
                z,
                heading: PI * heading,
                length: parked_length(kind),
                emergency: None,
            });
        }

        if let Some(mall) = self.world.institution(InstitutionKind::Mall) {
            let shuttle = ParkedSpot {
                kind: VehicleKind::Bus,
                x: mall.x + mall.width / 2.0 + 6.0,
                z: mall.z - 6.0,
                heading: PI / 2.0,
                length: 9.4,
                emergency: None,
            };
            self.world.parked.push(shuttle);
        }

        if let Some(station) = self
            .world
            .pois
            .iter()
            .find(|p| p.kind == PoiKind::TrainStation)
            .cloned()
        {
            for i in 0..3 {
                self.world.parked.push(ParkedSpot {
                    kind: VehicleKind::Motorcycle,
                    x: station.x - 6.0 + i as f32 * 2.8,
                    z: station.z + 16.0 / 2.0 + 3.5,
                    heading: -PI / 2.0,
                    length: 2.4,
                    emergency: None,
                });
            }
        }

        let units = [
            (EmergencyKind::Ambulance, InstitutionKind::Hospital, 0.0, 4.4),
            (EmergencyKind::Police, InstitutionKind::Police, -4.0, 4.4),
            (EmergencyKind::Fire, InstitutionKind::Fire, 4.0, 5.1),
        ];
        for (unit, base, dx, length) in units {
            let Some(site) = self.world.institution(base) else {
                continue;
            };
            let spot = ParkedSpot {
                kind: unit.vehicle_kind(),
                x: site.x + dx,
                z: site.z + site.depth / 2.0 + 6.0,
                heading: PI,
                length,
                emergency: Some(unit),
            };
            self.world.parked.push(spot);
        }
    }

    pub(super) fn place_spawn_points(&mut self) {
        let r = self.world.ring_radius * 0.6;
        self.world.spawns.enemies = (0..ENEMY_SPAWN_COUNT)
            .map(|i| {
                let a = i as f32 / ENEMY_SPAWN_COUNT as f32 * PI * 2.0;
                Vec3::new(a.cos() * r, 0.0, a.sin() * r)
            })
            .collect();

        let mut pickups = Vec::new();
        for b in &self.world.buildings {
            let count = if b.height > 36.0 { 2 } else { 1 };
            for _ in 0..count {
                let off_x = (self.rng.gen::<f32>() - 0.5) * b.width * 0.42;
                let off_z = (self.rng.gen::<f32>() - 0.5) * b.depth * 0.42;
                pickups.push(PickupSpot {
                    position: Vec3::new(b.x + off_x, b.height + ROOF_LIFT, b.z + off_z),
                    source: PickupSource::Roof,
                });
            }
        }

        for p in &self.world.parks {
            let drops = ((p.width * p.depth) / 1400.0).round().max(1.0) as usize;
            for _ in 0..drops {
                let px = p.x + (self.rng.gen::<f32>() - 0.5) * p.width * 0.5;
                let pz = p.z + (self.rng.gen::<f32>() - 0.5) * p.depth * 0.5;
                pickups.push(PickupSpot {
                    position: Vec3::new(px, ROAD_SURFACE_Y + PICKUP_LIFT, pz),
                    source: PickupSource::Park,
                });
            }
        }

        let margin = ROAD * 0.75;
        for _ in 0..self.pickup_pool.max(MIN_STREET_PICKUPS) {
            let x = (self.rng.gen::<f32>() - 0.5) * 2.0 * (CITY_HALF_X - margin);
            let z = (self.rng.gen::<f32>() - 0.5) * 2.0 * (CITY_HALF_Z - margin);
            pickups.push(PickupSpot {
                position: Vec3::new(x, ROAD_SURFACE_Y + PICKUP_LIFT, z),
                source: PickupSource::Street,
            });
        }

        self.world.spawns.pickups = pickups;
    }

    fn push_landmark(&mut self, x: f32, z: f32, label: &str) {
        self.world.landmarks.push(Landmark {
            x,
            z,
            label: label.to_string(),
        });
    }
}
