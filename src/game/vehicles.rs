//! Vehicles: the drivable fleet, ring-road traffic, signals and emergency units
//!
//! All three vehicle models move kinematically. Parked and emergency vehicles
//! carry a static collision box that follows them; traffic has none.

use std::f32::consts::{FRAC_PI_2, TAU};

use glam::Vec3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::physics::{Aabb, BodyHandle, PhysicsWorld, StaticId, StaticTag};
use super::world::{ParkedSpot, TrafficLightSite, ROAD_SURFACE_Y};

/// Scales the original walking speeds to world units
pub const MOVE_SPEED_MULT: f32 = 3.6;
pub const RUN_SPEED: f32 = 7.2 * MOVE_SPEED_MULT;
/// Reference cruising speed for traffic and driving
pub const TRAFFIC_TARGET_SPEED: f32 = 3.0 * RUN_SPEED;
pub const TRAFFIC_COUNT: usize = 18;

/// Farthest a parked vehicle can be and still be entered
pub const ENTER_RADIUS: f32 = 4.2;
/// Sideways step out of the driver's door
pub const EXIT_OFFSET: f32 = 1.8;
/// Player body height after stepping out
pub const EXIT_HEIGHT: f32 = 0.94;

const DRIVE_ACCEL: f32 = TRAFFIC_TARGET_SPEED * 0.9;
const DRIVE_MAX: f32 = TRAFFIC_TARGET_SPEED * 1.35;
const REVERSE_SHARE: f32 = 0.55;
const DRIVE_DAMPING: f32 = 0.986;
const STEER_RATE: f32 = 1.8;
const THROTTLE_GAIN: f32 = 1.2;
const BRAKE_GAIN: f32 = 1.3;

pub const SIGNAL_PHASE_SECS: f32 = 6.0;
/// Traffic holds while a non-green signal is this close
pub const SIGNAL_RADIUS: f32 = 6.0;

const ARRIVAL_EPSILON: f32 = 0.4;
const RETURN_SPEED_SHARE: f32 = 0.7;
pub const ONSITE_DWELL: f32 = 14.0;
const IDLE_DRIFT: f32 = 0.6;
const INCIDENT_SPREAD: f32 = 2.4;
const SIREN_RATE: f32 = 6.0;

/// Blast shove reaches this far past the blast radius
const TRAFFIC_BLAST_REACH: f32 = 1.3;
const TRAFFIC_BLAST_PUSH: f32 = 8.0;
/// How far a shoved car may leave the ring centreline
const RING_SLACK: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleKind {
    Car,
    Sedan,
    Bus,
    Motorcycle,
    Ambulance,
    Police,
    FireTruck,
}

impl VehicleKind {
    pub const ALL: [VehicleKind; 7] = [
        VehicleKind::Car,
        VehicleKind::Sedan,
        VehicleKind::Bus,
        VehicleKind::Motorcycle,
        VehicleKind::Ambulance,
        VehicleKind::Police,
        VehicleKind::FireTruck,
    ];

    /// Width, height and length for a vehicle of the given length
    pub fn dimensions(self, length: f32) -> Vec3 {
        let (width, height) = match self {
            VehicleKind::Car => (1.9, 1.5),
            VehicleKind::Sedan => (1.9, 1.45),
            VehicleKind::Bus => (2.55, 3.2),
            VehicleKind::Motorcycle => (0.8, 1.3),
            VehicleKind::Ambulance => (2.2, 2.6),
            VehicleKind::Police => (1.9, 1.6),
            VehicleKind::FireTruck => (2.5, 3.1),
        };
        Vec3::new(width, height, length)
    }

    /// Asset cache key
    pub fn key(self) -> &'static str {
        match self {
            VehicleKind::Car => "car",
            VehicleKind::Sedan => "sedan",
            VehicleKind::Bus => "bus",
            VehicleKind::Motorcycle => "motorcycle",
            VehicleKind::Ambulance => "ambulance",
            VehicleKind::Police => "police",
            VehicleKind::FireTruck => "fire_truck",
        }
    }

    /// Model sources in fallback order
    pub fn sources(self) -> &'static [&'static str] {
        match self {
            VehicleKind::Sedan | VehicleKind::Police => &[
                "https://assets.babylonjs.com/meshes/car.glb",
                "https://raw.githubusercontent.com/BabylonJS/Assets/master/meshes/car.glb",
            ],
            VehicleKind::Car => &[
                "https://raw.githubusercontent.com/KhronosGroup/glTF-Sample-Assets/main/Models/CarConcept/glTF-Binary/CarConcept.glb",
                "https://cdn.jsdelivr.net/gh/KhronosGroup/glTF-Sample-Assets@main/Models/CarConcept/glTF-Binary/CarConcept.glb",
            ],
            VehicleKind::Ambulance => &[
                "https://raw.githubusercontent.com/KhronosGroup/glTF-Sample-Models/master/2.0/CesiumMilkTruck/glTF-Binary/CesiumMilkTruck.glb",
                "https://cdn.jsdelivr.net/gh/KhronosGroup/glTF-Sample-Models@master/2.0/CesiumMilkTruck/glTF-Binary/CesiumMilkTruck.glb",
            ],
            VehicleKind::FireTruck => &[
                "https://raw.githubusercontent.com/Kenney-CCO/Kenney-CCO.glb/main/firetruck.glb",
                "https://cdn.jsdelivr.net/gh/Kenney-CCO/Kenney-CCO.glb@main/firetruck.glb",
                "https://raw.githubusercontent.com/MonuYadav05/Astrikos-gc-project/main/public/FireTruck.glb",
            ],
            VehicleKind::Bus => &[
                "https://raw.githubusercontent.com/jade0815/my-3d-bus-models/main/Bus.glb",
                "https://raw.githubusercontent.com/haelimk/project/8c50930d7f283f345c46a0dcdf2a984286c3b4c0/bus.glb",
                "https://raw.githubusercontent.com/IHyeonii/PythonStudy/main/free_school_bus_-_low_poly.glb",
            ],
            VehicleKind::Motorcycle => &[
                "https://raw.githubusercontent.com/shosuz-evangelist/3dObjects4Apps/main/Motorcycle.glb",
                "https://raw.githubusercontent.com/jade12855/3D_model/main/Motorcycle.glb",
            ],
        }
    }

    /// Kind for ambient traffic from a uniform roll
    pub fn for_traffic(roll: f32) -> Self {
        if roll < 0.18 {
            VehicleKind::Bus
        } else if roll < 0.42 {
            VehicleKind::Motorcycle
        } else if roll < 0.68 {
            VehicleKind::Car
        } else {
            VehicleKind::Sedan
        }
    }

    pub fn traffic_length(self) -> f32 {
        match self {
            VehicleKind::Bus => 9.2,
            VehicleKind::Motorcycle => 2.4,
            _ => 4.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyKind {
    Ambulance,
    Police,
    Fire,
}

impl EmergencyKind {
    pub fn vehicle_kind(self) -> VehicleKind {
        match self {
            EmergencyKind::Ambulance => VehicleKind::Ambulance,
            EmergencyKind::Police => VehicleKind::Police,
            EmergencyKind::Fire => VehicleKind::FireTruck,
        }
    }

    /// Response speed (units/s)
    pub fn speed(self) -> f32 {
        match self {
            EmergencyKind::Ambulance => 12.0,
            EmergencyKind::Police => 13.0,
            EmergencyKind::Fire => 11.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyState {
    Idle,
    Responding,
    Onsite,
    Returning,
}

/// Dispatch state carried by an emergency vehicle
#[derive(Debug, Clone, Serialize)]
pub struct EmergencyUnit {
    pub kind: EmergencyKind,
    pub state: EmergencyState,
    pub target: Option<Vec3>,
    pub base: Vec3,
    pub base_heading: f32,
    /// Seconds spent on site
    pub dwell: f32,
    pub siren_phase: f32,
}

impl EmergencyUnit {
    /// 0..1 light pulse, dark unless responding or on site
    pub fn siren(&self) -> f32 {
        match self.state {
            EmergencyState::Responding | EmergencyState::Onsite => 0.5 + 0.5 * self.siren_phase.sin(),
            EmergencyState::Idle | EmergencyState::Returning => 0.0,
        }
    }
}

/// A parked or emergency vehicle the player can take
#[derive(Debug, Clone, Serialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub kind: VehicleKind,
    pub position: Vec3,
    /// Travel direction is `(cos heading, sin heading)` on x/z
    pub heading: f32,
    /// Width, height, length
    pub size: Vec3,
    #[serde(skip)]
    pub collider: StaticId,
    pub unit: Option<EmergencyUnit>,
}

impl Vehicle {
    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.heading.cos(), 0.0, self.heading.sin())
    }

    /// Axis-aligned box around the vehicle at its current heading
    pub fn bounds(&self) -> Aabb {
        footprint(self.position, self.heading, self.size)
    }
}

fn footprint(position: Vec3, heading: f32, size: Vec3) -> Aabb {
    let (c, s) = (heading.cos().abs(), heading.sin().abs());
    let w = size.z * c + size.x * s;
    let d = size.z * s + size.x * c;
    Aabb::from_footprint(position.x, position.z, w, d, size.y)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalPhase {
    Green,
    Yellow,
    Red,
}

impl SignalPhase {
    pub fn next(self) -> Self {
        match self {
            SignalPhase::Green => SignalPhase::Yellow,
            SignalPhase::Yellow => SignalPhase::Red,
            SignalPhase::Red => SignalPhase::Green,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TrafficLight {
    pub x: f32,
    pub z: f32,
    pub heading: f32,
    pub phase: SignalPhase,
    #[serde(skip)]
    timer: f32,
}

impl TrafficLight {
    /// A signal already `phase_offset` seconds into its cycle
    pub fn new(site: &TrafficLightSite) -> Self {
        let mut light = Self {
            x: site.x,
            z: site.z,
            heading: site.heading,
            phase: SignalPhase::Green,
            timer: 0.0,
        };
        light.update(site.phase_offset.max(0.0));
        light
    }

    pub fn update(&mut self, dt: f32) {
        self.timer += dt;
        while self.timer > SIGNAL_PHASE_SECS {
            self.timer -= SIGNAL_PHASE_SECS;
            self.phase = self.phase.next();
        }
    }

    pub fn distance_to(&self, x: f32, z: f32) -> f32 {
        ((self.x - x).powi(2) + (self.z - z).powi(2)).sqrt()
    }
}

/// An ambient car orbiting the ring road
#[derive(Debug, Clone, Serialize)]
pub struct TrafficCar {
    pub id: Uuid,
    pub kind: VehicleKind,
    pub angle: f32,
    pub radius: f32,
    /// Linear speed (units/s)
    pub speed: f32,
    pub length: f32,
    /// Held at a signal on the last update
    pub blocked: bool,
}

impl TrafficCar {
    pub fn position(&self) -> Vec3 {
        position_on_ring(self.angle, self.radius)
    }

    /// Tangent heading in the `(cos, sin)` convention
    pub fn heading(&self) -> f32 {
        self.angle + FRAC_PI_2
    }
}

fn position_on_ring(angle: f32, radius: f32) -> Vec3 {
    Vec3::new(angle.cos() * radius, ROAD_SURFACE_Y, angle.sin() * radius)
}

/// The player's hold on a vehicle
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DriveState {
    pub vehicle: Option<Uuid>,
    pub speed: f32,
    pub heading: f32,
}

/// Owns every vehicle in the session
#[derive(Debug, Clone)]
pub struct VehicleSystem {
    pub fleet: Vec<Vehicle>,
    pub traffic: Vec<TrafficCar>,
    pub lights: Vec<TrafficLight>,
    pub drive: DriveState,
    ring_radius: f32,
}

impl VehicleSystem {
    pub fn new(ring_radius: f32) -> Self {
        Self {
            fleet: Vec::new(),
            traffic: Vec::new(),
            lights: Vec::new(),
            drive: DriveState::default(),
            ring_radius,
        }
    }

    /// Park vehicles on their spots. `emergency` selects the unit spots or the
    /// common ones.
    pub fn spawn_fleet(&mut self, physics: &mut PhysicsWorld, spots: &[ParkedSpot], emergency: bool) -> usize {
        let before = self.fleet.len();
        for spot in spots.iter().filter(|s| s.emergency.is_some() == emergency) {
            let id = Uuid::new_v4();
            let position = Vec3::new(spot.x, ROAD_SURFACE_Y, spot.z);
            let unit = spot.emergency.map(|kind| EmergencyUnit {
                kind,
                state: EmergencyState::Idle,
                target: None,
                base: position,
                base_heading: spot.heading,
                dwell: 0.0,
                siren_phase: 0.0,
            });
            let size = spot.kind.dimensions(spot.length);
            let collider = physics.add_static(footprint(position, spot.heading, size), StaticTag::Vehicle(id));
            let vehicle = Vehicle {
                id,
                kind: spot.kind,
                position,
                heading: spot.heading,
                size,
                collider,
                unit,
            };
            self.fleet.push(vehicle);
        }
        self.fleet.len() - before
    }

    /// Scatter ambient cars around the ring
    pub fn spawn_traffic(&mut self, count: usize, rng: &mut ChaCha8Rng) -> usize {
        for _ in 0..count {
            let kind = VehicleKind::for_traffic(rng.gen());
            self.traffic.push(TrafficCar {
                id: Uuid::new_v4(),
                kind,
                angle: rng.gen_range(0.0..TAU),
                radius: self.ring_radius,
                speed: TRAFFIC_TARGET_SPEED * (0.8 + rng.gen::<f32>() * 0.4),
                length: kind.traffic_length(),
                blocked: false,
            });
        }
        count
    }

    pub fn install_signals(&mut self, sites: &[TrafficLightSite]) {
        self.lights = sites.iter().map(TrafficLight::new).collect();
    }

    pub fn update_signals(&mut self, dt: f32) {
        for light in &mut self.lights {
            light.update(dt);
        }
    }

    /// Advance traffic around the ring. A car near a non-green signal holds
    /// where it is.
    pub fn update_traffic(&mut self, dt: f32) {
        let lights = &self.lights;
        for car in &mut self.traffic {
            let here = car.position();
            car.blocked = lights
                .iter()
                .any(|l| l.phase != SignalPhase::Green && l.distance_to(here.x, here.z) < SIGNAL_RADIUS);
            if car.blocked || car.radius <= 0.0 {
                continue;
            }
            car.angle = (car.angle + car.speed / car.radius * dt) % TAU;
        }
    }

    /// Send every emergency unit not under the player's control toward `incident`
    pub fn dispatch(&mut self, incident: Vec3) -> usize {
        let driven = self.drive.vehicle;
        let mut units: Vec<&mut EmergencyUnit> = self
            .fleet
            .iter_mut()
            .filter(|v| Some(v.id) != driven)
            .filter_map(|v| v.unit.as_mut())
            .collect();
        let total = units.len();
        for (idx, unit) in units.iter_mut().enumerate() {
            let a = idx as f32 / total as f32 * TAU;
            unit.target = Some(incident + Vec3::new(a.cos(), 0.0, a.sin()) * INCIDENT_SPREAD);
            unit.state = EmergencyState::Responding;
            unit.dwell = 0.0;
        }
        if total > 0 {
            debug!(x = incident.x, z = incident.z, units = total, "Emergency units dispatched");
        }
        total
    }

    /// Step the emergency state machines and move their vehicles
    pub fn update_emergency(&mut self, dt: f32, physics: &mut PhysicsWorld) {
        let driven = self.drive.vehicle;
        for vehicle in self.fleet.iter_mut().filter(|v| Some(v.id) != driven) {
            let Some(unit) = vehicle.unit.as_mut() else {
                continue;
            };

            match unit.state {
                EmergencyState::Idle => {
                    if flat_distance(vehicle.position, unit.base) > IDLE_DRIFT {
                        unit.state = EmergencyState::Returning;
                    }
                }
                EmergencyState::Onsite => {
                    unit.dwell += dt;
                    if unit.dwell > ONSITE_DWELL {
                        unit.state = EmergencyState::Returning;
                        unit.target = None;
                    }
                }
                EmergencyState::Responding | EmergencyState::Returning => {
                    let responding = unit.state == EmergencyState::Responding;
                    let goal = match (responding, unit.target) {
                        (true, Some(t)) => t,
                        _ => unit.base,
                    };
                    let delta = Vec3::new(goal.x - vehicle.position.x, 0.0, goal.z - vehicle.position.z);
                    let d = delta.length();
                    if d > ARRIVAL_EPSILON {
                        let speed = if responding {
                            unit.kind.speed()
                        } else {
                            unit.kind.speed() * RETURN_SPEED_SHARE
                        };
                        vehicle.position += delta / d * (speed * dt).min(d);
                        vehicle.heading = delta.z.atan2(delta.x);
                    } else if responding {
                        unit.state = EmergencyState::Onsite;
                        unit.dwell = 0.0;
                    } else {
                        unit.state = EmergencyState::Idle;
                        vehicle.position = unit.base;
                        vehicle.heading = unit.base_heading;
                    }
                }
            }

            if matches!(unit.state, EmergencyState::Responding | EmergencyState::Onsite) {
                unit.siren_phase = (unit.siren_phase + dt * SIREN_RATE) % TAU;
            }
            physics.reshape_static(vehicle.collider, vehicle.bounds());
        }
    }

    /// Shove traffic away from a blast, keeping it on the ring
    pub fn push_traffic(&mut self, center: Vec3, radius: f32) {
        let reach = radius * TRAFFIC_BLAST_REACH;
        if reach <= 0.0 {
            return;
        }
        let ring = self.ring_radius;
        for car in &mut self.traffic {
            let pos = car.position();
            let away = Vec3::new(pos.x - center.x, 0.0, pos.z - center.z);
            let d = away.length();
            if d >= reach {
                continue;
            }
            let dir = away.try_normalize().unwrap_or(Vec3::new(car.angle.cos(), 0.0, car.angle.sin()));
            let shoved = pos + dir * (1.0 - d / reach) * TRAFFIC_BLAST_PUSH;
            let r = Vec3::new(shoved.x, 0.0, shoved.z).length();
            car.radius = r.clamp(ring - RING_SLACK, ring + RING_SLACK);
            car.angle = shoved.z.atan2(shoved.x);
        }
    }

    pub fn driven(&self) -> Option<&Vehicle> {
        let id = self.drive.vehicle?;
        self.fleet.iter().find(|v| v.id == id)
    }

    /// Closest fleet vehicle within `ENTER_RADIUS` of `position`
    pub fn nearest_drivable(&self, position: Vec3) -> Option<usize> {
        self.fleet
            .iter()
            .enumerate()
            .map(|(i, v)| (i, flat_distance(v.position, position)))
            .filter(|&(_, d)| d <= ENTER_RADIUS)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    /// Take the nearest vehicle. The player's body is parked inside it and
    /// stops simulating. `None` when already driving or nothing is in reach.
    pub fn enter(&mut self, physics: &mut PhysicsWorld, player: BodyHandle) -> Option<Uuid> {
        if self.drive.vehicle.is_some() {
            return None;
        }
        let position = physics.body(player)?.position;
        let index = self.nearest_drivable(position)?;
        let vehicle = &self.fleet[index];
        self.drive = DriveState {
            vehicle: Some(vehicle.id),
            speed: 0.0,
            heading: vehicle.heading,
        };
        if let Some(body) = physics.body_mut(player) {
            body.velocity = Vec3::ZERO;
            body.enabled = false;
            body.position = Vec3::new(vehicle.position.x, body.position.y, vehicle.position.z);
        }
        Some(vehicle.id)
    }

    /// Leave the vehicle, stepping out to its left
    pub fn exit(&mut self, physics: &mut PhysicsWorld, player: BodyHandle) -> Option<Uuid> {
        let vehicle = self.driven()?;
        let (id, pos, h) = (vehicle.id, vehicle.position, vehicle.heading);
        self.drive = DriveState::default();
        if let Some(body) = physics.body_mut(player) {
            body.enabled = true;
            body.velocity = Vec3::ZERO;
            body.position = Vec3::new(
                pos.x - h.sin() * EXIT_OFFSET,
                EXIT_HEIGHT,
                pos.z + h.cos() * EXIT_OFFSET,
            );
        }
        Some(id)
    }

    /// Integrate the driven vehicle. `throttle` is forward/back input and
    /// `steer` turns; both in -1..1.
    pub fn drive(&mut self, throttle: f32, steer: f32, dt: f32, physics: &mut PhysicsWorld, player: BodyHandle) {
        let Some(id) = self.drive.vehicle else {
            return;
        };
        let Some(vehicle) = self.fleet.iter_mut().find(|v| v.id == id) else {
            self.drive = DriveState::default();
            return;
        };

        let drive = &mut self.drive;
        let pedal = if throttle >= 0.0 {
            throttle * THROTTLE_GAIN
        } else {
            throttle * BRAKE_GAIN
        };
        drive.speed = (drive.speed + pedal * DRIVE_ACCEL * dt).clamp(-DRIVE_MAX * REVERSE_SHARE, DRIVE_MAX);
        drive.speed *= DRIVE_DAMPING;
        let grip = 0.5 + (drive.speed.abs() / DRIVE_MAX).min(1.0);
        drive.heading += steer * STEER_RATE * dt * grip;

        vehicle.heading = drive.heading;
        vehicle.position += vehicle.forward() * drive.speed * dt;
        physics.reshape_static(vehicle.collider, vehicle.bounds());

        if let Some(body) = physics.body_mut(player) {
            body.position.x = vehicle.position.x;
            body.position.z = vehicle.position.z;
        }
    }

    pub fn ring_radius(&self) -> f32 {
        self.ring_radius
    }
}

fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    ((a.x - b.x).powi(2) + (a.z - b.z).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::{Material, RigidBody};
    use rand::SeedableRng;

    const RING: f32 = 468.0;

    fn spot(kind: VehicleKind, x: f32, z: f32, emergency: Option<EmergencyKind>) -> ParkedSpot {
        ParkedSpot {
            kind,
            x,
            z,
            heading: 0.0,
            length: 4.6,
            emergency,
        }
    }

    fn car_at(angle: f32) -> TrafficCar {
        TrafficCar {
            id: Uuid::new_v4(),
            kind: VehicleKind::Car,
            angle,
            radius: RING,
            speed: TRAFFIC_TARGET_SPEED,
            length: 4.6,
            blocked: false,
        }
    }

    #[test]
    fn traffic_kinds_follow_the_roll() {
        assert_eq!(VehicleKind::for_traffic(0.1), VehicleKind::Bus);
        assert_eq!(VehicleKind::for_traffic(0.3), VehicleKind::Motorcycle);
        assert_eq!(VehicleKind::for_traffic(0.5), VehicleKind::Car);
        assert_eq!(VehicleKind::for_traffic(0.9), VehicleKind::Sedan);
        assert!(VehicleKind::ALL.iter().all(|k| !k.sources().is_empty()));
    }

    #[test]
    fn signal_cycles_through_phases() {
        let site = TrafficLightSite {
            x: 0.0,
            z: 0.0,
            heading: 0.0,
            phase_offset: 0.0,
        };
        let mut light = TrafficLight::new(&site);
        assert_eq!(light.phase, SignalPhase::Green);
        light.update(6.5);
        assert_eq!(light.phase, SignalPhase::Yellow);
        light.update(6.0);
        assert_eq!(light.phase, SignalPhase::Red);
        light.update(6.0);
        assert_eq!(light.phase, SignalPhase::Green);

        let staggered = TrafficLight::new(&TrafficLightSite {
            phase_offset: 14.0,
            ..site
        });
        assert_eq!(staggered.phase, SignalPhase::Red);
    }

    #[test]
    fn traffic_holds_at_red_and_resumes_on_green() {
        let mut system = VehicleSystem::new(RING);
        system.traffic.push(car_at(0.0));
        system.install_signals(&[TrafficLightSite {
            x: RING,
            z: 2.0,
            heading: 0.0,
            phase_offset: 12.5,
        }]);
        assert_eq!(system.lights[0].phase, SignalPhase::Red);

        for _ in 0..10 {
            system.update_traffic(0.1);
        }
        assert!(system.traffic[0].blocked);
        assert_eq!(system.traffic[0].angle, 0.0);

        system.update_signals(6.0);
        assert_eq!(system.lights[0].phase, SignalPhase::Green);
        system.update_traffic(0.1);
        assert!(!system.traffic[0].blocked);
        let expected = TRAFFIC_TARGET_SPEED / RING * 0.1;
        assert!((system.traffic[0].angle - expected).abs() < 1e-5);
    }

    #[test]
    fn blast_pushes_traffic_but_keeps_it_near_the_ring() {
        let mut system = VehicleSystem::new(RING);
        system.traffic.push(car_at(0.0));
        system.push_traffic(Vec3::new(RING - 2.0, 0.0, 0.0), 12.0);
        let car = &system.traffic[0];
        assert!(car.radius > RING);
        assert!(car.radius <= RING + RING_SLACK);

        let far = system.traffic[0].radius;
        system.push_traffic(Vec3::new(0.0, 0.0, 0.0), 12.0);
        assert_eq!(system.traffic[0].radius, far);
    }

    #[test]
    fn spawn_traffic_uses_reference_speed() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut system = VehicleSystem::new(RING);
        assert_eq!(system.spawn_traffic(TRAFFIC_COUNT, &mut rng), 18);
        for car in &system.traffic {
            assert!(car.speed >= TRAFFIC_TARGET_SPEED * 0.8 - 1e-3);
            assert!(car.speed <= TRAFFIC_TARGET_SPEED * 1.2 + 1e-3);
            assert!((car.position().length() - RING).abs() < 0.1);
        }
    }

    #[test]
    fn emergency_cycle_runs_to_completion() {
        let mut physics = PhysicsWorld::new();
        let mut system = VehicleSystem::new(RING);
        let spots = [
            spot(VehicleKind::Sedan, 50.0, 50.0, None),
            spot(VehicleKind::Ambulance, 0.0, 0.0, Some(EmergencyKind::Ambulance)),
            spot(VehicleKind::Police, 10.0, 0.0, Some(EmergencyKind::Police)),
        ];
        assert_eq!(system.spawn_fleet(&mut physics, &spots, true), 2);
        assert_eq!(system.spawn_fleet(&mut physics, &spots, false), 1);
        assert_eq!(physics.static_count(), 3);

        assert_eq!(system.dispatch(Vec3::new(40.0, 0.0, 0.0)), 2);
        let unit = |s: &VehicleSystem, i: usize| s.fleet[i].unit.clone().unwrap();
        assert_eq!(unit(&system, 0).state, EmergencyState::Responding);
        assert!(unit(&system, 0).siren() >= 0.0);

        for _ in 0..100 {
            system.update_emergency(0.1, &mut physics);
        }
        assert_eq!(unit(&system, 0).state, EmergencyState::Onsite);
        let target = unit(&system, 0).target.unwrap();
        assert!(flat_distance(system.fleet[0].position, target) <= ARRIVAL_EPSILON);

        for _ in 0..85 {
            system.update_emergency(0.1, &mut physics);
        }
        assert_eq!(unit(&system, 0).state, EmergencyState::Returning);
        assert_eq!(unit(&system, 0).siren(), 0.0);

        for _ in 0..100 {
            system.update_emergency(0.1, &mut physics);
        }
        assert_eq!(unit(&system, 0).state, EmergencyState::Idle);
        assert_eq!(system.fleet[0].position, unit(&system, 0).base);
    }

    #[test]
    fn enter_and_exit_hand_over_control() {
        let mut physics = PhysicsWorld::new();
        let mut system = VehicleSystem::new(RING);
        system.spawn_fleet(&mut physics, &[spot(VehicleKind::Sedan, 3.0, 0.0, None)], false);
        let player = physics.add_body(
            RigidBody::sphere(0.32, 72.0, Vec3::new(0.0, 0.32, 0.0), Material::Player)
                .with_velocity(Vec3::new(2.0, 0.0, 1.0)),
        );

        let id = system.enter(&mut physics, player).unwrap();
        assert_eq!(system.drive.vehicle, Some(id));
        let body = physics.body(player).unwrap();
        assert_eq!(body.velocity, Vec3::ZERO);
        assert!(!body.enabled);
        assert!(system.enter(&mut physics, player).is_none());

        for _ in 0..60 {
            system.drive(1.0, 0.0, 1.0 / 60.0, &mut physics, player);
        }
        assert!(system.drive.speed > 0.0);
        let vehicle = system.driven().unwrap().clone();
        assert!(vehicle.position.x > 3.0);
        assert_eq!(physics.body(player).unwrap().position.x, vehicle.position.x);

        assert_eq!(system.exit(&mut physics, player), Some(id));
        assert!(system.driven().is_none());
        let body = physics.body(player).unwrap();
        assert!(body.enabled);
        assert!((flat_distance(body.position, vehicle.position) - EXIT_OFFSET).abs() < 1e-3);
        assert_eq!(body.position.y, EXIT_HEIGHT);
        assert!(system.exit(&mut physics, player).is_none());
    }

    #[test]
    fn driving_speed_is_capped() {
        let mut physics = PhysicsWorld::new();
        let mut system = VehicleSystem::new(RING);
        system.spawn_fleet(&mut physics, &[spot(VehicleKind::Car, 0.0, 0.0, None)], false);
        let player = physics.add_body(RigidBody::sphere(0.32, 72.0, Vec3::new(0.0, 0.32, 0.0), Material::Player));
        system.enter(&mut physics, player).unwrap();
        for _ in 0..2000 {
            system.drive(1.0, 0.2, 0.02, &mut physics, player);
        }
        assert!(system.drive.speed <= DRIVE_MAX);
        for _ in 0..2000 {
            system.drive(-1.0, 0.0, 0.02, &mut physics, player);
        }
        assert!(system.drive.speed >= -DRIVE_MAX * REVERSE_SHARE);
        assert!(system.drive.speed < 0.0);
    }
}
