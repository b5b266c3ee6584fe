//! Camera framing derived from the player or vehicle pose

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::vehicles::Vehicle;

/// Distance the on-foot camera trails the player
pub const CAMERA_DISTANCE: f32 = 4.2;
const EYE_HEIGHT: f32 = 1.6;
const LOOK_AHEAD: f32 = 1.6;
const LOOK_HEIGHT: f32 = 1.05;
const PITCH_LOOK: f32 = 0.7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraMode {
    #[default]
    Follow,
    Cockpit,
}

/// Eye and look-at point for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraPose {
    pub eye: Vec3,
    pub target: Vec3,
}

impl CameraPose {
    /// Unit view direction
    pub fn aim(&self) -> Vec3 {
        (self.target - self.eye).try_normalize().unwrap_or(Vec3::Z)
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, EYE_HEIGHT, -CAMERA_DISTANCE),
            target: Vec3::new(0.0, LOOK_HEIGHT, LOOK_AHEAD),
        }
    }
}

/// Holds only the active mode; every pose is recomputed from scratch
#[derive(Debug, Clone, Copy, Default)]
pub struct CameraRig {
    pub mode: CameraMode,
}

impl CameraRig {
    pub fn toggle(&mut self) -> CameraMode {
        self.mode = match self.mode {
            CameraMode::Follow => CameraMode::Cockpit,
            CameraMode::Cockpit => CameraMode::Follow,
        };
        self.mode
    }

    /// Framing for the player on foot. `forward` is the flat facing.
    pub fn on_foot(position: Vec3, forward: Vec3, pitch: f32) -> CameraPose {
        let eye = position - forward * CAMERA_DISTANCE;
        let look = position + forward * LOOK_AHEAD;
        CameraPose {
            eye: Vec3::new(eye.x, position.y + EYE_HEIGHT, eye.z),
            target: Vec3::new(look.x, position.y + LOOK_HEIGHT + pitch.sin() * PITCH_LOOK, look.z),
        }
    }

    /// Framing for a driven vehicle, scaled by its size so buses and bikes
    /// both fit the view
    pub fn for_vehicle(&self, vehicle: &Vehicle, pitch: f32) -> CameraPose {
        let pos = vehicle.position;
        let forward = vehicle.forward();
        let (height, length) = (vehicle.size.y, vehicle.size.z);

        match self.mode {
            CameraMode::Follow => {
                let dist = (CAMERA_DISTANCE * 1.4).max(length * 1.3);
                let eye = pos - forward * dist;
                let look = pos + forward * 2.4f32.max(length * 0.75);
                CameraPose {
                    eye: Vec3::new(eye.x, pos.y + 1.2f32.max(height * 0.8) + height * 0.32, eye.z),
                    target: Vec3::new(look.x, pos.y + LOOK_HEIGHT + pitch.sin() * PITCH_LOOK, look.z),
                }
            }
            CameraMode::Cockpit => {
                let eye = pos + forward * 0.15;
                let look = pos + forward * 2.2f32.max(length * 0.6);
                CameraPose {
                    eye: Vec3::new(eye.x, pos.y + height * 0.72, eye.z),
                    target: Vec3::new(look.x, pos.y + height * 0.68, look.z),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::PhysicsWorld;
    use crate::game::vehicles::{VehicleKind, VehicleSystem};
    use crate::game::world::ParkedSpot;

    fn parked(kind: VehicleKind, length: f32) -> Vehicle {
        let mut physics = PhysicsWorld::new();
        let mut system = VehicleSystem::new(468.0);
        system.spawn_fleet(
            &mut physics,
            &[ParkedSpot {
                kind,
                x: 0.0,
                z: 0.0,
                heading: 0.0,
                length,
                emergency: None,
            }],
            false,
        );
        system.fleet.remove(0)
    }

    #[test]
    fn on_foot_camera_trails_the_player() {
        let pose = CameraRig::on_foot(Vec3::new(0.0, 0.94, 10.0), Vec3::Z, 0.0);
        assert!((pose.eye.z - (10.0 - CAMERA_DISTANCE)).abs() < 1e-5);
        assert!((pose.eye.y - (0.94 + EYE_HEIGHT)).abs() < 1e-5);
        assert!(pose.aim().z > 0.9);

        let down = CameraRig::on_foot(Vec3::new(0.0, 0.94, 10.0), Vec3::Z, -0.5);
        assert!(down.aim().y < pose.aim().y);
    }

    #[test]
    fn follow_distance_scales_with_vehicle_length() {
        let rig = CameraRig::default();
        let bike = rig.for_vehicle(&parked(VehicleKind::Motorcycle, 2.4), 0.0);
        let bus = rig.for_vehicle(&parked(VehicleKind::Bus, 9.2), 0.0);
        // heading 0 faces +x, so the camera sits on -x
        assert!((bike.eye.x + CAMERA_DISTANCE * 1.4).abs() < 1e-4);
        assert!((bus.eye.x + 9.2 * 1.3).abs() < 1e-4);
        assert!(bus.eye.y > bike.eye.y);
    }

    #[test]
    fn cockpit_sits_inside_the_vehicle() {
        let mut rig = CameraRig::default();
        assert_eq!(rig.toggle(), CameraMode::Cockpit);
        let car = parked(VehicleKind::Car, 4.6);
        let pose = rig.for_vehicle(&car, 0.0);
        assert!((pose.eye.x - 0.15).abs() < 1e-5);
        assert!(pose.eye.y < car.position.y + car.size.y);
        assert!(pose.aim().x > 0.9);
    }

    #[test]
    fn degenerate_pose_aims_forward() {
        let pose = CameraPose {
            eye: Vec3::ONE,
            target: Vec3::ONE,
        };
        assert_eq!(pose.aim(), Vec3::Z);
    }
}
