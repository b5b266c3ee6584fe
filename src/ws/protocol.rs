//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::assets::AssetManifest;
use crate::game::armory::WeaponKind;
use crate::game::camera::CameraMode;
use crate::game::quality::QualitySettings;
use crate::game::snapshot::RenderFrame;
use crate::game::world::WorldState;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Continuous input, sent every display frame
    Input {
        /// Sequence number echoed back in frames
        seq: u32,
        /// Strafe (-1.0 = left, 1.0 = right)
        #[serde(default)]
        move_x: f32,
        /// Forward (-1.0 = back, 1.0 = forward); throttle while driving
        #[serde(default)]
        move_y: f32,
        /// Yaw delta in radians
        #[serde(default)]
        look_x: f32,
        /// Pitch delta in radians
        #[serde(default)]
        look_y: f32,
        /// Trigger held this frame
        #[serde(default)]
        trigger: bool,
    },

    Reload,
    Jump,
    ThrowGrenade,
    /// Enter the nearest vehicle, or leave the current one
    ToggleVehicle,
    /// Grab the nearest ladder, or let go
    ToggleLadder,
    /// Take the nearest weapon pickup in reach
    PickUp,
    SelectWeapon {
        weapon: WeaponKind,
    },
    ToggleFireMode,
    ToggleCamera,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// End the session early
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// First message on a new connection
    Welcome {
        session_id: Uuid,
        seed: u64,
        entrants: u32,
        server_time: u64,
        /// Cosmetic stake shown on the HUD
        stake: Option<Stake>,
    },

    /// Lifecycle milestone of the session
    Phase {
        phase: String,
    },

    /// Static city, sent once after bootstrap, with the model keys the
    /// client must draw as placeholders
    World {
        world: Box<WorldState>,
        assets: AssetManifest,
    },

    /// Render-ready scene for one frame
    Frame(Box<RenderFrame>),

    /// Session has ended
    SessionEnd {
        outcome: Outcome,
        stats: SessionStats,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// HUD-only stake passed in the connection query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stake {
    pub token: String,
    pub amount: f64,
}

/// How a session finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every enemy is down
    Victory,
    /// The player is down
    Defeat,
    /// The client left or the server stopped the session
    Abandoned,
}

/// Game events (damage, kills, etc.)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// A hitscan round was fired, by the player or an enemy
    ShotFired {
        weapon: WeaponKind,
        from: Vec3,
        to: Vec3,
        hostile: bool,
    },

    GrenadeThrown {
        grenade_id: Uuid,
        position: Vec3,
    },

    Explosion {
        position: Vec3,
        radius: f32,
    },

    EmergencyDispatched {
        position: Vec3,
        units: usize,
    },

    EnemyHit {
        enemy_id: Uuid,
        damage: f32,
        headshot: bool,
        hp: f32,
    },

    /// Enemy knocked down for good; `drop` is the weapon pickup it left
    EnemyDown {
        enemy_id: Uuid,
        position: Vec3,
        drop: Uuid,
    },

    PlayerHit {
        damage: f32,
        hp: f32,
        lucky: bool,
    },

    ReloadStarted {
        weapon: WeaponKind,
        seconds: f32,
    },

    ReloadFinished {
        weapon: WeaponKind,
        mag: u32,
        reserve: u32,
    },

    WeaponSelected {
        weapon: WeaponKind,
    },

    PickupCollected {
        pickup_id: Uuid,
        weapon: WeaponKind,
        mag: u32,
        reserve: u32,
    },

    VehicleEntered {
        vehicle_id: Uuid,
    },

    VehicleExited {
        vehicle_id: Uuid,
        position: Vec3,
    },

    CameraChanged {
        mode: CameraMode,
    },

    QualityChanged {
        fps: u32,
        settings: QualitySettings,
        boost: bool,
    },
}

/// Session statistics at end
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    pub duration_secs: u32,
    pub frames: u64,
    pub entrants: u32,
    pub enemies_down: u32,
    pub kills: u32,
    pub shots_fired: u32,
    pub shots_hit: u32,
    pub damage_taken: f32,
    /// 1 for the last one standing
    pub placement: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_fields_default_when_missing() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"input","seq":4,"move_y":1.0}"#).unwrap();
        match msg {
            ClientMsg::Input {
                seq,
                move_x,
                move_y,
                trigger,
                ..
            } => {
                assert_eq!(seq, 4);
                assert_eq!(move_x, 0.0);
                assert_eq!(move_y, 1.0);
                assert!(!trigger);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn actions_are_unit_variants() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"toggle_vehicle"}"#).unwrap();
        assert!(matches!(msg, ClientMsg::ToggleVehicle));
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"select_weapon","weapon":"SniperAWP"}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMsg::SelectWeapon {
                weapon: WeaponKind::SniperAwp
            }
        ));
    }

    #[test]
    fn events_are_tagged_by_event_type() {
        let json = serde_json::to_value(GameEvent::PlayerHit {
            damage: 12.0,
            hp: 88.0,
            lucky: false,
        })
        .unwrap();
        assert_eq!(json["event_type"], "player_hit");
        assert_eq!(json["hp"], 88.0);
    }
}
