//! Render frame building
//!
//! The client only draws; everything it needs for a frame is captured here
//! as a read-only draw list.

use glam::Vec3;
use serde::Serialize;
use uuid::Uuid;

use crate::ws::protocol::GameEvent;

use super::armory::WeaponKind;
use super::camera::{CameraMode, CameraPose};
use super::combat::{AmmoSlot, FireMode};
use super::effects::Effects;
use super::enemy::CharacterModel;
use super::pickups::WeaponPickup;
use super::quality::QualitySettings;
use super::state::SimulationState;
use super::vehicles::{EmergencyState, SignalPhase, VehicleKind};

#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub hp: f32,
    pub weapon: WeaponKind,
    pub fire_mode: FireMode,
    pub ammo: AmmoSlot,
    pub reloading: bool,
    pub unlocked: Vec<WeaponKind>,
    pub driving: Option<Uuid>,
    pub climbing: bool,
    pub kills: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnemyView {
    pub id: Uuid,
    pub model: CharacterModel,
    pub weapon: WeaponKind,
    /// Feet position
    pub position: Vec3,
    pub hp: f32,
    pub dead: bool,
    pub tilt: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleView {
    pub id: Uuid,
    pub kind: VehicleKind,
    pub position: Vec3,
    pub heading: f32,
    pub size: Vec3,
    pub emergency: Option<EmergencyState>,
    pub siren: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct GrenadeView {
    pub id: Uuid,
    pub position: Vec3,
    pub fuse: f32,
}

/// Everything the client draws for one frame
#[derive(Debug, Clone, Serialize)]
pub struct RenderFrame {
    pub frame: u64,
    pub elapsed: f32,
    /// Last input sequence folded into this frame
    pub input_seq: u32,
    pub camera: CameraPose,
    pub camera_mode: CameraMode,
    pub player: PlayerView,
    pub enemies: Vec<EnemyView>,
    pub vehicles: Vec<VehicleView>,
    pub traffic: Vec<VehicleView>,
    pub signals: Vec<SignalPhase>,
    pub grenades: Vec<GrenadeView>,
    pub pickups: Vec<WeaponPickup>,
    pub effects: Effects,
    pub quality: QualitySettings,
    /// Events since the previous frame that was sent
    pub events: Vec<GameEvent>,
}

impl RenderFrame {
    pub fn capture(state: &SimulationState, input_seq: u32, events: Vec<GameEvent>) -> Self {
        let physics = &state.physics;
        let weapon = state.arsenal.selected();

        let player = PlayerView {
            position: state.player.position(physics).unwrap_or(Vec3::ZERO),
            yaw: state.player.yaw,
            pitch: state.player.pitch,
            hp: state.player.hp,
            weapon,
            fire_mode: state.arsenal.fire_mode(weapon),
            ammo: state.arsenal.slot(weapon),
            reloading: state.arsenal.is_reloading(),
            unlocked: state.arsenal.unlocked(),
            driving: state.vehicles.drive.vehicle,
            climbing: state.player.ladder.is_some(),
            kills: state.player.kills,
        };

        let enemies = state
            .enemies
            .iter()
            .filter_map(|e| {
                let body = physics.body(e.body)?;
                Some(EnemyView {
                    id: e.id,
                    model: e.model,
                    weapon: e.weapon,
                    position: body.feet(),
                    hp: e.hp,
                    dead: e.dead,
                    tilt: e.tilt(),
                })
            })
            .collect();

        let vehicles = state
            .vehicles
            .fleet
            .iter()
            .map(|v| VehicleView {
                id: v.id,
                kind: v.kind,
                position: v.position,
                heading: v.heading,
                size: v.size,
                emergency: v.unit.as_ref().map(|u| u.state),
                siren: v.unit.as_ref().map_or(0.0, |u| u.siren()),
            })
            .collect();

        let traffic = state
            .vehicles
            .traffic
            .iter()
            .map(|c| VehicleView {
                id: c.id,
                kind: c.kind,
                position: c.position(),
                heading: c.heading(),
                size: c.kind.dimensions(c.length),
                emergency: None,
                siren: 0.0,
            })
            .collect();

        let grenades = state
            .grenades
            .iter()
            .filter_map(|g| {
                Some(GrenadeView {
                    id: g.id,
                    position: physics.body(g.body)?.position,
                    fuse: g.fuse.remaining(),
                })
            })
            .collect();

        Self {
            frame: state.frame,
            elapsed: state.elapsed,
            input_seq,
            camera: state.view,
            camera_mode: state.camera.mode,
            player,
            enemies,
            vehicles,
            traffic,
            signals: state.vehicles.lights.iter().map(|l| l.phase).collect(),
            grenades,
            pickups: state.pickups.clone(),
            effects: state.effects.clone(),
            quality: state.quality.settings(),
            events,
        }
    }
}

/// Decides which frames are sent and carries events across skipped ones
pub struct SnapshotBuilder {
    /// Frame counter since last snapshot
    frames_since_snapshot: u32,
    /// Snapshot interval in frames
    snapshot_interval: u32,
    pending: Vec<GameEvent>,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            frames_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
            pending: Vec::new(),
        }
    }

    /// Queue events produced by a frame
    pub fn record(&mut self, events: Vec<GameEvent>) {
        self.pending.extend(events);
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.frames_since_snapshot += 1;
        if self.frames_since_snapshot >= self.snapshot_interval {
            self.frames_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (used for important events)
    pub fn force_next(&mut self) {
        self.frames_since_snapshot = self.snapshot_interval;
    }

    /// Build a frame carrying every event queued since the last one
    pub fn build(&mut self, state: &SimulationState, input_seq: u32) -> RenderFrame {
        RenderFrame::capture(state, input_seq, std::mem::take(&mut self.pending))
    }

    pub fn pending_events(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit() -> GameEvent {
        GameEvent::PlayerHit {
            damage: 1.0,
            hp: 99.0,
            lucky: false,
        }
    }

    #[test]
    fn sends_every_interval() {
        let mut builder = SnapshotBuilder::new(2);
        assert!(!builder.should_send());
        assert!(builder.should_send());
        assert!(!builder.should_send());
        builder.force_next();
        assert!(builder.should_send());
    }

    #[test]
    fn zero_interval_sends_every_frame() {
        let mut builder = SnapshotBuilder::new(0);
        assert!(builder.should_send());
        assert!(builder.should_send());
    }

    #[test]
    fn events_queue_until_built() {
        let mut builder = SnapshotBuilder::new(3);
        builder.record(vec![hit()]);
        builder.record(vec![hit(), hit()]);
        assert_eq!(builder.pending_events(), 3);
    }
}
