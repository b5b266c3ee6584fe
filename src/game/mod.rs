//! Game simulation modules

pub mod armory;
pub mod camera;
pub mod combat;
pub mod effects;
pub mod enemy;
pub mod physics;
pub mod pickups;
pub mod player;
pub mod quality;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod vehicles;
pub mod world;

pub use session::{GameSession, SessionHandle, SessionParams, SessionRegistry, SessionStatus};
pub use state::{BootstrapError, FrameError, SimulationState};

use glam::Vec2;

use crate::ws::protocol::ClientMsg;
use armory::WeaponKind;

/// A discrete player request, applied once at the start of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Reload,
    Jump,
    ThrowGrenade,
    ToggleVehicle,
    ToggleLadder,
    PickUp,
    SelectWeapon(WeaponKind),
    ToggleFireMode,
    ToggleCamera,
}

/// Input state for a single frame, folded from every message received since
/// the previous one
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    pub seq: u32,
    /// `x` strafes, `y` moves forward (or throttles while driving)
    pub movement: Vec2,
    /// Accumulated aim delta in radians
    pub look: Vec2,
    pub trigger: bool,
    /// Set by any message with the trigger down since the last frame, so a
    /// tap released before the frame still fires
    pub pressed: bool,
    pub actions: Vec<Action>,
}

impl FrameInput {
    /// Fold one client message in. Returns false for messages that are not
    /// frame input.
    pub fn apply(&mut self, msg: &ClientMsg) -> bool {
        let action = match *msg {
            ClientMsg::Input {
                seq,
                move_x,
                move_y,
                look_x,
                look_y,
                trigger,
            } => {
                self.seq = self.seq.max(seq);
                self.movement = sanitize(Vec2::new(move_x, move_y)).clamp_length_max(1.0);
                self.look += sanitize(Vec2::new(look_x, look_y));
                self.trigger = trigger;
                self.pressed |= trigger;
                return true;
            }
            ClientMsg::Reload => Action::Reload,
            ClientMsg::Jump => Action::Jump,
            ClientMsg::ThrowGrenade => Action::ThrowGrenade,
            ClientMsg::ToggleVehicle => Action::ToggleVehicle,
            ClientMsg::ToggleLadder => Action::ToggleLadder,
            ClientMsg::PickUp => Action::PickUp,
            ClientMsg::SelectWeapon { weapon } => Action::SelectWeapon(weapon),
            ClientMsg::ToggleFireMode => Action::ToggleFireMode,
            ClientMsg::ToggleCamera => Action::ToggleCamera,
            ClientMsg::Ping { .. } | ClientMsg::Leave => return false,
        };
        self.actions.push(action);
        true
    }

    /// Clear the one-shot parts; movement and trigger persist until the next
    /// input message
    pub fn consume(&mut self) -> FrameInput {
        let taken = self.clone();
        self.look = Vec2::ZERO;
        self.pressed = false;
        self.actions.clear();
        taken
    }

    /// Trigger state the weapon sees this frame
    pub fn trigger_down(&self) -> bool {
        self.trigger || self.pressed
    }
}

fn sanitize(v: Vec2) -> Vec2 {
    if v.is_finite() {
        v
    } else {
        Vec2::ZERO
    }
}
