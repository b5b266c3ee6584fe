//! Per-session simulation state and the frame driver
//!
//! `SimulationState` owns everything one session simulates. It is created
//! once by `bootstrap`, advanced by `frame` from the session task and dropped
//! with the session. Nothing else holds a reference to it.

use glam::Vec3;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::time::clamp_delta;
use crate::ws::protocol::{GameEvent, Outcome};

use super::armory::WeaponKind;
use super::camera::{CameraPose, CameraRig};
use super::combat::{Arsenal, CombatSystem, FireOutcome, Grenade};
use super::effects::Effects;
use super::enemy::{Enemy, EnemyAI, MAX_ENEMIES};
use super::physics::{max_sub_steps, PhysicsWorld, PHYSICS_STEP};
use super::pickups::{self, WeaponPickup, AUTO_COLLECT_RADIUS, PICK_RADIUS};
use super::player::Player;
use super::quality::QualityController;
use super::vehicles::{VehicleSystem, TRAFFIC_COUNT};
use super::world::{WorldBuilder, WorldError, WorldGrid, WorldState};
use super::{Action, FrameInput};

/// Coarse bootstrap milestones, in order
pub mod phase {
    pub const BOOT: &str = "boot";
    pub const TEXTURES_READY: &str = "textures-ready";
    pub const WORLD_READY: &str = "world-ready";
    pub const AFTER_EMERGENCY: &str = "after-emergency";
    pub const AFTER_COMMONS: &str = "after-commons";
    pub const AFTER_TRAFFIC: &str = "after-traffic";
    pub const READY: &str = "ready";
    pub const ENDED: &str = "ended";
}

/// Enemies for an entrant count: everybody but the player, within the cap
pub fn enemy_count(entrants: u32) -> usize {
    (entrants.saturating_sub(1) as usize).clamp(1, MAX_ENEMIES)
}

pub struct SimulationState {
    pub id: Uuid,
    pub seed: u64,
    pub rng: ChaCha8Rng,
    pub physics: PhysicsWorld,
    pub world: WorldState,
    pub player: Player,
    pub arsenal: Arsenal,
    pub enemies: Vec<Enemy>,
    pub grenades: Vec<Grenade>,
    pub pickups: Vec<WeaponPickup>,
    pub effects: Effects,
    pub vehicles: VehicleSystem,
    pub camera: CameraRig,
    /// Camera pose the current frame aims and renders with
    pub view: CameraPose,
    pub quality: QualityController,
    pub frame: u64,
    /// Simulated seconds
    pub elapsed: f32,
    pub outcome: Option<Outcome>,
}

impl SimulationState {
    /// Build the city, park the fleet, start traffic and spawn the round.
    /// `report` receives each lifecycle milestone as it is reached.
    pub fn bootstrap(
        id: Uuid,
        seed: u64,
        entrants: u32,
        mut report: impl FnMut(&'static str),
    ) -> Result<Self, BootstrapError> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut physics = PhysicsWorld::new();

        let world = WorldBuilder::new(WorldGrid::default(), &mut physics, &mut rng, WeaponKind::ALL.len())
            .generate()?;
        report(phase::WORLD_READY);

        let mut vehicles = VehicleSystem::new(world.ring_radius);
        vehicles.install_signals(&world.traffic_lights);
        let units = vehicles.spawn_fleet(&mut physics, &world.parked, true);
        report(phase::AFTER_EMERGENCY);
        let commons = vehicles.spawn_fleet(&mut physics, &world.parked, false);
        report(phase::AFTER_COMMONS);
        vehicles.spawn_traffic(TRAFFIC_COUNT, &mut rng);
        report(phase::AFTER_TRAFFIC);

        let player = Player::spawn(&mut physics);
        let pickups = pickups::scatter(&world.spawns.pickups, &mut rng);
        let position = physics.body(player.body).map(|b| b.position).unwrap_or(Vec3::ZERO);
        let view = CameraRig::on_foot(position, player.forward(), player.pitch);

        let mut state = Self {
            id,
            seed,
            rng,
            physics,
            world,
            player,
            arsenal: Arsenal::new(),
            enemies: Vec::new(),
            grenades: Vec::new(),
            pickups,
            effects: Effects::new(),
            vehicles,
            camera: CameraRig::default(),
            view,
            quality: QualityController::default(),
            frame: 0,
            elapsed: 0.0,
            outcome: None,
        };

        let wanted = enemy_count(entrants);
        let spawned = EnemyAI::spawn_round(&mut state, wanted);
        if spawned == 0 {
            return Err(BootstrapError::NoEnemies);
        }

        info!(
            session_id = %id,
            seed,
            enemies = spawned,
            emergency_units = units,
            parked = commons,
            pickups = state.pickups.len(),
            "Simulation ready"
        );
        report(phase::READY);
        Ok(state)
    }

    /// Advance one display frame. `elapsed` is the raw wall-clock delta; the
    /// simulation itself never steps more than the clamped delta.
    pub fn frame(&mut self, elapsed: f32, input: &FrameInput) -> Result<Vec<GameEvent>, FrameError> {
        let mut events = Vec::new();
        if self.outcome.is_some() {
            return Ok(events);
        }
        let dt = clamp_delta(elapsed);
        self.frame += 1;
        self.elapsed += dt;

        if let Some(change) = self.quality.record_frame(elapsed) {
            events.push(GameEvent::QualityChanged {
                fps: change.fps,
                settings: change.settings,
                boost: change.boost,
            });
        }

        self.player.look(input.look);
        for &action in &input.actions {
            self.apply_action(action, &mut events)?;
        }

        let driving = self.vehicles.drive.vehicle.is_some();
        if driving {
            // the trigger doubles as the accelerator behind the wheel
            let throttle = if input.trigger { 1.0 } else { input.movement.y };
            self.vehicles
                .drive(throttle, input.movement.x, dt, &mut self.physics, self.player.body);
        } else if self.player.ladder.is_some() {
            self.player
                .climb(&mut self.physics, &self.world.ladders, input.movement.y, dt);
        } else {
            self.player.walk(&mut self.physics, input.movement);
        }

        self.view = self.compute_view()?;
        if !driving {
            let rounds = self.arsenal.pull_trigger(input.trigger_down(), dt);
            for _ in 0..rounds {
                if matches!(
                    CombatSystem::fire(self, &mut events),
                    FireOutcome::Dry | FireOutcome::Reloading
                ) {
                    break;
                }
            }
        }
        if let Some(done) = self.arsenal.update_reload(dt) {
            events.push(GameEvent::ReloadFinished {
                weapon: done.weapon,
                mag: done.slot.mag,
                reserve: done.slot.reserve,
            });
        }

        self.physics.step(PHYSICS_STEP, dt, max_sub_steps(dt));

        EnemyAI::update(self, dt, &mut events)?;
        CombatSystem::update_grenades(self, dt, &mut events)?;

        self.vehicles.update_signals(dt);
        self.vehicles.update_traffic(dt);
        self.vehicles.update_emergency(dt, &mut self.physics);

        pickups::spin(&mut self.pickups, dt);
        if !driving {
            self.collect_pickup(AUTO_COLLECT_RADIUS, &mut events)?;
        }
        self.effects.update(dt);

        self.view = self.compute_view()?;
        self.settle_outcome();
        Ok(events)
    }

    fn apply_action(&mut self, action: Action, events: &mut Vec<GameEvent>) -> Result<(), FrameError> {
        let driving = self.vehicles.drive.vehicle.is_some();
        match action {
            Action::Reload => {
                if let Some(seconds) = self.arsenal.reload() {
                    events.push(GameEvent::ReloadStarted {
                        weapon: self.arsenal.selected(),
                        seconds,
                    });
                }
            }
            Action::Jump => {
                if self.player.ladder.is_some() {
                    self.player.release_ladder(&mut self.physics);
                } else if !driving {
                    self.player.jump(&mut self.physics);
                }
            }
            Action::ThrowGrenade => {
                if !driving {
                    CombatSystem::throw_from_belt(self, events);
                }
            }
            Action::ToggleVehicle => {
                if driving {
                    if let Some(vehicle_id) = self.vehicles.exit(&mut self.physics, self.player.body) {
                        let position = self.player.position(&self.physics).unwrap_or(Vec3::ZERO);
                        events.push(GameEvent::VehicleExited { vehicle_id, position });
                    }
                } else if self.player.ladder.is_none() {
                    if let Some(vehicle_id) = self.vehicles.enter(&mut self.physics, self.player.body) {
                        debug!(session_id = %self.id, %vehicle_id, "Vehicle entered");
                        events.push(GameEvent::VehicleEntered { vehicle_id });
                    }
                }
            }
            Action::ToggleLadder => {
                if self.player.ladder.is_some() {
                    self.player.release_ladder(&mut self.physics);
                } else if !driving {
                    self.player.grab_ladder(&mut self.physics, &self.world.ladders);
                }
            }
            Action::PickUp => {
                if !driving {
                    self.collect_pickup(PICK_RADIUS, events)?;
                }
            }
            Action::SelectWeapon(weapon) => {
                if self.arsenal.selected() != weapon && self.arsenal.select(weapon) {
                    events.push(GameEvent::WeaponSelected { weapon });
                }
            }
            Action::ToggleFireMode => {
                self.arsenal.toggle_fire_mode();
            }
            Action::ToggleCamera => {
                let mode = self.camera.toggle();
                events.push(GameEvent::CameraChanged { mode });
            }
        }
        Ok(())
    }

    fn collect_pickup(&mut self, radius: f32, events: &mut Vec<GameEvent>) -> Result<(), FrameError> {
        let position = self
            .player
            .position(&self.physics)
            .ok_or(FrameError::MissingBody("player"))?;
        if let Some((pickup, slot)) = pickups::collect(&mut self.pickups, &mut self.arsenal, position, radius) {
            events.push(GameEvent::PickupCollected {
                pickup_id: pickup.id,
                weapon: pickup.weapon,
                mag: slot.mag,
                reserve: slot.reserve,
            });
        }
        Ok(())
    }

    /// Camera pose for the current pose of the player or the driven vehicle
    fn compute_view(&self) -> Result<CameraPose, FrameError> {
        if let Some(vehicle) = self.vehicles.driven() {
            return Ok(self.camera.for_vehicle(vehicle, self.player.pitch));
        }
        let position = self
            .player
            .position(&self.physics)
            .ok_or(FrameError::MissingBody("player"))?;
        if !position.is_finite() {
            return Err(FrameError::NonFinite("player position"));
        }
        Ok(CameraRig::on_foot(position, self.player.forward(), self.player.pitch))
    }

    /// Damage the player, clamping hp at zero
    pub fn hurt_player(&mut self, amount: f32, lucky: bool, events: &mut Vec<GameEvent>) {
        if !self.player.is_alive() || amount <= 0.0 {
            return;
        }
        let dealt = amount.min(self.player.hp);
        self.player.hp -= dealt;
        self.player.damage_taken += dealt;
        events.push(GameEvent::PlayerHit {
            damage: dealt,
            hp: self.player.hp,
            lucky,
        });
    }

    fn settle_outcome(&mut self) {
        if self.outcome.is_some() {
            return;
        }
        self.outcome = if !self.player.is_alive() {
            Some(Outcome::Defeat)
        } else if EnemyAI::active_count(&self.enemies) == 0 {
            Some(Outcome::Victory)
        } else {
            None
        };
        if let Some(outcome) = self.outcome {
            info!(session_id = %self.id, ?outcome, frame = self.frame, "Session decided");
        }
    }

    /// Entrants still standing, the player included
    pub fn entrants_alive(&self) -> usize {
        EnemyAI::active_count(&self.enemies) + usize::from(self.player.is_alive())
    }
}

/// Failure to bring a session up; surfaced to the client once
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("World generation failed: {0}")]
    World(#[from] WorldError),

    #[error("No enemy could be spawned")]
    NoEnemies,
}

/// An error escaping one frame. The session logs it and keeps running.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Physics body missing for {0}")]
    MissingBody(&'static str),

    #[error("Non-finite value in {0}")]
    NonFinite(&'static str),
}

/// Fixtures for driving combat and AI against a real bootstrapped round
#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Open ground well outside the city
    pub const FIELD: Vec3 = Vec3::new(2000.0, 0.0, 0.0);

    /// A bootstrapped round with every enemy parked far from `FIELD`
    pub fn arena(seed: u64) -> SimulationState {
        let mut state = SimulationState::bootstrap(Uuid::new_v4(), seed, 9, |_| {}).expect("bootstrap");
        for i in 0..state.enemies.len() {
            place_enemy(&mut state, i, Vec3::new(-3000.0, 0.0, i as f32 * 40.0));
        }
        state
    }

    /// Stand enemy `index` with its feet on `ground`
    pub fn place_enemy(state: &mut SimulationState, index: usize, ground: Vec3) {
        let handle = state.enemies[index].body;
        let body = state.physics.body_mut(handle).expect("enemy body");
        body.position = ground + Vec3::Y * body.shape.half_height();
        body.velocity = Vec3::ZERO;
    }

    pub fn place_player(state: &mut SimulationState, ground: Vec3) {
        let handle = state.player.body;
        let body = state.physics.body_mut(handle).expect("player body");
        body.position = ground + Vec3::Y * body.shape.half_height();
        body.velocity = Vec3::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enemy_count_leaves_room_for_the_player() {
        assert_eq!(enemy_count(9), 8);
        assert_eq!(enemy_count(0), 1);
        assert_eq!(enemy_count(1), 1);
        assert_eq!(enemy_count(40), MAX_ENEMIES);
    }
}
