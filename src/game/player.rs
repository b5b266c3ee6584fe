//! The human player's body, look angles, walking, jumping and ladders

use std::f32::consts::PI;

use glam::{Vec2, Vec3};
use serde::Serialize;

use super::physics::{BodyHandle, Material, PhysicsWorld, RigidBody};
use super::vehicles::MOVE_SPEED_MULT;
use super::world::Ladder;

pub const PLAYER_MAX_HP: f32 = 100.0;
pub const PLAYER_RADIUS: f32 = 0.32;
const PLAYER_MASS: f32 = 72.0;
const PLAYER_DAMPING: f32 = 0.18;
pub const PLAYER_START: Vec3 = Vec3::new(0.0, 0.94, 10.0);

pub const WALK_SPEED: f32 = 4.8 * MOVE_SPEED_MULT;
pub const RUN_SPEED: f32 = 7.2 * MOVE_SPEED_MULT;
/// Stick deflection past which walking turns into running
const RUN_THRESHOLD: f32 = 0.9;
const JUMP_SPEED: f32 = 5.2;
const GROUNDED_HEIGHT: f32 = 0.34;

pub const PITCH_LIMIT: f32 = PI * 0.49;
const INITIAL_PITCH: f32 = -PI * 0.08;

/// Distance from a ladder base within which the player can grab it
pub const LADDER_REACH: f32 = 1.2;
const CLIMB_SPEED: f32 = 2.6 * MOVE_SPEED_MULT;
const LADDER_FOOT: f32 = 0.6;
const LADDER_OVERSHOOT: f32 = 1.1;
const ROOF_EXIT: f32 = 0.95;
const ROOF_STEP: f32 = 1.1;

#[derive(Debug, Clone, Serialize)]
pub struct Player {
    #[serde(skip)]
    pub body: BodyHandle,
    pub hp: f32,
    pub yaw: f32,
    pub pitch: f32,
    /// Index into the world's ladders while climbing
    pub ladder: Option<usize>,
    pub shots_fired: u32,
    pub shots_hit: u32,
    pub kills: u32,
    pub damage_taken: f32,
}

impl Player {
    pub fn spawn(physics: &mut PhysicsWorld) -> Self {
        let body = RigidBody::sphere(PLAYER_RADIUS, PLAYER_MASS, PLAYER_START, Material::Player)
            .with_damping(PLAYER_DAMPING);
        Self {
            body: physics.add_body(body),
            hp: PLAYER_MAX_HP,
            yaw: 0.0,
            pitch: INITIAL_PITCH,
            ladder: None,
            shots_fired: 0,
            shots_hit: 0,
            kills: 0,
            damage_taken: 0.0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0.0
    }

    /// Flat facing from the yaw
    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    pub fn right(&self) -> Vec3 {
        Vec3::new(self.yaw.cos(), 0.0, -self.yaw.sin())
    }

    /// Apply an aim delta in radians
    pub fn look(&mut self, delta: Vec2) {
        if !delta.is_finite() {
            return;
        }
        self.yaw = (self.yaw + delta.x) % (PI * 2.0);
        self.pitch = (self.pitch + delta.y).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn position(&self, physics: &PhysicsWorld) -> Option<Vec3> {
        physics.body(self.body).map(|b| b.position)
    }

    pub fn is_grounded(&self, physics: &PhysicsWorld) -> bool {
        physics
            .body(self.body)
            .is_some_and(|b| b.position.y < GROUNDED_HEIGHT && b.velocity.y.abs() < 0.05)
    }

    /// Set the horizontal velocity from a move vector (`x` strafes, `y` goes
    /// forward). Vertical velocity is left to gravity.
    pub fn walk(&self, physics: &mut PhysicsWorld, movement: Vec2) {
        let movement = if movement.is_finite() {
            movement.clamp_length_max(1.0)
        } else {
            Vec2::ZERO
        };
        let speed = if movement.length() > RUN_THRESHOLD {
            RUN_SPEED
        } else {
            WALK_SPEED
        };
        let v = (self.forward() * movement.y + self.right() * movement.x) * speed;
        if let Some(body) = physics.body_mut(self.body) {
            body.velocity.x = v.x;
            body.velocity.z = v.z;
        }
    }

    /// Jump when standing on the ground. Returns whether the jump happened.
    pub fn jump(&self, physics: &mut PhysicsWorld) -> bool {
        if !self.is_grounded(physics) {
            return false;
        }
        match physics.body_mut(self.body) {
            Some(body) => {
                body.velocity.y = JUMP_SPEED;
                true
            }
            None => false,
        }
    }

    /// Grab the nearest ladder within reach. The body stops simulating while
    /// it climbs.
    pub fn grab_ladder(&mut self, physics: &mut PhysicsWorld, ladders: &[Ladder]) -> Option<usize> {
        if self.ladder.is_some() {
            return self.ladder;
        }
        let body = physics.body_mut(self.body)?;
        let (index, ladder) = ladders
            .iter()
            .enumerate()
            .map(|(i, l)| (i, l, flat_distance(l.base, body.position)))
            .filter(|&(_, _, d)| d < LADDER_REACH)
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(i, l, _)| (i, l))?;

        body.velocity = Vec3::ZERO;
        body.enabled = false;
        body.position.x = ladder.base.x;
        body.position.z = ladder.base.z;
        body.position.y = body.position.y.max(ladder.base.y + LADDER_FOOT);
        self.ladder = Some(index);
        Some(index)
    }

    pub fn release_ladder(&mut self, physics: &mut PhysicsWorld) {
        if self.ladder.take().is_none() {
            return;
        }
        if let Some(body) = physics.body_mut(self.body) {
            body.enabled = true;
            body.velocity = Vec3::ZERO;
        }
    }

    /// Move along the ladder. Climbing past the top steps onto the roof and
    /// climbing down past the foot lets go.
    pub fn climb(&mut self, physics: &mut PhysicsWorld, ladders: &[Ladder], input: f32, dt: f32) {
        let Some(ladder) = self.ladder.and_then(|i| ladders.get(i)).copied() else {
            self.release_ladder(physics);
            return;
        };
        let input = if input.is_finite() { input.clamp(-1.0, 1.0) } else { 0.0 };
        let forward = self.forward();
        let Some(body) = physics.body_mut(self.body) else {
            return;
        };

        let floor = ladder.base.y + LADDER_FOOT;
        let y = (body.position.y + input * CLIMB_SPEED * dt).clamp(floor, ladder.top + LADDER_OVERSHOOT);
        body.position = Vec3::new(ladder.base.x, y, ladder.base.z);
        body.velocity = Vec3::ZERO;

        if y >= ladder.top + ROOF_EXIT && input > 0.1 {
            body.position.y = ladder.top + 1.0;
            body.position += forward * ROOF_STEP;
            self.release_ladder(physics);
        } else if y <= floor && input < -0.1 {
            self.release_ladder(physics);
        }
    }
}

fn flat_distance(a: Vec3, b: Vec3) -> f32 {
    ((a.x - b.x).powi(2) + (a.z - b.z).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> Ladder {
        Ladder {
            building: 0,
            base: Vec3::new(0.0, 0.0, 9.5),
            top: 20.0,
        }
    }

    #[test]
    fn spawns_upright_with_full_health() {
        let mut physics = PhysicsWorld::new();
        let player = Player::spawn(&mut physics);
        assert_eq!(player.hp, PLAYER_MAX_HP);
        assert_eq!(player.position(&physics), Some(PLAYER_START));
        assert!((player.pitch - INITIAL_PITCH).abs() < 1e-6);
        assert!(player.is_alive());
    }

    #[test]
    fn pitch_is_clamped() {
        let mut physics = PhysicsWorld::new();
        let mut player = Player::spawn(&mut physics);
        player.look(Vec2::new(0.3, 10.0));
        assert_eq!(player.pitch, PITCH_LIMIT);
        player.look(Vec2::new(0.0, -20.0));
        assert_eq!(player.pitch, -PITCH_LIMIT);
        player.look(Vec2::new(f32::NAN, 0.0));
        assert!((player.yaw - 0.3).abs() < 1e-6);
    }

    #[test]
    fn full_stick_runs() {
        let mut physics = PhysicsWorld::new();
        let player = Player::spawn(&mut physics);
        player.walk(&mut physics, Vec2::new(0.0, 0.5));
        assert!((physics.body(player.body).unwrap().velocity.z - WALK_SPEED * 0.5).abs() < 1e-4);
        player.walk(&mut physics, Vec2::new(0.0, 1.0));
        assert!((physics.body(player.body).unwrap().velocity.z - RUN_SPEED).abs() < 1e-4);
    }

    #[test]
    fn jump_needs_ground() {
        let mut physics = PhysicsWorld::new();
        let player = Player::spawn(&mut physics);
        assert!(!player.jump(&mut physics));
        for _ in 0..120 {
            physics.step(1.0 / 90.0, 1.0 / 60.0, 3);
        }
        assert!(player.is_grounded(&physics));
        assert!(player.jump(&mut physics));
        assert_eq!(physics.body(player.body).unwrap().velocity.y, JUMP_SPEED);
    }

    #[test]
    fn climbing_reaches_the_roof() {
        let mut physics = PhysicsWorld::new();
        let mut player = Player::spawn(&mut physics);
        let ladders = [ladder()];
        assert_eq!(player.grab_ladder(&mut physics, &ladders), Some(0));
        assert!(!physics.body(player.body).unwrap().enabled);

        for _ in 0..200 {
            player.climb(&mut physics, &ladders, 1.0, 0.05);
            if player.ladder.is_none() {
                break;
            }
        }
        assert!(player.ladder.is_none());
        let body = physics.body(player.body).unwrap();
        assert!(body.enabled);
        assert!((body.position.y - 21.0).abs() < 1e-4);
        assert!((body.position.z - (9.5 + ROOF_STEP)).abs() < 1e-4);
    }

    #[test]
    fn climbing_down_lets_go_at_the_foot() {
        let mut physics = PhysicsWorld::new();
        let mut player = Player::spawn(&mut physics);
        let ladders = [ladder()];
        player.grab_ladder(&mut physics, &ladders).unwrap();
        player.climb(&mut physics, &ladders, -1.0, 0.1);
        assert!(player.ladder.is_none());

        let far = [Ladder {
            base: Vec3::new(30.0, 0.0, 0.0),
            ..ladder()
        }];
        assert!(player.grab_ladder(&mut physics, &far).is_none());
    }
}
