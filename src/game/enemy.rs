//! Enemy combatants
//!
//! Each enemy is Active until its hp runs out, then it is knocked down for
//! good: the body goes inert, it tips over on a timer and drops its weapon.
//! Active enemies chase the nearest hostile (the player, or another enemy
//! that is markedly closer) and fire on a cooldown derived from their weapon.

use std::f32::consts::{FRAC_PI_2, PI};

use glam::{Quat, Vec3};
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::util::time::Countdown;
use crate::ws::protocol::GameEvent;

use super::armory::WeaponKind;
use super::combat::{CombatSystem, AI_BLEED};
use super::physics::{ray_vertical_cylinder, BodyHandle, Material, PhysicsWorld, RigidBody};
use super::pickups::WeaponPickup;
use super::state::{FrameError, SimulationState};
use super::world::ROAD_SURFACE_Y;

pub const MAX_ENEMIES: usize = 12;
pub const ENEMY_BASE_HP: f32 = 72.0;

const BODY_RADIUS: f32 = 0.32;
const BODY_HEIGHT: f32 = 1.45;
const BODY_MASS: f32 = 80.0;
const BODY_DAMPING: f32 = 0.3;

/// Hit-test volume, standing on the feet
pub const HITBOX_RADIUS: f32 = 0.4;
pub const HITBOX_HEIGHT: f32 = 1.8;

pub const ENGAGE_RANGE: f32 = 55.0;
const FAR_BAND: f32 = 12.0;
const FAR_SPEED: f32 = 2.4;
const NEAR_SPEED: f32 = 1.6;
/// Another enemy wins the target slot only when this much closer
const RIVAL_BIAS: f32 = 0.85;

const MUZZLE_LIFT: f32 = 1.1;
const AIM_LIFT: f32 = 0.9;
const TRACER_REACH: f32 = 150.0;
const MIN_COOLDOWN: f32 = 0.24;
const COOLDOWN_JITTER: f32 = 0.18;

pub const LUCKY_HEADSHOT_CHANCE: f32 = 0.08;
pub const LUCKY_HEADSHOT_DAMAGE: f32 = 120.0;
const MIN_PLAYER_DAMAGE: f32 = 12.0;
const PLAYER_DAMAGE_SHARE: f32 = 0.75;

const BLEED_RATE: f32 = 18.0;
const BLOOD_INTERVAL: f32 = 0.55;
pub const KNOCKDOWN_TIME: f32 = 1.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CharacterModel {
    Soldier,
    Xbot,
    Ybot,
    RobotExpressive,
}

impl CharacterModel {
    pub const ALL: [CharacterModel; 4] = [
        CharacterModel::Soldier,
        CharacterModel::Xbot,
        CharacterModel::Ybot,
        CharacterModel::RobotExpressive,
    ];

    pub fn for_index(i: usize) -> Self {
        Self::ALL[i % Self::ALL.len()]
    }

    pub fn key(self) -> &'static str {
        match self {
            CharacterModel::Soldier => "Soldier",
            CharacterModel::Xbot => "Xbot",
            CharacterModel::Ybot => "Ybot",
            CharacterModel::RobotExpressive => "RobotExpressive",
        }
    }

    pub fn sources(self) -> &'static [&'static str] {
        match self {
            CharacterModel::Soldier => &["https://threejs.org/examples/models/gltf/Soldier.glb"],
            CharacterModel::Xbot => &["https://threejs.org/examples/models/gltf/Xbot.glb"],
            CharacterModel::Ybot => &["https://threejs.org/examples/models/gltf/Ybot.glb"],
            CharacterModel::RobotExpressive => &[
                "https://threejs.org/examples/models/gltf/RobotExpressive/RobotExpressive.glb",
            ],
        }
    }
}

#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: Uuid,
    pub body: BodyHandle,
    pub model: CharacterModel,
    pub weapon: WeaponKind,
    pub hp: f32,
    pub dead: bool,
    /// hp lost per second is `bleed * 18`
    pub bleed: f32,
    bleed_timer: f32,
    cooldown: f32,
    knockdown: Option<Countdown>,
    /// The weapon dropped on knockdown
    pub drop: Option<Uuid>,
}

impl Enemy {
    pub fn is_active(&self) -> bool {
        !self.dead
    }

    /// Fall-over angle, 0 while standing and π/2 once flat
    pub fn tilt(&self) -> f32 {
        match self.knockdown {
            None => 0.0,
            Some(c) => ((1.0 - c.remaining() / KNOCKDOWN_TIME) * FRAC_PI_2).min(FRAC_PI_2),
        }
    }
}

/// Closest live enemy hitbox along a ray
#[derive(Debug, Clone, Copy)]
pub struct EnemyRayHit {
    pub index: usize,
    pub distance: f32,
    pub point: Vec3,
}

/// Ray against one enemy's hitbox
pub fn hitbox_ray(physics: &PhysicsWorld, enemy: &Enemy, origin: Vec3, dir: Vec3, max_dist: f32) -> Option<f32> {
    let feet = physics.body(enemy.body)?.feet();
    ray_vertical_cylinder(origin, dir, feet, HITBOX_RADIUS, HITBOX_HEIGHT, max_dist)
}

/// Ray against every Active enemy's hitbox, ignoring static geometry
pub fn raycast_enemies(
    physics: &PhysicsWorld,
    enemies: &[Enemy],
    origin: Vec3,
    dir: Vec3,
    max_dist: f32,
    skip: Option<usize>,
) -> Option<EnemyRayHit> {
    let dir = dir.try_normalize()?;
    enemies
        .iter()
        .enumerate()
        .filter(|&(i, e)| e.is_active() && Some(i) != skip)
        .filter_map(|(i, e)| {
            hitbox_ray(physics, e, origin, dir, max_dist).map(|t| EnemyRayHit {
                index: i,
                distance: t,
                point: origin + dir * t,
            })
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Target {
    Player,
    Enemy(usize),
}

#[derive(Debug, Clone, Copy)]
struct Sighting {
    target: Target,
    /// Where the target stands
    ground: Vec3,
    /// Where shots are aimed
    aim: Vec3,
    distance: f32,
}

pub struct EnemyAI;

impl EnemyAI {
    /// Add one enemy standing at `ground`. Refused at the population cap.
    pub fn spawn(state: &mut SimulationState, ground: Vec3, model: CharacterModel) -> Option<Uuid> {
        if state.enemies.len() >= MAX_ENEMIES {
            return None;
        }
        let center = ground + Vec3::Y * (BODY_HEIGHT * 0.5 + 0.1);
        let body = RigidBody::cylinder(BODY_RADIUS, BODY_HEIGHT, BODY_MASS, center, Material::Enemy)
            .with_damping(BODY_DAMPING);
        let pool = WeaponKind::ENEMY_POOL;
        let weapon = pool[state.rng.gen_range(0..pool.len())];
        let enemy = Enemy {
            id: Uuid::new_v4(),
            body: state.physics.add_body(body),
            model,
            weapon,
            hp: ENEMY_BASE_HP,
            dead: false,
            bleed: 0.0,
            bleed_timer: 0.0,
            cooldown: 0.0,
            knockdown: None,
            drop: None,
        };
        let id = enemy.id;
        state.enemies.push(enemy);
        Some(id)
    }

    /// Spawn `count` enemies on the ring spawns. A second lap around the ring
    /// is rotated half a slot so nobody spawns on top of anybody else.
    pub fn spawn_round(state: &mut SimulationState, count: usize) -> usize {
        let spawns = state.world.spawns.enemies.clone();
        if spawns.is_empty() {
            return 0;
        }
        let slot = PI * 2.0 / spawns.len() as f32;
        let mut spawned = 0;
        for i in 0..count.min(MAX_ENEMIES) {
            let lap = (i / spawns.len()) as f32;
            let at = Quat::from_rotation_y(lap * slot * 0.5) * spawns[i % spawns.len()];
            let model = CharacterModel::for_index(state.enemies.len());
            if Self::spawn(state, at, model).is_some() {
                spawned += 1;
            }
        }
        spawned
    }

    /// One AI tick for every enemy
    pub fn update(
        state: &mut SimulationState,
        dt: f32,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), FrameError> {
        for index in 0..state.enemies.len() {
            if state.enemies[index].dead {
                if let Some(timer) = state.enemies[index].knockdown.as_mut() {
                    timer.advance(dt);
                }
                continue;
            }

            let position = state
                .physics
                .body(state.enemies[index].body)
                .map(|b| b.position)
                .ok_or(FrameError::MissingBody("enemy"))?;

            if state.enemies[index].bleed > 0.0 && Self::bleed_tick(state, index, position, dt, events) {
                continue;
            }

            let Some(sighting) = Self::acquire_target(state, index, position) else {
                continue;
            };

            let flat = Vec3::new(sighting.ground.x - position.x, 0.0, sighting.ground.z - position.z);
            if sighting.distance > 0.01 {
                let speed = if sighting.distance > FAR_BAND {
                    FAR_SPEED
                } else {
                    NEAR_SPEED
                };
                let dir = flat.normalize_or_zero();
                if let Some(body) = state.physics.body_mut(state.enemies[index].body) {
                    body.velocity.x = dir.x * speed;
                    body.velocity.z = dir.z * speed;
                }
            }

            Self::try_fire(state, index, position, sighting, dt, events);
        }
        Ok(())
    }

    /// Returns true if the bleed finished the enemy off
    fn bleed_tick(
        state: &mut SimulationState,
        index: usize,
        position: Vec3,
        dt: f32,
        events: &mut Vec<GameEvent>,
    ) -> bool {
        let enemy = &mut state.enemies[index];
        enemy.hp -= enemy.bleed * dt * BLEED_RATE;
        enemy.bleed_timer += dt;
        let splash = enemy.bleed_timer > BLOOD_INTERVAL;
        if splash {
            enemy.bleed_timer = 0.0;
        }
        let down = enemy.hp <= 0.0;

        if splash {
            state.effects.add_blood(position, Vec3::Y, &mut state.rng);
        }
        if down {
            Self::knock_down(state, index, events);
        }
        down
    }

    /// Nearest hostile: the player, unless another enemy is markedly closer
    fn acquire_target(state: &SimulationState, index: usize, position: Vec3) -> Option<Sighting> {
        let player = state.physics.body(state.player.body)?.position;
        let mut best = Sighting {
            target: Target::Player,
            ground: player,
            aim: player + Vec3::Y * AIM_LIFT,
            distance: position.distance(player),
        };

        for (j, other) in state.enemies.iter().enumerate() {
            if j == index || other.dead {
                continue;
            }
            let Some(body) = state.physics.body(other.body) else {
                continue;
            };
            let d = position.distance(body.position);
            if d < best.distance * RIVAL_BIAS {
                let feet = body.feet();
                best = Sighting {
                    target: Target::Enemy(j),
                    ground: feet,
                    aim: feet + Vec3::Y * AIM_LIFT,
                    distance: d,
                };
            }
        }
        Some(best)
    }

    fn try_fire(
        state: &mut SimulationState,
        index: usize,
        position: Vec3,
        sighting: Sighting,
        dt: f32,
        events: &mut Vec<GameEvent>,
    ) {
        let enemy = &mut state.enemies[index];
        enemy.cooldown -= dt;
        if sighting.distance > ENGAGE_RANGE || enemy.cooldown > 0.0 {
            return;
        }
        let weapon = enemy.weapon;
        let stats = weapon.stats();
        enemy.cooldown = stats.fire_interval().max(MIN_COOLDOWN) + state.rng.gen::<f32>() * COOLDOWN_JITTER;

        let origin = position + Vec3::Y * MUZZLE_LIFT;
        let noise = Vec3::new(
            state.rng.gen_range(-0.01..0.01),
            state.rng.gen_range(-0.005..0.005),
            state.rng.gen_range(-0.01..0.01),
        );
        let Some(dir) = ((sighting.aim - origin).normalize_or_zero() + noise).try_normalize() else {
            return;
        };
        let to = origin + dir * TRACER_REACH;
        state.effects.add_tracer(origin, to, true);
        events.push(GameEvent::ShotFired {
            weapon,
            from: origin,
            to,
            hostile: true,
        });

        let reach = origin.distance(sighting.aim);
        if let Some(wall) = state
            .physics
            .raycast_static(origin, dir, reach)
            .filter(|h| h.tag.is_some())
        {
            state.effects.add_decal(wall.point, wall.normal);
            return;
        }

        match sighting.target {
            Target::Player => {
                let lucky = state.rng.gen::<f32>() < LUCKY_HEADSHOT_CHANCE;
                let damage = if lucky {
                    LUCKY_HEADSHOT_DAMAGE
                } else {
                    (stats.dmg * PLAYER_DAMAGE_SHARE).max(MIN_PLAYER_DAMAGE)
                };
                state.hurt_player(damage, lucky, events);
            }
            Target::Enemy(j) => {
                let hit = state
                    .enemies
                    .get(j)
                    .and_then(|e| hitbox_ray(&state.physics, e, origin, dir, TRACER_REACH));
                if let Some(t) = hit {
                    CombatSystem::apply_hitscan(state, j, origin + dir * t, -dir, stats.dmg, AI_BLEED, events);
                }
            }
        }
    }

    /// Apply damage and bleed. No-op on a downed enemy. Returns true when this
    /// call knocked the enemy down.
    pub fn wound(
        state: &mut SimulationState,
        index: usize,
        damage: f32,
        bleed: f32,
        impact: Option<(Vec3, Vec3)>,
        headshot: bool,
        events: &mut Vec<GameEvent>,
    ) -> bool {
        let Some(enemy) = state.enemies.get_mut(index) else {
            return false;
        };
        if enemy.dead {
            return false;
        }
        enemy.hp -= damage.max(0.0);
        enemy.bleed = enemy.bleed.max(bleed);
        enemy.bleed_timer = 0.0;
        let (enemy_id, hp) = (enemy.id, enemy.hp);

        if let Some((point, normal)) = impact {
            state.effects.add_blood(point, normal, &mut state.rng);
        }
        events.push(GameEvent::EnemyHit {
            enemy_id,
            damage,
            headshot,
            hp: hp.max(0.0),
        });

        if hp <= 0.0 {
            Self::knock_down(state, index, events);
            true
        } else {
            false
        }
    }

    /// Terminal transition: inert body, tilt timer, one weapon drop
    fn knock_down(state: &mut SimulationState, index: usize, events: &mut Vec<GameEvent>) {
        let enemy = &mut state.enemies[index];
        if enemy.dead {
            return;
        }
        enemy.dead = true;
        enemy.hp = 0.0;
        enemy.bleed = 0.0;
        enemy.knockdown = Some(Countdown::new(KNOCKDOWN_TIME));
        let (enemy_id, weapon, handle) = (enemy.id, enemy.weapon, enemy.body);

        let feet = match state.physics.body_mut(handle) {
            Some(body) => {
                body.mass = 0.0;
                body.velocity = Vec3::ZERO;
                body.feet()
            }
            None => Vec3::ZERO,
        };
        state.effects.add_blood(feet + Vec3::Y * 0.9, Vec3::Y, &mut state.rng);

        let drop_at = Vec3::new(feet.x, (feet.y + 0.1).max(ROAD_SURFACE_Y + 0.06), feet.z);
        let pickup = WeaponPickup::new(weapon, drop_at, false, &mut state.rng);
        let pickup_id = pickup.id;
        state.pickups.push(pickup);
        state.enemies[index].drop = Some(pickup_id);

        events.push(GameEvent::EnemyDown {
            enemy_id,
            position: feet,
            drop: pickup_id,
        });
    }

    pub fn active_count(enemies: &[Enemy]) -> usize {
        enemies.iter().filter(|e| e.is_active()).count()
    }
}
