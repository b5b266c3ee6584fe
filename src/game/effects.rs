//! Short-lived combat visuals, each owning its own timer

use glam::Vec3;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::util::time::Countdown;

use super::physics::GRAVITY;

pub const TRACER_LIFE: f32 = 0.12;
pub const DECAL_LIFE: f32 = 15.0;
pub const SCORCH_LIFE: f32 = 20.0;
pub const BLOOD_LIFE: f32 = 6.0;
pub const SHELL_LIFE: f32 = 1.2;
pub const EXPLOSION_LIFE: f32 = 1.2;
pub const EXPLOSION_SHARDS: usize = 22;

/// An effect paired with the countdown that retires it
#[derive(Debug, Clone, Serialize)]
pub struct Timed<T> {
    #[serde(flatten)]
    pub item: T,
    pub life: Countdown,
    #[serde(skip)]
    max_life: f32,
}

impl<T> Timed<T> {
    pub fn new(item: T, seconds: f32) -> Self {
        Self {
            item,
            life: Countdown::new(seconds),
            max_life: seconds,
        }
    }

    /// 1.0 when fresh, 0.0 when expired
    pub fn fade(&self) -> f32 {
        if self.max_life <= 0.0 {
            return 0.0;
        }
        (self.life.remaining() / self.max_life).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Tracer {
    pub from: Vec3,
    pub to: Vec3,
    /// Fired by an enemy
    pub hostile: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Decal {
    pub point: Vec3,
    pub normal: Vec3,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Blood {
    pub point: Vec3,
    pub normal: Vec3,
    pub rotation: f32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Shell {
    pub position: Vec3,
    pub velocity: Vec3,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Scorch {
    pub x: f32,
    pub z: f32,
    pub rotation: f32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Shard {
    pub position: Vec3,
    pub velocity: Vec3,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplosionFx {
    pub center: Vec3,
    pub shards: Vec<Shard>,
}

/// All live effects for one session
#[derive(Debug, Clone, Default, Serialize)]
pub struct Effects {
    pub tracers: Vec<Timed<Tracer>>,
    pub decals: Vec<Timed<Decal>>,
    pub blood: Vec<Timed<Blood>>,
    pub shells: Vec<Timed<Shell>>,
    pub scorches: Vec<Timed<Scorch>>,
    pub explosions: Vec<Timed<ExplosionFx>>,
}

impl Effects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tracer(&mut self, from: Vec3, to: Vec3, hostile: bool) {
        self.tracers
            .push(Timed::new(Tracer { from, to, hostile }, TRACER_LIFE));
    }

    pub fn add_decal(&mut self, point: Vec3, normal: Vec3) {
        self.decals.push(Timed::new(Decal { point, normal }, DECAL_LIFE));
    }

    pub fn add_blood(&mut self, point: Vec3, normal: Vec3, rng: &mut ChaCha8Rng) {
        let normal = normal.try_normalize().unwrap_or(Vec3::Y);
        let blood = Blood {
            point: point + normal * 0.02,
            normal,
            rotation: rng.gen_range(0.0..std::f32::consts::TAU),
        };
        self.blood.push(Timed::new(blood, BLOOD_LIFE));
    }

    /// Spent casing thrown to the shooter's right
    pub fn eject_shell(&mut self, origin: Vec3, right: Vec3, rng: &mut ChaCha8Rng) {
        let velocity = right * rng.gen_range(1.2..2.0) + Vec3::Y * rng.gen_range(1.4..2.2);
        self.shells.push(Timed::new(
            Shell {
                position: origin,
                velocity,
            },
            SHELL_LIFE,
        ));
    }

    /// Fireball shards plus a scorch mark under the blast
    pub fn spawn_explosion(&mut self, center: Vec3, rng: &mut ChaCha8Rng) {
        let shards = (0..EXPLOSION_SHARDS)
            .map(|_| {
                let dir = Vec3::new(
                    rng.gen::<f32>() * 2.0 - 1.0,
                    rng.gen::<f32>() * 1.2 + 0.2,
                    rng.gen::<f32>() * 2.0 - 1.0,
                )
                .normalize_or_zero();
                Shard {
                    position: center,
                    velocity: dir * (6.5 + rng.gen::<f32>() * 5.5),
                }
            })
            .collect();
        self.explosions
            .push(Timed::new(ExplosionFx { center, shards }, EXPLOSION_LIFE));

        let scorch = Scorch {
            x: center.x,
            z: center.z,
            rotation: rng.gen_range(0.0..std::f32::consts::TAU),
        };
        self.scorches.push(Timed::new(scorch, SCORCH_LIFE));
    }

    /// Advance every timer and moving particle, dropping expired effects
    pub fn update(&mut self, dt: f32) {
        for shell in &mut self.shells {
            let s = &mut shell.item;
            s.velocity.y += GRAVITY * dt;
            s.position += s.velocity * dt;
            if s.position.y < 0.02 {
                s.position.y = 0.02;
                s.velocity = Vec3::ZERO;
            }
        }
        for fx in &mut self.explosions {
            for shard in &mut fx.item.shards {
                shard.velocity.y += GRAVITY * dt;
                shard.position += shard.velocity * dt;
                shard.position.y = shard.position.y.max(0.0);
            }
        }

        retain_live(&mut self.tracers, dt);
        retain_live(&mut self.decals, dt);
        retain_live(&mut self.blood, dt);
        retain_live(&mut self.shells, dt);
        retain_live(&mut self.scorches, dt);
        retain_live(&mut self.explosions, dt);
    }

    pub fn len(&self) -> usize {
        self.tracers.len()
            + self.decals.len()
            + self.blood.len()
            + self.shells.len()
            + self.scorches.len()
            + self.explosions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn retain_live<T>(items: &mut Vec<Timed<T>>, dt: f32) {
    items.retain_mut(|t| !t.life.advance(dt));
}
