//! Weapons, ammo bookkeeping, hitscan, grenades and explosions

use std::collections::BTreeMap;

use glam::Vec3;
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::util::time::Countdown;
use crate::ws::protocol::GameEvent;

use super::armory::WeaponKind;
use super::enemy::{raycast_enemies, EnemyAI};
use super::physics::{BodyHandle, Material, RigidBody};
use super::state::{FrameError, SimulationState};

/// Hitscan reach
pub const HITSCAN_RANGE: f32 = 8000.0;
/// Hit height above the feet that counts as a headshot
pub const HEADSHOT_HEIGHT: f32 = 1.35;
/// Body hit multiplier on weapon damage
pub const BODY_MULTIPLIER: f32 = 1.1;
/// Bleed left by a body hit from the player's weapons
pub const PLAYER_BLEED: f32 = 0.45;
/// Bleed left by enemy fire and blasts
pub const AI_BLEED: f32 = 0.35;

pub const GRENADE_FUSE: f32 = 2.6;
/// Fuse once the grenade has nearly stopped on the ground
pub const GRENADE_SETTLED_FUSE: f32 = 0.45;
pub const GRENADE_RADIUS: f32 = 12.0;
pub const GRENADE_POWER: f32 = 160.0;
const GRENADE_THROW_SPEED: f32 = 15.8;
const GRENADE_LOFT: f32 = 5.6;
const GRENADE_BODY_RADIUS: f32 = 0.18;
const GRENADE_MASS: f32 = 1.1;

/// Fraction of the blast radius that still reaches the player
const PLAYER_BLAST_REACH: f32 = 0.9;
const PLAYER_BLAST_SHARE: f32 = 0.35;
const PLAYER_BLAST_MIN: f32 = 6.0;
const PLAYER_BLAST_PUSH: f32 = 3.0;
const ENEMY_BLAST_PUSH: f32 = 6.0;

/// Magazine and reserve counters for one weapon
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AmmoSlot {
    pub mag: u32,
    pub reserve: u32,
}

/// Trigger behaviour for weapons that support automatic fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FireMode {
    Auto,
    Single,
}

#[derive(Debug, Clone, Copy)]
struct ReloadJob {
    weapon: WeaponKind,
    timer: Countdown,
}

/// A reload that has just finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadDone {
    pub weapon: WeaponKind,
    pub moved: u32,
    pub slot: AmmoSlot,
}

/// The player's weapons: ammo per kind, unlocks, selection and trigger state
#[derive(Debug, Clone)]
pub struct Arsenal {
    ammo: BTreeMap<WeaponKind, AmmoSlot>,
    modes: BTreeMap<WeaponKind, FireMode>,
    selected: WeaponKind,
    reload: Option<ReloadJob>,
    fire_cooldown: f32,
    trigger_held: bool,
}

impl Arsenal {
    pub fn new() -> Self {
        let mut ammo: BTreeMap<WeaponKind, AmmoSlot> = WeaponKind::ALL
            .iter()
            .map(|&k| (k, AmmoSlot::default()))
            .collect();
        for kind in WeaponKind::STARTING {
            let mag = kind.stats().mag;
            ammo.insert(
                kind,
                AmmoSlot {
                    mag,
                    reserve: mag * 3,
                },
            );
        }

        let modes = WeaponKind::ALL
            .iter()
            .map(|&k| {
                let mode = if k.stats().auto {
                    FireMode::Auto
                } else {
                    FireMode::Single
                };
                (k, mode)
            })
            .collect();

        Self {
            ammo,
            modes,
            selected: WeaponKind::STARTING[0],
            reload: None,
            fire_cooldown: 0.0,
            trigger_held: false,
        }
    }

    pub fn slot(&self, kind: WeaponKind) -> AmmoSlot {
        self.ammo.get(&kind).copied().unwrap_or_default()
    }

    pub fn selected(&self) -> WeaponKind {
        self.selected
    }

    /// A weapon counts as owned once it has ever held a round
    pub fn is_unlocked(&self, kind: WeaponKind) -> bool {
        self.slot(kind) != AmmoSlot::default()
    }

    pub fn unlocked(&self) -> Vec<WeaponKind> {
        WeaponKind::ALL
            .iter()
            .copied()
            .filter(|&k| self.is_unlocked(k))
            .collect()
    }

    /// Switch weapons. Locked weapons are refused.
    pub fn select(&mut self, kind: WeaponKind) -> bool {
        if !self.is_unlocked(kind) {
            return false;
        }
        if self.selected != kind {
            self.selected = kind;
            self.fire_cooldown = 0.0;
        }
        true
    }

    pub fn fire_mode(&self, kind: WeaponKind) -> FireMode {
        self.modes.get(&kind).copied().unwrap_or(FireMode::Single)
    }

    /// Flip auto/single on the selected weapon if it can fire automatically
    pub fn toggle_fire_mode(&mut self) -> Option<FireMode> {
        let kind = self.selected;
        if !kind.stats().auto {
            return None;
        }
        let next = match self.fire_mode(kind) {
            FireMode::Auto => FireMode::Single,
            FireMode::Single => FireMode::Auto,
        };
        self.modes.insert(kind, next);
        Some(next)
    }

    /// Grant a weapon from a pickup, returning the resulting counters
    pub fn unlock(&mut self, kind: WeaponKind) -> AmmoSlot {
        let mag = kind.stats().mag;
        let slot = self.ammo.entry(kind).or_default();
        if *slot == AmmoSlot::default() {
            *slot = AmmoSlot {
                mag,
                reserve: mag * 3,
            };
        } else {
            slot.reserve = (slot.reserve + mag * 2).min(mag * 5);
        }
        *slot
    }

    pub fn is_reloading(&self) -> bool {
        self.reload.is_some()
    }

    /// Start reloading the selected weapon. Ignored while another reload runs,
    /// when the magazine is full or when the reserve is empty.
    pub fn reload(&mut self) -> Option<f32> {
        if self.reload.is_some() {
            return None;
        }
        let kind = self.selected;
        let stats = kind.stats();
        let slot = self.slot(kind);
        if slot.mag >= stats.mag || slot.reserve == 0 {
            return None;
        }
        self.reload = Some(ReloadJob {
            weapon: kind,
            timer: Countdown::new(stats.reload),
        });
        Some(stats.reload)
    }

    /// Advance the reload timer, moving ammo when it runs out
    pub fn update_reload(&mut self, dt: f32) -> Option<ReloadDone> {
        let job = self.reload.as_mut()?;
        if !job.timer.advance(dt) {
            return None;
        }
        let weapon = job.weapon;
        self.reload = None;

        let cap = weapon.stats().mag;
        let slot = self.ammo.entry(weapon).or_default();
        let moved = cap.saturating_sub(slot.mag).min(slot.reserve);
        slot.mag += moved;
        slot.reserve -= moved;
        Some(ReloadDone {
            weapon,
            moved,
            slot: *slot,
        })
    }

    /// Rounds the trigger releases this frame. Automatic fire repeats every
    /// `60/rpm` seconds while held; single fire needs a fresh press.
    pub fn pull_trigger(&mut self, held: bool, dt: f32) -> u32 {
        let kind = self.selected;
        let interval = kind.stats().fire_interval();
        let fresh_press = held && !self.trigger_held;
        self.trigger_held = held;

        if self.fire_mode(kind) == FireMode::Auto {
            if !held {
                self.fire_cooldown = (self.fire_cooldown - dt).max(0.0);
                return 0;
            }
            self.fire_cooldown -= dt;
            let mut shots = 0;
            while self.fire_cooldown <= 0.0 {
                shots += 1;
                self.fire_cooldown += interval;
            }
            return shots;
        }

        self.fire_cooldown = (self.fire_cooldown - dt).max(0.0);
        if fresh_press && self.fire_cooldown <= 0.0 {
            self.fire_cooldown = interval;
            1
        } else {
            0
        }
    }

    /// Spend one round of `kind`. False on an empty magazine.
    fn take_round(&mut self, kind: WeaponKind) -> bool {
        match self.ammo.get_mut(&kind) {
            Some(slot) if slot.mag > 0 => {
                slot.mag -= 1;
                true
            }
            _ => false,
        }
    }

    /// Counters for every weapon, in catalog order
    pub fn ammo(&self) -> impl Iterator<Item = (WeaponKind, AmmoSlot)> + '_ {
        self.ammo.iter().map(|(&k, &s)| (k, s))
    }
}

impl Default for Arsenal {
    fn default() -> Self {
        Self::new()
    }
}

/// Which part of the target a hitscan ray struck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HitZone {
    Head,
    Body,
}

impl HitZone {
    /// Classify by the hit height above the target's feet
    pub fn classify(height_above_feet: f32) -> Self {
        if height_above_feet > HEADSHOT_HEIGHT {
            HitZone::Head
        } else {
            HitZone::Body
        }
    }

    /// Damage dealt to a victim with `hp` remaining
    pub fn damage(self, hp: f32, weapon_dmg: f32) -> f32 {
        match self {
            HitZone::Head => hp.max(0.0),
            HitZone::Body => weapon_dmg * BODY_MULTIPLIER,
        }
    }

    pub fn bleed(self, body_bleed: f32) -> f32 {
        match self {
            HitZone::Head => 0.0,
            HitZone::Body => body_bleed,
        }
    }
}

/// Linear blast falloff: 1 at the centre, 0 at and beyond `radius`
pub fn falloff(distance: f32, radius: f32) -> f32 {
    if radius <= 0.0 || distance >= radius {
        0.0
    } else {
        1.0 - distance.max(0.0) / radius
    }
}

/// A live grenade
#[derive(Debug, Clone)]
pub struct Grenade {
    pub id: Uuid,
    pub body: BodyHandle,
    pub fuse: Countdown,
}

/// What one trigger pull did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FireOutcome {
    /// Empty magazine: nothing happened
    Dry,
    /// A reload is in flight
    Reloading,
    Hitscan { hit: Option<Vec3>, zone: Option<HitZone> },
    Thrown(Uuid),
}

pub struct CombatSystem;

impl CombatSystem {
    /// Fire the selected weapon once
    pub fn fire(state: &mut SimulationState, events: &mut Vec<GameEvent>) -> FireOutcome {
        let weapon = state.arsenal.selected();
        if state.arsenal.is_reloading() {
            return FireOutcome::Reloading;
        }
        if !state.arsenal.take_round(weapon) {
            return FireOutcome::Dry;
        }
        state.player.shots_fired += 1;

        if weapon.is_grenade() {
            let id = Self::throw_grenade(state, events);
            return FireOutcome::Thrown(id);
        }

        let stats = weapon.stats();
        let eye = state.view.eye;
        let aim = state.view.aim();
        let (right, up) = aim_basis(aim);
        let ox = (state.rng.gen::<f32>() - 0.5) * stats.spread * 2.0;
        let oy = (state.rng.gen::<f32>() - 0.5) * stats.spread * 2.0;
        let dir = (aim + right * ox + up * oy).try_normalize().unwrap_or(aim);

        // damage comes from the enemy hitbox ray alone; static geometry only
        // decides where the decal lands
        let surface = state.physics.raycast_static(eye, dir, HITSCAN_RANGE);
        let enemy = raycast_enemies(&state.physics, &state.enemies, eye, dir, HITSCAN_RANGE, None);

        let end = match (enemy, surface) {
            (Some(e), _) => e.point,
            (None, Some(s)) => s.point,
            (None, None) => eye + dir * HITSCAN_RANGE,
        };
        state.effects.add_tracer(eye + aim * 0.6, end, false);
        state
            .effects
            .eject_shell(eye + aim * 0.6 - up * 0.2, right, &mut state.rng);

        if let Some(s) = surface {
            state.effects.add_decal(s.point, s.normal);
        }

        let mut zone = None;
        if let Some(hit) = enemy {
            state.player.shots_hit += 1;
            let (struck, killed) = Self::apply_hitscan(
                state,
                hit.index,
                hit.point,
                -dir,
                stats.dmg,
                PLAYER_BLEED,
                events,
            );
            if killed {
                state.player.kills += 1;
            }
            zone = Some(struck);
        }

        events.push(GameEvent::ShotFired {
            weapon,
            from: eye,
            to: end,
            hostile: false,
        });
        FireOutcome::Hitscan {
            hit: enemy.map(|e| e.point).or(surface.map(|s| s.point)),
            zone,
        }
    }

    /// Resolve a hitscan hit on an enemy with the shared head/body rule.
    /// Also reports whether the hit knocked the enemy down.
    pub fn apply_hitscan(
        state: &mut SimulationState,
        index: usize,
        point: Vec3,
        normal: Vec3,
        weapon_dmg: f32,
        body_bleed: f32,
        events: &mut Vec<GameEvent>,
    ) -> (HitZone, bool) {
        let feet_y = state
            .enemies
            .get(index)
            .and_then(|e| state.physics.body(e.body))
            .map(|b| b.bottom())
            .unwrap_or(0.0);
        let zone = HitZone::classify(point.y - feet_y);
        let hp = state.enemies.get(index).map(|e| e.hp).unwrap_or(0.0);
        let damage = zone.damage(hp, weapon_dmg);
        let killed = EnemyAI::wound(
            state,
            index,
            damage,
            zone.bleed(body_bleed),
            Some((point, normal)),
            zone == HitZone::Head,
            events,
        );
        (zone, killed)
    }

    /// Throw a grenade without switching weapons. `None` with an empty
    /// grenade magazine or while reloading.
    pub fn throw_from_belt(state: &mut SimulationState, events: &mut Vec<GameEvent>) -> Option<Uuid> {
        if state.arsenal.is_reloading() || !state.arsenal.take_round(WeaponKind::Grenade) {
            return None;
        }
        state.player.shots_fired += 1;
        Some(Self::throw_grenade(state, events))
    }

    /// Spawn a grenade body in front of the eye
    pub fn throw_grenade(state: &mut SimulationState, events: &mut Vec<GameEvent>) -> Uuid {
        let aim = state.view.aim();
        let start = state.view.eye + aim * 0.9 + Vec3::new(0.0, -0.05, 0.0);
        let body = RigidBody::sphere(GRENADE_BODY_RADIUS, GRENADE_MASS, start, Material::Grenade)
            .with_damping(0.02)
            .with_velocity(aim * GRENADE_THROW_SPEED + Vec3::Y * GRENADE_LOFT);
        let grenade = Grenade {
            id: Uuid::new_v4(),
            body: state.physics.add_body(body),
            fuse: Countdown::new(GRENADE_FUSE),
        };
        let id = grenade.id;
        state.grenades.push(grenade);
        events.push(GameEvent::GrenadeThrown {
            grenade_id: id,
            position: start,
        });
        id
    }

    /// Burn grenade fuses and detonate the ones that run out
    pub fn update_grenades(
        state: &mut SimulationState,
        dt: f32,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), FrameError> {
        let mut blasts = Vec::new();
        for grenade in &mut state.grenades {
            let body = state
                .physics
                .body(grenade.body)
                .ok_or(FrameError::MissingBody("grenade"))?;
            if body.position.y < 0.2 && body.velocity.length() < 0.8 {
                grenade.fuse.cap(GRENADE_SETTLED_FUSE);
            }
            if grenade.fuse.advance(dt) {
                blasts.push((grenade.id, grenade.body, body.position));
            }
        }

        for (id, handle, position) in blasts {
            state.grenades.retain(|g| g.id != id);
            state.physics.remove_body(handle);
            Self::explode(state, position, GRENADE_RADIUS, GRENADE_POWER, events);
        }
        Ok(())
    }

    /// Detonate at `center`: effects, area damage, traffic shove and a
    /// call-out for the emergency units
    pub fn explode(
        state: &mut SimulationState,
        center: Vec3,
        radius: f32,
        power: f32,
        events: &mut Vec<GameEvent>,
    ) {
        state.effects.spawn_explosion(center, &mut state.rng);
        events.push(GameEvent::Explosion {
            position: center,
            radius,
        });
        Self::explosion_damage(state, center, radius, power, events);
        state.vehicles.push_traffic(center, radius);
        let units = state.vehicles.dispatch(center);
        if units > 0 {
            events.push(GameEvent::EmergencyDispatched {
                position: center,
                units,
            });
        }
    }

    /// Falloff damage to enemies and the player, plus knockback
    pub fn explosion_damage(
        state: &mut SimulationState,
        center: Vec3,
        radius: f32,
        power: f32,
        events: &mut Vec<GameEvent>,
    ) {
        for index in 0..state.enemies.len() {
            if state.enemies[index].dead {
                continue;
            }
            let Some(position) = state.physics.body(state.enemies[index].body).map(|b| b.position)
            else {
                continue;
            };
            let impact = falloff(position.distance(center), radius);
            if impact <= 0.0 {
                continue;
            }
            let killed = EnemyAI::wound(state, index, power * impact, AI_BLEED, None, false, events);
            if killed {
                state.player.kills += 1;
                continue;
            }
            let away = Vec3::new(position.x - center.x, 0.0, position.z - center.z).normalize_or_zero();
            if let Some(body) = state.physics.body_mut(state.enemies[index].body) {
                body.velocity += away * impact * ENEMY_BLAST_PUSH;
            }
        }

        let reach = radius * PLAYER_BLAST_REACH;
        let Some(player_pos) = state.physics.body(state.player.body).map(|b| b.position) else {
            return;
        };
        let flat = Vec3::new(player_pos.x - center.x, 0.0, player_pos.z - center.z);
        let d = flat.length();
        let share = falloff(d, reach);
        if share <= 0.0 {
            return;
        }
        let damage = (power * PLAYER_BLAST_SHARE * share).max(PLAYER_BLAST_MIN);
        state.hurt_player(damage, false, events);
        if d > 0.1 && state.vehicles.driven().is_none() {
            if let Some(body) = state.physics.body_mut(state.player.body) {
                body.velocity += flat / d * PLAYER_BLAST_PUSH;
            }
        }
    }
}

/// Right and up vectors perpendicular to `aim`
fn aim_basis(aim: Vec3) -> (Vec3, Vec3) {
    let right = aim.cross(Vec3::Y).try_normalize().unwrap_or(Vec3::X);
    let up = right.cross(aim).normalize_or_zero();
    (right, up)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::enemy::ENEMY_BASE_HP;
    use crate::game::player::PLAYER_MAX_HP;

    #[test]
    fn starting_weapons_are_loaded() {
        let arsenal = Arsenal::new();
        let ak = arsenal.slot(WeaponKind::Ak47);
        assert_eq!(ak, AmmoSlot { mag: 30, reserve: 90 });
        assert_eq!(arsenal.slot(WeaponKind::SniperAwp), AmmoSlot::default());
        assert_eq!(arsenal.selected(), WeaponKind::Glock);
        assert!(!arsenal.is_unlocked(WeaponKind::Grenade));
    }

    #[test]
    fn rounds_never_go_below_zero() {
        let mut arsenal = Arsenal::new();
        assert!(arsenal.select(WeaponKind::Ak47));
        for _ in 0..30 {
            assert!(arsenal.take_round(WeaponKind::Ak47));
        }
        assert_eq!(arsenal.slot(WeaponKind::Ak47).mag, 0);
        assert!(!arsenal.take_round(WeaponKind::Ak47));
        assert_eq!(arsenal.slot(WeaponKind::Ak47).mag, 0);
        assert_eq!(arsenal.slot(WeaponKind::Ak47).reserve, 90);
    }

    #[test]
    fn reload_moves_deficit_once() {
        let mut arsenal = Arsenal::new();
        arsenal.select(WeaponKind::Ak47);
        for _ in 0..12 {
            arsenal.take_round(WeaponKind::Ak47);
        }
        let duration = arsenal.reload().unwrap();
        assert!((duration - 1.9).abs() < 1e-6);
        assert!(arsenal.reload().is_none());
        assert!(arsenal.update_reload(1.0).is_none());
        assert!(arsenal.reload().is_none());
        let done = arsenal.update_reload(1.0).unwrap();
        assert_eq!(done.moved, 12);
        assert_eq!(done.slot, AmmoSlot { mag: 30, reserve: 78 });
        assert!(arsenal.update_reload(5.0).is_none());
    }

    #[test]
    fn reload_is_ignored_when_full_or_dry() {
        let mut arsenal = Arsenal::new();
        assert!(arsenal.reload().is_none());

        arsenal.unlock(WeaponKind::SniperAwp);
        assert!(arsenal.select(WeaponKind::SniperAwp));
        arsenal.ammo.insert(WeaponKind::SniperAwp, AmmoSlot { mag: 0, reserve: 0 });
        assert!(arsenal.reload().is_none());
    }

    #[test]
    fn reload_takes_only_what_the_reserve_holds() {
        let mut arsenal = Arsenal::new();
        arsenal.ammo.insert(WeaponKind::Glock, AmmoSlot { mag: 2, reserve: 5 });
        arsenal.reload().unwrap();
        let done = arsenal.update_reload(2.0).unwrap();
        assert_eq!(done.slot, AmmoSlot { mag: 7, reserve: 0 });
    }

    #[test]
    fn unlock_grants_then_tops_up() {
        let mut arsenal = Arsenal::new();
        let first = arsenal.unlock(WeaponKind::Mp5);
        assert_eq!(first, AmmoSlot { mag: 30, reserve: 90 });
        let second = arsenal.unlock(WeaponKind::Mp5);
        assert_eq!(second.reserve, 150);
        let third = arsenal.unlock(WeaponKind::Mp5);
        assert_eq!(third.reserve, 150);
    }

    #[test]
    fn select_refuses_locked_weapons() {
        let mut arsenal = Arsenal::new();
        assert!(!arsenal.select(WeaponKind::SniperAwp));
        assert_eq!(arsenal.selected(), WeaponKind::Glock);
        assert_eq!(arsenal.toggle_fire_mode(), None);
        arsenal.select(WeaponKind::Uzi);
        assert_eq!(arsenal.toggle_fire_mode(), Some(FireMode::Single));
        assert_eq!(arsenal.fire_mode(WeaponKind::Uzi), FireMode::Single);
    }

    #[test]
    fn automatic_fire_follows_rpm() {
        let mut arsenal = Arsenal::new();
        arsenal.select(WeaponKind::Ak47);
        // 650 rpm is about 10.8 rounds per second
        let mut shots = 0;
        for _ in 0..60 {
            shots += arsenal.pull_trigger(true, 1.0 / 60.0);
        }
        assert!((10..=12).contains(&shots), "{shots}");
        assert_eq!(arsenal.pull_trigger(false, 1.0 / 60.0), 0);
    }

    #[test]
    fn single_fire_needs_fresh_press() {
        let mut arsenal = Arsenal::new();
        assert_eq!(arsenal.pull_trigger(true, 0.016), 1);
        for _ in 0..30 {
            assert_eq!(arsenal.pull_trigger(true, 0.016), 0);
        }
        assert_eq!(arsenal.pull_trigger(false, 0.016), 0);
        assert_eq!(arsenal.pull_trigger(true, 0.016), 1);
    }

    #[test]
    fn headshot_rule_is_shared() {
        assert_eq!(HitZone::classify(1.5), HitZone::Head);
        assert_eq!(HitZone::classify(1.0), HitZone::Body);
        assert_eq!(HitZone::Head.damage(37.0, 24.0), 37.0);
        assert!((HitZone::Body.damage(37.0, 20.0) - 22.0).abs() < 1e-4);
        assert_eq!(HitZone::Head.bleed(PLAYER_BLEED), 0.0);
        assert_eq!(HitZone::Body.bleed(AI_BLEED), AI_BLEED);
    }

    #[test]
    fn falloff_is_monotonic_and_zero_at_radius() {
        let mut last = falloff(0.0, GRENADE_RADIUS);
        assert_eq!(last, 1.0);
        let mut d = 0.0;
        while d < 20.0 {
            let f = falloff(d, GRENADE_RADIUS);
            assert!(f <= last);
            last = f;
            d += 0.25;
        }
        assert_eq!(falloff(GRENADE_RADIUS, GRENADE_RADIUS), 0.0);
        assert_eq!(falloff(GRENADE_RADIUS + 1.0, GRENADE_RADIUS), 0.0);
    }

    use crate::game::camera::CameraPose;
    use crate::game::physics::{Aabb, StaticTag};
    use crate::game::state::testing::{arena, place_enemy, place_player, FIELD};

    fn look_along_x(state: &mut SimulationState, eye_height: f32) {
        let eye = FIELD + Vec3::Y * eye_height;
        state.view = CameraPose {
            eye,
            target: eye + Vec3::X,
        };
    }

    #[test]
    fn walls_do_not_shield_enemies_from_hitscan() {
        let mut state = arena(21);
        place_enemy(&mut state, 0, FIELD + Vec3::new(4.0, 0.0, 0.0));
        state.physics.add_static(
            Aabb::from_center_size(FIELD + Vec3::new(2.0, 1.0, 0.0), Vec3::new(0.2, 4.0, 4.0)),
            StaticTag::Wall,
        );
        look_along_x(&mut state, 1.0);
        let decals = state.effects.decals.len();
        let mut events = Vec::new();

        let outcome = CombatSystem::fire(&mut state, &mut events);

        assert!(matches!(
            outcome,
            FireOutcome::Hitscan {
                zone: Some(HitZone::Body),
                ..
            }
        ));
        let expected = ENEMY_BASE_HP - WeaponKind::Glock.stats().dmg * BODY_MULTIPLIER;
        assert!((state.enemies[0].hp - expected).abs() < 1e-3);
        assert!((state.enemies[0].bleed - PLAYER_BLEED).abs() < 1e-6);
        // the wall still takes the decal
        assert_eq!(state.effects.decals.len(), decals + 1);
        let decal = state.effects.decals[decals].item;
        assert!((decal.point.x - (FIELD.x + 1.9)).abs() < 1e-3);
    }

    #[test]
    fn hitscan_headshot_knocks_down_instantly() {
        let mut state = arena(22);
        place_enemy(&mut state, 0, FIELD + Vec3::new(4.0, 0.0, 0.0));
        look_along_x(&mut state, 1.6);
        let pickups = state.pickups.len();
        let mut events = Vec::new();

        let outcome = CombatSystem::fire(&mut state, &mut events);

        assert!(matches!(
            outcome,
            FireOutcome::Hitscan {
                zone: Some(HitZone::Head),
                ..
            }
        ));
        assert!(state.enemies[0].dead);
        assert_eq!(state.enemies[0].hp, 0.0);
        assert_eq!(state.player.kills, 1);
        assert_eq!(state.pickups.len(), pickups + 1);
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::EnemyHit { headshot: true, damage, .. } if (*damage - ENEMY_BASE_HP).abs() < 1e-4
        )));
    }

    #[test]
    fn player_takes_a_share_inside_the_inner_radius_only() {
        let mut state = arena(23);
        place_player(&mut state, FIELD);
        let mut events = Vec::new();

        let d = 5.0;
        CombatSystem::explode(&mut state, FIELD + Vec3::new(d, 0.0, 0.0), GRENADE_RADIUS, GRENADE_POWER, &mut events);
        let reach = GRENADE_RADIUS * PLAYER_BLAST_REACH;
        let expected = (GRENADE_POWER * PLAYER_BLAST_SHARE * (1.0 - d / reach)).max(PLAYER_BLAST_MIN);
        assert!((state.player.hp - (PLAYER_MAX_HP - expected)).abs() < 1e-3);

        // inside the enemy radius but past 0.9 of it
        let hp = state.player.hp;
        place_player(&mut state, FIELD);
        CombatSystem::explode(
            &mut state,
            FIELD + Vec3::new(reach + 0.5, 0.0, 0.0),
            GRENADE_RADIUS,
            GRENADE_POWER,
            &mut events,
        );
        assert_eq!(state.player.hp, hp);
    }

    #[test]
    fn aim_basis_is_orthonormal() {
        let aim = Vec3::new(0.3, -0.2, 0.9).normalize();
        let (right, up) = aim_basis(aim);
        assert!(right.dot(aim).abs() < 1e-5);
        assert!(up.dot(aim).abs() < 1e-5);
        assert!((up.length() - 1.0).abs() < 1e-5);
        assert!(up.y > 0.0);
    }
}
