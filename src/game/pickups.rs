//! Weapon pickups lying around the city

use std::f32::consts::TAU;

use glam::Vec3;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use uuid::Uuid;

use super::armory::WeaponKind;
use super::combat::{AmmoSlot, Arsenal};
use super::world::{PickupSource, PickupSpot, ROAD_SURFACE_Y};

/// Walking this close grabs a pickup
pub const AUTO_COLLECT_RADIUS: f32 = 1.1;
/// Reach of an explicit pick request
pub const PICK_RADIUS: f32 = 6.0;

const FLOOR_Y: f32 = ROAD_SURFACE_Y + 0.08;

#[derive(Debug, Clone, Serialize)]
pub struct WeaponPickup {
    pub id: Uuid,
    pub weapon: WeaponKind,
    pub position: Vec3,
    /// Spin rate (rad/s)
    pub spin: f32,
    /// Current spin angle
    pub phase: f32,
    /// Roof drops are highlighted for the client
    pub rooftop: bool,
}

impl WeaponPickup {
    pub fn new(weapon: WeaponKind, position: Vec3, rooftop: bool, rng: &mut ChaCha8Rng) -> Self {
        Self {
            id: Uuid::new_v4(),
            weapon,
            position: Vec3::new(position.x, position.y.max(FLOOR_Y), position.z),
            spin: 0.9 + rng.gen::<f32>() * 0.6,
            phase: rng.gen_range(0.0..TAU),
            rooftop,
        }
    }
}

/// Deal weapons onto the spots from a shuffled deck, reshuffling when it runs out
pub fn scatter(spots: &[PickupSpot], rng: &mut ChaCha8Rng) -> Vec<WeaponPickup> {
    let mut deck: Vec<WeaponKind> = Vec::new();
    spots
        .iter()
        .map(|spot| {
            if deck.is_empty() {
                deck = WeaponKind::ALL.to_vec();
                deck.shuffle(rng);
            }
            let weapon = deck.pop().unwrap_or(WeaponKind::Glock);
            WeaponPickup::new(weapon, spot.position, spot.source == PickupSource::Roof, rng)
        })
        .collect()
}

pub fn spin(pickups: &mut [WeaponPickup], dt: f32) {
    for p in pickups {
        p.phase = (p.phase + p.spin * dt) % TAU;
    }
}

/// Index of the closest pickup within `radius`
pub fn nearest(pickups: &[WeaponPickup], position: Vec3, radius: f32) -> Option<usize> {
    pickups
        .iter()
        .enumerate()
        .map(|(i, p)| (i, p.position.distance(position)))
        .filter(|&(_, d)| d <= radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}

/// Take the closest pickup within `radius` and hand its weapon to the arsenal
pub fn collect(
    pickups: &mut Vec<WeaponPickup>,
    arsenal: &mut Arsenal,
    position: Vec3,
    radius: f32,
) -> Option<(WeaponPickup, AmmoSlot)> {
    let index = nearest(pickups, position, radius)?;
    let pickup = pickups.swap_remove(index);
    let slot = arsenal.unlock(pickup.weapon);
    Some((pickup, slot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn spots(n: usize) -> Vec<PickupSpot> {
        (0..n)
            .map(|i| PickupSpot {
                position: Vec3::new(i as f32 * 10.0, 0.0, 0.0),
                source: if i == 0 {
                    PickupSource::Roof
                } else {
                    PickupSource::Street
                },
            })
            .collect()
    }

    #[test]
    fn scatter_deals_every_weapon_before_repeating() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let pickups = scatter(&spots(24), &mut rng);
        assert_eq!(pickups.len(), 24);
        let mut first: Vec<WeaponKind> = pickups[..12].iter().map(|p| p.weapon).collect();
        first.sort();
        assert_eq!(first, WeaponKind::ALL.to_vec());
        assert!(pickups[0].rooftop);
        assert!(!pickups[1].rooftop);
        assert!(pickups.iter().all(|p| p.position.y >= FLOOR_Y));
        assert!(pickups.iter().all(|p| (0.9..=1.5).contains(&p.spin)));
    }

    #[test]
    fn collect_takes_only_the_nearest_in_reach() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let mut pickups = scatter(&spots(3), &mut rng);
        let mut arsenal = Arsenal::new();

        assert!(collect(&mut pickups, &mut arsenal, Vec3::new(5.0, 0.0, 0.0), AUTO_COLLECT_RADIUS).is_none());

        let target = pickups[1].weapon;
        let (taken, slot) = collect(&mut pickups, &mut arsenal, Vec3::new(9.0, 0.0, 0.0), PICK_RADIUS).unwrap();
        assert_eq!(taken.weapon, target);
        assert_eq!(pickups.len(), 2);
        assert_eq!(slot, arsenal.slot(target));
        assert!(arsenal.is_unlocked(target));
    }

    #[test]
    fn spin_wraps() {
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut pickups = scatter(&spots(1), &mut rng);
        for _ in 0..100 {
            spin(&mut pickups, 0.5);
        }
        assert!((0.0..TAU).contains(&pickups[0].phase));
    }
}
