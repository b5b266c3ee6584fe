//! End-to-end checks of one simulated round, driven through the public API
//! without a socket

use glam::Vec3;
use uuid::Uuid;

use arena_server::game::armory::WeaponKind;
use arena_server::game::combat::{CombatSystem, FireOutcome, GRENADE_POWER, GRENADE_RADIUS};
use arena_server::game::enemy::ENEMY_BASE_HP;
use arena_server::game::state::phase;
use arena_server::game::{Action, FrameInput, SimulationState};
use arena_server::ws::protocol::GameEvent;

const FRAME: f32 = 1.0 / 60.0;

fn round(seed: u64) -> SimulationState {
    SimulationState::bootstrap(Uuid::new_v4(), seed, 9, |_| {}).expect("bootstrap")
}

fn actions(list: &[Action]) -> FrameInput {
    FrameInput {
        actions: list.to_vec(),
        ..FrameInput::default()
    }
}

#[test]
fn bootstrap_spawns_eight_armed_enemies() {
    let mut phases = Vec::new();
    let state = SimulationState::bootstrap(Uuid::new_v4(), 7, 9, |p| phases.push(p)).unwrap();

    assert_eq!(state.enemies.len(), 8);
    for enemy in &state.enemies {
        assert_eq!(enemy.hp, ENEMY_BASE_HP);
        assert!(!enemy.dead);
        assert!(WeaponKind::ENEMY_POOL.contains(&enemy.weapon));
    }
    assert_eq!(state.entrants_alive(), 9);
    assert_eq!(
        phases,
        vec![
            phase::WORLD_READY,
            phase::AFTER_EMERGENCY,
            phase::AFTER_COMMONS,
            phase::AFTER_TRAFFIC,
            phase::READY,
        ]
    );
}

#[test]
fn world_is_identical_for_every_seed() {
    let a = round(1);
    let b = round(99);
    assert_eq!(a.world.buildings.len(), b.world.buildings.len());
    assert_eq!(a.world.roads.len(), b.world.roads.len());
    assert_eq!(a.world.parked.len(), b.world.parked.len());
}

#[test]
fn ak47_empties_its_magazine_in_thirty_shots() {
    let mut state = round(3);
    assert!(state.arsenal.select(WeaponKind::Ak47));
    let mut events = Vec::new();

    for _ in 0..30 {
        let outcome = CombatSystem::fire(&mut state, &mut events);
        assert!(matches!(outcome, FireOutcome::Hitscan { .. }));
    }
    assert_eq!(state.arsenal.slot(WeaponKind::Ak47).mag, 0);
    assert_eq!(
        CombatSystem::fire(&mut state, &mut events),
        FireOutcome::Dry
    );
    assert_eq!(state.player.shots_fired, 30);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, GameEvent::ShotFired { .. }))
            .count(),
        30
    );
}

#[test]
fn grenade_at_an_enemys_feet_knocks_it_down() {
    let mut state = round(5);
    let feet = state
        .physics
        .body(state.enemies[0].body)
        .map(|b| b.feet())
        .unwrap();
    let mut events = Vec::new();

    CombatSystem::explode(&mut state, feet, GRENADE_RADIUS, GRENADE_POWER, &mut events);

    assert!(state.enemies[0].dead);
    assert_eq!(state.enemies[0].hp, 0.0);
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::Explosion { .. })));
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::EnemyDown { .. })));
}

#[test]
fn player_enters_and_leaves_a_parked_vehicle() {
    let mut state = round(11);
    let (position, size) = {
        let v = &state.vehicles.fleet[0];
        (v.position, v.size)
    };
    if let Some(body) = state.physics.body_mut(state.player.body) {
        body.position = Vec3::new(position.x + size.x * 0.5 + 1.0, 0.94, position.z);
    }

    let events = state
        .frame(FRAME, &actions(&[Action::ToggleVehicle]))
        .unwrap();
    assert!(state.vehicles.drive.vehicle.is_some());
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::VehicleEntered { .. })));

    // entering again while driving does nothing
    assert!(state
        .vehicles
        .enter(&mut state.physics, state.player.body)
        .is_none());

    let events = state
        .frame(FRAME, &actions(&[Action::ToggleVehicle]))
        .unwrap();
    assert!(state.vehicles.drive.vehicle.is_none());
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::VehicleExited { .. })));
}

#[test]
fn reload_refills_from_reserve() {
    let mut state = round(13);
    let mut events = Vec::new();
    let glock = state.arsenal.selected();
    let full = state.arsenal.slot(glock);
    CombatSystem::fire(&mut state, &mut events);

    let events = state.frame(FRAME, &actions(&[Action::Reload])).unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::ReloadStarted { .. })));
    assert!(state.arsenal.is_reloading());

    let mut finished = false;
    for _ in 0..240 {
        let events = state.frame(FRAME, &FrameInput::default()).unwrap();
        if events
            .iter()
            .any(|e| matches!(e, GameEvent::ReloadFinished { .. }))
        {
            finished = true;
            break;
        }
    }
    assert!(finished);
    let slot = state.arsenal.slot(glock);
    assert_eq!(slot.mag, full.mag);
    assert_eq!(slot.reserve, full.reserve - 1);
}

#[test]
fn trigger_tap_between_frames_fires_once() {
    let mut state = round(19);
    assert_eq!(state.arsenal.selected(), WeaponKind::Glock);
    let tap = FrameInput {
        trigger: false,
        pressed: true,
        ..FrameInput::default()
    };

    let events = state.frame(FRAME, &tap).unwrap();
    assert_eq!(state.player.shots_fired, 1);
    assert!(events
        .iter()
        .any(|e| matches!(e, GameEvent::ShotFired { hostile: false, .. })));

    state.frame(FRAME, &FrameInput::default()).unwrap();
    assert_eq!(state.player.shots_fired, 1);
}

#[test]
fn idle_frames_run_without_errors() {
    let mut state = round(17);
    for _ in 0..300 {
        state.frame(FRAME, &FrameInput::default()).unwrap();
    }
    assert!(state.frame >= 1);
    assert!(state.elapsed > 0.0);
    assert!(state.view.eye.is_finite());
}
