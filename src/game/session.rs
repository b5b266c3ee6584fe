//! Session task and registry
//!
//! One WebSocket connection owns one `GameSession`. The session task is the
//! only writer of its `SimulationState`: inputs come in over an mpsc channel
//! and render frames go out over a broadcast channel.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::Diagnostics;
use crate::assets::AssetLoader;
use crate::config::Config;
use crate::util::time::FrameClock;
use crate::ws::protocol::{ClientMsg, Outcome, ServerMsg, SessionStats, Stake};

use super::enemy::{EnemyAI, MAX_ENEMIES};
use super::snapshot::SnapshotBuilder;
use super::state::{phase, SimulationState};
use super::FrameInput;

/// Startup parameters taken from the connection query
#[derive(Debug, Clone, PartialEq)]
pub struct SessionParams {
    pub seed: u64,
    /// Player plus enemies
    pub entrants: u32,
    pub stake: Option<Stake>,
}

impl SessionParams {
    pub fn new(
        players: Option<u32>,
        default_entrants: u32,
        seed: u64,
        token: Option<String>,
        amount: Option<f64>,
    ) -> Self {
        let entrants = players
            .unwrap_or(default_entrants)
            .clamp(2, MAX_ENEMIES as u32 + 1);
        let stake = match (token, amount) {
            (Some(token), Some(amount)) if !token.trim().is_empty() && amount.is_finite() && amount > 0.0 => {
                Some(Stake { token, amount })
            }
            _ => None,
        };
        Self {
            seed,
            entrants,
            stake,
        }
    }
}

/// Live view of a session for the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session_id: Uuid,
    pub entrants: u32,
    pub entrants_alive: usize,
    pub frames: u64,
    pub phase: String,
    pub started_at: DateTime<Utc>,
}

/// Handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    pub id: Uuid,
    pub input_tx: mpsc::Sender<ClientMsg>,
    pub frame_tx: broadcast::Sender<ServerMsg>,
    status: Arc<RwLock<SessionStatus>>,
}

impl SessionHandle {
    pub fn status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.frame_tx.subscribe()
    }
}

/// Registry of all live sessions
pub struct SessionRegistry {
    sessions: DashMap<Uuid, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    pub fn insert(&self, handle: SessionHandle) {
        self.sessions.insert(handle.id, handle);
    }

    pub fn remove(&self, id: &Uuid) -> Option<SessionHandle> {
        self.sessions.remove(id).map(|(_, h)| h)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The simulation task behind one connection
pub struct GameSession {
    id: Uuid,
    params: SessionParams,
    frame_rate: u32,
    input_rx: mpsc::Receiver<ClientMsg>,
    frame_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    status: Arc<RwLock<SessionStatus>>,
    assets: Arc<AssetLoader>,
    diagnostics: Arc<Diagnostics>,
}

impl GameSession {
    pub fn new(
        id: Uuid,
        params: SessionParams,
        config: &Config,
        assets: Arc<AssetLoader>,
        diagnostics: Arc<Diagnostics>,
    ) -> (Self, SessionHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (frame_tx, _) = broadcast::channel(64);
        let status = Arc::new(RwLock::new(SessionStatus {
            session_id: id,
            entrants: params.entrants,
            entrants_alive: params.entrants as usize,
            frames: 0,
            phase: phase::BOOT.to_string(),
            started_at: Utc::now(),
        }));

        let handle = SessionHandle {
            id,
            input_tx,
            frame_tx: frame_tx.clone(),
            status: status.clone(),
        };

        let session = Self {
            id,
            params,
            frame_rate: config.frame_rate.max(1),
            input_rx,
            frame_tx,
            snapshot_builder: SnapshotBuilder::new(config.snapshot_interval()),
            status,
            assets,
            diagnostics,
        };

        (session, handle)
    }

    /// Bootstrap the simulation and run the frame loop until the round is
    /// decided or the client goes away
    pub async fn run(mut self) {
        info!(
            session_id = %self.id,
            seed = self.params.seed,
            entrants = self.params.entrants,
            "Session started"
        );
        self.report(phase::BOOT);

        let assets = self.assets.prefetch().await;
        debug!(
            session_id = %self.id,
            fetched = assets.fetched(),
            placeholders = assets.placeholders(),
            "Assets resolved"
        );
        self.report(phase::TEXTURES_READY);

        let bootstrapped = SimulationState::bootstrap(
            self.id,
            self.params.seed,
            self.params.entrants,
            |p| self.report(p),
        );
        let mut state = match bootstrapped {
            Ok(state) => state,
            Err(e) => {
                error!(session_id = %self.id, error = %e, "Session bootstrap failed");
                self.report(&format!("error:{}", e));
                let _ = self.frame_tx.send(ServerMsg::Error {
                    code: "bootstrap_failed".to_string(),
                    message: e.to_string(),
                });
                return;
            }
        };

        let _ = self.frame_tx.send(ServerMsg::World {
            world: Box::new(state.world.clone()),
            assets,
        });

        let frame_duration = Duration::from_micros(1_000_000 / self.frame_rate as u64);
        let mut frame_interval = interval(frame_duration);
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut clock = FrameClock::new();
        let mut input = FrameInput::default();

        let outcome = loop {
            frame_interval.tick().await;

            // Drain input queue
            if !self.process_inputs(&mut input) {
                info!(session_id = %self.id, "Client left, abandoning session");
                break Outcome::Abandoned;
            }

            let frame_input = input.consume();
            match state.frame(clock.tick(), &frame_input) {
                Ok(events) => self.snapshot_builder.record(events),
                Err(e) => {
                    warn!(session_id = %self.id, frame = state.frame, error = %e, "Frame failed");
                    self.report(&format!("loop-error:{}", e));
                }
            }

            {
                let mut status = self.status.write();
                status.frames = state.frame;
                status.entrants_alive = state.entrants_alive();
            }

            if state.outcome.is_some() {
                self.snapshot_builder.force_next();
            }

            if self.snapshot_builder.should_send() {
                let frame = self.snapshot_builder.build(&state, frame_input.seq);
                let _ = self.frame_tx.send(ServerMsg::Frame(Box::new(frame)));
            }

            if let Some(outcome) = state.outcome {
                break outcome;
            }
        };

        let stats = self.build_stats(&state);
        info!(
            session_id = %self.id,
            ?outcome,
            frames = stats.frames,
            kills = stats.kills,
            placement = stats.placement,
            "Session ended"
        );
        self.report(phase::ENDED);
        let _ = self.frame_tx.send(ServerMsg::SessionEnd { outcome, stats });
    }

    /// Fold every pending message into `input`. Returns false once the client
    /// has left.
    fn process_inputs(&mut self, input: &mut FrameInput) -> bool {
        loop {
            match self.input_rx.try_recv() {
                Ok(ClientMsg::Ping { t }) => {
                    let _ = self.frame_tx.send(ServerMsg::Pong { t });
                }
                Ok(ClientMsg::Leave) => return false,
                Ok(msg) => {
                    input.apply(&msg);
                }
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Publish a lifecycle milestone to diagnostics, status and the client
    fn report(&self, phase: &str) {
        self.diagnostics.set_phase(phase);
        self.status.write().phase = phase.to_string();
        let _ = self.frame_tx.send(ServerMsg::Phase {
            phase: phase.to_string(),
        });
    }

    fn build_stats(&self, state: &SimulationState) -> SessionStats {
        let standing = EnemyAI::active_count(&state.enemies);
        SessionStats {
            duration_secs: state.elapsed as u32,
            frames: state.frame,
            entrants: self.params.entrants,
            enemies_down: state.enemies.iter().filter(|e| e.dead).count() as u32,
            kills: state.player.kills,
            shots_fired: state.player.shots_fired,
            shots_hit: state.player.shots_hit,
            damage_taken: state.player.damage_taken,
            placement: standing as u32 + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetError, AssetFetcher};
    use bytes::Bytes;
    use futures::future::BoxFuture;

    struct Offline;

    impl AssetFetcher for Offline {
        fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, AssetError>> {
            Box::pin(async move { Err(AssetError::Unavailable(url.to_string())) })
        }
    }

    fn spawn_session() -> (GameSession, SessionHandle, Arc<Diagnostics>) {
        let config = Config::default();
        let assets = Arc::new(AssetLoader::new(
            Arc::new(Offline),
            None,
            Duration::from_millis(10),
            Duration::from_millis(10),
        ));
        let diagnostics = Arc::new(Diagnostics::new());
        let params = SessionParams::new(Some(3), 9, 42, None, None);
        let (session, handle) =
            GameSession::new(Uuid::new_v4(), params, &config, assets, diagnostics.clone());
        (session, handle, diagnostics)
    }

    #[test]
    fn params_clamp_entrants_and_require_full_stake() {
        let p = SessionParams::new(None, 9, 1, Some("TPC".into()), Some(25.0));
        assert_eq!(p.entrants, 9);
        assert_eq!(
            p.stake,
            Some(Stake {
                token: "TPC".into(),
                amount: 25.0
            })
        );

        let p = SessionParams::new(Some(1), 9, 1, Some("TPC".into()), None);
        assert_eq!(p.entrants, 2);
        assert!(p.stake.is_none());

        let p = SessionParams::new(Some(500), 9, 1, None, Some(f64::NAN));
        assert_eq!(p.entrants, MAX_ENEMIES as u32 + 1);
        assert!(p.stake.is_none());
    }

    #[test]
    fn registry_tracks_handles() {
        let (_session, handle, _) = spawn_session();
        let registry = SessionRegistry::new();
        registry.insert(handle.clone());
        assert_eq!(registry.active_sessions(), 1);
        assert_eq!(registry.get(&handle.id).map(|h| h.id), Some(handle.id));
        assert_eq!(handle.status().phase, phase::BOOT);
        assert!(registry.remove(&handle.id).is_some());
        assert_eq!(registry.active_sessions(), 0);
    }

    #[tokio::test]
    async fn leave_abandons_after_world_is_sent() {
        let (session, handle, diagnostics) = spawn_session();
        let mut rx = handle.subscribe();
        handle.input_tx.send(ClientMsg::Leave).await.unwrap();
        session.run().await;

        let mut phases = Vec::new();
        let mut manifest = None;
        let mut outcome = None;
        while let Ok(msg) = rx.try_recv() {
            match msg {
                ServerMsg::Phase { phase } => phases.push(phase),
                ServerMsg::World { assets, .. } => manifest = Some(assets),
                ServerMsg::SessionEnd { outcome: o, .. } => outcome = Some(o),
                _ => {}
            }
        }

        // offline: every model is announced as a placeholder
        let manifest = manifest.expect("world message");
        assert_eq!(manifest.fetched(), 0);
        assert!(manifest.placeholders() > 0);
        assert_eq!(outcome, Some(Outcome::Abandoned));
        assert_eq!(phases.first().map(String::as_str), Some(phase::BOOT));
        assert!(phases.iter().any(|p| p == phase::TEXTURES_READY));
        assert!(phases.iter().any(|p| p == phase::READY));
        assert_eq!(phases.last().map(String::as_str), Some(phase::ENDED));
        assert_eq!(diagnostics.phase(), phase::ENDED);
        assert_eq!(handle.status().phase, phase::ENDED);
    }
}
