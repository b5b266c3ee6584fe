//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{GameSession, SessionParams};
use crate::http::routes::AppError;
use crate::util::rate_limit::InputRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for a WebSocket connection
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Entrant count, the player included
    pub players: Option<u32>,
    /// Stake token symbol, shown on the HUD only
    pub token: Option<String>,
    /// Stake amount, shown on the HUD only
    pub amount: Option<f64>,
    /// Fixed seed for a reproducible round
    pub seed: Option<u64>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    if state.sessions.active_sessions() >= state.config.max_sessions {
        warn!(
            active = state.sessions.active_sessions(),
            "Session limit reached, refusing upgrade"
        );
        return Err(AppError::Unavailable("Session limit reached".to_string()));
    }

    let params = SessionParams::new(
        query.players,
        state.config.default_entrants,
        query.seed.unwrap_or_else(rand::random),
        query.token,
        query.amount,
    );
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, params, state)))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, params: SessionParams, state: AppState) {
    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, entrants = params.entrants, "New WebSocket connection");

    let (session, handle) = GameSession::new(
        session_id,
        params.clone(),
        &state.config,
        state.assets.clone(),
        state.diagnostics.clone(),
    );
    // Subscribe before the session runs so no bootstrap message is missed
    let frame_rx = handle.subscribe();
    let input_tx = handle.input_tx.clone();

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        session_id,
        seed: params.seed,
        entrants: params.entrants,
        server_time: unix_millis(),
        stake: params.stake,
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(session_id = %session_id, error = %e, "Failed to send welcome");
        return;
    }

    state.sessions.insert(handle);
    let registry = state.sessions.clone();
    tokio::spawn(async move {
        session.run().await;
        registry.remove(&session_id);
    });

    run_connection(session_id, ws_sink, ws_stream, input_tx, frame_rx).await;

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Pump frames out and client messages in until either side is done
async fn run_connection(
    session_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    input_tx: mpsc::Sender<ClientMsg>,
    mut frame_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = InputRateLimiter::new();

    // Spawn writer task: session frames -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match frame_rx.recv().await {
                Ok(msg) => {
                    let last = matches!(msg, ServerMsg::SessionEnd { .. } | ServerMsg::Error { .. });
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                        break;
                    }
                    if last {
                        let _ = ws_sink.send(Message::Close(None)).await;
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Frames are full state; dropping some is harmless
                    warn!(session_id = %session_id, lagged_count = n, "Client lagged, skipping frames");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(session_id = %session_id, "Frame channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> session
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(session_id = %session_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        if input_tx.send(msg).await.is_err() {
                            debug!(session_id = %session_id, "Input channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Tell the session the client is gone
    let _ = input_tx.send(ClientMsg::Leave).await;

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
