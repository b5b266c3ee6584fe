//! Arena Server - single-session last-man-standing arena simulation
//!
//! The library holds the whole simulation and the host around it:
//! - `game`: world generation, physics, combat, enemy AI, vehicles, camera
//!   and the per-session frame loop
//! - `assets`: model/texture acquisition with fallbacks and placeholders
//! - `ws` / `http`: the WebSocket session transport and the HTTP routes

pub mod app;
pub mod assets;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
