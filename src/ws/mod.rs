//! WebSocket transport: one connection, one session

pub mod handler;
pub mod protocol;
