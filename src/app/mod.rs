//! Application wiring shared by the HTTP and WebSocket layers

pub mod diagnostics;
pub mod state;

pub use diagnostics::Diagnostics;
pub use state::AppState;
