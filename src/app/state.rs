//! Application state shared across routes

use std::sync::Arc;

use crate::assets::AssetLoader;
use crate::config::Config;
use crate::game::SessionRegistry;

use super::Diagnostics;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionRegistry>,
    pub assets: Arc<AssetLoader>,
    pub diagnostics: Arc<Diagnostics>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let assets = Arc::new(AssetLoader::from_config(&config));
        Self::with_assets(config, assets)
    }

    /// State with a caller-provided asset loader
    pub fn with_assets(config: Config, assets: Arc<AssetLoader>) -> Self {
        Self {
            config: Arc::new(config),
            sessions: Arc::new(SessionRegistry::new()),
            assets,
            diagnostics: Arc::new(Diagnostics::new()),
        }
    }
}
