//! Model and texture acquisition
//!
//! Every asset has an ordered list of sources. Each source is raced against
//! a timeout and the first one that answers wins; when all of them fail the
//! caller gets a procedural placeholder instead of an error. Successful
//! downloads are cached per key for the lifetime of the server. Placeholders
//! are not, so a later session retries the network.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::{join_all, BoxFuture};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::game::armory::WeaponKind;
use crate::game::enemy::CharacterModel;
use crate::game::vehicles::VehicleKind;

/// Ground texture used for lawns and courts
pub const GRASS_TEXTURE: &str = "https://threejs.org/examples/textures/terrain/grasslight-big.jpg";
const GRASS_SOURCES: &[&str] = &[GRASS_TEXTURE];

/// Something that can fetch the raw bytes behind a URL
pub trait AssetFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, AssetError>>;
}

/// Fetcher backed by a shared `reqwest` client
#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, AssetError>> {
        Box::pin(async move {
            let response = self.client.get(url).send().await?;
            if !response.status().is_success() {
                return Err(AssetError::Status {
                    url: url.to_string(),
                    status: response.status().as_u16(),
                });
            }
            Ok(response.bytes().await?)
        })
    }
}

/// What an asset is used for; decides its placeholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    Character,
    Vehicle,
    Weapon,
    Texture,
}

/// Stand-in geometry when every source failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placeholder {
    Capsule,
    Box,
    /// Flat procedural fill
    Procedural,
}

impl AssetCategory {
    pub fn placeholder(self) -> Placeholder {
        match self {
            AssetCategory::Character => Placeholder::Capsule,
            AssetCategory::Vehicle | AssetCategory::Weapon => Placeholder::Box,
            AssetCategory::Texture => Placeholder::Procedural,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadedAsset {
    Fetched { url: String, bytes: Bytes },
    Placeholder(Placeholder),
}

impl LoadedAsset {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, LoadedAsset::Placeholder(_))
    }

    pub fn status(&self) -> AssetStatus {
        match self {
            LoadedAsset::Fetched { url, .. } => AssetStatus::Fetched { url: url.clone() },
            LoadedAsset::Placeholder(shape) => AssetStatus::Placeholder { shape: *shape },
        }
    }
}

/// How the client should draw one asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssetStatus {
    Fetched { url: String },
    Placeholder { shape: Placeholder },
}

/// Per-key outcome of a prefetch, sent to the client with the world
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssetManifest {
    pub assets: BTreeMap<String, AssetStatus>,
}

impl AssetManifest {
    pub fn get(&self, key: &str) -> Option<&AssetStatus> {
        self.assets.get(key)
    }

    pub fn fetched(&self) -> usize {
        self.assets.len() - self.placeholders()
    }

    pub fn placeholders(&self) -> usize {
        self.assets
            .values()
            .filter(|s| matches!(s, AssetStatus::Placeholder { .. }))
            .count()
    }
}

/// Loads and caches models and textures
pub struct AssetLoader {
    fetcher: Arc<dyn AssetFetcher>,
    cache: DashMap<String, LoadedAsset>,
    mirror: Option<String>,
    texture_timeout: Duration,
    model_timeout: Duration,
}

impl AssetLoader {
    pub fn new(
        fetcher: Arc<dyn AssetFetcher>,
        mirror: Option<String>,
        texture_timeout: Duration,
        model_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            cache: DashMap::new(),
            mirror: mirror.map(|m| m.trim_end_matches('/').to_string()),
            texture_timeout,
            model_timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(HttpFetcher::new()),
            config.asset_base_url.clone(),
            config.asset_timeout,
            config.model_timeout,
        )
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Load a model, trying the mirror first and then each source in order
    pub async fn load_model(
        &self,
        key: &str,
        category: AssetCategory,
        sources: &[&str],
    ) -> LoadedAsset {
        self.load(key, category, sources, self.model_timeout).await
    }

    pub async fn load_texture(&self, key: &str, url: &str) -> LoadedAsset {
        self.load(key, AssetCategory::Texture, &[url], self.texture_timeout)
            .await
    }

    async fn load(
        &self,
        key: &str,
        category: AssetCategory,
        sources: &[&str],
        timeout: Duration,
    ) -> LoadedAsset {
        if let Some(hit) = self.cache.get(key) {
            return hit.value().clone();
        }

        let mut urls: Vec<String> = Vec::with_capacity(sources.len() + 1);
        if let (Some(mirror), Some(first)) = (&self.mirror, sources.first()) {
            if let Some(name) = first.rsplit('/').next().filter(|n| !n.is_empty()) {
                urls.push(format!("{}/{}", mirror, name));
            }
        }
        urls.extend(sources.iter().map(|s| s.to_string()));

        let mut loaded = LoadedAsset::Placeholder(category.placeholder());
        for url in urls {
            let attempt = tokio::time::timeout(timeout, self.fetcher.fetch(&url)).await;
            match attempt {
                Ok(Ok(bytes)) => {
                    debug!(key, url = %url, size = bytes.len(), "Asset fetched");
                    loaded = LoadedAsset::Fetched { url, bytes };
                    break;
                }
                Ok(Err(e)) => debug!(key, url = %url, error = %e, "Asset source failed"),
                Err(_) => debug!(key, url = %url, ?timeout, "Asset source timed out"),
            }
        }

        match &loaded {
            LoadedAsset::Placeholder(placeholder) => {
                warn!(key, ?placeholder, "All asset sources failed, using placeholder");
            }
            LoadedAsset::Fetched { .. } => {
                self.cache.insert(key.to_string(), loaded.clone());
            }
        }
        loaded
    }

    /// Load everything a session draws, all at once. Never fails.
    pub async fn prefetch(&self) -> AssetManifest {
        let mut jobs: Vec<(&'static str, AssetCategory, &'static [&'static str], Duration)> =
            vec![("grass", AssetCategory::Texture, GRASS_SOURCES, self.texture_timeout)];
        jobs.extend(
            WeaponKind::ALL
                .iter()
                .map(|w| (w.display_name(), AssetCategory::Weapon, w.sources(), self.model_timeout)),
        );
        jobs.extend(
            CharacterModel::ALL
                .iter()
                .map(|m| (m.key(), AssetCategory::Character, m.sources(), self.model_timeout)),
        );
        jobs.extend(
            VehicleKind::ALL
                .iter()
                .map(|v| (v.key(), AssetCategory::Vehicle, v.sources(), self.model_timeout)),
        );

        let loaded = join_all(
            jobs.iter()
                .map(|&(key, category, sources, timeout)| self.load(key, category, sources, timeout)),
        )
        .await;

        let manifest = AssetManifest {
            assets: jobs
                .iter()
                .zip(loaded)
                .map(|(&(key, ..), asset)| (key.to_string(), asset.status()))
                .collect(),
        };
        info!(
            fetched = manifest.fetched(),
            placeholders = manifest.placeholders(),
            "Asset prefetch complete"
        );
        manifest
    }
}

/// Asset fetch errors. These never leave the loader.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Serves fixed bytes for known URLs, fails or hangs on the rest
    #[derive(Default)]
    struct MockFetcher {
        ok: Vec<String>,
        hang: Vec<String>,
        calls: Mutex<Vec<String>>,
    }

    impl AssetFetcher for MockFetcher {
        fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, AssetError>> {
            self.calls.lock().push(url.to_string());
            Box::pin(async move {
                if self.hang.iter().any(|u| u == url) {
                    futures::future::pending::<()>().await;
                }
                if self.ok.iter().any(|u| u == url) {
                    Ok(Bytes::from_static(b"glTF"))
                } else {
                    Err(AssetError::Unavailable(url.to_string()))
                }
            })
        }
    }

    fn loader(fetcher: Arc<MockFetcher>, mirror: Option<&str>) -> AssetLoader {
        AssetLoader::new(
            fetcher,
            mirror.map(str::to_string),
            Duration::from_millis(20),
            Duration::from_millis(20),
        )
    }

    #[tokio::test]
    async fn falls_back_to_next_source() {
        let fetcher = Arc::new(MockFetcher {
            ok: vec!["https://b/car.glb".into()],
            ..Default::default()
        });
        let assets = loader(fetcher.clone(), None);
        let loaded = assets
            .load_model("car", AssetCategory::Vehicle, &["https://a/car.glb", "https://b/car.glb"])
            .await;
        assert_eq!(
            loaded,
            LoadedAsset::Fetched {
                url: "https://b/car.glb".into(),
                bytes: Bytes::from_static(b"glTF"),
            }
        );
        assert_eq!(fetcher.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn hung_source_times_out_into_placeholder() {
        let fetcher = Arc::new(MockFetcher {
            hang: vec!["https://a/soldier.glb".into()],
            ..Default::default()
        });
        let assets = loader(fetcher, None);
        let loaded = assets
            .load_model("soldier", AssetCategory::Character, &["https://a/soldier.glb"])
            .await;
        assert_eq!(loaded, LoadedAsset::Placeholder(Placeholder::Capsule));
    }

    #[tokio::test]
    async fn only_fetched_assets_are_cached() {
        let fetcher = Arc::new(MockFetcher {
            ok: vec!["https://a/ak47.glb".into()],
            ..Default::default()
        });
        let assets = loader(fetcher.clone(), None);
        for _ in 0..3 {
            let loaded = assets
                .load_model("ak", AssetCategory::Weapon, &["https://a/ak47.glb"])
                .await;
            assert!(!loaded.is_placeholder());
        }
        assert_eq!(fetcher.calls.lock().len(), 1);
        assert_eq!(assets.cached(), 1);
    }

    #[tokio::test]
    async fn placeholders_are_retried() {
        let fetcher = Arc::new(MockFetcher::default());
        let assets = loader(fetcher.clone(), None);
        for _ in 0..3 {
            let loaded = assets
                .load_model("uzi", AssetCategory::Weapon, &["https://a/uzi.glb"])
                .await;
            assert_eq!(loaded, LoadedAsset::Placeholder(Placeholder::Box));
        }
        assert_eq!(fetcher.calls.lock().len(), 3);
        assert_eq!(assets.cached(), 0);
    }

    #[tokio::test]
    async fn mirror_is_tried_first() {
        let fetcher = Arc::new(MockFetcher {
            ok: vec!["https://mirror/ak47.glb".into()],
            ..Default::default()
        });
        let assets = loader(fetcher.clone(), Some("https://mirror/"));
        let loaded = assets
            .load_model("ak", AssetCategory::Weapon, &["https://a/ak47.glb"])
            .await;
        assert!(!loaded.is_placeholder());
        assert_eq!(fetcher.calls.lock().as_slice(), ["https://mirror/ak47.glb"]);
    }

    #[test]
    fn missing_texture_is_procedural() {
        let assets = loader(Arc::new(MockFetcher::default()), None);
        let loaded = tokio_test::block_on(assets.load_texture("grass", GRASS_TEXTURE));
        assert_eq!(loaded, LoadedAsset::Placeholder(Placeholder::Procedural));
    }

    #[tokio::test]
    async fn prefetch_never_fails() {
        let assets = loader(Arc::new(MockFetcher::default()), None);
        let manifest = assets.prefetch().await;
        assert_eq!(manifest.fetched(), 0);
        assert_eq!(
            manifest.placeholders(),
            1 + WeaponKind::ALL.len() + CharacterModel::ALL.len() + VehicleKind::ALL.len()
        );
        assert_eq!(
            manifest.get("Soldier"),
            Some(&AssetStatus::Placeholder {
                shape: Placeholder::Capsule
            })
        );
        assert_eq!(
            manifest.get("grass"),
            Some(&AssetStatus::Placeholder {
                shape: Placeholder::Procedural
            })
        );
    }

    #[tokio::test]
    async fn prefetch_loads_in_parallel() {
        let mut fetcher = MockFetcher::default();
        let mut urls: Vec<&str> = vec![GRASS_TEXTURE];
        urls.extend(WeaponKind::ALL.iter().flat_map(|w| w.sources().iter().copied()));
        urls.extend(CharacterModel::ALL.iter().flat_map(|m| m.sources().iter().copied()));
        urls.extend(VehicleKind::ALL.iter().flat_map(|v| v.sources().iter().copied()));
        fetcher.hang = urls.iter().map(|u| u.to_string()).collect();
        let assets = AssetLoader::new(
            Arc::new(fetcher),
            None,
            Duration::from_millis(50),
            Duration::from_millis(50),
        );

        let started = tokio::time::Instant::now();
        let manifest = assets.prefetch().await;
        let took = started.elapsed();

        assert_eq!(manifest.fetched(), 0);
        // one timeout per source in turn would be well over a second
        assert!(took < Duration::from_millis(600), "{took:?}");
    }
}
