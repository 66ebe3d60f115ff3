pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use anyhow::Result;

use crate::config::AppConfig;
use crate::infra::{cache::PageCache, db::Db, storage::MediaStorage};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: PageCache,
    pub storage: MediaStorage,
    pub upload_max_bytes: usize,
    pub admin_token: Option<String>,
    pub paseto_access_key: [u8; 32],
    pub access_ttl_minutes: u64,
}

impl AppState {
    /// Connects the database, applies migrations and prepares the media
    /// root.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let db = Db::connect(config).await?;
        db.migrate().await?;
        let storage = MediaStorage::new(config).await?;

        Ok(Self {
            db,
            cache: PageCache::new(config.index_cache_ttl_seconds),
            storage,
            upload_max_bytes: config.upload_max_bytes,
            admin_token: config.admin_token.clone(),
            paseto_access_key: config.paseto_access_key,
            access_ttl_minutes: config.access_ttl_minutes,
        })
    }
}
