use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use candle_core::Device;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::inference::ModelRegistry;
use crate::narrative::Narrator;
use crate::speech::SpeechSynthesizer;
use crate::storage::{DiskStore, MediaStore};

/// Everything a request handler needs, constructed once at startup and
/// immutable afterwards.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub registry: Arc<ModelRegistry>,
    pub narrator: Arc<Narrator>,
    pub speech: Arc<SpeechSynthesizer>,
    pub media: Arc<dyn MediaStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let options = SqliteConnectOptions::from_str(&config.database_url)
            .context("parse DATABASE_URL")?
            .create_if_missing(true)
            .foreign_keys(true);
        let db = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("connect to database")?;

        tokio::fs::create_dir_all(&config.upload_dir)
            .await
            .with_context(|| format!("create upload dir {}", config.upload_dir.display()))?;

        let registry = Arc::new(ModelRegistry::load(&config.models_dir, &Device::Cpu));
        let loaded = crate::inference::Category::ALL
            .iter()
            .filter(|c| registry.is_loaded(**c))
            .count();
        tracing::info!(loaded, total = crate::inference::Category::ALL.len(), "model registry ready");
        let narrator = Arc::new(Narrator::new(config.narrative.clone()));
        let speech = Arc::new(SpeechSynthesizer::new(config.speech.clone()));
        let media = Arc::new(DiskStore::new(config.upload_dir.clone())) as Arc<dyn MediaStore>;

        Ok(Self {
            db,
            config,
            registry,
            narrator,
            speech,
            media,
        })
    }

    /// State over an in-memory database with every external collaborator
    /// left unconfigured: no models, no narrative API key, no TTS endpoint.
    #[cfg(test)]
    pub async fn for_tests() -> Self {
        use crate::config::{NarrativeConfig, SessionConfig, SpeechConfig};

        let db = test_pool().await;
        let upload_dir = test_dir();
        tokio::fs::create_dir_all(&upload_dir)
            .await
            .expect("create test upload dir");

        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            session: SessionConfig {
                secret: "test-secret".into(),
                issuer: "auralens-test".into(),
                ttl_minutes: 60,
            },
            narrative: NarrativeConfig {
                api_key: None,
                api_url: "http://localhost:0".into(),
                model: "test-model".into(),
                temperature: 0.4,
                max_tokens: 1000,
            },
            speech: SpeechConfig {
                endpoint: None,
                language: "te".into(),
            },
            upload_dir: upload_dir.clone(),
            models_dir: upload_dir.join("models"),
        });

        Self {
            db,
            registry: Arc::new(ModelRegistry::empty()),
            narrator: Arc::new(Narrator::new(config.narrative.clone())),
            speech: Arc::new(SpeechSynthesizer::new(config.speech.clone())),
            media: Arc::new(DiskStore::new(upload_dir)) as Arc<dyn MediaStore>,
            config,
        }
    }
}

/// In-memory SQLite pool with foreign keys on and migrations applied.
/// Single connection: every handle must see the same in-memory database.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("parse memory url")
        .foreign_keys(true);
    let db = SqlitePoolOptions::new()
        .min_connections(1)
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("connect to memory db");
    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("run migrations");
    db
}

#[cfg(test)]
fn test_dir() -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    std::env::temp_dir().join(format!(
        "auralens-test-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ))
}
