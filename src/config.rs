use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl_minutes: i64,
}

/// Settings for the hosted chat-completion API that writes the bilingual
/// narratives. `api_key` being absent leaves the narrator disabled.
#[derive(Debug, Clone, Deserialize)]
pub struct NarrativeConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Settings for the text-to-speech service. No endpoint means no audio.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeechConfig {
    pub endpoint: Option<String>,
    pub language: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
    pub narrative: NarrativeConfig,
    pub speech: SpeechConfig,
    pub upload_dir: PathBuf,
    pub models_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://auralens.db?mode=rwc".into());
        let session = SessionConfig {
            secret: std::env::var("SESSION_SECRET")?,
            issuer: std::env::var("SESSION_ISSUER").unwrap_or_else(|_| "auralens".into()),
            ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 12),
        };
        let narrative = NarrativeConfig {
            api_key: std::env::var("GROQ_API_KEY").ok(),
            api_url: std::env::var("GROQ_API_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai/v1/chat/completions".into()),
            model: std::env::var("GROQ_MODEL")
                .unwrap_or_else(|_| "llama-3.3-70b-versatile".into()),
            temperature: 0.4,
            max_tokens: 1000,
        };
        let speech = SpeechConfig {
            endpoint: std::env::var("TTS_ENDPOINT").ok(),
            language: std::env::var("TTS_LANGUAGE").unwrap_or_else(|_| "te".into()),
        };
        let upload_dir = std::env::var("UPLOAD_DIR")
            .unwrap_or_else(|_| "static/uploads".into())
            .into();
        let models_dir = std::env::var("MODELS_DIR")
            .unwrap_or_else(|_| "models".into())
            .into();
        Ok(Self {
            database_url,
            session,
            narrative,
            speech,
            upload_dir,
            models_dir,
        })
    }
}
