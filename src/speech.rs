use serde::Serialize;
use time::macros::format_description;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::config::SpeechConfig;
use crate::storage::MediaStore;

const TELUGU_MARKER: &str = "[TELUGU]";

#[derive(Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    language: &'a str,
}

/// Client for the text-to-speech service voicing the Telugu half of a
/// narrative. Every failure degrades to "no audio"; the enclosing request
/// still succeeds.
pub struct SpeechSynthesizer {
    client: reqwest::Client,
    config: SpeechConfig,
}

impl SpeechSynthesizer {
    pub fn new(config: SpeechConfig) -> Self {
        if config.endpoint.is_none() {
            warn!("TTS_ENDPOINT not set; audio generation disabled");
        }
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Synthesize spoken audio for a narrative, returning the stored filename
    /// or None when audio could not be produced.
    pub async fn synthesize(&self, narrative: &str, media: &dyn MediaStore) -> Option<String> {
        let Some(endpoint) = self.config.endpoint.as_deref() else {
            return None;
        };

        let text = strip_markup(telugu_portion(narrative));
        if text.trim().is_empty() {
            warn!("nothing to voice; skipping audio");
            return None;
        }

        let resp = match self
            .client
            .post(endpoint)
            .json(&TtsRequest {
                text: &text,
                language: &self.config.language,
            })
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "audio generation failed");
                return None;
            }
        };

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "audio generation rejected");
            return None;
        }

        let bytes = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "audio response unreadable");
                return None;
            }
        };

        let filename = format!("audio_{}.mp3", timestamp());
        if let Err(e) = media.save(&filename, bytes).await {
            warn!(error = %e, "audio file write failed");
            return None;
        }

        info!(%filename, "audio generated");
        Some(filename)
    }
}

/// Timestamp suffix used for generated media names, e.g. "20260829143000".
pub fn timestamp() -> String {
    let fmt = format_description!("[year][month][day][hour][minute][second]");
    OffsetDateTime::now_utc()
        .format(&fmt)
        .unwrap_or_else(|_| "00000000000000".into())
}

/// Part of the narrative after the Telugu marker, or the whole text when the
/// marker is absent.
fn telugu_portion(narrative: &str) -> &str {
    match narrative.split_once(TELUGU_MARKER) {
        Some((_, telugu)) => telugu,
        None => narrative,
    }
}

fn strip_markup(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '*' | '#' | '_')).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telugu_portion_follows_marker() {
        let text = "[ENGLISH]\nall good\n[TELUGU]\nఅంతా బాగుంది";
        assert_eq!(telugu_portion(text), "\nఅంతా బాగుంది");
    }

    #[test]
    fn telugu_portion_falls_back_to_full_text() {
        assert_eq!(telugu_portion("no marker here"), "no marker here");
    }

    #[test]
    fn strip_markup_removes_formatting_characters() {
        assert_eq!(strip_markup("**bold** #head _under_"), "bold head under");
    }

    #[test]
    fn timestamp_is_fourteen_digits() {
        let ts = timestamp();
        assert_eq!(ts.len(), 14);
        assert!(ts.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn disabled_synthesizer_yields_no_audio() {
        struct NoStore;
        #[axum::async_trait]
        impl MediaStore for NoStore {
            async fn save(&self, _f: &str, _b: bytes::Bytes) -> anyhow::Result<()> {
                panic!("disabled synthesizer must not write media");
            }
        }

        let synth = SpeechSynthesizer::new(SpeechConfig {
            endpoint: None,
            language: "te".into(),
        });
        assert_eq!(synth.synthesize("[TELUGU] text", &NoStore).await, None);
    }
}
