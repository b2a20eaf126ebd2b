use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::NarrativeConfig;
use crate::inference::{Category, Verdict};

/// Outcome of narrative generation. The pipeline never fails on this step;
/// the presentation layer decides how each variant renders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Narrative {
    Generated(String),
    Failed(String),
}

impl Narrative {
    /// Raw text regardless of outcome; speech synthesis voices whatever the
    /// user will read, failure messages included.
    pub fn text(&self) -> &str {
        match self {
            Narrative::Generated(t) | Narrative::Failed(t) => t,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Client for the hosted chat-completion API producing bilingual scan
/// explanations. Constructed once at startup; without an API key it stays
/// disabled and every call reports a failed narrative.
pub struct Narrator {
    client: reqwest::Client,
    config: NarrativeConfig,
}

impl Narrator {
    pub fn new(config: NarrativeConfig) -> Self {
        if config.api_key.is_some() {
            info!(model = %config.model, "narrative generator ready");
        } else {
            warn!("GROQ_API_KEY not set; narratives will be unavailable");
        }
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub async fn explain(&self, category: Category, verdict: &Verdict) -> Narrative {
        let Some(api_key) = self.config.api_key.as_deref() else {
            return Narrative::Failed(
                "narrative generation is not configured on this server".into(),
            );
        };

        let prompt = build_prompt(category, verdict);
        let body = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: &prompt,
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let resp = match self
            .client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "narrative request failed");
                return Narrative::Failed(e.to_string());
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            error!(%status, detail, "narrative request rejected");
            return Narrative::Failed(format!("narrative service returned {status}"));
        }

        match resp.json::<ChatResponse>().await {
            Ok(parsed) => match parsed.choices.into_iter().next() {
                Some(choice) => Narrative::Generated(choice.message.content),
                None => Narrative::Failed("narrative service returned no choices".into()),
            },
            Err(e) => {
                error!(error = %e, "narrative response unreadable");
                Narrative::Failed(e.to_string())
            }
        }
    }
}

/// Deterministic prompt embedding the verdict, with the fixed bilingual
/// output-format instruction the result page depends on.
pub fn build_prompt(category: Category, verdict: &Verdict) -> String {
    format!(
        "Act as an experienced Radiologist, but explain the scan like you're talking \
to a patient or their family in everyday conversation.\n\
Look at the uploaded {category} scan image(s) and describe what you see in a simple, \
calm, and natural way.\n\n\
Clearly explain:\n\
- Whether the scan looks normal or if something looks off\n\
- Any visible problem and your confidence: {confidence}%\n\
- What the person should do next (Practical advice)\n\n\
Give the explanation in both English and Telugu.\n\
Format exactly like this:\n\n\
[ENGLISH]\n\
- What we see: (Simple explanation)\n\
- Why it matters: (Plain language)\n\
- What to do next: (Advice)\n\n\
[TELUGU]\n\
- ఏమి కనిపిస్తోంది: (సరళమైన వివరణ)\n\
- ఎందుకు ముఖ్యం: (సులభమైన కారణం)\n\
- తదుపరి ఏమి చేయాలి: (సాధారణ సూచనలు)\n",
        category = category,
        confidence = verdict.confidence,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::Status;

    fn verdict() -> Verdict {
        Verdict {
            status: Status::Detected,
            confidence: 87.5,
            simulated: false,
        }
    }

    #[test]
    fn prompt_embeds_category_and_confidence() {
        let prompt = build_prompt(Category::Pneumonia, &verdict());
        assert!(prompt.contains("pneumonia scan"));
        assert!(prompt.contains("confidence: 87.5%"));
    }

    #[test]
    fn prompt_requests_both_language_blocks() {
        let prompt = build_prompt(Category::Brain, &verdict());
        assert!(prompt.contains("[ENGLISH]"));
        assert!(prompt.contains("[TELUGU]"));
    }

    #[tokio::test]
    async fn narrator_without_key_reports_failure() {
        let narrator = Narrator::new(crate::config::NarrativeConfig {
            api_key: None,
            api_url: "http://localhost:0".into(),
            model: "test-model".into(),
            temperature: 0.4,
            max_tokens: 1000,
        });
        let out = narrator.explain(Category::Brain, &verdict()).await;
        assert!(matches!(out, Narrative::Failed(_)));
    }

    #[test]
    fn narrative_text_covers_both_variants() {
        assert_eq!(Narrative::Generated("a".into()).text(), "a");
        assert_eq!(Narrative::Failed("b".into()).text(), "b");
    }
}
