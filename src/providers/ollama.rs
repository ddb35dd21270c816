use anyhow::{Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use super::retry::{
    RATE_LIMIT_BASE_DELAY, RATE_LIMIT_MAX_RETRIES, is_rate_limited, retry_after, wait_with_backoff,
};
use crate::collaborators::{CollabFuture, TranslationBackend, TranslationContext};
use crate::error::CoreError;

const DEFAULT_URL: &str = "http://localhost:11434";
pub(crate) const DEFAULT_MODEL: &str = "deepseek-r1:1.5b";

const OPEN_TAG: &str = "<translation>";
const CLOSE_TAG: &str = "</translation>";

/// Local model served by Ollama's `/api/generate`.
#[derive(Debug, Clone)]
pub struct Ollama {
    url: String,
    model: String,
}

impl Default for Ollama {
    fn default() -> Self {
        Self::new()
    }
}

impl Ollama {
    pub fn new() -> Self {
        Self {
            url: std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_URL.to_string()),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        if !url.trim().is_empty() {
            self.url = url;
        }
        self
    }

    async fn request(&self, prompt: String) -> Result<String> {
        let client = reqwest::Client::new();
        let url = format!("{}/api/generate", self.url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });

        let mut attempt = 0usize;
        let mut delay = RATE_LIMIT_BASE_DELAY;
        loop {
            attempt += 1;
            let response = client.post(&url).json(&body).send().await?;

            let status = response.status();
            let retry_after = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            if status.is_success() {
                let payload: GenerateResponse = serde_json::from_str(&text)
                    .map_err(|err| anyhow!("failed to parse Ollama response JSON: {}", err))?;
                return Ok(extract_translation(&payload.response));
            }
            if is_rate_limited(status, &text) && attempt < RATE_LIMIT_MAX_RETRIES {
                delay = wait_with_backoff("Ollama", attempt, delay, retry_after).await;
                continue;
            }
            return Err(anyhow!("Ollama API error ({}): {}", status, text.trim()));
        }
    }
}

impl TranslationBackend for Ollama {
    fn name(&self) -> &str {
        "ollama"
    }

    fn translate<'a>(
        &'a self,
        text: &'a str,
        target_lang: &'a str,
        context: &'a TranslationContext,
    ) -> CollabFuture<'a, String> {
        Box::pin(async move {
            self.request(build_prompt(text, target_lang, context))
                .await
                .map_err(|err| CoreError::collaborator(format!("{:#}", err)))
        })
    }
}

fn build_prompt(text: &str, target_lang: &str, context: &TranslationContext) -> String {
    let mut prompt = String::from(
        "You are a professional translator of manga dialogue.\n\
         Rules:\n\
         1. Your answer must contain exactly one <translation> element holding only the translated text.\n\
         2. Do not put notes, markdown or formatting inside the <translation> element.\n\
         3. Prefer natural localization over a literal translation.\n\
         4. Keep names and specialized terms as they are.\n\
         5. End your answer with the <translation> element.\n",
    );
    if !context.page_text.trim().is_empty() {
        prompt.push_str("\nAll text on this page, for context:\n");
        prompt.push_str(&context.page_text);
        prompt.push('\n');
    }
    if !context.prior.is_empty() {
        prompt.push_str("\nLines already translated on this page:\n");
        for (source, translation) in &context.prior {
            prompt.push_str(&format!("{} => {}\n", source, translation));
        }
    }
    prompt.push_str(&format!(
        "\nTranslate the following text into {}:\n'{}'",
        target_lang, text
    ));
    prompt
}

/// Content of the last `<translation>` element, or the whole trimmed reply.
fn extract_translation(output: &str) -> String {
    let output = output.trim();
    let mut found = None;
    let mut rest = output;
    while let Some(start) = rest.find(OPEN_TAG) {
        let after = &rest[start + OPEN_TAG.len()..];
        let Some(end) = after.find(CLOSE_TAG) else {
            break;
        };
        found = Some(after[..end].trim());
        rest = &after[end + CLOSE_TAG.len()..];
    }
    found.unwrap_or(output).to_string()
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}
