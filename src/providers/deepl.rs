use anyhow::{Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use super::retry::{
    RATE_LIMIT_BASE_DELAY, RATE_LIMIT_MAX_RETRIES, is_rate_limited, retry_after, wait_with_backoff,
};
use crate::collaborators::{CollabFuture, TranslationBackend, TranslationContext};
use crate::error::CoreError;

const FREE_BASE_URL: &str = "https://api-free.deepl.com/v2";
const PRO_BASE_URL: &str = "https://api.deepl.com/v2";

#[derive(Debug, Clone)]
pub struct DeepL {
    key: String,
    base_url: String,
}

impl DeepL {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let base_url = std::env::var("DEEPL_BASE_URL")
            .unwrap_or_else(|_| base_url_for_key(&key).to_string());
        Self { key, base_url }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn request(&self, text: &str, target_lang: &str, context: &str) -> Result<String> {
        let client = reqwest::Client::new();
        let url = format!("{}/translate", self.base_url.trim_end_matches('/'));
        let mut body = json!({
            "text": [text],
            "target_lang": target_lang,
        });
        if !context.trim().is_empty() {
            body["context"] = json!(context);
        }

        let mut attempt = 0usize;
        let mut delay = RATE_LIMIT_BASE_DELAY;
        loop {
            attempt += 1;
            let response = client
                .post(&url)
                .header("Authorization", format!("DeepL-Auth-Key {}", self.key))
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let retry_after = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            if status.is_success() {
                return extract_translation(&text);
            }
            if is_rate_limited(status, &text) && attempt < RATE_LIMIT_MAX_RETRIES {
                delay = wait_with_backoff("DeepL", attempt, delay, retry_after).await;
                continue;
            }
            return Err(anyhow!(
                "DeepL API error ({}): {}",
                status,
                extract_deepl_error(&text).unwrap_or(text)
            ));
        }
    }
}

impl TranslationBackend for DeepL {
    fn name(&self) -> &str {
        "deepl"
    }

    fn translate<'a>(
        &'a self,
        text: &'a str,
        target_lang: &'a str,
        context: &'a TranslationContext,
    ) -> CollabFuture<'a, String> {
        Box::pin(async move {
            self.request(text, target_lang, &context.page_text)
                .await
                .map_err(|err| CoreError::collaborator(format!("{:#}", err)))
        })
    }
}

/// Free-plan keys end in `:fx` and must use the free endpoint.
fn base_url_for_key(key: &str) -> &'static str {
    if key.trim_end().ends_with(":fx") {
        FREE_BASE_URL
    } else {
        PRO_BASE_URL
    }
}

fn extract_translation(body: &str) -> Result<String> {
    let payload: DeepLResponse = serde_json::from_str(body)
        .map_err(|err| anyhow!("failed to parse DeepL response JSON: {}", err))?;
    payload
        .translations
        .into_iter()
        .next()
        .map(|translation| translation.text)
        .ok_or_else(|| anyhow!("DeepL returned no translations"))
}

fn extract_deepl_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    parsed.message.filter(|message| !message.trim().is_empty())
}

#[derive(Debug, Deserialize)]
struct DeepLResponse {
    translations: Vec<DeepLTranslation>,
}

#[derive(Debug, Deserialize)]
struct DeepLTranslation {
    text: String,
}
