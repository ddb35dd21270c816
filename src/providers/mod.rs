use anyhow::{Result, anyhow};

use crate::collaborators::TranslationBackend;

mod deepl;
mod ollama;
pub(crate) mod retry;

pub use deepl::DeepL;
pub use ollama::Ollama;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    DeepL,
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::DeepL => "deepl",
            ProviderKind::Ollama => "ollama",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "deepl" => Ok(ProviderKind::DeepL),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(anyhow!(
                "unknown translator '{}' (expected deepl or ollama)",
                other
            )),
        }
    }
}

/// Connection details for building a backend.
#[derive(Debug, Clone, Default)]
pub struct ProviderOptions {
    pub key: Option<String>,
    pub model: Option<String>,
    pub url: Option<String>,
}

pub fn build_backend(
    kind: ProviderKind,
    options: &ProviderOptions,
) -> Result<Box<dyn TranslationBackend>> {
    match kind {
        ProviderKind::DeepL => {
            let key = resolve_key(kind, options.key.as_deref())?;
            Ok(Box::new(DeepL::new(key)))
        }
        ProviderKind::Ollama => {
            let mut ollama = Ollama::new();
            if let Some(model) = options.model.as_deref() {
                ollama = ollama.with_model(model);
            }
            if let Some(url) = options.url.as_deref() {
                ollama = ollama.with_url(url);
            }
            Ok(Box::new(ollama))
        }
    }
}

pub fn resolve_key(provider: ProviderKind, override_key: Option<&str>) -> Result<String> {
    if let Some(key) = override_key.filter(|key| !key.trim().is_empty()) {
        return Ok(key.to_string());
    }

    match provider {
        ProviderKind::DeepL => get_env("DEEPL_KEY").or_else(|| get_env("DEEPL_AUTH_KEY")),
        ProviderKind::Ollama => Some(String::new()),
    }
    .ok_or_else(|| anyhow!("API key not found for {} (set DEEPL_KEY or pass --key)", provider.as_str()))
}

/// Drops everything from the first `(`; translators tend to append
/// romanizations or notes in parentheses.
pub fn strip_parenthetical(text: &str) -> String {
    match text.split_once('(') {
        Some((head, _)) => head.trim_end().to_string(),
        None => text.to_string(),
    }
}

fn get_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
