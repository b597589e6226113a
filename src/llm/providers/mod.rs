//! LLM provider implementations.
//!
//! `build(config, api_key)` is the factory, called at startup.
//! Adding a new backend = new module + new match arm.
//! The scripted provider is constructed directly, never from config.

pub mod dummy;
pub mod openai_compatible;
pub mod scripted;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ProviderError};

/// Construct a `LlmProvider` from config and an optional API key.
///
/// `api_key` is sourced from `LLM_API_KEY` env (never TOML) and is `None`
/// for keyless local models.
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<LlmProvider, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(LlmProvider::Dummy(dummy::DummyProvider)),
        "openai" | "openai-compatible" => {
            let oai = &config.openai;
            let p = openai_compatible::OpenAiCompatibleProvider::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.temperature,
                oai.max_tokens,
                oai.timeout_seconds,
                api_key,
            )?;
            Ok(LlmProvider::OpenAiCompatible(p))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_dummy_by_default() {
        let p = build(&LlmConfig::default(), None).unwrap();
        assert_eq!(p.name(), "dummy");
    }

    #[test]
    fn builds_openai() {
        let cfg = LlmConfig { provider: "openai".into(), ..LlmConfig::default() };
        let p = build(&cfg, Some("k".into())).unwrap();
        assert_eq!(p.name(), "openai");
    }

    #[test]
    fn unknown_provider_errors() {
        let cfg = LlmConfig { provider: "nope".into(), ..LlmConfig::default() };
        assert!(matches!(build(&cfg, None), Err(ProviderError::UnknownProvider(_))));
    }
}
