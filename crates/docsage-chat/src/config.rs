//! LLM configuration persistence and provider selection.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{LLMConfigResponse, LLMConfigUpdate, LLMProvider};
use docsage_core::{Error, Result};

pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GROQ_VISION_MODEL: &str = "meta-llama/llama-4-scout-17b-16e-instruct";
pub const DEFAULT_OPENAI_VISION_MODEL: &str = "gpt-4o-mini";

pub const GROQ_MODELS: &[&str] = &[
    "llama-3.3-70b-versatile",
    "llama-3.1-8b-instant",
    "meta-llama/llama-4-scout-17b-16e-instruct",
    "meta-llama/llama-4-maverick-17b-128e-instruct",
];
pub const OPENAI_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4.1-mini"];

/// Stored LLM configuration (persisted to llm-config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_groq_vision_model")]
    pub groq_vision_model: String,
    #[serde(default = "default_openai_vision_model")]
    pub openai_vision_model: String,
    /// Overrides the provider's API root, e.g. for a local proxy.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Path to config file for saving.
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_preferred() -> String {
    "auto".into()
}
fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_groq_vision_model() -> String {
    DEFAULT_GROQ_VISION_MODEL.into()
}
fn default_openai_vision_model() -> String {
    DEFAULT_OPENAI_VISION_MODEL.into()
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            preferred_provider: default_preferred(),
            groq_api_key: None,
            openai_api_key: None,
            groq_model: default_groq_model(),
            openai_model: default_openai_model(),
            groq_vision_model: default_groq_vision_model(),
            openai_vision_model: default_openai_vision_model(),
            base_url: None,
            config_path: PathBuf::new(),
        }
    }
}

/// Everything a hosted client needs for one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProvider {
    pub provider: LLMProvider,
    pub model: String,
    pub vision_model: String,
    pub api_key: String,
    pub base_url: String,
}

impl LLMConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config: LLMConfig = std::fs::read_to_string(config_path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();

        config.config_path = config_path.to_path_buf();

        // Env vars as fallback for API keys
        if config.groq_api_key.is_none() {
            config.groq_api_key = non_empty_env("GROQ_API_KEY");
        }
        if config.openai_api_key.is_none() {
            config.openai_api_key = non_empty_env("OPENAI_API_KEY");
        }

        config
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.config_path, json)?;
        info!("Saved LLM config to {}", self.config_path.display());
        Ok(())
    }

    /// Apply an update, merging with existing config. Empty keys clear the
    /// stored key.
    pub fn apply_update(&mut self, update: &LLMConfigUpdate) {
        if let Some(p) = &update.preferred_provider {
            self.preferred_provider = p.clone();
        }
        if let Some(k) = &update.groq_api_key {
            self.groq_api_key = Some(k.clone()).filter(|k| !k.is_empty());
        }
        if let Some(k) = &update.openai_api_key {
            self.openai_api_key = Some(k.clone()).filter(|k| !k.is_empty());
        }
        if let Some(m) = &update.groq_model {
            self.groq_model = m.clone();
        }
        if let Some(m) = &update.openai_model {
            self.openai_model = m.clone();
        }
        if let Some(m) = &update.groq_vision_model {
            self.groq_vision_model = m.clone();
        }
        if let Some(m) = &update.openai_vision_model {
            self.openai_vision_model = m.clone();
        }
    }

    fn resolved(&self, provider: LLMProvider, api_key: &str) -> ResolvedProvider {
        let (model, vision_model) = match provider {
            LLMProvider::Groq => (&self.groq_model, &self.groq_vision_model),
            LLMProvider::OpenAI => (&self.openai_model, &self.openai_vision_model),
        };
        ResolvedProvider {
            provider,
            model: model.clone(),
            vision_model: vision_model.clone(),
            api_key: api_key.to_string(),
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| provider.default_base_url().to_string()),
        }
    }

    /// Resolve which provider and models to use.
    pub fn resolve_provider(&self) -> Option<ResolvedProvider> {
        // Explicit preference
        if self.preferred_provider != "auto" {
            return match self.preferred_provider.as_str() {
                "groq" => self
                    .groq_api_key
                    .as_deref()
                    .map(|k| self.resolved(LLMProvider::Groq, k)),
                "openai" => self
                    .openai_api_key
                    .as_deref()
                    .map(|k| self.resolved(LLMProvider::OpenAI, k)),
                _ => None,
            };
        }

        // Auto mode: Groq > OpenAI
        if let Some(k) = &self.groq_api_key {
            return Some(self.resolved(LLMProvider::Groq, k));
        }
        if let Some(k) = &self.openai_api_key {
            return Some(self.resolved(LLMProvider::OpenAI, k));
        }

        None
    }

    /// Like [`resolve_provider`](Self::resolve_provider), failing when no key
    /// is configured for the selected provider.
    pub fn require_provider(&self) -> Result<ResolvedProvider> {
        self.resolve_provider().ok_or_else(|| {
            let wanted = match self.preferred_provider.as_str() {
                "groq" => "GROQ_API_KEY",
                "openai" => "OPENAI_API_KEY",
                "auto" => "GROQ_API_KEY or OPENAI_API_KEY",
                other => {
                    return Error::MissingCredential(format!("unknown provider '{}'", other));
                }
            };
            Error::MissingCredential(format!("no API key configured (set {})", wanted))
        })
    }

    /// Build the public config response (no API keys exposed).
    pub fn to_response(&self) -> LLMConfigResponse {
        LLMConfigResponse {
            preferred_provider: self.preferred_provider.clone(),
            openai_configured: self.openai_api_key.is_some(),
            groq_configured: self.groq_api_key.is_some(),
            openai_model: self.openai_model.clone(),
            groq_model: self.groq_model.clone(),
            openai_vision_model: self.openai_vision_model.clone(),
            groq_vision_model: self.groq_vision_model.clone(),
            active_provider: self.resolve_provider().map(|r| r.provider.to_string()),
            available_models: self.available_models(),
        }
    }

    /// Get available models for the active provider.
    pub fn available_models(&self) -> Vec<String> {
        let models = match self.resolve_provider().map(|r| r.provider) {
            Some(LLMProvider::Groq) => GROQ_MODELS,
            Some(LLMProvider::OpenAI) => OPENAI_MODELS,
            None => &[],
        };
        models.iter().map(|s| s.to_string()).collect()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_auto_prefers_groq() {
        let mut config = LLMConfig {
            openai_api_key: Some("sk-openai".into()),
            ..Default::default()
        };
        let resolved = config.resolve_provider().unwrap();
        assert_eq!(resolved.provider, LLMProvider::OpenAI);
        assert_eq!(resolved.base_url, "https://api.openai.com/v1");

        config.groq_api_key = Some("gsk-groq".into());
        let resolved = config.resolve_provider().unwrap();
        assert_eq!(resolved.provider, LLMProvider::Groq);
        assert_eq!(resolved.model, DEFAULT_GROQ_MODEL);
        assert_eq!(resolved.vision_model, DEFAULT_GROQ_VISION_MODEL);
    }

    #[test]
    fn test_missing_key_is_reported() {
        let config = LLMConfig::default();
        assert!(matches!(config.require_provider(), Err(Error::MissingCredential(_))));

        let config = LLMConfig {
            preferred_provider: "openai".into(),
            groq_api_key: Some("gsk".into()),
            ..Default::default()
        };
        assert!(config.resolve_provider().is_none());
        assert!(config.require_provider().is_err());
    }

    #[test]
    fn test_response_masks_keys() {
        let config = LLMConfig {
            groq_api_key: Some("gsk-secret".into()),
            ..Default::default()
        };
        let response = serde_json::to_string(&config.to_response()).unwrap();
        assert!(!response.contains("gsk-secret"));
        assert!(response.contains(r#""groqConfigured":true"#));
        assert!(response.contains(r#""activeProvider":"groq""#));
    }

    #[test]
    fn test_update_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("llm-config.json");
        let mut config = LLMConfig::load(&path);
        config.apply_update(&LLMConfigUpdate {
            preferred_provider: Some("groq".into()),
            groq_api_key: Some("gsk-saved".into()),
            groq_model: Some("llama-3.1-8b-instant".into()),
            ..Default::default()
        });
        config.base_url = Some("http://localhost:9999/v1".into());
        config.save().unwrap();

        let reloaded = LLMConfig::load(&path);
        let resolved = reloaded.require_provider().unwrap();
        assert_eq!(resolved.api_key, "gsk-saved");
        assert_eq!(resolved.model, "llama-3.1-8b-instant");
        assert_eq!(resolved.base_url, "http://localhost:9999/v1");

        let mut cleared = reloaded.clone();
        cleared.apply_update(&LLMConfigUpdate {
            groq_api_key: Some(String::new()),
            ..Default::default()
        });
        assert!(cleared.groq_api_key.is_none());
    }
}
