use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config source unreadable: {0}")]
    Unreadable(#[from] std::io::Error),
    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no providers configured")]
    NoProviders,
    #[error("duplicate provider name: {0}")]
    DuplicateProvider(String),
    #[error("provider {0} has an empty model list")]
    EmptyModelList(String),
    #[error("provider {0} has an empty api_base_url")]
    EmptyBaseUrl(String),
    #[error("routing slot {slot} references unknown provider {provider}")]
    UnknownProvider { slot: String, provider: String },
    #[error("routing slot {slot} references model {model} not declared by provider {provider}")]
    UnknownModel {
        slot: String,
        provider: String,
        model: String,
    },
    #[error("routing table has no default slot")]
    MissingDefaultSlot,
    #[error("fallback chain references unknown slot: {0}")]
    UnknownFallbackSlot(String),
}

/// Wire dialect a provider speaks. Closed set: adding a dialect means
/// adding a variant plus its translation table entries, nothing else.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    OpenAI,
    Anthropic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    pub api_base_url: String,
    pub api_key: String,
    pub models: Vec<String>,
    #[serde(default)]
    pub dialect: Dialect,
}

impl Provider {
    pub fn has_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }
}

/// Resolved routing target, parsed from the `"provider,model"` string
/// form the config file uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RouteTarget {
    pub provider: String,
    pub model: String,
}

impl RouteTarget {
    pub fn parse(value: &str) -> Option<Self> {
        let (provider, model) = value.split_once(',')?;
        let provider = provider.trim();
        let model = model.trim();
        if provider.is_empty() || model.is_empty() {
            return None;
        }
        Some(Self {
            provider: provider.to_string(),
            model: model.to_string(),
        })
    }
}

impl TryFrom<String> for RouteTarget {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RouteTarget::parse(&value).ok_or_else(|| format!("malformed route target: {value}"))
    }
}

impl From<RouteTarget> for String {
    fn from(value: RouteTarget) -> Self {
        format!("{},{}", value.provider, value.model)
    }
}

pub const DEFAULT_SLOT: &str = "default";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub providers: Vec<Provider>,
    /// Slot name -> target. BTreeMap keeps lookup order deterministic.
    pub routing: BTreeMap<String, RouteTarget>,
    /// Slot names the dispatcher walks, in order, when the primary
    /// target fails a non-streaming call.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fallback_chain: Vec<String>,
}

impl Config {
    /// Parse and fully validate a raw JSON config document. Invalid
    /// configs are rejected wholesale; nothing is ever applied partially.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }
        let mut seen = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            if seen.contains(&provider.name.as_str()) {
                return Err(ConfigError::DuplicateProvider(provider.name.clone()));
            }
            seen.push(provider.name.as_str());
            if provider.models.is_empty() {
                return Err(ConfigError::EmptyModelList(provider.name.clone()));
            }
            if provider.api_base_url.trim().is_empty() {
                return Err(ConfigError::EmptyBaseUrl(provider.name.clone()));
            }
        }

        if !self.routing.contains_key(DEFAULT_SLOT) {
            return Err(ConfigError::MissingDefaultSlot);
        }
        for (slot, target) in &self.routing {
            let provider = self
                .providers
                .iter()
                .find(|p| p.name == target.provider)
                .ok_or_else(|| ConfigError::UnknownProvider {
                    slot: slot.clone(),
                    provider: target.provider.clone(),
                })?;
            if !provider.has_model(&target.model) {
                return Err(ConfigError::UnknownModel {
                    slot: slot.clone(),
                    provider: target.provider.clone(),
                    model: target.model.clone(),
                });
            }
        }
        for slot in &self.fallback_chain {
            if !self.routing.contains_key(slot) {
                return Err(ConfigError::UnknownFallbackSlot(slot.clone()));
            }
        }
        Ok(())
    }

    pub fn provider(&self, name: &str) -> Option<&Provider> {
        self.providers.iter().find(|p| p.name == name)
    }

    pub fn slot(&self, name: &str) -> Option<&RouteTarget> {
        self.routing.get(name)
    }
}
