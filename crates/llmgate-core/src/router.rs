use tracing::warn;

use llmgate_common::{Config, DEFAULT_SLOT, Provider, RouteTarget};

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// Defensive: unreachable for a validated snapshot.
    #[error("routing slot {slot} resolved to unknown provider {provider}")]
    UnknownProvider { slot: String, provider: String },
    #[error("routing table has no default slot")]
    MissingDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub provider: Provider,
    pub model: String,
    /// Slot the decision came from; `None` for a direct
    /// `"provider,model"` hint.
    pub slot: Option<String>,
}

/// Pick a provider+model for one request against a single config
/// snapshot. Deterministic and total for a validated snapshot:
/// precedence is slot override, then exact model-hint match against
/// slot targets, then a resolvable `"provider,model"` hint, then the
/// mandatory `default` slot.
pub fn select(
    config: &Config,
    model_hint: &str,
    slot_override: Option<&str>,
) -> Result<RouteDecision, RouteError> {
    if let Some(slot) = slot_override {
        match config.slot(slot) {
            Some(target) => return resolve(config, slot, target),
            None => {
                warn!(slot = %slot, "route override names unknown slot, falling through");
            }
        }
    }

    for (slot, target) in &config.routing {
        if target.model == model_hint {
            return resolve(config, slot, target);
        }
    }

    if let Some(target) = RouteTarget::parse(model_hint)
        && let Some(provider) = config.provider(&target.provider)
        && provider.has_model(&target.model)
    {
        return Ok(RouteDecision {
            provider: provider.clone(),
            model: target.model,
            slot: None,
        });
    }

    let target = config.slot(DEFAULT_SLOT).ok_or(RouteError::MissingDefault)?;
    resolve(config, DEFAULT_SLOT, target)
}

fn resolve(config: &Config, slot: &str, target: &RouteTarget) -> Result<RouteDecision, RouteError> {
    let provider =
        config
            .provider(&target.provider)
            .ok_or_else(|| RouteError::UnknownProvider {
                slot: slot.to_string(),
                provider: target.provider.clone(),
            })?;
    Ok(RouteDecision {
        provider: provider.clone(),
        model: target.model.clone(),
        slot: Some(slot.to_string()),
    })
}
