//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Wallet and token addresses parse
//! - At least one hex-returning provider exists
//! - Intervals and limits are positive
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use alloy::primitives::Address;
use std::collections::HashSet;

use crate::config::schema::EngineConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check `config` and return every problem found.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.wallet.id.trim().is_empty() {
        errors.push(ValidationError::new("wallet.id", "must not be empty"));
    }
    if config.wallet.address.parse::<Address>().is_err() {
        errors.push(ValidationError::new(
            "wallet.address",
            format!("'{}' is not a valid address", config.wallet.address),
        ));
    }
    if config.wallet.native_currency.trim().is_empty() {
        errors.push(ValidationError::new("wallet.native_currency", "must not be empty"));
    }

    let mut codes = HashSet::new();
    codes.insert(config.wallet.native_currency.as_str());
    for (i, token) in config.wallet.tokens.iter().enumerate() {
        if !codes.insert(token.code.as_str()) {
            errors.push(ValidationError::new(
                format!("wallet.tokens[{i}].code"),
                format!("duplicate currency code '{}'", token.code),
            ));
        }
        if token.contract.parse::<Address>().is_err() {
            errors.push(ValidationError::new(
                format!("wallet.tokens[{i}].contract"),
                format!("'{}' is not a valid contract address", token.contract),
            ));
        }
    }

    if config.providers.explorers.is_empty() && config.providers.rpc.is_empty() {
        errors.push(ValidationError::new(
            "providers",
            "at least one explorer or rpc endpoint is required",
        ));
    }
    let endpoints = config
        .providers
        .explorers
        .iter()
        .chain(config.providers.rpc.iter())
        .map(|e| (&e.name, &e.url))
        .chain(config.providers.aggregator.iter().map(|a| (&a.name, &a.url)));
    for (name, url) in endpoints {
        if url::Url::parse(url).is_err() {
            errors.push(ValidationError::new(
                format!("providers.{name}"),
                format!("'{url}' is not a valid URL"),
            ));
        }
    }
    if config.providers.timeout_secs == 0 {
        errors.push(ValidationError::new("providers.timeout_secs", "must be greater than 0"));
    }

    let polling = &config.polling;
    for (field, value) in [
        ("polling.yield_ms", polling.yield_ms),
        ("polling.height_interval_secs", polling.height_interval_secs),
        ("polling.nonce_interval_secs", polling.nonce_interval_secs),
        ("polling.balance_interval_secs", polling.balance_interval_secs),
        ("polling.history_interval_secs", polling.history_interval_secs),
        ("spend.max_pending_spends", config.spend.max_pending_spends),
        ("persistence.flush_interval_secs", config.persistence.flush_interval_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }
    if config.spend.gas_price_multiplier <= 0.0 {
        errors.push(ValidationError::new("spend.gas_price_multiplier", "must be positive"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
