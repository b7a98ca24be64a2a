// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as a non-zero rate cap or a parseable listen address.

use std::net::SocketAddr;

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation instead of failing fast.
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.dispatch.window_ms == 0 {
        fail("dispatch.window_ms must be at least 1".to_string());
    }

    if config.dispatch.per_window == 0 {
        fail("dispatch.per_window must be at least 1".to_string());
    }

    if config.campaign.default_language.trim().is_empty() {
        fail("campaign.default_language must not be empty".to_string());
    }

    if config.retry.max_attempts == 0 {
        fail("retry.max_attempts must be at least 1".to_string());
    }

    let multiplier = config.retry.backoff_multiplier;
    if multiplier.is_nan() || multiplier < 1.0 {
        fail(format!(
            "retry.backoff_multiplier must be at least 1.0, got {multiplier}"
        ));
    }

    if config.retry.max_backoff_ms < config.retry.initial_backoff_ms {
        fail(format!(
            "retry.max_backoff_ms ({}) must not be below retry.initial_backoff_ms ({})",
            config.retry.max_backoff_ms, config.retry.initial_backoff_ms
        ));
    }

    if config.whatsapp.timeout_secs == 0 {
        fail("whatsapp.timeout_secs must be at least 1".to_string());
    }

    if config.prometheus.enabled && config.prometheus.listen.parse::<SocketAddr>().is_err() {
        fail(format!(
            "prometheus.listen `{}` is not a valid socket address",
            config.prometheus.listen
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &CourierConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&CourierConfig::default()).is_ok());
    }

    #[test]
    fn zero_rate_cap_fails_validation() {
        let mut config = CourierConfig::default();
        config.dispatch.per_window = 0;
        assert!(messages(&config).iter().any(|m| m.contains("per_window")));
    }

    #[test]
    fn zero_window_fails_validation() {
        let mut config = CourierConfig::default();
        config.dispatch.window_ms = 0;
        assert!(messages(&config).iter().any(|m| m.contains("window_ms")));
    }

    #[test]
    fn shrinking_backoff_fails_validation() {
        let mut config = CourierConfig::default();
        config.retry.backoff_multiplier = 0.5;
        assert!(
            messages(&config)
                .iter()
                .any(|m| m.contains("backoff_multiplier"))
        );
    }

    #[test]
    fn nan_multiplier_fails_validation() {
        let mut config = CourierConfig::default();
        config.retry.backoff_multiplier = f64::NAN;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn bad_listen_address_only_checked_when_enabled() {
        let mut config = CourierConfig::default();
        config.prometheus.listen = "not-an-address".to_string();
        assert!(validate_config(&config).is_ok());

        config.prometheus.enabled = true;
        assert!(messages(&config).iter().any(|m| m.contains("prometheus.listen")));
    }

    #[test]
    fn all_violations_are_reported_together() {
        let mut config = CourierConfig::default();
        config.storage.database_path = " ".to_string();
        config.dispatch.per_window = 0;
        config.retry.max_attempts = 0;
        assert_eq!(messages(&config).len(), 3);
    }
}
