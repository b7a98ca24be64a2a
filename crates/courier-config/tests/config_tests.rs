// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Courier configuration system.

use courier_config::diagnostic::{ConfigError, suggest_key};
use courier_config::model::CourierConfig;
use courier_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known sections deserializes successfully.
#[test]
fn valid_toml_deserializes_into_courier_config() {
    let toml = r#"
[service]
name = "broadcasts"
log_level = "debug"

[storage]
database_path = "/tmp/courier-test.db"
wal_mode = false

[dispatch]
window_ms = 500
per_window = 10

[campaign]
default_language = "pt_BR"
dedupe_recipients = true

[retry]
max_attempts = 3
initial_backoff_ms = 100
backoff_multiplier = 3.0
max_backoff_ms = 900

[recovery]
enabled = false
grace_secs = 60

[whatsapp]
access_token = "EAAG-test"
phone_number_id = "1055"
api_version = "v20.0"

[prometheus]
enabled = true
listen = "0.0.0.0:9100"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.name, "broadcasts");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/courier-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.dispatch.window_ms, 500);
    assert_eq!(config.dispatch.per_window, 10);
    assert_eq!(config.campaign.default_language, "pt_BR");
    assert!(config.campaign.dedupe_recipients);
    assert_eq!(config.retry.max_attempts, 3);
    assert_eq!(config.retry.initial_backoff_ms, 100);
    assert_eq!(config.retry.max_backoff_ms, 900);
    assert!(!config.recovery.enabled);
    assert_eq!(config.recovery.grace_secs, 60);
    assert_eq!(config.whatsapp.access_token.as_deref(), Some("EAAG-test"));
    assert_eq!(config.whatsapp.phone_number_id.as_deref(), Some("1055"));
    assert_eq!(config.whatsapp.api_version, "v20.0");
    assert_eq!(config.whatsapp.base_url, "https://graph.facebook.com");
    assert!(config.prometheus.enabled);
    assert_eq!(config.prometheus.listen, "0.0.0.0:9100");
}

/// Missing optional sections use defaults without error.
#[test]
fn missing_optional_sections_use_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.service.name, "courier");
    assert_eq!(config.service.log_level, "info");
    assert!(config.storage.database_path.ends_with("courier.db"));
    assert!(config.storage.wal_mode);
    assert_eq!(config.dispatch.window_ms, 1000);
    assert_eq!(config.dispatch.per_window, 20);
    assert_eq!(config.campaign.default_language, "en_US");
    assert!(!config.campaign.dedupe_recipients);
    assert_eq!(config.retry.max_attempts, 1);
    assert!(config.recovery.enabled);
    assert_eq!(config.recovery.grace_secs, 300);
    assert!(config.whatsapp.access_token.is_none());
    assert!(!config.prometheus.enabled);
}

/// Unknown field in [dispatch] produces an unknown field error.
#[test]
fn unknown_field_in_dispatch_produces_error() {
    let toml = r#"
[dispatch]
per_windw = 5
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("per_windw"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Unexpected top-level section is rejected by deny_unknown_fields.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[scheduler]
enabled = true
"#;

    let err = load_config_from_str(toml).expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("scheduler"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// A dotted override (what the env provider produces) wins over TOML.
#[test]
fn dotted_override_beats_toml() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let toml_content = r#"
[dispatch]
per_window = 20
"#;

    let config: CourierConfig = Figment::new()
        .merge(Serialized::defaults(CourierConfig::default()))
        .merge(Toml::string(toml_content))
        .merge(("dispatch.per_window", 80))
        .extract()
        .expect("should merge override");

    assert_eq!(config.dispatch.per_window, 80);
}

/// COURIER_WHATSAPP_ACCESS_TOKEN reaches whatsapp.access_token through the real loader.
#[test]
#[serial_test::serial]
fn env_var_sets_whatsapp_access_token() {
    let dir = std::env::temp_dir().join(format!("courier-config-env-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("courier.toml");
    std::fs::write(&path, "[whatsapp]\nphone_number_id = \"42\"\n").unwrap();

    // SAFETY: serialized test; no other thread reads the environment concurrently.
    unsafe { std::env::set_var("COURIER_WHATSAPP_ACCESS_TOKEN", "from-env") };
    let config = courier_config::load_config_from_path(&path);
    unsafe { std::env::remove_var("COURIER_WHATSAPP_ACCESS_TOKEN") };

    let config = config.expect("env override should load");
    assert_eq!(config.whatsapp.access_token.as_deref(), Some("from-env"));
    assert_eq!(config.whatsapp.phone_number_id.as_deref(), Some("42"));
    std::fs::remove_dir_all(&dir).ok();
}

/// Missing config files are silently skipped.
#[test]
fn missing_config_files_silently_skipped() {
    let config = courier_config::load_config_from_path(std::path::Path::new(
        "/nonexistent/path/courier.toml",
    ))
    .expect("missing file should be silently skipped");
    assert_eq!(config.service.name, "courier");
}

#[test]
fn diagnostic_suggests_dedupe_recipients() {
    let valid_keys = &["default_language", "dedupe_recipients"];
    assert_eq!(
        suggest_key("dedup_recipients", valid_keys),
        Some("dedupe_recipients".to_string())
    );
}

/// load_and_validate_str carries the unknown key, its suggestion, and the valid keys.
#[test]
fn diagnostic_error_includes_unknown_key_and_suggestion() {
    let toml = r#"
[dispatch]
per_windw = 5
"#;

    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "per_windw"
                && suggestion.as_deref() == Some("per_window")
                && valid_keys.contains("window_ms")
        })
    });
    assert!(found, "expected UnknownKey for per_windw, got: {errors:?}");
}

/// Invalid type (string where number expected) produces clear message.
#[test]
fn diagnostic_invalid_type_message() {
    let toml = r#"
[dispatch]
per_window = "lots"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject invalid type");
    assert!(
        errors.iter().any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("per_window"))),
        "expected InvalidType for per_window, got: {errors:?}"
    );
}

/// ConfigError can be rendered using miette's graphical handler.
#[test]
fn config_error_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "per_windw".to_string(),
        suggestion: Some("per_window".to_string()),
        valid_keys: "window_ms, per_window".to_string(),
        span: None,
        src: None,
    };

    assert!(error.code().is_some(), "should have diagnostic code");
    let help = error.help().expect("should have help text").to_string();
    assert!(help.contains("did you mean `per_window`"), "got: {help}");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render without error");
    assert!(buf.contains("per_windw"));
}

/// Validation runs after a successful parse.
#[test]
fn validation_catches_zero_rate_cap() {
    let toml = r#"
[dispatch]
per_window = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("zero cap should fail");
    assert!(errors.iter().any(|e| {
        matches!(e, ConfigError::Validation { message } if message.contains("per_window"))
    }));
}
