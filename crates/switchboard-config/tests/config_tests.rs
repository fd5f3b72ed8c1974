// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Switchboard configuration system.

use switchboard_config::diagnostic::{suggest_key, ConfigError};
use switchboard_config::model::SwitchboardConfig;
use switchboard_config::{load_and_validate_str, load_config_from_str};

/// A fully populated TOML file lands in the right struct fields.
#[test]
fn valid_toml_deserializes_into_switchboard_config() {
    let toml = r#"
[server]
bind_address = "0.0.0.0"
port = 9000
auth_token = "secret-token"
log_level = "debug"

[storage]
database_path = "/tmp/test.db"
wal_mode = false

[engine]
escalation_keywords = ["falar com atendente"]
default_queue = "support"
heartbeat_timeout_secs = 30
sweep_interval_secs = 10
starvation_warn_secs = 90
idle_close_secs = 3600

[campaign]
max_rate_per_second = 5

[[queues]]
id = "support"
name = "Support"
max_concurrent_slots = 4
agents = ["alice", "bob"]
"#;

    let config = load_config_from_str(toml).expect("well-formed TOML should parse");
    assert_eq!(config.server.bind_address, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.auth_token.as_deref(), Some("secret-token"));
    assert_eq!(config.server.log_level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.engine.escalation_keywords, vec!["falar com atendente"]);
    assert_eq!(config.engine.default_queue.as_deref(), Some("support"));
    assert_eq!(config.engine.heartbeat_timeout_secs, 30);
    assert_eq!(config.engine.sweep_interval_secs, 10);
    assert_eq!(config.engine.starvation_warn_secs, 90);
    assert_eq!(config.engine.idle_close_secs, 3600);
    assert_eq!(config.campaign.max_rate_per_second, 5);
    assert_eq!(config.queues.len(), 1);
    assert_eq!(config.queues[0].id, "support");
    assert_eq!(config.queues[0].agents, vec!["alice", "bob"]);
}

/// A misspelled key inside [server] is rejected, not silently dropped.
#[test]
fn unknown_field_in_server_produces_error() {
    let toml = r#"
[server]
bind_adress = "0.0.0.0"
"#;

    let err = load_config_from_str(toml).expect_err("misspelled key must not parse");
    let err_str = format!("{err}");
    // deny_unknown_fields surfaces through figment as an unknown-field error
    assert!(
        err_str.contains("unknown field") || err_str.contains("bind_adress"),
        "expected the bad key in the message, got: {err_str}"
    );
}

/// Same strictness for the [engine] section.
#[test]
fn unknown_field_in_engine_produces_error() {
    let toml = r#"
[engine]
idle_close = 60
"#;

    let err = load_config_from_str(toml).expect_err("misspelled key must not parse");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("idle_close"),
        "expected the bad key in the message, got: {err_str}"
    );
}

/// An empty document yields the compiled defaults for every section.
#[test]
fn empty_toml_falls_back_to_defaults() {
    let toml = "";
    let config = load_config_from_str(toml).expect("empty input should fall back to defaults");

    assert_eq!(config.server.bind_address, "127.0.0.1");
    assert_eq!(config.server.port, 8787);
    assert!(config.server.auth_token.is_none());
    assert_eq!(config.server.log_level, "info");
    assert!(config.storage.wal_mode);
    assert!(config
        .engine
        .escalation_keywords
        .iter()
        .any(|k| k == "falar com atendente"));
    assert!(config.engine.default_queue.is_none());
    assert_eq!(config.engine.heartbeat_timeout_secs, 60);
    assert_eq!(config.engine.sweep_interval_secs, 30);
    assert_eq!(config.engine.idle_close_secs, 0);
    assert_eq!(config.campaign.max_rate_per_second, 30);
    assert!(config.queues.is_empty());
}

/// A later provider beats an earlier one for the same key.
#[test]
fn override_wins_over_toml_value() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let toml_content = r#"
[server]
bind_address = "from-toml"
"#;

    // Stands in for SWITCHBOARD_SERVER_BIND_ADDRESS without touching the
    // process environment.
    let config: SwitchboardConfig = Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::string(toml_content))
        .merge(("server.bind_address", "envtest"))
        .extract()
        .expect("later provider should win the merge");

    assert_eq!(config.server.bind_address, "envtest");
}

/// Dotted key for an underscore-containing field maps to the right place
/// (server.auth_token, NOT server.auth.token).
#[test]
fn dotted_override_reaches_underscore_field() {
    use figment::{providers::Serialized, Figment};

    let config: SwitchboardConfig = Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(("server.auth_token", "xyz-from-env"))
        .extract()
        .expect("dot notation should reach auth_token");

    assert_eq!(config.server.auth_token.as_deref(), Some("xyz-from-env"));
}

/// No section of the default config is left in an unusable state.
#[test]
fn compiled_defaults_cover_every_section() {
    let config = SwitchboardConfig::default();

    assert_eq!(config.server.bind_address, "127.0.0.1");
    assert_eq!(config.server.port, 8787);
    assert_eq!(config.server.log_level, "info");
    assert!(config.storage.database_path.ends_with("switchboard.db"));
    assert!(config.storage.wal_mode);
    assert_eq!(config.engine.heartbeat_timeout_secs, 60);
    assert_eq!(config.campaign.max_rate_per_second, 30);
    assert!(config.queues.is_empty());
}

/// A config file that does not exist is not an error, just absent.
#[test]
fn nonexistent_config_file_is_ignored() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let config: SwitchboardConfig = Figment::new()
        .merge(Serialized::defaults(SwitchboardConfig::default()))
        .merge(Toml::file("/nonexistent/path/switchboard.toml"))
        .extract()
        .expect("absent file should not abort extraction");

    // Nothing overrode the defaults
    assert_eq!(config.server.bind_address, "127.0.0.1");
}

/// A whole section the schema does not know is rejected too.
#[test]
fn unknown_top_level_section_is_rejected() {
    let toml = r#"
[logging]
level = "debug"
"#;

    let err = load_config_from_str(toml).expect_err("stray section must not parse");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("logging"),
        "expected the stray section in the message, got: {err_str}"
    );
}

// ============================================================================
// Diagnostic tests
// ============================================================================

/// "bind_adress" is one dropped letter away and gets the obvious suggestion.
#[test]
fn diagnostic_bind_adress_suggests_bind_address() {
    let valid_keys = &["bind_address", "port", "auth_token", "log_level"];
    let suggestion = suggest_key("bind_adress", valid_keys);
    assert_eq!(suggestion, Some("bind_address".to_string()));
}

/// Longer keys with one dropped letter still score above the floor.
#[test]
fn diagnostic_slots_typo_suggests_correction() {
    let valid_keys = &["id", "name", "max_concurrent_slots", "agents"];
    let suggestion = suggest_key("max_concurent_slots", valid_keys);
    assert_eq!(suggestion, Some("max_concurrent_slots".to_string()));
}

/// Nothing is suggested when no valid key is anywhere near the input.
#[test]
fn no_suggestion_when_nothing_is_close() {
    let valid_keys = &["bind_address", "port", "log_level"];
    let suggestion = suggest_key("zzzzzz", valid_keys);
    assert!(suggestion.is_none(), "unrelated input should suggest nothing");
}

/// The full pipeline turns a typo into an UnknownKey with a suggestion.
#[test]
fn unknown_key_diagnostic_carries_suggestion() {
    let toml = r#"
[server]
bind_adress = "0.0.0.0"
"#;

    let errors = load_and_validate_str(toml).expect_err("typo should surface as errors");
    assert!(!errors.is_empty(), "expected at least one error");

    let has_unknown_key = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. } if {
            key == "bind_adress"
                && suggestion.as_deref() == Some("bind_address")
                && valid_keys.contains("bind_address")
        })
    });
    assert!(
        has_unknown_key,
        "expected UnknownKey for 'bind_adress' suggesting 'bind_address', got: {errors:?}"
    );
}

/// The diagnostic names every key the section would have accepted.
#[test]
fn unknown_key_diagnostic_lists_section_keys() {
    let toml = r#"
[server]
bind_adress = "0.0.0.0"
"#;

    let errors = load_and_validate_str(toml).expect_err("typo should surface as errors");
    let has_valid_keys = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { valid_keys, .. } if {
            valid_keys.contains("bind_address")
                && valid_keys.contains("port")
                && valid_keys.contains("log_level")
        })
    });
    assert!(
        has_valid_keys,
        "diagnostic should list the accepted [server] keys"
    );
}

/// A string where a number belongs is called out as a type problem.
#[test]
fn wrong_value_type_is_reported() {
    let toml = r#"
[server]
port = "not_a_number"
"#;

    let err = load_config_from_str(toml).expect_err("string port must not parse");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("invalid type") || err_str.contains("port"),
        "expected a type complaint, got: {err_str}"
    );
}

/// The Diagnostic impl exposes a code and renders the suggestion in help.
#[test]
fn unknown_key_error_exposes_code_and_help() {
    use miette::Diagnostic;

    let error = ConfigError::UnknownKey {
        key: "bind_adress".to_string(),
        suggestion: Some("bind_address".to_string()),
        valid_keys: "bind_address, port, auth_token, log_level".to_string(),
        span: None,
        src: None,
    };

    let code = error.code();
    assert!(code.is_some(), "diagnostic code should be set");

    let help = error.help();
    assert!(help.is_some(), "help text should be set");
    let help_str = help.unwrap().to_string();
    assert!(
        help_str.contains("did you mean `bind_address`"),
        "help should carry the suggestion, got: {help_str}"
    );
}

/// The graphical handler accepts the error even without span or source.
#[test]
fn graphical_handler_renders_unknown_key() {
    use miette::GraphicalReportHandler;

    let error = ConfigError::UnknownKey {
        key: "bind_adress".to_string(),
        suggestion: Some("bind_address".to_string()),
        valid_keys: "bind_address, port, auth_token, log_level".to_string(),
        span: None,
        src: None,
    };

    let handler = GraphicalReportHandler::new();
    let mut buf = String::new();
    handler
        .render_report(&mut buf, &error)
        .expect("rendering should succeed without a span");
    assert!(!buf.is_empty(), "rendered report should not be empty");
    assert!(
        buf.contains("bind_adress"),
        "rendered report should name the key"
    );
}

/// The high-level string entry point passes a clean config through.
#[test]
fn validate_str_accepts_minimal_toml() {
    let toml = r#"
[server]
port = 9999
"#;

    let config = load_and_validate_str(toml).expect("clean config should pass validation");
    assert_eq!(config.server.port, 9999);
}

/// Validation catches zero-slot queues.
#[test]
fn validation_catches_zero_slots() {
    let toml = r#"
[[queues]]
id = "support"
max_concurrent_slots = 0
"#;

    let errors = load_and_validate_str(toml).expect_err("zero slots should fail");
    let has_validation_error = errors.iter().any(|e| {
        matches!(e, ConfigError::Validation { message } if message.contains("max_concurrent_slots"))
    });
    assert!(
        has_validation_error,
        "should have validation error for zero slots"
    );
}

/// Validation catches a default_queue that names no configured queue.
#[test]
fn validation_catches_dangling_default_queue() {
    let toml = r#"
[engine]
default_queue = "missing"

[[queues]]
id = "support"
"#;

    let errors = load_and_validate_str(toml).expect_err("dangling default_queue should fail");
    let has_validation_error = errors.iter().any(|e| {
        matches!(e, ConfigError::Validation { message } if message.contains("default_queue"))
    });
    assert!(
        has_validation_error,
        "should have validation error for dangling default_queue"
    );
}
