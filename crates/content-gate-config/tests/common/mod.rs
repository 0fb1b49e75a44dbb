// content-gate-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for content-gate-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use content_gate_config::BroadcastChannelConfig;
use content_gate_config::ChannelConfig;
use content_gate_config::ConfigError;
use content_gate_config::ContentGateConfig;
use content_gate_config::LogChannelConfig;

/// Test result alias.
pub type TestResult = Result<(), String>;

/// Parses a TOML string into a `ContentGateConfig` without validating it.
pub fn config_from_toml(toml_str: &str) -> Result<ContentGateConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<ContentGateConfig, toml::de::Error> {
    config_from_toml("")
}

/// Returns a broadcast channel declaration.
pub fn broadcast(name: &str) -> ChannelConfig {
    ChannelConfig::Broadcast(BroadcastChannelConfig {
        name: name.to_string(),
        api_base: None,
        chat_id: "@channel".to_string(),
        token_env: "BROADCAST_TOKEN".to_string(),
        timeout_ms: None,
    })
}

/// Returns a stderr log channel declaration.
pub fn log_channel(name: &str) -> ChannelConfig {
    ChannelConfig::Log(LogChannelConfig {
        name: name.to_string(),
        path: None,
        timeout_ms: None,
    })
}

/// Asserts that `result` failed with a message containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
