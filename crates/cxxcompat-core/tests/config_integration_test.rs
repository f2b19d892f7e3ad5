use cxxcompat_core::{CompatConfig, ConfigError, ConfigManager, Tier};
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_default_configuration() {
    let config = CompatConfig::default();
    assert!(ConfigManager::validate_config(&config).is_ok());
    assert_eq!(config.policy.fail_on, Tier::SourceBreak);
    assert!(config.policy.noexcept_affects_abi);
    assert!(config.extract.roots.is_empty());
}

#[test]
fn test_load_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("cxxcompat.toml");
    fs::write(
        &path,
        r#"
[policy]
fail_on = "binary_break"
noexcept_affects_abi = false

[policy.overrides]
default_argument_changed = "source_break"

[extract]
roots = ["NS1"]
exclude_namespaces = ["detail"]

[logging]
level = "info"
format = "compact"
"#,
    )
    .unwrap();

    let manager = ConfigManager::load_from(&path).unwrap();
    let config = manager.config();
    assert_eq!(manager.config_path(), Some(path.as_path()));
    assert_eq!(config.policy.fail_on, Tier::BinaryBreak);
    assert!(!config.policy.noexcept_affects_abi);
    assert_eq!(
        config.policy.overrides.get("default_argument_changed"),
        Some(&Tier::SourceBreak)
    );
    assert_eq!(config.extract.roots, vec!["NS1".to_string()]);
    assert_eq!(config.extract.exclude_namespaces, vec!["detail".to_string()]);
    assert_eq!(config.logging.format, "compact");
}

#[test]
fn test_missing_file_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let result = ConfigManager::load_from(&temp_dir.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_unknown_override_kind_rejected() {
    let config = ConfigManager::parse_toml(
        r#"
[policy.overrides]
not_a_kind = "neutral"
"#,
    )
    .unwrap();
    assert!(matches!(
        ConfigManager::validate_config(&config),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn test_unknown_verdicts_cannot_be_lowered() {
    let config = ConfigManager::parse_toml(
        r#"
[policy.overrides]
ambiguous_match = "neutral"
"#,
    )
    .unwrap();
    assert!(ConfigManager::validate_config(&config).is_err());
}

#[test]
fn test_environment_overrides() {
    let env: HashMap<&str, &str> = [
        ("CXXCOMPAT_FAIL_ON", "unknown"),
        ("CXXCOMPAT_NOEXCEPT_AFFECTS_ABI", "0"),
        ("CXXCOMPAT_ROOTS", "NS1, NS2::inner"),
        ("RUST_LOG", "debug"),
    ]
    .into_iter()
    .collect();

    let config = ConfigManager::apply_overrides_from(CompatConfig::default(), |key| {
        env.get(key).map(|v| v.to_string())
    });
    assert_eq!(config.policy.fail_on, Tier::Unknown);
    assert!(!config.policy.noexcept_affects_abi);
    assert_eq!(config.extract.roots, vec!["NS1", "NS2::inner"]);
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_invalid_tier_in_environment_is_ignored() {
    let config = ConfigManager::apply_overrides_from(CompatConfig::default(), |key| {
        (key == "CXXCOMPAT_FAIL_ON").then(|| "catastrophic".to_string())
    });
    assert_eq!(config.policy.fail_on, Tier::SourceBreak);
}

#[test]
fn test_default_config_round_trips_through_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("config.toml");
    ConfigManager::create_default_config(&path).unwrap();
    let manager = ConfigManager::load_from(&path).unwrap();
    assert_eq!(manager.config().policy.fail_on, Tier::SourceBreak);
}
