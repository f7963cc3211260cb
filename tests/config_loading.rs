use std::io::Write;

use stepflow_core::config::{AppConfig, LoopExitKind};
use stepflow_core::error::StepflowError;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[engine]
max_steps = 250
default_max_iterations = 4
strict_transitions = true
loop_exit = "none"

[gateway]
bind = "0.0.0.0:9999"

[tools]
timeout_secs = 30
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.engine.max_steps, 250);
    assert_eq!(config.engine.default_max_iterations, 4);
    assert!(config.engine.strict_transitions);
    assert_eq!(config.engine.loop_exit, LoopExitKind::None);
    assert_eq!(config.gateway.bind, "0.0.0.0:9999");
    assert_eq!(config.tools.timeout_secs, Some(30));
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("STEPFLOW_TEST_BIND", "127.0.0.1:7070");

    let toml_content = r#"
[gateway]
bind = "${STEPFLOW_TEST_BIND}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(config.gateway.bind, "127.0.0.1:7070");

    std::env::remove_var("STEPFLOW_TEST_BIND");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let toml_content = r#"
[gateway]
bind = "127.0.0.1:8001"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.engine.max_steps, 100);
    assert_eq!(config.engine.default_max_iterations, 10);
    assert!(!config.engine.strict_transitions);
    assert_eq!(config.engine.loop_exit, LoopExitKind::SelfTransition);
    assert!(config.tools.timeout_secs.is_none());
}

#[test]
fn test_missing_file_is_config_not_found() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let err = AppConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, StepflowError::ConfigNotFound(_)));
}

#[test]
fn test_invalid_values_rejected() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[tools]\ntimeout_secs = 0\n").expect("write toml");
    assert!(matches!(
        AppConfig::load(tmp.path()),
        Err(StepflowError::Config(_))
    ));

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[engine]\nloop_exit = \"sometimes\"\n").expect("write toml");
    assert!(matches!(
        AppConfig::load(tmp.path()),
        Err(StepflowError::Config(_))
    ));
}
