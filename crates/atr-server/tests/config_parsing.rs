use std::{env, fs};

use atr_server::config::VersioningMode;
use atr_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("atr.toml");

    let toml_content = r#"
[search]
default_count = 20
max_count = 200

[export]
batch_size = 250
max_parallel_types = 2
resource_types = ["MedicationStatement", "Coverage"]

[storage]
versioning = "sequential"

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.search.default_count, Some(20));
    assert_eq!(cfg.search.max_count, 200);
    assert_eq!(cfg.export.batch_size, 250);
    assert_eq!(cfg.export.max_parallel_types, 2);
    assert_eq!(cfg.export.resource_types.len(), 2);
    assert_eq!(cfg.storage.versioning, VersioningMode::Sequential);
    assert_eq!(cfg.logging.level, "debug");

    // 2) Env override should win over file
    unsafe {
        env::set_var("ATR__SEARCH__MAX_COUNT", "50");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.search.max_count, 50);
    unsafe {
        env::remove_var("ATR__SEARCH__MAX_COUNT");
    }

    // 3) Invalid config (default > max) should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[search]
default_count = 500
max_count = 100
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("default_count must be <="));

    // 4) Unknown export type is rejected
    let unknown_path = dir.path().join("unknown.toml");
    fs::write(&unknown_path, "[export]\nresource_types = [\"Spaceship\"]\n").expect("write toml");
    let err = load_config(unknown_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("Spaceship"));

    // 5) Missing file falls back to defaults
    let cfg = load_config(dir.path().join("absent.toml").to_str()).expect("defaults");
    assert_eq!(cfg.search.default_count, None);
    assert_eq!(cfg.storage.versioning, VersioningMode::Constant);
}
