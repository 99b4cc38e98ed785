use std::fs;

use heropath::config::{Config, CONFIG_FILE};
use heropath::error::Error;
use heropath::task::Difficulty;

#[test]
fn config_defaults_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config::load_from_dir(dir.path());

    assert_eq!(config.storage.prefix, "heropath.");
    assert!(config.storage.debounce);
    assert_eq!(config.storage.debounce_delay_ms, 500);
    assert_eq!(config.storage.file, "store.json");
    assert_eq!(config.quota.max_bytes, 5 * 1024 * 1024);
    assert_eq!(config.quota.warning_threshold, 0.8);
    assert_eq!(config.tasks.difficulty().expect("default"), Difficulty::Medium);
    assert_eq!(config.store_path(dir.path()), dir.path().join("store.json"));
}

#[test]
fn config_overrides_from_toml() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let toml = r#"
[storage]
prefix = "quest."
debounce = false
file = "hero.json"

[quota]
max_bytes = 4096
warning_threshold = 0.5
stale_patterns = ["*.version"]

[tasks]
default_difficulty = "hard"
"#;
    fs::write(dir.path().join(CONFIG_FILE), toml)?;

    let config = Config::load_from_dir(dir.path());

    assert_eq!(config.storage.prefix, "quest.");
    assert!(!config.storage.debounce);
    assert_eq!(config.storage.debounce_delay_ms, 500);
    assert_eq!(config.store_path(dir.path()), dir.path().join("hero.json"));
    assert_eq!(config.quota.max_bytes, 4096);
    assert_eq!(config.quota.stale_patterns, vec!["*.version".to_string()]);
    assert_eq!(config.tasks.difficulty()?, Difficulty::Hard);
    Ok(())
}

#[test]
fn invalid_config_is_rejected_by_load() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(CONFIG_FILE);
    fs::write(&path, "[tasks]\ndefault_difficulty = \"epic\"\n")?;

    let err = Config::load(&path).expect_err("invalid difficulty");
    assert!(matches!(err, Error::InvalidConfig(_)));

    // The lenient loader falls back to defaults.
    let config = Config::load_from_dir(dir.path());
    assert_eq!(config.tasks.default_difficulty, "medium");
    Ok(())
}
