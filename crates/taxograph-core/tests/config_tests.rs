use std::fs;

use taxograph_core::config::{DEFAULT_DB_PATH, DEFAULT_EXPORT_DIR, DEFAULT_SERVE_HOST};
use taxograph_core::config::ConfigOverrides;
use taxograph_core::{Config, ConfigError};
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.database.path, DEFAULT_DB_PATH);
    assert_eq!(config.export.dir, DEFAULT_EXPORT_DIR);
    assert_eq!(config.serve.host, DEFAULT_SERVE_HOST);
}

#[test]
fn test_config_from_toml() {
    let toml_str = r#"
[database]
path = "/var/lib/taxograph/taxonomy.db"

[logging]
level = "taxograph_core=debug"

[serve]
port = 8080
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.database.path, "/var/lib/taxograph/taxonomy.db");
    assert_eq!(config.logging.level, "taxograph_core=debug");
    assert_eq!(config.serve.port, 8080);
    assert_eq!(config.serve.host, DEFAULT_SERVE_HOST);
    assert_eq!(config.export.dir, DEFAULT_EXPORT_DIR);
}

#[test]
fn test_default_config_string_round_trips() {
    let config: Config = toml::from_str(&Config::default_config_string()).unwrap();
    assert_eq!(config.database.path, DEFAULT_DB_PATH);
}

#[test]
fn test_from_file_rejects_zero_port() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("taxograph.toml");
    fs::write(&path, "[serve]\nport = 0\n").unwrap();

    assert!(matches!(Config::from_file(&path), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_from_file_reports_parse_errors() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("taxograph.toml");
    fs::write(&path, "[database\npath = 1\n").unwrap();

    assert!(matches!(Config::from_file(&path), Err(ConfigError::ParseError(_))));
}

#[test]
fn test_from_missing_file() {
    let temp = TempDir::new().unwrap();
    let result = Config::from_file(temp.path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::ReadError(_))));
}

#[test]
fn test_db_override_applies_before_validation() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("taxograph.toml");
    fs::write(&path, "[database]\npath = \"\"\n").unwrap();

    assert!(matches!(Config::from_file(&path), Err(ConfigError::Invalid(_))));

    let overrides = ConfigOverrides {
        db_path: Some("override.db".to_string()),
    };
    let config = Config::load_with(Some(&path), &overrides).unwrap();
    assert_eq!(config.database.path, "override.db");
}
