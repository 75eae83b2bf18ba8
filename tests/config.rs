use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use airq_monitor::config::{Config, ConfigLoader};
use airq_monitor::error::AirqError;
use airq_monitor::worker::AdmissionPolicy;

fn write_config(content: &str) -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("airq.json")).unwrap();
    std::fs::write(&path, content).unwrap();
    (temp, path)
}

#[test]
fn loads_config_file() {
    let (_temp, path) = write_config(
        r#"{"base_url": "https://example.test/", "timeout_secs": 12, "data_dir": "/tmp/airq", "admission": "one-per-station"}"#,
    );

    let config = ConfigLoader::load(Some(path.as_str())).unwrap();
    let settings = ConfigLoader::resolve_config(config).unwrap();

    assert_eq!(settings.base_url, "https://example.test");
    assert_eq!(settings.timeout, Duration::from_secs(12));
    assert_eq!(settings.data_dir, Utf8PathBuf::from("/tmp/airq"));
    assert_eq!(settings.admission, AdmissionPolicy::OnePerStation);
}

#[test]
fn flags_override_file() {
    let (_temp, path) = write_config(r#"{"timeout_secs": 12, "admission": "one-per-station"}"#);
    let file = ConfigLoader::load_from(&path).unwrap();
    let flags = Config {
        admission: Some(AdmissionPolicy::Unbounded),
        ..Config::default()
    };

    let settings = ConfigLoader::resolve_config(file.overlay(flags)).unwrap();

    assert_eq!(settings.timeout, Duration::from_secs(12));
    assert_eq!(settings.admission, AdmissionPolicy::Unbounded);
}

#[test]
fn invalid_json_is_parse_error() {
    let (_temp, path) = write_config("{ timeout_secs = 3 }");

    assert_matches!(ConfigLoader::load_from(&path), Err(AirqError::ConfigParse(_)));
}

#[test]
fn explicit_missing_file_is_read_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(temp.path().join("absent.json")).unwrap();

    assert_matches!(
        ConfigLoader::load(Some(path.as_str())),
        Err(AirqError::ConfigRead(_))
    );
}

#[test]
fn rejects_bad_values() {
    let bad_url = Config {
        base_url: Some("ftp://api.gios.gov.pl".to_string()),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(bad_url),
        Err(AirqError::ConfigParse(_))
    );

    let zero_timeout = Config {
        timeout_secs: Some(0),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(zero_timeout),
        Err(AirqError::ConfigParse(_))
    );
}
