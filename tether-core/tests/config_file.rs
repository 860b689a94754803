use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;
use tether_core::Config;

#[test]
fn test_load_from_user_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[thread]\nstop_timeout_ms = 250\n\n[bridge]\ndispatch_budget = 16").unwrap();

    let config = Config::load_from(file.path());
    assert_eq!(config.stop_timeout(), Duration::from_millis(250));
    assert_eq!(config.interrupt_attempts(), 8);
    assert_eq!(config.dispatch_budget(), 16);
}

#[test]
fn test_missing_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("absent.toml"));
    assert_eq!(config.stop_timeout(), Duration::from_secs(1));
    assert_eq!(config.dispatch_budget(), 64);
}

#[test]
fn test_malformed_file_is_ignored() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[thread\nstop_timeout_ms = ???").unwrap();

    let config = Config::load_from(file.path());
    assert_eq!(config.stop_timeout(), Duration::from_secs(1));
    assert_eq!(config.interrupt_attempts(), 8);
}
