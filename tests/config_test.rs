//! Integration tests for configuration loading

use livepoll::infra::Config;
use std::io::Write;
use std::net::IpAddr;
use std::path::Path;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[storage]
base_dir = "/srv/livepoll"
poll_tmp_dir = "/var/tmp/livepoll-qr"
seed_sample_pack = false

[http]
bind_address = "127.0.0.1"
port = 9090
advertise_address = "192.168.1.20"

[qr]
module_px = 4
quiet_zone = 2
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.base_dir(), "/srv/livepoll");
    assert_eq!(config.poll_tmp_dir(), Path::new("/var/tmp/livepoll-qr"));
    assert!(!config.seed_sample_pack());
    assert_eq!(config.bind_address(), "127.0.0.1".parse::<IpAddr>().unwrap());
    assert_eq!(config.port(), 9090);
    assert_eq!(config.advertise_address(), Some("192.168.1.20".parse().unwrap()));
    assert_eq!(config.module_px(), 4);
    assert_eq!(config.quiet_zone(), 2);
    assert_eq!(config.config_file(), temp_file.path().display().to_string());
}

#[test]
fn test_invalid_address_is_an_error() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[http]\nadvertise_address = \"not-an-ip\"\n").unwrap();
    temp_file.flush().unwrap();

    let err = Config::from_file(temp_file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to parse config file"));
}

#[test]
fn test_zero_module_size_rejected() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"[qr]\nmodule_px = 0\n").unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.base_dir(), "livepoll");
    assert_eq!(config.port(), 8080);
    assert_eq!(config.config_file(), "default");
}
