use meshmap::config::Config;
use meshmap::sync::SyncConfig;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn create_default_then_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    let path = path.to_str().unwrap();

    assert_ok!(Config::create_default(path).await);
    let config = assert_ok!(Config::load(path).await);
    assert_eq!(config.controller.base_url, "http://localhost:4040");
    assert_eq!(config.controller.api_root(), "http://localhost:4040/api/v1");

    let sync = SyncConfig::from(&config.sync);
    assert_eq!(sync.poll_interval, Duration::from_millis(2500));
    assert!(sync.fetch_neighbors);
}

#[tokio::test]
async fn loads_custom_settings() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("meshmap.toml");
    std::fs::write(
        &path,
        r#"
[controller]
base_url = "https://gateway.lan:8443"
api_path = "/api/v2"
timeout_seconds = 12

[sync]
poll_interval_ms = 1000
fetch_neighbors = false

[logging]
level = "debug"
file = "meshmap.log"
"#,
    )
    .unwrap();

    let config = assert_ok!(Config::load(path.to_str().unwrap()).await);
    assert_eq!(config.controller.api_root(), "https://gateway.lan:8443/api/v2");
    assert_eq!(config.controller.timeout_seconds, 12);
    assert_eq!(config.sync.poll_interval(), Duration::from_secs(1));
    assert!(!config.sync.fetch_neighbors);
    assert_eq!(config.logging.level_filter(), log::LevelFilter::Debug);
    assert_eq!(config.logging.file.as_deref(), Some("meshmap.log"));
}

#[tokio::test]
async fn rejects_invalid_files() {
    let dir = tempfile::tempdir().expect("tempdir");

    let missing = dir.path().join("absent.toml");
    assert_err!(Config::load(missing.to_str().unwrap()).await);

    let no_controller = dir.path().join("empty.toml");
    std::fs::write(&no_controller, "[sync]\npoll_interval_ms = 2500\n").unwrap();
    assert_err!(Config::load(no_controller.to_str().unwrap()).await);

    let too_fast = dir.path().join("fast.toml");
    std::fs::write(
        &too_fast,
        "[controller]\nbase_url = \"http://localhost:4040\"\n\n[sync]\npoll_interval_ms = 5\n",
    )
    .unwrap();
    let err = assert_err!(Config::load(too_fast.to_str().unwrap()).await);
    assert!(err.to_string().contains("poll_interval_ms"));
}
