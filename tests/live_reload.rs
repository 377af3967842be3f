//! Integration tests for live reload.

use multitenant_config::prelude::*;
use multitenant_config::sources::MemorySource;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};

fn base_layer() -> MemorySource {
    MemorySource::new("base")
        .with_value("DbConfig:Server", "s1")
        .with_value("DbConfig:Database", "db-%tenantid%")
        .with_value("DbConfig:Username", "u")
        .with_value("DbConfig:Password", "p")
}

async fn build(layers: Vec<MemorySource>) -> TenantConfig {
    TenantConfig::builder()
        .with_sources(layers)
        .register::<DbConfig>()
        .build()
        .await
        .unwrap()
}

async fn wait_for_sequence(config: &TenantConfig, sequence: u64) {
    timeout(Duration::from_secs(5), async {
        while config.generation().sequence() < sequence {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("generation was not published in time");
}

#[tokio::test]
async fn test_layer_change_publishes_new_generation() {
    let base = base_layer();
    let config = build(vec![base.clone()]).await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = config.start_watching(shutdown_rx).await.unwrap();
    assert!(config.is_watching());

    let before: DbConfig = config.resolve("t1").unwrap();
    base.set("DbConfig:Server", "s-new");
    wait_for_sequence(&config, 2).await;

    let after = config.resolve_detailed::<DbConfig>("t1").unwrap();
    assert_eq!(before.server.as_deref(), Some("s1"));
    assert_eq!(after.server.as_deref(), Some("s-new"));
    assert!(after.generation() >= 2);

    shutdown_tx.send(true).unwrap();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_new_customized_tenant_appears_on_reload() {
    let base = base_layer();
    let tenants = MemorySource::new("tenants").with_priority(270).optional();
    let config = build(vec![base, tenants.clone()]).await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = config.start_watching(shutdown_rx).await.unwrap();

    assert_eq!(
        config.resolve_detailed::<DbConfig>("t7").unwrap().source(),
        SectionSource::Default
    );

    tenants.set("CustomizedTenants:t7:DbConfig:Server", "s7");
    tenants.set("CustomizedTenants:t7:DbConfig:Database", "db7");
    tenants.set("CustomizedTenants:t7:DbConfig:Username", "u7");
    tenants.set("CustomizedTenants:t7:DbConfig:Password", "p7");

    timeout(Duration::from_secs(5), async {
        loop {
            let generation = config.generation();
            if generation.get_string("CustomizedTenants:t7:DbConfig:Password").is_some() {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let db = config.resolve_detailed::<DbConfig>("t7").unwrap();
    assert_eq!(db.source(), SectionSource::Tenant);
    assert_eq!(db.server.as_deref(), Some("s7"));

    shutdown_tx.send(true).unwrap();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_resolution_after_publication_never_sees_older_generation() {
    let base = base_layer();
    let config = build(vec![base.clone()]).await;

    for round in 2..=10u64 {
        let server = format!("s{}", round);
        base.set("DbConfig:Server", server.as_str());
        let published = config.reload().await.unwrap();
        assert_eq!(published.sequence(), round);

        let db = config.resolve_detailed::<DbConfig>("t1").unwrap();
        assert!(db.generation() >= published.sequence());
        assert_eq!(db.server.as_deref(), Some(server.as_str()));
    }
}

#[tokio::test]
async fn test_failed_merge_keeps_last_good_generation() {
    let base = base_layer();
    let config = build(vec![base.clone()]).await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = config.start_watching(shutdown_rx).await.unwrap();

    base.set_available(false);
    timeout(Duration::from_secs(5), async {
        while config.reload_stats().failures == 0 {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(config.generation().sequence(), 1);
    let db: DbConfig = config.resolve("t1").unwrap();
    assert_eq!(db.server.as_deref(), Some("s1"));

    // Recovery on the next notification.
    base.set_available(true);
    wait_for_sequence(&config, 2).await;
    assert!(config.reload_stats().successes >= 1);

    shutdown_tx.send(true).unwrap();
    handle.join().await.unwrap();
}

#[tokio::test]
async fn test_optional_layer_outage_does_not_fail_reload() {
    let base = base_layer();
    let remote = MemorySource::new("remote")
        .with_priority(250)
        .optional()
        .with_value("DbConfig:Server", "s-remote");
    let config = build(vec![base, remote.clone()]).await;

    remote.set_available(false);
    config.reload().await.unwrap();

    let db: DbConfig = config.resolve("t1").unwrap();
    assert_eq!(db.server.as_deref(), Some("s1"));
}

#[tokio::test]
async fn test_shutdown_stops_publishing() {
    let base = base_layer();
    let config = build(vec![base.clone()]).await;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = config.start_watching(shutdown_rx).await.unwrap();

    shutdown_tx.send(true).unwrap();
    timeout(Duration::from_secs(5), handle.join()).await.unwrap().unwrap();
    assert!(!config.is_watching());

    base.set("DbConfig:Server", "s-late");
    sleep(Duration::from_millis(200)).await;

    assert_eq!(config.generation().sequence(), 1);
    let db: DbConfig = config.resolve("t1").unwrap();
    assert_eq!(db.server.as_deref(), Some("s1"));
}

#[tokio::test]
async fn test_watching_twice_is_rejected() {
    let config = build(vec![base_layer()]).await;
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);

    let _handle = config.start_watching(shutdown_rx.clone()).await.unwrap();
    let err = config.start_watching(shutdown_rx).await.unwrap_err();
    assert!(matches!(err, ConfigError::AlreadyWatching));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_never_observe_partial_generation() {
    let base = base_layer();
    let config = build(vec![base.clone()]).await;

    let mut readers = Vec::new();
    for _ in 0..4 {
        let config = config.clone();
        readers.push(tokio::spawn(async move {
            for _ in 0..500 {
                let db = config.resolve_detailed::<DbConfig>("t1").unwrap();
                // Server and password are always written together.
                let server = db.server.clone().unwrap();
                let password = db.password.clone().unwrap();
                assert_eq!(server.trim_start_matches('s'), password.trim_start_matches('p'));
                tokio::task::yield_now().await;
            }
        }));
    }

    for round in 0..50 {
        base.replace(
            [
                ("DbConfig:Server".to_string(), config::Value::from(format!("s{}", round))),
                ("DbConfig:Database".to_string(), config::Value::from("db")),
                ("DbConfig:Username".to_string(), config::Value::from("u")),
                ("DbConfig:Password".to_string(), config::Value::from(format!("p{}", round))),
            ]
            .into_iter()
            .collect(),
        );
        config.reload().await.unwrap();
    }

    for reader in readers {
        reader.await.unwrap();
    }
}

#[cfg(feature = "file-watch")]
#[tokio::test]
async fn test_file_edit_triggers_reload() {
    use std::fs;
    use tempfile::TempDir;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("appsettings.json");
    fs::write(
        &path,
        r#"{ "DbConfig": { "Server": "s1", "Database": "db", "Username": "u", "Password": "p" } }"#,
    )
    .unwrap();

    let config = TenantConfig::builder()
        .with_file(&path)
        .with_watch_debounce(Duration::from_millis(50))
        .register::<DbConfig>()
        .build()
        .await
        .unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = config.start_watching(shutdown_rx).await.unwrap();

    sleep(Duration::from_millis(100)).await;
    fs::write(
        &path,
        r#"{ "DbConfig": { "Server": "s2", "Database": "db", "Username": "u", "Password": "p" } }"#,
    )
    .unwrap();

    timeout(Duration::from_secs(10), async {
        loop {
            let db: DbConfig = config.resolve("t1").unwrap();
            if db.server.as_deref() == Some("s2") {
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("file change was not picked up");

    shutdown_tx.send(true).unwrap();
    handle.join().await.unwrap();
}

#[cfg(feature = "file-watch")]
#[tokio::test]
async fn test_optional_file_created_later_is_merged() {
    use std::fs;
    use tempfile::TempDir;

    let dir = TempDir::new().unwrap();
    let base = dir.path().join("appsettings.json");
    let custom = dir.path().join("appsettings.custom.json");
    fs::write(
        &base,
        r#"{ "DbConfig": { "Server": "s1", "Database": "db", "Username": "u", "Password": "p" } }"#,
    )
    .unwrap();

    let config = TenantConfig::builder()
        .with_file(&base)
        .with_optional_file(&custom)
        .with_watch_debounce(Duration::from_millis(50))
        .register::<DbConfig>()
        .build()
        .await
        .unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = config.start_watching(shutdown_rx).await.unwrap();

    sleep(Duration::from_millis(100)).await;
    fs::write(&custom, r#"{ "DbConfig": { "Server": "s-custom" } }"#).unwrap();

    wait_for_sequence(&config, 2).await;
    let db: DbConfig = config.resolve("t1").unwrap();
    assert_eq!(db.server.as_deref(), Some("s-custom"));
    assert_eq!(db.database.as_deref(), Some("db"));

    shutdown_tx.send(true).unwrap();
    handle.join().await.unwrap();
}
