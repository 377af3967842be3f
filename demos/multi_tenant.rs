//! Demo of tenant-aware resolution with live reload.
//!
//! This demo shows how to:
//! - Layer a base file, a tenant customization file and environment variables
//! - Resolve models for explicit tenants and for the tenant of a request
//! - Keep serving while files are edited
//!
//! Run with: cargo run --example multi_tenant
//!
//! While running, edit demos/customized.yaml to see tenants pick up changes.

use http::{HeaderMap, HeaderValue};
use multitenant_config::prelude::*;
use multitenant_config::tenant::placeholder;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
struct CustomConfig {
    #[serde(rename = "CustomProp")]
    custom_prop: Option<String>,
}

impl ConfigModel for CustomConfig {
    const SECTION: &'static str = "CustomConfig";

    fn apply_tenant(&mut self, tenant_id: &str) {
        placeholder::apply_opt(&mut self.custom_prop, tenant_id);
    }
}

fn describe(config: &TenantConfig, tenant: &str) {
    match config.resolve_detailed::<DbConfig>(tenant) {
        Ok(db) => println!(
            "  [{:>4}] DbConfig from {:?} (generation {}): server={:?} database={:?}",
            tenant,
            db.source(),
            db.generation(),
            db.server,
            db.database
        ),
        Err(e) => println!("  [{:>4}] DbConfig unavailable: {}", tenant, e),
    }
    match config.resolve::<CustomConfig>(tenant) {
        Ok(custom) => println!("         CustomConfig: {:?}", custom.custom_prop),
        Err(e) => println!("         CustomConfig unavailable: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "multitenant_config=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Multi-Tenant Configuration Demo ===\n");

    let config = TenantConfig::builder()
        .with_file("demos/appsettings.json")
        .with_optional_file("demos/customized.yaml")
        .with_env_overrides("DEMO", "__")
        .with_watch_debounce(Duration::from_millis(500))
        .register::<DbConfig>()
        .register::<CustomConfig>()
        .build()
        .await?;

    println!("Layers: {:?}", config.layer_names());
    println!(
        "Customized tenants: {:?}\n",
        config.generation().tenants().iter().collect::<Vec<_>>()
    );

    for tenant in ["", "t1", "t2", "t3"] {
        describe(&config, tenant);
    }

    // Request-scoped resolution from the X-TenantId header.
    let extractor = HeaderTenantExtractor::default();
    let mut headers = HeaderMap::new();
    headers.insert("x-tenantid", HeaderValue::from_static("t3"));
    let db: DbConfig = extractor
        .scope(&headers, async { config.resolve_current() })
        .await?;
    println!("\nRequest for tenant t3 connects to {:?}", db.server);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = config.start_watching(shutdown_rx).await?;
    println!("\nWatching for changes. Press Ctrl+C to exit.\n");

    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    let mut last_sequence = config.generation().sequence();
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let sequence = config.generation().sequence();
                if sequence != last_sequence {
                    println!("Generation {} published", sequence);
                    for tenant in ["", "t1", "t2", "t3"] {
                        describe(&config, tenant);
                    }
                    last_sequence = sequence;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    shutdown_tx.send_replace(true);
    handle.join().await?;

    let stats = config.reload_stats();
    println!(
        "\nReloads: {} attempted, {} published, {} failed",
        stats.attempts, stats.successes, stats.failures
    );
    Ok(())
}
