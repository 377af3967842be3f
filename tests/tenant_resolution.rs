//! Integration tests for per-tenant resolution.

use multitenant_config::error::ValidationError;
use multitenant_config::prelude::*;
use multitenant_config::sources::MemorySource;
use multitenant_config::tenant::placeholder;
use proptest::prelude::*;
use serde::Deserialize;
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
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

/// DbConfig with only the server required, so the default section resolves.
fn lenient_db() -> ModelDescriptor<DbConfig> {
    ModelDescriptor::new("DbConfig")
        .with_apply_tenant(|db: &mut DbConfig, tenant: &str| db.apply_tenant(tenant))
        .with_validation(|db: &DbConfig| match db.server {
            Some(_) => Ok(()),
            None => Err(ValidationError::missing_field("server")),
        })
}

fn write_layers(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
    let file = dir.path().join("appsettings.json");
    fs::write(
        &file,
        r#"{
            "DbConfig": { "Server": "s1", "Database": "db-%tenantid%" },
            "CustomConfig": { "CustomProp": "default-%tenantid%" }
        }"#,
    )
    .unwrap();

    let remote = dir.path().join("customized.yaml");
    fs::write(
        &remote,
        r#"
CustomizedTenants:
  t1:
    DbConfig:
      Server: s2
      Database: db1
      Username: u1
      Password: p1
  t2:
    CustomConfig:
      CustomProp: t2-only
"#,
    )
    .unwrap();

    (file, remote)
}

async fn build_strict(dir: &TempDir) -> TenantConfig {
    let (file, remote) = write_layers(dir);
    TenantConfig::builder()
        .with_file(file)
        .with_file(remote)
        .register::<DbConfig>()
        .register::<CustomConfig>()
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_customized_tenant_resolves_override_exclusively() {
    let dir = TempDir::new().unwrap();
    let config = build_strict(&dir).await;

    let db = config.resolve_detailed::<DbConfig>("t1").unwrap();
    assert_eq!(db.source(), SectionSource::Tenant);
    assert_eq!(
        *db,
        DbConfig {
            server: Some("s2".into()),
            database: Some("db1".into()),
            username: Some("u1".into()),
            password: Some("p1".into()),
        }
    );
}

#[tokio::test]
async fn test_default_tenant_fails_required_credentials() {
    let dir = TempDir::new().unwrap();
    let config = build_strict(&dir).await;

    match config.resolve::<DbConfig>("") {
        Err(ConfigError::Validation { model, tenant, source }) => {
            assert_eq!(model, "DbConfig");
            assert_eq!(tenant, "");
            assert_eq!(source.missing_fields(), vec!["username", "password"]);
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_default_section_substitutes_empty_tenant() {
    let dir = TempDir::new().unwrap();
    let (file, remote) = write_layers(&dir);
    let config = TenantConfig::builder()
        .with_file(file)
        .with_file(remote)
        .register_descriptor(lenient_db())
        .build()
        .await
        .unwrap();

    let db: DbConfig = config.resolve("").unwrap();
    assert_eq!(db.server.as_deref(), Some("s1"));
    assert_eq!(db.database.as_deref(), Some("db-"));
}

#[tokio::test]
async fn test_tenant_without_model_override_matches_default() {
    let dir = TempDir::new().unwrap();
    let (file, remote) = write_layers(&dir);
    let config = TenantConfig::builder()
        .with_file(file)
        .with_file(remote)
        .register_descriptor(lenient_db())
        .register::<CustomConfig>()
        .build()
        .await
        .unwrap();

    let t2 = config.resolve_detailed::<DbConfig>("t2").unwrap();
    let t9 = config.resolve_detailed::<DbConfig>("t9").unwrap();
    assert_eq!(t2.source(), SectionSource::Default);
    assert_eq!(t2.server, t9.server);
    assert_eq!(t2.database.as_deref(), Some("db-t2"));

    let custom: CustomConfig = config.resolve("t2").unwrap();
    assert_eq!(custom.custom_prop.as_deref(), Some("t2-only"));
    let custom: CustomConfig = config.resolve("t9").unwrap();
    assert_eq!(custom.custom_prop.as_deref(), Some("default-t9"));
}

#[tokio::test]
async fn test_empty_override_subsection_is_no_override() {
    let base = MemorySource::new("base")
        .with_value("CustomConfig:CustomProp", "default-%tenantid%")
        .with_value("CustomizedTenants:t5:Other", "x");
    base.set(
        "CustomizedTenants:t5:CustomConfig",
        config::Value::new(None, config::ValueKind::Table(Default::default())),
    );

    let tenant_config = TenantConfig::builder()
        .with_source(base)
        .register::<CustomConfig>()
        .build()
        .await
        .unwrap();

    assert!(tenant_config.generation().tenants().contains("t5"));
    let custom = tenant_config.resolve_detailed::<CustomConfig>("t5").unwrap();
    assert_eq!(custom.source(), SectionSource::Default);
    assert_eq!(custom.custom_prop.as_deref(), Some("default-t5"));
}

#[tokio::test]
async fn test_resolution_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let config = build_strict(&dir).await;

    let first: DbConfig = config.resolve("t1").unwrap();
    let second: DbConfig = config.resolve("t1").unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_customization_switch_off() {
    let dir = TempDir::new().unwrap();
    let (file, remote) = write_layers(&dir);
    let config = TenantConfig::builder()
        .with_file(file)
        .with_file(remote)
        .register_descriptor(lenient_db())
        .with_tenant_customization(false)
        .build()
        .await
        .unwrap();

    assert!(config.generation().tenants().is_empty());
    let db = config.resolve_detailed::<DbConfig>("t1").unwrap();
    assert_eq!(db.source(), SectionSource::Default);
    assert_eq!(db.server.as_deref(), Some("s1"));
    assert_eq!(db.database.as_deref(), Some("db-t1"));
}

#[tokio::test]
async fn test_unknown_model_is_reported() {
    let dir = TempDir::new().unwrap();
    let (file, _) = write_layers(&dir);
    let config = TenantConfig::builder().with_file(file).build().await.unwrap();

    let err = config.resolve::<DbConfig>("t1").unwrap_err();
    assert!(matches!(err, ConfigError::UnknownModel(_)));
}

#[tokio::test]
async fn test_bind_error_does_not_disturb_other_models() {
    #[derive(Debug, Deserialize)]
    struct PoolConfig {
        #[allow(dead_code)]
        size: u32,
    }

    let base = MemorySource::new("base")
        .with_value("Pool:Size", "not-a-number")
        .with_value("CustomConfig:CustomProp", "ok");

    let config = TenantConfig::builder()
        .with_source(base)
        .register::<CustomConfig>()
        .register_with::<PoolConfig, _, _>("Pool", |_, _| {}, |_| Ok(()))
        .build()
        .await
        .unwrap();

    let err = config.resolve::<PoolConfig>("t1").unwrap_err();
    assert!(matches!(err, ConfigError::BindError { .. }));

    let custom: CustomConfig = config.resolve("t1").unwrap();
    assert_eq!(custom.custom_prop.as_deref(), Some("ok"));
}

#[tokio::test]
async fn test_later_layers_deep_merge() {
    let defaults = MemorySource::new("defaults")
        .with_priority(100)
        .with_value("DbConfig:Server", "s1")
        .with_value("DbConfig:Database", "db");
    let env_like = MemorySource::new("overrides")
        .with_priority(300)
        .with_value("DBCONFIG:server", "s-env");

    let config = TenantConfig::builder()
        .with_source(env_like)
        .with_source(defaults)
        .register_descriptor(lenient_db())
        .build()
        .await
        .unwrap();

    assert_eq!(config.layer_names(), vec!["memory:defaults", "memory:overrides"]);
    let db: DbConfig = config.resolve("").unwrap();
    assert_eq!(db.server.as_deref(), Some("s-env"));
    assert_eq!(db.database.as_deref(), Some("db"));
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct CacheConfig {
    server: Option<String>,
    custom_prop: Option<String>,
}

impl ConfigModel for CacheConfig {
    const SECTION: &'static str = "CacheConfig";

    fn apply_tenant(&mut self, tenant_id: &str) {
        placeholder::apply_opt(&mut self.server, tenant_id);
    }
}

#[tokio::test]
async fn test_pascal_case_model_binds_any_key_case() {
    let layer = MemorySource::new("base")
        .with_value("CacheConfig:CustomProp", "v1")
        .with_value("CacheConfig:SERVER", "cache-%tenantid%")
        .with_value("CustomizedTenants:T4:cacheconfig:server", "cache-t4");

    let config = TenantConfig::builder()
        .with_source(layer)
        .register::<CacheConfig>()
        .build()
        .await
        .unwrap();

    let cache: CacheConfig = config.resolve("t9").unwrap();
    assert_eq!(cache.custom_prop.as_deref(), Some("v1"));
    assert_eq!(cache.server.as_deref(), Some("cache-t9"));

    let cache = config.resolve_detailed::<CacheConfig>("t4").unwrap();
    assert_eq!(cache.source(), SectionSource::Tenant);
    assert_eq!(cache.server.as_deref(), Some("cache-t4"));
    assert_eq!(cache.custom_prop, None);
}

fn tenant_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,11}".prop_filter("customized tenants are excluded", |id| id != "t1" && id != "t2")
}

proptest! {
    #[test]
    fn non_customized_tenants_match_default_after_substitution(tenant in tenant_id()) {
        let dir = TempDir::new().unwrap();
        let (file, remote) = write_layers(&dir);
        let config = tokio_test::block_on(
            TenantConfig::builder()
                .with_file(file)
                .with_file(remote)
                .register_descriptor(lenient_db())
                .build(),
        )
        .unwrap();

        let for_tenant: DbConfig = config.resolve(&tenant).unwrap();
        let default: DbConfig = config.resolve("").unwrap();

        prop_assert_eq!(&for_tenant.server, &default.server);
        prop_assert_eq!(&for_tenant.username, &default.username);
        prop_assert_eq!(&for_tenant.password, &default.password);
        prop_assert_eq!(for_tenant.database, Some(format!("db-{}", tenant)));
    }
}
