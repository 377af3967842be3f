//! Consul KV configuration layer.

use super::config_source::AbortOnDrop;
use super::{ConfigSource, LayerChanges};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default Consul agent address.
pub const DEFAULT_CONSUL_ADDRESS: &str = "http://127.0.0.1:8500";

/// Key holding configuration shared by every application.
pub const SHARED_KEY: &str = "shared";

/// Key holding per-tenant customizations.
pub const CUSTOMIZED_TENANTS_KEY: &str = "CustomizedTenants";

const INDEX_HEADER: &str = "X-Consul-Index";
const TOKEN_HEADER: &str = "X-Consul-Token";
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Layer reading a JSON document stored under one Consul KV key.
///
/// The document is mounted at the root of the layer, so a key holding
/// `{"CustomizedTenants": {"t1": {...}}}` contributes the `CustomizedTenants`
/// section. Changes are detected with Consul blocking queries.
///
/// # Examples
///
/// ```rust,no_run
/// use multitenant_config::sources::ConsulSource;
///
/// # fn example() -> multitenant_config::error::Result<()> {
/// let source = ConsulSource::builder()
///     .with_address("http://consul.internal:8500")
///     .with_key("production/billing")
///     .with_token("acl-token")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ConsulSource {
    address: String,
    key: String,
    token: Option<String>,
    client: Client,
    priority: i32,
    optional: bool,
    wait: Duration,
}

impl ConsulSource {
    /// Create a new builder for constructing a Consul layer.
    pub fn builder() -> ConsulSourceBuilder {
        ConsulSourceBuilder::new()
    }

    /// The three standard layers of a tenant-aware service: `shared`, the
    /// application key, and the optional `CustomizedTenants` key, in
    /// ascending priority (250, 260, 270).
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be constructed.
    pub fn standard_layers(
        address: &str,
        app_key: &str,
        token: Option<&str>,
    ) -> Result<Vec<ConsulSource>> {
        let layer = |key: &str, priority: i32, optional: bool| {
            let mut builder = ConsulSource::builder()
                .with_address(address)
                .with_key(key)
                .with_priority(priority);
            if let Some(token) = token {
                builder = builder.with_token(token);
            }
            if optional {
                builder = builder.optional();
            }
            builder.build()
        };

        Ok(vec![
            layer(SHARED_KEY, 250, false)?,
            layer(app_key, 260, false)?,
            layer(CUSTOMIZED_TENANTS_KEY, 270, true)?,
        ])
    }

    fn kv_url(&self) -> String {
        format!(
            "{}/v1/kv/{}",
            self.address.trim_end_matches('/'),
            self.key.trim_matches('/')
        )
    }

    fn request(&self, url: &str) -> RequestBuilder {
        authorize(self.client.get(url), self.token.as_deref())
    }

    async fn fetch(&self) -> Result<HashMap<String, config::Value>> {
        let response = self
            .request(&format!("{}?raw", self.kv_url()))
            .send()
            .await
            .map_err(|e| ConfigError::unavailable(self.name(), e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ConfigError::unavailable(self.name(), "key not found"));
        }
        if !status.is_success() {
            return Err(ConfigError::unavailable(
                self.name(),
                format!(
                    "HTTP {}: {}",
                    status,
                    status.canonical_reason().unwrap_or("Unknown")
                ),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ConfigError::unavailable(self.name(), e.to_string()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(HashMap::new());
        }

        let json: JsonValue = serde_json::from_slice(&body)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", self.name(), e)))?;
        json_to_config_map(json)
    }
}

#[async_trait]
impl ConfigSource for ConsulSource {
    async fn load(&self) -> Result<HashMap<String, config::Value>> {
        self.fetch().await
    }

    fn name(&self) -> String {
        format!("consul:{}", self.key)
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_optional(&self) -> bool {
        self.optional
    }

    async fn changes(&self) -> Result<Option<LayerChanges>> {
        let (tx, changes) = LayerChanges::channel();
        let poller = IndexPoller {
            client: self.client.clone(),
            url: self.kv_url(),
            token: self.token.clone(),
            wait: self.wait,
            layer: self.name(),
        };
        let task = tokio::spawn(poller.run(tx));
        Ok(Some(changes.with_guard(AbortOnDrop(task))))
    }
}

/// Long-polls a key and signals whenever its modify index moves.
struct IndexPoller {
    client: Client,
    url: String,
    token: Option<String>,
    wait: Duration,
    layer: String,
}

impl IndexPoller {
    async fn run(self, tx: mpsc::Sender<()>) {
        let mut last_index: Option<u64> = None;
        let mut backoff = Duration::from_secs(1);

        while !tx.is_closed() {
            let mut url = format!("{}?wait={}s", self.url, self.wait.as_secs().max(1));
            if let Some(index) = last_index {
                url.push_str(&format!("&index={}", index));
            }

            let response = authorize(self.client.get(&url), self.token.as_deref())
                .timeout(self.wait + Duration::from_secs(5))
                .send()
                .await;

            let index = match response {
                Ok(response) => response
                    .headers()
                    .get(INDEX_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok()),
                Err(e) => {
                    tracing::debug!(layer = %self.layer, error = %e, "Consul watch request failed");
                    None
                }
            };

            match index {
                Some(index) => {
                    backoff = Duration::from_secs(1);
                    if last_index.is_some_and(|previous| previous != index)
                        && tx.send(()).await.is_err()
                    {
                        break;
                    }
                    last_index = Some(index);
                }
                None => {
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }
}

fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.header(TOKEN_HEADER, token),
        None => request,
    }
}

/// Builder for constructing a [`ConsulSource`].
pub struct ConsulSourceBuilder {
    address: String,
    key: Option<String>,
    token: Option<String>,
    timeout: Duration,
    wait: Duration,
    priority: i32,
    optional: bool,
}

impl ConsulSourceBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            address: DEFAULT_CONSUL_ADDRESS.to_string(),
            key: None,
            token: None,
            timeout: Duration::from_secs(10),
            wait: Duration::from_secs(30),
            priority: 250, // Higher than files (100-200), lower than env vars (300)
            optional: false,
        }
    }

    /// Set the Consul agent address.
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the KV key holding the JSON document.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the ACL token sent with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the timeout for plain reads. Default is 10 seconds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how long a blocking watch query waits. Default is 30 seconds.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Set the priority for this layer. Default is 250.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Treat a missing key or unreachable agent as an empty layer.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Build the Consul layer.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No key is provided
    /// - The HTTP client cannot be constructed
    pub fn build(self) -> Result<ConsulSource> {
        let key = self
            .key
            .filter(|key| !key.trim_matches('/').is_empty())
            .ok_or_else(|| ConfigError::LoadError("Key is required for ConsulSource".to_string()))?;

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ConfigError::LoadError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(ConsulSource {
            address: self.address,
            key,
            token: self.token,
            client,
            priority: self.priority,
            optional: self.optional,
            wait: self.wait,
        })
    }
}

impl Default for ConsulSourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a JSON document to a layer map.
fn json_to_config_map(json: JsonValue) -> Result<HashMap<String, config::Value>> {
    match json {
        JsonValue::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| (key, json_value_to_config_value(value)))
            .collect()),
        _ => Err(ConfigError::ParseError(
            "Expected JSON object at root level".to_string(),
        )),
    }
}

/// Convert a serde_json::Value to a config::Value.
fn json_value_to_config_value(value: JsonValue) -> config::Value {
    let kind = match value {
        JsonValue::Null => config::ValueKind::Nil,
        JsonValue::Bool(b) => config::ValueKind::Boolean(b),
        JsonValue::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => config::ValueKind::I64(i),
            (None, Some(u)) => config::ValueKind::U64(u),
            _ => config::ValueKind::Float(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => config::ValueKind::String(s),
        JsonValue::Array(items) => config::ValueKind::Array(
            items.into_iter().map(json_value_to_config_value).collect(),
        ),
        JsonValue::Object(map) => config::ValueKind::Table(
            map.into_iter()
                .map(|(key, value)| (key, json_value_to_config_value(value)))
                .collect(),
        ),
    };
    config::Value::new(None, kind)
}
