//! Tenant extraction from inbound request headers.

use super::{TenantContext, TenantId};
use crate::error::{ConfigError, Result};
use http::{HeaderMap, HeaderName};
use std::future::Future;

/// Header carrying the tenant id when no other name is configured.
pub const DEFAULT_TENANT_HEADER: &str = "X-TenantId";

/// Reads the tenant id of a request from a designated header.
///
/// The first value of the header is used, trimmed. An absent header, or one
/// whose value is not valid UTF-8, yields the empty tenant id.
///
/// # Examples
///
/// ```rust
/// use http::HeaderMap;
/// use multitenant_config::tenant::HeaderTenantExtractor;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("x-tenantid", "t1".parse().unwrap());
///
/// let extractor = HeaderTenantExtractor::default();
/// assert_eq!(extractor.extract(&headers).as_str(), "t1");
/// ```
#[derive(Debug, Clone)]
pub struct HeaderTenantExtractor {
    header: HeaderName,
}

impl HeaderTenantExtractor {
    /// Create an extractor reading `header_name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHeader`] if `header_name` is not a valid
    /// HTTP header name.
    pub fn new(header_name: &str) -> Result<Self> {
        let header = HeaderName::from_bytes(header_name.trim().as_bytes()).map_err(|e| {
            ConfigError::InvalidHeader {
                header: header_name.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { header })
    }

    /// Name of the header this extractor reads.
    pub fn header_name(&self) -> &HeaderName {
        &self.header
    }

    /// Tenant id carried by `headers`.
    pub fn extract(&self, headers: &HeaderMap) -> TenantId {
        headers
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .map(|value| TenantId::new(value.trim()))
            .unwrap_or_default()
    }

    /// Run `future` in the tenant scope of the request described by `headers`.
    pub fn scope<F>(&self, headers: &HeaderMap, future: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        TenantContext::scope(self.extract(headers), future)
    }
}

impl Default for HeaderTenantExtractor {
    fn default() -> Self {
        Self {
            header: HeaderName::from_static("x-tenantid"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_default_header_name() {
        let extractor = HeaderTenantExtractor::default();
        assert!(
            extractor
                .header_name()
                .as_str()
                .eq_ignore_ascii_case(DEFAULT_TENANT_HEADER)
        );
    }

    #[test]
    fn test_absent_header_is_empty() {
        let extractor = HeaderTenantExtractor::default();
        assert!(extractor.extract(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_first_value_wins() {
        let mut headers = HeaderMap::new();
        headers.append("X-TenantId", HeaderValue::from_static(" t1 "));
        headers.append("X-TenantId", HeaderValue::from_static("t2"));
        let extractor = HeaderTenantExtractor::default();
        assert_eq!(extractor.extract(&headers).as_str(), "t1");
    }

    #[test]
    fn test_custom_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-tenant", HeaderValue::from_static("acme"));
        headers.insert("x-tenantid", HeaderValue::from_static("other"));
        let extractor = HeaderTenantExtractor::new("X-Tenant").unwrap();
        assert_eq!(extractor.extract(&headers).as_str(), "acme");
    }

    #[test]
    fn test_invalid_header_name() {
        match HeaderTenantExtractor::new("bad header") {
            Err(ConfigError::InvalidHeader { header, .. }) => assert_eq!(header, "bad header"),
            other => panic!("expected invalid header error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_utf8_value_is_empty() {
        let mut headers = HeaderMap::new();
        headers.insert("x-tenantid", HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap());
        assert!(HeaderTenantExtractor::default().extract(&headers).is_none());
    }

    #[tokio::test]
    async fn test_scope_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-tenantid", HeaderValue::from_static("t4"));
        let extractor = HeaderTenantExtractor::default();
        let seen = extractor.scope(&headers, async { TenantContext::current() }).await;
        assert_eq!(seen.as_str(), "t4");
    }
}
