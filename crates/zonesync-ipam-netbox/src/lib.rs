// # NetBox IPAM Source
//
// This crate provides an IpamSource that reads IP addresses from NetBox.
//
// ## Behavior
//
// - Lists `/api/ipam/ip-addresses/` with `dns_name__empty=false`, so only
//   named addresses are transferred
// - Skips addresses tagged with the configured exclude tag (`tag__n`)
// - Follows the `next` link until every page is read
// - No retries: a failed fetch fails the run, and the next run tries again
//
// ## Security Requirements
//
// - The API token NEVER appears in logs or `Debug` output
// - The source fails fast if the token is empty
// - `next` links are only followed on the configured scheme, host and port,
//   so the token is never sent in plaintext or to another server
//
// ## API Reference
//
// - List IP addresses: GET `/api/ipam/ip-addresses/?limit=..&tag__n=..`
// - Authentication: `Authorization: Token <token>`

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use zonesync_core::config::{IpamConfig, NetboxConfig};
use zonesync_core::registry::PluginRegistry;
use zonesync_core::traits::{IpamAddress, IpamSource, IpamSourceFactory};
use zonesync_core::{Error, Result};

/// Source type name used in configuration
pub const SOURCE_TYPE: &str = "netbox";

/// IP address listing endpoint, relative to the base URL
const IP_ADDRESSES_PATH: &str = "/api/ipam/ip-addresses/";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// One page of the IP address listing
#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    next: Option<String>,
    results: Vec<NetboxIpAddress>,
}

#[derive(Debug, Deserialize)]
struct NetboxIpAddress {
    address: String,
    #[serde(default)]
    dns_name: String,
    #[serde(default)]
    status: Option<NetboxStatus>,
}

#[derive(Debug, Deserialize)]
struct NetboxStatus {
    value: String,
}

impl From<NetboxIpAddress> for IpamAddress {
    fn from(entry: NetboxIpAddress) -> Self {
        IpamAddress::new(
            entry.address,
            entry.dns_name,
            entry.status.map(|s| s.value).unwrap_or_default(),
        )
    }
}

/// NetBox IPAM source
///
/// # Security
///
/// The Debug implementation does NOT expose the API token.
pub struct NetboxIpamSource {
    /// Base URL, with scheme and without trailing slash
    base_url: String,

    /// API token
    /// ⚠️ NEVER log this value
    token: String,

    /// Tag whose addresses are skipped
    exclude_tag: Option<String>,

    /// Results per page
    page_size: u32,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for NetboxIpamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetboxIpamSource")
            .field("base_url", &self.base_url)
            .field("token", &"<REDACTED>")
            .field("exclude_tag", &self.exclude_tag)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl NetboxIpamSource {
    /// Create a NetBox source
    ///
    /// # Errors
    ///
    /// - `Error::Config` if the settings are invalid
    /// - `Error::Http` if the HTTP client cannot be built
    pub fn new(config: &NetboxConfig) -> Result<Self> {
        config.validate()?;

        // Build HTTP client with timeout
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: normalize_base_url(&config.host),
            token: config.token.clone(),
            exclude_tag: config.exclude_tag.clone().filter(|t| !t.is_empty()),
            page_size: config.page_size,
            client,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Query parameters of the first page
    fn first_page_query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("limit", self.page_size.to_string()),
            ("dns_name__empty", "false".to_string()),
        ];
        if let Some(tag) = &self.exclude_tag {
            query.push(("tag__n", tag.clone()));
        }
        query
    }

    /// Fetch one page
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /api/ipam/ip-addresses/?limit=1000&dns_name__empty=false&tag__n=zonesync_exclude
    /// Authorization: Token <token>
    /// ```
    async fn fetch_page(&self, request: reqwest::RequestBuilder) -> Result<Page> {
        let response = request
            .header("Authorization", format!("Token {}", self.token))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Error::http(format!("HTTP request failed: {}", e)))?;

        // Handle specific HTTP status codes
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status.as_u16(), &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| Error::ipam(format!("Failed to parse NetBox response: {}", e)))
    }
}

/// Map a non-success status code to an error
fn status_error(status: u16, body: &str) -> Error {
    match status {
        401 | 403 => Error::auth(format!(
            "NetBox rejected the API token or its permissions. Status: {}",
            status
        )),
        429 => Error::rate_limited(format!("NetBox rate limit exceeded. Status: {}", status)),
        500..=599 => Error::http(format!("NetBox server error (transient): {} - {}", status, body)),
        _ => Error::ipam(format!("NetBox request failed: {} - {}", status, body)),
    }
}

/// Resolve a `next` link against the base URL, refusing any other origin
fn next_page_url(base_url: &str, next: &str) -> Result<reqwest::Url> {
    let base = reqwest::Url::parse(base_url)
        .map_err(|e| Error::ipam(format!("Invalid NetBox base URL {}: {}", base_url, e)))?;
    let url = base
        .join(next)
        .map_err(|e| Error::ipam(format!("Invalid NetBox next link {}: {}", next, e)))?;

    if url.origin() != base.origin() {
        return Err(Error::ipam(format!(
            "NetBox next link {} is outside {}; not sending the API token there",
            url,
            base.origin().ascii_serialization()
        )));
    }
    Ok(url)
}

/// Normalise the configured host into a base URL
fn normalize_base_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[async_trait]
impl IpamSource for NetboxIpamSource {
    async fn fetch_addresses(&self) -> Result<Vec<IpamAddress>> {
        let first = format!("{}{}", self.base_url, IP_ADDRESSES_PATH);
        debug!("Fetching IP addresses from {}", first);

        let mut page = self
            .fetch_page(self.client.get(&first).query(&self.first_page_query()))
            .await?;
        let mut addresses: Vec<IpamAddress> = Vec::new();
        let mut seen = HashSet::new();
        let mut pages = 1;

        loop {
            addresses.extend(page.results.into_iter().map(IpamAddress::from));

            let Some(next) = page.next.filter(|n| !n.is_empty()) else {
                break;
            };
            if !seen.insert(next.clone()) {
                return Err(Error::ipam(format!("NetBox pagination loops at {}", next)));
            }

            let url = next_page_url(&self.base_url, &next)?;
            debug!("Fetching next page: {}", url);
            page = self.fetch_page(self.client.get(url)).await?;
            pages += 1;
        }

        info!("Fetched {} addresses from NetBox ({} page(s))", addresses.len(), pages);
        Ok(addresses)
    }

    fn source_name(&self) -> &'static str {
        SOURCE_TYPE
    }
}

/// Factory for creating NetBox sources
pub struct NetboxFactory;

impl IpamSourceFactory for NetboxFactory {
    fn create(&self, config: &IpamConfig) -> Result<Box<dyn IpamSource>> {
        match config {
            IpamConfig::Netbox(netbox) => Ok(Box::new(NetboxIpamSource::new(netbox)?)),
            _ => Err(Error::config("Invalid config for NetBox source")),
        }
    }
}

/// Register the NetBox source with a registry
///
/// # Example
///
/// ```rust
/// use zonesync_core::PluginRegistry;
///
/// let registry = PluginRegistry::new();
/// zonesync_ipam_netbox::register(&registry);
/// assert!(registry.has_ipam_source("netbox"));
/// ```
pub fn register(registry: &PluginRegistry) {
    registry.register_ipam_source(SOURCE_TYPE, Box::new(NetboxFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer, page_size: u32) -> NetboxIpamSource {
        let mut config = NetboxConfig::new(server.uri(), "secret-token");
        config.page_size = page_size;
        NetboxIpamSource::new(&config).unwrap()
    }

    fn entry(address: &str, dns_name: &str, status: &str) -> serde_json::Value {
        json!({
            "id": 1,
            "address": address,
            "dns_name": dns_name,
            "status": { "value": status, "label": status },
        })
    }

    #[tokio::test]
    async fn test_fetch_follows_pagination() {
        let server = MockServer::start().await;
        let next = format!("{}/api/ipam/ip-addresses/?limit=2&offset=2", server.uri());

        Mock::given(method("GET"))
            .and(path("/api/ipam/ip-addresses/"))
            .and(query_param("offset", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 3,
                "next": null,
                "results": [entry("2001:db8::5/64", "v6.example.com", "active")],
            })))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/ipam/ip-addresses/"))
            .and(query_param("limit", "2"))
            .and(query_param("dns_name__empty", "false"))
            .and(query_param("tag__n", "zonesync_exclude"))
            .and(header("Authorization", "Token secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 3,
                "next": next,
                "results": [
                    entry("192.0.2.1/24", "a.example.com", "active"),
                    entry("192.0.2.2/24", "b.example.com", "deprecated"),
                ],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let addresses = source_for(&server, 2).fetch_addresses().await.unwrap();

        assert_eq!(addresses.len(), 3);
        assert_eq!(addresses[0], IpamAddress::new("192.0.2.1/24", "a.example.com", "active"));
        assert_eq!(addresses[1].status, "deprecated");
        assert_eq!(addresses[2].dns_name, "v6.example.com");
    }

    #[tokio::test]
    async fn test_missing_status_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/ipam/ip-addresses/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "next": null,
                "results": [{ "address": "192.0.2.9/32", "dns_name": "x.example.com" }],
            })))
            .mount(&server)
            .await;

        let addresses = source_for(&server, 1000).fetch_addresses().await.unwrap();
        assert_eq!(addresses[0].status, "");
        assert!(!addresses[0].is_active());
    }

    #[tokio::test]
    async fn test_status_codes_map_to_errors() {
        for status in [401u16, 403, 429, 503, 404] {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
                .mount(&server)
                .await;

            let err = source_for(&server, 1000).fetch_addresses().await.unwrap_err();
            let mapped = match status {
                401 | 403 => matches!(err, Error::Authentication(_)),
                429 => matches!(err, Error::RateLimited(_)),
                503 => matches!(err, Error::Http(_)),
                _ => matches!(err, Error::Ipam(_)),
            };
            assert!(mapped, "status {status} gave {err}");
        }
    }

    #[tokio::test]
    async fn test_pagination_loop_is_an_error() {
        let server = MockServer::start().await;
        let next = format!("{}/api/ipam/ip-addresses/?offset=1", server.uri());
        Mock::given(method("GET"))
            .and(path("/api/ipam/ip-addresses/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "next": next,
                "results": [],
            })))
            .mount(&server)
            .await;

        let err = source_for(&server, 1000).fetch_addresses().await.unwrap_err();
        assert!(matches!(err, Error::Ipam(_)));
    }

    #[tokio::test]
    async fn test_cross_origin_next_link_is_refused() {
        let server = MockServer::start().await;
        let elsewhere = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/ipam/ip-addresses/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "next": format!("{}/api/ipam/ip-addresses/?offset=1", elsewhere.uri()),
                "results": [entry("192.0.2.1/24", "a.example.com", "active")],
            })))
            .mount(&server)
            .await;

        // The token must never reach the other server
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "next": null,
                "results": [],
            })))
            .expect(0)
            .mount(&elsewhere)
            .await;

        let err = source_for(&server, 1000).fetch_addresses().await.unwrap_err();
        assert!(matches!(err, Error::Ipam(_)), "got {err}");
    }

    #[test]
    fn test_next_page_url_origin() {
        let base = "https://netbox.example.com";

        let same = next_page_url(base, "https://netbox.example.com/api/ipam/ip-addresses/?offset=2").unwrap();
        assert_eq!(same.query(), Some("offset=2"));

        let relative = next_page_url(base, "/api/ipam/ip-addresses/?offset=4").unwrap();
        assert_eq!(relative.host_str(), Some("netbox.example.com"));
        assert_eq!(relative.scheme(), "https");

        // Downgrade behind a TLS-terminating proxy
        assert!(next_page_url(base, "http://netbox.example.com/api/ipam/ip-addresses/?offset=2").is_err());
        assert!(next_page_url(base, "https://attacker.example.net/api/ipam/ip-addresses/").is_err());
        assert!(next_page_url(base, "https://netbox.example.com:8443/api/ipam/ip-addresses/").is_err());
    }

    #[test]
    fn test_base_url_normalisation() {
        assert_eq!(normalize_base_url("netbox.example.com"), "https://netbox.example.com");
        assert_eq!(normalize_base_url("https://netbox.example.com/"), "https://netbox.example.com");
        assert_eq!(normalize_base_url("http://127.0.0.1:8000"), "http://127.0.0.1:8000");
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let source = NetboxIpamSource::new(&NetboxConfig::new("netbox.example.com", "super-secret")).unwrap();
        let debug = format!("{:?}", source);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<REDACTED>"));
    }

    #[test]
    fn test_factory() {
        let registry = PluginRegistry::new();
        register(&registry);

        let config = IpamConfig::Netbox(NetboxConfig::new("netbox.example.com", "token"));
        let source = registry.create_ipam_source(&config).unwrap();
        assert_eq!(source.source_name(), "netbox");

        let empty_token = IpamConfig::Netbox(NetboxConfig::new("netbox.example.com", ""));
        assert!(matches!(NetboxFactory.create(&empty_token), Err(Error::Config(_))));

        let wrong = IpamConfig::Static { addresses: vec![] };
        assert!(NetboxFactory.create(&wrong).is_err());
    }
}
