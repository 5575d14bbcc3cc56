use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use parley_core::config::GeoConfig;
use parley_core::errors::{CoreError, CoreResult};

/// Stored in place of loopback/private addresses so they are never sent to
/// the lookup provider.
pub const UNRESOLVABLE_IP: &str = "0.0.0.0";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeoInfo {
    pub country: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
}

#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, ip: &str) -> CoreResult<GeoInfo>;
}

/// True for addresses that can never resolve to a useful location:
/// loopback, RFC 1918 private ranges, link-local, unspecified, and anything
/// that does not parse as an IP at all.
pub fn is_private_or_loopback(ip: &str) -> bool {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        Ok(IpAddr::V6(v6)) => {
            // fc00::/7 unique-local addresses.
            v6.is_loopback() || v6.is_unspecified() || (v6.segments()[0] & 0xfe00) == 0xfc00
        }
        Err(_) => true,
    }
}

/// ip-api.com style lookup with a short hard timeout. Location is nice to
/// have; a slow provider must never hold up session creation.
pub struct HttpGeoClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpGeoClient {
    pub fn new(config: &GeoConfig) -> CoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| CoreError::provider("geolocation", err))?;

        Ok(Self { http, base_url: config.base_url.trim_end_matches('/').to_string() })
    }
}

#[derive(Deserialize)]
struct GeoResponse {
    status: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    timezone: Option<String>,
}

#[async_trait]
impl GeoLookup for HttpGeoClient {
    async fn lookup(&self, ip: &str) -> CoreResult<GeoInfo> {
        let url = format!("{}/{ip}", self.base_url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| CoreError::provider("geolocation", err))?;

        let parsed: GeoResponse =
            response.json().await.map_err(|err| CoreError::provider("geolocation", err))?;

        if parsed.status != "success" {
            return Err(CoreError::provider(
                "geolocation",
                format!("lookup failed for {ip}: {}", parsed.status),
            ));
        }

        Ok(GeoInfo { country: parsed.country, city: parsed.city, timezone: parsed.timezone })
    }
}

#[cfg(test)]
mod tests {
    use super::is_private_or_loopback;

    #[test]
    fn private_and_loopback_ranges_are_skipped() {
        let skipped = [
            "127.0.0.1",
            "10.1.2.3",
            "172.16.0.9",
            "192.168.1.1",
            "169.254.0.5",
            "0.0.0.0",
            "::1",
            "fc00::1",
            "not-an-ip",
            "",
        ];
        for ip in skipped {
            assert!(is_private_or_loopback(ip), "should skip: {ip}");
        }
    }

    #[test]
    fn public_addresses_are_looked_up() {
        for ip in ["8.8.8.8", "1.1.1.1", "2001:4860:4860::8888"] {
            assert!(!is_private_or_loopback(ip), "should look up: {ip}");
        }
    }
}
