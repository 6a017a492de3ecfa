//! SSRF-safe fetcher shared by `fetch_rss` and `fetch_url` (spec §4.5):
//! permits only http/https, rejects any resolved address in a private,
//! loopback, or link-local range, and enforces a 15s timeout / 2MB cap.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use futures_util::StreamExt;
use hive_core::{HiveError, Result};
use url::Url;

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(15);
pub const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024;

/// Parses and validates `raw_url`, resolving its host and rejecting any
/// disallowed address (spec §8 "Boundary behaviors").
pub async fn validate_url(raw_url: &str) -> Result<Url> {
    let parsed = Url::parse(raw_url).map_err(|e| HiveError::Validation(format!("invalid URL: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(HiveError::Validation(format!("unsupported URL scheme: {other}"))),
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| HiveError::Validation("URL has no host".to_string()))?
        .to_string();
    let port = parsed.port_or_known_default().unwrap_or(80);

    let addrs: Vec<IpAddr> = tokio::net::lookup_host((host.as_str(), port))
        .await
        .map_err(|e| HiveError::Validation(format!("DNS resolution failed: {e}")))?
        .map(|sock| sock.ip())
        .collect();

    if addrs.is_empty() {
        return Err(HiveError::Validation("URL did not resolve to any address".to_string()));
    }

    for ip in &addrs {
        if is_disallowed(*ip) {
            return Err(HiveError::Validation(format!(
                "URL resolves to a disallowed address: {ip}"
            )));
        }
    }

    Ok(parsed)
}

fn is_disallowed(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_disallowed_v4(v4),
        IpAddr::V6(v6) => is_disallowed_v6(v6),
    }
}

fn is_disallowed_v4(ip: Ipv4Addr) -> bool {
    let o = ip.octets();
    ip.is_loopback()
        || ip.is_link_local()
        || o[0] == 0
        || o[0] == 10
        || (o[0] == 172 && (16..=31).contains(&o[1]))
        || (o[0] == 192 && o[1] == 168)
}

fn is_disallowed_v6(ip: Ipv6Addr) -> bool {
    if ip.is_loopback() {
        return true;
    }
    let seg = ip.segments()[0];
    // fc00::/7
    if (seg & 0xfe00) == 0xfc00 {
        return true;
    }
    // fe80::/10
    if (seg & 0xffc0) == 0xfe80 {
        return true;
    }
    false
}

/// Fetches `url` with a 15s timeout, counting bytes as they stream in and
/// aborting once the 2MB cap would be exceeded.
pub async fn fetch_capped(url: &Url) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| HiveError::Transport(e.to_string()))?;

    let resp = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| HiveError::Transport(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(HiveError::Transport(format!(
            "fetch failed with status {}",
            resp.status()
        )));
    }

    let mut stream = resp.bytes_stream();
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| HiveError::Transport(e.to_string()))?;
        buf.extend_from_slice(&chunk);
        if buf.len() > MAX_RESPONSE_BYTES {
            return Err(HiveError::Validation(format!(
                "response exceeded {MAX_RESPONSE_BYTES} byte cap"
            )));
        }
    }

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_non_http_scheme() {
        let err = validate_url("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, HiveError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_loopback_hostname() {
        let err = validate_url("http://127.0.0.1/").await.unwrap_err();
        assert!(matches!(err, HiveError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_ipv6_loopback() {
        let err = validate_url("http://[::1]/").await.unwrap_err();
        assert!(matches!(err, HiveError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_link_local_metadata_address() {
        let err = validate_url("http://169.254.169.254/").await.unwrap_err();
        assert!(matches!(err, HiveError::Validation(_)));
    }

    #[test]
    fn disallows_private_ranges() {
        assert!(is_disallowed_v4("10.0.0.5".parse().unwrap()));
        assert!(is_disallowed_v4("172.16.0.1".parse().unwrap()));
        assert!(is_disallowed_v4("172.31.255.255".parse().unwrap()));
        assert!(!is_disallowed_v4("172.32.0.1".parse().unwrap()));
        assert!(is_disallowed_v4("192.168.1.1".parse().unwrap()));
        assert!(!is_disallowed_v4("8.8.8.8".parse().unwrap()));
    }

    #[test]
    fn disallows_ipv6_unique_local_and_link_local() {
        assert!(is_disallowed_v6("fc00::1".parse().unwrap()));
        assert!(is_disallowed_v6("fe80::1".parse().unwrap()));
        assert!(!is_disallowed_v6("2001:4860:4860::8888".parse().unwrap()));
    }
}
