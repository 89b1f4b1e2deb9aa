//! URL admission guard shared by the A2A and MCP fetchers (§4.4).
//!
//! Generalized from `dashflow-webscrape`'s `SsrfConfig`: that guard allows a
//! configurable mix of http/https, private ranges, and domain allowlists,
//! since it is meant to scrape arbitrary public pages. Agent capability
//! endpoints only ever need https and a narrower, fixed blocklist, so this
//! version drops the builder knobs and hardcodes the policy.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};
use url::Url;

const BLOCKED_HOSTNAMES: &[&str] = &["localhost", "127.0.0.1", "0.0.0.0", "169.254.169.254"];
const BLOCKED_SUFFIXES: &[&str] = &[".local", ".internal"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("URL does not parse: {0}")]
    Unparseable(String),
    #[error("scheme '{0}' is not allowed (only https)")]
    SchemeNotAllowed(String),
    #[error("URL has no host")]
    NoHost,
    #[error("host '{0}' is blocked")]
    BlockedHost(String),
    #[error("host '{0}' resolves to a private address {1}")]
    PrivateAddress(String, IpAddr),
    #[error("host '{0}' did not resolve to any address")]
    DidNotResolve(String),
}

/// Parse and validate a URL for outbound capability fetches. Only `https`
/// is allowed; the host must not be a blocked name, a `.local`/`.internal`
/// suffix, or resolve to an RFC1918/loopback/link-local address.
pub fn admit(raw_url: &str) -> Result<Url, AdmissionError> {
    let url = Url::parse(raw_url).map_err(|e| AdmissionError::Unparseable(e.to_string()))?;

    if url.scheme() != "https" {
        return Err(AdmissionError::SchemeNotAllowed(url.scheme().to_string()));
    }

    let host_str = url.host_str().filter(|h| !h.is_empty()).ok_or(AdmissionError::NoHost)?.to_string();
    let host_lower = host_str.to_lowercase();

    if BLOCKED_HOSTNAMES.contains(&host_lower.as_str()) {
        return Err(AdmissionError::BlockedHost(host_str));
    }
    if BLOCKED_SUFFIXES.iter().any(|suffix| host_lower.ends_with(suffix)) {
        return Err(AdmissionError::BlockedHost(host_str));
    }

    let host = url.host().ok_or(AdmissionError::NoHost)?;
    let resolved = resolve_host_to_ips(host, &host_str, url.port_or_known_default().unwrap_or(443))?;
    if resolved.is_empty() {
        return Err(AdmissionError::DidNotResolve(host_str));
    }
    for ip in &resolved {
        if is_private_or_loopback(ip) {
            return Err(AdmissionError::PrivateAddress(host_str, *ip));
        }
    }

    Ok(url)
}

fn resolve_host_to_ips(
    host: url::Host<&str>,
    host_str: &str,
    port: u16,
) -> Result<Vec<IpAddr>, AdmissionError> {
    match host {
        url::Host::Ipv4(ip) => Ok(vec![IpAddr::V4(ip)]),
        url::Host::Ipv6(ip) => Ok(vec![IpAddr::V6(ip)]),
        url::Host::Domain(domain) => {
            let socket_addr = format!("{domain}:{port}");
            let ips = socket_addr
                .to_socket_addrs()
                .map_err(|_| AdmissionError::DidNotResolve(host_str.to_string()))?
                .map(|addr| addr.ip())
                .collect();
            Ok(ips)
        }
    }
}

fn is_private_or_loopback(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_ipv4(v4),
        IpAddr::V6(v6) => is_private_ipv6(v6),
    }
}

fn is_private_ipv4(ip: &Ipv4Addr) -> bool {
    ip.is_private() || ip.is_loopback() || ip.is_link_local() || ip.is_unspecified() || ip.is_broadcast()
}

fn is_private_ipv6(ip: &Ipv6Addr) -> bool {
    if ip.is_loopback() || ip.is_unspecified() {
        return true;
    }
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_private_ipv4(&mapped);
    }
    let segments = ip.segments();
    // fe80::/10 link-local, fc00::/7 unique local
    (segments[0] & 0xffc0) == 0xfe80 || (segments[0] & 0xfe00) == 0xfc00
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_https_scheme() {
        assert_eq!(
            admit("http://example.com").unwrap_err(),
            AdmissionError::SchemeNotAllowed("http".to_string())
        );
    }

    #[test]
    fn rejects_blocked_hostname() {
        assert_eq!(
            admit("https://localhost/agent.json").unwrap_err(),
            AdmissionError::BlockedHost("localhost".to_string())
        );
    }

    #[test]
    fn rejects_local_suffix() {
        assert_eq!(
            admit("https://agent.local/agent.json").unwrap_err(),
            AdmissionError::BlockedHost("agent.local".to_string())
        );
    }

    #[test]
    fn rejects_internal_suffix() {
        assert!(admit("https://foo.internal").is_err());
    }

    #[test]
    fn rejects_literal_rfc1918_address() {
        let err = admit("https://10.0.0.5/agent.json").unwrap_err();
        assert!(matches!(err, AdmissionError::PrivateAddress(_, _)));
    }

    #[test]
    fn rejects_literal_loopback_address() {
        assert!(admit("https://127.0.0.1/agent.json").is_err());
    }

    #[test]
    fn rejects_unparseable_url() {
        assert!(matches!(admit("not a url"), Err(AdmissionError::Unparseable(_))));
    }
}
