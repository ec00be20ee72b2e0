use std::net::IpAddr;
use std::str::FromStr;

use log::debug;

use crate::application::config::RequestConfig;
use crate::infrastructure::bags::{Header, HeaderBag};

/// Resolves the client address, following `X-Forwarded-For` only behind a trusted proxy.
pub fn resolve_client_ip(
    remote: Option<IpAddr>,
    headers: &HeaderBag,
    config: &RequestConfig,
) -> Option<IpAddr> {
    let remote = remote?;
    if !config.is_trusted_proxy(&remote) {
        return Some(remote);
    }

    let forwarded = headers
        .get_all(Header::X_FORWARDED_FOR)
        .iter()
        .flat_map(|c| c.split(','))
        .filter_map(|c| IpAddr::from_str(c.trim()).ok())
        .collect::<Vec<_>>();

    // right-most untrusted hop is the client
    let client = forwarded
        .iter()
        .rev()
        .find(|c| !config.is_trusted_proxy(c))
        .or_else(|| forwarded.first())
        .copied();

    match client {
        Some(ip) => {
            debug!("client {ip} forwarded by trusted proxy {remote}");
            Some(ip)
        }
        None => Some(remote),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(raw: &str) -> IpAddr {
        raw.parse().unwrap()
    }

    fn forwarded(value: &str) -> HeaderBag {
        [("X-Forwarded-For", value)].into_iter().collect()
    }

    #[test]
    fn untrusted_peer_is_the_client() {
        let config = RequestConfig::default();
        let client = resolve_client_ip(Some(ip("1.2.3.4")), &forwarded("9.9.9.9"), &config);
        assert_eq!(client, Some(ip("1.2.3.4")));
    }

    #[test]
    fn trusted_proxy_uses_forwarded_chain() {
        let config = RequestConfig::default().with_trusted_proxies([ip("10.0.0.1"), ip("10.0.0.2")]);
        let headers = forwarded("203.0.113.9, 198.51.100.3, 10.0.0.2");

        let client = resolve_client_ip(Some(ip("10.0.0.1")), &headers, &config);
        assert_eq!(client, Some(ip("198.51.100.3")));
    }

    #[test]
    fn all_hops_trusted_uses_left_most() {
        let config = RequestConfig::default().with_trusted_proxies([ip("10.0.0.1"), ip("10.0.0.2")]);
        let client = resolve_client_ip(Some(ip("10.0.0.1")), &forwarded("10.0.0.2"), &config);
        assert_eq!(client, Some(ip("10.0.0.2")));
    }

    #[test]
    fn trusted_proxy_without_header() {
        let config = RequestConfig::default().with_trusted_proxies([ip("10.0.0.1")]);
        let client = resolve_client_ip(Some(ip("10.0.0.1")), &HeaderBag::new(), &config);
        assert_eq!(client, Some(ip("10.0.0.1")));
    }

    #[test]
    fn no_remote_address() {
        let client = resolve_client_ip(None, &forwarded("1.1.1.1"), &RequestConfig::default());
        assert_eq!(client, None);
    }
}
