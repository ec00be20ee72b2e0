use std::net::IpAddr;
use std::str::FromStr;

use eyre::WrapErr;
use serde::Deserialize;

use crate::AnyResult;

const METHOD_PARAMETER_OVERRIDE: &str = "REQUEST_METHOD_PARAMETER_OVERRIDE";
const TRUSTED_PROXIES: &str = "REQUEST_TRUSTED_PROXIES";
const MAX_HEADERS: &str = "REQUEST_MAX_HEADERS";

pub const DEFAULT_MAX_HEADERS: usize = 32;

/// Settings shared by every request built by one server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Allow a `_method` parameter to override the method of `POST` requests.
    pub http_method_parameter_override: bool,
    /// Peers allowed to report the client address through `X-Forwarded-For`.
    pub trusted_proxies: Vec<IpAddr>,
    pub max_headers: usize,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            http_method_parameter_override: false,
            trusted_proxies: Vec::new(),
            max_headers: DEFAULT_MAX_HEADERS,
        }
    }
}

impl RequestConfig {
    pub fn enable_http_method_parameter_override(mut self) -> Self {
        self.http_method_parameter_override = true;
        self
    }

    pub fn with_trusted_proxies(mut self, proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        self.trusted_proxies = proxies.into_iter().collect();
        self
    }

    pub fn is_trusted_proxy(&self, addr: &IpAddr) -> bool {
        self.trusted_proxies.contains(addr)
    }

    pub fn from_env() -> AnyResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `REQUEST_*` variables, unset ones keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AnyResult<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(METHOD_PARAMETER_OVERRIDE) {
            config.http_method_parameter_override = parse_flag(&raw)
                .wrap_err_with(|| format!("invalid {METHOD_PARAMETER_OVERRIDE}"))?;
        }

        if let Some(raw) = lookup(TRUSTED_PROXIES) {
            config.trusted_proxies = raw
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(|c| IpAddr::from_str(c).wrap_err_with(|| format!("invalid proxy `{c}`")))
                .collect::<AnyResult<Vec<_>>>()
                .wrap_err_with(|| format!("invalid {TRUSTED_PROXIES}"))?;
        }

        if let Some(raw) = lookup(MAX_HEADERS) {
            config.max_headers = raw
                .trim()
                .parse()
                .wrap_err_with(|| format!("invalid {MAX_HEADERS}"))?;
        }

        Ok(config)
    }
}

fn parse_flag(raw: &str) -> AnyResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => eyre::bail!("expected a boolean, got `{other}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = RequestConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, RequestConfig::default());
        assert_eq!(config.max_headers, DEFAULT_MAX_HEADERS);
    }

    #[test]
    fn reads_variables() {
        let config = RequestConfig::from_lookup(lookup(&[
            ("REQUEST_METHOD_PARAMETER_OVERRIDE", "yes"),
            ("REQUEST_TRUSTED_PROXIES", "10.0.0.1, ::1"),
            ("REQUEST_MAX_HEADERS", "64"),
        ]))
        .unwrap();

        assert!(config.http_method_parameter_override);
        assert_eq!(
            config.trusted_proxies,
            vec!["10.0.0.1".parse::<IpAddr>().unwrap(), "::1".parse().unwrap()]
        );
        assert_eq!(config.max_headers, 64);
    }

    #[test]
    fn rejects_bad_proxy() {
        let err = RequestConfig::from_lookup(lookup(&[("REQUEST_TRUSTED_PROXIES", "nope")]))
            .unwrap_err();
        assert!(err.to_string().contains("REQUEST_TRUSTED_PROXIES"));
    }

    #[test]
    fn deserializes_partial() {
        let config: RequestConfig =
            serde_json::from_str(r#"{"http_method_parameter_override": true}"#).unwrap();
        assert!(config.http_method_parameter_override);
        assert_eq!(config.max_headers, DEFAULT_MAX_HEADERS);
    }
}
