use std::str::FromStr;

use log::debug;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::domain::errors::RequestError;

#[allow(clippy::upper_case_acronyms, non_camel_case_types)]
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Method {
    HEAD,
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
    PURGE,
    OPTIONS,
    TRACE,
    CONNECT,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        self.into()
    }

    /// Safe methods don't change server state.
    pub fn is_safe(&self) -> bool {
        matches!(self, Self::GET | Self::HEAD | Self::OPTIONS | Self::TRACE)
    }

    pub fn is_idempotent(&self) -> bool {
        self.is_safe() || matches!(self, Self::PUT | Self::DELETE | Self::PURGE)
    }

    /// Parses a method token, failing with [RequestError::InvalidMethod].
    pub fn parse(raw: &str) -> Result<Self, RequestError> {
        Method::from_str(raw.trim()).map_err(|_| RequestError::InvalidMethod(raw.into()))
    }
}

impl TryFrom<&[u8]> for Method {
    type Error = RequestError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let raw = std::str::from_utf8(value)
            .map_err(|_| RequestError::InvalidMethod(String::from_utf8_lossy(value).into()))?;
        Method::parse(raw)
    }
}

impl TryFrom<&http::Method> for Method {
    type Error = RequestError;

    fn try_from(value: &http::Method) -> Result<Self, Self::Error> {
        Method::parse(value.as_str())
    }
}

impl TryFrom<Method> for http::Method {
    type Error = http::method::InvalidMethod;

    fn try_from(value: Method) -> Result<Self, Self::Error> {
        http::Method::from_bytes(value.as_str().as_bytes())
    }
}

/// Returns the "intended" method of a request.
///
/// Overrides only apply to `POST`. The `X-HTTP-Method-Override` header wins over the
/// `_method` parameter, which is only honoured with `parameter_override` enabled.
pub fn resolve_method(
    transport: Method,
    override_header: Option<&str>,
    override_parameter: Option<&str>,
    parameter_override: bool,
) -> Result<Method, RequestError> {
    if transport != Method::POST {
        return Ok(transport);
    }

    let candidate = override_header
        .filter(|c| !c.trim().is_empty())
        .or_else(|| {
            override_parameter
                .filter(|_| parameter_override)
                .filter(|c| !c.trim().is_empty())
        });

    let Some(raw) = candidate else {
        return Ok(transport);
    };

    let method = Method::parse(raw)?;
    if method != transport {
        debug!("method overridden from {transport} to {method}");
    }

    Ok(method)
}
