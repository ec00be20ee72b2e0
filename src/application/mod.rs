pub mod client_ip;
pub mod config;

use std::net::IpAddr;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::domain::errors::{JsonParseError, RequestError};
use crate::domain::json::{decode_json_body, JsonBodyOptions};
use crate::domain::method::Method;
use crate::domain::value::Value;
use crate::infrastructure::bags::{FileBag, Header, HeaderBag, ParameterBag, ServerBag};

/// Read-only view over one inbound request.
///
/// Implementors supply the resolved method, the bags and the raw body; the
/// predicates and body decoding are derived from those.
pub trait RequestView {
    /// The "intended" method, after `X-HTTP-Method-Override` / `_method` resolution.
    fn method(&self) -> Method;

    /// The method used on the wire.
    fn real_method(&self) -> Method;

    /// Raw path and query string, not URI decoded.
    fn request_uri(&self) -> &str;

    fn header_bag(&self) -> &HeaderBag;

    fn query(&self) -> &ParameterBag;

    /// Form fields of the body.
    fn request(&self) -> &ParameterBag;

    fn files(&self) -> &FileBag;

    fn server_parameters(&self) -> &ServerBag;

    fn client_ip(&self) -> Option<IpAddr>;

    fn body(&self) -> &Bytes;

    /// Looks `name` up in the query string, then in the form fields.
    fn get(&self, name: &str, default: Value) -> Value {
        self.query()
            .get(name)
            .or_else(|| self.request().get(name))
            .map_or(default, |c| Value::Text(c.clone()))
    }

    fn content(&self) -> Value {
        Value::from(self.body().clone())
    }

    fn json_body(&self, options: JsonBodyOptions) -> Result<Option<serde_json::Value>, RequestError> {
        decode_json_body(self.body(), options)
    }

    fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError>
    where
        Self: Sized,
    {
        serde_json::from_slice(self.body())
            .map_err(|e| RequestError::JsonParse(JsonParseError::Syntax(e)))
    }

    fn path(&self) -> &str {
        let uri = self.request_uri();
        uri.split_once('?').map_or(uri, |(path, _)| path)
    }

    fn query_string(&self) -> Option<&str> {
        self.request_uri()
            .split_once('?')
            .map(|(_, query)| query)
            .filter(|c| !c.is_empty())
    }

    fn content_type(&self) -> Option<&str> {
        self.header_bag()
            .get(Header::CONTENT_TYPE)
            .map(|c| c.split(';').next().unwrap_or(c).trim())
    }

    fn is_xml_http_request(&self) -> bool {
        self.header_bag()
            .get(Header::X_REQUESTED_WITH)
            .is_some_and(|c| c == "XMLHttpRequest")
    }

    /// CORS pre-flight, i.e. an `OPTIONS` request.
    fn is_pre_flight(&self) -> bool {
        self.method() == Method::OPTIONS
    }

    fn is_head(&self) -> bool {
        self.method() == Method::HEAD
    }

    fn is_get(&self) -> bool {
        self.method() == Method::GET
    }

    fn is_post(&self) -> bool {
        self.method() == Method::POST
    }

    fn is_put(&self) -> bool {
        self.method() == Method::PUT
    }

    fn is_patch(&self) -> bool {
        self.method() == Method::PATCH
    }

    fn is_delete(&self) -> bool {
        self.method() == Method::DELETE
    }

    fn is_purge(&self) -> bool {
        self.method() == Method::PURGE
    }

    fn is_trace(&self) -> bool {
        self.method() == Method::TRACE
    }

    fn is_connect(&self) -> bool {
        self.method() == Method::CONNECT
    }
}
