use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;
use compact_str::{format_compact, CompactString};
use log::trace;
use time::OffsetDateTime;

use crate::application::client_ip::resolve_client_ip;
use crate::application::config::RequestConfig;
use crate::application::RequestView;
use crate::domain::errors::RequestError;
use crate::domain::method::{resolve_method, Method};
use crate::infrastructure::bags::{
    FileBag, Header, HeaderBag, ParameterBag, ServerBag, ServerKey, UploadedFile,
};

const METHOD_PARAMETER: &str = "_method";

#[derive(Debug)]
pub struct Request {
    method: Method,
    real_method: Method,
    request_uri: CompactString,
    headers: HeaderBag,
    query: ParameterBag,
    request: ParameterBag,
    files: FileBag,
    server: ServerBag,
    body: Bytes,
    client_ip: Option<IpAddr>,
}

impl Request {
    pub fn builder(
        method: impl Into<CompactString>,
        uri: impl Into<CompactString>,
    ) -> RequestBuilder {
        RequestBuilder {
            method: method.into(),
            uri: uri.into(),
            headers: HeaderBag::new(),
            request: ParameterBag::default(),
            files: FileBag::default(),
            server: ServerBag::default(),
            body: Bytes::new(),
        }
    }
}

impl RequestView for Request {
    fn method(&self) -> Method {
        self.method
    }

    fn real_method(&self) -> Method {
        self.real_method
    }

    fn request_uri(&self) -> &str {
        &self.request_uri
    }

    fn header_bag(&self) -> &HeaderBag {
        &self.headers
    }

    fn query(&self) -> &ParameterBag {
        &self.query
    }

    fn request(&self) -> &ParameterBag {
        &self.request
    }

    fn files(&self) -> &FileBag {
        &self.files
    }

    fn server_parameters(&self) -> &ServerBag {
        &self.server
    }

    fn client_ip(&self) -> Option<IpAddr> {
        self.client_ip
    }

    fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Collects the parts of a request; [RequestBuilder::build] validates and freezes them.
#[derive(Debug)]
pub struct RequestBuilder {
    method: CompactString,
    uri: CompactString,
    headers: HeaderBag,
    request: ParameterBag,
    files: FileBag,
    server: ServerBag,
    body: Bytes,
}

impl RequestBuilder {
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn headers(mut self, headers: HeaderBag) -> Self {
        self.headers = headers;
        self
    }

    pub fn request_parameter(
        mut self,
        name: impl Into<CompactString>,
        value: impl Into<CompactString>,
    ) -> Self {
        self.request.insert(name.into(), value.into());
        self
    }

    pub fn request_parameters(mut self, parameters: ParameterBag) -> Self {
        self.request = parameters;
        self
    }

    pub fn file(mut self, field: impl Into<CompactString>, file: UploadedFile) -> Self {
        self.files.insert(field.into(), file);
        self
    }

    pub fn files(mut self, files: FileBag) -> Self {
        self.files = files;
        self
    }

    pub fn server_parameter(
        mut self,
        key: impl Into<CompactString>,
        value: impl Into<CompactString>,
    ) -> Self {
        self.server.insert(key, value);
        self
    }

    pub fn remote_addr(self, addr: SocketAddr) -> Self {
        let ip = format_compact!("{}", addr.ip());
        let port = format_compact!("{}", addr.port());
        self.server_parameter(ServerKey::REMOTE_ADDR.as_str(), ip)
            .server_parameter(ServerKey::REMOTE_PORT.as_str(), port)
    }

    pub fn protocol(self, protocol: &str) -> Self {
        self.server_parameter(ServerKey::SERVER_PROTOCOL.as_str(), protocol)
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self, config: &RequestConfig) -> Result<Request, RequestError> {
        let Self {
            method,
            uri,
            headers,
            request,
            files,
            mut server,
            body,
        } = self;

        if uri.is_empty() || uri.contains(char::is_whitespace) {
            return Err(RequestError::InvalidUri);
        }

        let real_method = Method::parse(&method)?;
        let query_string = uri.split_once('?').map_or("", |(_, query)| query);
        let query = ParameterBag::from_urlencoded(query_string.as_bytes());

        let override_parameter = request
            .get_str(METHOD_PARAMETER)
            .or_else(|| query.get_str(METHOD_PARAMETER));
        let method = resolve_method(
            real_method,
            headers.get(Header::X_HTTP_METHOD_OVERRIDE),
            override_parameter,
            config.http_method_parameter_override,
        )?;

        server.insert_missing(ServerKey::REQUEST_METHOD, real_method.as_str());
        server.insert_missing(ServerKey::REQUEST_URI, uri.as_str());
        server.insert_missing(ServerKey::QUERY_STRING, query_string);
        server.insert_missing(ServerKey::SERVER_PROTOCOL, "HTTP/1.1");
        server.insert_missing(
            ServerKey::REQUEST_TIME,
            format_compact!("{}", OffsetDateTime::now_utc().unix_timestamp()),
        );
        if let Some(name) = headers.get(Header::HOST).map(server_name) {
            server.insert_missing(ServerKey::SERVER_NAME, name);
        }

        let client_ip = resolve_client_ip(server.remote_addr(), &headers, config);
        trace!("built {method} {uri} request with {} headers", headers.len());

        Ok(Request {
            method,
            real_method,
            request_uri: uri,
            headers,
            query,
            request,
            files,
            server,
            body,
            client_ip,
        })
    }
}

/// Host header without its port.
fn server_name(host: &str) -> &str {
    if host.starts_with('[') {
        return host.find(']').map_or(host, |idx| &host[..=idx]);
    }
    host.split_once(':').map_or(host, |(name, _)| name)
}
