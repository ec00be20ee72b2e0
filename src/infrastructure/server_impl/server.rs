use std::borrow::Cow;
use std::net::SocketAddr;

use bytes::Bytes;
use compact_str::{format_compact, CompactString};
use httparse::{ParserConfig, Status};
use log::trace;
use memchr::memchr;

use crate::application::config::RequestConfig;
use crate::domain::errors::RequestError;
use crate::infrastructure::bags::{FileBag, Header, HeaderBag, ParameterBag};
use crate::infrastructure::server_impl::multipart;
use crate::infrastructure::server_impl::request::Request;

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const MAX_TRAILERS: usize = 8;

fn parse_body(body: &[u8]) -> Option<&[u8]> {
    if body.is_empty() || body.first() == Some(&b'\0') {
        return None;
    }

    let body_content = memchr(b'\0', body).map(|idx| &body[..idx]).unwrap_or(body);
    Some(body_content)
}

/// Body bytes following the head: de-framed when chunked, `Content-Length` when present,
/// otherwise up to the first NUL of a zero-filled read buffer.
fn request_body<'a>(rest: &'a [u8], headers: &HeaderBag) -> Result<Cow<'a, [u8]>, RequestError> {
    if is_chunked(headers) {
        return decode_chunked(rest).map(Cow::Owned);
    }

    let Some(raw) = headers.get(Header::CONTENT_LENGTH) else {
        return Ok(Cow::Borrowed(parse_body(rest).unwrap_or_default()));
    };

    let length = raw
        .trim()
        .parse::<usize>()
        .map_err(|_| RequestError::Malformed(httparse::Error::HeaderValue))?;
    rest.get(..length)
        .map(Cow::Borrowed)
        .ok_or(RequestError::Incomplete)
}

fn is_chunked(headers: &HeaderBag) -> bool {
    headers
        .get(Header::TRANSFER_ENCODING)
        .and_then(|c| c.rsplit(',').next())
        .is_some_and(|c| unicase::eq(c.trim(), "chunked"))
}

fn decode_chunked(mut rest: &[u8]) -> Result<Vec<u8>, RequestError> {
    let mut body = Vec::new();

    loop {
        let (offset, size) = match httparse::parse_chunk_size(rest) {
            Ok(Status::Complete(c)) => c,
            Ok(Status::Partial) => return Err(RequestError::Incomplete),
            Err(_) => return Err(RequestError::InvalidChunk),
        };
        rest = &rest[offset..];

        if size == 0 {
            let mut trailers = [httparse::EMPTY_HEADER; MAX_TRAILERS];
            return match httparse::parse_headers(rest, &mut trailers)? {
                Status::Complete(_) => Ok(body),
                Status::Partial => Err(RequestError::Incomplete),
            };
        }

        let size = usize::try_from(size).map_err(|_| RequestError::InvalidChunk)?;
        let chunk = rest.get(..size).ok_or(RequestError::Incomplete)?;
        body.extend_from_slice(chunk);

        rest = match &rest[size..] {
            [b'\r', b'\n', tail @ ..] => tail,
            [] | [b'\r'] => return Err(RequestError::Incomplete),
            _ => return Err(RequestError::InvalidChunk),
        };
    }
}

/// Form fields and uploads of urlencoded or multipart bodies.
fn decode_form(
    headers: &HeaderBag,
    body: &[u8],
) -> Result<(ParameterBag, FileBag), RequestError> {
    let content_type = headers.get(Header::CONTENT_TYPE).unwrap_or_default();

    if let Some(boundary) = multipart::boundary(content_type) {
        return multipart::parse_multipart(body, boundary);
    }

    let mime = content_type.split(';').next().unwrap_or_default().trim();
    if unicase::eq(mime, FORM_URLENCODED) {
        return Ok((ParameterBag::from_urlencoded(body), FileBag::default()));
    }

    Ok(Default::default())
}

/// Builds a [Request] from a raw HTTP/1.x request held in `request`.
pub fn parse_http(
    request: &[u8],
    remote: Option<SocketAddr>,
    config: &RequestConfig,
) -> Result<Request, RequestError> {
    let mut headers = vec![httparse::EMPTY_HEADER; config.max_headers];
    let mut req = httparse::Request::new(&mut headers);
    let offset = match ParserConfig::default().parse_request(&mut req, request)? {
        Status::Complete(idx) => idx,
        Status::Partial => return Err(RequestError::Incomplete),
    };

    let method = req.method.ok_or(RequestError::Incomplete)?;
    let resource = req.path.ok_or(RequestError::Incomplete)?;
    let protocol = format_compact!("HTTP/1.{}", req.version.unwrap_or(1));

    let headers = req
        .headers
        .iter()
        .map(|c| (c.name, String::from_utf8_lossy(c.value)))
        .collect::<HeaderBag>();

    let body = match request_body(&request[offset..], &headers)? {
        Cow::Borrowed(c) => Bytes::copy_from_slice(c),
        Cow::Owned(c) => Bytes::from(c),
    };
    let (fields, files) = decode_form(&headers, &body)?;
    trace!("parsed {method} {resource}, {} body bytes", body.len());

    let mut builder = Request::builder(method, resource)
        .protocol(&protocol)
        .headers(headers)
        .request_parameters(fields)
        .files(files)
        .body(body);
    if let Some(remote) = remote {
        builder = builder.remote_addr(remote);
    }

    builder.build(config)
}

impl Request {
    /// Adapts a request already parsed by the `http` stack.
    pub fn from_http(
        request: http::Request<Bytes>,
        remote: Option<SocketAddr>,
        config: &RequestConfig,
    ) -> Result<Self, RequestError> {
        let (parts, body) = request.into_parts();

        let uri = parts
            .uri
            .path_and_query()
            .map(|c| CompactString::from(c.as_str()))
            .unwrap_or_else(|| format_compact!("{}", parts.uri));
        let protocol = format_compact!("{:?}", parts.version);
        let headers = HeaderBag::from(&parts.headers);
        let (fields, files) = decode_form(&headers, &body)?;

        let mut builder = Request::builder(parts.method.as_str(), uri)
            .protocol(&protocol)
            .headers(headers)
            .request_parameters(fields)
            .files(files)
            .body(body);
        if let Some(remote) = remote {
            builder = builder.remote_addr(remote);
        }

        builder.build(config)
    }
}
