//! Domain Errors

use compact_str::CompactString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("invalid HTTP method `{0}`")]
    InvalidMethod(CompactString),
    #[error(transparent)]
    JsonParse(#[from] JsonParseError),
    #[error("malformed request: {0}")]
    Malformed(#[from] httparse::Error),
    #[error("incomplete request")]
    Incomplete,
    #[error("invalid chunked body")]
    InvalidChunk,
    #[error("invalid request target")]
    InvalidUri,
    #[error("invalid multipart body: {0}")]
    Multipart(&'static str),
    #[error("failed to store uploaded file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum JsonParseError {
    #[error("invalid JSON body: {0}")]
    Syntax(#[from] serde_json::Error),
    #[error("JSON body exceeds the maximum nesting depth of {limit}")]
    DepthExceeded { limit: u32 },
    #[error("JSON body is neither an object nor an array")]
    NotAContainer,
    #[error("JSON nesting depth must be greater than zero")]
    ZeroDepth,
}
