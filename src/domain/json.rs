//! JSON body decoding with a bounded nesting depth.

use log::debug;
use serde::Deserialize;

use crate::domain::errors::{JsonParseError, RequestError};

pub const DEFAULT_JSON_DEPTH: u32 = 512;
/// Deepest nesting ever decoded, whatever [JsonBodyOptions::depth] asks for.
pub const MAX_JSON_DEPTH: u32 = 512;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct JsonBodyOptions {
    /// Deepest allowed container nesting; `[1]` has a depth of one.
    pub depth: u32,
    /// Fail on undecodable bodies instead of returning `None`.
    pub strict_errors: bool,
}

impl Default for JsonBodyOptions {
    fn default() -> Self {
        Self {
            depth: DEFAULT_JSON_DEPTH,
            strict_errors: true,
        }
    }
}

impl JsonBodyOptions {
    pub fn lenient() -> Self {
        Self {
            strict_errors: false,
            ..Self::default()
        }
    }
}

/// Decodes `body` into an object or array.
pub fn decode_json_body(
    body: &[u8],
    options: JsonBodyOptions,
) -> Result<Option<serde_json::Value>, RequestError> {
    if body.is_empty() {
        return Ok(None);
    }

    match decode_container(body, options.depth) {
        Ok(value) => Ok(Some(value)),
        Err(e) if !options.strict_errors => {
            debug!("ignoring undecodable JSON body: {e}");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn decode_container(body: &[u8], depth: u32) -> Result<serde_json::Value, JsonParseError> {
    if depth == 0 {
        return Err(JsonParseError::ZeroDepth);
    }
    let limit = depth.min(MAX_JSON_DEPTH);
    if max_nesting(body) > limit {
        return Err(JsonParseError::DepthExceeded { limit });
    }

    // nesting is bounded by MAX_JSON_DEPTH at this point
    let mut deserializer = serde_json::Deserializer::from_slice(body);
    deserializer.disable_recursion_limit();
    let value = serde_json::Value::deserialize(&mut deserializer)?;
    deserializer.end()?;

    match value {
        serde_json::Value::Object(_) | serde_json::Value::Array(_) => Ok(value),
        _ => Err(JsonParseError::NotAContainer),
    }
}

/// Deepest bracket nesting outside of string literals.
fn max_nesting(body: &[u8]) -> u32 {
    let mut current = 0u32;
    let mut max = 0u32;
    let mut in_string = false;
    let mut escaped = false;

    for &byte in body {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => {
                current += 1;
                max = max.max(current);
            }
            b']' | b'}' => current = current.saturating_sub(1),
            _ => {}
        }
    }

    max
}
