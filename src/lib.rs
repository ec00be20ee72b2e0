#![deny(
    missing_copy_implementations,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts
)]

pub mod domain;

pub mod application;
pub mod infrastructure;

pub use application::config::RequestConfig;
pub use application::RequestView;
pub use domain::errors::{JsonParseError, RequestError};
pub use domain::json::{JsonBodyOptions, MAX_JSON_DEPTH};
pub use domain::method::Method;
pub use domain::value::Value;
pub use infrastructure::server_impl::request::{Request, RequestBuilder};
pub use infrastructure::server_impl::server::parse_http;

pub type AnyResult<T> = eyre::Result<T>;
