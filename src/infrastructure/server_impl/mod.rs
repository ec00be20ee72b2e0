pub mod multipart;
pub mod request;
pub mod server;
