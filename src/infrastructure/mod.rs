pub mod bags;
pub mod server_impl;
