pub mod errors;
pub mod json;
pub mod method;
pub mod value;
