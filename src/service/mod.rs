pub mod http;
pub mod status;
