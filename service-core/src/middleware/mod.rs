pub mod rate_limit;
pub mod request_meta;
pub mod security_headers;
