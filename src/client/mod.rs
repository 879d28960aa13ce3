//! License server HTTP layer.

pub mod http;
