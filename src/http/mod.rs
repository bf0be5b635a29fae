pub mod client;
pub mod proxy;
pub mod rate_limiter;

pub use client::{FetchClient, FetchResponse};
pub use proxy::ContentShape;
