//! Jam3a rate limiting guard
//!
//! Per-client fixed-window rate limiting for the Jam3a storefront API. The
//! limiter decides admission for each request, and the HTTP middleware
//! turns its decision into `X-RateLimit-*` headers or a 429 response.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
