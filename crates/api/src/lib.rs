//! HTTP API: router, cookie-based auth middleware and request/response mapping.

pub mod app;
pub mod context;
pub mod cookies;
pub mod middleware;
