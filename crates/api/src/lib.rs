//! HTTP API: routing, sessions, access enforcement.

pub mod app;
pub mod context;
pub mod cookies;
pub mod middleware;
pub mod sessions;
