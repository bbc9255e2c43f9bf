//! HTTP front controller: one entry route, token-based dispatch.

pub mod app;
pub mod config;
pub mod middleware;
