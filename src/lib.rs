//! Neuronova Throttle - per-client request throttling
//!
//! This crate implements the request throttle that fronts the Neuronova web
//! service. Each client is counted in fixed windows; requests over quota are
//! answered with HTTP 429, and every response carries `X-RateLimit-*` headers
//! describing the client's remaining quota.

pub mod config;
pub mod error;
pub mod http;
pub mod throttle;
