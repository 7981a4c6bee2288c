//! Middleware for the HTTP host
//!
//! Provides request/response logging and external call tracing

pub mod logging;
