//! HTTP server: routes, SSE streams, DTOs, configuration and OpenAPI documentation.

pub mod config;
pub mod dto;
pub mod error;
pub mod openapi;
pub mod routes;
pub mod sse;
pub mod state;
