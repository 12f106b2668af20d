//! Library crate for pairplay-back, exposing modules for binaries and integration tests.

pub mod config;
/// Storage entities and backends.
pub mod dao;
/// Request and response shapes of the HTTP API.
pub mod dto;
/// Error taxonomy shared by services and handlers.
pub mod error;
/// HTTP route trees.
pub mod routes;
/// Business operations behind the routes.
pub mod services;
/// Shared application state and pure domain rules.
pub mod state;
