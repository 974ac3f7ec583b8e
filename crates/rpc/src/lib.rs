//! Churn HTTP API
//!
//! Axum router exposing churn scoring, customer lookups, temporal projection,
//! history recording and service statistics. Handlers share one immutable
//! [`AppState`]; all mutable state lives in the customer store and history
//! files behind the storage traits.

pub mod server;

pub use server::{build_router, start_server, ApiError, AppState, ServicePaths, SharedState};
