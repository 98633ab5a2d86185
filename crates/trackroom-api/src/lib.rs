//! Trackroom API
//!
//! Axum service exposing the preview pipeline's trigger receiver, the maintenance
//! re-trigger scan and health probes.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
