//! Walker payout library crate.
//!
//! This crate exposes the payout resolver, the billing cycle generator
//! and the HTTP API as reusable modules.  External applications may
//! depend on the `walker_payout` crate and call into
//! `engine::resolve_payout` directly or embed the API via
//! `api::build_router`.

pub mod models;
pub mod error;
pub mod engine;
pub mod billing;
pub mod tds;
pub mod sheets;
pub mod config;
pub mod api;
