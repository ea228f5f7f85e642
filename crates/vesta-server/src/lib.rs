//! Vesta Server - push endpoint for catalog change notifications
//!
//! This crate ties the sync pipeline from `vesta-core` to the HTTP clients from
//! `vesta-client` and exposes it over HTTP.

pub mod config;
pub mod server;

pub use config::Config;
pub use server::{create_app, run_server, state::AppState};
