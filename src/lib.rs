//! Cabsync: compare ride fares across Uber, Ola, Rapido and Namma Yatri.
//!
//! Offers are synthesized from per-brand rate cards, or for Namma Yatri
//! optionally fetched over the Beckn mobility network, then merged and
//! sorted cheapest first. Location search merges two geocoders with a static
//! gazetteer fallback.
//!
//! # Layout
//! - [`domain`]: pure types and algorithms (fares, ranking, gazetteer)
//! - [`infra`]: caches, geocoders, Beckn, providers, aggregation
//! - [`http`]: axum routes and the JSON error envelope
//! - [`app`]: state assembly, server start and graceful shutdown
//! - [`config`]: environment configuration
//!
//! # Running
//! ```sh
//! RUST_LOG=cabsync=debug PORT=8000 cargo run
//! ```
//!
//! Enable live Namma Yatri quotes:
//! ```sh
//! NAMMA_YATRI_ENABLED=true BAP_URI=https://my-host/api/beckn cargo run
//! ```

pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;
pub mod util;

pub use app::{serve, start_server, AppState, StartupError};
pub use config::Config;
