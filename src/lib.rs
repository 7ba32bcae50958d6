//! Floorwatch - marketplace listing watcher and reconciliation engine.
//!
//! This crate tracks marketplace listings for an NFT game on a public
//! ledger: it polls the ledger event API, decodes marketplace events,
//! maintains a durable view of which listings are active, sold, or
//! cancelled, and computes deal signals against a cached floor price.
//! The upstream is eventually consistent and partially ordered with no
//! delivery guarantees, so a slower verification sweep re-derives
//! uncertain state to self-heal missed events.
//!
//! # Architecture
//!
//! - **[`domain`]** - identifiers, the decoded event union, and the
//!   listing lifecycle model
//! - **[`port`]** - trait seams: event source, price source, listing
//!   and checkpoint stores, buyer resolver
//! - **[`adapter`]** - reqwest clients for the ledger and price APIs,
//!   SQLite (Diesel) and in-memory stores
//! - **[`engine`]** - the reconciliation state machine, floor price
//!   cache, and buyer backfill
//! - **[`runtime`]** - the checkpointed poller and the verification
//!   sweep, sharing one backoff policy
//! - **[`config`]** - TOML configuration with validation
//! - **[`app`]** - wiring
//!
//! # Example
//!
//! ```no_run
//! use floorwatch::app::App;
//! use floorwatch::config::Config;
//!
//! # async fn run() -> floorwatch::error::Result<()> {
//! let config = Config::load("config.toml")?;
//! App::run(config).await
//! # }
//! ```

pub mod adapter;
pub mod app;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod port;
pub mod runtime;
