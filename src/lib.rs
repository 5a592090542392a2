//! # Meshmap - Topology sync client for meshmesh network controllers
//!
//! Meshmap drives the neighbor-discovery process of a meshmesh controller and
//! keeps a local, renderable picture of the mesh in step with it.
//!
//! ## Features
//!
//! - **Discovery control**: Start or refresh a discovery run, gated so that no command is sent while one is already in progress.
//! - **Periodic sync**: Status, node, link and neighbor inventories refreshed on a fixed cadence, with an extra link fetch whenever the node set changes.
//! - **Stale-response protection**: Per-kind request generations so an older reply never overwrites a newer one.
//! - **Graph projection**: String-keyed nodes and edges with fill colors and weight labels, ready for a graph renderer.
//! - **Typed decoding**: Controller records are validated once at the API boundary.
//! - **Async Design**: Built with Tokio; one task owns all mutable state.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use meshmap::api::HttpControllerApi;
//! use meshmap::config::Config;
//! use meshmap::sync::{start_sync, SyncConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let api = Arc::new(HttpControllerApi::new(&config.controller)?);
//!
//!     let sync = start_sync(SyncConfig::from(&config.sync), api);
//!     sync.settled().await?;
//!     println!("{} nodes", sync.current_graph().nodes.len());
//!
//!     sync.start_discovery().await?;
//!     sync.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`model`] - Controller records and node id formats
//! - [`api`] - Controller REST client and the [`api::ControllerApi`] seam
//! - [`discovery`] - Discovery state machine and command gate
//! - [`store`] - Topology store holding the latest inventories
//! - [`graph`] - Projection of inventories into a renderable graph
//! - [`sync`] - Scheduler tying polling, the store and discovery together
//! - [`config`] - Configuration management and validation
//! - [`metrics`] - Sync counters
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Sync Scheduler │ ← Tick loop, generations, discovery commands
//! └─────────────────┘
//!     │         │
//! ┌────────┐ ┌───────────┐
//! │ Store  │ │ Discovery │ ← State owned by the scheduler task
//! │ +Graph │ │ Controller│
//! └────────┘ └───────────┘
//!          │
//! ┌─────────────────┐
//! │ Controller API  │ ← REST client (or a scripted stand-in)
//! └─────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod logutil;
pub mod metrics;
pub mod model;
pub mod store;
pub mod sync;

pub use error::{ApiError, CommandRejected, DiscoveryError, SyncError};
pub use graph::{Graph, GraphEdge, GraphNode};
pub use sync::{start_sync, SyncConfig, SyncHandle};
