#![forbid(unsafe_code)]
//! edgeprop-core library.
//!
//! Graph topology, typed per-edge attributes, instance files and run
//! configuration shared by the diffusion engine and the `ep` binary.
//!
//! # Conventions
//!
//! - **Errors**: module errors derive `thiserror::Error` and roll up into
//!   [`Error`], which carries a stable [`ErrorCode`].
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod attrs;
pub mod codec;
pub mod config;
pub mod error;
pub mod graph;
pub mod instance;
pub mod timing;

pub use attrs::{AttributeColumn, EdgeAttribute, EdgeAttributes, StateLabel};
pub use config::{ConfigError, MAX_STATES, PropagationConfig};
pub use error::{Error, ErrorCode, IntegrityError, Result};
pub use graph::{EdgeId, GraphBuilder, GraphStore, Incident, NodeId};
pub use instance::Instance;
