#![forbid(unsafe_code)]
//! edgeprop-diffuse library.
//!
//! Seeds per-edge state vectors, runs the fixed number of synchronous
//! diffusion rounds, extracts one discrete label per edge and hands the
//! labels to sinks.
//!
//! # Conventions
//!
//! - **Errors**: Library operations return [`edgeprop_core::Result`]; sinks
//!   return `anyhow::Result` because they wrap arbitrary collaborators.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//! - **Determinism**: all randomness comes from one injected RNG; a fixed
//!   seed reproduces a run bit for bit, sequential or parallel.

pub mod engine;
pub mod label;
pub mod pipeline;
pub mod seed;
pub mod sink;
pub mod state;

pub use engine::{DiffusionEngine, DiffusionOptions, DiffusionPhase, softmax_in_place};
pub use label::{EdgeLabels, argmax};
pub use pipeline::{Propagation, RunInputs, RunSummary, propagate, publish};
pub use seed::{SeedInitializer, SeedKind, SeedReport};
pub use sink::{
    LabeledEdge, LabeledGraph, MemorySink, OwnedLabeledEdge, ProjectionSink, ResultSink,
    StateAttributeSink,
};
pub use state::EdgeStates;
