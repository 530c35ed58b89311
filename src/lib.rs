//! Ollamify - telemetry-driven request routing for Ollama nodes
//!
//! Each node fronts one or more local Ollama instances pinned to GPUs. For
//! every request the node decides whether to run it locally or hand it to a
//! friendly peer, using accelerator telemetry, in-flight load, model
//! residency, and measured peer latency.

pub mod api;
pub mod cache;
pub mod cli;
pub mod clock;
pub mod cluster;
pub mod config;
pub mod forward;
pub mod friendly;
pub mod inflight;
pub mod instances;
pub mod logging;
pub mod metrics;
pub mod routing;
pub mod telemetry;
