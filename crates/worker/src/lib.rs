//! Insight pipeline for the measurement sink.
//!
//! - Accumulator (per-database trigger counting)
//! - Handoff (bounded queue feeding sync bookkeeping)
//! - Synthesizer (background model calls)
//! - Drain (wait for outstanding insight tasks)
//! - Scheduler (periodic metrics and health checks)

pub mod accumulator;
pub mod config;
pub mod drain;
pub mod handoff;
pub mod scheduler;
pub mod sink;
pub mod synthesizer;


pub use accumulator::{BatchAccumulator, TriggerPermit};
pub use config::InsightConfig;
pub use drain::{DrainGroup, DrainToken};
pub use handoff::{IngestionHandoff, SyncBookkeeper, SyncHandler, SyncWatermark};
pub use scheduler::*;
pub use sink::InsightSink;
pub use synthesizer::InsightSynthesizer;
