//! # Dispatcher
//!
//! In-process log distribution engine.
//!
//! Responsibilities:
//! - Cheap per-level enablement checks backed by a level cache
//! - Bounded intake queue with drop-or-block backpressure
//! - Single consumer fanning records out to every matching target
//! - Isolating panicking targets, never stalling producers
//! - Deterministic flush and shutdown under deadlines
//!
//! ```ignore
//! use std::sync::Arc;
//! use contracts::{EngineConfig, StdFilter};
//! use dispatcher::{Engine, TracingTarget};
//!
//! let engine = Engine::builder(EngineConfig::default()).build()?;
//! engine.register_target(Arc::new(TracingTarget::new("console", StdFilter::default())))?;
//!
//! let logger = engine.new_logger();
//! logger.info("service started");
//!
//! engine.shutdown()?;
//! ```

pub mod buffer_pool;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod level_cache;
mod lifecycle;
pub mod logger;
pub mod metrics;
pub mod targets;
#[cfg(test)]
mod test_support;
mod worker;

pub use buffer_pool::{BufferPool, PooledBuffer};
pub use contracts::{Field, Level, LevelStatus, LogRec, Record, StdFilter, Target};
pub use engine::{Engine, EngineBuilder};
pub use error::EngineError;
pub use hooks::Hooks;
pub use level_cache::{ArrayLevelCache, LevelCache, MapLevelCache};
pub use logger::Logger;
pub use metrics::{AtomicCollector, MetricsSnapshot};
pub use targets::{MemoryTarget, TracingTarget};
