//! # Contracts
//!
//! Frozen interface contracts shared by every logfan crate.
//! Business crates only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Record model
//! - A [`LogRec`] is either a data record or a flush sentinel, never both
//! - Targets are consumed through the [`Target`] capability trait
//! - Metrics backends are consumed through [`MetricsCollector`]

mod engine_config;
mod error;
mod level;
mod metrics;
mod record;
mod target;

pub use engine_config::*;
pub use error::*;
pub use level::*;
pub use metrics::*;
pub use record::*;
pub use target::*;
