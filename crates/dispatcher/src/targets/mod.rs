//! Target implementations
//!
//! Contains TracingTarget and MemoryTarget.

mod log;
mod memory;

pub use self::log::TracingTarget;
pub use self::memory::MemoryTarget;
