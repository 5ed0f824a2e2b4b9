//! Load generation against the engine.

mod collector;
mod generator;
mod stats;

pub use generator::{LoadConfig, LoadGenerator};
