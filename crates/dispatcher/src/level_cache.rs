//! Per-level enablement cache
//!
//! Two interchangeable implementations: a fixed array indexed by level id,
//! and a concurrent map for sparse ids or very high core counts. Entries are
//! never invalidated individually, any registry change clears the whole cache.

use std::sync::atomic::{AtomicU8, Ordering};

use contracts::{LevelCacheKind, LevelStatus, MAX_LEVEL_ID};
use dashmap::DashMap;

use crate::error::EngineError;

/// Level enablement cache contract
pub trait LevelCache: Send + Sync {
    /// Allocate storage; called once before the cache is shared
    fn setup(&mut self);

    /// Cached status, or `None` on a miss
    fn get(&self, level_id: u32) -> Option<LevelStatus>;

    fn put(&self, level_id: u32, status: LevelStatus) -> Result<(), EngineError>;

    fn clear(&self);
}

/// Build the cache selected by `kind`, already set up
pub fn new_level_cache(kind: LevelCacheKind) -> Box<dyn LevelCache> {
    let mut cache: Box<dyn LevelCache> = match kind {
        LevelCacheKind::Array => Box::new(ArrayLevelCache::default()),
        LevelCacheKind::Map => Box::new(MapLevelCache::default()),
    };
    cache.setup();
    cache
}

const SLOT_VALID: u8 = 0b001;
const SLOT_ENABLED: u8 = 0b010;
const SLOT_STACKTRACE: u8 = 0b100;

fn encode(status: LevelStatus) -> u8 {
    let mut slot = SLOT_VALID;
    if status.enabled {
        slot |= SLOT_ENABLED;
    }
    if status.stacktrace {
        slot |= SLOT_STACKTRACE;
    }
    slot
}

fn decode(slot: u8) -> Option<LevelStatus> {
    if slot & SLOT_VALID == 0 {
        return None;
    }
    Some(LevelStatus::new(
        slot & SLOT_ENABLED != 0,
        slot & SLOT_STACKTRACE != 0,
    ))
}

/// Lock-free array cache, one atomic slot per level id below [`MAX_LEVEL_ID`]
#[derive(Debug, Default)]
pub struct ArrayLevelCache {
    slots: Box<[AtomicU8]>,
}

impl LevelCache for ArrayLevelCache {
    fn setup(&mut self) {
        self.slots = (0..MAX_LEVEL_ID).map(|_| AtomicU8::new(0)).collect();
    }

    fn get(&self, level_id: u32) -> Option<LevelStatus> {
        let slot = self.slots.get(level_id as usize)?;
        decode(slot.load(Ordering::Acquire))
    }

    fn put(&self, level_id: u32, status: LevelStatus) -> Result<(), EngineError> {
        let slot = self
            .slots
            .get(level_id as usize)
            .ok_or(EngineError::LevelCache {
                level_id,
                capacity: self.slots.len() as u32,
            })?;
        slot.store(encode(status), Ordering::Release);
        Ok(())
    }

    fn clear(&self) {
        for slot in self.slots.iter() {
            slot.store(0, Ordering::Release);
        }
    }
}

/// Concurrent map cache, unbounded level id space
#[derive(Debug, Default)]
pub struct MapLevelCache {
    entries: DashMap<u32, LevelStatus>,
}

impl LevelCache for MapLevelCache {
    fn setup(&mut self) {
        self.entries.clear();
    }

    fn get(&self, level_id: u32) -> Option<LevelStatus> {
        self.entries.get(&level_id).map(|entry| *entry)
    }

    fn put(&self, level_id: u32, status: LevelStatus) -> Result<(), EngineError> {
        self.entries.insert(level_id, status);
        Ok(())
    }

    fn clear(&self) {
        self.entries.clear();
    }
}
