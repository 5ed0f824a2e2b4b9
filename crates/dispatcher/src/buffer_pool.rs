//! Reusable byte buffers for formatting work
//!
//! A buffer only goes back to the pool when its capacity is below the
//! configured ceiling, so one oversized entry cannot pin a large allocation.

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};

use bytes::BytesMut;

/// Upper bound on idle buffers kept by the pool
const MAX_IDLE_BUFFERS: usize = 64;

/// Pool of `BytesMut` buffers
#[derive(Debug)]
pub struct BufferPool {
    idle: Mutex<Vec<BytesMut>>,
    max_pooled: usize,
    disabled: bool,
}

impl BufferPool {
    pub fn new(max_pooled: usize, disabled: bool) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_pooled,
            disabled,
        }
    }

    /// Borrow an empty buffer, reusing an idle one when pooling is enabled
    pub fn borrow(&self) -> BytesMut {
        if self.disabled {
            return BytesMut::new();
        }
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default()
    }

    /// Return a buffer; dropped instead when over the ceiling or pooling is off
    pub fn release(&self, mut buf: BytesMut) {
        if self.disabled || buf.capacity() >= self.max_pooled {
            return;
        }
        buf.clear();
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < MAX_IDLE_BUFFERS {
            idle.push(buf);
        }
    }

    /// Borrow a buffer that returns itself to this pool on drop
    pub fn borrow_guard(&self) -> PooledBuffer<'_> {
        PooledBuffer {
            buf: Some(self.borrow()),
            pool: self,
        }
    }

    /// Number of idle buffers currently held
    pub fn pooled_count(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }
}

/// RAII guard over a borrowed buffer
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    buf: Option<BytesMut>,
    pool: &'a BufferPool,
}

impl PooledBuffer<'_> {
    /// Detach the buffer from the pool
    pub fn into_inner(mut self) -> BytesMut {
        self.buf.take().unwrap_or_default()
    }
}

impl Deref for PooledBuffer<'_> {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        // Only `into_inner` and `drop` take the buffer, both consume the guard
        self.buf.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut BytesMut {
        self.buf.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}
