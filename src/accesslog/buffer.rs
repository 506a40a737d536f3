//! Pooled line buffers.
//!
//! # Responsibilities
//! - Hand out pre-sized byte buffers for rendering access log lines
//! - Take buffers back once the logger has written them
//!
//! # Design Decisions
//! - RAII guard returns the buffer on drop, even on early returns
//! - Oversized buffers are dropped instead of pooled
//! - The pool is bounded; surplus buffers are freed

use std::fmt;
use std::mem;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Default capacity of a freshly allocated line buffer.
pub const ACCESS_LOG_LEN: usize = 1 << 8;

const DEFAULT_MAX_POOLED: usize = 1024;
const OVERSIZE_FACTOR: usize = 64;

/// A bounded pool of reusable byte buffers.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    capacity_hint: usize,
    max_pooled: usize,
}

impl BufferPool {
    pub fn new(capacity_hint: usize, max_pooled: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
            capacity_hint,
            max_pooled,
        }
    }

    /// Take a cleared buffer from the pool or allocate one.
    pub fn get(self: &Arc<Self>) -> PooledBuffer {
        let buf = self
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.capacity_hint));
        PooledBuffer {
            buf,
            pool: self.clone(),
        }
    }

    /// Number of idle buffers.
    pub fn idle(&self) -> usize {
        self.lock().len()
    }

    fn put(&self, mut buf: Vec<u8>) {
        if buf.capacity() > self.capacity_hint * OVERSIZE_FACTOR {
            return;
        }
        buf.clear();
        let mut buffers = self.lock();
        if buffers.len() < self.max_pooled {
            buffers.push(buf);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(ACCESS_LOG_LEN, DEFAULT_MAX_POOLED)
    }
}

/// A buffer borrowed from a [`BufferPool`].
pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: Arc<BufferPool>,
}

impl PooledBuffer {
    pub fn write_str(&mut self, s: &str) {
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;
    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.buf.len())
            .field("capacity", &self.buf.capacity())
            .finish()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.put(mem::take(&mut self.buf));
    }
}
