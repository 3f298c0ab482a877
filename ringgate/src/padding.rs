//! Cache-line padding to keep hot atomics off their neighbours' cache lines.

use std::ops::{Deref, DerefMut};

/// Wrapper type that forces 128-byte alignment to prevent prefetcher-induced
/// false sharing on Intel/AMD CPUs (which may pull in adjacent cache lines).
#[repr(align(128))]
pub struct CacheAligned<T> {
    value: T,
}

impl<T> CacheAligned<T> {
    pub const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for CacheAligned<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}
