//! Ephemeral display handles for rendering session images.
//!
//! A handle is acquired when an asset is created and released when the
//! [`DisplayLease`] owning it is dropped, so a superseded or reset asset
//! cannot leave its handle behind.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::codec::{encode, to_data_url};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DisplayHandle(u64);

impl DisplayHandle {
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "display:{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct DisplayEntry {
    pub bytes: Arc<[u8]>,
    pub media_type: String,
}

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: AtomicU64,
    entries: Mutex<BTreeMap<u64, DisplayEntry>>,
}

/// Session-local table of live display handles. Clones share the table.
#[derive(Debug, Clone, Default)]
pub struct DisplayRegistry {
    inner: Arc<RegistryInner>,
}

impl DisplayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, bytes: Arc<[u8]>, media_type: &str) -> DisplayLease {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries().insert(
            id,
            DisplayEntry {
                bytes,
                media_type: media_type.to_string(),
            },
        );
        DisplayLease {
            registry: self.clone(),
            handle: DisplayHandle(id),
        }
    }

    pub fn resolve(&self, handle: DisplayHandle) -> Option<DisplayEntry> {
        self.entries().get(&handle.0).cloned()
    }

    /// Inline `data:` URL for a live handle, for presentation layers that
    /// render images as text.
    pub fn data_url(&self, handle: DisplayHandle) -> Option<String> {
        self.resolve(handle)
            .map(|entry| to_data_url(&entry.media_type, &encode(&entry.bytes)))
    }

    pub fn live_count(&self) -> usize {
        self.entries().len()
    }

    fn release(&self, handle: DisplayHandle) -> bool {
        self.entries().remove(&handle.0).is_some()
    }

    // The table holds plain data, so a poisoned lock is still usable.
    fn entries(&self) -> MutexGuard<'_, BTreeMap<u64, DisplayEntry>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Exclusive ownership of one display handle; releases it on drop.
#[derive(Debug)]
pub struct DisplayLease {
    registry: DisplayRegistry,
    handle: DisplayHandle,
}

impl DisplayLease {
    pub fn handle(&self) -> DisplayHandle {
        self.handle
    }
}

impl Drop for DisplayLease {
    fn drop(&mut self) {
        self.registry.release(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(raw: &[u8]) -> Arc<[u8]> {
        Arc::from(raw)
    }

    #[test]
    fn lease_resolves_until_dropped() {
        let registry = DisplayRegistry::new();
        let lease = registry.acquire(bytes(b"abc"), "image/png");
        let handle = lease.handle();

        let entry = registry.resolve(handle).expect("live handle");
        assert_eq!(&*entry.bytes, b"abc");
        assert_eq!(entry.media_type, "image/png");
        assert_eq!(registry.live_count(), 1);

        drop(lease);
        assert!(registry.resolve(handle).is_none());
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn handles_are_unique_and_released_independently() {
        let registry = DisplayRegistry::new();
        let first = registry.acquire(bytes(b"1"), "image/png");
        let second = registry.acquire(bytes(b"2"), "image/jpeg");
        assert_ne!(first.handle(), second.handle());

        drop(first);
        assert_eq!(registry.live_count(), 1);
        assert!(registry.resolve(second.handle()).is_some());
    }

    #[test]
    fn release_happens_exactly_once() {
        let registry = DisplayRegistry::new();
        let lease = registry.acquire(bytes(b"x"), "image/png");
        let handle = lease.handle();
        drop(lease);
        assert!(!registry.release(handle));
    }

    #[test]
    fn data_url_renders_inline_image() {
        let registry = DisplayRegistry::new();
        let lease = registry.acquire(bytes(b"abc"), "image/png");
        let handle = lease.handle();
        assert_eq!(
            registry.data_url(handle).as_deref(),
            Some("data:image/png;base64,YWJj")
        );
        assert_eq!(handle.to_string(), format!("display:{}", handle.id()));
        drop(lease);
        assert!(registry.data_url(handle).is_none());
    }
}
