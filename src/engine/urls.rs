// src/engine/urls.rs
//
// Preview/download handles for encoded blobs.
//
// Every handle is owned by exactly one holder. Revoking happens once, either
// explicitly or when the handle is dropped, so a superseded preview can
// never leak.

use crate::ops::OutputFormat;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

const URL_PREFIX: &str = "blob:pixpress/";

#[derive(Clone, Debug)]
pub struct BlobEntry {
    pub data: Arc<Vec<u8>>,
    pub format: Option<OutputFormat>,
}

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    live: Mutex<HashMap<String, BlobEntry>>,
}

/// Live set of object URLs. Cheap to clone; clones share the set.
#[derive(Clone, Default)]
pub struct ObjectUrlRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for ObjectUrlRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectUrlRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, data: impl Into<Arc<Vec<u8>>>, format: Option<OutputFormat>) -> ObjectUrl {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("{URL_PREFIX}{id}");
        self.inner.live.lock().insert(
            url.clone(),
            BlobEntry {
                data: data.into(),
                format,
            },
        );
        trace!(%url, "object url created");
        ObjectUrl {
            url,
            registry: self.clone(),
            revoked: false,
        }
    }

    pub fn resolve(&self, url: &str) -> Option<BlobEntry> {
        self.inner.live.lock().get(url).cloned()
    }

    pub fn is_live(&self, url: &str) -> bool {
        self.inner.live.lock().contains_key(url)
    }

    pub fn live_count(&self) -> usize {
        self.inner.live.lock().len()
    }

    fn release(&self, url: &str) -> bool {
        let removed = self.inner.live.lock().remove(url).is_some();
        if removed {
            trace!(%url, "object url revoked");
        }
        removed
    }
}

/// An owned object URL. Not `Clone`: the owner revokes it.
#[derive(Debug)]
pub struct ObjectUrl {
    url: String,
    registry: ObjectUrlRegistry,
    revoked: bool,
}

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn data(&self) -> Option<Arc<Vec<u8>>> {
        self.registry.resolve(&self.url).map(|entry| entry.data)
    }

    pub fn revoke(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.revoked {
            self.revoked = true;
            self.registry.release(&self.url);
        }
    }
}

impl Drop for ObjectUrl {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}
