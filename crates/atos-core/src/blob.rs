//! In-process object URLs for downloadable report files.
//!
//! A file returned by the API is parked in a [`BlobRegistry`] and addressed by a
//! `blob:atos/<uuid>` URL. The URL stays valid while at least one [`ObjectUrl`]
//! handle is alive and is revoked when the last one drops.

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info};
use uuid::Uuid;

pub const OBJECT_URL_PREFIX: &str = "blob:atos/";

#[derive(Debug, Clone)]
pub struct Blob {
    pub bytes: Arc<[u8]>,
    pub mime_type: String,
    pub filename: String,
}

type BlobMap = Mutex<HashMap<String, Blob>>;

fn lock(map: &BlobMap) -> MutexGuard<'_, HashMap<String, Blob>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone, Default)]
pub struct BlobRegistry {
    blobs: Arc<BlobMap>,
}

impl BlobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `bytes` and hand out the handle that keeps them reachable.
    pub fn create_object_url(&self, bytes: Vec<u8>, mime_type: &str, filename: &str) -> ObjectUrl {
        let url = format!("{}{}", OBJECT_URL_PREFIX, Uuid::new_v4());
        let blob = Blob {
            bytes: bytes.into(),
            mime_type: mime_type.to_string(),
            filename: filename.to_string(),
        };
        debug!(%url, mime_type, filename, size = blob.bytes.len(), "object URL created");
        lock(&self.blobs).insert(url.clone(), blob);

        ObjectUrl {
            inner: Arc::new(UrlHandle {
                url,
                registry: Arc::downgrade(&self.blobs),
            }),
        }
    }

    pub fn get(&self, url: &str) -> Option<Blob> {
        lock(&self.blobs).get(url).cloned()
    }

    pub fn contains(&self, url: &str) -> bool {
        lock(&self.blobs).contains_key(url)
    }

    /// Number of URLs not yet revoked.
    pub fn live_count(&self) -> usize {
        lock(&self.blobs).len()
    }

    /// Revoke every URL, e.g. at session end. Outstanding handles become dangling.
    pub fn revoke_all(&self) {
        let mut blobs = lock(&self.blobs);
        if !blobs.is_empty() {
            debug!(count = blobs.len(), "revoking all object URLs");
        }
        blobs.clear();
    }

    /// Write the blob behind `url` into `dir`, returning the written path.
    pub fn save(&self, url: &ObjectUrl, dir: &Path) -> Result<PathBuf> {
        let blob = self
            .get(url.as_str())
            .ok_or_else(|| anyhow!("Object URL {} has been revoked", url))?;

        std::fs::create_dir_all(dir)?;
        let target = dir.join(safe_file_name(&blob.filename));
        std::fs::write(&target, &blob.bytes)?;
        info!(path = %target.display(), "report saved");
        Ok(target)
    }
}

/// Keep only the final path component of a server-supplied name.
fn safe_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "..")
        .unwrap_or("download")
        .to_string()
}

struct UrlHandle {
    url: String,
    registry: Weak<BlobMap>,
}

impl Drop for UrlHandle {
    fn drop(&mut self) {
        if let Some(blobs) = self.registry.upgrade() {
            if lock(&blobs).remove(&self.url).is_some() {
                debug!(url = %self.url, "object URL revoked");
            }
        }
    }
}

/// Shared handle to a registered blob; revokes its URL when the last clone drops.
#[derive(Clone)]
pub struct ObjectUrl {
    inner: Arc<UrlHandle>,
}

impl ObjectUrl {
    pub fn as_str(&self) -> &str {
        &self.inner.url
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ObjectUrl").field(&self.inner.url).finish()
    }
}

impl PartialEq for ObjectUrl {
    fn eq(&self, other: &Self) -> bool {
        self.inner.url == other.inner.url
    }
}
