//! Rendered-fragment cache.
//!
//! Rendering a page walks its stream, its authors and categories, the menu,
//! and the footer. The output only changes when one of those inputs does,
//! so [`RenderCache`] keeps the last HTML per page and re-renders only when
//! the inputs differ.
//!
//! ## Cache keys
//!
//! The cache is **content-addressed**: an entry stores the SHA-256 of the
//! page node it was rendered from (serialized as JSON), a *site
//! fingerprint*, and the cache's *generation*. A lookup hits only when all
//! three still match, so an edit to the page misses even if nobody told the
//! cache about it.
//!
//! The fingerprint ([`site_fingerprint`]) covers what a page render reads
//! besides its own node: authors, categories, menus, social settings, the
//! media prefix, and the outline of every page (ids, parents, slugs, titles,
//! states). It is what keeps a manifest loaded from disk honest when the
//! site was edited by a process that never saw the cache.
//!
//! The generation covers what the page hash cannot see. Site-wide
//! [`ContentEvent`]s (menus, snippets, publishes, moves, deletes) bump it,
//! which invalidates every entry at once; a stream edit only drops the
//! edited page.
//!
//! ## Storage
//!
//! Entries live in memory behind a `Mutex`, so one cache can be shared as
//! an [`EventSink`] and used by renderers on other threads. [`RenderCache::save`]
//! and [`RenderCache::load`] persist the entries as a JSON manifest so the
//! CLI can reuse them across runs.

use crate::events::{ContentEvent, EventSink};
use crate::settings::SocialSettings;
use crate::snippets::SnippetStore;
use crate::tree::{PageNode, SiteTree};
use crate::types::PageId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Name of the cache manifest file.
const MANIFEST_FILENAME: &str = ".render-cache.json";

/// Version of the manifest format. Bump this to invalidate all existing
/// caches when the format or key computation changes.
const MANIFEST_VERSION: u32 = 2;

/// A cached rendering of one page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub content_hash: String,
    pub html: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    generation: u64,
    entries: BTreeMap<PageId, CacheEntry>,
}

#[derive(Debug, Default)]
struct Inner {
    generation: u64,
    entries: BTreeMap<PageId, CacheEntry>,
    stats: CacheStats,
}

#[derive(Debug, Default)]
pub struct RenderCache {
    inner: Mutex<Inner>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave an entry half-written.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load from `dir`. Returns an empty cache if the manifest is missing,
    /// corrupt, or from another format version.
    pub fn load(dir: &Path) -> Self {
        let content = match std::fs::read_to_string(dir.join(MANIFEST_FILENAME)) {
            Ok(c) => c,
            Err(_) => return Self::new(),
        };
        let manifest: Manifest = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(_) => return Self::new(),
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::new();
        }
        Self {
            inner: Mutex::new(Inner {
                generation: manifest.generation,
                entries: manifest.entries,
                stats: CacheStats::default(),
            }),
        }
    }

    pub fn save(&self, dir: &Path) -> io::Result<()> {
        let inner = self.lock();
        let manifest = Manifest {
            version: MANIFEST_VERSION,
            generation: inner.generation,
            entries: inner.entries.clone(),
        };
        let json = serde_json::to_string_pretty(&manifest)?;
        std::fs::write(dir.join(MANIFEST_FILENAME), json)
    }

    /// Return the cached HTML for `node`, or render, store, and return it.
    ///
    /// `context` is the [`site_fingerprint`] the render would see. A failed
    /// render is returned as is and leaves the cache untouched.
    pub fn get_or_render<E>(
        &self,
        node: &PageNode,
        context: &str,
        render: impl FnOnce() -> Result<String, E>,
    ) -> Result<String, E> {
        let mut inner = self.lock();
        let key = content_hash(node, context, inner.generation);
        if let Some(entry) = inner.entries.get(&node.id)
            && entry.content_hash == key
        {
            let html = entry.html.clone();
            inner.stats.hit();
            return Ok(html);
        }
        inner.stats.miss();
        // Rendering happens under the lock; renders are short and this keeps
        // two threads from rendering the same page twice.
        let html = render()?;
        inner.entries.insert(
            node.id,
            CacheEntry {
                content_hash: key,
                html: html.clone(),
            },
        );
        Ok(html)
    }

    pub fn contains(&self, page: PageId) -> bool {
        self.lock().entries.contains_key(&page)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Drop every entry and start a new generation.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.stats.invalidated += inner.entries.len() as u32;
        inner.entries.clear();
        inner.generation += 1;
    }

    /// Hit/miss counters since the cache was created or loaded.
    pub fn stats(&self) -> CacheStats {
        self.lock().stats.clone()
    }
}

impl EventSink for RenderCache {
    fn notify(&self, event: &ContentEvent) {
        if event.is_site_wide() {
            tracing::debug!(?event, "site-wide change, clearing render cache");
            self.clear();
            return;
        }
        let mut inner = self.lock();
        for page in event.pages() {
            if inner.entries.remove(&page).is_some() {
                inner.stats.invalidated += 1;
            }
        }
    }
}

/// SHA-256 of the node's JSON form, the site fingerprint, and the cache
/// generation, as hex.
pub fn content_hash(node: &PageNode, context: &str, generation: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(generation.to_le_bytes());
    hasher.update(b"\0");
    hasher.update(context.as_bytes());
    hasher.update(b"\0");
    match serde_json::to_vec(node) {
        Ok(bytes) => hasher.update(&bytes),
        // Unreachable for plain data; an unhashable node just never hits.
        Err(_) => hasher.update(node.id.0.to_le_bytes()),
    }
    format!("{:x}", hasher.finalize())
}

/// Hash of everything outside a page's own node that its render reads.
///
/// Subscribers are left out; they never reach a page.
pub fn site_fingerprint(
    tree: &SiteTree,
    snippets: &SnippetStore,
    settings: &SocialSettings,
    media_base: &str,
) -> Result<String, serde_json::Error> {
    let mut hasher = Sha256::new();
    hasher.update(media_base.as_bytes());
    for part in [
        serde_json::to_vec(&snippets.authors)?,
        serde_json::to_vec(&snippets.categories)?,
        serde_json::to_vec(&snippets.menus)?,
        serde_json::to_vec(settings)?,
    ] {
        hasher.update(b"\0");
        hasher.update(&part);
    }
    let outline: Vec<_> = tree
        .nodes()
        .into_iter()
        .map(|n| (n.id, n.parent, &n.slug, n.display_title(), n.state, n.restricted))
        .collect();
    hasher.update(b"\0");
    hasher.update(serde_json::to_vec(&outline)?);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Summary of cache performance.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
    pub invalidated: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} rendered ({} total)",
                self.hits,
                self.misses,
                self.total()
            )?;
        } else {
            write!(f, "{} rendered", self.misses)?;
        }
        if self.invalidated > 0 {
            write!(f, ", {} invalidated", self.invalidated)?;
        }
        Ok(())
    }
}
