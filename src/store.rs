//! Page persistence.
//!
//! The core never touches the filesystem itself; it goes through a
//! [`PageStore`]. Two implementations ship with the crate:
//!
//! - [`MemoryStore`] keeps a [`SiteDocument`] in memory (tests, previews).
//! - [`JsonFileStore`] wraps a `MemoryStore` and writes the whole document
//!   to one pretty-printed JSON file after every change.
//!
//! A facade write hands the store one [`Changeset`]. The file store stages
//! it on a copy of its memory and only adopts the copy once the document is
//! on disk, so a failed write leaves both memory and file as they were.
//!
//! ## Document format
//!
//! ```json
//! {
//!   "roots": [1],
//!   "pages": [ { "id": 1, "title": "Home", "slug": "home", ... } ],
//!   "snippets": { "authors": {...}, "categories": {...}, ... },
//!   "settings": { "youtube": "https://..." }
//! }
//! ```
//!
//! Pages are written in tree pre-order. `roots` keeps the order of
//! top-level pages, which child lists cannot express.

use crate::settings::SocialSettings;
use crate::snippets::SnippetStore;
use crate::tree::{PageNode, SiteTree};
use crate::types::PageId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything a site persists.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteDocument {
    pub roots: Vec<PageId>,
    pub pages: Vec<PageNode>,
    pub snippets: SnippetStore,
    pub settings: SocialSettings,
}

/// Everything one write changes, applied as a unit.
///
/// Removals apply first, then page upserts, then the explicit root order.
#[derive(Debug, Default)]
pub struct Changeset<'a> {
    pub removed: &'a [PageId],
    pub pages: Vec<&'a PageNode>,
    pub roots: Option<&'a [PageId]>,
    pub snippets: Option<&'a SnippetStore>,
    pub settings: Option<&'a SocialSettings>,
}

impl<'a> Changeset<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The nodes `ids` as they stand in `tree`. Ids not in the tree are skipped.
    pub fn pages(mut self, tree: &'a SiteTree, ids: &[PageId]) -> Self {
        self.pages.extend(ids.iter().filter_map(|id| tree.get(*id)));
        self
    }

    pub fn nodes(mut self, nodes: &[&'a PageNode]) -> Self {
        self.pages.extend_from_slice(nodes);
        self
    }

    pub fn removed(mut self, ids: &'a [PageId]) -> Self {
        self.removed = ids;
        self
    }

    pub fn roots(mut self, roots: &'a [PageId]) -> Self {
        self.roots = Some(roots);
        self
    }

    pub fn snippets(mut self, snippets: &'a SnippetStore) -> Self {
        self.snippets = Some(snippets);
        self
    }

    pub fn settings(mut self, settings: &'a SocialSettings) -> Self {
        self.settings = Some(settings);
        self
    }
}

pub trait PageStore {
    fn load(&self, id: PageId) -> Result<Option<PageNode>, StoreError>;

    fn load_by_slug(
        &self,
        parent: Option<PageId>,
        slug: &str,
    ) -> Result<Option<PageNode>, StoreError>;

    /// Every page in pre-order, top-level pages in their stored order.
    fn load_all(&self) -> Result<Vec<PageNode>, StoreError>;

    fn load_snippets(&self) -> Result<SnippetStore, StoreError>;

    fn load_settings(&self) -> Result<SocialSettings, StoreError>;

    /// Apply every part of `changes`, or none of them.
    fn commit(&mut self, changes: &Changeset<'_>) -> Result<(), StoreError>;

    /// Insert or replace each node.
    fn save_subtree(&mut self, nodes: &[&PageNode]) -> Result<(), StoreError> {
        self.commit(&Changeset::new().nodes(nodes))
    }

    fn save_roots(&mut self, roots: &[PageId]) -> Result<(), StoreError> {
        self.commit(&Changeset::new().roots(roots))
    }

    fn remove(&mut self, ids: &[PageId]) -> Result<(), StoreError> {
        self.commit(&Changeset::new().removed(ids))
    }

    fn save_snippets(&mut self, snippets: &SnippetStore) -> Result<(), StoreError> {
        self.commit(&Changeset::new().snippets(snippets))
    }

    fn save_settings(&mut self, settings: &SocialSettings) -> Result<(), StoreError> {
        self.commit(&Changeset::new().settings(settings))
    }
}

// ============================================================================
// Memory store
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    roots: Vec<PageId>,
    pages: BTreeMap<PageId, PageNode>,
    snippets: SnippetStore,
    settings: SocialSettings,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(doc: SiteDocument) -> Self {
        Self {
            roots: doc.roots,
            pages: doc.pages.into_iter().map(|p| (p.id, p)).collect(),
            snippets: doc.snippets,
            settings: doc.settings,
        }
    }

    pub fn to_document(&self) -> SiteDocument {
        SiteDocument {
            roots: self.roots.clone(),
            pages: self.ordered_pages(),
            snippets: self.snippets.clone(),
            settings: self.settings.clone(),
        }
    }

    fn apply(&mut self, changes: &Changeset<'_>) {
        for id in changes.removed {
            self.pages.remove(id);
        }
        self.roots.retain(|r| !changes.removed.contains(r));
        for node in &changes.pages {
            if node.parent.is_none() && !self.roots.contains(&node.id) {
                self.roots.push(node.id);
            }
            self.pages.insert(node.id, (*node).clone());
        }
        if let Some(roots) = changes.roots {
            self.roots = roots.to_vec();
        }
        if let Some(snippets) = changes.snippets {
            self.snippets = snippets.clone();
        }
        if let Some(settings) = changes.settings {
            self.settings = settings.clone();
        }
    }

    /// Pre-order from the stored roots. Pages no root reaches come last,
    /// so loading them into a tree reports the inconsistency.
    fn ordered_pages(&self) -> Vec<PageNode> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::with_capacity(self.pages.len());
        let mut stack: Vec<PageId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.pages.get(&id) {
                stack.extend(node.children.iter().rev().copied());
                out.push(node.clone());
            }
        }
        out.extend(
            self.pages
                .values()
                .filter(|p| !seen.contains(&p.id))
                .cloned(),
        );
        out
    }
}

impl PageStore for MemoryStore {
    fn load(&self, id: PageId) -> Result<Option<PageNode>, StoreError> {
        Ok(self.pages.get(&id).cloned())
    }

    fn load_by_slug(
        &self,
        parent: Option<PageId>,
        slug: &str,
    ) -> Result<Option<PageNode>, StoreError> {
        Ok(self
            .pages
            .values()
            .find(|p| p.parent == parent && p.slug == slug)
            .cloned())
    }

    fn load_all(&self) -> Result<Vec<PageNode>, StoreError> {
        Ok(self.ordered_pages())
    }

    fn load_snippets(&self) -> Result<SnippetStore, StoreError> {
        Ok(self.snippets.clone())
    }

    fn load_settings(&self) -> Result<SocialSettings, StoreError> {
        Ok(self.settings.clone())
    }

    fn commit(&mut self, changes: &Changeset<'_>) -> Result<(), StoreError> {
        self.apply(changes);
        Ok(())
    }
}

// ============================================================================
// JSON file store
// ============================================================================

/// A [`MemoryStore`] mirrored to a JSON file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    memory: MemoryStore,
}

impl JsonFileStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let memory = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            let doc: SiteDocument = serde_json::from_str(&content)?;
            tracing::debug!(path = %path.display(), pages = doc.pages.len(), "loaded site document");
            MemoryStore::from_document(doc)
        } else {
            tracing::debug!(path = %path.display(), "no site document yet, starting empty");
            MemoryStore::new()
        };
        Ok(Self { path, memory })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write to a sibling temp file, then rename over the document.
    fn write(&self, doc: &SiteDocument) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&tmp, json).map_err(io_err)?;
        if let Err(source) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_err(source));
        }
        tracing::trace!(path = %self.path.display(), "site document written");
        Ok(())
    }
}

impl PageStore for JsonFileStore {
    fn load(&self, id: PageId) -> Result<Option<PageNode>, StoreError> {
        self.memory.load(id)
    }

    fn load_by_slug(
        &self,
        parent: Option<PageId>,
        slug: &str,
    ) -> Result<Option<PageNode>, StoreError> {
        self.memory.load_by_slug(parent, slug)
    }

    fn load_all(&self) -> Result<Vec<PageNode>, StoreError> {
        self.memory.load_all()
    }

    fn load_snippets(&self) -> Result<SnippetStore, StoreError> {
        self.memory.load_snippets()
    }

    fn load_settings(&self) -> Result<SocialSettings, StoreError> {
        self.memory.load_settings()
    }

    fn commit(&mut self, changes: &Changeset<'_>) -> Result<(), StoreError> {
        let mut staged = self.memory.clone();
        staged.apply(changes);
        self.write(&staged.to_document())?;
        self.memory = staged;
        Ok(())
    }
}
