//! The site facade.
//!
//! [`Site`] owns the page tree, the snippets, and the social settings, and
//! is the only place that writes them. Every write follows the same steps:
//!
//! 1. apply the change to a copy,
//! 2. persist the affected records through the [`PageStore`] as one
//!    [`Changeset`],
//! 3. swap the copy in,
//! 4. notify every [`EventSink`].
//!
//! A failure at step 1 or 2 returns the error and leaves the site exactly as
//! it was; sinks only ever hear about changes that happened.
//!
//! Readers that need a stable view while the site keeps changing take a
//! [`Site::snapshot`]: an `Arc` of the tree as of that moment.

use crate::blocks::{BlockRegistry, SchemaError, ValidationError};
use crate::cache::{RenderCache, site_fingerprint};
use crate::config::SiteConfig;
use crate::events::{ContentEvent, EventSink};
use crate::forms::{FormData, FormError, FormSubmission, Mailer, process_submission};
use crate::media::PrefixMediaResolver;
use crate::ordering::OrderError;
use crate::pages::{PagePayload, PublishError};
use crate::render::{RenderError, Renderer};
use crate::richtext::{AllowListSanitizer, RichTextSanitizer};
use crate::routing::{RouteError, RouteResponse, RoutingTable};
use crate::settings::SocialSettings;
use crate::snippets::{Author, MenuItem, SnippetError, SnippetStore};
use crate::store::{Changeset, PageStore, StoreError};
use crate::stream::{Stream, StreamError};
use crate::tree::{NewPage, PageNode, SiteTree, TreeError};
use crate::types::{AuthorId, CategoryId, ImageRef, MenuId, PageId, PageType, SubscriberId};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Snippet(#[from] SnippetError),
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0} is not a contact page")]
    NotAContactPage(PageId),
    #[error("{0} is not live")]
    NotLive(PageId),
}

impl From<OrderError> for SiteError {
    fn from(err: OrderError) -> Self {
        SiteError::Tree(err.into())
    }
}

impl From<SchemaError> for SiteError {
    fn from(err: SchemaError) -> Self {
        SiteError::Stream(err.into())
    }
}

/// Problems found by [`Site::check`].
#[derive(Debug, Default)]
pub struct CheckReport {
    /// Live pages that would no longer pass publish validation.
    pub pages: Vec<(PageId, PublishError)>,
    /// `(page, target)` links to pages that no longer exist.
    pub broken_links: Vec<(PageId, PageId)>,
    pub settings: Option<ValidationError>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.pages.is_empty() && self.broken_links.is_empty() && self.settings.is_none()
    }
}

pub struct Site<S: PageStore> {
    tree: Arc<SiteTree>,
    snippets: SnippetStore,
    settings: SocialSettings,
    config: SiteConfig,
    store: S,
    routes: RoutingTable,
    media: PrefixMediaResolver,
    sanitizer: Arc<dyn RichTextSanitizer>,
    sinks: Vec<Arc<dyn EventSink>>,
    mailer: Option<Arc<dyn Mailer>>,
    cache: Option<Arc<RenderCache>>,
}

impl<S: PageStore> Site<S> {
    /// Load everything the store holds.
    pub fn open(store: S, config: SiteConfig) -> Result<Self, SiteError> {
        let tree = SiteTree::from_nodes(store.load_all()?)?;
        let snippets = store.load_snippets()?;
        let settings = store.load_settings()?;
        tracing::info!(
            pages = tree.len(),
            authors = snippets.authors.len(),
            menus = snippets.menus.len(),
            "site loaded"
        );
        Ok(Self {
            tree: Arc::new(tree),
            snippets,
            settings,
            media: PrefixMediaResolver::new(&config.media.base_url),
            config,
            store,
            routes: RoutingTable::standard(),
            sanitizer: Arc::new(AllowListSanitizer),
            sinks: Vec::new(),
            mailer: None,
            cache: None,
        })
    }

    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn set_mailer(&mut self, mailer: Arc<dyn Mailer>) {
        self.mailer = Some(mailer);
    }

    pub fn set_sanitizer(&mut self, sanitizer: Arc<dyn RichTextSanitizer>) {
        self.sanitizer = sanitizer;
    }

    /// Use `cache` for [`Site::render`] and register it as an event sink.
    pub fn enable_cache(&mut self, cache: Arc<RenderCache>) {
        self.sinks.push(cache.clone());
        self.cache = Some(cache);
    }

    pub fn routes_mut(&mut self) -> &mut RoutingTable {
        &mut self.routes
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // ========================================================================
    // Read API
    // ========================================================================

    pub fn tree(&self) -> &SiteTree {
        &self.tree
    }

    /// The tree as of now; later writes do not affect it.
    pub fn snapshot(&self) -> Arc<SiteTree> {
        Arc::clone(&self.tree)
    }

    pub fn snippets(&self) -> &SnippetStore {
        &self.snippets
    }

    pub fn settings(&self) -> &SocialSettings {
        &self.settings
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn get_page(&self, id: PageId) -> Option<&PageNode> {
        self.tree.get(id)
    }

    /// Walk slugs from the home page, in any state. Public lookups go
    /// through [`Site::resolve`], which only sees live pages.
    pub fn get_page_by_path(&self, path: &str) -> Option<&PageNode> {
        let mut page = self.tree.home()?;
        for part in path.split('/').filter(|s| !s.is_empty()) {
            page = self.tree.find_child_by_slug(Some(page.id), part)?;
        }
        Some(page)
    }

    /// Live children of `id`, in order.
    pub fn get_children_page(&self, id: PageId) -> Vec<&PageNode> {
        self.tree
            .children(Some(id))
            .filter(|c| c.is_live())
            .collect()
    }

    pub fn resolve(&self, path: &str, page_param: Option<&str>) -> Result<RouteResponse, RouteError> {
        self.routes.resolve(
            &self.tree,
            &self.snippets,
            &self.config.listing,
            path,
            page_param,
        )
    }

    pub fn renderer(&self) -> Renderer<'_> {
        Renderer {
            tree: &self.tree,
            snippets: &self.snippets,
            settings: &self.settings,
            media: &self.media,
            sanitizer: self.sanitizer.as_ref(),
        }
    }

    /// Resolve and render `path`. Plain page responses go through the render
    /// cache when one is enabled.
    pub fn render(&self, path: &str, page_param: Option<&str>) -> Result<String, SiteError> {
        let response = self.resolve(path, page_param)?;
        let renderer = self.renderer();
        match (&self.cache, &response) {
            (Some(cache), RouteResponse::Page { page }) => {
                let node = self.tree.node(*page)?;
                match site_fingerprint(
                    &self.tree,
                    &self.snippets,
                    &self.settings,
                    &self.config.media.base_url,
                ) {
                    Ok(context) => Ok(cache.get_or_render(node, &context, || {
                        renderer.render_response(&response)
                    })?),
                    Err(e) => {
                        tracing::warn!(error = %e, "cannot fingerprint site, rendering uncached");
                        Ok(renderer.render_response(&response)?)
                    }
                }
            }
            _ => Ok(renderer.render_response(&response)?),
        }
    }

    /// Re-run publish validation on every live page and look for dangling
    /// page links.
    pub fn check(&self) -> CheckReport {
        let mut report = CheckReport::default();
        for node in self.tree.nodes() {
            if node.is_live()
                && let Err(e) = node.payload.validate_for_publish(&self.config.limits)
            {
                report.pages.push((node.id, e));
            }
            for target in node.payload.linked_pages() {
                if self.tree.get(target).is_none() {
                    report.broken_links.push((node.id, target));
                }
            }
        }
        report.settings = self.settings.validate().err();
        report
    }

    // ========================================================================
    // Page writes
    // ========================================================================

    fn edit<T>(
        &self,
        edit: impl FnOnce(&mut SiteTree) -> Result<T, TreeError>,
    ) -> Result<(SiteTree, T), SiteError> {
        let mut next = SiteTree::clone(&self.tree);
        let out = edit(&mut next)?;
        Ok((next, out))
    }

    fn persist(&mut self, changes: Changeset<'_>) -> Result<(), SiteError> {
        self.store.commit(&changes)?;
        Ok(())
    }

    fn save_pages(&mut self, tree: &SiteTree, ids: &[PageId]) -> Result<(), SiteError> {
        self.persist(Changeset::new().pages(tree, ids))
    }

    fn install(&mut self, tree: SiteTree, event: ContentEvent) {
        self.tree = Arc::new(tree);
        self.emit(event);
    }

    fn emit(&self, event: ContentEvent) {
        tracing::debug!(?event, sinks = self.sinks.len(), "content changed");
        for sink in &self.sinks {
            sink.notify(&event);
        }
    }

    pub fn create_page(&mut self, parent: Option<PageId>, new: NewPage) -> Result<PageId, SiteError> {
        let (next, id) = self.edit(|t| t.create_page(parent, new))?;
        let mut dirty = vec![id];
        dirty.extend(parent);
        let mut changes = Changeset::new().pages(&next, &dirty);
        if parent.is_none() {
            changes = changes.roots(next.roots());
        }
        self.persist(changes)?;
        tracing::info!(page = %id, parent = ?parent, "page created");
        self.install(next, ContentEvent::Created { page: id });
        Ok(id)
    }

    /// Replace a page's body stream. Block tags are checked against the page
    /// type now; field contents are checked at publish.
    pub fn update_stream(&mut self, id: PageId, stream: Stream) -> Result<(), SiteError> {
        let page_type = self.tree.node(id)?.page_type();
        stream.check_tags(&BlockRegistry::for_page(page_type))?;
        let (next, ()) = self.edit(|t| {
            let slot = t.payload_mut(id)?.stream_mut().ok_or(TreeError::NoStream(id))?;
            *slot = stream;
            Ok(())
        })?;
        self.save_pages(&next, &[id])?;
        self.install(next, ContentEvent::StreamUpdated { page: id });
        Ok(())
    }

    /// [`Site::update_stream`] from the JSON wire format.
    pub fn update_stream_json(&mut self, id: PageId, json: &str) -> Result<(), SiteError> {
        let stream = Stream::deserialize(json)?;
        self.update_stream(id, stream)
    }

    pub fn update_payload(&mut self, id: PageId, payload: PagePayload) -> Result<(), SiteError> {
        if let Some(stream) = payload.stream() {
            stream.check_tags(&BlockRegistry::for_page(payload.page_type()))?;
        }
        let (next, ()) = self.edit(|t| t.replace_payload(id, payload))?;
        self.save_pages(&next, &[id])?;
        self.install(next, ContentEvent::StreamUpdated { page: id });
        Ok(())
    }

    pub fn rename(&mut self, id: PageId, title: &str, slug: &str) -> Result<(), SiteError> {
        let (next, ()) = self.edit(|t| t.rename(id, title, slug))?;
        self.save_pages(&next, &[id])?;
        let parent = next.node(id)?.parent;
        self.install(
            next,
            ContentEvent::Moved {
                page: id,
                from: parent,
                to: parent,
            },
        );
        Ok(())
    }

    pub fn reorder_children(
        &mut self,
        parent: Option<PageId>,
        permutation: &[usize],
    ) -> Result<(), SiteError> {
        let (next, ()) = self.edit(|t| t.reorder_children(parent, permutation))?;
        match parent {
            Some(p) => self.save_pages(&next, &[p])?,
            None => self.persist(Changeset::new().roots(next.roots()))?,
        }
        self.install(next, ContentEvent::Reordered { parent });
        Ok(())
    }

    /// Reorder a named ordered collection of a page's payload
    /// (`carousel_images`, `form_fields`, `authors`).
    pub fn reorder_collection(
        &mut self,
        id: PageId,
        collection: &str,
        permutation: &[usize],
    ) -> Result<(), SiteError> {
        let (next, ()) = self.edit(|t| {
            t.payload_mut(id)?
                .reorder_collection(collection, permutation)
                .map_err(TreeError::from)
        })?;
        self.save_pages(&next, &[id])?;
        self.install(next, ContentEvent::StreamUpdated { page: id });
        Ok(())
    }

    pub fn move_page(&mut self, id: PageId, new_parent: Option<PageId>) -> Result<(), SiteError> {
        let old_parent = self.tree.node(id)?.parent;
        let (next, ()) = self.edit(|t| t.move_page(id, new_parent))?;
        let mut dirty = vec![id];
        dirty.extend(old_parent);
        dirty.extend(new_parent);
        let mut changes = Changeset::new().pages(&next, &dirty);
        if old_parent.is_none() || new_parent.is_none() {
            changes = changes.roots(next.roots());
        }
        self.persist(changes)?;
        tracing::info!(page = %id, from = ?old_parent, to = ?new_parent, "page moved");
        self.install(
            next,
            ContentEvent::Moved {
                page: id,
                from: old_parent,
                to: new_parent,
            },
        );
        Ok(())
    }

    pub fn publish(&mut self, id: PageId) -> Result<(), SiteError> {
        self.publish_at(id, Utc::now())
    }

    pub fn publish_at(&mut self, id: PageId, now: DateTime<Utc>) -> Result<(), SiteError> {
        let limits = self.config.limits.clone();
        let (next, ()) = self.edit(|t| t.publish_at(id, now, &limits))?;
        self.save_pages(&next, &[id])?;
        tracing::info!(page = %id, "page published");
        self.install(next, ContentEvent::Published { page: id, at: now });
        Ok(())
    }

    pub fn unpublish(&mut self, id: PageId) -> Result<(), SiteError> {
        let (next, ()) = self.edit(|t| t.unpublish(id))?;
        self.save_pages(&next, &[id])?;
        tracing::info!(page = %id, "page unpublished");
        self.install(next, ContentEvent::Unpublished { page: id });
        Ok(())
    }

    /// Delete a page and its subtree. Links from surviving pages into the
    /// deleted subtree are logged; they render as if unset.
    pub fn delete(&mut self, id: PageId) -> Result<Vec<PageId>, SiteError> {
        let parent = self.tree.node(id)?.parent;
        let (next, removed) = self.edit(|t| t.delete(id))?;
        let gone: BTreeSet<PageId> = removed.iter().copied().collect();
        for page in next.pages_linking_to(&gone) {
            tracing::warn!(page = %page, deleted = %id, "page links into a deleted subtree");
        }
        let survivors: Vec<PageId> = parent.into_iter().collect();
        self.persist(
            Changeset::new()
                .removed(&removed)
                .pages(&next, &survivors)
                .roots(next.roots()),
        )?;
        tracing::info!(page = %id, removed = removed.len(), "page deleted");
        self.install(
            next,
            ContentEvent::Deleted {
                pages: removed.clone(),
            },
        );
        Ok(removed)
    }

    // ========================================================================
    // Forms
    // ========================================================================

    /// Clean a contact form submission and mail it to the page's recipients.
    pub fn submit_form(&self, id: PageId, data: &FormData) -> Result<FormSubmission, SiteError> {
        let node = self.tree.node(id)?;
        let PagePayload::Contact(contact) = &node.payload else {
            return Err(SiteError::NotAContactPage(id));
        };
        if !node.is_live() {
            return Err(SiteError::NotLive(id));
        }
        let submission = process_submission(id, &contact.form_fields, data, Utc::now())?;
        if let (Some(mailer), Some(message)) = (
            &self.mailer,
            contact.email.message(&contact.form_fields, &submission),
        ) {
            mailer.send(&message).map_err(FormError::from)?;
        }
        tracing::info!(page = %id, fields = submission.data.len(), "form submitted");
        Ok(submission)
    }

    // ========================================================================
    // Snippets and settings
    // ========================================================================

    fn commit_snippets(&mut self, snippets: SnippetStore, event: ContentEvent) -> Result<(), SiteError> {
        self.persist(Changeset::new().snippets(&snippets))?;
        self.snippets = snippets;
        self.emit(event);
        Ok(())
    }

    pub fn add_author(&mut self, author: Author) -> Result<AuthorId, SiteError> {
        let mut next = self.snippets.clone();
        let id = next.add_author(author)?;
        self.commit_snippets(next, ContentEvent::SnippetsChanged)?;
        Ok(id)
    }

    /// Delete an author and every author row that points at it.
    pub fn delete_author(&mut self, id: AuthorId) -> Result<(), SiteError> {
        let mut snippets = self.snippets.clone();
        snippets.authors.remove(id)?;
        let (tree, touched) = self.edit(|t| {
            let mut touched = Vec::new();
            for (page, payload) in t.payloads_mut() {
                if let Some(post) = payload.post_mut()
                    && post.authors.remove_where(|a| *a == id) > 0
                {
                    touched.push(page);
                }
            }
            Ok(touched)
        })?;
        self.persist(Changeset::new().pages(&tree, &touched).snippets(&snippets))?;
        self.snippets = snippets;
        tracing::info!(author = %id, posts = touched.len(), "author deleted");
        self.install(tree, ContentEvent::SnippetsChanged);
        Ok(())
    }

    pub fn add_category(&mut self, name: &str, slug: Option<&str>) -> Result<CategoryId, SiteError> {
        let mut next = self.snippets.clone();
        let id = next.add_category(name, slug)?;
        self.commit_snippets(next, ContentEvent::SnippetsChanged)?;
        Ok(id)
    }

    /// Delete a category and drop it from every post.
    pub fn delete_category(&mut self, id: CategoryId) -> Result<(), SiteError> {
        let mut snippets = self.snippets.clone();
        snippets.categories.remove(id)?;
        let (tree, touched) = self.edit(|t| {
            let mut touched = Vec::new();
            for (page, payload) in t.payloads_mut() {
                if let Some(post) = payload.post_mut()
                    && post.categories.remove(&id)
                {
                    touched.push(page);
                }
            }
            Ok(touched)
        })?;
        self.persist(Changeset::new().pages(&tree, &touched).snippets(&snippets))?;
        self.snippets = snippets;
        self.install(tree, ContentEvent::SnippetsChanged);
        Ok(())
    }

    /// Put `page` in `category`. The page must be a post.
    pub fn categorize(&mut self, page: PageId, category: CategoryId) -> Result<(), SiteError> {
        if !self.snippets.categories.contains(category) {
            return Err(SnippetError::NotFound(category.to_string()).into());
        }
        let (next, ()) = self.edit(|t| {
            let node = t.node(page)?;
            let found = node.page_type();
            let post = t.payload_mut(page)?.post_mut().ok_or(TreeError::TypeMismatch {
                page,
                expected: PageType::BlogDetail,
                found,
            })?;
            post.categories.insert(category);
            Ok(())
        })?;
        self.save_pages(&next, &[page])?;
        self.install(next, ContentEvent::StreamUpdated { page });
        Ok(())
    }

    pub fn add_menu(&mut self, title: &str, image: Option<ImageRef>) -> Result<MenuId, SiteError> {
        let mut next = self.snippets.clone();
        let id = next.add_menu(title, image);
        self.commit_snippets(next, ContentEvent::MenuChanged { menu: id })?;
        Ok(id)
    }

    pub fn add_menu_item(&mut self, menu: MenuId, item: MenuItem) -> Result<(), SiteError> {
        let mut next = self.snippets.clone();
        next.menus.get_mut(menu)?.items.push(item);
        self.commit_snippets(next, ContentEvent::MenuChanged { menu })
    }

    pub fn reorder_menu(&mut self, menu: MenuId, permutation: &[usize]) -> Result<(), SiteError> {
        let mut next = self.snippets.clone();
        next.menus.get_mut(menu)?.items.reorder(permutation)?;
        self.commit_snippets(next, ContentEvent::MenuChanged { menu })
    }

    pub fn delete_menu(&mut self, menu: MenuId) -> Result<(), SiteError> {
        let mut next = self.snippets.clone();
        next.menus.remove(menu)?;
        self.commit_snippets(next, ContentEvent::MenuChanged { menu })
    }

    pub fn subscribe(
        &mut self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<SubscriberId, SiteError> {
        let mut next = self.snippets.clone();
        let id = next.subscribe(email, first_name, last_name)?;
        self.persist(Changeset::new().snippets(&next))?;
        self.snippets = next;
        tracing::info!(subscriber = %id, "new subscriber");
        Ok(id)
    }

    pub fn update_settings(&mut self, settings: SocialSettings) -> Result<(), SiteError> {
        settings.validate()?;
        self.persist(Changeset::new().settings(&settings))?;
        self.settings = settings;
        self.emit(ContentEvent::SnippetsChanged);
        Ok(())
    }
}
