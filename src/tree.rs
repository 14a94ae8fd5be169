//! The site's page hierarchy.
//!
//! [`SiteTree`] owns every [`PageNode`] and the edges between them: a node
//! knows its parent and the ordered list of its children, and the tree keeps
//! the ordered list of top-level pages. Nodes never hold references to each
//! other, only [`PageId`]s, so moves and deletes are edits to id lists.
//!
//! ## Invariants
//!
//! - Slugs are unique among siblings (top-level pages count as siblings).
//! - At most one `home` page exists.
//! - Parent links and child lists agree, and the graph has no cycles.
//!
//! Every operation checks its preconditions before touching anything, so a
//! failed call leaves the tree exactly as it was.
//!
//! ## Lifecycle
//!
//! ```text
//! draft ──publish──▶ live ──unpublish──▶ unpublished
//!                     ▲                      │
//!                     └──────publish─────────┘
//! ```
//!
//! Publishing a live page republishes it and refreshes its timestamp. Any
//! page can be deleted; deletion removes the whole subtree.

use crate::blocks::{SchemaError, ValidationError};
use crate::config::LimitsConfig;
use crate::naming::{SlugProblem, check_slug, slugify};
use crate::ordering::{CardinalityError, OrderError};
use crate::pages::{PagePayload, PublishError};
use crate::stream::{StreamError, is_permutation};
use crate::types::{PageId, PageType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeError {
    #[error("Page {0} not found")]
    NotFound(PageId),
    #[error("Slug `{slug}` is already used {}", under(.parent))]
    SlugConflict {
        parent: Option<PageId>,
        slug: String,
    },
    #[error("Invalid slug `{slug}`: {problem}")]
    InvalidSlug { slug: String, problem: SlugProblem },
    #[error("Cannot move {page} under {new_parent}: it is the page itself or one of its descendants")]
    Cycle { page: PageId, new_parent: PageId },
    #[error("Only one {0} page may exist")]
    SingletonViolation(PageType),
    #[error("Cannot {action} {page}: page is {from}")]
    InvalidTransition {
        page: PageId,
        from: PageState,
        action: &'static str,
    },
    #[error("{page} is a {expected} page, got a {found} payload")]
    TypeMismatch {
        page: PageId,
        expected: PageType,
        found: PageType,
    },
    #[error("{0} has no content stream")]
    NoStream(PageId),
    #[error("Inconsistent tree: {0}")]
    Inconsistent(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Cardinality(#[from] CardinalityError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Stream(#[from] StreamError),
}

fn under(parent: &Option<PageId>) -> String {
    match parent {
        Some(p) => format!("under {p}"),
        None => "at the top level".to_string(),
    }
}

impl From<PublishError> for TreeError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::Schema(e) => TreeError::Schema(e),
            PublishError::Validation(e) => TreeError::Validation(e),
            PublishError::Cardinality(e) => TreeError::Cardinality(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    Draft,
    Live,
    Unpublished,
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PageState::Draft => "draft",
            PageState::Live => "live",
            PageState::Unpublished => "unpublished",
        })
    }
}

/// A page in the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageNode {
    pub id: PageId,
    pub title: String,
    pub slug: String,
    pub parent: Option<PageId>,
    #[serde(default)]
    pub children: Vec<PageId>,
    pub state: PageState,
    #[serde(default)]
    pub first_published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_published_at: Option<DateTime<Utc>>,
    /// Private pages are routable but excluded from public listings.
    #[serde(default)]
    pub restricted: bool,
    pub payload: PagePayload,
}

impl PageNode {
    pub fn page_type(&self) -> PageType {
        self.payload.page_type()
    }

    pub fn is_live(&self) -> bool {
        self.state == PageState::Live
    }

    /// Custom title when set, otherwise the page title.
    pub fn display_title(&self) -> &str {
        self.payload.custom_title().unwrap_or(&self.title)
    }
}

/// Input for [`SiteTree::create_page`].
#[derive(Debug, Clone)]
pub struct NewPage {
    pub title: String,
    /// Defaults to the slugified title.
    pub slug: Option<String>,
    pub restricted: bool,
    pub payload: PagePayload,
}

impl NewPage {
    pub fn new(title: impl Into<String>, payload: PagePayload) -> Self {
        Self {
            title: title.into(),
            slug: None,
            restricted: false,
            payload,
        }
    }

    pub fn of_type(title: impl Into<String>, page_type: PageType) -> Self {
        Self::new(title, PagePayload::empty(page_type))
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn restricted(mut self) -> Self {
        self.restricted = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteTree {
    nodes: BTreeMap<PageId, PageNode>,
    roots: Vec<PageId>,
    next_id: u64,
}

impl SiteTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a tree from stored nodes.
    ///
    /// Top-level order follows the input order. Parent links, child lists,
    /// sibling slugs, and the home singleton are all checked.
    pub fn from_nodes(nodes: Vec<PageNode>) -> Result<SiteTree, TreeError> {
        let mut tree = SiteTree::new();
        for node in nodes {
            if node.parent.is_none() {
                tree.roots.push(node.id);
            }
            tree.next_id = tree.next_id.max(node.id.0 + 1);
            if let Some(dup) = tree.nodes.insert(node.id, node) {
                return Err(TreeError::Inconsistent(format!("duplicate id {}", dup.id)));
            }
        }
        tree.check_consistency()?;
        Ok(tree)
    }

    fn check_consistency(&self) -> Result<(), TreeError> {
        let homes = self
            .nodes
            .values()
            .filter(|n| n.page_type() == PageType::Home)
            .count();
        if homes > 1 {
            return Err(TreeError::SingletonViolation(PageType::Home));
        }
        for node in self.nodes.values() {
            if let Some(parent) = node.parent {
                let listed = self
                    .nodes
                    .get(&parent)
                    .is_some_and(|p| p.children.contains(&node.id));
                if !listed {
                    return Err(TreeError::Inconsistent(format!(
                        "{} is not listed as a child of {parent}",
                        node.id
                    )));
                }
            }
            for child in &node.children {
                if self.nodes.get(child).and_then(|c| c.parent) != Some(node.id) {
                    return Err(TreeError::Inconsistent(format!(
                        "{} lists {child} as a child",
                        node.id
                    )));
                }
            }
            let siblings = self.sibling_ids(node.parent);
            let clashes = siblings
                .iter()
                .filter_map(|id| self.nodes.get(id))
                .filter(|n| n.slug == node.slug)
                .count();
            if clashes > 1 {
                return Err(TreeError::SlugConflict {
                    parent: node.parent,
                    slug: node.slug.clone(),
                });
            }
        }
        let reachable = self.walk().len();
        if reachable != self.nodes.len() {
            return Err(TreeError::Inconsistent(format!(
                "{} of {} pages are unreachable",
                self.nodes.len() - reachable,
                self.nodes.len()
            )));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: PageId) -> Option<&PageNode> {
        self.nodes.get(&id)
    }

    pub fn node(&self, id: PageId) -> Result<&PageNode, TreeError> {
        self.nodes.get(&id).ok_or(TreeError::NotFound(id))
    }

    fn node_mut(&mut self, id: PageId) -> Result<&mut PageNode, TreeError> {
        self.nodes.get_mut(&id).ok_or(TreeError::NotFound(id))
    }

    pub fn roots(&self) -> &[PageId] {
        &self.roots
    }

    /// Children of `parent` (or top-level pages for `None`), in order.
    pub fn children(&self, parent: Option<PageId>) -> impl Iterator<Item = &PageNode> {
        self.sibling_ids(parent)
            .iter()
            .filter_map(|id| self.nodes.get(id))
    }

    fn sibling_ids(&self, parent: Option<PageId>) -> &[PageId] {
        match parent {
            Some(p) => self
                .nodes
                .get(&p)
                .map(|n| n.children.as_slice())
                .unwrap_or_default(),
            None => &self.roots,
        }
    }

    pub fn find_child_by_slug(&self, parent: Option<PageId>, slug: &str) -> Option<&PageNode> {
        self.children(parent).find(|n| n.slug == slug)
    }

    pub fn home(&self) -> Option<&PageNode> {
        self.nodes
            .values()
            .find(|n| n.page_type() == PageType::Home)
    }

    /// Descendants of `id` in pre-order, excluding `id` itself.
    pub fn descendants(&self, id: PageId) -> Vec<PageId> {
        let mut out = Vec::new();
        let mut stack: Vec<PageId> = self
            .sibling_ids(Some(id))
            .iter()
            .rev()
            .copied()
            .collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.nodes.get(&next) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Every page in pre-order: each top-level page, then its subtree.
    pub fn walk(&self) -> Vec<PageId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for root in &self.roots {
            out.push(*root);
            out.extend(self.descendants(*root));
        }
        out
    }

    /// Ids from the top-level page down to `id`, inclusive.
    pub fn ancestry(&self, id: PageId) -> Vec<PageId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            if chain.contains(&c) {
                break;
            }
            chain.push(c);
            current = self.nodes.get(&c).and_then(|n| n.parent);
        }
        chain.reverse();
        chain
    }

    /// `candidate` is `of` or lies somewhere beneath it.
    pub fn is_within(&self, candidate: PageId, of: PageId) -> bool {
        self.ancestry(candidate).contains(&of)
    }

    /// Public path of a page, relative to the home page (`/blog/my-post/`).
    ///
    /// Pages outside the home page's subtree have no URL.
    pub fn url_path(&self, id: PageId) -> Option<String> {
        let home = self.home()?.id;
        let chain = self.ancestry(id);
        let home_pos = chain.iter().position(|p| *p == home)?;
        let mut path = String::from("/");
        for page in &chain[home_pos + 1..] {
            path.push_str(&self.nodes.get(page)?.slug);
            path.push('/');
        }
        Some(path)
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Add a draft page as the last child of `parent` (or at the top level).
    pub fn create_page(
        &mut self,
        parent: Option<PageId>,
        new: NewPage,
    ) -> Result<PageId, TreeError> {
        if let Some(p) = parent {
            self.node(p)?;
        }
        let page_type = new.payload.page_type();
        if page_type == PageType::Home && self.home().is_some() {
            return Err(TreeError::SingletonViolation(PageType::Home));
        }
        let slug = new.slug.unwrap_or_else(|| slugify(&new.title));
        self.check_free_slug(parent, &slug, None)?;

        let id = PageId(self.next_id.max(1));
        self.next_id = id.0 + 1;
        self.nodes.insert(
            id,
            PageNode {
                id,
                title: new.title,
                slug,
                parent,
                children: Vec::new(),
                state: PageState::Draft,
                first_published_at: None,
                last_published_at: None,
                restricted: new.restricted,
                payload: new.payload,
            },
        );
        self.siblings_mut(parent).push(id);
        Ok(id)
    }

    fn check_free_slug(
        &self,
        parent: Option<PageId>,
        slug: &str,
        except: Option<PageId>,
    ) -> Result<(), TreeError> {
        check_slug(slug).map_err(|problem| TreeError::InvalidSlug {
            slug: slug.to_string(),
            problem,
        })?;
        let taken = self
            .children(parent)
            .any(|n| n.slug == slug && Some(n.id) != except);
        if taken {
            return Err(TreeError::SlugConflict {
                parent,
                slug: slug.to_string(),
            });
        }
        Ok(())
    }

    fn siblings_mut(&mut self, parent: Option<PageId>) -> &mut Vec<PageId> {
        match parent.and_then(|p| self.nodes.get_mut(&p)) {
            Some(node) => &mut node.children,
            None => &mut self.roots,
        }
    }

    /// Change a page's title and slug. The slug must stay unique among its
    /// siblings.
    pub fn rename(&mut self, id: PageId, title: &str, slug: &str) -> Result<(), TreeError> {
        let parent = self.node(id)?.parent;
        self.check_free_slug(parent, slug, Some(id))?;
        let node = self.node_mut(id)?;
        node.title = title.to_string();
        node.slug = slug.to_string();
        Ok(())
    }

    /// Re-parent `id` as the last child of `new_parent`.
    pub fn move_page(&mut self, id: PageId, new_parent: Option<PageId>) -> Result<(), TreeError> {
        let node = self.node(id)?;
        let old_parent = node.parent;
        let slug = node.slug.clone();
        if let Some(target) = new_parent {
            self.node(target)?;
            if self.is_within(target, id) {
                return Err(TreeError::Cycle {
                    page: id,
                    new_parent: target,
                });
            }
        }
        if old_parent == new_parent {
            return Ok(());
        }
        self.check_free_slug(new_parent, &slug, Some(id))?;

        self.siblings_mut(old_parent).retain(|c| *c != id);
        self.siblings_mut(new_parent).push(id);
        self.node_mut(id)?.parent = new_parent;
        Ok(())
    }

    /// Reorder the children of `parent`; position `i` receives the child
    /// previously at `permutation[i]`.
    pub fn reorder_children(
        &mut self,
        parent: Option<PageId>,
        permutation: &[usize],
    ) -> Result<(), TreeError> {
        if let Some(p) = parent {
            self.node(p)?;
        }
        let current = self.sibling_ids(parent).to_vec();
        if !is_permutation(permutation, current.len()) {
            return Err(OrderError::InvalidPermutation {
                order: permutation.to_vec(),
                len: current.len(),
            }
            .into());
        }
        *self.siblings_mut(parent) = permutation.iter().map(|&i| current[i]).collect();
        Ok(())
    }

    /// Validate and publish a page, stamping it with `now`.
    pub fn publish_at(
        &mut self,
        id: PageId,
        now: DateTime<Utc>,
        limits: &LimitsConfig,
    ) -> Result<(), TreeError> {
        self.node(id)?.payload.validate_for_publish(limits)?;
        let node = self.node_mut(id)?;
        node.state = PageState::Live;
        node.first_published_at.get_or_insert(now);
        node.last_published_at = Some(now);
        Ok(())
    }

    pub fn publish(&mut self, id: PageId, limits: &LimitsConfig) -> Result<(), TreeError> {
        self.publish_at(id, Utc::now(), limits)
    }

    pub fn unpublish(&mut self, id: PageId) -> Result<(), TreeError> {
        let node = self.node_mut(id)?;
        if node.state != PageState::Live {
            return Err(TreeError::InvalidTransition {
                page: id,
                from: node.state,
                action: "unpublish",
            });
        }
        node.state = PageState::Unpublished;
        Ok(())
    }

    /// Remove `id` and its whole subtree. Returns the removed ids, `id` first.
    pub fn delete(&mut self, id: PageId) -> Result<Vec<PageId>, TreeError> {
        let parent = self.node(id)?.parent;
        let mut removed = vec![id];
        removed.extend(self.descendants(id));
        self.siblings_mut(parent).retain(|c| *c != id);
        for page in &removed {
            self.nodes.remove(page);
        }
        Ok(removed)
    }

    /// Replace a page's payload with one of the same type.
    pub fn replace_payload(&mut self, id: PageId, payload: PagePayload) -> Result<(), TreeError> {
        let node = self.node_mut(id)?;
        let expected = node.page_type();
        let found = payload.page_type();
        if expected != found {
            return Err(TreeError::TypeMismatch {
                page: id,
                expected,
                found,
            });
        }
        node.payload = payload;
        Ok(())
    }

    /// Mutable access to every payload, for snippet clean-up.
    pub fn payloads_mut(&mut self) -> impl Iterator<Item = (PageId, &mut PagePayload)> {
        self.nodes.values_mut().map(|n| (n.id, &mut n.payload))
    }

    pub fn payload_mut(&mut self, id: PageId) -> Result<&mut PagePayload, TreeError> {
        Ok(&mut self.node_mut(id)?.payload)
    }

    /// Pages whose payload links to any of `targets`.
    pub fn pages_linking_to(&self, targets: &BTreeSet<PageId>) -> Vec<PageId> {
        self.nodes
            .values()
            .filter(|n| n.payload.linked_pages().iter().any(|p| targets.contains(p)))
            .map(|n| n.id)
            .collect()
    }

    /// Nodes of the subtree rooted at `id`, in pre-order.
    pub fn subtree(&self, id: PageId) -> Result<Vec<&PageNode>, TreeError> {
        let mut ids = vec![id];
        ids.extend(self.descendants(id));
        ids.into_iter().map(|i| self.node(i)).collect()
    }

    /// All nodes in pre-order.
    pub fn nodes(&self) -> Vec<&PageNode> {
        self.walk()
            .into_iter()
            .filter_map(|id| self.nodes.get(&id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{ContentBlock, TitleAndText};
    use crate::pages::{BlogPost, PagePayload};
    use crate::stream::Stream;
    use crate::types::{AuthorId, ImageRef};
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap()
    }

    fn publishable_post() -> PagePayload {
        PagePayload::BlogDetail(BlogPost {
            custom_title: "Post".into(),
            blog_image: Some(ImageRef(1)),
            summary: "s".into(),
            content: Stream::from_blocks(vec![ContentBlock::TitleAndText(TitleAndText {
                title: "t".into(),
                text: "x".into(),
            })]),
            authors: [AuthorId(1)].into_iter().collect(),
            categories: Default::default(),
        })
    }

    /// home → blog → (first, second)
    fn sample() -> (SiteTree, PageId, PageId, PageId, PageId) {
        let mut tree = SiteTree::new();
        let home = tree
            .create_page(None, NewPage::of_type("Home", PageType::Home))
            .unwrap();
        let blog = tree
            .create_page(Some(home), NewPage::of_type("Blog", PageType::BlogListing))
            .unwrap();
        let first = tree
            .create_page(Some(blog), NewPage::new("First Post", publishable_post()))
            .unwrap();
        let second = tree
            .create_page(Some(blog), NewPage::new("Second Post", publishable_post()))
            .unwrap();
        (tree, home, blog, first, second)
    }

    #[test]
    fn create_derives_slug_and_starts_draft() {
        let (tree, _, _, first, _) = sample();
        let node = tree.node(first).unwrap();
        assert_eq!(node.slug, "first-post");
        assert_eq!(node.state, PageState::Draft);
    }

    #[test]
    fn sibling_slug_conflict() {
        let (mut tree, _, blog, _, _) = sample();
        let err = tree
            .create_page(Some(blog), NewPage::of_type("First Post", PageType::Article))
            .unwrap_err();
        assert!(matches!(err, TreeError::SlugConflict { slug, .. } if slug == "first-post"));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn same_slug_under_different_parents_is_fine() {
        let (mut tree, home, _, _, _) = sample();
        assert!(
            tree.create_page(Some(home), NewPage::of_type("First Post", PageType::Flex))
                .is_ok()
        );
    }

    #[test]
    fn empty_slug_is_rejected() {
        let mut tree = SiteTree::new();
        let err = tree
            .create_page(None, NewPage::of_type("!!!", PageType::Flex))
            .unwrap_err();
        assert!(matches!(
            err,
            TreeError::InvalidSlug {
                problem: SlugProblem::Empty,
                ..
            }
        ));
    }

    #[test]
    fn second_home_is_singleton_violation() {
        let (mut tree, _, blog, _, _) = sample();
        let err = tree
            .create_page(Some(blog), NewPage::of_type("Other Home", PageType::Home))
            .unwrap_err();
        assert!(matches!(err, TreeError::SingletonViolation(PageType::Home)));
    }

    #[test]
    fn home_can_be_deleted_and_recreated() {
        let (mut tree, home, ..) = sample();
        let removed = tree.delete(home).unwrap();
        assert_eq!(removed.len(), 4);
        assert!(tree.is_empty());
        assert!(
            tree.create_page(None, NewPage::of_type("Home", PageType::Home))
                .is_ok()
        );
    }

    #[test]
    fn move_under_descendant_is_cycle() {
        let (mut tree, home, _, first, _) = sample();
        let err = tree.move_page(home, Some(first)).unwrap_err();
        assert!(matches!(err, TreeError::Cycle { .. }));
        let err = tree.move_page(home, Some(home)).unwrap_err();
        assert!(matches!(err, TreeError::Cycle { .. }));
        assert_eq!(tree.node(home).unwrap().parent, None);
    }

    #[test]
    fn move_updates_both_child_lists() {
        let (mut tree, home, blog, first, second) = sample();
        tree.move_page(first, Some(home)).unwrap();
        assert_eq!(tree.node(blog).unwrap().children, vec![second]);
        assert_eq!(tree.node(home).unwrap().children, vec![blog, first]);
        assert_eq!(tree.node(first).unwrap().parent, Some(home));
    }

    #[test]
    fn move_checks_destination_slugs() {
        let (mut tree, home, blog, _, _) = sample();
        let clash = tree
            .create_page(Some(home), NewPage::of_type("Second Post", PageType::Flex))
            .unwrap();
        let err = tree.move_page(clash, Some(blog)).unwrap_err();
        assert!(matches!(err, TreeError::SlugConflict { .. }));
        assert_eq!(tree.node(clash).unwrap().parent, Some(home));
    }

    #[test]
    fn publish_records_timestamps() {
        let (mut tree, _, _, first, _) = sample();
        let limits = LimitsConfig::default();
        tree.publish_at(first, at(1), &limits).unwrap();
        tree.publish_at(first, at(5), &limits).unwrap();
        let node = tree.node(first).unwrap();
        assert_eq!(node.state, PageState::Live);
        assert_eq!(node.first_published_at, Some(at(1)));
        assert_eq!(node.last_published_at, Some(at(5)));
    }

    #[test]
    fn failed_publish_leaves_draft() {
        let (mut tree, _, blog, _, _) = sample();
        let err = tree
            .publish_at(blog, at(1), &LimitsConfig::default())
            .unwrap_err();
        assert!(matches!(err, TreeError::Validation(_)));
        assert_eq!(tree.node(blog).unwrap().state, PageState::Draft);
    }

    #[test]
    fn unpublish_only_from_live() {
        let (mut tree, _, _, first, _) = sample();
        assert!(matches!(
            tree.unpublish(first),
            Err(TreeError::InvalidTransition {
                from: PageState::Draft,
                ..
            })
        ));
        tree.publish_at(first, at(1), &LimitsConfig::default())
            .unwrap();
        tree.unpublish(first).unwrap();
        assert_eq!(tree.node(first).unwrap().state, PageState::Unpublished);
        tree.publish_at(first, at(2), &LimitsConfig::default())
            .unwrap();
        assert!(tree.node(first).unwrap().is_live());
    }

    #[test]
    fn delete_cascades_to_subtree() {
        let (mut tree, home, blog, first, second) = sample();
        let removed = tree.delete(blog).unwrap();
        assert_eq!(removed, vec![blog, first, second]);
        assert!(tree.node(home).unwrap().children.is_empty());
        assert!(matches!(tree.node(first), Err(TreeError::NotFound(_))));
    }

    #[test]
    fn reorder_children_applies_permutation() {
        let (mut tree, _, blog, first, second) = sample();
        tree.reorder_children(Some(blog), &[1, 0]).unwrap();
        assert_eq!(tree.node(blog).unwrap().children, vec![second, first]);
        assert!(matches!(
            tree.reorder_children(Some(blog), &[0, 0]),
            Err(TreeError::Order(_))
        ));
    }

    #[test]
    fn url_path_is_relative_to_home() {
        let (mut tree, home, blog, first, _) = sample();
        assert_eq!(tree.url_path(home).as_deref(), Some("/"));
        assert_eq!(tree.url_path(blog).as_deref(), Some("/blog/"));
        assert_eq!(tree.url_path(first).as_deref(), Some("/blog/first-post/"));
        let orphan = tree
            .create_page(None, NewPage::of_type("Orphan", PageType::Flex))
            .unwrap();
        assert_eq!(tree.url_path(orphan), None);
    }

    #[test]
    fn replace_payload_keeps_type() {
        let (mut tree, _, blog, _, _) = sample();
        let err = tree
            .replace_payload(blog, PagePayload::empty(PageType::Flex))
            .unwrap_err();
        assert!(matches!(
            err,
            TreeError::TypeMismatch {
                expected: PageType::BlogListing,
                found: PageType::Flex,
                ..
            }
        ));
    }

    #[test]
    fn from_nodes_round_trips_walk_order() {
        let (tree, ..) = sample();
        let nodes: Vec<PageNode> = tree.nodes().into_iter().cloned().collect();
        let rebuilt = SiteTree::from_nodes(nodes).unwrap();
        assert_eq!(rebuilt.walk(), tree.walk());
        assert_eq!(rebuilt, tree);
    }

    #[test]
    fn from_nodes_rejects_dangling_child() {
        let (tree, _, blog, ..) = sample();
        let nodes: Vec<PageNode> = tree
            .nodes()
            .into_iter()
            .filter(|n| n.id != blog)
            .cloned()
            .collect();
        assert!(matches!(
            SiteTree::from_nodes(nodes),
            Err(TreeError::Inconsistent(_))
        ));
    }

    #[test]
    fn new_ids_continue_after_loaded_ones() {
        let (tree, ..) = sample();
        let nodes: Vec<PageNode> = tree.nodes().into_iter().cloned().collect();
        let mut rebuilt = SiteTree::from_nodes(nodes).unwrap();
        let id = rebuilt
            .create_page(None, NewPage::of_type("Extra", PageType::Flex))
            .unwrap();
        assert_eq!(id, PageId(5));
    }
}
