//! Shared entities referenced by pages.
//!
//! Snippets live outside the page tree: deleting a page never deletes an
//! author, a category, or a menu. The reverse clean-up (dropping a deleted
//! author from every post) is done by the site facade, which owns both.

use crate::blocks::{
    FieldIssue, FieldKind, FieldProblem, FieldSpec, FieldValue, ValidationError, check_fields,
};
use crate::forms::looks_like_email;
use crate::naming::{SlugProblem, check_slug, slugify, unique_slug};
use crate::ordering::Ordered;
use crate::tree::SiteTree;
use crate::types::{AuthorId, CategoryId, ImageRef, MenuId, PageId, SubscriberId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnippetError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Slug `{0}` is already taken")]
    SlugConflict(String),
    #[error("Invalid slug `{slug}`: {problem}")]
    InvalidSlug {
        slug: String,
        problem: SlugProblem,
    },
    #[error("`{0}` is already subscribed")]
    AlreadySubscribed(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Id-keyed collection of one snippet kind, handing out increasing ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "K: Serialize + Ord, T: Serialize",
    deserialize = "K: Deserialize<'de> + Ord, T: Deserialize<'de>"
))]
pub struct SnippetSet<K, T> {
    #[serde(default)]
    items: BTreeMap<K, T>,
    #[serde(default)]
    next_id: u64,
}

impl<K, T> Default for SnippetSet<K, T> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
            next_id: 0,
        }
    }
}

impl<K, T> SnippetSet<K, T>
where
    K: Copy + Ord + From<u64> + Into<u64> + std::fmt::Display,
{
    pub fn insert(&mut self, item: T) -> K {
        let last: u64 = self.items.keys().next_back().map_or(0, |k| (*k).into());
        let raw = self.next_id.max(last + 1).max(1);
        self.next_id = raw + 1;
        let id = K::from(raw);
        self.items.insert(id, item);
        id
    }

    pub fn get(&self, id: K) -> Option<&T> {
        self.items.get(&id)
    }

    pub fn get_mut(&mut self, id: K) -> Result<&mut T, SnippetError> {
        self.items
            .get_mut(&id)
            .ok_or_else(|| SnippetError::NotFound(id.to_string()))
    }

    pub fn remove(&mut self, id: K) -> Result<T, SnippetError> {
        self.items
            .remove(&id)
            .ok_or_else(|| SnippetError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: K) -> bool {
        self.items.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.items.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// Snippet kinds
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
}

impl Author {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            website: None,
            image: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogCategory {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Menu {
    pub title: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu_image: Option<ImageRef>,
    #[serde(default)]
    pub items: Ordered<MenuItem>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MenuItem {
    pub link_title: Option<String>,
    pub link_url: Option<String>,
    pub link_page: Option<PageId>,
    pub open_in_new_tab: bool,
}

impl MenuItem {
    pub fn to_page(page: PageId) -> Self {
        Self {
            link_page: Some(page),
            ..Self::default()
        }
    }

    pub fn to_url(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            link_title: Some(title.into()),
            link_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Where the item points: the linked page's URL, else the raw URL,
    /// else `#`.
    pub fn link(&self, tree: &SiteTree) -> String {
        self.link_page
            .and_then(|p| tree.url_path(p))
            .or_else(|| self.link_url.clone().filter(|u| !u.is_empty()))
            .unwrap_or_else(|| "#".to_string())
    }

    /// Label of the item: its own title, else the linked page's title,
    /// else `Missing Title`.
    pub fn title(&self, tree: &SiteTree) -> String {
        if let Some(title) = self.link_title.as_deref().filter(|t| !t.is_empty()) {
            return title.to_string();
        }
        self.link_page
            .and_then(|p| tree.get(p))
            .map(|page| page.title.clone())
            .unwrap_or_else(|| "Missing Title".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl Subscriber {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let specs = [
            FieldSpec::new("email", FieldKind::Char { max_length: 100 }),
            FieldSpec::new("first_name", FieldKind::Char { max_length: 100 }),
            FieldSpec::new("last_name", FieldKind::Char { max_length: 100 }),
        ];
        let values = [
            ("email", FieldValue::text(&self.email)),
            ("first_name", FieldValue::text(&self.first_name)),
            ("last_name", FieldValue::text(&self.last_name)),
        ];
        let mut issues = Vec::new();
        check_fields(&specs, &values, "", &mut issues);
        let email_reported = issues.iter().any(|i| i.field == "email");
        if !email_reported && !looks_like_email(self.email.trim()) {
            issues.push(FieldIssue::new(
                "email",
                FieldProblem::Invalid("enter a valid email address".into()),
            ));
        }
        ValidationError::check(issues)
    }
}

// ============================================================================
// Store
// ============================================================================

/// Every snippet the site knows about.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetStore {
    pub authors: SnippetSet<AuthorId, Author>,
    pub categories: SnippetSet<CategoryId, BlogCategory>,
    pub menus: SnippetSet<MenuId, Menu>,
    pub subscribers: SnippetSet<SubscriberId, Subscriber>,
}

impl SnippetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_author(&mut self, author: Author) -> Result<AuthorId, SnippetError> {
        if author.name.trim().is_empty() {
            return Err(ValidationError {
                issues: vec![FieldIssue::missing("name")],
            }
            .into());
        }
        Ok(self.authors.insert(author))
    }

    /// Add a category. An explicit slug must be free; a derived one is made
    /// unique.
    pub fn add_category(
        &mut self,
        name: &str,
        slug: Option<&str>,
    ) -> Result<CategoryId, SnippetError> {
        let slug = match slug {
            Some(explicit) => {
                check_slug(explicit).map_err(|problem| SnippetError::InvalidSlug {
                    slug: explicit.to_string(),
                    problem,
                })?;
                if self.category_by_slug(explicit).is_some() {
                    return Err(SnippetError::SlugConflict(explicit.to_string()));
                }
                explicit.to_string()
            }
            None => unique_slug(&slugify(name), |s| self.category_by_slug(s).is_some()),
        };
        Ok(self.categories.insert(BlogCategory {
            name: name.to_string(),
            slug,
        }))
    }

    pub fn category_by_slug(&self, slug: &str) -> Option<(CategoryId, &BlogCategory)> {
        self.categories.iter().find(|(_, c)| c.slug == slug)
    }

    /// Add an empty menu; its slug is derived from the title and made unique.
    pub fn add_menu(&mut self, title: &str, menu_image: Option<ImageRef>) -> MenuId {
        let slug = unique_slug(&slugify(title), |s| self.menu_by_slug(s).is_some());
        self.menus.insert(Menu {
            title: title.to_string(),
            slug,
            menu_image,
            items: Ordered::new(),
        })
    }

    pub fn menu_by_slug(&self, slug: &str) -> Option<(MenuId, &Menu)> {
        self.menus.iter().find(|(_, m)| m.slug == slug)
    }

    /// Record a newsletter subscription. Emails are matched case-insensitively.
    pub fn subscribe(
        &mut self,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<SubscriberId, SnippetError> {
        let subscriber = Subscriber {
            email: email.trim().to_string(),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
        };
        subscriber.validate()?;
        let taken = self
            .subscribers
            .iter()
            .any(|(_, s)| s.email.eq_ignore_ascii_case(&subscriber.email));
        if taken {
            return Err(SnippetError::AlreadySubscribed(subscriber.email));
        }
        Ok(self.subscribers.insert(subscriber))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NewPage;
    use crate::types::PageType;

    #[test]
    fn ids_increase_and_are_not_reused() {
        let mut store = SnippetStore::new();
        let a = store.add_author(Author::named("Ada")).unwrap();
        let b = store.add_author(Author::named("Bob")).unwrap();
        assert_eq!((a, b), (AuthorId(1), AuthorId(2)));
        store.authors.remove(b).unwrap();
        assert_eq!(store.add_author(Author::named("Cy")).unwrap(), AuthorId(3));
    }

    #[test]
    fn author_needs_a_name() {
        let mut store = SnippetStore::new();
        assert!(matches!(
            store.add_author(Author::named(" ")),
            Err(SnippetError::Validation(_))
        ));
    }

    #[test]
    fn derived_category_slugs_are_unique() {
        let mut store = SnippetStore::new();
        store.add_category("Rust Tips", None).unwrap();
        let second = store.add_category("Rust tips", None).unwrap();
        assert_eq!(store.categories.get(second).unwrap().slug, "rust-tips-2");
    }

    #[test]
    fn explicit_category_slug_conflict() {
        let mut store = SnippetStore::new();
        store.add_category("News", Some("news")).unwrap();
        assert_eq!(
            store.add_category("Other", Some("news")),
            Err(SnippetError::SlugConflict("news".into()))
        );
    }

    #[test]
    fn menu_slug_from_title() {
        let mut store = SnippetStore::new();
        let first = store.add_menu("Main Menu", None);
        let second = store.add_menu("Main Menu", None);
        assert_eq!(store.menus.get(first).unwrap().slug, "main-menu");
        assert_eq!(store.menus.get(second).unwrap().slug, "main-menu-2");
        assert_eq!(store.menu_by_slug("main-menu-2").map(|(id, _)| id), Some(second));
    }

    #[test]
    fn menu_item_fallbacks() {
        let mut tree = SiteTree::new();
        let home = tree
            .create_page(None, NewPage::of_type("Home", PageType::Home))
            .unwrap();
        let about = tree
            .create_page(Some(home), NewPage::of_type("About Us", PageType::Flex))
            .unwrap();

        let page_item = MenuItem::to_page(about);
        assert_eq!(page_item.link(&tree), "/about-us/");
        assert_eq!(page_item.title(&tree), "About Us");

        let url_item = MenuItem::to_url("Docs", "https://docs.example.com");
        assert_eq!(url_item.link(&tree), "https://docs.example.com");
        assert_eq!(url_item.title(&tree), "Docs");

        let empty = MenuItem::default();
        assert_eq!(empty.link(&tree), "#");
        assert_eq!(empty.title(&tree), "Missing Title");

        let titled_page = MenuItem {
            link_title: Some("Team".into()),
            ..MenuItem::to_page(about)
        };
        assert_eq!(titled_page.title(&tree), "Team");
    }

    #[test]
    fn subscribe_validates_and_dedupes() {
        let mut store = SnippetStore::new();
        let id = store.subscribe("ada@example.com", "Ada", "Lovelace").unwrap();
        assert_eq!(
            store.subscribers.get(id).unwrap().full_name(),
            "Ada Lovelace"
        );
        assert_eq!(
            store.subscribe("ADA@example.com", "A", "L"),
            Err(SnippetError::AlreadySubscribed("ADA@example.com".into()))
        );
        let Err(SnippetError::Validation(v)) = store.subscribe("nope", "", "x") else {
            panic!("expected validation error");
        };
        assert_eq!(v.fields(), vec!["first_name", "email"]);
    }

    #[test]
    fn store_serializes_with_numeric_keys() {
        let mut store = SnippetStore::new();
        store.add_author(Author::named("Ada")).unwrap();
        let json = serde_json::to_string(&store).unwrap();
        let back: SnippetStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, store);
    }
}
