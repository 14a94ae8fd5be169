//! Shared test utilities for the pagetree test suite.
//!
//! Provides a small but complete sample site, lookup helpers that panic
//! with a clear message on miss, and tree shape assertions.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = sample_site();
//! let blog = find_page(&site.tree, "blog");
//! assert_eq!(child_slugs(&site.tree, Some(blog.id))[0], "first-post");
//!
//! assert_tree_shape(&site.tree, &[
//!     ("home", &["blog", "about", "contact"]),
//! ]);
//! ```
//!
//! The sample site:
//!
//! ```text
//! home                      live, Home
//! ├── blog                  live, BlogListing
//! │   ├── first-post        live (2024-01-01), post, Ada, category `rust`
//! │   ├── second-post       live (2024-02-01), article, Grace
//! │   ├── video-post        live (2024-03-01), video, Grace
//! │   ├── draft-post        draft
//! │   └── private-post      live (2024-04-01), restricted
//! ├── about                 live, Flex
//! └── contact               live, Contact (your_email, message)
//! ```

use chrono::{DateTime, TimeZone, Utc};

use crate::blocks::{ContentBlock, TitleAndText};
use crate::config::{LimitsConfig, SiteConfig};
use crate::forms::{EmailSettings, FormField, FormFieldType};
use crate::ordering::Ordered;
use crate::pages::{
    ArticlePage, BlogListingPage, BlogPost, CarouselImage, ContactPage, FlexPage, HomePage,
    PagePayload, VideoPage,
};
use crate::settings::SocialSettings;
use crate::site::Site;
use crate::snippets::{Author, MenuItem, SnippetStore};
use crate::store::{MemoryStore, PageStore};
use crate::stream::Stream;
use crate::tree::{NewPage, PageNode, SiteTree};
use crate::types::{AuthorId, ImageRef, PageId};

// =========================================================================
// Fixture setup
// =========================================================================

pub struct SampleSite {
    pub tree: SiteTree,
    pub snippets: SnippetStore,
    pub settings: SocialSettings,
}

/// Midnight UTC on the first of `month`, 2024.
pub fn day(month: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, month, 1, 0, 0, 0).unwrap()
}

/// A post that passes publish validation.
pub fn complete_post(title: &str, authors: &[AuthorId]) -> BlogPost {
    BlogPost {
        custom_title: title.to_string(),
        blog_image: Some(ImageRef(10)),
        summary: format!("<p>About <b>{title}</b></p>"),
        content: Stream::from_blocks(vec![ContentBlock::TitleAndText(TitleAndText {
            title: "Intro".into(),
            text: "Some words.".into(),
        })]),
        authors: authors.iter().copied().collect(),
        categories: Default::default(),
    }
}

pub fn sample_site() -> SampleSite {
    let limits = LimitsConfig::default();
    let mut snippets = SnippetStore::new();
    let ada = snippets
        .add_author(Author {
            website: Some("https://ada.example.com".into()),
            ..Author::named("Ada Lovelace")
        })
        .unwrap();
    let grace = snippets.add_author(Author::named("Grace Hopper")).unwrap();
    let rust = snippets.add_category("Rust", None).unwrap();
    snippets.add_category("News", None).unwrap();

    let mut tree = SiteTree::new();
    let home = tree
        .create_page(
            None,
            NewPage::new(
                "Home",
                PagePayload::Home(HomePage {
                    banner_title: "Welcome".into(),
                    banner_subtitle: "<b>Hello</b> there".into(),
                    banner_image: Some(ImageRef(1)),
                    sidenav_image: Some(ImageRef(2)),
                    banner_cta: None,
                    carousel_images: [CarouselImage { image: ImageRef(3) }].into_iter().collect(),
                }),
            ),
        )
        .unwrap();
    let blog = tree
        .create_page(
            Some(home),
            NewPage::new(
                "Blog",
                PagePayload::BlogListing(BlogListingPage {
                    custom_title: "The Blog".into(),
                }),
            ),
        )
        .unwrap();

    let mut first = complete_post("First Post", &[ada]);
    first.categories.insert(rust);
    let first = tree
        .create_page(Some(blog), NewPage::new("First Post", PagePayload::BlogDetail(first)))
        .unwrap();
    let second = tree
        .create_page(
            Some(blog),
            NewPage::new(
                "Second Post",
                PagePayload::Article(ArticlePage {
                    post: complete_post("Second Post", &[grace]),
                    subtitle: "An article".into(),
                    intro_image: None,
                }),
            ),
        )
        .unwrap();
    let video = tree
        .create_page(
            Some(blog),
            NewPage::new(
                "Video Post",
                PagePayload::Video(VideoPage {
                    post: complete_post("Video Post", &[grace]),
                    youtube_video_id: "dQw4w9WgXcQ".into(),
                }),
            ),
        )
        .unwrap();
    tree.create_page(
        Some(blog),
        NewPage::new(
            "Draft Post",
            PagePayload::BlogDetail(complete_post("Draft Post", &[ada])),
        ),
    )
    .unwrap();
    let private = tree
        .create_page(
            Some(blog),
            NewPage::new(
                "Private Post",
                PagePayload::BlogDetail(complete_post("Private Post", &[ada])),
            )
            .restricted(),
        )
        .unwrap();

    let about = tree
        .create_page(
            Some(home),
            NewPage::new(
                "About",
                PagePayload::Flex(FlexPage {
                    subtitle: "Who we are".into(),
                    content: Stream::new(),
                }),
            ),
        )
        .unwrap();
    let contact = tree
        .create_page(
            Some(home),
            NewPage::new(
                "Contact",
                PagePayload::Contact(ContactPage {
                    intro: "<p>Write to us</p>".into(),
                    thank_you_text: "<p>Thanks!</p>".into(),
                    form_fields: [
                        FormField::new("Your Email", FormFieldType::Email),
                        FormField::new("Message", FormFieldType::MultiLine),
                    ]
                    .into_iter()
                    .collect::<Ordered<_>>(),
                    email: EmailSettings {
                        from_address: "site@example.com".into(),
                        to_address: vec!["team@example.com".into()],
                        subject: "New message".into(),
                    },
                }),
            ),
        )
        .unwrap();

    for (page, month) in [
        (home, 1),
        (blog, 1),
        (first, 1),
        (second, 2),
        (video, 3),
        (private, 4),
        (about, 1),
        (contact, 1),
    ] {
        tree.publish_at(page, day(month), &limits)
            .unwrap_or_else(|e| panic!("sample page {page} failed to publish: {e}"));
    }

    let main = snippets.add_menu("Main", None);
    let menu = snippets.menus.get_mut(main).unwrap();
    menu.items.push(MenuItem::to_page(blog));
    menu.items
        .push(MenuItem::to_url("GitHub", "https://github.com/example"));

    let settings = SocialSettings {
        youtube: Some("https://youtube.com/@example".into()),
        ..SocialSettings::default()
    };

    SampleSite {
        tree,
        snippets,
        settings,
    }
}

/// The sample site behind a [`Site`] facade over a memory store.
pub fn sample_facade() -> Site<MemoryStore> {
    let sample = sample_site();
    let mut store = MemoryStore::new();
    store.save_subtree(&sample.tree.nodes()).unwrap();
    store.save_roots(sample.tree.roots()).unwrap();
    store.save_snippets(&sample.snippets).unwrap();
    store.save_settings(&sample.settings).unwrap();
    Site::open(store, SiteConfig::default()).unwrap()
}

// =========================================================================
// Tree lookups (panic with a clear message on miss)
// =========================================================================

/// Find a page by slug anywhere in the tree. Panics if not found.
pub fn find_page<'a>(tree: &'a SiteTree, slug: &str) -> &'a PageNode {
    tree.nodes()
        .into_iter()
        .find(|p| p.slug == slug)
        .unwrap_or_else(|| {
            let slugs: Vec<&str> = tree.nodes().iter().map(|p| p.slug.as_str()).collect();
            panic!("page '{slug}' not found. Available: {slugs:?}")
        })
}

/// Slugs of the children of `parent`, in order.
pub fn child_slugs(tree: &SiteTree, parent: Option<PageId>) -> Vec<&str> {
    tree.children(parent).map(|c| c.slug.as_str()).collect()
}

/// Assert the children of each named page.
///
/// Each entry is `(slug, child slugs)`. Use `&[]` for leaves.
pub fn assert_tree_shape(tree: &SiteTree, expected: &[(&str, &[&str])]) {
    for (slug, children) in expected {
        let page = find_page(tree, slug);
        assert_eq!(
            child_slugs(tree, Some(page.id)),
            children.to_vec(),
            "children of '{slug}' mismatch"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_site_shape() {
        let site = sample_site();
        assert_tree_shape(
            &site.tree,
            &[
                ("home", &["blog", "about", "contact"]),
                (
                    "blog",
                    &["first-post", "second-post", "video-post", "draft-post", "private-post"],
                ),
                ("about", &[]),
            ],
        );
        let video = find_page(&site.tree, "video-post").id;
        assert_eq!(site.tree.url_path(video).as_deref(), Some("/blog/video-post/"));
    }
}
