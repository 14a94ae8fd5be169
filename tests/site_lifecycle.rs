//! End-to-end lifecycle through the public API: build a site on a JSON
//! document, publish it, route and render URLs, and reopen it from disk.
//!
//! Run with: cargo test --test site_lifecycle

use chrono::{TimeZone, Utc};
use pagetree::blocks::{ContentBlock, TitleAndText};
use pagetree::cache::RenderCache;
use pagetree::config::SiteConfig;
use pagetree::events::{ContentEvent, EventSink};
use pagetree::forms::{EmailSettings, FormData, FormField, FormFieldType};
use pagetree::pages::{BlogListingPage, BlogPost, CarouselImage, ContactPage, HomePage, PagePayload};
use pagetree::routing::RouteResponse;
use pagetree::settings::SocialSettings;
use pagetree::site::{Site, SiteError};
use pagetree::store::StoreError;
use pagetree::snippets::{Author, MenuItem};
use pagetree::store::JsonFileStore;
use pagetree::stream::Stream;
use pagetree::tree::{NewPage, PageState, TreeError};
use pagetree::types::{AuthorId, ImageRef, PageId, PageType};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Default)]
struct Recorder(Mutex<Vec<ContentEvent>>);

impl EventSink for Recorder {
    fn notify(&self, event: &ContentEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

fn post(title: &str, author: AuthorId) -> PagePayload {
    PagePayload::BlogDetail(BlogPost {
        custom_title: title.to_string(),
        blog_image: Some(ImageRef(7)),
        summary: format!("<p>{title} summary</p>"),
        content: Stream::from_blocks(vec![ContentBlock::TitleAndText(TitleAndText {
            title: "Intro".into(),
            text: format!("Body of {title}"),
        })]),
        authors: [author].into_iter().collect(),
        categories: Default::default(),
    })
}

struct Built {
    home: PageId,
    blog: PageId,
    posts: Vec<PageId>,
    contact: PageId,
}

fn build(site: &mut Site<JsonFileStore>) -> Built {
    let ada = site.add_author(Author::named("Ada Lovelace")).unwrap();
    let home = site
        .create_page(
            None,
            NewPage::new(
                "Home",
                PagePayload::Home(HomePage {
                    banner_title: "Welcome".into(),
                    banner_subtitle: "Hello".into(),
                    banner_image: Some(ImageRef(1)),
                    sidenav_image: Some(ImageRef(2)),
                    banner_cta: None,
                    carousel_images: [CarouselImage { image: ImageRef(3) }].into_iter().collect(),
                }),
            ),
        )
        .unwrap();
    let blog = site
        .create_page(
            Some(home),
            NewPage::new(
                "Blog",
                PagePayload::BlogListing(BlogListingPage {
                    custom_title: "Journal".into(),
                }),
            ),
        )
        .unwrap();
    let mut posts = Vec::new();
    for i in 1..=7 {
        let title = format!("Post {i}");
        let id = site
            .create_page(Some(blog), NewPage::new(title.as_str(), post(&title, ada)))
            .unwrap();
        posts.push(id);
    }
    let contact = site
        .create_page(
            Some(home),
            NewPage::new(
                "Contact",
                PagePayload::Contact(ContactPage {
                    intro: "<p>Say hi</p>".into(),
                    thank_you_text: "<p>Thanks</p>".into(),
                    form_fields: [
                        FormField::new("Your Email", FormFieldType::Email),
                        FormField::new("Message", FormFieldType::MultiLine),
                    ]
                    .into_iter()
                    .collect(),
                    email: EmailSettings::default(),
                }),
            ),
        )
        .unwrap();

    site.publish_at(home, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .unwrap();
    site.publish_at(blog, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .unwrap();
    for (i, id) in posts.iter().enumerate() {
        let at = Utc.with_ymd_and_hms(2024, 2, 1 + i as u32, 0, 0, 0).unwrap();
        site.publish_at(*id, at).unwrap();
    }
    site.publish(contact).unwrap();

    let menu = site.add_menu("Main", None).unwrap();
    site.add_menu_item(menu, MenuItem::to_page(blog)).unwrap();

    Built {
        home,
        blog,
        posts,
        contact,
    }
}

fn open(path: &Path) -> Site<JsonFileStore> {
    Site::open(JsonFileStore::open(path).unwrap(), SiteConfig::default()).unwrap()
}

#[test]
fn build_publish_route_and_reopen() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("site.json");
    let mut site = open(&path);
    let recorder = Arc::new(Recorder::default());
    site.add_sink(recorder.clone());
    let built = build(&mut site);

    // Listing: 7 posts, 3 per page, ?page=10 clamps to the last page.
    let mut config = SiteConfig::default();
    config.listing.page_size = 3;
    drop(site);
    let site = Site::open(JsonFileStore::open(&path).unwrap(), config).unwrap();
    match site.resolve("/blog/", Some("10")).unwrap() {
        RouteResponse::Listing { page, window, .. } => {
            assert_eq!(page, built.blog);
            assert_eq!(window.number, 3);
            assert_eq!(window.num_pages, 3);
            assert!(window.clamped);
            // Newest first, so the last page holds the oldest post.
            assert_eq!(window.items, vec![built.posts[0]]);
        }
        other => panic!("expected a listing, got {other:?}"),
    }

    assert_eq!(
        site.resolve("/", None).unwrap(),
        RouteResponse::Page { page: built.home }
    );
    assert_eq!(
        site.get_page_by_path("/blog/post-3/").map(|p| p.id),
        Some(built.posts[2])
    );

    // The document on disk reproduces the same tree.
    let reopened = open(&path);
    assert_eq!(reopened.tree(), site.tree());
    assert_eq!(reopened.snippets().menus.len(), 1);

    let events = recorder.0.lock().unwrap();
    assert!(events.contains(&ContentEvent::Created { page: built.contact }));
    assert!(
        events
            .iter()
            .any(|e| matches!(e, ContentEvent::MenuChanged { .. }))
    );
}

#[test]
fn rendered_pages_come_from_cache_until_edited() {
    let tmp = TempDir::new().unwrap();
    let mut site = open(&tmp.path().join("site.json"));
    let built = build(&mut site);
    let cache = Arc::new(RenderCache::new());
    site.enable_cache(cache.clone());

    let first = site.render("/blog/post-1/", None).unwrap();
    let again = site.render("/blog/post-1/", None).unwrap();
    assert_eq!(first, again);
    assert!(first.contains("Body of Post 1"));
    assert_eq!(cache.stats().hits, 1);

    site.update_stream_json(
        built.posts[0],
        r#"[{"type": "simple_richtext", "value": "<p>rewritten</p>"}]"#,
    )
    .unwrap();
    let edited = site.render("/blog/post-1/", None).unwrap();
    assert!(edited.contains("rewritten"));
    assert_eq!(cache.stats().misses, 2);
}

#[test]
fn cache_saved_by_one_run_sees_edits_from_another() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("site.json");
    let cache_dir = tmp.path().join("cache");
    std::fs::create_dir(&cache_dir).unwrap();
    {
        let mut site = open(&path);
        build(&mut site);
        let cache = Arc::new(RenderCache::new());
        site.enable_cache(cache.clone());
        site.render("/blog/post-1/", None).unwrap();
        cache.save(&cache_dir).unwrap();
    }
    {
        // Edited without the cache attached: nothing invalidates the manifest.
        let mut site = open(&path);
        site.update_settings(SocialSettings {
            youtube: Some("https://youtube.com/@pagetree".into()),
            ..Default::default()
        })
        .unwrap();
    }
    let mut site = open(&path);
    let cache = Arc::new(RenderCache::load(&cache_dir));
    assert_eq!(cache.len(), 1);
    site.enable_cache(cache.clone());
    let html = site.render("/blog/post-1/", None).unwrap();
    assert!(html.contains("https://youtube.com/@pagetree"));
    assert_eq!(cache.stats().hits, 0);
    assert_eq!(cache.stats().misses, 1);
}

#[test]
fn failed_document_write_is_not_persisted_later() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("site.json");
    let mut site = open(&path);
    let built = build(&mut site);

    let blocker = path.with_extension("json.tmp");
    std::fs::create_dir(&blocker).unwrap();
    let err = site.rename(built.posts[0], "First", "first").unwrap_err();
    assert!(matches!(err, SiteError::Store(StoreError::Io { .. })));
    assert_eq!(site.tree().node(built.posts[0]).unwrap().slug, "post-1");

    std::fs::remove_dir(&blocker).unwrap();
    site.rename(built.contact, "Reach Us", "reach-us").unwrap();

    let reopened = open(&path);
    assert_eq!(reopened.tree(), site.tree());
    assert_eq!(reopened.tree().node(built.posts[0]).unwrap().slug, "post-1");
    assert!(reopened.get_page_by_path("/reach-us/").is_some());
}

#[test]
fn failed_edits_leave_site_and_document_untouched() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("site.json");
    let mut site = open(&path);
    let built = build(&mut site);
    let before = std::fs::read_to_string(&path).unwrap();

    let err = site.move_page(built.home, Some(built.blog)).unwrap_err();
    assert!(matches!(err, SiteError::Tree(TreeError::Cycle { .. })));

    let err = site
        .create_page(None, NewPage::of_type("Another Home", PageType::Home))
        .unwrap_err();
    assert!(matches!(err, SiteError::Tree(TreeError::SingletonViolation(_))));

    let err = site
        .update_stream_json(built.posts[1], r#"[{"type": "marquee", "value": "x"}]"#)
        .unwrap_err();
    assert!(matches!(err, SiteError::Stream(_)));

    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    assert_eq!(site.tree().node(built.home).unwrap().children.len(), 2);
}

#[test]
fn unpublished_pages_drop_out_of_routing() {
    let tmp = TempDir::new().unwrap();
    let mut site = open(&tmp.path().join("site.json"));
    let built = build(&mut site);

    site.unpublish(built.posts[6]).unwrap();
    assert_eq!(
        site.tree().node(built.posts[6]).unwrap().state,
        PageState::Unpublished
    );
    assert!(site.resolve("/blog/post-7/", None).is_err());
    assert!(site.get_page_by_path("/blog/post-7/").is_some());
    match site.resolve("/blog/latest/", None).unwrap() {
        RouteResponse::Latest { posts, .. } => {
            assert_eq!(posts, vec![built.posts[5], built.posts[4], built.posts[3]]);
        }
        other => panic!("expected latest posts, got {other:?}"),
    }
}

#[test]
fn contact_form_submission() {
    let tmp = TempDir::new().unwrap();
    let mut site = open(&tmp.path().join("site.json"));
    let built = build(&mut site);

    let mut data = FormData::new();
    data.insert("your_email".into(), vec!["grace@example.com".into()]);
    data.insert("message".into(), vec!["Hello!".into()]);
    let submission = site.submit_form(built.contact, &data).unwrap();
    assert_eq!(submission.data["your_email"], "grace@example.com");

    data.insert("your_email".into(), vec!["not-an-email".into()]);
    assert!(matches!(
        site.submit_form(built.contact, &data),
        Err(SiteError::Form(_))
    ));
    assert!(matches!(
        site.submit_form(built.blog, &data),
        Err(SiteError::NotAContactPage(_))
    ));
}
