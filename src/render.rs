//! HTML rendering with maud.
//!
//! A [`Renderer`] borrows everything a template can reach (the tree for
//! page links, snippets for authors and menus, social settings for the
//! footer) plus the two external collaborators: the [`MediaResolver`] for
//! image URLs and the [`RichTextSanitizer`] for stored markup. Rich text is
//! always sanitized with the feature set of the field it came from before
//! it is embedded with `PreEscaped`.
//!
//! The templates are deliberately plain: semantic elements and one class
//! per component, so a site theme can style them without touching Rust.

use crate::blocks::{BlockSchema, ContentBlock};
use crate::forms::{FormField, FormFieldType};
use crate::media::{MediaResolver, specs};
use crate::pages::{BlogPost, PagePayload};
use crate::richtext::{FeatureSet, RichTextSanitizer};
use crate::routing::{PageWindow, RouteResponse};
use crate::settings::SocialSettings;
use crate::snippets::{Menu, SnippetStore};
use crate::stream::Stream;
use crate::tree::{PageNode, SiteTree};
use crate::types::{CategoryId, ImageRef, PageId};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Cannot render {0}: page not found")]
    MissingPage(PageId),
}

pub struct Renderer<'a> {
    pub tree: &'a SiteTree,
    pub snippets: &'a SnippetStore,
    pub settings: &'a SocialSettings,
    pub media: &'a dyn MediaResolver,
    pub sanitizer: &'a dyn RichTextSanitizer,
}

impl Renderer<'_> {
    /// Render a resolved route as a full HTML document.
    pub fn render_response(&self, response: &RouteResponse) -> Result<String, RenderError> {
        let markup = match response {
            RouteResponse::Page { page } => {
                let node = self.page(*page)?;
                self.document(node.display_title(), self.page_body(node))
            }
            RouteResponse::Listing {
                page,
                category,
                window,
            } => {
                let node = self.page(*page)?;
                self.document(node.display_title(), self.listing(node, window, *category))
            }
            RouteResponse::Latest { page, posts } => {
                let node = self.page(*page)?;
                let body = html! {
                    main.latest-posts {
                        h1 { "Latest from " (node.display_title()) }
                        (self.post_cards(posts))
                    }
                };
                self.document(node.display_title(), body)
            }
            RouteResponse::Subscribe { page } => {
                let node = self.page(*page)?;
                self.document("Subscribe", self.subscribe_form(node))
            }
        };
        Ok(markup.into_string())
    }

    fn page(&self, id: PageId) -> Result<&PageNode, RenderError> {
        self.tree.get(id).ok_or(RenderError::MissingPage(id))
    }

    // ========================================================================
    // Layout
    // ========================================================================

    /// Base document with the `main` menu (when one exists) and the footer.
    pub fn document(&self, title: &str, content: Markup) -> Markup {
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="UTF-8";
                    meta name="viewport" content="width=device-width, initial-scale=1.0";
                    title { (title) }
                }
                body {
                    @if let Some((_, menu)) = self.snippets.menu_by_slug("main") {
                        header.site-header { (self.menu(menu)) }
                    }
                    (content)
                    (self.footer())
                }
            }
        }
    }

    pub fn menu(&self, menu: &Menu) -> Markup {
        html! {
            nav.menu data-menu=(menu.slug) {
                @if let Some(image) = menu.menu_image {
                    (self.image(image, specs::MENU, &menu.title))
                }
                ul {
                    @for item in menu.items.iter() {
                        li {
                            @if item.open_in_new_tab {
                                a href=(item.link(self.tree)) target="_blank" rel="noopener" {
                                    (item.title(self.tree))
                                }
                            } @else {
                                a href=(item.link(self.tree)) { (item.title(self.tree)) }
                            }
                        }
                    }
                }
            }
        }
    }

    pub fn footer(&self) -> Markup {
        let links = self.settings.links();
        html! {
            footer.site-footer {
                @if !links.is_empty() {
                    ul.social-links {
                        @for (name, url) in links {
                            li { a class={ "social-" (name) } href=(url) rel="noopener" { (name) } }
                        }
                    }
                }
            }
        }
    }

    // ========================================================================
    // Pieces
    // ========================================================================

    fn rich(&self, raw: &str, features: &FeatureSet) -> Markup {
        PreEscaped(self.sanitizer.sanitize(raw, features))
    }

    fn image(&self, image: ImageRef, spec: &str, alt: &str) -> Markup {
        html! {
            img src=(self.media.rendition_url(image, spec)) alt=(alt) loading="lazy";
        }
    }

    /// Internal page link first, then the raw URL.
    fn href(&self, page: Option<PageId>, url: Option<&str>) -> Option<String> {
        page.and_then(|p| self.tree.url_path(p))
            .or_else(|| url.filter(|u| !u.is_empty()).map(str::to_string))
    }

    pub fn block(&self, block: &ContentBlock) -> Markup {
        let features = BlockSchema::of(block.kind())
            .rich_text_features()
            .cloned()
            .unwrap_or_default();
        match block {
            ContentBlock::TitleAndText(b) => html! {
                section.block-title-and-text {
                    h2 { (b.title) }
                    p { (b.text) }
                }
            },
            ContentBlock::RichTextFull(raw) | ContentBlock::RichTextSimple(raw) => html! {
                div class={ "block-" (block.tag()) } { (self.rich(raw, &features)) }
            },
            ContentBlock::Cards(b) => html! {
                section.block-cards {
                    h2 { (b.title) }
                    div.cards {
                        @for card in &b.cards {
                            article.card {
                                @if let Some(image) = card.image {
                                    (self.image(image, specs::CARD, &card.title))
                                }
                                h3 { (card.title) }
                                p { (card.text) }
                                @if let Some(href) = self.href(card.button_page, card.button_url.as_deref()) {
                                    a.button href=(href) { "Learn More" }
                                }
                            }
                        }
                    }
                }
            },
            ContentBlock::Cta(b) => html! {
                section.block-cta {
                    h2 { (b.title) }
                    div.cta-text { (self.rich(&b.text, &features)) }
                    @if let Some(href) = self.href(b.button_page, b.button_url.as_deref()) {
                        a.button href=(href) { (b.button_text) }
                    }
                }
            },
            ContentBlock::Button(b) => match self.href(b.button_page, b.button_url.as_deref()) {
                Some(href) => html! { div.block-button { a.button href=(href) { "Learn More" } } },
                None => html! {},
            },
        }
    }

    pub fn stream(&self, stream: &Stream) -> Markup {
        html! {
            div.stream {
                @for block in stream {
                    (self.block(block))
                }
            }
        }
    }

    // ========================================================================
    // Page bodies
    // ========================================================================

    pub fn page_body(&self, node: &PageNode) -> Markup {
        match &node.payload {
            PagePayload::Home(h) => html! {
                main.home-page {
                    section.banner {
                        @if let Some(image) = h.banner_image {
                            (self.image(image, specs::BANNER, &h.banner_title))
                        }
                        h1 { (h.banner_title) }
                        div.banner-subtitle { (self.rich(&h.banner_subtitle, &FeatureSet::inline())) }
                        @if let Some(href) = h.banner_cta.and_then(|p| self.tree.url_path(p)) {
                            a.button href=(href) { "Learn More" }
                        }
                    }
                    @if !h.carousel_images.is_empty() {
                        div.carousel {
                            @for slide in h.carousel_images.iter() {
                                (self.image(slide.image, specs::CAROUSEL, &h.banner_title))
                            }
                        }
                    }
                }
            },
            PagePayload::BlogListing(_) => html! {
                main.listing-page { h1 { (node.display_title()) } }
            },
            PagePayload::BlogDetail(post) => self.post_page(node, post, html! {}),
            PagePayload::Article(a) => {
                let extra = html! {
                    @if !a.subtitle.is_empty() {
                        p.subtitle { (a.subtitle) }
                    }
                    @if let Some(image) = a.intro_image {
                        (self.image(image, specs::POST_HERO, &a.subtitle))
                    }
                };
                self.post_page(node, &a.post, extra)
            }
            PagePayload::Video(v) => {
                let extra = html! {
                    div.video-embed {
                        iframe src={ "https://www.youtube.com/embed/" (v.youtube_video_id) }
                            allowfullscreen {}
                    }
                };
                self.post_page(node, &v.post, extra)
            }
            PagePayload::Flex(f) => html! {
                main.flex-page {
                    h1 { (node.title) }
                    @if !f.subtitle.is_empty() {
                        p.subtitle { (f.subtitle) }
                    }
                    (self.stream(&f.content))
                }
            },
            PagePayload::Contact(c) => html! {
                main.contact-page {
                    h1 { (node.title) }
                    div.intro { (self.rich(&c.intro, &FeatureSet::full())) }
                    form method="post" {
                        @for field in c.form_fields.iter() {
                            (form_field(field))
                        }
                        button type="submit" { "Submit" }
                    }
                }
            },
        }
    }

    fn post_page(&self, node: &PageNode, post: &BlogPost, extra: Markup) -> Markup {
        let listing_path = node.parent.and_then(|p| self.tree.url_path(p));
        html! {
            main.post-page {
                article {
                    h1 { (node.display_title()) }
                    (extra)
                    @if let Some(image) = post.blog_image {
                        (self.image(image, specs::POST_HERO, node.display_title()))
                    }
                    ul.authors {
                        @for author in post.authors.iter().filter_map(|a| self.snippets.authors.get(*a)) {
                            li.author {
                                @if let Some(image) = author.image {
                                    (self.image(image, specs::AUTHOR, &author.name))
                                }
                                @match &author.website {
                                    Some(site) => { a href=(site) { (author.name) } }
                                    None => { span { (author.name) } }
                                }
                            }
                        }
                    }
                    @if !post.categories.is_empty() {
                        ul.categories {
                            @for category in post.categories.iter().filter_map(|c| self.snippets.categories.get(*c)) {
                                li {
                                    @match &listing_path {
                                        Some(base) => {
                                            a href={ (base) "category/" (category.slug) "/" } { (category.name) }
                                        }
                                        None => { span { (category.name) } }
                                    }
                                }
                            }
                        }
                    }
                    (self.stream(&post.content))
                }
            }
        }
    }

    // ========================================================================
    // Listings
    // ========================================================================

    pub fn listing(
        &self,
        node: &PageNode,
        window: &PageWindow<PageId>,
        category: Option<CategoryId>,
    ) -> Markup {
        let category = category.and_then(|c| self.snippets.categories.get(c));
        html! {
            main.listing-page {
                h1 { (node.display_title()) }
                @if let Some(category) = category {
                    p.listing-category { "Category: " (category.name) }
                }
                (self.post_cards(&window.items))
                @if window.num_pages > 1 {
                    nav.pagination {
                        @if window.has_previous() {
                            a.prev href={ "?page=" (window.number - 1) } { "Previous" }
                        }
                        span.page-number { "Page " (window.number) " of " (window.num_pages) }
                        @if window.has_next() {
                            a.next href={ "?page=" (window.number + 1) } { "Next" }
                        }
                    }
                }
            }
        }
    }

    fn post_cards(&self, posts: &[PageId]) -> Markup {
        html! {
            div.post-list {
                @for node in posts.iter().filter_map(|id| self.tree.get(*id)) {
                    @if let Some(post) = node.payload.post() {
                        article.post-card {
                            @if let Some(image) = post.blog_image {
                                (self.image(image, specs::POST_THUMB, node.display_title()))
                            }
                            h2 {
                                a href=(self.tree.url_path(node.id).unwrap_or_default()) {
                                    (node.display_title())
                                }
                            }
                            div.summary { (self.rich(&post.summary, &FeatureSet::simple())) }
                        }
                    }
                }
            }
        }
    }

    fn subscribe_form(&self, listing: &PageNode) -> Markup {
        let action = self.tree.url_path(listing.id).unwrap_or_default();
        html! {
            main.subscribe-page {
                h1 { "Subscribe to " (listing.display_title()) }
                form method="post" action={ (action) "subscribe/" } {
                    label { "Email" input type="email" name="email" required; }
                    label { "First name" input type="text" name="first_name" required; }
                    label { "Last name" input type="text" name="last_name" required; }
                    button type="submit" { "Subscribe" }
                }
            }
        }
    }
}

fn form_field(field: &FormField) -> Markup {
    let name = field.clean_name();
    let input_type = match field.field_type {
        FormFieldType::Email => "email",
        FormFieldType::Number => "number",
        FormFieldType::Url => "url",
        FormFieldType::Date => "date",
        FormFieldType::DateTime => "datetime-local",
        FormFieldType::Hidden => "hidden",
        FormFieldType::Checkbox => "checkbox",
        _ => "text",
    };
    let choice_type = if field.field_type == FormFieldType::Radio {
        "radio"
    } else {
        "checkbox"
    };
    html! {
        div.form-field {
            label for=(name) { (field.label) }
            @match field.field_type {
                FormFieldType::MultiLine => {
                    textarea id=(name) name=(name) required[field.required] { (field.default_value) }
                }
                FormFieldType::Dropdown => {
                    select id=(name) name=(name) required[field.required] {
                        @for choice in &field.choices {
                            option value=(choice) selected[*choice == field.default_value] { (choice) }
                        }
                    }
                }
                FormFieldType::Radio | FormFieldType::Checkboxes => {
                    @for choice in &field.choices {
                        label.choice {
                            input type=(choice_type) name=(name) value=(choice);
                            (choice)
                        }
                    }
                }
                _ => {
                    input type=(input_type) id=(name) name=(name) value=(field.default_value)
                        required[field.required];
                }
            }
            @if !field.help_text.is_empty() {
                small.help { (field.help_text) }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Button, CallToAction};
    use crate::media::PrefixMediaResolver;
    use crate::richtext::AllowListSanitizer;
    use crate::test_helpers::*;

    fn render_with<T>(site: &SampleSite, f: impl FnOnce(&Renderer<'_>) -> T) -> T {
        let media = PrefixMediaResolver::default();
        let renderer = Renderer {
            tree: &site.tree,
            snippets: &site.snippets,
            settings: &site.settings,
            media: &media,
            sanitizer: &AllowListSanitizer,
        };
        f(&renderer)
    }

    #[test]
    fn rich_text_is_sanitized_per_block() {
        let site = sample_site();
        let html = render_with(&site, |r| {
            r.block(&ContentBlock::RichTextSimple(
                "<h2>Big</h2><b>bold</b><script>x</script>".into(),
            ))
            .into_string()
        });
        assert!(html.contains("<b>bold</b>"));
        assert!(!html.contains("<h2>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn cta_links_internal_page() {
        let site = sample_site();
        let about = find_page(&site.tree, "about").id;
        let html = render_with(&site, |r| {
            r.block(&ContentBlock::Cta(CallToAction {
                title: "Join".into(),
                text: "<i>now</i>".into(),
                button_page: Some(about),
                button_url: Some("https://elsewhere.example".into()),
                button_text: "Go".into(),
            }))
            .into_string()
        });
        assert!(html.contains(r#"href="/about/""#));
        assert!(html.contains("<i>now</i>"));
    }

    #[test]
    fn button_without_target_renders_nothing() {
        let site = sample_site();
        let html = render_with(&site, |r| {
            r.block(&ContentBlock::Button(Button {
                button_page: None,
                button_url: None,
            }))
            .into_string()
        });
        assert!(html.is_empty());
    }

    #[test]
    fn post_page_lists_authors_and_category_links() {
        let site = sample_site();
        let post = find_page(&site.tree, "first-post");
        let html = render_with(&site, |r| {
            r.render_response(&RouteResponse::Page { page: post.id }).unwrap()
        });
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Ada Lovelace"));
        assert!(html.contains(r#"href="/blog/category/rust/""#));
        assert!(html.contains("/media/"));
    }

    #[test]
    fn listing_shows_pagination_links() {
        let site = sample_site();
        let blog = find_page(&site.tree, "blog");
        let ids: Vec<PageId> = ["first-post", "second-post", "video-post"]
            .iter()
            .map(|s| find_page(&site.tree, s).id)
            .collect();
        let window = crate::routing::paginate(&ids, 1, 2);
        let html = render_with(&site, |r| r.listing(blog, &window, None).into_string());
        assert!(html.contains(r#"href="?page=1""#));
        assert!(html.contains(r#"href="?page=3""#));
        assert!(html.contains("Page 2 of 3"));
    }

    #[test]
    fn footer_and_menu_are_in_every_document() {
        let site = sample_site();
        let about = find_page(&site.tree, "about").id;
        let html = render_with(&site, |r| {
            r.render_response(&RouteResponse::Page { page: about }).unwrap()
        });
        assert!(html.contains("social-youtube"));
        assert!(html.contains(r#"data-menu="main""#));
        assert!(html.contains(r#"href="/blog/""#));
    }

    #[test]
    fn missing_page_is_an_error() {
        let site = sample_site();
        let result = render_with(&site, |r| {
            r.render_response(&RouteResponse::Page { page: PageId(999) })
        });
        assert_eq!(result, Err(RenderError::MissingPage(PageId(999))));
    }

    #[test]
    fn contact_form_fields() {
        let site = sample_site();
        let contact = find_page(&site.tree, "contact").id;
        let html = render_with(&site, |r| {
            r.render_response(&RouteResponse::Page { page: contact }).unwrap()
        });
        assert!(html.contains(r#"name="your_email""#));
        assert!(html.contains(r#"type="email""#));
        assert!(html.contains("<textarea"));
    }
}
