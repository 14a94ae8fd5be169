//! Typed page payloads.
//!
//! Every node in the site tree carries one [`PagePayload`]; the variant is
//! the page's type. Each type has a static field schema
//! ([`PagePayload::schema`]) that is checked when the page is published,
//! along with its body stream and the size limits of its ordered
//! collections.
//!
//! Publish checks run in a fixed order and stop at the first failing stage:
//!
//! 1. stream block tags against the page type's [`BlockRegistry`]
//!    ([`SchemaError`])
//! 2. required and length-limited fields of the page and of every stream
//!    block, all reported together ([`ValidationError`])
//! 3. collection sizes ([`CardinalityError`])

use crate::blocks::{
    BlockRegistry, FieldIssue, FieldKind, FieldProblem, FieldSpec, FieldValue, SchemaError,
    ValidationError, check_fields,
};
use crate::config::LimitsConfig;
use crate::forms::{EmailSettings, FormField, looks_like_email};
use crate::ordering::{CardinalityError, OrderError, Ordered};
use crate::richtext::FeatureSet;
use crate::stream::Stream;
use crate::types::{AuthorId, CategoryId, ImageRef, PageId, PageType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Cardinality(#[from] CardinalityError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PagePayload {
    Home(HomePage),
    BlogListing(BlogListingPage),
    BlogDetail(BlogPost),
    Article(ArticlePage),
    Video(VideoPage),
    Flex(FlexPage),
    Contact(ContactPage),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HomePage {
    pub banner_title: String,
    pub banner_subtitle: String,
    pub banner_image: Option<ImageRef>,
    pub sidenav_image: Option<ImageRef>,
    pub banner_cta: Option<PageId>,
    pub carousel_images: Ordered<CarouselImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarouselImage {
    pub image: ImageRef,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogListingPage {
    pub custom_title: String,
}

/// Fields shared by every post type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogPost {
    pub custom_title: String,
    pub blog_image: Option<ImageRef>,
    pub summary: String,
    pub content: Stream,
    pub authors: Ordered<AuthorId>,
    pub categories: BTreeSet<CategoryId>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArticlePage {
    pub post: BlogPost,
    pub subtitle: String,
    pub intro_image: Option<ImageRef>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoPage {
    pub post: BlogPost,
    pub youtube_video_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlexPage {
    pub subtitle: String,
    pub content: Stream,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactPage {
    pub intro: String,
    pub thank_you_text: String,
    pub form_fields: Ordered<FormField>,
    pub email: EmailSettings,
}

impl PagePayload {
    /// Blank payload for a new page of `page_type`.
    pub fn empty(page_type: PageType) -> PagePayload {
        match page_type {
            PageType::Home => PagePayload::Home(HomePage::default()),
            PageType::BlogListing => PagePayload::BlogListing(BlogListingPage::default()),
            PageType::BlogDetail => PagePayload::BlogDetail(BlogPost::default()),
            PageType::Article => PagePayload::Article(ArticlePage::default()),
            PageType::Video => PagePayload::Video(VideoPage::default()),
            PageType::Flex => PagePayload::Flex(FlexPage::default()),
            PageType::Contact => PagePayload::Contact(ContactPage::default()),
        }
    }

    pub fn page_type(&self) -> PageType {
        match self {
            PagePayload::Home(_) => PageType::Home,
            PagePayload::BlogListing(_) => PageType::BlogListing,
            PagePayload::BlogDetail(_) => PageType::BlogDetail,
            PagePayload::Article(_) => PageType::Article,
            PagePayload::Video(_) => PageType::Video,
            PagePayload::Flex(_) => PageType::Flex,
            PagePayload::Contact(_) => PageType::Contact,
        }
    }

    pub fn post(&self) -> Option<&BlogPost> {
        match self {
            PagePayload::BlogDetail(p) => Some(p),
            PagePayload::Article(a) => Some(&a.post),
            PagePayload::Video(v) => Some(&v.post),
            _ => None,
        }
    }

    pub fn post_mut(&mut self) -> Option<&mut BlogPost> {
        match self {
            PagePayload::BlogDetail(p) => Some(p),
            PagePayload::Article(a) => Some(&mut a.post),
            PagePayload::Video(v) => Some(&mut v.post),
            _ => None,
        }
    }

    /// The body stream, for page types that have one.
    pub fn stream(&self) -> Option<&Stream> {
        match self {
            PagePayload::Flex(f) => Some(&f.content),
            _ => self.post().map(|p| &p.content),
        }
    }

    pub fn stream_mut(&mut self) -> Option<&mut Stream> {
        match self {
            PagePayload::Flex(f) => Some(&mut f.content),
            _ => self.post_mut().map(|p| &mut p.content),
        }
    }

    /// Title shown on the page, when the type has a custom one set.
    pub fn custom_title(&self) -> Option<&str> {
        let title = match self {
            PagePayload::BlogListing(l) => &l.custom_title,
            _ => &self.post()?.custom_title,
        };
        (!title.trim().is_empty()).then_some(title.as_str())
    }

    /// Pages this payload links to, from its own fields and its stream.
    pub fn linked_pages(&self) -> Vec<PageId> {
        let mut pages: Vec<PageId> = match self {
            PagePayload::Home(h) => h.banner_cta.into_iter().collect(),
            _ => Vec::new(),
        };
        if let Some(stream) = self.stream() {
            pages.extend(stream.iter().flat_map(|b| b.linked_pages()));
        }
        pages
    }

    /// Reorder one of the payload's ordered collections by name.
    pub fn reorder_collection(
        &mut self,
        collection: &str,
        permutation: &[usize],
    ) -> Result<(), OrderError> {
        match (self, collection) {
            (PagePayload::Home(h), "carousel_images") => h.carousel_images.reorder(permutation),
            (PagePayload::Contact(c), "form_fields") => c.form_fields.reorder(permutation),
            (payload, "authors") => match payload.post_mut() {
                Some(post) => post.authors.reorder(permutation),
                None => Err(OrderError::NoSuchCollection(collection.to_string())),
            },
            _ => Err(OrderError::NoSuchCollection(collection.to_string())),
        }
    }

    /// Static field schema of a page type, excluding its stream.
    pub fn schema(page_type: PageType) -> Vec<FieldSpec> {
        use FieldKind::*;
        let post = || {
            vec![
                FieldSpec::new("custom_title", Char { max_length: 100 }),
                FieldSpec::new("blog_image", Image),
                FieldSpec::new(
                    "summary",
                    RichText {
                        features: FeatureSet::simple(),
                    },
                ),
            ]
        };
        match page_type {
            PageType::Home => vec![
                FieldSpec::new("banner_title", Char { max_length: 100 }),
                FieldSpec::new(
                    "banner_subtitle",
                    RichText {
                        features: FeatureSet::inline(),
                    },
                ),
                FieldSpec::new("banner_image", Image),
                FieldSpec::new("sidenav_image", Image),
                FieldSpec::new("banner_cta", PageLink).optional(),
            ],
            PageType::BlogListing => {
                vec![FieldSpec::new("custom_title", Char { max_length: 100 })]
            }
            PageType::BlogDetail => post(),
            PageType::Article => {
                let mut fields = post();
                fields.push(FieldSpec::new("subtitle", Char { max_length: 100 }).optional());
                fields.push(FieldSpec::new("intro_image", Image).optional());
                fields
            }
            PageType::Video => {
                let mut fields = post();
                fields.push(FieldSpec::new("youtube_video_id", Char { max_length: 30 }));
                fields
            }
            PageType::Flex => {
                vec![FieldSpec::new("subtitle", Char { max_length: 100 }).optional()]
            }
            PageType::Contact => vec![
                FieldSpec::new(
                    "intro",
                    RichText {
                        features: FeatureSet::full(),
                    },
                )
                .optional(),
                FieldSpec::new(
                    "thank_you_text",
                    RichText {
                        features: FeatureSet::full(),
                    },
                )
                .optional(),
                FieldSpec::new(
                    "form_fields",
                    List {
                        item: vec![FieldSpec::new("label", Char { max_length: 255 })],
                    },
                )
                .optional(),
            ],
        }
    }

    fn fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        fn post_fields(p: &BlogPost) -> Vec<(&'static str, FieldValue<'_>)> {
            vec![
                ("custom_title", FieldValue::text(&p.custom_title)),
                ("blog_image", FieldValue::Present(p.blog_image.is_some())),
                ("summary", FieldValue::text(&p.summary)),
            ]
        }
        match self {
            PagePayload::Home(h) => vec![
                ("banner_title", FieldValue::text(&h.banner_title)),
                ("banner_subtitle", FieldValue::text(&h.banner_subtitle)),
                ("banner_image", FieldValue::Present(h.banner_image.is_some())),
                ("sidenav_image", FieldValue::Present(h.sidenav_image.is_some())),
                ("banner_cta", FieldValue::page(h.banner_cta)),
            ],
            PagePayload::BlogListing(l) => vec![("custom_title", FieldValue::text(&l.custom_title))],
            PagePayload::BlogDetail(p) => post_fields(p),
            PagePayload::Article(a) => {
                let mut fields = post_fields(&a.post);
                fields.push(("subtitle", FieldValue::text(&a.subtitle)));
                fields.push(("intro_image", FieldValue::Present(a.intro_image.is_some())));
                fields
            }
            PagePayload::Video(v) => {
                let mut fields = post_fields(&v.post);
                fields.push(("youtube_video_id", FieldValue::text(&v.youtube_video_id)));
                fields
            }
            PagePayload::Flex(f) => vec![("subtitle", FieldValue::text(&f.subtitle))],
            PagePayload::Contact(c) => vec![
                ("intro", FieldValue::text(&c.intro)),
                ("thank_you_text", FieldValue::text(&c.thank_you_text)),
                (
                    "form_fields",
                    FieldValue::Items(
                        c.form_fields
                            .iter()
                            .map(|f| vec![("label", FieldValue::text(&f.label))])
                            .collect(),
                    ),
                ),
            ],
        }
    }

    /// Run every publish-time check. See the module docs for the order.
    pub fn validate_for_publish(&self, limits: &LimitsConfig) -> Result<(), PublishError> {
        let page_type = self.page_type();
        let registry = BlockRegistry::for_page(page_type);
        if let Some(stream) = self.stream() {
            stream.check_tags(&registry)?;
        }

        let mut issues = Vec::new();
        check_fields(&Self::schema(page_type), &self.fields(), "", &mut issues);
        if let Some(stream) = self.stream() {
            for (i, block) in stream.iter().enumerate() {
                issues.extend(registry.validate_at(block, &format!("content[{i}]"))?);
            }
        }
        if let PagePayload::Contact(c) = self {
            issues.extend(email_issues(&c.email));
        }
        ValidationError::check(issues)?;

        match self {
            PagePayload::Home(h) => limits
                .carousel_images
                .check("carousel_images", h.carousel_images.len())?,
            _ => {
                if let Some(post) = self.post() {
                    limits.authors.check("authors", post.authors.len())?;
                }
            }
        }
        Ok(())
    }
}

fn email_issues(email: &EmailSettings) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    if !email.from_address.is_empty() && !looks_like_email(&email.from_address) {
        issues.push(FieldIssue::new(
            "email.from_address",
            FieldProblem::Invalid("not an email address".into()),
        ));
    }
    for (i, to) in email.to_address.iter().enumerate() {
        if !looks_like_email(to) {
            issues.push(FieldIssue::new(
                format!("email.to_address[{i}]"),
                FieldProblem::Invalid("not an email address".into()),
            ));
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Button, ContentBlock, TitleAndText};
    use crate::ordering::Bound;

    fn limits() -> LimitsConfig {
        LimitsConfig::default()
    }

    fn complete_post(authors: u64) -> BlogPost {
        BlogPost {
            custom_title: "Hello".into(),
            blog_image: Some(ImageRef(1)),
            summary: "<p>sum</p>".into(),
            content: Stream::from_blocks(vec![ContentBlock::TitleAndText(TitleAndText {
                title: "t".into(),
                text: "x".into(),
            })]),
            authors: (0..authors).map(AuthorId).collect(),
            categories: BTreeSet::new(),
        }
    }

    #[test]
    fn empty_payload_matches_type() {
        for ty in PageType::ALL {
            assert_eq!(PagePayload::empty(ty).page_type(), ty);
        }
    }

    #[test]
    fn complete_post_publishes() {
        let payload = PagePayload::BlogDetail(complete_post(1));
        assert_eq!(payload.validate_for_publish(&limits()), Ok(()));
    }

    #[test]
    fn post_without_authors_violates_min() {
        let payload = PagePayload::BlogDetail(complete_post(0));
        let err = payload.validate_for_publish(&limits()).unwrap_err();
        let PublishError::Cardinality(c) = err else {
            panic!("expected cardinality error, got {err:?}");
        };
        assert_eq!(c.bound, Bound::Min(1));
    }

    #[test]
    fn post_with_nine_authors_violates_max() {
        let payload = PagePayload::Video(VideoPage {
            post: complete_post(9),
            youtube_video_id: "dQw4w9WgXcQ".into(),
        });
        let err = payload.validate_for_publish(&limits()).unwrap_err();
        assert!(matches!(err, PublishError::Cardinality(c) if c.bound == Bound::Max(8)));
    }

    #[test]
    fn missing_fields_reported_before_cardinality() {
        let payload = PagePayload::BlogDetail(BlogPost::default());
        let err = payload.validate_for_publish(&limits()).unwrap_err();
        let PublishError::Validation(v) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(v.fields(), vec!["custom_title", "blog_image", "summary"]);
    }

    #[test]
    fn stream_issues_join_field_issues() {
        let mut post = complete_post(1);
        post.custom_title.clear();
        post.content.append(ContentBlock::RichTextFull(String::new()));
        let err = PagePayload::BlogDetail(post)
            .validate_for_publish(&limits())
            .unwrap_err();
        let PublishError::Validation(v) = err else {
            panic!("expected validation error");
        };
        assert_eq!(v.fields(), vec!["custom_title", "content[1].value"]);
    }

    #[test]
    fn button_block_is_schema_error_on_posts() {
        let mut post = complete_post(1);
        post.content.append(ContentBlock::Button(Button::default()));
        let err = PagePayload::Article(ArticlePage {
            post,
            ..Default::default()
        })
        .validate_for_publish(&limits())
        .unwrap_err();
        assert!(matches!(
            err,
            PublishError::Schema(SchemaError::NotAllowed { page_type: PageType::Article, .. })
        ));
    }

    #[test]
    fn flex_accepts_buttons() {
        let payload = PagePayload::Flex(FlexPage {
            subtitle: String::new(),
            content: Stream::from_blocks(vec![ContentBlock::Button(Button::default())]),
        });
        assert_eq!(payload.validate_for_publish(&limits()), Ok(()));
    }

    #[test]
    fn script_button_url_blocks_publish() {
        let payload = PagePayload::Flex(FlexPage {
            subtitle: String::new(),
            content: Stream::from_blocks(vec![ContentBlock::Button(Button {
                button_page: None,
                button_url: Some("javascript:alert(1)".into()),
            })]),
        });
        let err = payload.validate_for_publish(&limits()).unwrap_err();
        let PublishError::Validation(v) = err else {
            panic!("expected validation error");
        };
        assert_eq!(v.fields(), vec!["content[0].button_url"]);
    }

    #[test]
    fn home_needs_carousel_images() {
        let home = HomePage {
            banner_title: "Welcome".into(),
            banner_subtitle: "<b>hi</b>".into(),
            banner_image: Some(ImageRef(1)),
            sidenav_image: Some(ImageRef(2)),
            banner_cta: None,
            carousel_images: Ordered::new(),
        };
        let err = PagePayload::Home(home.clone())
            .validate_for_publish(&limits())
            .unwrap_err();
        assert!(matches!(err, PublishError::Cardinality(c) if c.collection == "carousel_images"));

        let mut full = home;
        full.carousel_images = (1..=6).map(|i| CarouselImage { image: ImageRef(i) }).collect();
        assert!(PagePayload::Home(full).validate_for_publish(&limits()).is_err());
    }

    #[test]
    fn contact_checks_recipient_addresses() {
        let contact = ContactPage {
            email: EmailSettings {
                from_address: "site@example.com".into(),
                to_address: vec!["nope".into()],
                subject: "Hi".into(),
            },
            ..Default::default()
        };
        let err = PagePayload::Contact(contact)
            .validate_for_publish(&limits())
            .unwrap_err();
        assert!(
            matches!(err, PublishError::Validation(v) if v.fields() == vec!["email.to_address[0]"])
        );
    }

    #[test]
    fn reorder_collection_by_name() {
        let mut payload = PagePayload::BlogDetail(complete_post(3));
        payload.reorder_collection("authors", &[2, 1, 0]).unwrap();
        let authors: Vec<AuthorId> = payload.post().unwrap().authors.iter().copied().collect();
        assert_eq!(authors, vec![AuthorId(2), AuthorId(1), AuthorId(0)]);
        assert_eq!(
            payload.reorder_collection("carousel_images", &[]),
            Err(OrderError::NoSuchCollection("carousel_images".into()))
        );
    }

    #[test]
    fn custom_title_ignores_blank() {
        assert_eq!(PagePayload::empty(PageType::BlogListing).custom_title(), None);
        let payload = PagePayload::BlogDetail(complete_post(1));
        assert_eq!(payload.custom_title(), Some("Hello"));
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let json = serde_json::to_value(PagePayload::empty(PageType::Flex)).unwrap();
        assert_eq!(json["type"], "flex");
        let back: PagePayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.page_type(), PageType::Flex);
    }
}
