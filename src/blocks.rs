//! Content block variants and the schema registry that validates them.
//!
//! A page's body is a [`Stream`](crate::stream::Stream) of blocks. Each block
//! is one of a closed set of variants, and each variant owns a fixed field
//! schema:
//!
//! | Tag | Fields |
//! |-----|--------|
//! | `title_and_text` | title (≤100), text |
//! | `full_richtext` | rich text, full features |
//! | `simple_richtext` | rich text, bold/italic/link |
//! | `cards` | title (≤100), cards[image, title (≤40), text (≤200), button_page?, button_url?] |
//! | `cta` | title (≤60), text (bold/italic), button_page?, button_url?, button_text (≤40) |
//! | `button` | button_page?, button_url? |
//!
//! Blocks are plain data. Required-field checks are not enforced while a
//! page is being edited; they run through [`BlockRegistry::validate`] when
//! the page is published, so a draft can hold half-filled blocks.

use crate::richtext::FeatureSet;
use crate::types::{ImageRef, PageId, PageType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unknown block type `{0}`")]
    UnknownBlockType(String),
    #[error("Block type `{tag}` is not allowed on {page_type} pages")]
    NotAllowed { tag: String, page_type: PageType },
}

/// What is wrong with a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldProblem {
    Missing,
    TooLong { max: usize, actual: usize },
    Invalid(String),
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldProblem::Missing => f.write_str("missing"),
            FieldProblem::TooLong { max, actual } => {
                write!(f, "too long (max {max}, got {actual})")
            }
            FieldProblem::Invalid(reason) => f.write_str(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    /// Dotted path to the field, e.g. `content[2].cards[0].title`.
    pub field: String,
    pub problem: FieldProblem,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, problem: FieldProblem) -> Self {
        Self {
            field: field.into(),
            problem,
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, FieldProblem::Missing)
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// One or more fields failed validation. Every offending field is listed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Validation failed: {}", issue_list(.issues))]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

fn issue_list(issues: &[FieldIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    /// `Ok(())` when there is nothing to report.
    pub fn check(issues: Vec<FieldIssue>) -> Result<(), ValidationError> {
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    pub fn fields(&self) -> Vec<&str> {
        self.issues.iter().map(|i| i.field.as_str()).collect()
    }
}

// ============================================================================
// Block variants
// ============================================================================

/// A single typed unit of page content.
///
/// Serialized adjacently tagged: `{"type": "cards", "value": {...}}`.
/// Rich-text variants carry their markup directly as the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ContentBlock {
    TitleAndText(TitleAndText),
    #[serde(rename = "full_richtext")]
    RichTextFull(String),
    #[serde(rename = "simple_richtext")]
    RichTextSimple(String),
    Cards(Cards),
    Cta(CallToAction),
    #[serde(alias = "button_block")]
    Button(Button),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TitleAndText {
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cards {
    pub title: String,
    #[serde(default)]
    pub cards: Vec<Card>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Card {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_page: Option<PageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallToAction {
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_page: Option<PageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_url: Option<String>,
    #[serde(default = "default_button_text")]
    pub button_text: String,
}

fn default_button_text() -> String {
    "Learn More".to_string()
}

impl Default for CallToAction {
    fn default() -> Self {
        Self {
            title: String::new(),
            text: String::new(),
            button_page: None,
            button_url: None,
            button_text: default_button_text(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Button {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_page: Option<PageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_url: Option<String>,
}

/// Variant tag of a block, independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockKind {
    TitleAndText,
    RichTextFull,
    RichTextSimple,
    Cards,
    Cta,
    Button,
}

impl BlockKind {
    pub const ALL: [BlockKind; 6] = [
        BlockKind::TitleAndText,
        BlockKind::RichTextFull,
        BlockKind::RichTextSimple,
        BlockKind::Cards,
        BlockKind::Cta,
        BlockKind::Button,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            BlockKind::TitleAndText => "title_and_text",
            BlockKind::RichTextFull => "full_richtext",
            BlockKind::RichTextSimple => "simple_richtext",
            BlockKind::Cards => "cards",
            BlockKind::Cta => "cta",
            BlockKind::Button => "button",
        }
    }

    /// Accepts the legacy `button_block` spelling alongside the canonical tags.
    pub fn from_tag(tag: &str) -> Option<BlockKind> {
        match tag {
            "button_block" => Some(BlockKind::Button),
            _ => Self::ALL.into_iter().find(|k| k.tag() == tag),
        }
    }
}

impl ContentBlock {
    pub fn kind(&self) -> BlockKind {
        match self {
            ContentBlock::TitleAndText(_) => BlockKind::TitleAndText,
            ContentBlock::RichTextFull(_) => BlockKind::RichTextFull,
            ContentBlock::RichTextSimple(_) => BlockKind::RichTextSimple,
            ContentBlock::Cards(_) => BlockKind::Cards,
            ContentBlock::Cta(_) => BlockKind::Cta,
            ContentBlock::Button(_) => BlockKind::Button,
        }
    }

    pub fn tag(&self) -> &'static str {
        self.kind().tag()
    }

    /// Uniform view over the block's fields, in schema order.
    pub fn fields(&self) -> Vec<(&'static str, FieldValue<'_>)> {
        match self {
            ContentBlock::TitleAndText(b) => vec![
                ("title", FieldValue::text(&b.title)),
                ("text", FieldValue::text(&b.text)),
            ],
            ContentBlock::RichTextFull(html) | ContentBlock::RichTextSimple(html) => {
                vec![("value", FieldValue::text(html))]
            }
            ContentBlock::Cards(b) => vec![
                ("title", FieldValue::text(&b.title)),
                (
                    "cards",
                    FieldValue::Items(b.cards.iter().map(card_fields).collect()),
                ),
            ],
            ContentBlock::Cta(b) => vec![
                ("title", FieldValue::text(&b.title)),
                ("text", FieldValue::text(&b.text)),
                ("button_page", FieldValue::page(b.button_page)),
                ("button_url", FieldValue::opt_text(b.button_url.as_deref())),
                ("button_text", FieldValue::text(&b.button_text)),
            ],
            ContentBlock::Button(b) => vec![
                ("button_page", FieldValue::page(b.button_page)),
                ("button_url", FieldValue::opt_text(b.button_url.as_deref())),
            ],
        }
    }

    /// Pages this block links to.
    pub fn linked_pages(&self) -> Vec<PageId> {
        match self {
            ContentBlock::Cards(b) => b.cards.iter().filter_map(|c| c.button_page).collect(),
            ContentBlock::Cta(b) => b.button_page.into_iter().collect(),
            ContentBlock::Button(b) => b.button_page.into_iter().collect(),
            _ => Vec::new(),
        }
    }
}

fn card_fields(card: &Card) -> Vec<(&'static str, FieldValue<'_>)> {
    vec![
        ("image", FieldValue::Present(card.image.is_some())),
        ("title", FieldValue::text(&card.title)),
        ("text", FieldValue::text(&card.text)),
        ("button_page", FieldValue::page(card.button_page)),
        ("button_url", FieldValue::opt_text(card.button_url.as_deref())),
    ]
}

/// A borrowed field value, as seen by the validator.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    /// Text; empty or whitespace-only text counts as absent.
    Text(Option<&'a str>),
    /// A reference (image, page) that is either set or not.
    Present(bool),
    /// Nested list of structs.
    Items(Vec<Vec<(&'static str, FieldValue<'a>)>>),
}

impl<'a> FieldValue<'a> {
    pub fn text(s: &'a str) -> Self {
        FieldValue::Text(Some(s))
    }

    pub fn opt_text(s: Option<&'a str>) -> Self {
        FieldValue::Text(s)
    }

    pub fn page(page: Option<PageId>) -> Self {
        FieldValue::Present(page.is_some())
    }

    fn is_present(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_some_and(|s| !s.trim().is_empty()),
            FieldValue::Present(p) => *p,
            FieldValue::Items(items) => !items.is_empty(),
        }
    }
}

// ============================================================================
// Schemas
// ============================================================================

/// Primitive type of a schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Char { max_length: usize },
    Text,
    RichText { features: FeatureSet },
    Image,
    PageLink,
    Url,
    List { item: Vec<FieldSpec> },
}

/// One field of a block schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    /// A required field.
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    fn check(&self, path: &str, value: Option<&FieldValue<'_>>, issues: &mut Vec<FieldIssue>) {
        let present = value.is_some_and(FieldValue::is_present);
        if !present {
            if self.required {
                issues.push(FieldIssue::missing(path));
            }
            return;
        }
        match (&self.kind, value) {
            (FieldKind::Char { max_length }, Some(FieldValue::Text(Some(s)))) => {
                let actual = s.chars().count();
                if actual > *max_length {
                    issues.push(FieldIssue::new(
                        path,
                        FieldProblem::TooLong {
                            max: *max_length,
                            actual,
                        },
                    ));
                }
            }
            (FieldKind::Url, Some(FieldValue::Text(Some(s)))) => {
                if !is_link_target(s.trim()) {
                    issues.push(FieldIssue::new(
                        path,
                        FieldProblem::Invalid("enter a valid URL".into()),
                    ));
                }
            }
            (FieldKind::List { item }, Some(FieldValue::Items(rows))) => {
                for (i, row) in rows.iter().enumerate() {
                    check_fields(item, row, &format!("{path}[{i}]"), issues);
                }
            }
            _ => {}
        }
    }
}

/// Site-relative paths, or absolute `http`, `https` and `mailto` URLs.
pub fn is_link_target(value: &str) -> bool {
    if value.starts_with('/') && !value.starts_with("//") {
        return true;
    }
    url::Url::parse(value).is_ok_and(|u| matches!(u.scheme(), "http" | "https" | "mailto"))
}

/// Check `values` against `specs`, appending problems to `issues`.
///
/// Paths are `{prefix}.{field}`, or just `{field}` with an empty prefix.
pub fn check_fields(
    specs: &[FieldSpec],
    values: &[(&'static str, FieldValue<'_>)],
    prefix: &str,
    issues: &mut Vec<FieldIssue>,
) {
    for spec in specs {
        let value = values
            .iter()
            .find(|(name, _)| *name == spec.name)
            .map(|(_, v)| v);
        let path = if prefix.is_empty() {
            spec.name.to_string()
        } else {
            format!("{prefix}.{}", spec.name)
        };
        spec.check(&path, value, issues);
    }
}

/// Field schema of one block variant.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSchema {
    pub tag: &'static str,
    pub label: &'static str,
    pub fields: Vec<FieldSpec>,
}

impl BlockSchema {
    /// Stock schema for a variant.
    pub fn of(kind: BlockKind) -> BlockSchema {
        use FieldKind::*;
        let (label, fields) = match kind {
            BlockKind::TitleAndText => (
                "Title & Text",
                vec![
                    FieldSpec::new("title", Char { max_length: 100 }),
                    FieldSpec::new("text", Text),
                ],
            ),
            BlockKind::RichTextFull => (
                "Full RichText",
                vec![FieldSpec::new(
                    "value",
                    RichText {
                        features: FeatureSet::full(),
                    },
                )],
            ),
            BlockKind::RichTextSimple => (
                "Simple RichText",
                vec![FieldSpec::new(
                    "value",
                    RichText {
                        features: FeatureSet::simple(),
                    },
                )],
            ),
            BlockKind::Cards => (
                "Cards",
                vec![
                    FieldSpec::new("title", Char { max_length: 100 }),
                    FieldSpec::new(
                        "cards",
                        List {
                            item: vec![
                                FieldSpec::new("image", Image),
                                FieldSpec::new("title", Char { max_length: 40 }),
                                FieldSpec::new("text", Char { max_length: 200 }),
                                FieldSpec::new("button_page", PageLink).optional(),
                                FieldSpec::new("button_url", Url).optional(),
                            ],
                        },
                    ),
                ],
            ),
            BlockKind::Cta => (
                "Call to Action",
                vec![
                    FieldSpec::new("title", Char { max_length: 60 }),
                    FieldSpec::new(
                        "text",
                        RichText {
                            features: FeatureSet::inline(),
                        },
                    ),
                    FieldSpec::new("button_page", PageLink).optional(),
                    FieldSpec::new("button_url", Url).optional(),
                    FieldSpec::new("button_text", Char { max_length: 40 }),
                ],
            ),
            BlockKind::Button => (
                "Button",
                vec![
                    FieldSpec::new("button_page", PageLink).optional(),
                    FieldSpec::new("button_url", Url).optional(),
                ],
            ),
        };
        BlockSchema {
            tag: kind.tag(),
            label,
            fields,
        }
    }

    /// Feature set of the first rich-text field, if the block has one.
    pub fn rich_text_features(&self) -> Option<&FeatureSet> {
        self.fields.iter().find_map(|f| match &f.kind {
            FieldKind::RichText { features } => Some(features),
            _ => None,
        })
    }
}

/// Maps block tags to their schemas.
///
/// Each page type accepts its own subset (see [`BlockRegistry::for_page`]);
/// a tag outside the registry is a [`SchemaError`].
#[derive(Debug, Clone, Default)]
pub struct BlockRegistry {
    schemas: BTreeMap<&'static str, BlockSchema>,
    /// Set by [`BlockRegistry::for_page`]; known variants missing from a
    /// page registry are reported as [`SchemaError::NotAllowed`].
    page_type: Option<PageType>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every block variant.
    pub fn standard() -> Self {
        Self::with_kinds(&BlockKind::ALL)
    }

    pub fn with_kinds(kinds: &[BlockKind]) -> Self {
        let mut registry = Self::new();
        for kind in kinds {
            registry.register(BlockSchema::of(*kind));
        }
        registry
    }

    /// Blocks accepted by the body stream of a page type.
    ///
    /// Posts take everything except standalone buttons; flex pages take all
    /// six. Page types without a stream get an empty registry.
    pub fn for_page(page_type: PageType) -> Self {
        use BlockKind::*;
        let mut registry = match page_type {
            PageType::Flex => Self::standard(),
            t if t.is_post() => {
                Self::with_kinds(&[TitleAndText, RichTextFull, RichTextSimple, Cards, Cta])
            }
            _ => Self::new(),
        };
        registry.page_type = Some(page_type);
        registry
    }

    pub fn register(&mut self, schema: BlockSchema) {
        self.schemas.insert(schema.tag, schema);
    }

    pub fn schema(&self, tag: &str) -> Result<&BlockSchema, SchemaError> {
        if let Some(schema) = self.schemas.get(tag) {
            return Ok(schema);
        }
        match (self.page_type, BlockKind::from_tag(tag)) {
            (Some(page_type), Some(_)) => Err(SchemaError::NotAllowed {
                tag: tag.to_string(),
                page_type,
            }),
            _ => Err(SchemaError::UnknownBlockType(tag.to_string())),
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.schemas.contains_key(tag)
    }

    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.schemas.keys().copied()
    }

    /// Check a block's fields against its schema.
    ///
    /// `prefix` is prepended to every reported field path.
    pub fn validate_at(
        &self,
        block: &ContentBlock,
        prefix: &str,
    ) -> Result<Vec<FieldIssue>, SchemaError> {
        let schema = self.schema(block.tag())?;
        let mut issues = Vec::new();
        check_fields(&schema.fields, &block.fields(), prefix, &mut issues);
        Ok(issues)
    }

    /// Validate one block. Unknown tags are a schema error; field problems
    /// are reported together in one [`ValidationError`].
    pub fn validate(&self, block: &ContentBlock) -> Result<(), BlockError> {
        let issues = self.validate_at(block, "")?;
        ValidationError::check(issues)?;
        Ok(())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
