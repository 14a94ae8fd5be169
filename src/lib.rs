//! # pagetree
//!
//! A content tree for a small editorial site: typed pages arranged in a
//! hierarchy, page bodies composed from validated content blocks, reusable
//! snippets (authors, categories, menus), and URL routing with paginated
//! blog listings.
//!
//! # Architecture: Tree, Facade, Surfaces
//!
//! ```text
//! store (JSON document)  →  Site facade  →  routing  →  render (HTML)
//!                               │
//!                               └──▶ events  →  render cache, log sinks
//! ```
//!
//! The data model ([`tree`], [`pages`], [`blocks`], [`stream`], [`snippets`])
//! is plain owned data with no I/O. [`site::Site`] is the single writer: it
//! applies each edit to a copy, persists it through a [`store::PageStore`],
//! swaps the copy in, and publishes a [`events::ContentEvent`]. Routing and
//! rendering only ever read.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | Opaque id newtypes (`PageId`, `AuthorId`, ...) and the closed `PageType` set |
//! | [`naming`] | Slug generation and form-field clean names |
//! | [`richtext`] | Rich-text feature sets and the allow-list sanitizer |
//! | [`ordering`] | Ordered child collections, permutations, cardinality limits |
//! | [`blocks`] | Content block variants and their field schemas |
//! | [`stream`] | Ordered block sequences with a tagged JSON wire format |
//! | [`pages`] | Typed page payloads and publish-time validation |
//! | [`forms`] | Contact form fields, submission cleaning, notification email |
//! | [`tree`] | The page hierarchy: create, move, reorder, publish, delete |
//! | [`snippets`] | Authors, categories, menus, subscribers |
//! | [`settings`] | Site-wide social links |
//! | [`events`] | Change notifications and sinks |
//! | [`routing`] | URL resolution, listing sub-routes, pagination |
//! | [`media`] | Image rendition URLs |
//! | [`render`] | HTML rendering with Maud |
//! | [`cache`] | Content-addressed cache of rendered pages |
//! | [`store`] | Persistence: in-memory and JSON document stores |
//! | [`site`] | The facade that owns and writes everything above |
//! | [`config`] | `site.toml` loading, stock defaults, validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Ids, Not References
//!
//! Pages refer to their parent, children, authors and categories by id.
//! The tree owns the nodes; everything else holds ids and looks them up.
//! Moving a subtree is an edit to two id lists, and a whole site is plain
//! data that serializes without cycles.
//!
//! ## Closed Block and Page Sets
//!
//! Block variants and page types are Rust enums rather than a runtime
//! plugin registry. A stored document with an unknown tag fails to decode
//! and reports where; a new block type is a compile-time change that the
//! exhaustive matches in rendering and validation point at.
//!
//! ## Validate at Publish, Not at Save
//!
//! Drafts may hold half-filled blocks and empty author lists. Required
//! fields, length limits and collection cardinality are checked when a
//! page is published, and again by `check` for pages already live.
//!
//! ## Maud Over Template Engines
//!
//! HTML is generated with [Maud](https://maud.lambda.xyz/), so malformed
//! markup is a build error and every interpolation is escaped. Rich text
//! is the one exception: it passes through the [`richtext`] sanitizer and
//! is emitted as `PreEscaped`.

pub mod blocks;
pub mod cache;
pub mod config;
pub mod events;
pub mod forms;
pub mod logging;
pub mod media;
pub mod naming;
pub mod ordering;
pub mod output;
pub mod pages;
pub mod render;
pub mod richtext;
pub mod routing;
pub mod settings;
pub mod site;
pub mod snippets;
pub mod store;
pub mod stream;
pub mod tree;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
