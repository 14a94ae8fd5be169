//! Listing pagination and per-page-type sub-routes.
//!
//! Two things live here:
//!
//! - **Listings.** [`list_children_of_type`] collects the live, public
//!   descendants of a listing page, sorts them, and returns one
//!   [`PageWindow`]. Unlike every other operation in the crate, paging never
//!   fails: an unparsable page number means page 1, and an out-of-range one
//!   is clamped to the first or last page.
//! - **Routing.** A [`RoutingTable`] maps each page type to path patterns
//!   and handler functions. [`RoutingTable::resolve`] walks live pages by
//!   slug from the home page, then matches whatever path is left against
//!   the routes of the page it stopped at.
//!
//! ```text
//! /blog/                       → listing, page 1
//! /blog/?page=3                → listing, page 3 (or the last page)
//! /blog/latest/                → the most recent posts
//! /blog/subscribe/             → subscription endpoint
//! /blog/category/rust/         → listing filtered to one category
//! /blog/my-first-post/         → the post itself
//! ```

use crate::config::ListingConfig;
use crate::snippets::SnippetStore;
use crate::tree::{PageNode, SiteTree};
use crate::types::{CategoryId, PageId, PageType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("No page found at `{0}`")]
    NotFound(String),
    #[error("Listing page {0} does not exist")]
    UnknownListing(PageId),
}

// ============================================================================
// Pagination
// ============================================================================

/// One page of a paginated list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageWindow<T> {
    pub items: Vec<T>,
    /// 1-based page number actually served.
    pub number: usize,
    pub num_pages: usize,
    /// Total items across all pages.
    pub count: usize,
    pub page_size: usize,
    /// The requested page was out of range and was replaced by `number`.
    pub clamped: bool,
}

impl<T> PageWindow<T> {
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    /// 1-based index of the first item on this page, 0 when empty.
    pub fn start_index(&self) -> usize {
        if self.items.is_empty() {
            0
        } else {
            (self.number - 1) * self.page_size + 1
        }
    }

    pub fn end_index(&self) -> usize {
        if self.items.is_empty() {
            0
        } else {
            self.start_index() + self.items.len() - 1
        }
    }
}

/// Read a `?page=` query value. Missing or unparsable values mean page 1.
pub fn parse_page_param(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .unwrap_or(1)
}

/// Cut `items` into pages of `page_size` and return page `requested`.
///
/// An empty list has exactly one (empty) page. Page numbers below 1 give
/// the first page and numbers past the end give the last.
pub fn paginate<T: Clone>(items: &[T], page_size: usize, requested: usize) -> PageWindow<T> {
    let page_size = page_size.max(1);
    let count = items.len();
    let num_pages = count.div_ceil(page_size).max(1);
    let number = requested.clamp(1, num_pages);
    let clamped = number != requested;
    if clamped {
        tracing::debug!(requested, served = number, num_pages, "page number out of range, clamped");
    }
    let start = (number - 1) * page_size;
    let end = (start + page_size).min(count);
    PageWindow {
        items: items.get(start..end).map(<[T]>::to_vec).unwrap_or_default(),
        number,
        num_pages,
        count,
        page_size,
        clamped,
    }
}

// ============================================================================
// Listings
// ============================================================================

/// Sort key for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingOrder {
    /// Most recently published first; ties broken by id.
    #[default]
    Newest,
    /// Creation order.
    Id,
}

impl fmt::Display for ListingOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ListingOrder::Newest => "newest",
            ListingOrder::Id => "id",
        })
    }
}

/// Which descendants a listing shows.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFilter {
    pub types: Vec<PageType>,
    pub order: ListingOrder,
    pub category: Option<CategoryId>,
}

impl ListingFilter {
    /// Every post type, in `order`.
    pub fn posts(order: ListingOrder) -> Self {
        Self {
            types: PageType::POSTS.to_vec(),
            order,
            category: None,
        }
    }

    pub fn in_category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    fn accepts(&self, node: &PageNode) -> bool {
        node.is_live()
            && !node.restricted
            && self.types.contains(&node.page_type())
            && self.category.is_none_or(|c| {
                node.payload
                    .post()
                    .is_some_and(|post| post.categories.contains(&c))
            })
    }
}

/// Matching descendants of `listing`, sorted but not paginated.
pub fn children_of_type(
    tree: &SiteTree,
    listing: PageId,
    filter: &ListingFilter,
) -> Result<Vec<PageId>, RouteError> {
    tree.get(listing).ok_or(RouteError::UnknownListing(listing))?;
    let mut nodes: Vec<&PageNode> = tree
        .descendants(listing)
        .into_iter()
        .filter_map(|id| tree.get(id))
        .filter(|n| filter.accepts(n))
        .collect();
    match filter.order {
        ListingOrder::Newest => nodes.sort_by(|a, b| {
            b.last_published_at
                .cmp(&a.last_published_at)
                .then(a.id.cmp(&b.id))
        }),
        ListingOrder::Id => nodes.sort_by_key(|n| n.id),
    }
    Ok(nodes.into_iter().map(|n| n.id).collect())
}

/// One page of the live, public descendants of `listing` that pass `filter`.
pub fn list_children_of_type(
    tree: &SiteTree,
    listing: PageId,
    filter: &ListingFilter,
    page_size: usize,
    page: usize,
) -> Result<PageWindow<PageId>, RouteError> {
    let ids = children_of_type(tree, listing, filter)?;
    Ok(paginate(&ids, page_size, page))
}

// ============================================================================
// Routing table
// ============================================================================

/// What a resolved path should render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteResponse {
    Page {
        page: PageId,
    },
    Listing {
        page: PageId,
        category: Option<CategoryId>,
        window: PageWindow<PageId>,
    },
    Latest {
        page: PageId,
        posts: Vec<PageId>,
    },
    Subscribe {
        page: PageId,
    },
}

/// Everything a route handler may look at.
pub struct RouteContext<'a> {
    pub tree: &'a SiteTree,
    pub snippets: &'a SnippetStore,
    pub listing: &'a ListingConfig,
    pub page: &'a PageNode,
    /// Values captured by `<name>` segments, by name.
    pub params: BTreeMap<&'static str, String>,
    pub page_param: Option<&'a str>,
}

pub type Handler = fn(&RouteContext<'_>) -> Result<RouteResponse, RouteError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Literal(&'static str),
    Param(&'static str),
}

/// One sub-path pattern of a page type.
#[derive(Clone)]
pub struct Route {
    pub name: &'static str,
    pub pattern: &'static str,
    segments: Vec<Segment>,
    handler: Handler,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("pattern", &self.pattern)
            .finish()
    }
}

impl Route {
    /// `pattern` is slash-separated; `<name>` segments capture one path
    /// segment. The empty pattern matches the page itself.
    pub fn new(name: &'static str, pattern: &'static str, handler: Handler) -> Self {
        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
                Some(param) => Segment::Param(param),
                None => Segment::Literal(s),
            })
            .collect();
        Self {
            name,
            pattern,
            segments,
            handler,
        }
    }

    fn matches(&self, rest: &[&str]) -> Option<BTreeMap<&'static str, String>> {
        if rest.len() != self.segments.len() {
            return None;
        }
        let mut params = BTreeMap::new();
        for (segment, part) in self.segments.iter().zip(rest) {
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => {
                    params.insert(*name, part.to_string());
                }
            }
        }
        Some(params)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: BTreeMap<PageType, Vec<Route>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every page type serves itself; blog listings add `latest`,
    /// `subscribe`, and `category/<slug>`.
    pub fn standard() -> Self {
        let mut table = Self::new();
        for page_type in PageType::ALL {
            if page_type != PageType::BlogListing {
                table.add(page_type, Route::new("page", "", serve_page));
            }
        }
        table.add(PageType::BlogListing, Route::new("listing", "", serve_listing));
        table.add(PageType::BlogListing, Route::new("latest", "latest", serve_latest));
        table.add(
            PageType::BlogListing,
            Route::new("subscribe", "subscribe", serve_subscribe),
        );
        table.add(
            PageType::BlogListing,
            Route::new("category", "category/<slug>", serve_category),
        );
        table
    }

    pub fn add(&mut self, page_type: PageType, route: Route) {
        self.routes.entry(page_type).or_default().push(route);
    }

    pub fn routes_for(&self, page_type: PageType) -> &[Route] {
        self.routes
            .get(&page_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Resolve a request path such as `/blog/category/rust/`.
    ///
    /// Child pages take precedence over sub-routes with the same name.
    pub fn resolve(
        &self,
        tree: &SiteTree,
        snippets: &SnippetStore,
        listing: &ListingConfig,
        path: &str,
        page_param: Option<&str>,
    ) -> Result<RouteResponse, RouteError> {
        let not_found = || RouteError::NotFound(path.to_string());
        let mut page = tree.home().filter(|h| h.is_live()).ok_or_else(not_found)?;
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let mut consumed = 0;
        for part in &parts {
            match tree
                .find_child_by_slug(Some(page.id), part)
                .filter(|c| c.is_live())
            {
                Some(child) => {
                    page = child;
                    consumed += 1;
                }
                None => break,
            }
        }
        let rest = &parts[consumed..];

        for route in self.routes_for(page.page_type()) {
            if let Some(params) = route.matches(rest) {
                tracing::debug!(path, page = %page.id, route = route.name, "route matched");
                let ctx = RouteContext {
                    tree,
                    snippets,
                    listing,
                    page,
                    params,
                    page_param,
                };
                return (route.handler)(&ctx);
            }
        }
        Err(not_found())
    }
}

fn serve_page(ctx: &RouteContext<'_>) -> Result<RouteResponse, RouteError> {
    Ok(RouteResponse::Page { page: ctx.page.id })
}

fn serve_listing(ctx: &RouteContext<'_>) -> Result<RouteResponse, RouteError> {
    listing_response(ctx, ListingFilter::posts(ctx.listing.order))
}

fn serve_latest(ctx: &RouteContext<'_>) -> Result<RouteResponse, RouteError> {
    let mut posts = children_of_type(ctx.tree, ctx.page.id, &ListingFilter::posts(ListingOrder::Newest))?;
    posts.truncate(ctx.listing.latest_count);
    Ok(RouteResponse::Latest {
        page: ctx.page.id,
        posts,
    })
}

fn serve_subscribe(ctx: &RouteContext<'_>) -> Result<RouteResponse, RouteError> {
    Ok(RouteResponse::Subscribe { page: ctx.page.id })
}

fn serve_category(ctx: &RouteContext<'_>) -> Result<RouteResponse, RouteError> {
    let slug = ctx.params.get("slug").map(String::as_str).unwrap_or_default();
    let (category, _) = ctx
        .snippets
        .category_by_slug(slug)
        .ok_or_else(|| RouteError::NotFound(format!("category/{slug}")))?;
    listing_response(ctx, ListingFilter::posts(ctx.listing.order).in_category(category))
}

fn listing_response(
    ctx: &RouteContext<'_>,
    filter: ListingFilter,
) -> Result<RouteResponse, RouteError> {
    let window = list_children_of_type(
        ctx.tree,
        ctx.page.id,
        &filter,
        ctx.listing.page_size,
        parse_page_param(ctx.page_param),
    )?;
    Ok(RouteResponse::Listing {
        page: ctx.page.id,
        category: filter.category,
        window,
    })
}
