//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every page is shown by its semantic identity first: positional index
//! among its siblings, then title, with page type and state in brackets.
//! The URL path and flags follow as indented context lines, so the output
//! reads as a content inventory.
//!
//! # Output Format
//!
//! ## Tree
//!
//! ```text
//! Pages
//! 001 Home [home, live]
//!     Path: /
//!     001 Blog [blog_listing, live]
//!         Path: /blog/
//!         001 First Post [blog_detail, live]
//!             Path: /blog/first-post/
//!         004 Draft Post [blog_detail, draft]
//!             Path: /blog/draft-post/
//!         005 Private Post [blog_detail, live]
//!             Path: /blog/private-post/
//!             Restricted
//! ```
//!
//! ## Check
//!
//! ```text
//! Pages
//!     First Post (/blog/first-post/)
//!         `authors` needs at least 1 item(s), has 0
//! Broken links
//!     About (/about/) → page#42
//!
//! 2 problems
//! ```
//!
//! ## Resolve
//!
//! ```text
//! Listing: The Blog (/blog/)
//! Page 1 of 2 (4 posts)
//!     001 Video Post → /blog/video-post/
//!         Some words about the video
//! Next: ?page=2
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::cache::CacheStats;
use crate::routing::RouteResponse;
use crate::site::CheckReport;
use crate::snippets::SnippetStore;
use crate::tree::{PageNode, SiteTree};
use crate::types::{CategoryId, PageId};

// ============================================================================
// Shared entity display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Format a page header: positional index, title, type and state.
///
/// ```text
/// 001 First Post [blog_detail, live]
/// ```
fn page_header(index: usize, node: &PageNode) -> String {
    format!(
        "{} {} [{}, {}]",
        format_index(index),
        node.title,
        node.page_type(),
        node.state
    )
}

/// Title plus URL path, or the bare id when the page is gone.
fn page_label(tree: &SiteTree, id: PageId) -> String {
    match (tree.get(id), tree.url_path(id)) {
        (Some(node), Some(path)) => format!("{} ({})", node.display_title(), path),
        _ => id.to_string(),
    }
}

/// Strip HTML tags from a string (simple angle-bracket stripping).
fn strip_html_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }
    result
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{} {}", n, one)
    } else {
        format!("{} {}", n, many)
    }
}

// ============================================================================
// Tree
// ============================================================================

/// Format the whole page tree, children indented under their parent.
pub fn format_tree(tree: &SiteTree) -> Vec<String> {
    let mut lines = vec!["Pages".to_string()];
    if tree.is_empty() {
        lines.push("    (empty)".to_string());
        return lines;
    }
    format_children(tree, None, 0, &mut lines);
    lines
}

fn format_children(tree: &SiteTree, parent: Option<PageId>, depth: usize, lines: &mut Vec<String>) {
    for (i, node) in tree.children(parent).enumerate() {
        let base = indent(depth);
        lines.push(format!("{}{}", base, page_header(i + 1, node)));
        if let Some(path) = tree.url_path(node.id) {
            lines.push(format!("{}    Path: {}", base, path));
        }
        if node.restricted {
            lines.push(format!("{}    Restricted", base));
        }
        format_children(tree, Some(node.id), depth + 1, lines);
    }
}

pub fn print_tree(tree: &SiteTree) {
    for line in format_tree(tree) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format a [`CheckReport`], grouped by problem kind.
pub fn format_check(report: &CheckReport, tree: &SiteTree) -> Vec<String> {
    if report.is_clean() {
        return vec!["No problems found".to_string()];
    }
    let mut lines = Vec::new();
    let mut problems = 0;

    if !report.pages.is_empty() {
        lines.push("Pages".to_string());
        for (page, err) in &report.pages {
            lines.push(format!("    {}", page_label(tree, *page)));
            lines.push(format!("        {}", err));
            problems += 1;
        }
    }

    if !report.broken_links.is_empty() {
        lines.push("Broken links".to_string());
        for (page, target) in &report.broken_links {
            lines.push(format!("    {} → {}", page_label(tree, *page), target));
            problems += 1;
        }
    }

    if let Some(err) = &report.settings {
        lines.push("Settings".to_string());
        lines.push(format!("    {}", err));
        problems += 1;
    }

    lines.push(String::new());
    lines.push(plural(problems, "problem", "problems"));
    lines
}

pub fn print_check(report: &CheckReport, tree: &SiteTree) {
    for line in format_check(report, tree) {
        println!("{}", line);
    }
}

// ============================================================================
// Resolve
// ============================================================================

/// Format what a URL resolved to.
pub fn format_resolve(
    response: &RouteResponse,
    tree: &SiteTree,
    snippets: &SnippetStore,
) -> Vec<String> {
    let mut lines = Vec::new();
    match response {
        RouteResponse::Page { page } => {
            lines.push(format!("Page: {}", page_label(tree, *page)));
            if let Some(node) = tree.get(*page) {
                lines.push(format!("    Type: {}", node.page_type()));
            }
        }
        RouteResponse::Listing {
            page,
            category,
            window,
        } => {
            lines.push(format!("Listing: {}", page_label(tree, *page)));
            if let Some(name) = category_name(snippets, *category) {
                lines.push(format!("Category: {}", name));
            }
            lines.push(format!(
                "Page {} of {} ({})",
                window.number,
                window.num_pages,
                plural(window.count, "post", "posts")
            ));
            if window.clamped {
                lines.push("    (requested page was out of range)".to_string());
            }
            for (i, id) in window.items.iter().enumerate() {
                post_lines(tree, window.start_index() + i, *id, &mut lines);
            }
            if window.has_previous() {
                lines.push(format!("Previous: ?page={}", window.number - 1));
            }
            if window.has_next() {
                lines.push(format!("Next: ?page={}", window.number + 1));
            }
        }
        RouteResponse::Latest { page, posts } => {
            lines.push(format!("Latest posts: {}", page_label(tree, *page)));
            for (i, id) in posts.iter().enumerate() {
                post_lines(tree, i + 1, *id, &mut lines);
            }
        }
        RouteResponse::Subscribe { page } => {
            lines.push(format!("Subscribe form: {}", page_label(tree, *page)));
        }
    }
    lines
}

fn category_name(snippets: &SnippetStore, category: Option<CategoryId>) -> Option<&str> {
    category
        .and_then(|c| snippets.categories.get(c))
        .map(|c| c.name.as_str())
}

/// A listed post: index, title, path, and a one-line summary preview.
fn post_lines(tree: &SiteTree, index: usize, id: PageId, lines: &mut Vec<String>) {
    let Some(node) = tree.get(id) else {
        lines.push(format!("    {} {}", format_index(index), id));
        return;
    };
    let path = tree.url_path(id).unwrap_or_default();
    lines.push(format!(
        "    {} {} → {}",
        format_index(index),
        node.display_title(),
        path
    ));
    if let Some(post) = node.payload.post() {
        let plain = strip_html_tags(&post.summary);
        let preview = truncate_desc(plain.trim(), 60);
        if !preview.is_empty() {
            lines.push(format!("        {}", preview));
        }
    }
}

pub fn print_resolve(response: &RouteResponse, tree: &SiteTree, snippets: &SnippetStore) {
    for line in format_resolve(response, tree, snippets) {
        println!("{}", line);
    }
}

// ============================================================================
// Render cache
// ============================================================================

pub fn format_cache_stats(stats: &CacheStats) -> String {
    format!("Render cache: {}", stats)
}

// ============================================================================
// Tests
// ============================================================================
