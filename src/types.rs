//! Shared identifier types used across the tree, snippets, and stores.
//!
//! Every entity is addressed by an opaque integer newtype. They serialize as
//! bare numbers so stored documents stay readable, and they are totally
//! ordered so listings can fall back to id order.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                $name(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> u64 {
                id.0
            }
        }
    };
}

id_type!(
    /// A node in the site tree.
    PageId,
    "page"
);
id_type!(
    /// An image held by the external media library.
    ImageRef,
    "image"
);
id_type!(AuthorId, "author");
id_type!(CategoryId, "category");
id_type!(MenuId, "menu");
id_type!(SubscriberId, "subscriber");

/// Closed set of page kinds the tree can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Home,
    BlogListing,
    BlogDetail,
    Article,
    Video,
    Flex,
    Contact,
}

impl PageType {
    pub const ALL: [PageType; 7] = [
        PageType::Home,
        PageType::BlogListing,
        PageType::BlogDetail,
        PageType::Article,
        PageType::Video,
        PageType::Flex,
        PageType::Contact,
    ];

    /// Post-like pages shown by a blog listing.
    pub const POSTS: [PageType; 3] = [PageType::BlogDetail, PageType::Article, PageType::Video];

    pub fn as_str(self) -> &'static str {
        match self {
            PageType::Home => "home",
            PageType::BlogListing => "blog_listing",
            PageType::BlogDetail => "blog_detail",
            PageType::Article => "article",
            PageType::Video => "video",
            PageType::Flex => "flex",
            PageType::Contact => "contact",
        }
    }

    pub fn is_post(self) -> bool {
        Self::POSTS.contains(&self)
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
