//! Content change notifications.
//!
//! Every successful write on the site emits a [`ContentEvent`] to each
//! registered [`EventSink`]. Sinks are how rendered-fragment caches, search
//! indexers, and similar collaborators learn that something changed; the
//! core never calls them for failed writes.

use crate::types::{MenuId, PageId};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ContentEvent {
    Created { page: PageId },
    /// The page's body stream or other payload fields were edited.
    StreamUpdated { page: PageId },
    Published { page: PageId, at: DateTime<Utc> },
    Unpublished { page: PageId },
    /// Removed pages, the deleted page first.
    Deleted { pages: Vec<PageId> },
    Moved {
        page: PageId,
        from: Option<PageId>,
        to: Option<PageId>,
    },
    /// A parent's children were reordered (`None` for top-level pages).
    Reordered { parent: Option<PageId> },
    MenuChanged { menu: MenuId },
    /// Authors, categories, or social settings changed; may affect any page.
    SnippetsChanged,
}

impl ContentEvent {
    /// Pages whose rendering this event directly invalidates.
    pub fn pages(&self) -> Vec<PageId> {
        match self {
            ContentEvent::Created { page }
            | ContentEvent::StreamUpdated { page }
            | ContentEvent::Published { page, .. }
            | ContentEvent::Unpublished { page }
            | ContentEvent::Moved { page, .. } => vec![*page],
            ContentEvent::Deleted { pages } => pages.clone(),
            ContentEvent::Reordered { parent } => parent.iter().copied().collect(),
            ContentEvent::MenuChanged { .. } | ContentEvent::SnippetsChanged => Vec::new(),
        }
    }

    /// The event may change output beyond the pages it names (menus,
    /// listings, footers).
    pub fn is_site_wide(&self) -> bool {
        !matches!(self, ContentEvent::StreamUpdated { .. })
    }
}

/// Receives content events.
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &ContentEvent);
}

/// Sink that logs every event at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn notify(&self, event: &ContentEvent) {
        tracing::debug!(?event, "content event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_named_by_event() {
        let deleted = ContentEvent::Deleted {
            pages: vec![PageId(2), PageId(3)],
        };
        assert_eq!(deleted.pages(), vec![PageId(2), PageId(3)]);
        assert!(ContentEvent::SnippetsChanged.pages().is_empty());
    }

    #[test]
    fn only_stream_edits_are_local() {
        assert!(!ContentEvent::StreamUpdated { page: PageId(1) }.is_site_wide());
        assert!(ContentEvent::Unpublished { page: PageId(1) }.is_site_wide());
    }

    #[test]
    fn serializes_with_event_tag() {
        let json = serde_json::to_value(ContentEvent::Unpublished { page: PageId(4) }).unwrap();
        assert_eq!(json, serde_json::json!({"event": "unpublished", "page": 4}));
    }
}
