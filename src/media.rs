//! Image rendition URLs.
//!
//! Pages store images as opaque [`ImageRef`]s; the media library that owns
//! the files is an external collaborator. Renderers ask a [`MediaResolver`]
//! for the URL of a rendition spec such as `fill-800x400` or `width-1200`.

use crate::types::ImageRef;

/// Rendition specs used by the built-in templates.
pub mod specs {
    pub const BANNER: &str = "fill-1920x800";
    pub const CAROUSEL: &str = "fill-1200x600";
    pub const CARD: &str = "fill-400x300";
    pub const POST_THUMB: &str = "fill-600x400";
    pub const POST_HERO: &str = "width-1200";
    pub const MENU: &str = "fill-200x200";
    pub const AUTHOR: &str = "fill-80x80";
}

pub trait MediaResolver: Send + Sync {
    fn rendition_url(&self, image: ImageRef, spec: &str) -> String;
}

/// Builds `{base}/{id}/{spec}/` URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMediaResolver {
    base: String,
}

impl PrefixMediaResolver {
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for PrefixMediaResolver {
    fn default() -> Self {
        Self::new("/media")
    }
}

impl MediaResolver for PrefixMediaResolver {
    fn rendition_url(&self, image: ImageRef, spec: &str) -> String {
        format!("{}/{}/{}/", self.base, image.0, spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_prefixed_url() {
        let media = PrefixMediaResolver::new("https://cdn.example.com/media/");
        assert_eq!(
            media.rendition_url(ImageRef(42), specs::CARD),
            "https://cdn.example.com/media/42/fill-400x300/"
        );
    }

    #[test]
    fn default_base() {
        assert_eq!(
            PrefixMediaResolver::default().rendition_url(ImageRef(1), "width-1200"),
            "/media/1/width-1200/"
        );
    }
}
