//! Centralized slug handling.
//!
//! Pages, categories, menus, and form fields all derive URL-safe names from
//! human titles. This module keeps those rules in one place:
//!
//! - `"My First Post"` → `my-first-post` (page slug)
//! - `"Main Menu"` twice → `main-menu`, `main-menu-2` (unique snippet slug)
//! - `"Your E-mail Address"` → `your_e_mail_address` (form field clean name)
//!
//! Transliteration of non-ASCII text is delegated to the `slug` crate.

/// Longest slug a page or snippet may carry.
pub const MAX_SLUG_LENGTH: usize = 255;

/// Derive a slug from a display title.
pub fn slugify(title: &str) -> String {
    slug::slugify(title)
}

/// Why a slug was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugProblem {
    Empty,
    TooLong(usize),
    InvalidChar(char),
}

impl std::fmt::Display for SlugProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlugProblem::Empty => f.write_str("slug is empty"),
            SlugProblem::TooLong(len) => {
                write!(f, "slug is {len} characters (max {MAX_SLUG_LENGTH})")
            }
            SlugProblem::InvalidChar(c) => write!(f, "slug contains '{c}'"),
        }
    }
}

/// Check that a slug only uses letters, digits, hyphens, and underscores.
pub fn check_slug(slug: &str) -> Result<(), SlugProblem> {
    if slug.is_empty() {
        return Err(SlugProblem::Empty);
    }
    let len = slug.chars().count();
    if len > MAX_SLUG_LENGTH {
        return Err(SlugProblem::TooLong(len));
    }
    match slug
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        Some(c) => Err(SlugProblem::InvalidChar(c)),
        None => Ok(()),
    }
}

/// Pick `base`, or the first of `base-2`, `base-3`, … not already taken.
///
/// An empty base (a title with no sluggable characters) falls back to `item`.
pub fn unique_slug(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    let base = if base.is_empty() { "item" } else { base };
    if !is_taken(base) {
        return base.to_string();
    }
    (2u32..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Field name used as the key of submitted form data.
///
/// Labels are slugified and hyphens become underscores, so the name is a
/// valid identifier for templates and exports.
pub fn clean_field_name(label: &str) -> String {
    slugify(label).replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("My First Post"), "my-first-post");
    }

    #[test]
    fn slugify_strips_punctuation() {
        assert_eq!(slugify("Hello, World!"), "hello-world");
    }

    #[test]
    fn slugify_transliterates() {
        assert_eq!(slugify("Café Déjà Vu"), "cafe-deja-vu");
    }

    #[test]
    fn check_slug_accepts_hyphens_and_underscores() {
        assert_eq!(check_slug("blog_2019-posts"), Ok(()));
    }

    #[test]
    fn check_slug_rejects_empty() {
        assert_eq!(check_slug(""), Err(SlugProblem::Empty));
    }

    #[test]
    fn check_slug_rejects_slash() {
        assert_eq!(check_slug("a/b"), Err(SlugProblem::InvalidChar('/')));
    }

    #[test]
    fn check_slug_rejects_overlong() {
        let long = "a".repeat(MAX_SLUG_LENGTH + 1);
        assert_eq!(
            check_slug(&long),
            Err(SlugProblem::TooLong(MAX_SLUG_LENGTH + 1))
        );
    }

    #[test]
    fn unique_slug_returns_base_when_free() {
        assert_eq!(unique_slug("main-menu", |_| false), "main-menu");
    }

    #[test]
    fn unique_slug_appends_counter() {
        let taken = ["main-menu", "main-menu-2"];
        assert_eq!(
            unique_slug("main-menu", |s| taken.contains(&s)),
            "main-menu-3"
        );
    }

    #[test]
    fn unique_slug_empty_base_falls_back() {
        assert_eq!(unique_slug("", |_| false), "item");
    }

    #[test]
    fn clean_field_name_uses_underscores() {
        assert_eq!(clean_field_name("Your E-mail Address"), "your_e_mail_address");
    }
}
