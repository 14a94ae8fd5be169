//! Rich-text feature sets and the sanitizer seam.
//!
//! Stored rich text is raw markup written by editors. Before it reaches a
//! page it goes through a [`RichTextSanitizer`], restricted to the feature
//! set of the field it came from: a simple rich-text block only keeps bold,
//! italic, and links, while the full block also keeps headings, lists,
//! code, and centered text.
//!
//! [`AllowListSanitizer`] is the built-in implementation. It drops every tag
//! the feature set does not allow (keeping the text inside), strips
//! attributes except a link's `href` and the center-align class, and refuses
//! script URLs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A formatting capability an editor may use in a rich-text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RichTextFeature {
    Bold,
    Italic,
    H2,
    H3,
    H4,
    Ol,
    Ul,
    Hr,
    Link,
    Code,
    Center,
}

/// The features enabled for one rich-text field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(BTreeSet<RichTextFeature>);

impl FeatureSet {
    pub fn new(features: &[RichTextFeature]) -> Self {
        Self(features.iter().copied().collect())
    }

    /// Everything, including the site-wide `code` and `center` extensions.
    pub fn full() -> Self {
        use RichTextFeature::*;
        Self::new(&[Bold, Italic, H2, H3, H4, Ol, Ul, Hr, Link, Code, Center])
    }

    /// Bold, italic, and links.
    pub fn simple() -> Self {
        use RichTextFeature::*;
        Self::new(&[Bold, Italic, Link])
    }

    /// Bold and italic only (banner subtitles, call-to-action text).
    pub fn inline() -> Self {
        use RichTextFeature::*;
        Self::new(&[Bold, Italic])
    }

    pub fn allows(&self, feature: RichTextFeature) -> bool {
        self.0.contains(&feature)
    }

    pub fn iter(&self) -> impl Iterator<Item = RichTextFeature> + '_ {
        self.0.iter().copied()
    }
}

/// Turns raw stored markup into HTML that is safe to embed in a page.
pub trait RichTextSanitizer: Send + Sync {
    fn sanitize(&self, raw: &str, features: &FeatureSet) -> String;
}

/// Tag allow-list sanitizer driven by a [`FeatureSet`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowListSanitizer;

const CENTER_CLASS: &str = "center-align";

impl RichTextSanitizer for AllowListSanitizer {
    fn sanitize(&self, raw: &str, features: &FeatureSet) -> String {
        let mut out = String::with_capacity(raw.len());
        // One entry per open <div>: whether its closing tag is kept.
        let mut divs: Vec<bool> = Vec::new();
        let mut rest = raw;

        while let Some(start) = rest.find('<') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            match tail.find('>') {
                Some(end) => {
                    if let Some(tag) = filter_tag(&tail[1..end], features, &mut divs) {
                        out.push_str(&tag);
                    }
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push_str("&lt;");
                    rest = &tail[1..];
                }
            }
        }
        out.push_str(rest);
        out
    }
}

fn filter_tag(inner: &str, features: &FeatureSet, divs: &mut Vec<bool>) -> Option<String> {
    use RichTextFeature::*;

    let inner = inner.trim();
    if inner.starts_with('!') || inner.starts_with('?') {
        return None;
    }
    let closing = inner.starts_with('/');
    let body = inner.trim_start_matches('/');
    let name: String = body
        .split(|c: char| c.is_whitespace())
        .next()
        .unwrap_or_default()
        .trim_end_matches('/')
        .to_ascii_lowercase();

    let allowed = match name.as_str() {
        "p" | "br" => true,
        "b" | "strong" => features.allows(Bold),
        "i" | "em" => features.allows(Italic),
        "h2" => features.allows(H2),
        "h3" => features.allows(H3),
        "h4" => features.allows(H4),
        "ol" => features.allows(Ol),
        "ul" => features.allows(Ul),
        "li" => features.allows(Ol) || features.allows(Ul),
        "hr" => features.allows(Hr),
        "code" => features.allows(Code),
        "a" => features.allows(Link),
        "div" => {
            if closing {
                return divs.pop().unwrap_or(false).then(|| "</div>".to_string());
            }
            let centered = features.allows(Center)
                && attr(body, "class")
                    .is_some_and(|class| class.split_whitespace().any(|c| c == CENTER_CLASS));
            divs.push(centered);
            return centered.then(|| format!("<div class=\"{CENTER_CLASS}\">"));
        }
        _ => false,
    };

    if !allowed {
        return None;
    }
    if closing {
        return match name.as_str() {
            "br" | "hr" => None,
            _ => Some(format!("</{name}>")),
        };
    }
    if name == "a" {
        return Some(match attr(body, "href").filter(|href| is_safe_href(href)) {
            Some(href) => format!("<a href=\"{}\">", escape_attr(&href)),
            None => "<a>".to_string(),
        });
    }
    Some(format!("<{name}>"))
}

/// Read one attribute value from the inside of a tag.
fn attr(body: &str, key: &str) -> Option<String> {
    let mut rest = body.split_once(|c: char| c.is_whitespace())?.1;
    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }
        let name_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        rest = rest[name_end..].trim_start();
        let value = if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            let (value, remaining) = match after_eq.chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    let closing = after_eq[1..].find(quote).map(|i| i + 1);
                    match closing {
                        Some(end) => (&after_eq[1..end], &after_eq[end + 1..]),
                        None => (&after_eq[1..], ""),
                    }
                }
                _ => {
                    let end = after_eq
                        .find(char::is_whitespace)
                        .unwrap_or(after_eq.len());
                    (&after_eq[..end], &after_eq[end..])
                }
            };
            rest = remaining;
            Some(value)
        } else {
            None
        };
        if name.eq_ignore_ascii_case(key) {
            return Some(value.unwrap_or_default().to_string());
        }
    }
}

fn is_safe_href(href: &str) -> bool {
    let lowered: String = href
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    !(lowered.starts_with("javascript:")
        || lowered.starts_with("data:")
        || lowered.starts_with("vbscript:"))
}

fn escape_attr(value: &str) -> String {
    value.replace('"', "&quot;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(raw: &str, features: FeatureSet) -> String {
        AllowListSanitizer.sanitize(raw, &features)
    }

    #[test]
    fn simple_keeps_bold_italic_links() {
        let out = clean(
            r#"<p><b>bold</b> <i>it</i> <a href="/x/">go</a></p>"#,
            FeatureSet::simple(),
        );
        assert_eq!(out, r#"<p><b>bold</b> <i>it</i> <a href="/x/">go</a></p>"#);
    }

    #[test]
    fn simple_drops_headings_but_keeps_text() {
        let out = clean("<h2>Title</h2><p>body</p>", FeatureSet::simple());
        assert_eq!(out, "Title<p>body</p>");
    }

    #[test]
    fn inline_drops_links() {
        let out = clean(r#"<a href="/x/">go</a> <em>now</em>"#, FeatureSet::inline());
        assert_eq!(out, "go <em>now</em>");
    }

    #[test]
    fn full_keeps_code_and_center() {
        let out = clean(
            r#"<div class="center-align">hi <code>x</code></div>"#,
            FeatureSet::full(),
        );
        assert_eq!(out, r#"<div class="center-align">hi <code>x</code></div>"#);
    }

    #[test]
    fn plain_divs_are_dropped_with_their_closing_tag() {
        let out = clean(
            r#"<div><div class="center-align">a</div>b</div>"#,
            FeatureSet::full(),
        );
        assert_eq!(out, r#"<div class="center-align">a</div>b"#);
    }

    #[test]
    fn attributes_are_stripped() {
        let out = clean(r#"<b style="color:red" onclick="x()">x</b>"#, FeatureSet::full());
        assert_eq!(out, "<b>x</b>");
    }

    #[test]
    fn script_links_lose_their_href() {
        let out = clean(r#"<a href=" JavaScript:alert(1)">x</a>"#, FeatureSet::full());
        assert_eq!(out, "<a>x</a>");
    }

    #[test]
    fn script_tags_are_removed() {
        let out = clean("<script>alert(1)</script>ok", FeatureSet::full());
        assert_eq!(out, "alert(1)ok");
    }

    #[test]
    fn unterminated_tag_is_escaped() {
        let out = clean("a < b", FeatureSet::full());
        assert_eq!(out, "a &lt; b");
    }

    #[test]
    fn list_items_need_a_list_feature() {
        assert_eq!(clean("<li>x</li>", FeatureSet::simple()), "x");
        assert_eq!(clean("<ul><li>x</li></ul>", FeatureSet::full()), "<ul><li>x</li></ul>");
    }

    #[test]
    fn single_quoted_and_unquoted_hrefs() {
        assert_eq!(
            clean("<a href='/a/'>x</a>", FeatureSet::simple()),
            r#"<a href="/a/">x</a>"#
        );
        assert_eq!(
            clean("<a href=/b/>x</a>", FeatureSet::simple()),
            r#"<a href="/b/">x</a>"#
        );
    }
}
