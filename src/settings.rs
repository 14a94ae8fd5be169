//! Site-wide settings shown in every page's footer.

use crate::blocks::{FieldIssue, FieldProblem, ValidationError};
use serde::{Deserialize, Serialize};

/// Links to the site's social media profiles. Every link is optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SocialSettings {
    pub facebook: Option<String>,
    pub twitter: Option<String>,
    pub youtube: Option<String>,
}

impl SocialSettings {
    /// Set links, in display order.
    pub fn links(&self) -> Vec<(&'static str, &str)> {
        [
            ("facebook", &self.facebook),
            ("twitter", &self.twitter),
            ("youtube", &self.youtube),
        ]
        .into_iter()
        .filter_map(|(name, url)| url.as_deref().map(|u| (name, u)))
        .collect()
    }

    /// Every set link must be an absolute `http(s)` URL.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let issues = self
            .links()
            .into_iter()
            .filter(|(_, link)| !is_web_url(link))
            .map(|(name, _)| {
                FieldIssue::new(name, FieldProblem::Invalid("enter a valid URL".into()))
            })
            .collect();
        ValidationError::check(issues)
    }
}

fn is_web_url(raw: &str) -> bool {
    url::Url::parse(raw).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}
