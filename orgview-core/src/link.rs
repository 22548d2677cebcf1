//! Org link target parsing for `scheme:body::search-option` syntax.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A parsed org link target, e.g. `id:abc123`, `notes/weekly.org::*Week 5`
/// or `file:../inbox.org`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgLink {
    /// Link scheme without the trailing colon (`id`, `file`, `https`, ...).
    /// `None` for bare relative paths.
    pub scheme: Option<String>,

    /// The target string after the scheme: an ID, or a path.
    pub body: String,

    /// Search option after `::`, e.g. `*Week 5` or `#intro`.
    pub extra: Option<String>,
}

/// Errors from [`OrgLink::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkParseError {
    #[error("link target is empty")]
    Empty,

    #[error("link target {0:?} has a scheme but no body")]
    MissingBody(String),
}

impl OrgLink {
    /// Parse a raw link target.
    ///
    /// The search option is split off at the first `::`; a scheme is
    /// recognized as a leading `name:` where `name` starts with a letter
    /// and contains only letters, digits, `+`, `-`, or `.`.
    pub fn parse(raw: &str) -> Result<Self, LinkParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(LinkParseError::Empty);
        }

        let (target, extra) = match raw.split_once("::") {
            Some((target, extra)) if !extra.trim().is_empty() => {
                (target.trim(), Some(extra.trim().to_string()))
            }
            Some((target, _)) => (target.trim(), None),
            None => (raw, None),
        };

        let (scheme, body) = match split_scheme(target) {
            Some((scheme, body)) => {
                if body.is_empty() {
                    return Err(LinkParseError::MissingBody(raw.to_string()));
                }
                (Some(scheme.to_ascii_lowercase()), body.to_string())
            }
            None => {
                if target.is_empty() {
                    return Err(LinkParseError::Empty);
                }
                (None, target.to_string())
            }
        };

        Ok(Self {
            scheme,
            body,
            extra,
        })
    }

    /// Whether this link addresses a sibling of the containing document.
    pub fn is_relative(&self) -> bool {
        matches!(self.scheme.as_deref(), None | Some("file"))
    }

    /// Identity of the target location, scheme included, search option
    /// excluded. Two directives pointing at the same document share this
    /// even when they extract different sub-targets.
    pub fn source_id(&self) -> String {
        match &self.scheme {
            Some(scheme) => format!("{scheme}:{}", self.body),
            None => self.body.clone(),
        }
    }

    /// Last path segment of the body, used as a fallback display name.
    pub fn last_segment(&self) -> &str {
        self.body
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.body)
    }
}

fn split_scheme(target: &str) -> Option<(&str, &str)> {
    let colon = target.find(':')?;
    let scheme = &target[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }
    Some((scheme, &target[colon + 1..]))
}
