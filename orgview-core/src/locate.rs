//! Sub-target location inside a loaded document tree.
//!
//! A directive's search option (the part after `::`) picks one section out
//! of the target document. Dispatch is on the leading character:
//!
//! - `*` — headline text search, three tiers (exact, statistics-cookie
//!   stripped, prefix).
//! - `#` — custom-ID property search.
//! - `/…/` — regex search, unsupported: always misses.
//! - anything else — stable-ID property search.
//!
//! All tiers scan sections in document order and take the first hit.
//! Callers only invoke this with a non-empty search option; an absent
//! option means "the whole document" and is handled upstream.

use once_cell::sync::Lazy;
use orgview_types::{OrgNode, OrgSection};
use regex::Regex;
use tracing::debug;

/// Trailing statistics cookie on a headline, e.g. `Tasks [2/5]` or
/// `Tasks [40%]`.
static COOKIE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\[[0-9/%]*\]$").expect("cookie pattern is valid"));

/// Find the section a search option refers to, or `None`. A miss becomes
/// an invalid-target error upstream.
pub fn locate<'a>(tree: &'a OrgNode, search_option: &str) -> Option<&'a OrgSection> {
    let search_option = search_option.trim();
    if let Some(headline) = search_option.strip_prefix('*') {
        return locate_headline(tree, headline);
    }
    if let Some(custom_id) = search_option.strip_prefix('#') {
        return locate_custom_id(tree, custom_id);
    }
    if search_option.len() >= 2 && search_option.starts_with('/') && search_option.ends_with('/') {
        debug!(pattern = %search_option, "regex search options are unsupported");
        return None;
    }
    locate_stable_id(tree, search_option)
}

fn locate_headline<'a>(tree: &'a OrgNode, raw: &str) -> Option<&'a OrgSection> {
    let needle = raw.trim().to_lowercase();
    let sections = tree.sections();

    // Tier 1: exact, case-insensitive.
    if let Some(section) = sections
        .iter()
        .find(|s| s.headline.trim().to_lowercase() == needle)
        .copied()
    {
        return Some(section);
    }

    // Tier 2: same, after stripping a trailing statistics cookie.
    if let Some(section) = sections
        .iter()
        .find(|s| {
            COOKIE_RE
                .replace(s.headline.trim(), "")
                .trim()
                .to_lowercase()
                == needle
        })
        .copied()
    {
        return Some(section);
    }

    // Tier 3: prefix.
    sections
        .iter()
        .find(|s| s.headline.trim().to_lowercase().starts_with(&needle))
        .copied()
}

fn locate_custom_id<'a>(tree: &'a OrgNode, custom_id: &str) -> Option<&'a OrgSection> {
    let needle = custom_id.trim();
    tree.sections().into_iter().find(|s| {
        s.custom_ids
            .first()
            .is_some_and(|id| id.eq_ignore_ascii_case(needle))
    })
}

fn locate_stable_id<'a>(tree: &'a OrgNode, target: &str) -> Option<&'a OrgSection> {
    tree.sections()
        .into_iter()
        .find(|s| s.id.as_deref() == Some(target))
}
