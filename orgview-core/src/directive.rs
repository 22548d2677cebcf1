//! `#+transclude:` directive model and parser.
//!
//! A directive line looks like:
//!
//! ```text
//! #+transclude: [[id:3fa2::*Week 5][Summary]] :only-contents :level 2
//! ```
//!
//! Parsing is deliberately forgiving at the outer boundary: a keyword line
//! that is not a well-formed directive yields `None` so the caller can fall
//! back to rendering it as ordinary metadata. It is never an error.

use crate::link::OrgLink;
use orgview_types::{MetaNode, OrgNode, Visit};
use serde::{Deserialize, Serialize};

const TRANSCLUDE_KEY: &str = "#+transclude:";

/// An immutable, parsed `#+transclude:` directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    /// The link target to transclude.
    pub link: OrgLink,

    /// Display text from `[[link][description]]` bracket syntax.
    pub description: Option<String>,

    /// Drop the target section's own headline, keeping body and children.
    pub no_first_heading: bool,

    /// Drop the target section's child sections, keeping headline and body.
    pub only_contents: bool,

    /// `:level N` property. Parsed but inert: level reshaping is not
    /// applied to output.
    pub level: Option<i64>,

    /// `:exclude-elements "(a b c)"` tokens. Parsed but inert.
    pub exclude_elements: Vec<String>,
}

impl Directive {
    /// Parse a keyword line into a directive, or `None` if it is not one.
    ///
    /// Accepts only lines whose key case-insensitively equals
    /// `#+transclude:` and whose value is a bracketed link optionally
    /// followed by property tokens. Link-syntax failures also yield `None`.
    pub fn try_parse(node: &MetaNode) -> Option<Directive> {
        if !node.key.trim().eq_ignore_ascii_case(TRANSCLUDE_KEY) {
            return None;
        }
        let value = node.value.trim();
        if value.is_empty() {
            return None;
        }

        let rest = value.strip_prefix("[[")?;
        let close = rest.find("]]")?;
        let bracket = &rest[..close];
        let tail = &rest[close + 2..];

        let (raw_link, description) = match bracket.split_once("][") {
            Some((link, desc)) => {
                let desc = desc.trim();
                (link, (!desc.is_empty()).then(|| desc.to_string()))
            }
            None => (bracket, None),
        };

        let link = OrgLink::parse(raw_link).ok()?;

        let mut directive = Directive {
            link,
            description,
            no_first_heading: false,
            only_contents: false,
            level: None,
            exclude_elements: Vec::new(),
        };
        parse_properties(tail, &mut directive)?;
        Some(directive)
    }

    /// Cache identity: everything that affects resolved output.
    ///
    /// Covers scheme, body, search option, and the shaping flags; excludes
    /// the description (display only) and `exclude_elements` (inert). NUL
    /// separators keep the encoding injective across field boundaries.
    pub fn cache_key(&self) -> String {
        format!(
            "{}\u{0}{}\u{0}{}\u{0}{}{}\u{0}{}",
            self.link.scheme.as_deref().unwrap_or_default(),
            self.link.body,
            self.link.extra.as_deref().unwrap_or_default(),
            u8::from(self.no_first_heading),
            u8::from(self.only_contents),
            self.level.map(|l| l.to_string()).unwrap_or_default(),
        )
    }

    /// Name shown alongside the transcluded content: the bracket
    /// description when present, else the last path segment of the target.
    pub fn display_name(&self) -> String {
        match &self.description {
            Some(desc) => desc.clone(),
            None => self.link.last_segment().to_string(),
        }
    }
}

/// Parse the property tail after the bracketed link. Unknown tokens reject
/// the whole line.
fn parse_properties(tail: &str, directive: &mut Directive) -> Option<()> {
    let tokens = tokenize(tail);
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].to_ascii_lowercase().as_str() {
            ":no-first-heading" => directive.no_first_heading = true,
            ":only-contents" => directive.only_contents = true,
            ":level" => {
                i += 1;
                directive.level = Some(tokens.get(i)?.parse().ok()?);
            }
            ":exclude-elements" => {
                i += 1;
                let mut raw = tokens.get(i)?.clone();
                // Unquoted form arrives as several tokens: "(drawer", "comment)".
                while raw.starts_with('(') && !raw.ends_with(')') {
                    i += 1;
                    raw.push(' ');
                    raw.push_str(tokens.get(i)?);
                }
                directive.exclude_elements = raw
                    .trim_start_matches('(')
                    .trim_end_matches(')')
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
            }
            _ => return None,
        }
        i += 1;
    }
    Some(())
}

/// Whitespace tokenizer that keeps double-quoted spans together (quotes
/// themselves are dropped).
fn tokenize(s: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in s.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Scan a tree for transclusion directives, in document order.
pub fn extract_transclusions(tree: &OrgNode) -> Vec<Directive> {
    let mut found = Vec::new();
    tree.visit_meta(&mut |meta| {
        if let Some(directive) = Directive::try_parse(meta) {
            found.push(directive);
        }
        Visit::Continue
    });
    found
}

/// Whether a tree contains at least one transclusion directive. Stops at
/// the first hit.
pub fn has_transclusions(tree: &OrgNode) -> bool {
    let mut found = false;
    tree.visit_meta(&mut |meta| {
        if Directive::try_parse(meta).is_some() {
            found = true;
            Visit::Stop
        } else {
            Visit::Continue
        }
    });
    found
}
