//! Shared types for orgview
//!
//! This crate provides the document-tree model consumed by the rest of the
//! orgview ecosystem: a closed set of node variants (document, section,
//! keyword line, plain text) plus depth-first visitors over sections and
//! keyword lines. The org markup parser that produces these trees lives
//! behind a trait in `orgview-core`; nothing here depends on it.

use serde::{Deserialize, Serialize};

/// Signal returned by visitor callbacks to continue or cut traversal short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    Stop,
}

/// A node in a parsed org document tree.
///
/// This is deliberately a closed sum type: the locator and transformer in
/// `orgview-core` match on it exhaustively, so adding a variant is a
/// breaking change by design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrgNode {
    /// The root of a parsed file, or a synthesized heading-less container.
    Document(OrgDocument),
    /// A headline together with everything under it.
    Section(OrgSection),
    /// A `#+key: value` keyword line.
    Meta(MetaNode),
    /// Plain leaf content.
    Text(String),
}

/// Root container: leading content followed by top-level sections.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrgDocument {
    /// Content before the first headline, in document order.
    pub body: Vec<OrgNode>,

    /// Top-level sections, in document order.
    pub sections: Vec<OrgSection>,
}

/// A headline and its subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgSection {
    /// Rendered headline text (markup already flattened by the parser).
    pub headline: String,

    /// Headline depth, 1-based.
    pub level: u8,

    /// Stable identifier from the section's `:ID:` property, if any.
    #[serde(default)]
    pub id: Option<String>,

    /// `:CUSTOM_ID:` property values; lookups use the first one only.
    #[serde(default)]
    pub custom_ids: Vec<String>,

    /// Content between the headline and the first child section.
    #[serde(default)]
    pub body: Vec<OrgNode>,

    /// Child sections, in document order.
    #[serde(default)]
    pub children: Vec<OrgSection>,
}

/// A `#+key: value` keyword line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaNode {
    /// The keyword including its `#+` prefix and trailing colon,
    /// e.g. `#+transclude:`. Case is preserved as written.
    pub key: String,

    /// Raw text after the keyword, untrimmed.
    pub value: String,
}

impl MetaNode {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl OrgNode {
    /// Visit every section in document order (depth-first, pre-order).
    ///
    /// The callback's `Visit::Stop` aborts the whole traversal, not just the
    /// current subtree.
    pub fn visit_sections<'a>(&'a self, f: &mut dyn FnMut(&'a OrgSection) -> Visit) -> Visit {
        match self {
            OrgNode::Document(doc) => {
                for section in &doc.sections {
                    if section.visit(f) == Visit::Stop {
                        return Visit::Stop;
                    }
                }
                Visit::Continue
            }
            OrgNode::Section(section) => section.visit(f),
            OrgNode::Meta(_) | OrgNode::Text(_) => Visit::Continue,
        }
    }

    /// Visit every keyword line in document order, including those nested
    /// inside section bodies.
    pub fn visit_meta<'a>(&'a self, f: &mut dyn FnMut(&'a MetaNode) -> Visit) -> Visit {
        match self {
            OrgNode::Document(doc) => {
                for node in &doc.body {
                    if node.visit_meta(f) == Visit::Stop {
                        return Visit::Stop;
                    }
                }
                for section in &doc.sections {
                    if section.visit_meta(f) == Visit::Stop {
                        return Visit::Stop;
                    }
                }
                Visit::Continue
            }
            OrgNode::Section(section) => section.visit_meta(f),
            OrgNode::Meta(meta) => f(meta),
            OrgNode::Text(_) => Visit::Continue,
        }
    }

    /// Collect all sections in document order.
    pub fn sections(&self) -> Vec<&OrgSection> {
        let mut out = Vec::new();
        self.visit_sections(&mut |section| {
            out.push(section);
            Visit::Continue
        });
        out
    }
}

impl OrgSection {
    fn visit<'a>(&'a self, f: &mut dyn FnMut(&'a OrgSection) -> Visit) -> Visit {
        if f(self) == Visit::Stop {
            return Visit::Stop;
        }
        for child in &self.children {
            if child.visit(f) == Visit::Stop {
                return Visit::Stop;
            }
        }
        Visit::Continue
    }

    fn visit_meta<'a>(&'a self, f: &mut dyn FnMut(&'a MetaNode) -> Visit) -> Visit {
        for node in &self.body {
            if node.visit_meta(f) == Visit::Stop {
                return Visit::Stop;
            }
        }
        for child in &self.children {
            if child.visit_meta(f) == Visit::Stop {
                return Visit::Stop;
            }
        }
        Visit::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(headline: &str, children: Vec<OrgSection>) -> OrgSection {
        OrgSection {
            headline: headline.to_string(),
            level: 1,
            id: None,
            custom_ids: Vec::new(),
            body: Vec::new(),
            children,
        }
    }

    #[test]
    fn test_visit_sections_preorder() {
        let tree = OrgNode::Document(OrgDocument {
            body: vec![],
            sections: vec![
                section("A", vec![section("A.1", vec![]), section("A.2", vec![])]),
                section("B", vec![]),
            ],
        });

        let order: Vec<&str> = tree
            .sections()
            .iter()
            .map(|s| s.headline.as_str())
            .collect();
        assert_eq!(order, vec!["A", "A.1", "A.2", "B"]);
    }

    #[test]
    fn test_visit_sections_stop_aborts_traversal() {
        let tree = OrgNode::Document(OrgDocument {
            body: vec![],
            sections: vec![
                section("A", vec![section("A.1", vec![])]),
                section("B", vec![]),
            ],
        });

        let mut seen = Vec::new();
        tree.visit_sections(&mut |s| {
            seen.push(s.headline.clone());
            if s.headline == "A.1" {
                Visit::Stop
            } else {
                Visit::Continue
            }
        });
        assert_eq!(seen, vec!["A", "A.1"]);
    }

    #[test]
    fn test_visit_meta_covers_section_bodies() {
        let mut inner = section("A", vec![]);
        inner
            .body
            .push(OrgNode::Meta(MetaNode::new("#+transclude:", "[[x]]")));

        let tree = OrgNode::Document(OrgDocument {
            body: vec![
                OrgNode::Meta(MetaNode::new("#+title:", "Test")),
                OrgNode::Text("intro".into()),
            ],
            sections: vec![inner],
        });

        let mut keys = Vec::new();
        tree.visit_meta(&mut |m| {
            keys.push(m.key.clone());
            Visit::Continue
        });
        assert_eq!(keys, vec!["#+title:", "#+transclude:"]);
    }
}
