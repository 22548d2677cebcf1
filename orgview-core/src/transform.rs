//! Content shaping for resolved transclusions.

use crate::directive::Directive;
use orgview_types::{OrgDocument, OrgNode};

/// Apply a directive's shaping flags to the located content.
///
/// `:no-first-heading` runs first: a section is replaced by a heading-less
/// container holding its body and child sections. `:only-contents` then
/// strips child sections, but only if the content is still a section. The
/// ordering is part of the contract: with both flags set, the first step
/// already turned the section into a document, so the second is a no-op and
/// the subsections survive.
pub fn apply_transforms(content: OrgNode, directive: &Directive) -> OrgNode {
    let content = if directive.no_first_heading {
        match content {
            OrgNode::Section(section) => OrgNode::Document(OrgDocument {
                body: section.body,
                sections: section.children,
            }),
            other => other,
        }
    } else {
        content
    };

    if directive.only_contents {
        if let OrgNode::Section(mut section) = content {
            section.children.clear();
            return OrgNode::Section(section);
        }
        return content;
    }

    content
}
