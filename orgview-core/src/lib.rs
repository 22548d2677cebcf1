//! # orgview-core
//!
//! The transclusion resolution engine for orgview.
//!
//! An org document can embed portions of other documents inline via
//! `#+transclude:` directives. This crate turns such a directive into
//! rendered content: it parses the directive syntax, resolves the link
//! target (stable ID or relative path) to a document source, locates the
//! requested sub-target inside the loaded tree, applies content-shaping
//! transforms, detects cycles across multi-hop chains, and caches results
//! with source-level invalidation.
//!
//! Document storage, the org markup parser, and the rendering layer are
//! external collaborators; see the traits in [`resolve`].

pub mod cache;
pub mod directive;
pub mod error;
pub mod link;
pub mod locate;
pub mod resolve;
pub mod transform;

pub use cache::{CacheEntry, TransclusionCache};
pub use directive::{extract_transclusions, has_transclusions, Directive};
pub use error::{TransclusionError, TransclusionErrorKind};
pub use link::{LinkParseError, OrgLink};
pub use locate::locate;
pub use resolve::{
    extend_ancestors, DataSource, IdIndex, OrgParser, TransclusionResolver, TransclusionResult,
};
pub use transform::apply_transforms;
