//! The transclusion resolver.
//!
//! `resolve` is a short-lived pipeline with explicit early exits: depth
//! check, cycle check, cache probe, link resolution, load and parse,
//! sub-target location, navigation-target synthesis, transform, cache
//! store. Every failure path terminates in a typed
//! [`TransclusionResult::Error`]; nothing propagates to the caller.
//!
//! One resolver serves one open document: it carries that document's
//! source (for relative links), its ID-search scope, and its cache.
//! Resolution is stateless and reentrant, so directives in the same
//! document may resolve concurrently. Ancestor sets travel by value down
//! a transclusion chain (see [`extend_ancestors`]), never as shared
//! mutable state, so sibling branches cannot falsely flag each other as
//! cyclic.

use crate::cache::TransclusionCache;
use crate::directive::Directive;
use crate::error::TransclusionErrorKind;
use crate::link::OrgLink;
use crate::locate::locate;
use crate::transform::apply_transforms;
use anyhow::Context;
use async_trait::async_trait;
use orgview_types::{OrgNode, OrgSection};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Maximum transclusion chain length before resolution gives up. Also
/// catches pathological deep chains that never repeat an exact source.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// An external document-bearing entity: a file on disk, a document behind
/// a storage provider, or anything else that can hand over text.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Stable identifier of this source.
    fn id(&self) -> &str;

    /// Human-readable name, typically the file name.
    fn name(&self) -> &str;

    /// True when the source does not know its containing location yet, in
    /// which case relative links cannot be resolved against it.
    fn needs_to_resolve_parent(&self) -> bool;

    /// Full text content; may require an async fetch.
    async fn content(&self) -> anyhow::Result<String>;

    /// Resolve a relative path to a sibling source.
    async fn resolve_relative(&self, path: &str) -> anyhow::Result<Arc<dyn DataSource>>;
}

/// Stable-ID lookup across a directory scope: finds the document that
/// contains a node with the given `:ID:` property.
#[async_trait]
pub trait IdIndex: Send + Sync {
    async fn find_file_for_id(
        &self,
        root_scope: &str,
        target_id: &str,
    ) -> anyhow::Result<Option<Arc<dyn DataSource>>>;
}

/// The org markup parser, consumed as a black box. Parsing is CPU-bound
/// and is always run off the caller's task via `spawn_blocking`.
pub trait OrgParser: Send + Sync {
    fn parse(&self, text: &str) -> anyhow::Result<OrgNode>;
}

/// Outcome of resolving one directive.
#[derive(Clone)]
pub enum TransclusionResult {
    Success {
        /// Transformed content, ready for display.
        content: OrgNode,
        /// Identity of the target location (`scheme + body`).
        source_id: String,
        /// Display name: the directive description, else the link's last
        /// path segment.
        source_name: String,
        /// The source the content was loaded from.
        source: Arc<dyn DataSource>,
        /// Re-enterable navigation string (`id:…`, `#…`, or `*title`)
        /// pointing at the resolved section, if there is one.
        target_section: Option<String>,
    },
    Error {
        kind: TransclusionErrorKind,
        message: String,
    },
}

impl TransclusionResult {
    fn error(kind: TransclusionErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The error kind, if this is an error result.
    pub fn error_kind(&self) -> Option<TransclusionErrorKind> {
        match self {
            Self::Error { kind, .. } => Some(*kind),
            Self::Success { .. } => None,
        }
    }
}

impl std::fmt::Debug for TransclusionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success {
                source_id,
                source_name,
                target_section,
                ..
            } => f
                .debug_struct("Success")
                .field("source_id", source_id)
                .field("source_name", source_name)
                .field("target_section", target_section)
                .finish_non_exhaustive(),
            Self::Error { kind, message } => f
                .debug_struct("Error")
                .field("kind", kind)
                .field("message", message)
                .finish(),
        }
    }
}

/// Resolves `#+transclude:` directives for one open document.
pub struct TransclusionResolver {
    source: Arc<dyn DataSource>,
    parser: Arc<dyn OrgParser>,
    id_index: Arc<dyn IdIndex>,
    root_scope: Option<String>,
    cache: Arc<TransclusionCache>,
    max_depth: usize,
}

impl TransclusionResolver {
    pub fn new(
        source: Arc<dyn DataSource>,
        parser: Arc<dyn OrgParser>,
        id_index: Arc<dyn IdIndex>,
        cache: Arc<TransclusionCache>,
    ) -> Self {
        Self {
            source,
            parser,
            id_index,
            root_scope: None,
            cache,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Directory scope for `id:` link lookups. Without one, `id:` links
    /// resolve to "file not found".
    pub fn with_root_scope(mut self, scope: impl Into<String>) -> Self {
        self.root_scope = Some(scope.into());
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn cache(&self) -> &Arc<TransclusionCache> {
        &self.cache
    }

    /// Resolve one directive against this document.
    ///
    /// `ancestors` is the chain of source identities currently being
    /// expanded; the caller passes an empty set for a top-level directive
    /// and [`extend_ancestors`] output for nested ones.
    pub async fn resolve(
        &self,
        directive: &Directive,
        ancestors: &HashSet<String>,
    ) -> TransclusionResult {
        if ancestors.len() >= self.max_depth {
            debug!(depth = ancestors.len(), "transclusion depth limit reached");
            return TransclusionResult::error(
                TransclusionErrorKind::CircularReference,
                format!("transclusion chain exceeds depth limit of {}", self.max_depth),
            );
        }

        let source_id = directive.link.source_id();
        if ancestors.contains(&source_id) {
            debug!(%source_id, "transclusion cycle detected");
            return TransclusionResult::error(
                TransclusionErrorKind::CircularReference,
                format!("{source_id} is already being transcluded"),
            );
        }

        if let Some(entry) = self.cache.get(directive) {
            debug!(%source_id, "transclusion cache hit");
            return TransclusionResult::Success {
                content: entry.content,
                source_id: entry.source_id,
                source_name: directive.display_name(),
                source: entry.source,
                target_section: entry.target_section,
            };
        }
        debug!(%source_id, "transclusion cache miss");

        match self.resolve_uncached(directive, &source_id).await {
            Ok(result) => result,
            // Blanket safety net: unexpected failures surface as parse
            // errors instead of propagating.
            Err(err) => {
                warn!(%source_id, error = %format!("{err:#}"), "transclusion resolution failed");
                TransclusionResult::error(TransclusionErrorKind::ParseError, format!("{err:#}"))
            }
        }
    }

    async fn resolve_uncached(
        &self,
        directive: &Directive,
        source_id: &str,
    ) -> anyhow::Result<TransclusionResult> {
        let Some(target) = self.resolve_link(&directive.link).await? else {
            return Ok(TransclusionResult::error(
                TransclusionErrorKind::FileNotFound,
                format!("could not locate source for {source_id}"),
            ));
        };

        let text = target
            .content()
            .await
            .with_context(|| format!("failed to load {}", target.name()))?;

        let parser = Arc::clone(&self.parser);
        let parsed = tokio::task::spawn_blocking(move || parser.parse(&text))
            .await
            .context("parse task failed")?;
        let tree = match parsed {
            Ok(tree) => tree,
            Err(err) => {
                return Ok(TransclusionResult::error(
                    TransclusionErrorKind::ParseError,
                    format!("failed to parse {}: {err:#}", target.name()),
                ));
            }
        };

        let (content, target_section) = match directive.link.extra.as_deref() {
            Some(search_option) => match locate(&tree, search_option) {
                Some(section) => {
                    let nav = navigation_target(section);
                    (OrgNode::Section(section.clone()), nav)
                }
                None => {
                    return Ok(TransclusionResult::error(
                        TransclusionErrorKind::InvalidTarget,
                        format!("{search_option:?} matched nothing in {}", target.name()),
                    ));
                }
            },
            None => (tree, None),
        };

        let content = apply_transforms(content, directive);

        self.cache.put(
            directive,
            content.clone(),
            source_id,
            Arc::clone(&target),
            target_section.clone(),
        );

        Ok(TransclusionResult::Success {
            content,
            source_id: source_id.to_string(),
            source_name: directive.display_name(),
            source: target,
            target_section,
        })
    }

    async fn resolve_link(&self, link: &OrgLink) -> anyhow::Result<Option<Arc<dyn DataSource>>> {
        match link.scheme.as_deref() {
            Some("id") => {
                let Some(root_scope) = self.root_scope.as_deref() else {
                    debug!(target_id = %link.body, "no root scope configured for id link");
                    return Ok(None);
                };
                self.id_index.find_file_for_id(root_scope, &link.body).await
            }
            None | Some("file") => {
                if self.source.needs_to_resolve_parent() {
                    debug!(
                        source = self.source.id(),
                        "source has no parent location, cannot resolve relative link"
                    );
                    return Ok(None);
                }
                match self.source.resolve_relative(&link.body).await {
                    Ok(sibling) => Ok(Some(sibling)),
                    Err(err) => {
                        debug!(path = %link.body, error = %err, "relative link did not resolve");
                        Ok(None)
                    }
                }
            }
            Some(scheme) => {
                debug!(scheme, "unsupported link scheme for transclusion");
                Ok(None)
            }
        }
    }
}

/// Navigation string for jumping a viewer to a resolved section: stable ID
/// first, then custom ID, then raw headline text.
fn navigation_target(section: &OrgSection) -> Option<String> {
    if let Some(id) = &section.id {
        return Some(format!("id:{id}"));
    }
    if let Some(custom_id) = section.custom_ids.first() {
        return Some(format!("#{custom_id}"));
    }
    let headline = section.headline.trim();
    if headline.is_empty() {
        None
    } else {
        Some(format!("*{headline}"))
    }
}

/// The ancestor set for the next hop of a transclusion chain: the current
/// set plus the source now being expanded. Returns a fresh set so sibling
/// branches never share mutable state.
pub fn extend_ancestors(ancestors: &HashSet<String>, source_id: &str) -> HashSet<String> {
    let mut next = ancestors.clone();
    next.insert(source_id.to_string());
    next
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::anyhow;
    use orgview_types::MetaNode;
    use std::collections::HashMap;

    /// In-memory document source for tests.
    pub(crate) struct FakeSource {
        id: String,
        name: String,
        text: String,
        needs_parent: bool,
        siblings: HashMap<String, Arc<FakeSource>>,
    }

    impl FakeSource {
        pub(crate) fn new(id: &str, name: &str, text: &str) -> Self {
            Self {
                id: id.to_string(),
                name: name.to_string(),
                text: text.to_string(),
                needs_parent: false,
                siblings: HashMap::new(),
            }
        }

        pub(crate) fn needs_parent(mut self) -> Self {
            self.needs_parent = true;
            self
        }
    }

    #[async_trait]
    impl DataSource for FakeSource {
        fn id(&self) -> &str {
            &self.id
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn needs_to_resolve_parent(&self) -> bool {
            self.needs_parent
        }

        async fn content(&self) -> anyhow::Result<String> {
            Ok(self.text.clone())
        }

        async fn resolve_relative(&self, path: &str) -> anyhow::Result<Arc<dyn DataSource>> {
            self.siblings
                .get(path)
                .cloned()
                .map(|s| s as Arc<dyn DataSource>)
                .ok_or_else(|| anyhow!("no sibling at {path}"))
        }
    }

    /// ID lookup backed by a map; ignores the root scope.
    #[derive(Default)]
    pub(crate) struct FakeIndex {
        docs: HashMap<String, Arc<FakeSource>>,
    }

    impl FakeIndex {
        pub(crate) fn with_doc(mut self, target_id: &str, source: Arc<FakeSource>) -> Self {
            self.docs.insert(target_id.to_string(), source);
            self
        }
    }

    #[async_trait]
    impl IdIndex for FakeIndex {
        async fn find_file_for_id(
            &self,
            _root_scope: &str,
            target_id: &str,
        ) -> anyhow::Result<Option<Arc<dyn DataSource>>> {
            Ok(self
                .docs
                .get(target_id)
                .cloned()
                .map(|s| s as Arc<dyn DataSource>))
        }
    }

    /// Parser stub; none of these tests get far enough to parse.
    #[derive(Default)]
    pub(crate) struct FakeParser;

    impl OrgParser for FakeParser {
        fn parse(&self, _text: &str) -> anyhow::Result<OrgNode> {
            Err(anyhow!("parser should not run in these tests"))
        }
    }

    fn directive(value: &str) -> Directive {
        Directive::try_parse(&MetaNode::new("#+transclude:", value)).expect("valid directive")
    }

    fn resolver(source: FakeSource, parser: FakeParser, index: FakeIndex) -> TransclusionResolver {
        TransclusionResolver::new(
            Arc::new(source),
            Arc::new(parser),
            Arc::new(index),
            Arc::new(TransclusionCache::new()),
        )
    }

    #[tokio::test]
    async fn test_cycle_is_rejected_regardless_of_cache() {
        let r = resolver(
            FakeSource::new("doc", "doc.org", ""),
            FakeParser::default(),
            FakeIndex::default(),
        );
        let d = directive("[[id:abc]]");
        let ancestors = extend_ancestors(&HashSet::new(), "id:abc");

        let result = r.resolve(&d, &ancestors).await;
        assert_eq!(
            result.error_kind(),
            Some(TransclusionErrorKind::CircularReference)
        );
    }

    #[tokio::test]
    async fn test_depth_limit_without_exact_repeat() {
        let r = resolver(
            FakeSource::new("doc", "doc.org", ""),
            FakeParser::default(),
            FakeIndex::default(),
        );
        let d = directive("[[id:fresh]]");
        let ancestors: HashSet<String> = (0..DEFAULT_MAX_DEPTH).map(|i| format!("id:{i}")).collect();

        let result = r.resolve(&d, &ancestors).await;
        assert_eq!(
            result.error_kind(),
            Some(TransclusionErrorKind::CircularReference)
        );
    }

    #[tokio::test]
    async fn test_id_link_without_root_scope_is_not_found() {
        let r = resolver(
            FakeSource::new("doc", "doc.org", ""),
            FakeParser::default(),
            FakeIndex::default().with_doc("abc", Arc::new(FakeSource::new("t", "t.org", ""))),
        );
        let result = r.resolve(&directive("[[id:abc]]"), &HashSet::new()).await;
        assert_eq!(result.error_kind(), Some(TransclusionErrorKind::FileNotFound));
    }

    #[tokio::test]
    async fn test_unsupported_scheme_is_not_found() {
        let r = resolver(
            FakeSource::new("doc", "doc.org", ""),
            FakeParser::default(),
            FakeIndex::default(),
        );
        let result = r
            .resolve(&directive("[[https://example.com/x.org]]"), &HashSet::new())
            .await;
        assert_eq!(result.error_kind(), Some(TransclusionErrorKind::FileNotFound));
    }

    #[tokio::test]
    async fn test_relative_link_needs_resolved_parent() {
        let r = resolver(
            FakeSource::new("doc", "doc.org", "").needs_parent(),
            FakeParser::default(),
            FakeIndex::default(),
        );
        let result = r.resolve(&directive("[[sibling.org]]"), &HashSet::new()).await;
        assert_eq!(result.error_kind(), Some(TransclusionErrorKind::FileNotFound));
    }

    #[test]
    fn test_extend_ancestors_copies() {
        let base = HashSet::new();
        let next = extend_ancestors(&base, "id:a");
        assert!(base.is_empty());
        assert!(next.contains("id:a"));
        let branch_a = extend_ancestors(&next, "id:b");
        let branch_b = extend_ancestors(&next, "id:c");
        assert!(!branch_a.contains("id:c"));
        assert!(!branch_b.contains("id:b"));
    }

    #[test]
    fn test_navigation_target_preference() {
        let mut section = OrgSection {
            headline: "Week 5".into(),
            level: 1,
            id: Some("3fa2".into()),
            custom_ids: vec!["week-5".into()],
            body: vec![],
            children: vec![],
        };
        assert_eq!(navigation_target(&section).as_deref(), Some("id:3fa2"));
        section.id = None;
        assert_eq!(navigation_target(&section).as_deref(), Some("#week-5"));
        section.custom_ids.clear();
        assert_eq!(navigation_target(&section).as_deref(), Some("*Week 5"));
        section.headline = "  ".into();
        assert_eq!(navigation_target(&section), None);
    }
}
