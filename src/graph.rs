//! The link graph over immutable doc snapshots.
//!
//! Docs reference each other through link elements. A link snapshots the
//! target trunk's head at creation time and never advances on its own, so
//! two docs linking to the same trunk may point at different revisions.
//! The graph carries no acyclicity guarantee; every walk in this module is
//! guarded by a visited set.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LanternError, Result};
use crate::model::{
    ContentElement, Doc, DocId, DocLabel, DocLink, Element, ElementId, Trunk, TrunkId, UserId,
};
use crate::store::Datastore;
use crate::trunk::TrunkStore;

/// Flags controlling how much decoration [`DocGraph::resolve_content_with`]
/// attaches to each element
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentOptions {
    /// Resolve link targets to fill in display titles
    pub resolve_links: bool,
    /// When resolving a link target, prefer the revision the user last
    /// visited over the trunk head
    pub use_history: bool,
    /// Attach per-element progress scores
    pub fetch_score: bool,
    /// Attach the user's saved playback position to video elements
    pub fetch_video_state: bool,
}

/// A content element decorated for rendering
#[derive(Debug, Clone)]
pub struct ResolvedElement {
    pub element: Element,
    /// Progress score, when requested and the element is scorable
    pub score: Option<u32>,
    /// Display title for link elements, when requested
    pub link_title: Option<String>,
    /// Saved playback position in seconds, for video elements
    pub video_position: Option<f64>,
}

/// One node of a document outline tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineNode {
    pub trunk_ref: TrunkId,
    pub doc_ref: DocId,
    pub title: String,
    pub label: DocLabel,
    pub children: Vec<OutlineNode>,
}

// ============================================================================
// DocGraph
// ============================================================================

/// Link creation, content resolution, and guarded graph walks
#[derive(Clone)]
pub struct DocGraph {
    store: Arc<dyn Datastore>,
    trunks: TrunkStore,
}

impl DocGraph {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        let trunks = TrunkStore::new(store.clone());
        Self { store, trunks }
    }

    /// Store a content element and return it with its assigned id
    pub fn create_element(&self, kind: ContentElement) -> Result<Element> {
        let element = Element::new(kind);
        self.store.put_element(element.clone())?;
        Ok(element)
    }

    /// Create a link element from `from_doc` into `to_trunk`, snapshotting
    /// the target trunk's current head.
    pub fn create_link(
        &self,
        from_doc: &Doc,
        to_trunk: &TrunkId,
        default_title: Option<String>,
    ) -> Result<Element> {
        let target = self.trunks.get_trunk(to_trunk)?;
        let head = target.head.ok_or_else(|| {
            LanternError::InvalidDocument(format!("Trunk has no head: {}", to_trunk))
        })?;
        let link = DocLink {
            trunk_ref: *to_trunk,
            doc_ref: head,
            from_trunk_ref: from_doc.trunk_ref,
            from_doc_ref: from_doc.id,
            default_title,
        };
        debug!(from = %from_doc.id, to_trunk = %to_trunk, to_doc = %head, "Creating link");
        self.create_element(ContentElement::Link(link))
    }

    /// All link elements pointing at this doc snapshot, most recent first
    pub fn get_parents(&self, doc: &Doc) -> Result<Vec<Element>> {
        self.store.links_into_doc(&doc.id)
    }

    /// The doc containing the most recent link into this snapshot, or
    /// `None` for an unreferenced doc.
    pub fn get_parent(&self, doc: &Doc) -> Result<Option<Doc>> {
        for element in self.get_parents(doc)? {
            if let Some(link) = element.as_link() {
                match self.store.get_doc(&link.from_doc_ref)? {
                    Some(parent) => return Ok(Some(parent)),
                    None => {
                        warn!(link = %element.id, from_doc = %link.from_doc_ref,
                              "Link source doc is missing, skipping");
                    }
                }
            }
        }
        Ok(None)
    }

    /// Resolve a doc's content references to stored elements, preserving
    /// order and silently dropping ids that no longer resolve.
    pub fn resolve_content(&self, doc: &Doc) -> Result<Vec<Element>> {
        let mut elements = Vec::with_capacity(doc.content.len());
        for id in &doc.content {
            match self.store.get_element(id)? {
                Some(element) => elements.push(element),
                None => {
                    warn!(doc = %doc.id, element = %id, "Content element is missing, skipping");
                }
            }
        }
        Ok(elements)
    }

    /// Resolve content and attach the decorations `options` asks for.
    ///
    /// Link titles resolve through the target trunk; a target that fails
    /// to resolve falls back to the link's stored default title.
    pub fn resolve_content_with(
        &self,
        doc: &Doc,
        user: &UserId,
        options: ContentOptions,
    ) -> Result<Vec<ResolvedElement>> {
        let mut resolved = Vec::with_capacity(doc.content.len());
        for element in self.resolve_content(doc)? {
            let score = if options.fetch_score {
                element.score(self.store.as_ref(), user)?
            } else {
                None
            };

            let link_title = match (options.resolve_links, element.as_link()) {
                (true, Some(link)) => self.link_title(link, user, options.use_history)?,
                _ => None,
            };

            let video_position = match (&element.kind, options.fetch_video_state) {
                (ContentElement::Video { .. }, true) => self
                    .store
                    .get_video_state(user, &element.id)?
                    .map(|state| state.paused_time),
                _ => None,
            };

            resolved.push(ResolvedElement {
                element,
                score,
                link_title,
                video_position,
            });
        }
        Ok(resolved)
    }

    fn link_title(
        &self,
        link: &DocLink,
        user: &UserId,
        use_history: bool,
    ) -> Result<Option<String>> {
        let target = if use_history {
            self.trunks.get_doc_for_user(&link.trunk_ref, user)
        } else {
            self.trunks.fetch_head(&link.trunk_ref)
        };
        match target {
            Ok(doc) => Ok(Some(doc.title)),
            Err(_) => Ok(link.default_title.clone()),
        }
    }

    /// Expand a doc into its outline tree by following link elements.
    ///
    /// Each trunk is expanded at most once; a link back into a trunk
    /// already on the walk becomes a leaf node instead of recursing, so
    /// cyclic graphs produce a finite tree.
    pub fn outline(&self, doc: &Doc) -> Result<OutlineNode> {
        let mut visited = HashSet::new();
        visited.insert(doc.trunk_ref);
        self.outline_node(doc, &mut visited)
    }

    fn outline_node(&self, doc: &Doc, visited: &mut HashSet<TrunkId>) -> Result<OutlineNode> {
        let mut children = Vec::new();
        for element in self.resolve_content(doc)? {
            let link = match element.as_link() {
                Some(link) => link,
                None => continue,
            };
            let child = match self.store.get_doc(&link.doc_ref)? {
                Some(child) => child,
                None => {
                    warn!(link = %element.id, doc = %link.doc_ref,
                          "Link target doc is missing, skipping");
                    continue;
                }
            };
            if visited.insert(link.trunk_ref) {
                children.push(self.outline_node(&child, visited)?);
            } else {
                // Already expanded elsewhere in the tree; keep the entry
                // but do not recurse.
                children.push(OutlineNode {
                    trunk_ref: child.trunk_ref,
                    doc_ref: child.id,
                    title: child.title,
                    label: child.label,
                    children: Vec::new(),
                });
            }
        }
        Ok(OutlineNode {
            trunk_ref: doc.trunk_ref,
            doc_ref: doc.id,
            title: doc.title.clone(),
            label: doc.label,
            children,
        })
    }

    /// Append a revision of `doc` whose content carries `new_element`
    /// directly after `old_element`.
    ///
    /// Returns the updated trunk and the replacement doc, or `None` when
    /// `old_element` is not part of the doc's content. The source doc is
    /// left untouched.
    pub fn insert_after(
        &self,
        doc: &Doc,
        old_element: &ElementId,
        new_element: &ElementId,
        message: Option<&str>,
    ) -> Result<Option<(Trunk, Doc)>> {
        let position = match doc.content.iter().position(|id| id == old_element) {
            Some(position) => position,
            None => return Ok(None),
        };
        let mut content = doc.content.clone();
        content.insert(position + 1, *new_element);

        let mut successor = doc.clone();
        successor.id = DocId::new();
        successor.content = content;
        successor.created_at = chrono::Utc::now();
        self.store.put_doc(successor.clone())?;
        let trunk = self
            .trunks
            .append_revision(&doc.trunk_ref, &successor.id, message)?;
        Ok(Some((trunk, successor)))
    }
}
