//! Derived sequential navigation over the link graph.
//!
//! "Next page" is not stored anywhere; it is derived on demand from the
//! current doc's content order plus the user's cached breadcrumb. Links
//! are matched by the *current tip* of their target trunk, not by the
//! snapshot the link recorded, so navigation follows trunks as they
//! advance.

use std::sync::Arc;

use tracing::warn;

use crate::error::Result;
use crate::model::{Doc, DocId, DocLink, TraversalPath, TrunkId};
use crate::store::Datastore;
use crate::trunk::TrunkStore;

/// Everything the view layer needs to render a navigation target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavParams {
    pub trunk_id: TrunkId,
    pub doc_id: DocId,
    pub parent_trunk: Option<TrunkId>,
    pub parent_id: Option<DocId>,
    /// Doc the user is leaving from, when revisiting a page to show the
    /// material after a child link
    pub came_from: Option<DocId>,
}

// ============================================================================
// SequentialNavigator
// ============================================================================

/// Next-page computation from content order and the visit stack
#[derive(Clone)]
pub struct SequentialNavigator {
    store: Arc<dyn Datastore>,
    trunks: TrunkStore,
}

impl SequentialNavigator {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        let trunks = TrunkStore::new(store.clone());
        Self { store, trunks }
    }

    /// Current tip of a link's target trunk, or `None` if it cannot be
    /// resolved (headless or deleted trunks are skipped, not errors here).
    fn link_tip(&self, link: &DocLink) -> Result<Option<Doc>> {
        match self.trunks.fetch_head(&link.trunk_ref) {
            Ok(tip) => Ok(Some(tip)),
            Err(_) => {
                warn!(trunk = %link.trunk_ref, "Link target tip is unresolvable, skipping");
                Ok(None)
            }
        }
    }

    /// The tip the user would land on for `child`: the current head of
    /// its trunk.
    fn child_tip(&self, child: &Doc) -> Result<Option<DocId>> {
        Ok(self
            .trunks
            .fetch_head(&child.trunk_ref)
            .ok()
            .map(|tip| tip.id))
    }

    /// Target of the first link in `doc`'s content after the link pointing
    /// at `after`'s trunk; the first link overall when `after` is `None`.
    pub fn first_child_after(&self, doc: &Doc, after: Option<&Doc>) -> Result<Option<Doc>> {
        let mut skip_until = match after {
            Some(after) => self.child_tip(after)?,
            None => None,
        };
        for element_id in &doc.content {
            let element = match self.store.get_element(element_id)? {
                Some(element) => element,
                None => continue,
            };
            let link = match element.as_link() {
                Some(link) => link,
                None => continue,
            };
            let tip = match self.link_tip(link)? {
                Some(tip) => tip,
                None => continue,
            };
            match skip_until {
                None => return Ok(Some(tip)),
                Some(id) if id == tip.id => skip_until = None,
                Some(_) => {}
            }
        }
        Ok(None)
    }

    /// What follows `child` inside `doc`.
    ///
    /// A link immediately after the link to `child` yields that link's
    /// tip. Non-link material after it yields `doc` itself, which tells
    /// the caller to show this page again. Nothing after it yields `None`,
    /// which sends the caller up to the grandparent.
    pub fn next_child_or_self(&self, doc: &Doc, child: &Doc) -> Result<Option<Doc>> {
        let mut skip_until = self.child_tip(child)?;
        for element_id in &doc.content {
            let element = match self.store.get_element(element_id)? {
                Some(element) => element,
                None => continue,
            };
            let link = match element.as_link() {
                Some(link) => link,
                None => {
                    if skip_until.is_none() {
                        return Ok(Some(doc.clone()));
                    }
                    continue;
                }
            };
            let tip = match self.link_tip(link)? {
                Some(tip) => tip,
                None => continue,
            };
            match skip_until {
                None => return Ok(Some(tip)),
                Some(id) if id == tip.id => skip_until = None,
                Some(_) => {}
            }
        }
        Ok(None)
    }

    /// Compute the natural previous and next page from `doc`.
    ///
    /// "Previous" is a placeholder and always `None`. "Next" descends into
    /// the first child after `came_from` (or the first child outright),
    /// and when the children are exhausted walks the visit stack outward,
    /// asking each ancestor what follows the doc the walk came up from.
    pub fn get_prev_next_links(
        &self,
        doc: &Doc,
        visit: Option<&TraversalPath>,
        came_from: Option<&Doc>,
    ) -> Result<(Option<NavParams>, Option<NavParams>)> {
        let prev_param = None;

        let mut next = self.first_child_after(doc, came_from)?;
        let mut next_came_from: Option<DocId> = None;

        if next.is_none() {
            if let Some(visit) = visit {
                let mut child = doc.clone();
                for ancestor_id in visit.path.iter().rev() {
                    let parent = match self.store.get_doc(ancestor_id)? {
                        Some(parent) => parent,
                        None => {
                            warn!(doc = %ancestor_id, "Path ancestor doc is missing, skipping");
                            continue;
                        }
                    };
                    if let Some(candidate) = self.next_child_or_self(&parent, &child)? {
                        if candidate.id == parent.id {
                            // The parent has non-link material after the
                            // link to this child; revisit the parent and
                            // remember where we left off.
                            next_came_from = Some(child.id);
                        }
                        next = Some(candidate);
                        break;
                    }
                    child = parent;
                }
            }
        }

        let next_param = self.view_doc_param(next.as_ref(), visit, next_came_from);
        Ok((prev_param, next_param))
    }

    /// Build the parameters for landing on `doc`, locating its parent in
    /// the visit stack when one is there.
    fn view_doc_param(
        &self,
        doc: Option<&Doc>,
        visit: Option<&TraversalPath>,
        came_from: Option<DocId>,
    ) -> Option<NavParams> {
        let doc = doc?;
        let mut params = NavParams {
            trunk_id: doc.trunk_ref,
            doc_id: doc.id,
            parent_trunk: None,
            parent_id: None,
            came_from,
        };
        if let Some(visit) = visit {
            if let Some(position) = visit.path.iter().rposition(|id| *id == doc.id) {
                if position > 0 {
                    if let Ok(Some(parent)) = self.store.get_doc(&visit.path[position - 1]) {
                        params.parent_trunk = Some(parent.trunk_ref);
                        params.parent_id = Some(parent.id);
                    }
                }
            }
        }
        Some(params)
    }
}
