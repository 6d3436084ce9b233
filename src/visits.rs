//! Per-user breadcrumb cache over the link graph.
//!
//! The breadcrumb for a (user, trunk) pair is cached as a
//! [`TraversalPath`] and maintained incrementally: navigating from a
//! parent doc extends the parent's cached path by one entry instead of
//! re-running the ancestor walk. Cache entries are replaced wholesale,
//! never patched in place, and carry no transactional guarantees beyond
//! last-writer-wins.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::model::{Doc, DocId, DocLabel, TraversalPath, UserId};
use crate::resolver::PathResolver;
use crate::store::Datastore;
use crate::trunk::TrunkStore;

/// How [`VisitStackManager::expand_path`] maps cached doc ids to docs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandMode {
    /// The exact snapshots the path recorded
    Absolute,
    /// The revision the user last visited on each entry's trunk
    History,
    /// The current head of each entry's trunk
    Latest,
}

// ============================================================================
// VisitStackManager
// ============================================================================

/// Incremental maintenance of per-user traversal paths
#[derive(Clone)]
pub struct VisitStackManager {
    store: Arc<dyn Datastore>,
    trunks: TrunkStore,
    resolver: PathResolver,
}

impl VisitStackManager {
    pub fn new(store: Arc<dyn Datastore>, config: Config) -> Self {
        let trunks = TrunkStore::new(store.clone());
        let resolver = PathResolver::new(store.clone(), config);
        Self {
            store,
            trunks,
            resolver,
        }
    }

    /// Record that `user` arrived at `doc`, optionally from `parent`, and
    /// return the breadcrumb now cached for `doc`'s trunk.
    ///
    /// With a course parent the path collapses to that single entry. With
    /// any other parent the parent's own cached path is extended by one,
    /// with two truncation rules keeping cycles out: an ancestor on the
    /// current doc's trunk cuts the path before the parent entirely, and
    /// an ancestor on the parent's trunk becomes the last entry in place
    /// of the parent. Without a parent the cached path is returned as-is,
    /// or computed from scratch on a cache miss.
    pub fn update_visit_stack(
        &self,
        doc: &Doc,
        parent: Option<&Doc>,
        user: &UserId,
    ) -> Result<TraversalPath> {
        let path = match parent {
            Some(parent) if parent.label == DocLabel::Course => vec![parent.id],
            Some(parent) => {
                let parent_path = self.path_for(parent, user)?;
                self.extend_parent_path(doc, parent, &parent_path.path)?
            }
            None => {
                if let Some(cached) = self.store.get_traversal_path(user, &doc.trunk_ref)? {
                    return Ok(cached);
                }
                self.resolver.find_ancestor_course_path(doc)?
            }
        };

        let entry = TraversalPath {
            user: user.clone(),
            current_trunk: doc.trunk_ref,
            current_doc: doc.id,
            path,
        };
        self.store.put_traversal_path(entry.clone())?;
        debug!(user = %user, doc = %doc.id, depth = entry.path.len(), "Updated visit stack");
        Ok(entry)
    }

    /// The cached path for a doc's trunk, computed and persisted on a miss
    fn path_for(&self, doc: &Doc, user: &UserId) -> Result<TraversalPath> {
        if let Some(cached) = self.store.get_traversal_path(user, &doc.trunk_ref)? {
            return Ok(cached);
        }
        let path = self.resolver.find_ancestor_course_path(doc)?;
        let entry = TraversalPath {
            user: user.clone(),
            current_trunk: doc.trunk_ref,
            current_doc: doc.id,
            path,
        };
        self.store.put_traversal_path(entry.clone())?;
        Ok(entry)
    }

    fn extend_parent_path(
        &self,
        doc: &Doc,
        parent: &Doc,
        parent_path: &[DocId],
    ) -> Result<Vec<DocId>> {
        let mut path = Vec::with_capacity(parent_path.len() + 1);
        let mut truncated = false;
        for ancestor_id in parent_path {
            let ancestor = match self.store.get_doc(ancestor_id)? {
                Some(ancestor) => ancestor,
                None => {
                    warn!(doc = %ancestor_id, "Path ancestor doc is missing, skipping");
                    continue;
                }
            };
            if ancestor.trunk_ref == doc.trunk_ref {
                // Walking back onto our own trunk: everything from here
                // down, the parent included, would repeat the cycle.
                truncated = true;
                break;
            }
            if ancestor.trunk_ref == parent.trunk_ref {
                // The parent's trunk already appears above it; keep that
                // occurrence and drop the newer one.
                path.push(*ancestor_id);
                truncated = true;
                break;
            }
            path.push(*ancestor_id);
        }
        if !truncated {
            path.push(parent.id);
        }
        Ok(path)
    }

    /// Expand a cached doc-id path into doc snapshots.
    ///
    /// Entries that fail to resolve are dropped rather than failing the
    /// whole expansion; a cached path may outlive deletions upstream.
    pub fn expand_path(
        &self,
        path: &[DocId],
        user: &UserId,
        mode: ExpandMode,
    ) -> Result<Vec<Doc>> {
        let mut docs = Vec::with_capacity(path.len());
        for doc_id in path {
            let recorded = match self.store.get_doc(doc_id)? {
                Some(doc) => doc,
                None => {
                    warn!(doc = %doc_id, "Path doc is missing, skipping");
                    continue;
                }
            };
            let resolved = match mode {
                ExpandMode::Absolute => Ok(recorded),
                ExpandMode::History => self.trunks.get_doc_for_user(&recorded.trunk_ref, user),
                ExpandMode::Latest => self.trunks.fetch_head(&recorded.trunk_ref),
            };
            match resolved {
                Ok(doc) => docs.push(doc),
                Err(_) => {
                    warn!(doc = %doc_id, ?mode, "Path entry failed to expand, skipping");
                }
            }
        }
        Ok(docs)
    }
}
