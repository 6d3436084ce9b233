//! The facade the surrounding view layer talks to.
//!
//! [`Library`] wires the components over one shared datastore handle and
//! re-exposes the operations an embedding application needs, so callers
//! hold a single value instead of six. The components stay public for
//! callers that want them directly.

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::graph::{ContentOptions, DocGraph, ResolvedElement};
use crate::model::{Doc, DocDraft, DocId, Element, TraversalPath, Trunk, TrunkId, UserId};
use crate::nav::{NavParams, SequentialNavigator};
use crate::resolver::PathResolver;
use crate::score::{ScoreAggregator, ScoreOptions};
use crate::store::Datastore;
use crate::trunk::TrunkStore;
use crate::visits::VisitStackManager;

/// Revision graph, traversal, and scoring engine behind one handle
#[derive(Clone)]
pub struct Library {
    store: Arc<dyn Datastore>,
    config: Config,
    trunks: TrunkStore,
    graph: DocGraph,
    resolver: PathResolver,
    visits: VisitStackManager,
    scores: ScoreAggregator,
    nav: SequentialNavigator,
}

impl Library {
    pub fn new(store: Arc<dyn Datastore>, config: Config) -> Self {
        Self {
            trunks: TrunkStore::new(store.clone()),
            graph: DocGraph::new(store.clone()),
            resolver: PathResolver::new(store.clone(), config.clone()),
            visits: VisitStackManager::new(store.clone(), config.clone()),
            scores: ScoreAggregator::new(store.clone(), config.clone()),
            nav: SequentialNavigator::new(store.clone()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Datastore> {
        &self.store
    }

    // ------------------------------------------------------------------------
    // Component access
    // ------------------------------------------------------------------------

    pub fn trunks(&self) -> &TrunkStore {
        &self.trunks
    }

    pub fn graph(&self) -> &DocGraph {
        &self.graph
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn visits(&self) -> &VisitStackManager {
        &self.visits
    }

    pub fn scores(&self) -> &ScoreAggregator {
        &self.scores
    }

    pub fn nav(&self) -> &SequentialNavigator {
        &self.nav
    }

    // ------------------------------------------------------------------------
    // View-layer surface
    // ------------------------------------------------------------------------

    /// Head of a trunk, or a specific revision when `doc_id` is given
    pub fn fetch_doc(&self, trunk_id: &TrunkId, doc_id: Option<&DocId>) -> Result<Doc> {
        self.trunks.fetch_doc(trunk_id, doc_id)
    }

    /// The revision of a trunk the user last visited, else the head
    pub fn get_doc_for_user(&self, trunk_id: &TrunkId, user: &UserId) -> Result<Doc> {
        self.trunks.get_doc_for_user(trunk_id, user)
    }

    /// Create a doc on an existing trunk, or on a new one when `trunk_id`
    /// is `None`.
    pub fn create_new_doc(
        &self,
        trunk_id: Option<&TrunkId>,
        draft: DocDraft,
        message: Option<&str>,
    ) -> Result<(Trunk, Doc)> {
        self.trunks.create_new_doc(trunk_id, draft, message)
    }

    /// Append an existing doc snapshot as a trunk's next revision
    pub fn append_to_trunk(
        &self,
        trunk_id: &TrunkId,
        doc_id: &DocId,
        message: Option<&str>,
    ) -> Result<Trunk> {
        self.trunks.append_revision(trunk_id, doc_id, message)
    }

    /// Resolve and decorate a doc's content for rendering
    pub fn get_doc_contents(
        &self,
        doc: &Doc,
        user: &UserId,
        options: ContentOptions,
    ) -> Result<Vec<ResolvedElement>> {
        self.graph.resolve_content_with(doc, user, options)
    }

    /// Record a visit and return the user's breadcrumb for the doc
    pub fn update_visit_stack(
        &self,
        doc: &Doc,
        parent: Option<&Doc>,
        user: &UserId,
    ) -> Result<TraversalPath> {
        self.visits.update_visit_stack(doc, parent, user)
    }

    /// Aggregate and cache a doc's score from its content
    pub fn get_accumulated_score(
        &self,
        doc: &Doc,
        user: &UserId,
        contents: &[Element],
        options: ScoreOptions,
    ) -> Result<u32> {
        self.scores.get_accumulated_score(doc, user, contents, options)
    }

    /// Write a fresh score into the user's visit state for the doc
    pub fn put_doc_score(&self, doc: &Doc, user: &UserId, score: u32) -> Result<()> {
        self.scores.put_doc_score(doc, user, score)
    }

    /// Invalidate cached ancestor scores along the user's breadcrumb
    pub fn set_dirty_bits_for_doc(&self, doc: &Doc, user: &UserId) -> Result<()> {
        self.scores.set_dirty_bits_for_doc(doc, user)
    }

    /// Greedy walk up the incoming-link graph toward a course
    pub fn get_path_till_course(&self, doc: &Doc) -> Result<Vec<DocId>> {
        self.resolver.find_ancestor_course_path(doc)
    }

    /// Natural previous/next navigation targets from a doc
    pub fn get_prev_next_links(
        &self,
        doc: &Doc,
        visit: Option<&TraversalPath>,
        came_from: Option<&Doc>,
    ) -> Result<(Option<NavParams>, Option<NavParams>)> {
        self.nav.get_prev_next_links(doc, visit, came_from)
    }
}
