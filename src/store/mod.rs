//! Persistence abstraction.
//!
//! The engine consumes, but does not define, a persistent store offering
//! create/get by id, the handful of filtered and ordered queries the
//! traversal and scoring algorithms need, and one parent-scoped atomic
//! primitive at the trunk/revision boundary. [`MemoryStore`] is the
//! bundled DashMap-backed implementation; production embedders supply
//! their own.

mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::model::{
    Doc, DocId, Element, ElementId, QuizProgressState, RecentCourseState, Revision, TraversalPath,
    Trunk, TrunkId, UserId, VideoState, VisitState, WidgetProgressState,
};

/// Abstract persistent key/value store for the revision graph engine.
///
/// Immutable content objects (trunks, docs, elements, revisions) only ever
/// gain new entries. Per-user state methods upsert whole records with
/// last-writer-wins semantics. Implementations must keep
/// `links_into_trunk`/`links_into_doc` ordered most-recent-first and
/// `recent_courses` ordered most-recently-touched-first.
pub trait Datastore: Send + Sync {
    // ------------------------------------------------------------------
    // Trunks and revisions
    // ------------------------------------------------------------------

    fn get_trunk(&self, id: &TrunkId) -> Result<Option<Trunk>>;

    /// Atomically create a trunk together with its first revision and set
    /// its head. Fails with `InvalidTrunk` if the trunk already exists.
    fn create_trunk_with_doc(
        &self,
        trunk_id: TrunkId,
        doc_id: DocId,
        commit_message: &str,
    ) -> Result<Trunk>;

    /// Atomically append a revision under an existing trunk and advance
    /// its head. The trunk's cached title is refreshed from the new head
    /// doc best-effort; a head that does not resolve is not fatal here.
    /// Fails with `InvalidTrunk` if the trunk does not exist.
    fn commit_revision(
        &self,
        trunk_id: &TrunkId,
        doc_id: &DocId,
        commit_message: &str,
    ) -> Result<Trunk>;

    /// Revision log for a trunk, oldest first
    fn revisions(&self, trunk_id: &TrunkId) -> Result<Vec<Revision>>;

    /// Whether some revision under `trunk_id` references `doc_id`
    fn has_revision(&self, trunk_id: &TrunkId, doc_id: &DocId) -> Result<bool>;

    // ------------------------------------------------------------------
    // Docs and content elements
    // ------------------------------------------------------------------

    fn put_doc(&self, doc: Doc) -> Result<()>;

    fn get_doc(&self, id: &DocId) -> Result<Option<Doc>>;

    fn put_element(&self, element: Element) -> Result<()>;

    fn get_element(&self, id: &ElementId) -> Result<Option<Element>>;

    /// Link elements whose target trunk is `trunk_id`, most recent first,
    /// at most `limit` entries
    fn links_into_trunk(&self, trunk_id: &TrunkId, limit: usize) -> Result<Vec<Element>>;

    /// Link elements whose target doc is `doc_id`, most recent first
    fn links_into_doc(&self, doc_id: &DocId) -> Result<Vec<Element>>;

    // ------------------------------------------------------------------
    // Per-user state
    // ------------------------------------------------------------------

    fn get_visit_state(&self, user: &UserId, trunk_id: &TrunkId) -> Result<Option<VisitState>>;

    fn put_visit_state(&self, state: VisitState) -> Result<()>;

    fn get_traversal_path(
        &self,
        user: &UserId,
        trunk_id: &TrunkId,
    ) -> Result<Option<TraversalPath>>;

    fn put_traversal_path(&self, path: TraversalPath) -> Result<()>;

    fn get_recent_course(
        &self,
        user: &UserId,
        course_trunk: &TrunkId,
    ) -> Result<Option<RecentCourseState>>;

    fn put_recent_course(&self, entry: RecentCourseState) -> Result<()>;

    /// All recent course entries for a user, most recently touched first
    fn recent_courses(&self, user: &UserId) -> Result<Vec<RecentCourseState>>;

    fn get_widget_state(
        &self,
        user: &UserId,
        widget: &ElementId,
    ) -> Result<Option<WidgetProgressState>>;

    fn put_widget_state(&self, state: WidgetProgressState) -> Result<()>;

    fn get_quiz_state(
        &self,
        user: &UserId,
        quiz: &ElementId,
    ) -> Result<Option<QuizProgressState>>;

    fn put_quiz_state(&self, state: QuizProgressState) -> Result<()>;

    fn get_video_state(&self, user: &UserId, video: &ElementId) -> Result<Option<VideoState>>;

    fn put_video_state(&self, state: VideoState) -> Result<()>;
}
