//! Domain models for the revision graph.
//!
//! Content objects (trunks, revisions, docs, links, elements) are
//! immutable once created; an edit always appends. Per-user state
//! (visit states, traversal paths, progress entries) is mutable cache
//! with last-writer-wins semantics.

mod content;
mod doc;
mod ids;
mod state;

pub use content::{ContentElement, Element};
pub use doc::{Doc, DocDraft, DocLabel, DocLink, Revision, Trunk};
pub use ids::{DocId, ElementId, TrunkId, UserId};
pub use state::{
    QuizProgressState, RecentCourseState, TraversalPath, VideoState, VisitState,
    WidgetProgressState,
};
