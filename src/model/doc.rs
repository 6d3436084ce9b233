//! Trunks, revisions, document snapshots, and doc links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{DocId, ElementId, TrunkId};

/// Default grade level for new docs
pub const DEFAULT_GRADE_LEVEL: u32 = 10;

/// Semantic label on a doc, used as the rooting point for breadcrumbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocLabel {
    Module,
    Lesson,
    Course,
}

impl Default for DocLabel {
    fn default() -> Self {
        DocLabel::Module
    }
}

/// Stable identity for a logical document.
///
/// A trunk tracks the revisions made to a document. It is mutated only by
/// appending a revision and advancing `head`; it is never deleted. The
/// `title` is a cached copy of the head doc's title, refreshed best-effort
/// on every head advance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trunk {
    pub id: TrunkId,
    /// Doc snapshot currently at the tip of this trunk
    pub head: Option<DocId>,
    /// Cached title of the head doc
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Trunk {
    pub fn new(id: TrunkId) -> Self {
        Self {
            id,
            head: None,
            title: String::new(),
            created_at: Utc::now(),
        }
    }
}

/// Append-only log entry recording a trunk's content at a point in time.
///
/// Revisions are parented under their trunk and are never mutated or
/// deleted; within a trunk they are ordered by timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revision {
    /// Owning trunk
    pub trunk_ref: TrunkId,
    /// Doc snapshot this revision points at
    pub obj_ref: DocId,
    pub commit_message: String,
    pub timestamp: DateTime<Utc>,
}

/// Immutable content snapshot referenced by a revision.
///
/// A doc is an ordered collection of content element references with an
/// associated revision history. An edit never mutates an existing doc;
/// it creates a new doc plus a new revision on the trunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doc {
    pub id: DocId,
    /// Back-pointer to the owning trunk
    pub trunk_ref: TrunkId,
    pub title: String,
    pub label: DocLabel,
    pub grade_level: u32,
    /// Tags, preferably part of some ontology
    pub tags: Vec<String>,
    /// Ordered element references as they appear in the document
    pub content: Vec<ElementId>,
    /// Per-element score weights. Declared for later use; the current
    /// aggregate is an unweighted mean.
    pub score_weight: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// Field values for a doc about to be created.
///
/// The engine assigns the id and the trunk back-pointer when the doc is
/// placed on a trunk.
#[derive(Debug, Clone)]
pub struct DocDraft {
    pub title: String,
    pub label: DocLabel,
    pub grade_level: u32,
    pub tags: Vec<String>,
    pub content: Vec<ElementId>,
    pub score_weight: Vec<f32>,
}

impl Default for DocDraft {
    fn default() -> Self {
        Self {
            title: "Add a title".to_string(),
            label: DocLabel::default(),
            grade_level: DEFAULT_GRADE_LEVEL,
            tags: Vec::new(),
            content: Vec::new(),
            score_weight: Vec::new(),
        }
    }
}

impl DocDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: DocLabel) -> Self {
        self.label = label;
        self
    }

    pub fn with_content(mut self, content: Vec<ElementId>) -> Self {
        self.content = content;
        self
    }

    /// Materialize the draft as a doc on the given trunk
    pub fn into_doc(self, trunk_ref: TrunkId) -> Doc {
        Doc {
            id: DocId::new(),
            trunk_ref,
            title: self.title,
            label: self.label,
            grade_level: self.grade_level,
            tags: self.tags,
            content: self.content,
            score_weight: self.score_weight,
            created_at: Utc::now(),
        }
    }
}

/// Immutable directed edge from one doc's content list to another trunk.
///
/// The target (`trunk_ref`, `doc_ref`) pair snapshots the target trunk's
/// head at link creation time; the link does not advance when the target
/// trunk later does. The link graph is not guaranteed acyclic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocLink {
    /// Trunk the link points into
    pub trunk_ref: TrunkId,
    /// Doc snapshot that was the target trunk's head at creation time
    pub doc_ref: DocId,
    /// Trunk containing this link
    pub from_trunk_ref: TrunkId,
    /// Doc containing this link
    pub from_doc_ref: DocId,
    /// Fallback display title, useful for docs that do not exist yet
    pub default_title: Option<String>,
}
