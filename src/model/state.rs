//! Per-user cached state.
//!
//! None of these carry transactional guarantees; overlapping requests from
//! the same user resolve last-writer-wins. They are caches over the
//! immutable content graph, not shared ground truth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::ids::{DocId, ElementId, TrunkId, UserId};

/// Visit and progress state for one (user, trunk) pair.
///
/// `dirty_bit` set means the cached `progress_score` may be stale and must
/// be recomputed before being trusted; it is cleared exactly when a fresh
/// aggregate is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitState {
    pub user: UserId,
    pub trunk_ref: TrunkId,
    /// Doc snapshot last seen on this trunk
    pub doc_ref: DocId,
    /// Completion score, 0 to 100
    pub progress_score: u32,
    pub dirty_bit: bool,
    pub last_visit: DateTime<Utc>,
}

impl VisitState {
    pub fn new(user: UserId, trunk_ref: TrunkId, doc_ref: DocId, progress_score: u32) -> Self {
        Self {
            user,
            trunk_ref,
            doc_ref,
            progress_score,
            dirty_bit: false,
            last_visit: Utc::now(),
        }
    }
}

/// Cached breadcrumb for one (user, trunk) pair.
///
/// `path` holds ancestor doc ids from a course-like root down to, but
/// excluding, the current doc. Replaced wholesale on each recompute,
/// never appended in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalPath {
    pub user: UserId,
    pub current_trunk: TrunkId,
    pub current_doc: DocId,
    /// Ordered ancestor doc ids, root end first
    pub path: Vec<DocId>,
}

/// Dashboard cache entry for a recently visited course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentCourseState {
    pub user: UserId,
    pub course_trunk_ref: TrunkId,
    pub course_doc_ref: DocId,
    /// Doc last visited within the course
    pub last_visited_doc_ref: DocId,
    /// Cached aggregate course score
    pub course_score: u32,
    pub time_stamp: DateTime<Utc>,
}

/// Per-user progress for a widget element.
///
/// Doubles as the widget's session: a session opened before any scoring
/// has `progress_score = None`, which keeps the widget out of aggregate
/// means until it reports something.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WidgetProgressState {
    pub user: UserId,
    pub widget_ref: ElementId,
    pub progress_score: Option<u32>,
    /// Opaque payload persisted on behalf of the widget
    pub user_data: Option<JsonValue>,
    pub time_stamp: DateTime<Utc>,
}

/// Per-user progress for a quiz element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizProgressState {
    pub user: UserId,
    pub quiz_ref: ElementId,
    pub progress_score: u32,
    pub time_stamp: DateTime<Utc>,
}

/// Paused position of a video for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoState {
    pub user: UserId,
    pub video_ref: ElementId,
    /// Seconds into the video
    pub paused_time: f64,
}
