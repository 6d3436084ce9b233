//! Per-user hierarchical progress scores.
//!
//! A doc's aggregate score is the rounded mean of its scorable content
//! elements; link elements pull in the score of the trunk they point at,
//! so course scores roll up from lessons. Aggregates are cached on the
//! (user, trunk) visit state and invalidated with dirty bits walked up the
//! user's cached breadcrumb. Invalidation is not transactional across the
//! ancestor set: a partial failure leaves some ancestors stale for one
//! read, which self-corrects on the next write.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{LanternError, Result};
use crate::graph::DocGraph;
use crate::model::{
    ContentElement, Doc, DocLabel, DocLink, Element, QuizProgressState, RecentCourseState,
    TrunkId, UserId, VideoState, VisitState, WidgetProgressState,
};
use crate::store::Datastore;
use crate::trunk::TrunkStore;

/// Flags controlling link resolution during score aggregation
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreOptions {
    /// Resolve link targets to the revision the user last visited instead
    /// of the trunk head
    pub use_history: bool,
    /// Recompute link scores from the target's content instead of trusting
    /// the cached visit state
    pub recurse: bool,
}

// ============================================================================
// ScoreAggregator
// ============================================================================

/// Aggregate score computation, caching, and dirty-bit invalidation
#[derive(Clone)]
pub struct ScoreAggregator {
    store: Arc<dyn Datastore>,
    config: Config,
    trunks: TrunkStore,
    graph: DocGraph,
}

impl ScoreAggregator {
    pub fn new(store: Arc<dyn Datastore>, config: Config) -> Self {
        let trunks = TrunkStore::new(store.clone());
        let graph = DocGraph::new(store.clone());
        Self {
            store,
            config,
            trunks,
            graph,
        }
    }

    /// Cached score of a doc's trunk for `user`; 0 when never visited
    pub fn get_score(&self, doc: &Doc, user: &UserId) -> Result<u32> {
        Ok(self
            .store
            .get_visit_state(user, &doc.trunk_ref)?
            .map(|state| state.progress_score)
            .unwrap_or(0))
    }

    /// Aggregate the scores of `contents` into a score for `doc` and cache
    /// it on the user's visit state, clearing the dirty bit.
    ///
    /// Elements reporting no score are excluded from the mean entirely
    /// rather than counted as zero; an all-unscorable (or empty) content
    /// list aggregates to 0.
    pub fn get_accumulated_score(
        &self,
        doc: &Doc,
        user: &UserId,
        contents: &[Element],
        options: ScoreOptions,
    ) -> Result<u32> {
        let mut active = HashSet::new();
        active.insert(doc.trunk_ref);
        self.accumulate(doc, user, contents, options, &mut active)
    }

    fn accumulate(
        &self,
        doc: &Doc,
        user: &UserId,
        contents: &[Element],
        options: ScoreOptions,
        active: &mut HashSet<TrunkId>,
    ) -> Result<u32> {
        let mut total: u64 = 0;
        let mut count: u64 = 0;
        for element in contents {
            let score = match element.as_link() {
                Some(link) => self.link_score(link, user, options, active)?,
                None => element.score(self.store.as_ref(), user)?,
            };
            if let Some(score) = score {
                total += u64::from(score);
                count += 1;
            }
        }
        let score = if count > 0 {
            (total as f64 / count as f64).round() as u32
        } else {
            0
        };
        self.put_doc_score(doc, user, score)?;
        debug!(doc = %doc.id, user = %user, score, "Accumulated score");
        Ok(score)
    }

    /// Score contribution of a link element.
    ///
    /// Recursing (explicitly requested, or forced by a dirty cache entry)
    /// recomputes the target trunk's aggregate from its content, which also
    /// refreshes that trunk's cache.
    pub fn get_score_for_link(
        &self,
        link: &DocLink,
        user: &UserId,
        options: ScoreOptions,
    ) -> Result<Option<u32>> {
        let mut active = HashSet::new();
        self.link_score(link, user, options, &mut active)
    }

    fn link_score(
        &self,
        link: &DocLink,
        user: &UserId,
        options: ScoreOptions,
        active: &mut HashSet<TrunkId>,
    ) -> Result<Option<u32>> {
        if options.recurse {
            return self.recompute_link(link, user, options, active).map(Some);
        }
        match self.store.get_visit_state(user, &link.trunk_ref)? {
            Some(state) if state.dirty_bit => {
                self.recompute_link(link, user, options, active).map(Some)
            }
            Some(state) => Ok(Some(state.progress_score)),
            None => Ok(Some(0)),
        }
    }

    fn recompute_link(
        &self,
        link: &DocLink,
        user: &UserId,
        options: ScoreOptions,
        active: &mut HashSet<TrunkId>,
    ) -> Result<u32> {
        if !active.insert(link.trunk_ref) {
            // Cycle back into a trunk already being recomputed; fall back
            // to whatever is cached rather than recursing forever.
            return Ok(self
                .store
                .get_visit_state(user, &link.trunk_ref)?
                .map(|state| state.progress_score)
                .unwrap_or(0));
        }
        let target = if options.use_history {
            self.trunks.get_doc_for_user(&link.trunk_ref, user)?
        } else {
            self.trunks.fetch_head(&link.trunk_ref)?
        };
        let contents = self.graph.resolve_content(&target)?;
        let score = self.accumulate(&target, user, &contents, options, active)?;
        active.remove(&link.trunk_ref);
        Ok(score)
    }

    /// Write a fresh aggregate into the user's visit state for the doc's
    /// trunk, clearing the dirty bit.
    pub fn put_doc_score(&self, doc: &Doc, user: &UserId, score: u32) -> Result<()> {
        let state = match self.store.get_visit_state(user, &doc.trunk_ref)? {
            Some(mut state) => {
                state.doc_ref = doc.id;
                state.progress_score = score;
                state.dirty_bit = false;
                state.last_visit = Utc::now();
                state
            }
            None => VisitState::new(user.clone(), doc.trunk_ref, doc.id, score),
        };
        self.store.put_visit_state(state)
    }

    /// Mark every ancestor on the user's cached breadcrumb for this doc's
    /// trunk as needing a score recompute.
    ///
    /// Without a cached breadcrumb nothing is invalidated; the stale
    /// ancestors self-correct the next time their score is written.
    pub fn set_dirty_bits_for_doc(&self, doc: &Doc, user: &UserId) -> Result<()> {
        let path = match self.store.get_traversal_path(user, &doc.trunk_ref)? {
            Some(path) => path,
            None => return Ok(()),
        };
        for ancestor_id in &path.path {
            let ancestor = match self.store.get_doc(ancestor_id)? {
                Some(ancestor) => ancestor,
                None => {
                    warn!(doc = %ancestor_id, "Path ancestor doc is missing, skipping");
                    continue;
                }
            };
            if let Some(mut state) = self.store.get_visit_state(user, &ancestor.trunk_ref)? {
                state.dirty_bit = true;
                self.store.put_visit_state(state)?;
            }
        }
        Ok(())
    }

    /// Upsert the dashboard entry for a course the user is working
    /// through. Ignores docs that are not course-labeled.
    pub fn update_recent_course_entry(
        &self,
        recent_doc: &Doc,
        course: &Doc,
        user: &UserId,
    ) -> Result<()> {
        if course.label != DocLabel::Course {
            return Ok(());
        }
        let score = match self.store.get_visit_state(user, &course.trunk_ref)? {
            Some(state) if state.dirty_bit => {
                let contents = self.graph.resolve_content(course)?;
                self.get_accumulated_score(course, user, &contents, ScoreOptions::default())?
            }
            Some(state) => state.progress_score,
            None => 0,
        };
        self.store.put_recent_course(RecentCourseState {
            user: user.clone(),
            course_trunk_ref: course.trunk_ref,
            course_doc_ref: course.id,
            last_visited_doc_ref: recent_doc.id,
            course_score: score,
            time_stamp: Utc::now(),
        })
    }

    /// Courses the user has touched recently and not finished, most recent
    /// first, capped by configuration. Every dirty cached score on the
    /// list is recomputed (and re-persisted) while iterating, including
    /// entries past the pick cap.
    pub fn get_recent_in_progress_courses(&self, user: &UserId) -> Result<Vec<RecentCourseState>> {
        let mut in_progress = Vec::new();
        for mut entry in self.store.recent_courses(user)? {
            let dirty = self
                .store
                .get_visit_state(user, &entry.course_trunk_ref)?
                .map(|state| state.dirty_bit)
                .unwrap_or(false);
            if dirty {
                // The trunk may have advanced since the entry was written;
                // recompute from the current head, not the recorded
                // snapshot.
                match self.trunks.fetch_head(&entry.course_trunk_ref) {
                    Ok(course) => {
                        let contents = self.graph.resolve_content(&course)?;
                        entry.course_score = self.get_accumulated_score(
                            &course,
                            user,
                            &contents,
                            ScoreOptions::default(),
                        )?;
                        self.store.put_recent_course(entry.clone())?;
                    }
                    Err(_) => {
                        warn!(trunk = %entry.course_trunk_ref,
                              "Recent course head is unresolvable, skipping");
                        continue;
                    }
                }
            }
            if entry.course_score < self.config.score_ceiling
                && in_progress.len() < self.config.recent_courses_limit
            {
                in_progress.push(entry);
            }
        }
        Ok(in_progress)
    }

    // ------------------------------------------------------------------------
    // Per-element progress writes
    // ------------------------------------------------------------------------

    /// The user's session state for a widget element, created empty on
    /// first access.
    pub fn get_or_create_widget_session(
        &self,
        widget: &Element,
        user: &UserId,
    ) -> Result<WidgetProgressState> {
        require_widget(widget)?;
        if let Some(state) = self.store.get_widget_state(user, &widget.id)? {
            return Ok(state);
        }
        let state = WidgetProgressState {
            user: user.clone(),
            widget_ref: widget.id,
            progress_score: None,
            user_data: None,
            time_stamp: Utc::now(),
        };
        self.store.put_widget_state(state.clone())?;
        Ok(state)
    }

    /// Record a widget's reported score and/or opaque payload. Fields not
    /// supplied keep their previous value.
    pub fn put_widget_score(
        &self,
        widget: &Element,
        user: &UserId,
        score: Option<u32>,
        user_data: Option<JsonValue>,
    ) -> Result<WidgetProgressState> {
        let mut state = self.get_or_create_widget_session(widget, user)?;
        if score.is_some() {
            state.progress_score = score;
        }
        if user_data.is_some() {
            state.user_data = user_data;
        }
        state.time_stamp = Utc::now();
        self.store.put_widget_state(state.clone())?;
        Ok(state)
    }

    /// Record the user's score on a quiz element
    pub fn put_quiz_score(&self, quiz: &Element, user: &UserId, score: u32) -> Result<()> {
        if !matches!(quiz.kind, ContentElement::QuizLink { .. }) {
            return Err(LanternError::InvalidQuiz(format!(
                "Element is not a quiz link: {}",
                quiz.id
            )));
        }
        self.store.put_quiz_state(QuizProgressState {
            user: user.clone(),
            quiz_ref: quiz.id,
            progress_score: score,
            time_stamp: Utc::now(),
        })
    }

    /// Save the user's playback position on a video element
    pub fn put_video_position(&self, video: &Element, user: &UserId, paused_time: f64) -> Result<()> {
        if !matches!(video.kind, ContentElement::Video { .. }) {
            return Err(LanternError::InvalidElement(format!(
                "Element is not a video: {}",
                video.id
            )));
        }
        self.store.put_video_state(VideoState {
            user: user.clone(),
            video_ref: video.id,
            paused_time,
        })
    }
}

fn require_widget(element: &Element) -> Result<()> {
    if matches!(element.kind, ContentElement::Widget { .. }) {
        Ok(())
    } else {
        Err(LanternError::InvalidWidget(format!(
            "Element is not a widget: {}",
            element.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocDraft;
    use crate::store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        trunks: TrunkStore,
        graph: DocGraph,
        scores: ScoreAggregator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::default());
        Fixture {
            store: store.clone(),
            trunks: TrunkStore::new(store.clone()),
            graph: DocGraph::new(store.clone()),
            scores: ScoreAggregator::new(store, Config::default()),
        }
    }

    fn widget(fx: &Fixture) -> Element {
        fx.graph
            .create_element(ContentElement::Widget {
                widget_url: "/widget/shell".to_string(),
                title: None,
                width: None,
                height: None,
                is_shared: false,
            })
            .unwrap()
    }

    #[test]
    fn test_empty_content_scores_zero() {
        let fx = fixture();
        let user = UserId::new("alice");
        let (_, doc) = fx.trunks.create_trunk(DocDraft::titled("Empty"), None).unwrap();

        let score = fx
            .scores
            .get_accumulated_score(&doc, &user, &[], ScoreOptions::default())
            .unwrap();
        assert_eq!(score, 0);
        // The zero aggregate is still cached.
        assert!(fx.store.get_visit_state(&user, &doc.trunk_ref).unwrap().is_some());
    }

    #[test]
    fn test_mean_excludes_unscorable_elements() {
        let fx = fixture();
        let user = UserId::new("alice");

        let text = fx
            .graph
            .create_element(ContentElement::RichText {
                data: "intro".to_string(),
            })
            .unwrap();
        let widget = widget(&fx);
        fx.scores
            .put_widget_score(&widget, &user, Some(8), None)
            .unwrap();

        // A linked lesson whose cached score is 4.
        let (lesson_trunk, lesson) = fx.trunks.create_trunk(DocDraft::titled("Lesson"), None).unwrap();
        fx.scores.put_doc_score(&lesson, &user, 4).unwrap();

        let (_, doc) = fx.trunks.create_trunk(DocDraft::titled("Module"), None).unwrap();
        let link = fx.graph.create_link(&doc, &lesson_trunk.id, None).unwrap();

        let contents = vec![text, widget, link];
        let score = fx
            .scores
            .get_accumulated_score(&doc, &user, &contents, ScoreOptions::default())
            .unwrap();
        // Rich text contributes nothing; mean of 8 and 4.
        assert_eq!(score, 6);
        assert_eq!(fx.scores.get_score(&doc, &user).unwrap(), 6);
    }

    #[test]
    fn test_dirty_link_forces_recompute() {
        let fx = fixture();
        let user = UserId::new("alice");

        let widget = widget(&fx);
        fx.scores
            .put_widget_score(&widget, &user, Some(40), None)
            .unwrap();
        let (lesson_trunk, lesson) = fx
            .trunks
            .create_trunk(DocDraft::titled("Lesson").with_content(vec![widget.id]), None)
            .unwrap();

        // Stale cache: 10, marked dirty.
        fx.scores.put_doc_score(&lesson, &user, 10).unwrap();
        let mut state = fx
            .store
            .get_visit_state(&user, &lesson_trunk.id)
            .unwrap()
            .unwrap();
        state.dirty_bit = true;
        fx.store.put_visit_state(state).unwrap();

        let (_, module) = fx.trunks.create_trunk(DocDraft::titled("Module"), None).unwrap();
        let link = fx.graph.create_link(&module, &lesson_trunk.id, None).unwrap();

        let score = fx
            .scores
            .get_score_for_link(link.as_link().unwrap(), &user, ScoreOptions::default())
            .unwrap();
        assert_eq!(score, Some(40));
        // The recompute refreshed the lesson's cache and cleared the bit.
        let state = fx
            .store
            .get_visit_state(&user, &lesson_trunk.id)
            .unwrap()
            .unwrap();
        assert_eq!(state.progress_score, 40);
        assert!(!state.dirty_bit);
    }

    #[test]
    fn test_clean_link_uses_cache_and_absent_is_zero() {
        let fx = fixture();
        let user = UserId::new("alice");
        let (lesson_trunk, lesson) = fx.trunks.create_trunk(DocDraft::titled("Lesson"), None).unwrap();
        let (_, module) = fx.trunks.create_trunk(DocDraft::titled("Module"), None).unwrap();
        let link = fx.graph.create_link(&module, &lesson_trunk.id, None).unwrap();
        let link = link.as_link().unwrap().clone();

        assert_eq!(
            fx.scores
                .get_score_for_link(&link, &user, ScoreOptions::default())
                .unwrap(),
            Some(0)
        );

        fx.scores.put_doc_score(&lesson, &user, 55).unwrap();
        assert_eq!(
            fx.scores
                .get_score_for_link(&link, &user, ScoreOptions::default())
                .unwrap(),
            Some(55)
        );
    }

    #[test]
    fn test_dirty_bits_walk_the_cached_path() {
        use crate::model::TraversalPath;

        let fx = fixture();
        let user = UserId::new("alice");
        let (_, course) = fx
            .trunks
            .create_trunk(DocDraft::titled("Course").with_label(DocLabel::Course), None)
            .unwrap();
        let (_, lesson) = fx.trunks.create_trunk(DocDraft::titled("Lesson"), None).unwrap();

        fx.scores.put_doc_score(&course, &user, 50).unwrap();
        fx.store
            .put_traversal_path(TraversalPath {
                user: user.clone(),
                current_trunk: lesson.trunk_ref,
                current_doc: lesson.id,
                path: vec![course.id],
            })
            .unwrap();

        fx.scores.set_dirty_bits_for_doc(&lesson, &user).unwrap();
        let state = fx
            .store
            .get_visit_state(&user, &course.trunk_ref)
            .unwrap()
            .unwrap();
        assert!(state.dirty_bit);

        // With no cached path, invalidation is a no-op.
        let (_, orphan) = fx.trunks.create_trunk(DocDraft::titled("Orphan"), None).unwrap();
        fx.scores.set_dirty_bits_for_doc(&orphan, &user).unwrap();
    }

    #[test]
    fn test_recent_courses_filters_finished_and_caps() {
        let fx = fixture();
        let user = UserId::new("alice");

        let mut expected = Vec::new();
        for i in 0..7 {
            let (_, course) = fx
                .trunks
                .create_trunk(
                    DocDraft::titled(format!("Course {}", i)).with_label(DocLabel::Course),
                    None,
                )
                .unwrap();
            let score = if i == 0 { 100 } else { 30 };
            fx.scores.put_doc_score(&course, &user, score).unwrap();
            fx.scores
                .update_recent_course_entry(&course, &course, &user)
                .unwrap();
            if i != 0 {
                expected.push(course.trunk_ref);
            }
        }

        let recent = fx.scores.get_recent_in_progress_courses(&user).unwrap();
        // The finished course drops out, and the cap holds.
        assert_eq!(recent.len(), 5);
        assert!(recent.iter().all(|entry| entry.course_score < 100));
        // Most recently touched first.
        expected.reverse();
        let got: Vec<_> = recent.iter().map(|entry| entry.course_trunk_ref).collect();
        assert_eq!(got, &expected[..5]);
    }

    #[test]
    fn test_dirty_recent_course_recomputes_from_current_head() {
        let fx = fixture();
        let user = UserId::new("alice");

        // Course v1 is empty; the dashboard entry is recorded against it.
        let (course_trunk, v1) = fx
            .trunks
            .create_trunk(DocDraft::titled("Course").with_label(DocLabel::Course), None)
            .unwrap();
        fx.scores.put_doc_score(&v1, &user, 0).unwrap();
        fx.scores
            .update_recent_course_entry(&v1, &v1, &user)
            .unwrap();

        // The trunk advances to a revision containing a widget scored 80.
        let widget = widget(&fx);
        fx.scores
            .put_widget_score(&widget, &user, Some(80), None)
            .unwrap();
        let (_, v2) = fx
            .trunks
            .create_new_doc(
                Some(&course_trunk.id),
                DocDraft::titled("Course")
                    .with_label(DocLabel::Course)
                    .with_content(vec![widget.id]),
                None,
            )
            .unwrap();

        let mut state = fx
            .store
            .get_visit_state(&user, &course_trunk.id)
            .unwrap()
            .unwrap();
        state.dirty_bit = true;
        fx.store.put_visit_state(state).unwrap();

        // The recompute must aggregate the head's content, not the
        // obsolete v1 snapshot the entry still references.
        let recent = fx.scores.get_recent_in_progress_courses(&user).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].course_score, 80);

        // The refreshed aggregate is persisted and the dirty bit cleared.
        let state = fx
            .store
            .get_visit_state(&user, &course_trunk.id)
            .unwrap()
            .unwrap();
        assert_eq!(state.progress_score, 80);
        assert!(!state.dirty_bit);
        assert_eq!(state.doc_ref, v2.id);
        let entry = fx
            .store
            .get_recent_course(&user, &course_trunk.id)
            .unwrap()
            .unwrap();
        assert_eq!(entry.course_score, 80);
    }

    #[test]
    fn test_dirty_entries_past_the_pick_cap_still_refresh() {
        let fx = fixture();
        let user = UserId::new("alice");

        let mut trunks = Vec::new();
        for i in 0..6 {
            let widget = widget(&fx);
            fx.scores
                .put_widget_score(&widget, &user, Some(50), None)
                .unwrap();
            let (trunk, course) = fx
                .trunks
                .create_trunk(
                    DocDraft::titled(format!("Course {}", i))
                        .with_label(DocLabel::Course)
                        .with_content(vec![widget.id]),
                    None,
                )
                .unwrap();
            fx.scores.put_doc_score(&course, &user, 10).unwrap();
            fx.scores
                .update_recent_course_entry(&course, &course, &user)
                .unwrap();
            let mut state = fx.store.get_visit_state(&user, &trunk.id).unwrap().unwrap();
            state.dirty_bit = true;
            fx.store.put_visit_state(state).unwrap();
            trunks.push(trunk.id);
        }

        let recent = fx.scores.get_recent_in_progress_courses(&user).unwrap();
        assert_eq!(recent.len(), 5);

        // The oldest entry missed the cap but its cache was still
        // refreshed on the way past.
        let entry = fx
            .store
            .get_recent_course(&user, &trunks[0])
            .unwrap()
            .unwrap();
        assert_eq!(entry.course_score, 50);
        let state = fx.store.get_visit_state(&user, &trunks[0]).unwrap().unwrap();
        assert!(!state.dirty_bit);
    }

    #[test]
    fn test_update_recent_course_ignores_non_courses() {
        let fx = fixture();
        let user = UserId::new("alice");
        let (_, lesson) = fx.trunks.create_trunk(DocDraft::titled("Lesson"), None).unwrap();
        fx.scores
            .update_recent_course_entry(&lesson, &lesson, &user)
            .unwrap();
        assert!(fx.store.recent_courses(&user).unwrap().is_empty());
    }

    #[test]
    fn test_widget_session_and_score_writes() {
        let fx = fixture();
        let user = UserId::new("alice");
        let widget = widget(&fx);

        let session = fx.scores.get_or_create_widget_session(&widget, &user).unwrap();
        assert_eq!(session.progress_score, None);

        fx.scores
            .put_widget_score(&widget, &user, Some(70), Some(serde_json::json!({"step": 3})))
            .unwrap();
        let state = fx
            .store
            .get_widget_state(&user, &widget.id)
            .unwrap()
            .unwrap();
        assert_eq!(state.progress_score, Some(70));
        assert_eq!(state.user_data.as_ref().unwrap()["step"], 3);

        // Omitted fields keep their previous value.
        fx.scores.put_widget_score(&widget, &user, None, None).unwrap();
        let state = fx
            .store
            .get_widget_state(&user, &widget.id)
            .unwrap()
            .unwrap();
        assert_eq!(state.progress_score, Some(70));

        let text = fx
            .graph
            .create_element(ContentElement::RichText {
                data: "x".to_string(),
            })
            .unwrap();
        assert!(fx.scores.get_or_create_widget_session(&text, &user).is_err());
    }
}
