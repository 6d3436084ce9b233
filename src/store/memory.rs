//! In-memory datastore backed by DashMap.
//!
//! Keeps the same guarantees the trait asks of a production store: the
//! trunk/revision append is atomic per trunk (the trunk's shard entry is
//! held exclusively while the revision is logged and the head advanced),
//! and link listings come back most-recent-first. Everything else is
//! plain upsert.

use chrono::Utc;
use dashmap::DashMap;
use tracing::debug;

use super::Datastore;
use crate::error::{LanternError, Result};
use crate::model::{
    ContentElement, Doc, DocId, Element, ElementId, QuizProgressState, RecentCourseState,
    Revision, TraversalPath, Trunk, TrunkId, UserId, VideoState, VisitState, WidgetProgressState,
};

/// DashMap-backed [`Datastore`] implementation
#[derive(Default)]
pub struct MemoryStore {
    trunks: DashMap<TrunkId, Trunk>,
    docs: DashMap<DocId, Doc>,
    revisions: DashMap<TrunkId, Vec<Revision>>,
    elements: DashMap<ElementId, Element>,
    /// Link element ids by target trunk, in creation order
    links_by_trunk: DashMap<TrunkId, Vec<ElementId>>,
    /// Link element ids by target doc, in creation order
    links_by_doc: DashMap<DocId, Vec<ElementId>>,
    visit_states: DashMap<(UserId, TrunkId), VisitState>,
    traversal_paths: DashMap<(UserId, TrunkId), TraversalPath>,
    recent_courses: DashMap<(UserId, TrunkId), RecentCourseState>,
    widget_states: DashMap<(UserId, ElementId), WidgetProgressState>,
    quiz_states: DashMap<(UserId, ElementId), QuizProgressState>,
    video_states: DashMap<(UserId, ElementId), VideoState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve_links(&self, ids: &[ElementId], limit: usize) -> Vec<Element> {
        // Creation order is insertion order; most-recent-first is the
        // reverse.
        ids.iter()
            .rev()
            .take(limit)
            .filter_map(|id| self.elements.get(id).map(|e| e.value().clone()))
            .collect()
    }
}

impl Datastore for MemoryStore {
    fn get_trunk(&self, id: &TrunkId) -> Result<Option<Trunk>> {
        Ok(self.trunks.get(id).map(|t| t.value().clone()))
    }

    fn create_trunk_with_doc(
        &self,
        trunk_id: TrunkId,
        doc_id: DocId,
        commit_message: &str,
    ) -> Result<Trunk> {
        use dashmap::mapref::entry::Entry;

        match self.trunks.entry(trunk_id) {
            Entry::Occupied(_) => Err(LanternError::InvalidTrunk(format!(
                "Trunk already exists: {}",
                trunk_id
            ))),
            Entry::Vacant(slot) => {
                self.revisions.entry(trunk_id).or_default().push(Revision {
                    trunk_ref: trunk_id,
                    obj_ref: doc_id,
                    commit_message: commit_message.to_string(),
                    timestamp: Utc::now(),
                });
                let mut trunk = Trunk::new(trunk_id);
                trunk.head = Some(doc_id);
                if let Some(doc) = self.docs.get(&doc_id) {
                    trunk.title = doc.title.clone();
                }
                let trunk = slot.insert(trunk).clone();
                debug!(trunk_id = %trunk_id, doc_id = %doc_id, "Created trunk");
                Ok(trunk)
            }
        }
    }

    fn commit_revision(
        &self,
        trunk_id: &TrunkId,
        doc_id: &DocId,
        commit_message: &str,
    ) -> Result<Trunk> {
        // The exclusive ref keeps the revision log and the head advance
        // a single unit with respect to other writers of this trunk.
        let mut trunk = self.trunks.get_mut(trunk_id).ok_or_else(|| {
            LanternError::InvalidTrunk(format!("Trunk is not valid: {}", trunk_id))
        })?;
        self.revisions.entry(*trunk_id).or_default().push(Revision {
            trunk_ref: *trunk_id,
            obj_ref: *doc_id,
            commit_message: commit_message.to_string(),
            timestamp: Utc::now(),
        });
        trunk.head = Some(*doc_id);
        // Best-effort title cache refresh; an unresolvable head is the
        // caller's problem, not a failed append.
        if let Some(doc) = self.docs.get(doc_id) {
            trunk.title = doc.title.clone();
        }
        Ok(trunk.clone())
    }

    fn revisions(&self, trunk_id: &TrunkId) -> Result<Vec<Revision>> {
        Ok(self
            .revisions
            .get(trunk_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    fn has_revision(&self, trunk_id: &TrunkId, doc_id: &DocId) -> Result<bool> {
        Ok(self
            .revisions
            .get(trunk_id)
            .map(|revs| revs.value().iter().any(|r| r.obj_ref == *doc_id))
            .unwrap_or(false))
    }

    fn put_doc(&self, doc: Doc) -> Result<()> {
        self.docs.insert(doc.id, doc);
        Ok(())
    }

    fn get_doc(&self, id: &DocId) -> Result<Option<Doc>> {
        Ok(self.docs.get(id).map(|d| d.value().clone()))
    }

    fn put_element(&self, element: Element) -> Result<()> {
        if let ContentElement::Link(link) = &element.kind {
            self.links_by_trunk
                .entry(link.trunk_ref)
                .or_default()
                .push(element.id);
            self.links_by_doc
                .entry(link.doc_ref)
                .or_default()
                .push(element.id);
        }
        self.elements.insert(element.id, element);
        Ok(())
    }

    fn get_element(&self, id: &ElementId) -> Result<Option<Element>> {
        Ok(self.elements.get(id).map(|e| e.value().clone()))
    }

    fn links_into_trunk(&self, trunk_id: &TrunkId, limit: usize) -> Result<Vec<Element>> {
        Ok(self
            .links_by_trunk
            .get(trunk_id)
            .map(|ids| self.resolve_links(ids.value(), limit))
            .unwrap_or_default())
    }

    fn links_into_doc(&self, doc_id: &DocId) -> Result<Vec<Element>> {
        Ok(self
            .links_by_doc
            .get(doc_id)
            .map(|ids| self.resolve_links(ids.value(), usize::MAX))
            .unwrap_or_default())
    }

    fn get_visit_state(&self, user: &UserId, trunk_id: &TrunkId) -> Result<Option<VisitState>> {
        Ok(self
            .visit_states
            .get(&(user.clone(), *trunk_id))
            .map(|s| s.value().clone()))
    }

    fn put_visit_state(&self, state: VisitState) -> Result<()> {
        self.visit_states
            .insert((state.user.clone(), state.trunk_ref), state);
        Ok(())
    }

    fn get_traversal_path(
        &self,
        user: &UserId,
        trunk_id: &TrunkId,
    ) -> Result<Option<TraversalPath>> {
        Ok(self
            .traversal_paths
            .get(&(user.clone(), *trunk_id))
            .map(|p| p.value().clone()))
    }

    fn put_traversal_path(&self, path: TraversalPath) -> Result<()> {
        self.traversal_paths
            .insert((path.user.clone(), path.current_trunk), path);
        Ok(())
    }

    fn get_recent_course(
        &self,
        user: &UserId,
        course_trunk: &TrunkId,
    ) -> Result<Option<RecentCourseState>> {
        Ok(self
            .recent_courses
            .get(&(user.clone(), *course_trunk))
            .map(|e| e.value().clone()))
    }

    fn put_recent_course(&self, entry: RecentCourseState) -> Result<()> {
        self.recent_courses
            .insert((entry.user.clone(), entry.course_trunk_ref), entry);
        Ok(())
    }

    fn recent_courses(&self, user: &UserId) -> Result<Vec<RecentCourseState>> {
        let mut entries: Vec<RecentCourseState> = self
            .recent_courses
            .iter()
            .filter(|e| e.key().0 == *user)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by(|a, b| b.time_stamp.cmp(&a.time_stamp));
        Ok(entries)
    }

    fn get_widget_state(
        &self,
        user: &UserId,
        widget: &ElementId,
    ) -> Result<Option<WidgetProgressState>> {
        Ok(self
            .widget_states
            .get(&(user.clone(), *widget))
            .map(|s| s.value().clone()))
    }

    fn put_widget_state(&self, state: WidgetProgressState) -> Result<()> {
        self.widget_states
            .insert((state.user.clone(), state.widget_ref), state);
        Ok(())
    }

    fn get_quiz_state(
        &self,
        user: &UserId,
        quiz: &ElementId,
    ) -> Result<Option<QuizProgressState>> {
        Ok(self
            .quiz_states
            .get(&(user.clone(), *quiz))
            .map(|s| s.value().clone()))
    }

    fn put_quiz_state(&self, state: QuizProgressState) -> Result<()> {
        self.quiz_states
            .insert((state.user.clone(), state.quiz_ref), state);
        Ok(())
    }

    fn get_video_state(&self, user: &UserId, video: &ElementId) -> Result<Option<VideoState>> {
        Ok(self
            .video_states
            .get(&(user.clone(), *video))
            .map(|s| s.value().clone()))
    }

    fn put_video_state(&self, state: VideoState) -> Result<()> {
        self.video_states
            .insert((state.user.clone(), state.video_ref), state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocDraft, DocLink};

    #[test]
    fn test_create_trunk_is_once_only() {
        let store = MemoryStore::new();
        let trunk_id = TrunkId::new();
        let doc = DocDraft::titled("Intro").into_doc(trunk_id);
        let doc_id = doc.id;
        store.put_doc(doc).unwrap();

        let trunk = store
            .create_trunk_with_doc(trunk_id, doc_id, "initial")
            .unwrap();
        assert_eq!(trunk.head, Some(doc_id));
        assert_eq!(trunk.title, "Intro");
        assert!(store.create_trunk_with_doc(trunk_id, doc_id, "again").is_err());
    }

    #[test]
    fn test_commit_revision_requires_trunk() {
        let store = MemoryStore::new();
        let err = store
            .commit_revision(&TrunkId::new(), &DocId::new(), "msg")
            .unwrap_err();
        assert!(matches!(err, LanternError::InvalidTrunk(_)));
    }

    #[test]
    fn test_links_come_back_most_recent_first() {
        let store = MemoryStore::new();
        let target_trunk = TrunkId::new();
        let target_doc = DocId::new();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let element = Element::new(ContentElement::Link(DocLink {
                trunk_ref: target_trunk,
                doc_ref: target_doc,
                from_trunk_ref: TrunkId::new(),
                from_doc_ref: DocId::new(),
                default_title: None,
            }));
            ids.push(element.id);
            store.put_element(element).unwrap();
        }

        let links = store.links_into_trunk(&target_trunk, 10).unwrap();
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].id, ids[2]);
        assert_eq!(links[2].id, ids[0]);

        let capped = store.links_into_trunk(&target_trunk, 2).unwrap();
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].id, ids[2]);
    }

    #[test]
    fn test_visit_state_upsert() {
        let store = MemoryStore::new();
        let user = UserId::new("alice");
        let trunk_id = TrunkId::new();
        let doc_id = DocId::new();

        store
            .put_visit_state(VisitState::new(user.clone(), trunk_id, doc_id, 40))
            .unwrap();
        let mut state = store.get_visit_state(&user, &trunk_id).unwrap().unwrap();
        assert_eq!(state.progress_score, 40);

        state.progress_score = 80;
        store.put_visit_state(state).unwrap();
        let state = store.get_visit_state(&user, &trunk_id).unwrap().unwrap();
        assert_eq!(state.progress_score, 80);
    }
}
