//! Heuristic ancestor walk from a doc up to a course.
//!
//! The link graph has no roots and may contain cycles, so there is no
//! exact "the path above this doc". The resolver runs a greedy,
//! single-branch walk instead: at each level it fans out over the links
//! pointing into the current trunk, returns immediately if any of them
//! comes from a course, and otherwise descends into exactly one candidate
//! parent. Siblings beyond the first are never revisited, which makes the
//! walk cheap and bounded but means a reachable course can be missed when
//! it sits behind a non-first branch. Callers treat the result as a
//! best-effort breadcrumb, not ground truth.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;
use crate::model::{Doc, DocId, DocLabel};
use crate::store::Datastore;

/// Bounded greedy walk up the incoming-link graph
#[derive(Clone)]
pub struct PathResolver {
    store: Arc<dyn Datastore>,
    config: Config,
}

impl PathResolver {
    pub fn new(store: Arc<dyn Datastore>, config: Config) -> Self {
        Self { store, config }
    }

    /// Walk incoming links upward from `doc` until a course-labeled doc
    /// is found, the walk runs out of unvisited parents, or a cycle closes.
    ///
    /// Returns ancestor doc ids ordered root end first, excluding `doc`
    /// itself; empty for a doc nothing links to. Always terminates: each
    /// descent marks a trunk visited, links into visited trunks are
    /// skipped, and the per-level fan-out is capped.
    pub fn find_ancestor_course_path(&self, doc: &Doc) -> Result<Vec<DocId>> {
        debug!(doc = %doc.id, trunk = %doc.trunk_ref, "Resolving ancestor course path");

        let mut path: Vec<DocId> = Vec::new();
        let mut visited: HashSet<_> = HashSet::new();
        visited.insert(doc.trunk_ref);
        let mut current = doc.clone();

        loop {
            let links = self
                .store
                .links_into_trunk(&current.trunk_ref, self.config.ancestor_fetch_limit)?;

            // Several revisions of one parent may each carry a link into
            // this trunk; only the most recent counts.
            let mut seen_this_level = HashSet::new();
            let mut alternate: Option<Doc> = None;

            for element in links {
                let link = match element.as_link() {
                    Some(link) => link,
                    None => continue,
                };
                let parent = match self.store.get_doc(&link.from_doc_ref)? {
                    Some(parent) => parent,
                    None => {
                        warn!(link = %element.id, from_doc = %link.from_doc_ref,
                              "Link source doc is missing, skipping");
                        continue;
                    }
                };
                if !seen_this_level.insert(parent.trunk_ref) {
                    continue;
                }
                if visited.contains(&parent.trunk_ref) {
                    continue;
                }
                if parent.label == DocLabel::Course {
                    path.push(parent.id);
                    path.reverse();
                    return Ok(path);
                }
                if alternate.is_none() {
                    alternate = Some(parent);
                }
            }

            match alternate {
                Some(parent) => {
                    path.push(parent.id);
                    visited.insert(parent.trunk_ref);
                    current = parent;
                }
                None => {
                    // No course found and nowhere left to go; return what
                    // the walk collected so far.
                    path.reverse();
                    return Ok(path);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DocGraph;
    use crate::model::DocDraft;
    use crate::store::MemoryStore;
    use crate::trunk::TrunkStore;

    struct Fixture {
        trunks: TrunkStore,
        graph: DocGraph,
        resolver: PathResolver,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::default());
        Fixture {
            trunks: TrunkStore::new(store.clone()),
            graph: DocGraph::new(store.clone()),
            resolver: PathResolver::new(store, Config::default()),
        }
    }

    fn doc(fx: &Fixture, title: &str, label: DocLabel) -> Doc {
        let (_, doc) = fx
            .trunks
            .create_trunk(DocDraft::titled(title).with_label(label), None)
            .unwrap();
        doc
    }

    fn link(fx: &Fixture, from: &Doc, to: &Doc) {
        fx.graph.create_link(from, &to.trunk_ref, None).unwrap();
    }

    #[test]
    fn test_linkless_doc_yields_empty_path() {
        let fx = fixture();
        let lesson = doc(&fx, "Lesson", DocLabel::Module);
        assert!(fx.resolver.find_ancestor_course_path(&lesson).unwrap().is_empty());
    }

    #[test]
    fn test_straight_chain_up_to_course() {
        let fx = fixture();
        let course = doc(&fx, "Course", DocLabel::Course);
        let module = doc(&fx, "Module", DocLabel::Module);
        let lesson = doc(&fx, "Lesson", DocLabel::Module);
        link(&fx, &course, &module);
        link(&fx, &module, &lesson);

        let path = fx.resolver.find_ancestor_course_path(&lesson).unwrap();
        assert_eq!(path, vec![course.id, module.id]);
    }

    #[test]
    fn test_course_in_fanout_wins_over_descent() {
        let fx = fixture();
        let lesson = doc(&fx, "Lesson", DocLabel::Module);
        let module = doc(&fx, "Module", DocLabel::Module);
        let course = doc(&fx, "Course", DocLabel::Course);
        // Module linked most recently, so it is scanned first; the course
        // still wins because course candidates return immediately.
        link(&fx, &course, &lesson);
        link(&fx, &module, &lesson);

        let path = fx.resolver.find_ancestor_course_path(&lesson).unwrap();
        assert_eq!(path, vec![course.id]);
    }

    #[test]
    fn test_greedy_descent_can_miss_a_course() {
        let fx = fixture();
        let lesson = doc(&fx, "Lesson", DocLabel::Module);
        let dead_end = doc(&fx, "Dead end", DocLabel::Module);
        let module = doc(&fx, "Module", DocLabel::Module);
        let course = doc(&fx, "Course", DocLabel::Course);

        // Two parents: the dead end was linked later, so the walk descends
        // into it and never comes back to the branch holding the course.
        link(&fx, &module, &lesson);
        link(&fx, &dead_end, &lesson);
        link(&fx, &course, &module);

        let path = fx.resolver.find_ancestor_course_path(&lesson).unwrap();
        assert_eq!(path, vec![dead_end.id]);
    }

    #[test]
    fn test_cycle_terminates_with_partial_path() {
        let fx = fixture();
        let a = doc(&fx, "A", DocLabel::Module);
        let b = doc(&fx, "B", DocLabel::Module);
        // A and B link into each other; no course is reachable.
        link(&fx, &a, &b);
        link(&fx, &b, &a);

        let path = fx.resolver.find_ancestor_course_path(&b).unwrap();
        assert_eq!(path, vec![a.id]);
    }

    #[test]
    fn test_self_cycle_terminates_empty() {
        let fx = fixture();
        let a = doc(&fx, "A", DocLabel::Module);
        // A doc linking into its own trunk.
        link(&fx, &a, &a);
        assert!(fx.resolver.find_ancestor_course_path(&a).unwrap().is_empty());
    }
}
