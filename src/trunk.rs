//! Branch pointers and the append-only revision log.
//!
//! A trunk is the stable identity of a logical document; every edit lands
//! as a fresh [`Doc`] snapshot plus a [`Revision`] appended to the trunk's
//! log, after which `head` advances. The append and the head advance are a
//! single atomic unit at the backing store. Nothing here is ever rewritten
//! or deleted.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{LanternError, Result};
use crate::model::{Doc, DocDraft, DocId, Revision, Trunk, TrunkId, UserId};
use crate::store::Datastore;

/// Commit message recorded when the caller does not supply one
pub const DEFAULT_COMMIT_MESSAGE: &str = "Committed a new revision";

/// Trailing-number titles ("Lesson 3") increment the number on clone
static TRAILING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?\W)(\d+)$").expect("trailing-number pattern"));

/// Re-clones bump the clone counter instead of nesting prefixes
static CLONE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Clone \((\d+)\) of (.*)$").expect("clone-prefix pattern"));

// ============================================================================
// TrunkStore
// ============================================================================

/// Creation, appending, and membership-checked retrieval of revisions
#[derive(Clone)]
pub struct TrunkStore {
    store: Arc<dyn Datastore>,
}

impl TrunkStore {
    pub fn new(store: Arc<dyn Datastore>) -> Self {
        Self { store }
    }

    /// Place a draft on a brand-new trunk.
    ///
    /// The doc snapshot is written first, then trunk creation and the
    /// initial revision land as one atomic unit.
    pub fn create_trunk(&self, draft: DocDraft, message: Option<&str>) -> Result<(Trunk, Doc)> {
        let trunk_id = TrunkId::new();
        let doc = draft.into_doc(trunk_id);
        self.store.put_doc(doc.clone())?;
        let trunk = self.store.create_trunk_with_doc(
            trunk_id,
            doc.id,
            message.unwrap_or(DEFAULT_COMMIT_MESSAGE),
        )?;
        info!(trunk_id = %trunk.id, doc_id = %doc.id, title = %doc.title, "Created trunk");
        Ok((trunk, doc))
    }

    /// Append an already-stored doc snapshot as the next revision of an
    /// existing trunk, advancing `head`.
    pub fn append_revision(
        &self,
        trunk_id: &TrunkId,
        doc_id: &DocId,
        message: Option<&str>,
    ) -> Result<Trunk> {
        let trunk = self.store.commit_revision(
            trunk_id,
            doc_id,
            message.unwrap_or(DEFAULT_COMMIT_MESSAGE),
        )?;
        debug!(trunk_id = %trunk_id, doc_id = %doc_id, "Appended revision");
        Ok(trunk)
    }

    /// Create a doc from a draft and land it on a trunk.
    ///
    /// With a trunk id the doc becomes that trunk's next revision; without
    /// one a new trunk is created around it.
    pub fn create_new_doc(
        &self,
        trunk_id: Option<&TrunkId>,
        draft: DocDraft,
        message: Option<&str>,
    ) -> Result<(Trunk, Doc)> {
        match trunk_id {
            Some(trunk_id) => {
                let doc = draft.into_doc(*trunk_id);
                self.store.put_doc(doc.clone())?;
                let trunk = self.append_revision(trunk_id, &doc.id, message)?;
                Ok((trunk, doc))
            }
            None => self.create_trunk(draft, message),
        }
    }

    pub fn get_trunk(&self, trunk_id: &TrunkId) -> Result<Trunk> {
        self.store.get_trunk(trunk_id)?.ok_or_else(|| {
            LanternError::InvalidTrunk(format!("Trunk is not valid: {}", trunk_id))
        })
    }

    /// Resolve the doc snapshot currently at the trunk's tip
    pub fn fetch_head(&self, trunk_id: &TrunkId) -> Result<Doc> {
        let trunk = self.get_trunk(trunk_id)?;
        let head = trunk.head.ok_or_else(|| {
            LanternError::InvalidDocument(format!("Trunk has no head: {}", trunk_id))
        })?;
        self.store.get_doc(&head)?.ok_or_else(|| {
            LanternError::InvalidDocument(format!("Head doc is missing: {}", head))
        })
    }

    /// Resolve a specific revision, rejecting doc ids that never appeared
    /// in the trunk's history.
    pub fn fetch_revision(&self, trunk_id: &TrunkId, doc_id: &DocId) -> Result<Doc> {
        if !self.store.has_revision(trunk_id, doc_id)? {
            return Err(LanternError::InvalidDocument(format!(
                "Doc {} is not a revision of trunk {}",
                doc_id, trunk_id
            )));
        }
        self.store.get_doc(doc_id)?.ok_or_else(|| {
            LanternError::InvalidDocument(format!("Doc is not valid: {}", doc_id))
        })
    }

    /// Head when `doc_id` is absent, membership-checked revision otherwise
    pub fn fetch_doc(&self, trunk_id: &TrunkId, doc_id: Option<&DocId>) -> Result<Doc> {
        match doc_id {
            Some(doc_id) => self.fetch_revision(trunk_id, doc_id),
            None => self.fetch_head(trunk_id),
        }
    }

    /// The revision of a trunk the user last visited, falling back to the
    /// head for first-time visitors.
    pub fn get_doc_for_user(&self, trunk_id: &TrunkId, user: &UserId) -> Result<Doc> {
        match self.store.get_visit_state(user, trunk_id)? {
            Some(visit) => self.fetch_revision(trunk_id, &visit.doc_ref),
            None => self.fetch_head(trunk_id),
        }
    }

    /// Full revision log of a trunk, oldest first
    pub fn revision_log(&self, trunk_id: &TrunkId) -> Result<Vec<Revision>> {
        self.store.revisions(trunk_id)
    }

    /// Copy a doc snapshot onto a brand-new trunk.
    ///
    /// The clone keeps the source content references (elements are shared,
    /// not deep-copied) and gets a derived title.
    pub fn clone_doc(&self, source: &Doc) -> Result<(Trunk, Doc)> {
        let draft = DocDraft {
            title: clone_title(&source.title),
            label: source.label,
            grade_level: source.grade_level,
            tags: source.tags.clone(),
            content: source.content.clone(),
            score_weight: source.score_weight.clone(),
        };
        let (trunk, doc) = self.create_trunk(draft, Some("Cloned"))?;
        info!(source = %source.id, clone = %doc.id, "Cloned doc onto new trunk");
        Ok((trunk, doc))
    }
}

/// Derive the title for a cloned doc.
///
/// Titles ending in a number increment it; titles already carrying a clone
/// prefix bump the counter; everything else gets "Clone (1) of " prepended.
pub fn clone_title(title: &str) -> String {
    if let Some(caps) = TRAILING_NUMBER.captures(title) {
        if let Ok(n) = caps[2].parse::<u64>() {
            return format!("{}{}", &caps[1], n + 1);
        }
    }
    if let Some(caps) = CLONE_PREFIX.captures(title) {
        if let Ok(n) = caps[1].parse::<u64>() {
            return format!("Clone ({}) of {}", n + 1, &caps[2]);
        }
    }
    format!("Clone (1) of {}", title)
}
