//! Content elements and the scoring capability.
//!
//! A doc's content list references elements of a closed set of variants.
//! Each variant knows how to report a progress score for a user; variants
//! with nothing to score report `None` and are excluded from aggregate
//! means entirely rather than counted as zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::doc::DocLink;
use super::ids::{ElementId, UserId};
use crate::error::{LanternError, Result};
use crate::store::Datastore;

/// Content element variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentElement {
    /// Immutable rich text block
    RichText { data: String },
    /// Embedded video
    Video {
        video_id: String,
        width: String,
        height: String,
        title: Option<String>,
    },
    /// Link to the external quiz mini-app
    QuizLink { quiz_url: String },
    /// Embedded interactive widget
    Widget {
        widget_url: String,
        title: Option<String>,
        width: Option<String>,
        height: Option<String>,
        /// True if the widget is shared between pages; interactive shells
        /// set this to false
        is_shared: bool,
    },
    /// Empty anchor for a per-user notepad
    Notepad,
    /// Link into another trunk
    Link(DocLink),
}

/// A stored content element: variant payload plus datastore identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub id: ElementId,
    pub created_at: DateTime<Utc>,
    pub kind: ContentElement,
}

impl Element {
    pub fn new(kind: ContentElement) -> Self {
        Self {
            id: ElementId::new(),
            created_at: Utc::now(),
            kind,
        }
    }

    /// The embedded doc link, if this element is one
    pub fn as_link(&self) -> Option<&DocLink> {
        match &self.kind {
            ContentElement::Link(link) => Some(link),
            _ => None,
        }
    }

    /// Progress score of this element for `user`, or `None` when the
    /// variant is not scorable.
    ///
    /// Quiz and widget scores come from the per-user progress state for
    /// the element; an element the user never touched scores 0. A doc
    /// link scores as the visit state of the trunk it points to.
    pub fn score(&self, store: &dyn Datastore, user: &UserId) -> Result<Option<u32>> {
        match &self.kind {
            ContentElement::RichText { .. } | ContentElement::Notepad => Ok(None),
            ContentElement::Video { .. } => Ok(None),
            ContentElement::QuizLink { .. } => {
                match store.get_quiz_state(user, &self.id)? {
                    Some(state) => Ok(Some(state.progress_score)),
                    None => Ok(Some(0)),
                }
            }
            ContentElement::Widget { .. } => {
                match store.get_widget_state(user, &self.id)? {
                    // A session created before any scoring carries no
                    // score yet; that is distinct from "never touched".
                    Some(state) => Ok(state.progress_score),
                    None => Ok(Some(0)),
                }
            }
            ContentElement::Link(link) => {
                let doc = store.get_doc(&link.doc_ref)?.ok_or_else(|| {
                    LanternError::InvalidDocument(format!(
                        "Document referred by link could not be found: {}",
                        link.doc_ref
                    ))
                })?;
                match store.get_visit_state(user, &doc.trunk_ref)? {
                    Some(state) => Ok(Some(state.progress_score)),
                    None => Ok(Some(0)),
                }
            }
        }
    }
}
