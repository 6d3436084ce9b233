//! Lantern Core - Document Revision Graph and Progress Scoring Engine
//!
//! Lantern organizes learning material as a set of *trunks*: stable
//! identities whose content evolves through an append-only revision log.
//! Every edit produces a fresh immutable document snapshot; history is
//! never rewritten. Documents embed links into other trunks, forming a
//! directed graph that is allowed to contain cycles and has no single
//! root.
//!
//! ## Components
//!
//! - **TrunkStore**: branch pointer plus append-only revision log
//! - **DocGraph**: immutable snapshots and the links between them
//! - **PathResolver**: heuristic ancestor walk up to a course-labeled doc
//! - **VisitStackManager**: per-user incremental breadcrumb cache
//! - **ScoreAggregator**: hierarchical progress scores with dirty-bit
//!   invalidation
//! - **SequentialNavigator**: derived next-page navigation
//!
//! All traversals are bounded and cycle-safe; cycles in the link graph are
//! truncated, never treated as errors. Persistence goes through the
//! [`store::Datastore`] trait; an in-memory implementation backed by
//! DashMap ships with the crate.

pub mod config;
pub mod error;
pub mod graph;
pub mod library;
pub mod model;
pub mod nav;
pub mod resolver;
pub mod score;
pub mod store;
pub mod trunk;
pub mod visits;

pub use config::Config;
pub use error::{LanternError, Result};
pub use library::Library;
pub use model::{Doc, DocDraft, DocLabel, DocLink, Element, Trunk, UserId};
pub use store::{Datastore, MemoryStore};
