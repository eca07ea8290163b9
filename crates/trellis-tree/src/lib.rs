//! # trellis-tree
//!
//! The MLM forest: affiliate nodes with materialized ancestor paths, so
//! upline and downline queries are indexed reads instead of recursive
//! queries, and aggregate rollups (team size, team earnings) are kept on
//! every ancestor at write time.
//!
//! ## Modules
//!
//! - [`path`] — materialized path encoding (`/root/../self`)
//! - [`forest`] — insertion, rollups, upline/downline queries, stats

pub mod forest;
pub mod path;

use trellis_types::AffiliateId;

/// Error types for tree operations.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// The affiliate has no tree node.
    #[error("affiliate {0} is not in the tree")]
    NodeNotFound(AffiliateId),

    /// The affiliate already has a tree node.
    #[error("affiliate {0} is already in the tree")]
    AlreadyInTree(AffiliateId),

    /// A stored path failed to parse.
    #[error("malformed path: {0}")]
    MalformedPath(String),

    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Storage(#[from] trellis_db::DbError),
}

impl From<rusqlite::Error> for TreeError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(trellis_db::DbError::Sqlite(e))
    }
}

/// Convenience result type for tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;
