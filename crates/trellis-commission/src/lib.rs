//! # trellis-commission
//!
//! The commission engine: affiliate registry, sale attribution, the
//! upline cascade, refund reversal, and payout transitions.
//!
//! One completed sale produces at most one direct commission for the
//! attributed affiliate plus one cascade commission per qualifying
//! ancestor, all created inside a single transaction; a sale is
//! commissioned at most once per order.
//!
//! ## Modules
//!
//! - [`config`] — typed engine configuration backed by the settings table
//! - [`hooks`] — collaborator seams (badge engine, notifier)
//! - [`registry`] — registration, status transitions, tier recompute
//! - [`engine`] — attribution, cascade, refunds, payouts, summaries

pub mod config;
pub mod engine;
pub mod hooks;
pub mod registry;

use trellis_types::{AffiliateId, TierLevel};

/// Error types for commission operations.
#[derive(Debug, thiserror::Error)]
pub enum CommissionError {
    /// Referenced affiliate does not exist.
    #[error("affiliate {0} not found")]
    AffiliateNotFound(AffiliateId),

    /// The user already has an affiliate account.
    #[error("user '{0}' is already an affiliate")]
    AffiliateExists(String),

    /// Referenced tier level does not exist.
    #[error("tier level {0} not found")]
    TierNotFound(TierLevel),

    /// Tree maintenance failure during registration or cascade.
    #[error("tree error: {0}")]
    Tree(#[from] trellis_tree::TreeError),

    /// Underlying storage failure.
    #[error("storage error: {0}")]
    Storage(#[from] trellis_db::DbError),
}

impl From<rusqlite::Error> for CommissionError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(trellis_db::DbError::Sqlite(e))
    }
}

/// Convenience result type for commission operations.
pub type Result<T> = std::result::Result<T, CommissionError>;
