//! # trellis-ledger
//!
//! The credit ledger: metered balances debited atomically, with every
//! movement recorded in an append-only journal.
//!
//! A debit is a read-modify-write under SQLite's write lock (immediate
//! transaction): concurrent debits against the same balance serialize,
//! the loser re-reads, and the balance can never go negative. Exactly
//! one journal row is written per successful movement, none on failure.
//!
//! ## Modules
//!
//! - [`ledger`] — balance creation, debit, grant, advisory check, audit
//! - [`token`] — request token generation

pub mod ledger;
pub mod token;

use trellis_types::Cents;

/// Error types for ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// No balance record for the given owner.
    #[error("balance not found for owner '{0}'")]
    BalanceNotFound(String),

    /// A balance record already exists for the given owner.
    #[error("balance already exists for owner '{0}'")]
    BalanceExists(String),

    /// The movement amount must be positive.
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Cents),

    /// The debit would take the balance below zero. Nothing was
    /// committed; the caller decides whether and when to retry.
    #[error("insufficient credits: have {available}, need {required}")]
    InsufficientCredits {
        /// Credits remaining before the attempted debit.
        available: Cents,
        /// Credits the debit asked for.
        required: Cents,
    },

    /// The journal does not replay to the stored balance.
    #[error("journal inconsistent: {0}")]
    JournalInconsistent(String),

    /// Underlying storage failure. The operation left no partial state;
    /// callers may retry the whole operation.
    #[error("storage error: {0}")]
    Storage(#[from] trellis_db::DbError),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(trellis_db::DbError::Sqlite(e))
    }
}

/// Convenience result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
