//! Credit balance query functions.
//!
//! The canonical representation is consumed + total; the remaining
//! balance is always derived, never stored.

use rusqlite::{Connection, OptionalExtension};
use trellis_types::{BalanceId, Cents};

use crate::Result;

/// A credit balance row.
#[derive(Debug, Clone)]
pub struct BalanceRow {
    pub id: BalanceId,
    pub owner_key: String,
    pub credits_total: Cents,
    pub credits_consumed: Cents,
    pub created_at: i64,
}

impl BalanceRow {
    /// Remaining credits (`total - consumed`).
    pub fn remaining(&self) -> Cents {
        self.credits_total - self.credits_consumed
    }
}

/// Insert a balance record. Returns the new row id.
pub fn insert(conn: &Connection, owner_key: &str, total: Cents, created_at: i64) -> Result<BalanceId> {
    conn.execute(
        "INSERT INTO credit_balances (owner_key, credits_total, credits_consumed, created_at)
         VALUES (?1, ?2, 0, ?3)",
        rusqlite::params![owner_key, total, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Look up a balance by its owner key.
pub fn get_by_owner(conn: &Connection, owner_key: &str) -> Result<Option<BalanceRow>> {
    let row = conn
        .query_row(
            "SELECT id, owner_key, credits_total, credits_consumed, created_at
             FROM credit_balances WHERE owner_key = ?1",
            [owner_key],
            map_row,
        )
        .optional()?;
    Ok(row)
}

/// Overwrite the consumed counter.
pub fn set_consumed(conn: &Connection, id: BalanceId, consumed: Cents) -> Result<()> {
    conn.execute(
        "UPDATE credit_balances SET credits_consumed = ?1 WHERE id = ?2",
        rusqlite::params![consumed, id],
    )?;
    Ok(())
}

/// Raise the total allotment by `amount`.
pub fn add_total(conn: &Connection, id: BalanceId, amount: Cents) -> Result<()> {
    conn.execute(
        "UPDATE credit_balances SET credits_total = credits_total + ?1 WHERE id = ?2",
        rusqlite::params![amount, id],
    )?;
    Ok(())
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BalanceRow> {
    Ok(BalanceRow {
        id: row.get(0)?,
        owner_key: row.get(1)?,
        credits_total: row.get(2)?,
        credits_consumed: row.get(3)?,
        created_at: row.get(4)?,
    })
}
