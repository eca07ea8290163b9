//! Credit journal query functions.
//!
//! The journal is append-only: rows are never updated or deleted, and
//! insertion order is the replay order.

use rusqlite::Connection;
use trellis_types::{BalanceId, Cents};

use crate::Result;

/// A journal row. `amount` is signed: debits negative, grants positive.
#[derive(Debug, Clone)]
pub struct JournalRow {
    pub id: i64,
    pub balance_id: BalanceId,
    pub amount: Cents,
    pub balance_after: Cents,
    pub action: String,
    pub request_token: String,
    pub created_at: i64,
}

/// Append one journal entry.
pub fn append(
    conn: &Connection,
    balance_id: BalanceId,
    amount: Cents,
    balance_after: Cents,
    action: &str,
    request_token: &str,
    created_at: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO credit_journal
             (balance_id, amount, balance_after, action, request_token, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![balance_id, amount, balance_after, action, request_token, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All entries for a balance, oldest first.
pub fn entries_for_balance(conn: &Connection, balance_id: BalanceId) -> Result<Vec<JournalRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, balance_id, amount, balance_after, action, request_token, created_at
         FROM credit_journal WHERE balance_id = ?1 ORDER BY id ASC",
    )?;

    let rows = stmt
        .query_map([balance_id], |row| {
            Ok(JournalRow {
                id: row.get(0)?,
                balance_id: row.get(1)?,
                amount: row.get(2)?,
                balance_after: row.get(3)?,
                action: row.get(4)?,
                request_token: row.get(5)?,
                created_at: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
