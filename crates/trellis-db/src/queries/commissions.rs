//! Commission query functions.
//!
//! Commission rows are created once; afterwards only `status` and
//! `paid_at` may change.

use rusqlite::Connection;
use trellis_types::{AffiliateId, Cents, CommissionId, CommissionKind, RateBps};

use crate::Result;

/// A commission row.
#[derive(Debug, Clone)]
pub struct CommissionRow {
    pub id: CommissionId,
    pub affiliate_id: AffiliateId,
    pub order_ref: String,
    pub kind: String,
    pub cascade_depth: i64,
    pub rate_bps: RateBps,
    pub amount: Cents,
    pub order_total: Cents,
    pub status: String,
    pub paid_at: Option<i64>,
    pub created_at: i64,
}

/// Aggregate commission totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionSummary {
    pub pending_amount: Cents,
    pub paid_amount: Cents,
    pub total_amount: Cents,
    pub pending_count: i64,
    pub paid_count: i64,
    pub total_count: i64,
}

/// Insert a commission record in `pending` state. Returns the row id.
pub fn insert(
    conn: &Connection,
    affiliate_id: AffiliateId,
    order_ref: &str,
    kind: CommissionKind,
    rate_bps: RateBps,
    amount: Cents,
    order_total: Cents,
    created_at: i64,
) -> Result<CommissionId> {
    conn.execute(
        "INSERT INTO commissions
             (affiliate_id, order_ref, kind, cascade_depth, rate_bps, amount,
              order_total, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8)",
        rusqlite::params![
            affiliate_id,
            order_ref,
            kind.storage_tag(),
            i64::from(kind.depth()),
            rate_bps,
            amount,
            order_total,
            created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All pending commissions for an order, oldest first.
pub fn pending_for_order(conn: &Connection, order_ref: &str) -> Result<Vec<CommissionRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, affiliate_id, order_ref, kind, cascade_depth, rate_bps,
                amount, order_total, status, paid_at, created_at
         FROM commissions
         WHERE order_ref = ?1 AND status = 'pending'
         ORDER BY id ASC",
    )?;
    let rows = stmt
        .query_map([order_ref], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All commissions for an affiliate, newest first.
pub fn for_affiliate(conn: &Connection, affiliate_id: AffiliateId) -> Result<Vec<CommissionRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, affiliate_id, order_ref, kind, cascade_depth, rate_bps,
                amount, order_total, status, paid_at, created_at
         FROM commissions WHERE affiliate_id = ?1 ORDER BY id DESC",
    )?;
    let rows = stmt
        .query_map([affiliate_id], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Mark a pending commission refunded. Returns whether a row changed.
pub fn mark_refunded(conn: &Connection, id: CommissionId) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE commissions SET status = 'refunded' WHERE id = ?1 AND status = 'pending'",
        [id],
    )?;
    Ok(updated > 0)
}

/// Mark a pending commission paid. Returns whether a row changed.
pub fn mark_paid(conn: &Connection, id: CommissionId, paid_at: i64) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE commissions SET status = 'paid', paid_at = ?1
         WHERE id = ?2 AND status = 'pending'",
        rusqlite::params![paid_at, id],
    )?;
    Ok(updated > 0)
}

/// Pending/paid/total aggregates, optionally scoped to one affiliate.
pub fn summary(conn: &Connection, affiliate_id: Option<AffiliateId>) -> Result<CommissionSummary> {
    let sql = "SELECT
            COALESCE(SUM(CASE WHEN status = 'pending' THEN amount ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN status = 'paid' THEN amount ELSE 0 END), 0),
            COALESCE(SUM(amount), 0),
            COUNT(CASE WHEN status = 'pending' THEN 1 END),
            COUNT(CASE WHEN status = 'paid' THEN 1 END),
            COUNT(*)
         FROM commissions
         WHERE (?1 IS NULL OR affiliate_id = ?1)";
    let row = conn.query_row(sql, [affiliate_id], |row| {
        Ok(CommissionSummary {
            pending_amount: row.get(0)?,
            paid_amount: row.get(1)?,
            total_amount: row.get(2)?,
            pending_count: row.get(3)?,
            paid_count: row.get(4)?,
            total_count: row.get(5)?,
        })
    })?;
    Ok(row)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommissionRow> {
    Ok(CommissionRow {
        id: row.get(0)?,
        affiliate_id: row.get(1)?,
        order_ref: row.get(2)?,
        kind: row.get(3)?,
        cascade_depth: row.get(4)?,
        rate_bps: row.get(5)?,
        amount: row.get(6)?,
        order_total: row.get(7)?,
        status: row.get(8)?,
        paid_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}
