//! Affiliate query functions.

use rusqlite::{Connection, OptionalExtension};
use trellis_types::{AffiliateId, AffiliateStatus, Cents, TierLevel};

use crate::{DbError, Result};

/// An affiliate row.
#[derive(Debug, Clone)]
pub struct AffiliateRow {
    pub id: AffiliateId,
    pub user_ref: String,
    pub affiliate_code: String,
    pub referrer_id: Option<AffiliateId>,
    pub status: String,
    pub tier_level: TierLevel,
    pub lifetime_earnings: Cents,
    pub current_balance: Cents,
    pub total_referrals: i64,
    pub created_at: i64,
}

impl AffiliateRow {
    /// Parsed status; malformed rows surface as a serialization error.
    pub fn parsed_status(&self) -> Result<AffiliateStatus> {
        AffiliateStatus::parse(&self.status)
            .ok_or_else(|| DbError::Serialization(format!("unknown affiliate status '{}'", self.status)))
    }

    /// Whether this affiliate currently earns commissions.
    pub fn is_active(&self) -> bool {
        self.status == AffiliateStatus::Active.as_str()
    }
}

/// Insert a new affiliate. Returns the new row id.
pub fn insert(
    conn: &Connection,
    user_ref: &str,
    affiliate_code: &str,
    referrer_id: Option<AffiliateId>,
    status: AffiliateStatus,
    created_at: i64,
) -> Result<AffiliateId> {
    conn.execute(
        "INSERT INTO affiliates (user_ref, affiliate_code, referrer_id, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![user_ref, affiliate_code, referrer_id, status.as_str(), created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

const SELECT_COLUMNS: &str = "id, user_ref, affiliate_code, referrer_id, status, tier_level,
     lifetime_earnings, current_balance, total_referrals, created_at";

/// Look up an affiliate by id.
pub fn get(conn: &Connection, id: AffiliateId) -> Result<Option<AffiliateRow>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM affiliates WHERE id = ?1");
    let row = conn.query_row(&sql, [id], map_row).optional()?;
    Ok(row)
}

/// Look up an affiliate by its owning user reference.
pub fn get_by_user(conn: &Connection, user_ref: &str) -> Result<Option<AffiliateRow>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM affiliates WHERE user_ref = ?1");
    let row = conn.query_row(&sql, [user_ref], map_row).optional()?;
    Ok(row)
}

/// Look up an affiliate by referral code.
pub fn get_by_code(conn: &Connection, code: &str) -> Result<Option<AffiliateRow>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM affiliates WHERE affiliate_code = ?1");
    let row = conn.query_row(&sql, [code], map_row).optional()?;
    Ok(row)
}

/// Whether a referral code is already taken.
pub fn code_exists(conn: &Connection, code: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM affiliates WHERE affiliate_code = ?1",
        [code],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Update an affiliate's status.
pub fn set_status(conn: &Connection, id: AffiliateId, status: AffiliateStatus) -> Result<()> {
    let updated = conn.execute(
        "UPDATE affiliates SET status = ?1 WHERE id = ?2",
        rusqlite::params![status.as_str(), id],
    )?;
    if updated == 0 {
        return Err(DbError::NotFound(format!("affiliate {id}")));
    }
    Ok(())
}

/// Update an affiliate's tier level.
pub fn set_tier_level(conn: &Connection, id: AffiliateId, level: TierLevel) -> Result<()> {
    conn.execute(
        "UPDATE affiliates SET tier_level = ?1 WHERE id = ?2",
        rusqlite::params![level, id],
    )?;
    Ok(())
}

/// Credit earnings: raises lifetime earnings and the payable balance
/// together.
pub fn add_earnings(conn: &Connection, id: AffiliateId, amount: Cents) -> Result<()> {
    conn.execute(
        "UPDATE affiliates SET
             lifetime_earnings = lifetime_earnings + ?1,
             current_balance = current_balance + ?1
         WHERE id = ?2",
        rusqlite::params![amount, id],
    )?;
    Ok(())
}

/// Deduct from the payable balance, clamped so it never goes negative.
/// Lifetime earnings are untouched. Returns whether a deduction happened.
pub fn deduct_balance_clamped(conn: &Connection, id: AffiliateId, amount: Cents) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE affiliates SET current_balance = current_balance - ?1
         WHERE id = ?2 AND current_balance >= ?1",
        rusqlite::params![amount, id],
    )?;
    Ok(updated > 0)
}

/// Bump the direct referral counter.
pub fn increment_referrals(conn: &Connection, id: AffiliateId) -> Result<()> {
    conn.execute(
        "UPDATE affiliates SET total_referrals = total_referrals + 1 WHERE id = ?1",
        [id],
    )?;
    Ok(())
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AffiliateRow> {
    Ok(AffiliateRow {
        id: row.get(0)?,
        user_ref: row.get(1)?,
        affiliate_code: row.get(2)?,
        referrer_id: row.get(3)?,
        status: row.get(4)?,
        tier_level: row.get(5)?,
        lifetime_earnings: row.get(6)?,
        current_balance: row.get(7)?,
        total_referrals: row.get(8)?,
        created_at: row.get(9)?,
    })
}
