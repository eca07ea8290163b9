//! Tier query functions.
//!
//! Tiers are totally ordered by level. An affiliate's qualifying tier is
//! the highest level whose earnings AND referral minimums are both met.

use rusqlite::{Connection, OptionalExtension};
use trellis_types::{Cents, RateBps, TierLevel};

use crate::{DbError, Result};

/// A tier row. Rates are basis points; thresholds are cents / counts.
#[derive(Debug, Clone)]
pub struct TierRow {
    pub level: TierLevel,
    pub name: String,
    pub min_earnings: Cents,
    pub min_referrals: i64,
    pub base_rate_bps: RateBps,
    pub cascade_rate_bps_1: RateBps,
    pub cascade_rate_bps_2: RateBps,
    pub cascade_rate_bps_3: RateBps,
    pub perks: Option<String>,
    pub created_at: i64,
}

impl TierRow {
    /// Cascade rate for a walk depth. Depths outside the defined range
    /// earn nothing.
    pub fn cascade_rate_bps(&self, depth: u32) -> RateBps {
        match depth {
            1 => self.cascade_rate_bps_1,
            2 => self.cascade_rate_bps_2,
            3 => self.cascade_rate_bps_3,
            _ => 0,
        }
    }

    /// Perks decoded from the JSON column.
    pub fn perks_json(&self) -> Result<serde_json::Value> {
        match &self.perks {
            None => Ok(serde_json::Value::Null),
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| DbError::Serialization(format!("tier perks: {e}"))),
        }
    }
}

const SELECT_COLUMNS: &str = "level, name, min_earnings, min_referrals, base_rate_bps,
     cascade_rate_bps_1, cascade_rate_bps_2, cascade_rate_bps_3, perks, created_at";

/// Look up a tier by level.
pub fn get_by_level(conn: &Connection, level: TierLevel) -> Result<Option<TierRow>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM tiers WHERE level = ?1");
    let row = conn.query_row(&sql, [level], map_row).optional()?;
    Ok(row)
}

/// Highest tier whose minimums are both met by the given lifetime stats.
pub fn qualifying(
    conn: &Connection,
    lifetime_earnings: Cents,
    total_referrals: i64,
) -> Result<Option<TierRow>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM tiers
         WHERE min_earnings <= ?1 AND min_referrals <= ?2
         ORDER BY level DESC LIMIT 1"
    );
    let row = conn
        .query_row(&sql, rusqlite::params![lifetime_earnings, total_referrals], map_row)
        .optional()?;
    Ok(row)
}

/// All tiers, lowest level first.
pub fn all(conn: &Connection) -> Result<Vec<TierRow>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM tiers ORDER BY level ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TierRow> {
    Ok(TierRow {
        level: row.get(0)?,
        name: row.get(1)?,
        min_earnings: row.get(2)?,
        min_referrals: row.get(3)?,
        base_rate_bps: row.get(4)?,
        cascade_rate_bps_1: row.get(5)?,
        cascade_rate_bps_2: row.get(6)?,
        cascade_rate_bps_3: row.get(7)?,
        perks: row.get(8)?,
        created_at: row.get(9)?,
    })
}
