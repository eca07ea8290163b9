//! MLM tree node query functions.
//!
//! Nodes carry a materialized path (`/root/../self`) so upline and
//! downline lookups are indexed reads instead of recursive queries.

use rusqlite::{Connection, OptionalExtension};
use trellis_types::{AffiliateId, Cents};

use crate::Result;

/// A tree node row.
#[derive(Debug, Clone)]
pub struct TreeNodeRow {
    pub affiliate_id: AffiliateId,
    pub parent_id: Option<AffiliateId>,
    pub depth: i64,
    pub path: String,
    pub direct_referrals: i64,
    pub team_size: i64,
    pub team_earnings: Cents,
    pub created_at: i64,
}

/// Insert a tree node.
pub fn insert(
    conn: &Connection,
    affiliate_id: AffiliateId,
    parent_id: Option<AffiliateId>,
    depth: i64,
    path: &str,
    created_at: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO tree_nodes (affiliate_id, parent_id, depth, path, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![affiliate_id, parent_id, depth, path, created_at],
    )?;
    Ok(())
}

/// Look up a node by affiliate id.
pub fn get(conn: &Connection, affiliate_id: AffiliateId) -> Result<Option<TreeNodeRow>> {
    let row = conn
        .query_row(
            "SELECT affiliate_id, parent_id, depth, path, direct_referrals,
                    team_size, team_earnings, created_at
             FROM tree_nodes WHERE affiliate_id = ?1",
            [affiliate_id],
            map_row,
        )
        .optional()?;
    Ok(row)
}

/// Bump the direct referral counter of one node.
pub fn increment_direct_referrals(conn: &Connection, affiliate_id: AffiliateId) -> Result<()> {
    conn.execute(
        "UPDATE tree_nodes SET direct_referrals = direct_referrals + 1 WHERE affiliate_id = ?1",
        [affiliate_id],
    )?;
    Ok(())
}

/// Bump the aggregate descendant counter of one node.
pub fn increment_team_size(conn: &Connection, affiliate_id: AffiliateId) -> Result<()> {
    conn.execute(
        "UPDATE tree_nodes SET team_size = team_size + 1 WHERE affiliate_id = ?1",
        [affiliate_id],
    )?;
    Ok(())
}

/// Add to the aggregate descendant earnings of one node.
pub fn add_team_earnings(conn: &Connection, affiliate_id: AffiliateId, amount: Cents) -> Result<()> {
    conn.execute(
        "UPDATE tree_nodes SET team_earnings = team_earnings + ?1 WHERE affiliate_id = ?2",
        rusqlite::params![amount, affiliate_id],
    )?;
    Ok(())
}

/// Descendants of the node owning `path`, nearest levels first.
///
/// `max_depth` bounds the relative depth below the owning node, whose own
/// absolute depth is `owner_depth`.
pub fn downline_by_path(
    conn: &Connection,
    path: &str,
    owner_depth: i64,
    max_depth: i64,
) -> Result<Vec<TreeNodeRow>> {
    let prefix = format!("{path}/%");
    let mut stmt = conn.prepare(
        "SELECT affiliate_id, parent_id, depth, path, direct_referrals,
                team_size, team_earnings, created_at
         FROM tree_nodes
         WHERE path LIKE ?1 AND depth <= ?2
         ORDER BY depth ASC, affiliate_id ASC",
    )?;

    let rows = stmt
        .query_map(rusqlite::params![prefix, owner_depth + max_depth], map_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TreeNodeRow> {
    Ok(TreeNodeRow {
        affiliate_id: row.get(0)?,
        parent_id: row.get(1)?,
        depth: row.get(2)?,
        path: row.get(3)?,
        direct_referrals: row.get(4)?,
        team_size: row.get(5)?,
        team_earnings: row.get(6)?,
        created_at: row.get(7)?,
    })
}
