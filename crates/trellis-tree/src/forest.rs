//! Forest maintenance and queries.

use rusqlite::{Connection, TransactionBehavior};
use trellis_db::queries::tree::{self, TreeNodeRow};
use trellis_types::{unix_now, AffiliateId, Cents};

use crate::{path, Result, TreeError};

/// A downline member with its depth relative to the queried node.
#[derive(Debug, Clone)]
pub struct DownlineMember {
    pub node: TreeNodeRow,
    pub relative_depth: i64,
}

/// Aggregate counters of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    pub depth: i64,
    pub direct_referrals: i64,
    pub team_size: i64,
    pub team_earnings: Cents,
}

/// Insert an affiliate into the forest.
///
/// Without a parent the node becomes a root (depth 1). With a parent,
/// the node hangs under it and every ancestor's `team_size` is bumped —
/// node insert and all rollups commit in one transaction. A parent id
/// that is not in the forest is treated as absent: the node becomes a
/// root and a warning is logged, rather than recording a dangling
/// parent reference.
///
/// # Errors
///
/// - [`TreeError::AlreadyInTree`] if the affiliate already has a node
pub fn add_node(
    conn: &mut Connection,
    affiliate_id: AffiliateId,
    parent: Option<AffiliateId>,
) -> Result<TreeNodeRow> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if tree::get(&tx, affiliate_id)?.is_some() {
        return Err(TreeError::AlreadyInTree(affiliate_id));
    }

    let parent_node = match parent {
        None => None,
        Some(parent_id) => {
            let node = tree::get(&tx, parent_id)?;
            if node.is_none() {
                tracing::warn!(
                    affiliate = affiliate_id,
                    claimed_parent = parent_id,
                    "parent not in tree, inserting as root"
                );
            }
            node
        }
    };

    let now = unix_now();
    let inserted = match parent_node {
        None => {
            let node_path = path::root(affiliate_id);
            tree::insert(&tx, affiliate_id, None, 1, &node_path, now)?;
            TreeNodeRow {
                affiliate_id,
                parent_id: None,
                depth: 1,
                path: node_path,
                direct_referrals: 0,
                team_size: 0,
                team_earnings: 0,
                created_at: now,
            }
        }
        Some(parent_node) => {
            let depth = parent_node.depth + 1;
            let node_path = path::child(&parent_node.path, affiliate_id);
            tree::insert(&tx, affiliate_id, Some(parent_node.affiliate_id), depth, &node_path, now)?;

            tree::increment_direct_referrals(&tx, parent_node.affiliate_id)?;
            // Every id on the parent's path is an ancestor of the new node.
            for ancestor_id in path::parse(&parent_node.path)? {
                tree::increment_team_size(&tx, ancestor_id)?;
            }

            TreeNodeRow {
                affiliate_id,
                parent_id: Some(parent_node.affiliate_id),
                depth,
                path: node_path,
                direct_referrals: 0,
                team_size: 0,
                team_earnings: 0,
                created_at: now,
            }
        }
    };

    tx.commit()?;
    tracing::info!(
        affiliate = affiliate_id,
        depth = inserted.depth,
        path = %inserted.path,
        "tree node added"
    );
    Ok(inserted)
}

/// Add `amount` to the `team_earnings` of every ancestor of the given
/// affiliate, in one transaction.
pub fn cascade_earnings(
    conn: &mut Connection,
    affiliate_id: AffiliateId,
    amount: Cents,
) -> Result<usize> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let node = tree::get(&tx, affiliate_id)?.ok_or(TreeError::NodeNotFound(affiliate_id))?;
    let ancestors = path::ancestors(&node.path)?;
    record_team_earnings(&tx, &ancestors, amount)?;
    tx.commit()?;
    Ok(ancestors.len())
}

/// Apply a `team_earnings` increment to a set of ancestors.
///
/// Runs one UPDATE per ancestor on the caller's connection and opens no
/// transaction of its own; callers needing atomicity across ancestors
/// supply a transaction.
pub fn record_team_earnings(
    conn: &Connection,
    ancestor_ids: &[AffiliateId],
    amount: Cents,
) -> Result<()> {
    for &ancestor_id in ancestor_ids {
        tree::add_team_earnings(conn, ancestor_id, amount)?;
    }
    Ok(())
}

/// Ancestors of an affiliate, nearest first (self excluded).
///
/// Ancestor ids come from the materialized path; an id whose node row is
/// missing is skipped with a warning rather than failing the walk.
pub fn upline(conn: &Connection, affiliate_id: AffiliateId) -> Result<Vec<TreeNodeRow>> {
    let node = tree::get(conn, affiliate_id)?.ok_or(TreeError::NodeNotFound(affiliate_id))?;
    let mut ancestor_ids = path::ancestors(&node.path)?;
    ancestor_ids.reverse();

    let mut nodes = Vec::with_capacity(ancestor_ids.len());
    for ancestor_id in ancestor_ids {
        match tree::get(conn, ancestor_id)? {
            Some(n) => nodes.push(n),
            None => {
                tracing::warn!(
                    affiliate = affiliate_id,
                    ancestor = ancestor_id,
                    "ancestor on path has no tree node, skipping"
                );
            }
        }
    }
    Ok(nodes)
}

/// Descendants of an affiliate down to `max_depth` levels below it,
/// nearest levels first.
pub fn downline(
    conn: &Connection,
    affiliate_id: AffiliateId,
    max_depth: i64,
) -> Result<Vec<DownlineMember>> {
    let node = tree::get(conn, affiliate_id)?.ok_or(TreeError::NodeNotFound(affiliate_id))?;
    let rows = tree::downline_by_path(conn, &node.path, node.depth, max_depth)?;
    Ok(rows
        .into_iter()
        .map(|n| {
            let relative_depth = n.depth - node.depth;
            DownlineMember { node: n, relative_depth }
        })
        .collect())
}

/// Aggregate counters for one affiliate.
pub fn stats(conn: &Connection, affiliate_id: AffiliateId) -> Result<TreeStats> {
    let node = tree::get(conn, affiliate_id)?.ok_or(TreeError::NodeNotFound(affiliate_id))?;
    Ok(TreeStats {
        depth: node.depth,
        direct_referrals: node.direct_referrals,
        team_size: node.team_size,
        team_earnings: node.team_earnings,
    })
}

/// Check the path invariants of one node: depth matches the path length,
/// the path ends in the node's own id, and every ancestor's path is a
/// strict prefix of the node's path.
pub fn verify_node(conn: &Connection, affiliate_id: AffiliateId) -> Result<()> {
    let node = tree::get(conn, affiliate_id)?.ok_or(TreeError::NodeNotFound(affiliate_id))?;
    let ids = path::parse(&node.path)?;

    if node.depth != ids.len() as i64 {
        return Err(TreeError::MalformedPath(format!(
            "node {} has depth {} but path {} holds {} ids",
            affiliate_id,
            node.depth,
            node.path,
            ids.len()
        )));
    }
    if ids.last() != Some(&affiliate_id) {
        return Err(TreeError::MalformedPath(format!(
            "node {} path {} does not end in its own id",
            affiliate_id, node.path
        )));
    }
    for ancestor_id in &ids[..ids.len() - 1] {
        let ancestor = tree::get(conn, *ancestor_id)?
            .ok_or(TreeError::NodeNotFound(*ancestor_id))?;
        let prefixed = node.path.starts_with(&format!("{}/", ancestor.path));
        if !prefixed {
            return Err(TreeError::MalformedPath(format!(
                "ancestor {} path {} is not a prefix of node {} path {}",
                ancestor_id, ancestor.path, affiliate_id, node.path
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_db::queries::affiliates;
    use trellis_types::AffiliateStatus;

    fn test_db() -> Connection {
        trellis_db::open_memory().expect("open test db")
    }

    fn seed_affiliate(conn: &Connection, n: i64) -> AffiliateId {
        affiliates::insert(
            conn,
            &format!("user_{n}"),
            &format!("code_{n}"),
            None,
            AffiliateStatus::Active,
            0,
        )
        .expect("insert affiliate")
    }

    /// root -> a -> b -> c, plus d directly under root.
    fn seed_chain(conn: &mut Connection) -> (AffiliateId, AffiliateId, AffiliateId, AffiliateId, AffiliateId) {
        let ids: Vec<AffiliateId> = (1..=5).map(|n| seed_affiliate(conn, n)).collect();
        let (root, a, b, c, d) = (ids[0], ids[1], ids[2], ids[3], ids[4]);
        add_node(conn, root, None).expect("root");
        add_node(conn, a, Some(root)).expect("a");
        add_node(conn, b, Some(a)).expect("b");
        add_node(conn, c, Some(b)).expect("c");
        add_node(conn, d, Some(root)).expect("d");
        (root, a, b, c, d)
    }

    #[test]
    fn test_add_root_node() {
        let mut conn = test_db();
        let id = seed_affiliate(&conn, 1);
        let node = add_node(&mut conn, id, None).expect("add root");
        assert_eq!(node.depth, 1);
        assert_eq!(node.path, format!("/{id}"));
        assert_eq!(node.parent_id, None);
        verify_node(&conn, id).expect("invariants hold");
    }

    #[test]
    fn test_chain_paths_and_rollups() {
        let mut conn = test_db();
        let (root, a, b, c, _d) = seed_chain(&mut conn);

        let node_c = trellis_db::queries::tree::get(&conn, c).expect("get").expect("c");
        assert_eq!(node_c.depth, 4);
        assert_eq!(node_c.path, format!("/{root}/{a}/{b}/{c}"));

        // Rollups: root has 2 direct (a, d) and 4 descendants total.
        let s = stats(&conn, root).expect("stats");
        assert_eq!(s.direct_referrals, 2);
        assert_eq!(s.team_size, 4);

        let s = stats(&conn, a).expect("stats");
        assert_eq!(s.direct_referrals, 1);
        assert_eq!(s.team_size, 2);

        for id in [root, a, b, c] {
            verify_node(&conn, id).expect("invariants hold");
        }
    }

    #[test]
    fn test_add_node_twice_rejected() {
        let mut conn = test_db();
        let id = seed_affiliate(&conn, 1);
        add_node(&mut conn, id, None).expect("add");
        assert!(matches!(
            add_node(&mut conn, id, None),
            Err(TreeError::AlreadyInTree(_))
        ));
    }

    #[test]
    fn test_missing_parent_falls_back_to_root() {
        let mut conn = test_db();
        let id = seed_affiliate(&conn, 1);
        let node = add_node(&mut conn, id, Some(9_999)).expect("add with ghost parent");
        assert_eq!(node.depth, 1);
        assert_eq!(node.parent_id, None);
        assert_eq!(node.path, format!("/{id}"));
    }

    #[test]
    fn test_upline_nearest_first() {
        let mut conn = test_db();
        let (root, a, b, c, _d) = seed_chain(&mut conn);

        let up = upline(&conn, c).expect("upline");
        assert_eq!(
            up.iter().map(|n| n.affiliate_id).collect::<Vec<_>>(),
            vec![b, a, root]
        );

        assert!(upline(&conn, root).expect("upline").is_empty());
    }

    #[test]
    fn test_downline_relative_depths() {
        let mut conn = test_db();
        let (root, a, b, c, d) = seed_chain(&mut conn);

        let down = downline(&conn, root, 3).expect("downline");
        let got: Vec<(AffiliateId, i64)> = down
            .iter()
            .map(|m| (m.node.affiliate_id, m.relative_depth))
            .collect();
        assert_eq!(got, vec![(a, 1), (d, 1), (b, 2), (c, 3)]);

        let down = downline(&conn, root, 2).expect("downline");
        assert_eq!(down.len(), 3, "depth cut excludes the great-grandchild");
    }

    #[test]
    fn test_cascade_earnings_reaches_all_ancestors() {
        let mut conn = test_db();
        let (root, a, b, c, _d) = seed_chain(&mut conn);

        let touched = cascade_earnings(&mut conn, c, 500).expect("cascade");
        assert_eq!(touched, 3);

        for id in [root, a, b] {
            assert_eq!(stats(&conn, id).expect("stats").team_earnings, 500);
        }
        assert_eq!(stats(&conn, c).expect("stats").team_earnings, 0, "self excluded");
    }

    #[test]
    fn test_cascade_earnings_missing_node() {
        let mut conn = test_db();
        assert!(matches!(
            cascade_earnings(&mut conn, 42, 100),
            Err(TreeError::NodeNotFound(42))
        ));
    }

    #[test]
    fn test_verify_node_detects_corruption() {
        let mut conn = test_db();
        let (_root, _a, _b, c, _d) = seed_chain(&mut conn);

        conn.execute(
            "UPDATE tree_nodes SET depth = 2 WHERE affiliate_id = ?1",
            [c],
        )
        .expect("corrupt depth");

        assert!(matches!(
            verify_node(&conn, c),
            Err(TreeError::MalformedPath(_))
        ));
    }
}
