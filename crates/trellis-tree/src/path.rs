//! Materialized path encoding.
//!
//! A path is the `/`-delimited chain of affiliate ids from the root to
//! the node itself, e.g. `/12/55/98`. The node's depth equals the number
//! of ids in its path, and every ancestor's path is a strict prefix.

use trellis_types::AffiliateId;

use crate::{Result, TreeError};

/// Path of a root node.
pub fn root(id: AffiliateId) -> String {
    format!("/{id}")
}

/// Path of a child under `parent_path`.
pub fn child(parent_path: &str, id: AffiliateId) -> String {
    format!("{parent_path}/{id}")
}

/// Encode an id chain, root first.
pub fn encode(ids: &[AffiliateId]) -> String {
    let mut out = String::new();
    for id in ids {
        out.push('/');
        out.push_str(&id.to_string());
    }
    out
}

/// Decode a path into its id chain, root first.
pub fn parse(path: &str) -> Result<Vec<AffiliateId>> {
    if !path.starts_with('/') {
        return Err(TreeError::MalformedPath(path.to_string()));
    }
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| TreeError::MalformedPath(path.to_string()))
        })
        .collect()
}

/// Ancestor ids of the node owning `path`, root first (self excluded).
pub fn ancestors(path: &str) -> Result<Vec<AffiliateId>> {
    let mut ids = parse(path)?;
    ids.pop();
    Ok(ids)
}
