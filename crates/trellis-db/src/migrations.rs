//! Database migration system.
//!
//! Schema version stored in `PRAGMA user_version`. Migrations are
//! forward-only; rollback requires rebuilding the database.

use rusqlite::Connection;

use crate::{schema, DbError, Result, SCHEMA_VERSION};

/// Run all pending migrations.
pub fn run(conn: &Connection) -> Result<()> {
    let current_version: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(DbError::Sqlite)?;

    if current_version == 0 {
        // Fresh database — apply initial schema
        tracing::info!("Initializing database schema v{SCHEMA_VERSION}");
        conn.execute_batch(schema::SCHEMA_V1)
            .map_err(DbError::Sqlite)?;

        insert_default_settings(conn)?;
        insert_default_tiers(conn)?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(DbError::Sqlite)?;
    } else if current_version < SCHEMA_VERSION {
        for version in (current_version + 1)..=SCHEMA_VERSION {
            tracing::info!("Running migration to v{version}");
            run_migration(conn, version)?;
            conn.pragma_update(None, "user_version", version)
                .map_err(DbError::Sqlite)?;
        }
    } else if current_version > SCHEMA_VERSION {
        return Err(DbError::Migration(format!(
            "Database version {current_version} is newer than supported {SCHEMA_VERSION}"
        )));
    }

    Ok(())
}

/// Insert default settings.
fn insert_default_settings(conn: &Connection) -> Result<()> {
    let defaults = [
        ("mlm_enabled", "true"),
        ("max_cascade_depth", "3"),
        ("default_rate_bps", "1000"),
        ("lifetime_attribution", "true"),
        ("auto_approve", "false"),
    ];

    let mut stmt = conn
        .prepare("INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)")
        .map_err(DbError::Sqlite)?;

    for (key, value) in &defaults {
        stmt.execute(rusqlite::params![key, value])
            .map_err(DbError::Sqlite)?;
    }

    Ok(())
}

/// Seed the default tier table on a fresh install.
///
/// Earnings thresholds are cents, rates basis points. Each tier carries
/// its own absolute cascade rate per depth; deeper tiers do not derive
/// from shallower ones.
fn insert_default_tiers(conn: &Connection) -> Result<()> {
    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM tiers", [], |row| row.get(0))
        .map_err(DbError::Sqlite)?;
    if existing > 0 {
        return Ok(());
    }

    // (name, level, min_earnings, min_referrals, base, l1, l2, l3, perks)
    let defaults: [(&str, i64, i64, i64, i64, i64, i64, i64, serde_json::Value); 5] = [
        (
            "Bronze", 1, 0, 0, 500, 200, 100, 50,
            serde_json::json!({"basic_dashboard": true}),
        ),
        (
            "Silver", 2, 50_000, 10, 700, 300, 150, 75,
            serde_json::json!({"basic_dashboard": true, "custom_links": true}),
        ),
        (
            "Gold", 3, 200_000, 50, 1_000, 400, 200, 100,
            serde_json::json!({"basic_dashboard": true, "custom_links": true, "priority_support": true}),
        ),
        (
            "Platinum", 4, 1_000_000, 200, 1_500, 500, 250, 125,
            serde_json::json!({"basic_dashboard": true, "custom_links": true, "priority_support": true, "exclusive_offers": true}),
        ),
        (
            "Diamond", 5, 5_000_000, 1_000, 2_000, 700, 350, 175,
            serde_json::json!({"all_features": true, "personal_manager": true}),
        ),
    ];

    let mut stmt = conn
        .prepare(
            "INSERT INTO tiers
                 (level, name, min_earnings, min_referrals, base_rate_bps,
                  cascade_rate_bps_1, cascade_rate_bps_2, cascade_rate_bps_3,
                  perks, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .map_err(DbError::Sqlite)?;

    let now = trellis_types::unix_now();
    for (name, level, min_earnings, min_referrals, base, l1, l2, l3, perks) in &defaults {
        stmt.execute(rusqlite::params![
            level,
            name,
            min_earnings,
            min_referrals,
            base,
            l1,
            l2,
            l3,
            perks.to_string(),
            now,
        ])
        .map_err(DbError::Sqlite)?;
    }

    Ok(())
}

/// Run a specific migration.
fn run_migration(conn: &Connection, version: u32) -> Result<()> {
    let _ = conn;
    match version {
        // Future migrations go here:
        // 2 => migration_v2(conn),
        _ => Err(DbError::Migration(format!(
            "Unknown migration version: {version}"
        ))),
    }
}
