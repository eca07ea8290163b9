//! Typed engine configuration.
//!
//! All tunables live in one struct with documented defaults, persisted
//! in the `settings` key-value table. The engine receives the config at
//! construction; nothing reads settings mid-operation.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use trellis_db::queries::settings;
use trellis_types::{RateBps, DEFAULT_COMMISSION_RATE_BPS, DEFAULT_MAX_CASCADE_DEPTH};

use crate::Result;

/// Commission engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Whether upline cascade commissions are created at all.
    #[serde(default = "default_true")]
    pub mlm_enabled: bool,
    /// How many ancestors the cascade walk visits.
    #[serde(default = "default_max_depth")]
    pub max_cascade_depth: u32,
    /// Direct commission rate when the affiliate's tier is missing.
    #[serde(default = "default_rate_bps")]
    pub default_rate_bps: RateBps,
    /// Whether a customer's lifetime-linked affiliate is used as the
    /// attribution fallback.
    #[serde(default = "default_true")]
    pub lifetime_attribution: bool,
    /// Whether new registrations start `active` instead of `pending`.
    #[serde(default)]
    pub auto_approve: bool,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            mlm_enabled: true,
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
            default_rate_bps: DEFAULT_COMMISSION_RATE_BPS,
            lifetime_attribution: true,
            auto_approve: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_depth() -> u32 {
    DEFAULT_MAX_CASCADE_DEPTH
}

fn default_rate_bps() -> RateBps {
    DEFAULT_COMMISSION_RATE_BPS
}

/// Settings keys. Seeded by the initial migration.
const KEY_MLM_ENABLED: &str = "mlm_enabled";
const KEY_MAX_CASCADE_DEPTH: &str = "max_cascade_depth";
const KEY_DEFAULT_RATE_BPS: &str = "default_rate_bps";
const KEY_LIFETIME_ATTRIBUTION: &str = "lifetime_attribution";
const KEY_AUTO_APPROVE: &str = "auto_approve";

impl CascadeConfig {
    /// Load the configuration from the settings table, falling back to
    /// the documented default for any missing key.
    pub fn load(conn: &Connection) -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            mlm_enabled: settings::get_bool(conn, KEY_MLM_ENABLED, defaults.mlm_enabled)?,
            max_cascade_depth: settings::get_i64(
                conn,
                KEY_MAX_CASCADE_DEPTH,
                i64::from(defaults.max_cascade_depth),
            )?
            .clamp(0, i64::from(u32::MAX)) as u32,
            default_rate_bps: settings::get_i64(
                conn,
                KEY_DEFAULT_RATE_BPS,
                defaults.default_rate_bps,
            )?,
            lifetime_attribution: settings::get_bool(
                conn,
                KEY_LIFETIME_ATTRIBUTION,
                defaults.lifetime_attribution,
            )?,
            auto_approve: settings::get_bool(conn, KEY_AUTO_APPROVE, defaults.auto_approve)?,
        })
    }

    /// Persist the configuration to the settings table.
    pub fn store(&self, conn: &Connection) -> Result<()> {
        settings::set(conn, KEY_MLM_ENABLED, bool_str(self.mlm_enabled))?;
        settings::set(conn, KEY_MAX_CASCADE_DEPTH, &self.max_cascade_depth.to_string())?;
        settings::set(conn, KEY_DEFAULT_RATE_BPS, &self.default_rate_bps.to_string())?;
        settings::set(conn, KEY_LIFETIME_ATTRIBUTION, bool_str(self.lifetime_attribution))?;
        settings::set(conn, KEY_AUTO_APPROVE, bool_str(self.auto_approve))?;
        Ok(())
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}
