//! SQL schema definitions.

/// Complete schema for the Trellis v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Credit ledger
-- ============================================================

CREATE TABLE IF NOT EXISTS credit_balances (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_key TEXT NOT NULL UNIQUE,
    credits_total INTEGER NOT NULL,
    credits_consumed INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    CHECK (credits_consumed >= 0),
    CHECK (credits_consumed <= credits_total)
);

CREATE TABLE IF NOT EXISTS credit_journal (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    balance_id INTEGER NOT NULL REFERENCES credit_balances(id),
    amount INTEGER NOT NULL,
    balance_after INTEGER NOT NULL,
    action TEXT NOT NULL,
    request_token TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_journal_balance ON credit_journal(balance_id);

-- ============================================================
-- Affiliates
-- ============================================================

CREATE TABLE IF NOT EXISTS affiliates (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_ref TEXT NOT NULL UNIQUE,
    affiliate_code TEXT NOT NULL UNIQUE,
    referrer_id INTEGER REFERENCES affiliates(id),
    status TEXT NOT NULL DEFAULT 'pending',
    tier_level INTEGER NOT NULL DEFAULT 1,
    lifetime_earnings INTEGER NOT NULL DEFAULT 0,
    current_balance INTEGER NOT NULL DEFAULT 0,
    total_referrals INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_affiliates_status ON affiliates(status);
CREATE INDEX IF NOT EXISTS idx_affiliates_referrer ON affiliates(referrer_id);

-- ============================================================
-- MLM forest (materialized paths)
-- ============================================================

CREATE TABLE IF NOT EXISTS tree_nodes (
    affiliate_id INTEGER PRIMARY KEY REFERENCES affiliates(id),
    parent_id INTEGER REFERENCES affiliates(id),
    depth INTEGER NOT NULL,
    path TEXT NOT NULL,
    direct_referrals INTEGER NOT NULL DEFAULT 0,
    team_size INTEGER NOT NULL DEFAULT 0,
    team_earnings INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tree_parent ON tree_nodes(parent_id);
CREATE INDEX IF NOT EXISTS idx_tree_path ON tree_nodes(path);

-- ============================================================
-- Tiers
-- ============================================================

CREATE TABLE IF NOT EXISTS tiers (
    level INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    min_earnings INTEGER NOT NULL DEFAULT 0,
    min_referrals INTEGER NOT NULL DEFAULT 0,
    base_rate_bps INTEGER NOT NULL,
    cascade_rate_bps_1 INTEGER NOT NULL DEFAULT 0,
    cascade_rate_bps_2 INTEGER NOT NULL DEFAULT 0,
    cascade_rate_bps_3 INTEGER NOT NULL DEFAULT 0,
    perks TEXT,
    created_at INTEGER NOT NULL
);

-- ============================================================
-- Commissions & order attribution
-- ============================================================

CREATE TABLE IF NOT EXISTS commissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    affiliate_id INTEGER NOT NULL REFERENCES affiliates(id),
    order_ref TEXT NOT NULL,
    kind TEXT NOT NULL,
    cascade_depth INTEGER NOT NULL DEFAULT 0,
    rate_bps INTEGER NOT NULL,
    amount INTEGER NOT NULL,
    order_total INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    paid_at INTEGER,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_commissions_affiliate ON commissions(affiliate_id);
CREATE INDEX IF NOT EXISTS idx_commissions_order ON commissions(order_ref);
CREATE INDEX IF NOT EXISTS idx_commissions_status ON commissions(status);

CREATE TABLE IF NOT EXISTS processed_orders (
    order_ref TEXT PRIMARY KEY,
    affiliate_id INTEGER NOT NULL,
    processed_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS linked_customers (
    customer_ref TEXT PRIMARY KEY,
    affiliate_id INTEGER NOT NULL REFERENCES affiliates(id),
    linked_at INTEGER NOT NULL
);

-- ============================================================
-- Settings
-- ============================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
