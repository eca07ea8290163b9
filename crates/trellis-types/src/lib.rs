//! # trellis-types
//!
//! Shared domain types used across the Trellis workspace: identifier
//! aliases, money and rate representation, status enums, and global
//! defaults.
//!
//! All monetary amounts are integer cents ([`Cents`]); percentage rates
//! are integer basis points ([`RateBps`], 100 bps = 1%). Floating point
//! never touches money.

use serde::{Deserialize, Serialize};

/// Row id of an affiliate.
pub type AffiliateId = i64;
/// Row id of a credit balance record.
pub type BalanceId = i64;
/// Row id of a commission record.
pub type CommissionId = i64;
/// Tier level number (1 = entry tier).
pub type TierLevel = i64;
/// Monetary amount in integer cents.
pub type Cents = i64;
/// Percentage rate in integer basis points (100 bps = 1%).
pub type RateBps = i64;

/// Basis points denominator (10 000 bps = 100%).
pub const BPS_DENOMINATOR: i64 = 10_000;

/// Fallback direct commission rate when no tier rate applies (10%).
pub const DEFAULT_COMMISSION_RATE_BPS: RateBps = 1_000;

/// Default maximum cascade depth for upline commissions.
pub const DEFAULT_MAX_CASCADE_DEPTH: u32 = 3;

/// Deepest cascade depth a tier defines a rate for. Depths beyond this
/// always earn a zero rate regardless of configuration.
pub const TIER_CASCADE_DEPTHS: u32 = 3;

/// Compute a commission in cents from an order total and a rate in basis
/// points. The division floors, so sub-cent remainders are dropped.
pub fn commission_amount(order_total: Cents, rate_bps: RateBps) -> Cents {
    let product = i128::from(order_total) * i128::from(rate_bps);
    (product / i128::from(BPS_DENOMINATOR)) as Cents
}

/// Current Unix timestamp in seconds.
pub fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Lifecycle status of an affiliate account.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffiliateStatus {
    /// Registered, awaiting approval. Earns no commissions.
    Pending,
    /// Approved and earning.
    Active,
    /// Temporarily disabled by an operator.
    Suspended,
    /// Application declined.
    Rejected,
}

impl AffiliateStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Rejected => "rejected",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "suspended" => Some(Self::Suspended),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Lifecycle status of a commission record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    /// Created, not yet paid out.
    Pending,
    /// Paid out.
    Paid,
    /// Reversed after an order refund.
    Refunded,
}

impl CommissionStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Refunded => "refunded",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }
}

/// Origin of a commission record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommissionKind {
    /// Direct sale commission for the attributed affiliate (depth 0).
    Sale,
    /// Upline cascade commission at the given depth (1 = nearest
    /// ancestor of the selling affiliate).
    Cascade { depth: u32 },
}

impl CommissionKind {
    /// Storage tag: `sale` or `cascade_level_<depth>`.
    pub fn storage_tag(&self) -> String {
        match self {
            Self::Sale => "sale".to_string(),
            Self::Cascade { depth } => format!("cascade_level_{depth}"),
        }
    }

    /// Parse a storage tag.
    pub fn parse_tag(s: &str) -> Option<Self> {
        if s == "sale" {
            return Some(Self::Sale);
        }
        let depth = s.strip_prefix("cascade_level_")?.parse().ok()?;
        Some(Self::Cascade { depth })
    }

    /// Cascade depth for this kind (0 for a direct sale).
    pub fn depth(&self) -> u32 {
        match self {
            Self::Sale => 0,
            Self::Cascade { depth } => *depth,
        }
    }
}
