//! Affiliate registration, status transitions, and tier recompute.

use rusqlite::Connection;
use trellis_db::queries::{affiliates, affiliates::AffiliateRow, tiers, tiers::TierRow};
use trellis_tree::forest;
use trellis_types::{unix_now, AffiliateId, AffiliateStatus};

use crate::config::CascadeConfig;
use crate::hooks::{Notifier, NotifyEvent};
use crate::{CommissionError, Result};

/// Register a new affiliate.
///
/// Generates a unique referral code, resolves the referrer code (an
/// unknown code simply means no referrer), and, when a referrer exists,
/// hangs the new affiliate under it in the tree and bumps the referrer's
/// referral count. The starting status follows `config.auto_approve`.
///
/// # Errors
///
/// - [`CommissionError::AffiliateExists`] if the user already registered
pub fn register(
    conn: &mut Connection,
    config: &CascadeConfig,
    user_ref: &str,
    referrer_code: Option<&str>,
    notifier: &dyn Notifier,
) -> Result<AffiliateRow> {
    if affiliates::get_by_user(conn, user_ref)?.is_some() {
        return Err(CommissionError::AffiliateExists(user_ref.to_string()));
    }

    let code = generate_unique_code(conn, user_ref)?;
    let referrer = match referrer_code {
        Some(c) => affiliates::get_by_code(conn, c)?,
        None => None,
    };
    let status = if config.auto_approve {
        AffiliateStatus::Active
    } else {
        AffiliateStatus::Pending
    };

    let id = affiliates::insert(
        conn,
        user_ref,
        &code,
        referrer.as_ref().map(|r| r.id),
        status,
        unix_now(),
    )?;

    if let Some(referrer) = &referrer {
        affiliates::increment_referrals(conn, referrer.id)?;
        // A referrer who never recruited before has no tree node yet;
        // seed their root so the new edge is never lost.
        if trellis_db::queries::tree::get(conn, referrer.id)?.is_none() {
            forest::add_node(conn, referrer.id, referrer.referrer_id)?;
        }
        forest::add_node(conn, id, Some(referrer.id))?;
    }

    tracing::info!(
        affiliate = id,
        user = user_ref,
        code = %code,
        referrer = referrer.as_ref().map(|r| r.id),
        status = status.as_str(),
        "affiliate registered"
    );
    notifier.notify(id, NotifyEvent::Welcome { status, code });

    affiliates::get(conn, id)?.ok_or(CommissionError::AffiliateNotFound(id))
}

/// Change an affiliate's status.
pub fn set_status(
    conn: &Connection,
    affiliate_id: AffiliateId,
    status: AffiliateStatus,
    notifier: &dyn Notifier,
) -> Result<()> {
    match affiliates::set_status(conn, affiliate_id, status) {
        Ok(()) => {}
        Err(trellis_db::DbError::NotFound(_)) => {
            return Err(CommissionError::AffiliateNotFound(affiliate_id));
        }
        Err(e) => return Err(e.into()),
    }
    tracing::info!(affiliate = affiliate_id, status = status.as_str(), "status changed");
    notifier.notify(affiliate_id, NotifyEvent::StatusChanged { status });
    Ok(())
}

/// Recompute an affiliate's tier from lifetime stats.
///
/// The qualifying tier is the highest level whose earnings and referral
/// minimums are both met. Upgrades apply and notify; the tier never
/// moves down. Returns the new tier on upgrade.
pub fn recompute_tier(
    conn: &Connection,
    affiliate_id: AffiliateId,
    notifier: &dyn Notifier,
) -> Result<Option<TierRow>> {
    let affiliate = affiliates::get(conn, affiliate_id)?
        .ok_or(CommissionError::AffiliateNotFound(affiliate_id))?;

    let qualifying = tiers::qualifying(conn, affiliate.lifetime_earnings, affiliate.total_referrals)?;
    let Some(tier) = qualifying else {
        return Ok(None);
    };
    if tier.level <= affiliate.tier_level {
        return Ok(None);
    }

    affiliates::set_tier_level(conn, affiliate_id, tier.level)?;
    tracing::info!(
        affiliate = affiliate_id,
        tier = tier.level,
        name = %tier.name,
        "tier upgraded"
    );
    notifier.notify(
        affiliate_id,
        NotifyEvent::TierUpgraded {
            tier_level: tier.level,
            tier_name: tier.name.clone(),
        },
    );
    Ok(Some(tier))
}

/// Generate a unique referral code from the user reference plus a random
/// numeric suffix, retrying with a wider suffix on collision.
fn generate_unique_code(conn: &Connection, user_ref: &str) -> Result<String> {
    use rand::Rng;

    let base: String = user_ref
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(12)
        .collect::<String>()
        .to_lowercase();
    let base = if base.is_empty() { "aff".to_string() } else { base };

    let mut code = format!("{base}{}", rand::rngs::OsRng.gen_range(100..1_000));
    while affiliates::code_exists(conn, &code)? {
        code = format!("{base}{}", rand::rngs::OsRng.gen_range(1_000..10_000));
    }
    Ok(code)
}
