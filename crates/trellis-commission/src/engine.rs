//! Sale attribution, the commission cascade, refunds, and payouts.

use rusqlite::{Connection, TransactionBehavior};
use trellis_db::queries::{
    affiliates, affiliates::AffiliateRow, commissions, commissions::CommissionSummary, orders,
    tiers, tree,
};
use trellis_tree::forest;
use trellis_types::{
    commission_amount, unix_now, AffiliateId, Cents, CommissionId, CommissionKind, RateBps,
};

use crate::config::CascadeConfig;
use crate::hooks::{BadgeEngine, NoopBadges, NoopNotifier, Notifier, NotifyEvent};
use crate::Result;

/// A completed sale as reported by the order system. `order_total` and
/// `order_tax` are cents; commissions are computed on the total net of
/// tax.
#[derive(Debug, Clone)]
pub struct SaleEvent {
    pub order_ref: String,
    pub order_total: Cents,
    pub order_tax: Cents,
    /// Customer reference, used for lifetime attribution.
    pub customer_ref: Option<String>,
    /// Attribution stored on the order itself; checked first.
    pub affiliate_id: Option<AffiliateId>,
    /// Referral code captured at checkout; checked second.
    pub referral_code: Option<String>,
    /// Product-specific rate override for the direct commission.
    pub product_rate_bps: Option<RateBps>,
}

/// One created commission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionShare {
    pub commission_id: CommissionId,
    pub affiliate_id: AffiliateId,
    /// 0 for the direct sale, 1..N for cascade levels.
    pub depth: u32,
    pub rate_bps: RateBps,
    pub amount: Cents,
}

/// Everything one processed sale created.
#[derive(Debug, Clone)]
pub struct SaleBreakdown {
    pub order_ref: String,
    pub direct: CommissionShare,
    pub cascade: Vec<CommissionShare>,
}

/// Result of offering a sale to the engine. Only `Processed` changed
/// any state.
#[derive(Debug, Clone)]
pub enum SaleOutcome {
    /// Commissions created.
    Processed(SaleBreakdown),
    /// This order was commissioned earlier; nothing was created.
    AlreadyProcessed,
    /// No affiliate could be attributed; nothing was created.
    NoAffiliate,
    /// The attributed affiliate is not active; nothing was created.
    AffiliateInactive,
}

/// The commission engine. Construct once with a [`CascadeConfig`] and
/// pass it wherever sales are processed.
pub struct CommissionEngine<B = NoopBadges, N = NoopNotifier> {
    config: CascadeConfig,
    badges: B,
    notifier: N,
}

impl CommissionEngine {
    /// Engine with no-op collaborators.
    pub fn new(config: CascadeConfig) -> Self {
        Self {
            config,
            badges: NoopBadges,
            notifier: NoopNotifier,
        }
    }
}

impl<B: BadgeEngine, N: Notifier> CommissionEngine<B, N> {
    /// Engine with explicit collaborators.
    pub fn with_hooks(config: CascadeConfig, badges: B, notifier: N) -> Self {
        Self {
            config,
            badges,
            notifier,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &CascadeConfig {
        &self.config
    }

    /// Process one completed sale.
    ///
    /// The direct commission, every cascade commission, the balance and
    /// rollup updates, and the processed-order marker commit in a single
    /// transaction; a failure anywhere commits nothing. The second call
    /// for the same `order_ref` is a no-op.
    ///
    /// Cascade walk: ancestors nearest first, up to
    /// `config.max_cascade_depth` levels. An inactive ancestor is
    /// skipped but still consumes its depth; each ancestor earns its own
    /// tier's rate for the depth at which it sits, and a zero rate
    /// creates no record.
    ///
    /// Tier recompute, badge checks, and notifications run after the
    /// commit and cannot abort it.
    pub fn process_sale(&self, conn: &mut Connection, event: &SaleEvent) -> Result<SaleOutcome> {
        let now = unix_now();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if orders::is_processed(&tx, &event.order_ref)? {
            return Ok(SaleOutcome::AlreadyProcessed);
        }
        let Some(affiliate) = resolve_affiliate(&tx, &self.config, event)? else {
            return Ok(SaleOutcome::NoAffiliate);
        };
        if !affiliate.is_active() {
            return Ok(SaleOutcome::AffiliateInactive);
        }

        // Tax never earns commission.
        let commissionable = event.order_total - event.order_tax;

        // Direct commission: product override beats the tier rate beats
        // the configured default; badge bonus applies on top.
        let tier_rate = tiers::get_by_level(&tx, affiliate.tier_level)?.map(|t| t.base_rate_bps);
        let base_rate = event
            .product_rate_bps
            .or(tier_rate)
            .unwrap_or(self.config.default_rate_bps);
        let rate = base_rate + self.badges.commission_bonus_bps(affiliate.id);
        let amount = commission_amount(commissionable, rate);

        let commission_id = commissions::insert(
            &tx,
            affiliate.id,
            &event.order_ref,
            CommissionKind::Sale,
            rate,
            amount,
            commissionable,
            now,
        )?;
        affiliates::add_earnings(&tx, affiliate.id, amount)?;

        let direct = CommissionShare {
            commission_id,
            affiliate_id: affiliate.id,
            depth: 0,
            rate_bps: rate,
            amount,
        };

        let cascade = if self.config.mlm_enabled {
            self.cascade_upline(&tx, &affiliate, event, commissionable, now)?
        } else {
            Vec::new()
        };

        orders::mark_processed(&tx, &event.order_ref, affiliate.id, now)?;
        tx.commit()?;

        tracing::info!(
            order = %event.order_ref,
            affiliate = affiliate.id,
            direct = direct.amount,
            cascade_levels = cascade.len(),
            "sale commissioned"
        );

        // Post-commit collaborators.
        crate::registry::recompute_tier(conn, affiliate.id, &self.notifier)?;
        self.badges.check_badges(affiliate.id);
        self.notifier.notify(
            affiliate.id,
            NotifyEvent::CommissionEarned {
                order_ref: event.order_ref.clone(),
                amount: direct.amount,
            },
        );
        for share in &cascade {
            self.notifier.notify(
                share.affiliate_id,
                NotifyEvent::CascadeCommissionEarned {
                    order_ref: event.order_ref.clone(),
                    depth: share.depth,
                    amount: share.amount,
                    from_affiliate: affiliate.id,
                },
            );
        }

        Ok(SaleOutcome::Processed(SaleBreakdown {
            order_ref: event.order_ref.clone(),
            direct,
            cascade,
        }))
    }

    /// Walk the upline and create cascade commissions. Runs inside the
    /// caller's transaction.
    fn cascade_upline(
        &self,
        tx: &Connection,
        seller: &AffiliateRow,
        event: &SaleEvent,
        commissionable: Cents,
        now: i64,
    ) -> Result<Vec<CommissionShare>> {
        // A seller outside the forest simply has no upline.
        let upline = match forest::upline(tx, seller.id) {
            Ok(upline) => upline,
            Err(trellis_tree::TreeError::NodeNotFound(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut shares = Vec::new();
        let max = self.config.max_cascade_depth as usize;
        for (position, ancestor_node) in upline.iter().take(max).enumerate() {
            let depth = (position + 1) as u32;

            let Some(ancestor) = affiliates::get(tx, ancestor_node.affiliate_id)? else {
                continue;
            };
            if !ancestor.is_active() {
                // Skip, but the depth position is consumed: deeper
                // ancestors keep their own depths.
                continue;
            }
            let Some(tier) = tiers::get_by_level(tx, ancestor.tier_level)? else {
                continue;
            };
            let rate = tier.cascade_rate_bps(depth);
            if rate <= 0 {
                continue;
            }

            let amount = commission_amount(commissionable, rate);
            let commission_id = commissions::insert(
                tx,
                ancestor.id,
                &event.order_ref,
                CommissionKind::Cascade { depth },
                rate,
                amount,
                commissionable,
                now,
            )?;
            affiliates::add_earnings(tx, ancestor.id, amount)?;
            tree::add_team_earnings(tx, ancestor.id, amount)?;

            shares.push(CommissionShare {
                commission_id,
                affiliate_id: ancestor.id,
                depth,
                rate_bps: rate,
                amount,
            });
        }
        Ok(shares)
    }

    /// Reverse the commissions of a refunded order.
    ///
    /// Every pending commission for the order flips to `refunded` and
    /// its affiliate's payable balance drops by the commission amount,
    /// clamped at zero. Already-paid commissions are left alone. Returns
    /// whether anything was reversed.
    pub fn handle_refund(&self, conn: &mut Connection, order_ref: &str) -> Result<bool> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let pending = commissions::pending_for_order(&tx, order_ref)?;
        if pending.is_empty() {
            return Ok(false);
        }

        for commission in &pending {
            commissions::mark_refunded(&tx, commission.id)?;
            affiliates::deduct_balance_clamped(&tx, commission.affiliate_id, commission.amount)?;
        }
        tx.commit()?;

        tracing::info!(order = order_ref, reversed = pending.len(), "commissions refunded");
        for commission in &pending {
            self.notifier.notify(
                commission.affiliate_id,
                NotifyEvent::CommissionRefunded {
                    order_ref: order_ref.to_string(),
                    amount: commission.amount,
                },
            );
        }
        Ok(true)
    }
}

/// Resolve the affiliate a sale is attributed to. Priority: attribution
/// stored on the order, then the checkout referral code, then (when
/// enabled) the customer's lifetime-linked affiliate. First match wins.
pub fn resolve_affiliate(
    conn: &Connection,
    config: &CascadeConfig,
    event: &SaleEvent,
) -> Result<Option<AffiliateRow>> {
    if let Some(id) = event.affiliate_id {
        if let Some(affiliate) = affiliates::get(conn, id)? {
            return Ok(Some(affiliate));
        }
    }
    if let Some(code) = &event.referral_code {
        if let Some(affiliate) = affiliates::get_by_code(conn, code)? {
            return Ok(Some(affiliate));
        }
    }
    if config.lifetime_attribution {
        if let Some(customer) = &event.customer_ref {
            if let Some(id) = orders::linked_affiliate(conn, customer)? {
                if let Some(affiliate) = affiliates::get(conn, id)? {
                    return Ok(Some(affiliate));
                }
            }
        }
    }
    Ok(None)
}

/// Link a customer to an affiliate for lifetime attribution.
pub fn link_customer(
    conn: &Connection,
    customer_ref: &str,
    affiliate_id: AffiliateId,
) -> Result<()> {
    orders::link_customer(conn, customer_ref, affiliate_id, unix_now())?;
    Ok(())
}

/// Transition a pending commission to `paid`. Returns whether a row
/// changed; anything not pending is left alone.
pub fn mark_paid(conn: &Connection, commission_id: CommissionId) -> Result<bool> {
    let changed = commissions::mark_paid(conn, commission_id, unix_now())?;
    if changed {
        tracing::info!(commission = commission_id, "commission paid");
    }
    Ok(changed)
}

/// Pending/paid/total aggregates, optionally scoped to one affiliate.
pub fn summary(conn: &Connection, affiliate_id: Option<AffiliateId>) -> Result<CommissionSummary> {
    Ok(commissions::summary(conn, affiliate_id)?)
}
