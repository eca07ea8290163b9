//! Integration test: the commission lifecycle end to end.
//!
//! Registers a referral network, processes sales through the engine,
//! and follows the money through tier upgrades, refund reversal, payout
//! transitions, and the forest's aggregate counters.

use rusqlite::Connection;
use trellis_commission::config::CascadeConfig;
use trellis_commission::engine::{CommissionEngine, SaleEvent, SaleOutcome};
use trellis_commission::hooks::NoopNotifier;
use trellis_commission::registry;
use trellis_db::queries::{affiliates, affiliates::AffiliateRow};
use trellis_tree::forest;
use trellis_types::{AffiliateId, Cents};

fn open_db() -> Connection {
    trellis_db::open_memory().expect("open db")
}

fn auto_approve() -> CascadeConfig {
    CascadeConfig {
        auto_approve: true,
        ..CascadeConfig::default()
    }
}

fn register(conn: &mut Connection, user: &str, referrer_code: Option<&str>) -> AffiliateRow {
    registry::register(conn, &auto_approve(), user, referrer_code, &NoopNotifier)
        .expect("register affiliate")
}

fn sale(order_ref: &str, affiliate_id: AffiliateId, total: Cents) -> SaleEvent {
    SaleEvent {
        order_ref: order_ref.to_string(),
        order_total: total,
        order_tax: 0,
        customer_ref: None,
        affiliate_id: Some(affiliate_id),
        referral_code: None,
        product_rate_bps: None,
    }
}

fn breakdown(outcome: SaleOutcome) -> trellis_commission::engine::SaleBreakdown {
    match outcome {
        SaleOutcome::Processed(b) => b,
        other => unreachable!("expected Processed, got {other:?}"),
    }
}

#[test]
fn full_commission_lifecycle() {
    let mut conn = open_db();
    let engine = CommissionEngine::new(CascadeConfig::default());

    // Network: sponsor -> seller, sponsor -> 11 other recruits.
    let sponsor = register(&mut conn, "sponsor", None);
    let seller = register(&mut conn, "seller", Some(&sponsor.affiliate_code));
    for i in 0..11 {
        register(&mut conn, &format!("recruit_{i}"), Some(&sponsor.affiliate_code));
    }

    // Sponsor now has 12 direct referrals.
    let stats = forest::stats(&conn, sponsor.id).expect("stats");
    assert_eq!(stats.direct_referrals, 12);
    assert_eq!(stats.team_size, 12);

    // Seller moves 600.00 of product across three orders.
    for (i, total) in [(1, 20_000), (2, 20_000), (3, 20_000)] {
        let b = breakdown(
            engine
                .process_sale(&mut conn, &sale(&format!("order_{i}"), seller.id, total))
                .expect("process sale"),
        );
        // Bronze: 5% direct, sponsor earns the 2% depth-1 cascade.
        assert_eq!(b.direct.amount, 1_000);
        assert_eq!(b.cascade.len(), 1);
        assert_eq!(b.cascade[0].affiliate_id, sponsor.id);
        assert_eq!(b.cascade[0].amount, 400);
    }

    // Seller: 3 x 1000 in earnings, still Bronze (needs referrals for
    // Silver). Sponsor: 3 x 400 plus 12 referrals, still short of the
    // 500.00 earnings minimum.
    let seller_row = affiliates::get(&conn, seller.id).expect("get").expect("row");
    assert_eq!(seller_row.lifetime_earnings, 3_000);
    assert_eq!(seller_row.tier_level, 1);

    let sponsor_row = affiliates::get(&conn, sponsor.id).expect("get").expect("row");
    assert_eq!(sponsor_row.lifetime_earnings, 1_200);
    assert_eq!(sponsor_row.tier_level, 1);

    // A big order pushes the sponsor past Silver's 500.00 minimum
    // during post-commit recompute of... the seller only. The sponsor
    // upgrades on their own next recompute.
    let b = breakdown(
        engine
            .process_sale(&mut conn, &sale("order_big", seller.id, 2_500_000))
            .expect("process sale"),
    );
    assert_eq!(b.cascade[0].amount, 50_000);

    registry::recompute_tier(&conn, sponsor.id, &NoopNotifier).expect("recompute");
    let sponsor_row = affiliates::get(&conn, sponsor.id).expect("get").expect("row");
    assert_eq!(sponsor_row.tier_level, 2, "51,200 cents and 12 referrals make Silver");

    // Next sale pays the sponsor at Silver's 3% depth-1 rate.
    let b = breakdown(
        engine
            .process_sale(&mut conn, &sale("order_after", seller.id, 10_000))
            .expect("process sale"),
    );
    assert_eq!(b.cascade[0].rate_bps, 300);
    assert_eq!(b.cascade[0].amount, 300);

    // Refund the big order: both pending commissions reverse, balances
    // drop, lifetime earnings stay.
    let sponsor_before = affiliates::get(&conn, sponsor.id).expect("get").expect("row");
    assert!(engine.handle_refund(&mut conn, "order_big").expect("refund"));
    let sponsor_after = affiliates::get(&conn, sponsor.id).expect("get").expect("row");
    assert_eq!(sponsor_after.current_balance, sponsor_before.current_balance - 50_000);
    assert_eq!(sponsor_after.lifetime_earnings, sponsor_before.lifetime_earnings);

    // Pay out one of the seller's remaining pending commissions.
    let seller_commissions =
        trellis_db::queries::commissions::for_affiliate(&conn, seller.id).expect("rows");
    let pending = seller_commissions
        .iter()
        .find(|c| c.status == "pending")
        .expect("a pending commission");
    assert!(trellis_commission::engine::mark_paid(&conn, pending.id).expect("pay"));

    let summary = trellis_commission::engine::summary(&conn, Some(seller.id)).expect("summary");
    assert_eq!(summary.paid_count, 1);
    assert!(summary.pending_count > 0);
}

#[test]
fn deep_chain_respects_configured_depth() {
    let mut conn = open_db();

    // Five-level chain; only three levels may earn.
    let mut code: Option<String> = None;
    let mut chain: Vec<AffiliateRow> = Vec::new();
    for name in ["n1", "n2", "n3", "n4", "n5"] {
        let affiliate = register(&mut conn, name, code.as_deref());
        code = Some(affiliate.affiliate_code.clone());
        chain.push(affiliate);
    }
    let seller = chain.last().expect("seller").id;

    let engine = CommissionEngine::new(CascadeConfig::default());
    let b = breakdown(
        engine
            .process_sale(&mut conn, &sale("order_deep", seller, 10_000))
            .expect("process sale"),
    );

    assert_eq!(b.cascade.len(), 3, "depth cap stops the walk");
    let earners: Vec<AffiliateId> = b.cascade.iter().map(|s| s.affiliate_id).collect();
    assert_eq!(earners, vec![chain[3].id, chain[2].id, chain[1].id]);

    let n1 = affiliates::get(&conn, chain[0].id).expect("get").expect("row");
    assert_eq!(n1.lifetime_earnings, 0, "beyond the cap nothing is earned");
}

#[test]
fn settings_backed_config_drives_engine() {
    let mut conn = open_db();

    // Operator turns the cascade off in settings.
    let stored = CascadeConfig {
        mlm_enabled: false,
        ..CascadeConfig::default()
    };
    stored.store(&conn).expect("store settings");

    let sponsor = register(&mut conn, "sponsor", None);
    let seller = register(&mut conn, "seller", Some(&sponsor.affiliate_code));

    let engine = CommissionEngine::new(CascadeConfig::load(&conn).expect("load settings"));
    let b = breakdown(
        engine
            .process_sale(&mut conn, &sale("order_1", seller.id, 10_000))
            .expect("process sale"),
    );
    assert!(b.cascade.is_empty());

    let sponsor_row = affiliates::get(&conn, sponsor.id).expect("get").expect("row");
    assert_eq!(sponsor_row.lifetime_earnings, 0);
}
