//! Collaborator seams.
//!
//! Gamification and notification delivery live outside this crate; the
//! engine talks to them through these traits. Calls are fire-and-forget:
//! they return nothing, are invoked only after the surrounding state
//! change has committed, and a misbehaving implementation cannot abort a
//! committed sale.

use trellis_types::{AffiliateId, AffiliateStatus, Cents, RateBps, TierLevel};

/// Events delivered to the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyEvent {
    /// Affiliate account created.
    Welcome {
        status: AffiliateStatus,
        code: String,
    },
    /// Status changed by an operator.
    StatusChanged { status: AffiliateStatus },
    /// Tier upgraded after a recompute.
    TierUpgraded {
        tier_level: TierLevel,
        tier_name: String,
    },
    /// Direct sale commission created.
    CommissionEarned { order_ref: String, amount: Cents },
    /// Cascade commission created for an ancestor.
    CascadeCommissionEarned {
        order_ref: String,
        depth: u32,
        amount: Cents,
        from_affiliate: AffiliateId,
    },
    /// Commission reversed after an order refund.
    CommissionRefunded { order_ref: String, amount: Cents },
}

/// Notification dispatcher seam.
pub trait Notifier {
    /// Deliver one event for one affiliate. Failures are swallowed by
    /// the implementation; the caller never observes them.
    fn notify(&self, affiliate_id: AffiliateId, event: NotifyEvent);
}

impl<T: Notifier> Notifier for &T {
    fn notify(&self, affiliate_id: AffiliateId, event: NotifyEvent) {
        (*self).notify(affiliate_id, event);
    }
}

/// Notifier that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _affiliate_id: AffiliateId, _event: NotifyEvent) {}
}

/// Gamification / badge engine seam.
pub trait BadgeEngine {
    /// Extra commission rate earned through badges, added on top of the
    /// tier's base rate for direct sales.
    fn commission_bonus_bps(&self, _affiliate_id: AffiliateId) -> RateBps {
        0
    }

    /// Re-evaluate badge thresholds after commissions were created.
    fn check_badges(&self, _affiliate_id: AffiliateId) {}
}

/// Badge engine that awards nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBadges;

impl BadgeEngine for NoopBadges {}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Notifier that records every delivery, for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub events: Mutex<Vec<(AffiliateId, NotifyEvent)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, affiliate_id: AffiliateId, event: NotifyEvent) {
            if let Ok(mut events) = self.events.lock() {
                events.push((affiliate_id, event));
            }
        }
    }

    impl RecordingNotifier {
        pub fn recorded(&self) -> Vec<(AffiliateId, NotifyEvent)> {
            self.events.lock().map(|e| e.clone()).unwrap_or_default()
        }
    }
}
