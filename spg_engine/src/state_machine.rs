//! The order payment state machine.
//!
//! States: `pending → processing → {completed | failed}`, plus `pending → failed` (the user can cancel before any
//! processing ack), and `completed → {refunded | partially_refunded}` for explicitly authorised refunds.
//!
//! Rejected transitions are **no-ops, not errors**: callbacks, polls and webhooks are delivered at-least-once and
//! out of order, so every caller must be safe to retry. The one bias is toward never un-paying a paid order; once a
//! write lands on `completed`, nothing short of an explicit refund can touch the status again.

use chrono::{DateTime, Utc};
use log::debug;

use crate::db_types::{Payment, PaymentStatus, StatusUpdate};

/// The outcome of proposing a transition against the current payment record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// The transition is legal. The contained record is the full new payment state to persist.
    Apply(AppliedUpdate),
    /// The transition is ignored. Callers treat this as success (idempotent retry semantics).
    Noop(NoopReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedUpdate {
    pub status: PaymentStatus,
    /// The transaction id to persist. A previously recorded id is preserved when the event carries none.
    pub transaction_id: Option<String>,
    /// Set on the transition into `completed`, exactly once, and never cleared afterwards.
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoopReason {
    /// The proposed status equals the current status.
    SameStatus,
    /// The order is `completed` and the proposal is not a refund.
    CompletedIsTerminal,
    /// Refund statuses are only reachable from `completed`.
    RefundRequiresCompleted,
}

/// Decide whether `update` may be applied on top of `current`. Pure; the database layer performs the
/// corresponding conditional write.
///
/// A write is accepted iff the target status differs from the current one and the current status is not
/// `completed`. Refunds invert the second clause: they are accepted only *from* `completed`. Note that `failed` is
/// not absorbing: a successful retry after a transient failure may still complete the order. Only `completed`
/// blocks further writes.
pub fn propose(current: &Payment, update: &StatusUpdate, now: DateTime<Utc>) -> Transition {
    let from = current.status;
    let to = update.status;

    if from == to {
        return Transition::Noop(NoopReason::SameStatus);
    }
    if to.is_refund() {
        return if from == PaymentStatus::Completed {
            Transition::Apply(applied(current, update, now))
        } else {
            Transition::Noop(NoopReason::RefundRequiresCompleted)
        };
    }
    if from == PaymentStatus::Completed {
        debug!("⚖️ Payment is completed; ignoring proposed downgrade to {to}");
        return Transition::Noop(NoopReason::CompletedIsTerminal);
    }
    Transition::Apply(applied(current, update, now))
}

fn applied(current: &Payment, update: &StatusUpdate, now: DateTime<Utc>) -> AppliedUpdate {
    let transaction_id = update.transaction_id.clone().or_else(|| current.transaction_id.clone());
    let paid_at = match update.status {
        // Stamp on completion: gateway settlement time if supplied, reconciliation time otherwise.
        PaymentStatus::Completed => Some(current.paid_at.unwrap_or_else(|| update.paid_at.unwrap_or(now))),
        // Refunds keep the original settlement stamp.
        s if s.is_refund() => current.paid_at,
        _ => current.paid_at,
    };
    AppliedUpdate { status: update.status, transaction_id, paid_at }
}
