use chrono::{DateTime, Utc};

use super::principal::Principal;
use super::{Decision, Owned, Receivable};

/// Decision rule applied to a loaded resource.
pub trait AuthorizationRule<R>: Send + Sync + 'static {
    fn evaluate(&self, principal: &Principal, resource: &R, now: DateTime<Utc>) -> Decision;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CreatorOnly;

impl<R: Owned> AuthorizationRule<R> for CreatorOnly {
    fn evaluate(&self, principal: &Principal, resource: &R, _now: DateTime<Utc>) -> Decision {
        if principal.is(resource.creator_id()) {
            Decision::Allow
        } else {
            Decision::Deny("only the creator may modify this resource")
        }
    }
}

/// Checks run in order; the first failing one names the denial.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiveEligible;

impl<R: Receivable> AuthorizationRule<R> for ReceiveEligible {
    fn evaluate(&self, principal: &Principal, resource: &R, now: DateTime<Utc>) -> Decision {
        let (start, end) = resource.window();

        if principal.is(resource.creator_id()) {
            Decision::Deny("creators cannot receive their own project")
        } else if now < start {
            Decision::Deny("project has not started")
        } else if now >= end {
            Decision::Deny("project has ended")
        } else if principal.trust_level < resource.minimum_trust_level() {
            Decision::Deny("trust level too low")
        } else if resource.already_received() {
            Decision::Deny("already received")
        } else if resource.remaining() <= 0 {
            Decision::Deny("no items remaining")
        } else {
            Decision::Allow
        }
    }
}
