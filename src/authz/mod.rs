//! Authorization gates for resource routes.
//!
//! A gate is a (resource loader, decision rule) pair evaluated against the
//! [`Principal`] placed in the request by the login gate:
//! - [`CreatorOnly`] - only the creator may mutate or delete
//! - [`ReceiveEligible`] - a non-creator may claim while the resource is receivable
//!
//! New resource types plug in by implementing [`ResourceLoader`] and the
//! ownership traits; the gate-then-handler wiring stays the same.

mod gate;
mod principal;
mod rules;

pub use gate::{enforce, Authorized, ResourceGate, ResourceLoader};
pub use principal::Principal;
pub use rules::{AuthorizationRule, CreatorOnly, ReceiveEligible};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Outcome of evaluating a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(&'static str),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Resources with a single creating user.
pub trait Owned {
    fn creator_id(&self) -> Uuid;
}

/// Resources that other users may claim a share of.
pub trait Receivable: Owned {
    /// Claim window, start inclusive and end exclusive.
    fn window(&self) -> (DateTime<Utc>, DateTime<Utc>);

    fn minimum_trust_level(&self) -> i64;

    fn remaining(&self) -> i64;

    /// Whether the principal the resource was loaded for already claimed it.
    fn already_received(&self) -> bool;
}
