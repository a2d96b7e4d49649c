use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Path, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::WithRejection;
use chrono::Utc;
use uuid::Uuid;

use super::principal::Principal;
use super::rules::AuthorizationRule;
use super::Decision;
use crate::errors::{AppError, AppResult};

/// Fetches the resource a gate decides on.
///
/// The principal is passed so loaders can include caller-specific facts (such
/// as whether the caller already received the resource).
#[async_trait]
pub trait ResourceLoader: Send + Sync + 'static {
    type Resource: Clone + Send + Sync + 'static;

    async fn load(&self, id: Uuid, principal: &Principal) -> AppResult<Option<Self::Resource>>;
}

/// Resource that passed its gate, handed to the handler so it is not fetched twice.
#[derive(Debug, Clone)]
pub struct Authorized<R>(pub R);

pub struct ResourceGate<L, P> {
    loader: Arc<L>,
    rule: Arc<P>,
    resource_type: &'static str,
}

impl<L, P> Clone for ResourceGate<L, P> {
    fn clone(&self) -> Self {
        Self {
            loader: Arc::clone(&self.loader),
            rule: Arc::clone(&self.rule),
            resource_type: self.resource_type,
        }
    }
}

impl<L, P> ResourceGate<L, P>
where
    L: ResourceLoader,
    P: AuthorizationRule<L::Resource>,
{
    pub fn new(resource_type: &'static str, loader: L, rule: P) -> Self {
        Self {
            loader: Arc::new(loader),
            rule: Arc::new(rule),
            resource_type,
        }
    }

    pub async fn check(&self, principal: &Principal, id: Uuid) -> AppResult<L::Resource> {
        let resource = self
            .loader
            .load(id, principal)
            .await?
            .ok_or_else(|| AppError::not_found(format!("{} not found", self.resource_type)))?;

        match self.rule.evaluate(principal, &resource, Utc::now()) {
            Decision::Allow => Ok(resource),
            Decision::Deny(reason) => {
                tracing::info!(
                    user_id = %principal.user_id,
                    resource_type = self.resource_type,
                    resource_id = %id,
                    reason,
                    "access denied"
                );
                Err(AppError::forbidden(reason))
            }
        }
    }
}

/// Route-layer middleware running a [`ResourceGate`] against the `:id` path parameter.
///
/// Must be layered inside the login gate. Reaching it without a principal is a
/// wiring bug, not a client error, and panics.
pub async fn enforce<L, P>(
    State(gate): State<ResourceGate<L, P>>,
    WithRejection(Path(id), _): WithRejection<Path<Uuid>, AppError>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError>
where
    L: ResourceLoader,
    P: AuthorizationRule<L::Resource>,
{
    let principal = req
        .extensions()
        .get::<Principal>()
        .cloned()
        .unwrap_or_else(|| panic!("resource gate for {} ran before the login gate", gate.resource_type));

    let resource = gate.check(&principal, id).await?;
    req.extensions_mut().insert(Authorized(resource));

    Ok(next.run(req).await)
}
