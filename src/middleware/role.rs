use std::marker::PhantomData;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{Account, Role};

/// Set of roles allowed through an [`Authorized`] extractor.
pub trait RolePolicy: Send + Sync + 'static {
    const ALLOWED: &'static [Role];
}

pub struct AdminOnly;

impl RolePolicy for AdminOnly {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

pub struct SiteEngineerOnly;

impl RolePolicy for SiteEngineerOnly {
    const ALLOWED: &'static [Role] = &[Role::SiteEngineer];
}

pub struct PayingAuthorityOnly;

impl RolePolicy for PayingAuthorityOnly {
    const ALLOWED: &'static [Role] = &[Role::PayingAuthority];
}

/// Second-stage access check: the authenticated account must hold one of `P::ALLOWED`.
///
/// Runs from request parts, so a wrong role is refused before any body is read.
pub struct Authorized<P: RolePolicy> {
    pub account: Account,
    _policy: PhantomData<P>,
}

pub fn authorize(account: &Account, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&account.role) {
        Ok(())
    } else {
        tracing::warn!(
            "Access denied: {} ({}) is not one of {:?}",
            account.username,
            account.role,
            allowed
        );
        Err(ApiError::forbidden("Access denied"))
    }
}

#[async_trait]
impl<S, P> FromRequestParts<S> for Authorized<P>
where
    S: Send + Sync,
    P: RolePolicy,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(account) = AuthUser::from_request_parts(parts, state).await?;
        authorize(&account, P::ALLOWED)?;
        Ok(Self {
            account,
            _policy: PhantomData,
        })
    }
}
