//! Request guards.
//!
//! [`Principal`] verifies the bearer credential, [`AdminAccess`] additionally
//! requires the stored user behind it to carry the admin role. Both are
//! extractors, so a rejected request never reaches the handler body.

use axum::{
    extract::{rejection::TypedHeaderRejectionReason, FromRef, FromRequestParts},
    headers::{authorization::Bearer, Authorization},
    http::{header::AUTHORIZATION, request::Parts},
    RequestPartsExt, TypedHeader,
};
use tap::TapFallible;

use crate::error::Error;

use super::{
    token::{decode_access_token, JwtState},
    user::{UserCollection, UserModel},
};

/// Identity proven by a valid, unexpired access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub email: String,
}

impl Principal {
    pub fn from_token(jwt_state: &JwtState, token: &str) -> Result<Self, Error> {
        let token = decode_access_token(jwt_state, token)
            .map_err(|_| Error::InvalidCredential)
            .tap_err(|_| tracing::debug!("rejected access token"))?;

        Ok(Self {
            email: token.claims.email,
        })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Principal
where
    JwtState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // A blank header counts as no header at all.
        let blank = parts
            .headers
            .get(AUTHORIZATION)
            .map_or(true, |value| value.as_bytes().iter().all(u8::is_ascii_whitespace));
        if blank {
            return Err(Error::Unauthenticated);
        }

        let TypedHeader(Authorization(token)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|rejection| match rejection.reason() {
                TypedHeaderRejectionReason::Missing => Error::Unauthenticated,
                _ => Error::InvalidCredential,
            })?;

        let jwt = JwtState::from_ref(state);

        Self::from_token(&jwt, token.token())
    }
}

/// A [`Principal`] whose stored user record is an admin.
#[derive(Debug)]
pub struct AdminAccess {
    pub principal: Principal,
    pub user: UserModel,
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AdminAccess
where
    JwtState: FromRef<S>,
    UserCollection: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = parts.extract_with_state::<Principal, _>(state).await?;

        let users = UserCollection::from_ref(state);
        let user = users.find_by_email(&principal.email).await?;

        let user = require_admin(user)
            .tap_err(|_| tracing::debug!("{} tried an admin operation", principal.email))?;

        Ok(Self { principal, user })
    }
}

/// Passes only an existing user holding the admin role.
pub fn require_admin(user: Option<UserModel>) -> Result<UserModel, Error> {
    user.filter(UserModel::is_admin).ok_or(Error::Forbidden)
}

/// Patients may only read data filed under their own email. The comparison
/// is exact; a missing email never matches.
pub fn ensure_self_access<'a>(principal: &Principal, email: Option<&'a str>) -> Result<&'a str, Error> {
    match email {
        Some(email) if email == principal.email => Ok(email),
        _ => Err(Error::Forbidden)
            .tap_err(|_| tracing::debug!("{} tried reading another patient", principal.email)),
    }
}
