use axum::{
    extract::{Query, State},
    Json,
};
use jsonwebtoken::TokenData;
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use time::{Duration, OffsetDateTime};

use crate::{config::Config, error::Error};

use super::user::UserCollection;

#[derive(Clone)]
pub struct JwtState {
    validation: jsonwebtoken::Validation,
    header: jsonwebtoken::Header,

    encoding_key: jsonwebtoken::EncodingKey,
    decoding_key: jsonwebtoken::DecodingKey,

    ttl: Duration,
}

impl JwtState {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let encoding_key = jsonwebtoken::EncodingKey::from_secret(secret.as_bytes());
        let decoding_key = jsonwebtoken::DecodingKey::from_secret(secret.as_bytes());

        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256);
        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.leeway = 0;

        Self {
            header,
            validation,

            encoding_key,
            decoding_key,

            ttl,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.access_token_secret, config.access_token_ttl)
    }
}

pub fn current_timestamp() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenClaims {
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs a credential for `email` that expires after the configured lifetime.
/// Every issuing route goes through here so the expiry is uniform.
pub fn generate_access_token(jwt_state: &JwtState, email: &str) -> Result<String, Error> {
    let expired_at = current_timestamp() + jwt_state.ttl;

    generate_access_token_with_exp(jwt_state, email, expired_at)
}

pub fn generate_access_token_with_exp(
    jwt_state: &JwtState,
    email: &str,
    expired_at: OffsetDateTime,
) -> Result<String, Error> {
    jsonwebtoken::encode(
        &jwt_state.header,
        &AccessTokenClaims {
            email: email.to_string(),
            iat: current_timestamp().unix_timestamp(),
            exp: expired_at.unix_timestamp(),
        },
        &jwt_state.encoding_key,
    )
    .map_err(Into::into)
}

/// Verifies signature and expiry.
pub fn decode_access_token(
    jwt_state: &JwtState,
    token: &str,
) -> Result<TokenData<AccessTokenClaims>, Error> {
    jsonwebtoken::decode(token, &jwt_state.decoding_key, &jwt_state.validation).map_err(Into::into)
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct IssueQuery {
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccessTokenResponse {
    #[serde(rename = "accessToken")]
    pub access_token: String,
}

#[tracing::instrument(skip_all, fields(email = ?query.email))]
pub async fn issue(
    State(users): State<UserCollection>,
    State(jwt_state): State<JwtState>,
    Query(query): Query<IssueQuery>,
) -> Result<Json<AccessTokenResponse>, Error> {
    let email = query.email.ok_or(Error::UnknownPrincipal)?;

    let user = users
        .find_by_email(&email)
        .await?
        .ok_or(Error::UnknownPrincipal)
        .tap_err(|_| tracing::debug!("token requested for unregistered email"))?;

    let access_token = generate_access_token(&jwt_state, &user.email)?;

    Ok(Json(AccessTokenResponse { access_token }))
}
