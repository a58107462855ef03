use axum::{
    http::{StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0} not found")]
    NotFound(Uri),

    #[error("No resource found")]
    NoResource,

    #[error("{0}")]
    DatabaseError(#[from] mongodb::error::Error),

    #[error("{0}")]
    JWTError(#[from] jsonwebtoken::errors::Error),

    #[error("{0} must unique")]
    MustUniqueError(String),

    #[error("Unauthorized access")]
    Unauthenticated,

    #[error("Invalid access token")]
    InvalidCredential,

    #[error("You have no permission to access this resource")]
    Forbidden,

    #[error("No user registered with this email")]
    UnknownPrincipal,

    #[error("slot {slot:?} is not offered by {treatment:?}")]
    UnknownSlot { treatment: String, slot: String },

    #[error("amount must be a positive number of cents")]
    InvalidAmount,

    #[error("payment processor unreachable: {0}")]
    PaymentProcessorError(#[from] reqwest::Error),

    #[error("payment processor rejected the request: {0}")]
    PaymentRejected(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<serde_json::Value>,
    r#type: String,
    message: String,
}

impl From<Error> for ErrorJson {
    fn from(err: Error) -> Self {
        let message = err.to_string();

        let r#type = err.to_string_variant();

        let errors = match err {
            Error::ValidationError(err) => serde_json::to_value(err).ok(),
            Error::UnknownSlot { treatment, slot } => Some(serde_json::json!({
                "treatment": treatment,
                "slot": slot,
            })),
            Error::NotFound(..)
            | Error::NoResource
            | Error::DatabaseError(..)
            | Error::JWTError(..)
            | Error::MustUniqueError(..)
            | Error::Unauthenticated
            | Error::InvalidCredential
            | Error::Forbidden
            | Error::UnknownPrincipal
            | Error::InvalidAmount
            | Error::PaymentProcessorError(..)
            | Error::PaymentRejected(..) => None,
        };

        Self {
            errors,
            message,
            r#type,
        }
    }
}

/// Body returned alongside [`Error::UnknownPrincipal`]: clients read an empty
/// token rather than an error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct EmptyAccessToken {
    #[serde(rename = "accessToken")]
    pub access_token: String,
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::InvalidCredential | Self::Forbidden | Self::UnknownPrincipal => {
                StatusCode::FORBIDDEN
            }
            Self::ValidationError(..)
            | Self::MustUniqueError(..)
            | Self::UnknownSlot { .. }
            | Self::InvalidAmount => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotFound(..) | Self::NoResource => StatusCode::NOT_FOUND,
            Self::PaymentProcessorError(..) | Self::PaymentRejected(..) => StatusCode::BAD_GATEWAY,
            Self::DatabaseError(..) | Self::JWTError(..) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();

        match status {
            StatusCode::INTERNAL_SERVER_ERROR | StatusCode::BAD_GATEWAY => {
                tracing::error!("error: {:?}", self)
            }
            _ => tracing::debug!("rejected: {:?}", self),
        }

        if let Self::UnknownPrincipal = self {
            let body = EmptyAccessToken {
                access_token: String::new(),
            };
            return (status, Json(body)).into_response();
        }

        let error = ErrorJson::from(self);

        (status, Json(error)).into_response()
    }
}

impl Error {
    pub fn to_string_variant(&self) -> String {
        macro_rules! match_var {
            ($id:ident !) => {
                Self::$id
            };
            ($id:ident (..)) => {
                Self::$id(..)
            };
            ($id:ident {..}) => {
                Self::$id { .. }
            };
        }

        macro_rules! variant {
            ($($name:ident $tt:tt),+) => {
                match self {
                    $(
                        match_var!($name $tt) => {
                            stringify!($name)
                       }
                    )+
                }
            };
        }

        variant! {
            NotFound(..),
            NoResource!,
            Unauthenticated!,
            InvalidCredential!,
            Forbidden!,
            UnknownPrincipal!,
            InvalidAmount!,
            ValidationError(..),
            DatabaseError(..),
            JWTError(..),
            MustUniqueError(..),
            UnknownSlot{..},
            PaymentProcessorError(..),
            PaymentRejected(..)
        }
        .to_string()
    }
}

impl From<axum::extract::rejection::PathRejection> for Error {
    fn from(_value: axum::extract::rejection::PathRejection) -> Self {
        Self::NoResource
    }
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;

    use super::*;

    async fn body_json(error: Error) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();

        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_missing_and_invalid_credentials_are_distinct() {
        assert_eq!(Error::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(Error::InvalidCredential.status_code(), StatusCode::FORBIDDEN);
        assert_ne!(
            Error::Unauthenticated.to_string_variant(),
            Error::InvalidCredential.to_string_variant()
        );
    }

    #[tokio::test]
    async fn test_forbidden_body() {
        let (status, body) = body_json(Error::Forbidden).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["type"], "Forbidden");
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn test_unknown_principal_returns_empty_token() {
        let (status, body) = body_json(Error::UnknownPrincipal).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, serde_json::json!({ "accessToken": "" }));
    }

    #[tokio::test]
    async fn test_unknown_slot_details() {
        let (status, body) = body_json(Error::UnknownSlot {
            treatment: "Cleaning".to_string(),
            slot: "3am".to_string(),
        })
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["type"], "UnknownSlot");
        assert_eq!(body["errors"]["slot"], "3am");
    }
}
