//! Minimal client for the Stripe payment-intents endpoint.

use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};

use crate::{config::Config, error::Error};

pub const CURRENCY: &str = "usd";

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Deserialize, Debug)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize, Debug)]
struct StripeErrorDetail {
    message: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.into(),
            api_base: api_base.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.stripe_secret_key, &config.stripe_api_base)
    }

    /// `amount` is in the currency's minor unit (cents for USD).
    #[tracing::instrument(skip(self))]
    pub async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
    ) -> Result<PaymentIntent, Error> {
        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&[
                ("amount", amount.to_string()),
                ("currency", currency.to_string()),
                ("payment_method_types[]", "card".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|it| it.error.message)
                .unwrap_or_else(|| status.to_string());

            return Err(Error::PaymentRejected(message));
        }

        let intent: PaymentIntent = response.json().await?;
        tracing::debug!("created payment intent {}", intent.id);

        Ok(intent)
    }
}

/// Converts a price in major units to whole minor units, rounding half away
/// from zero. Only positive amounts can be charged.
pub fn minor_units(price: Decimal) -> Result<i64, Error> {
    if price <= Decimal::ZERO {
        return Err(Error::InvalidAmount);
    }

    price
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|it| it.round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero))
        .and_then(|it| it.to_i64())
        .filter(|it| *it > 0)
        .ok_or(Error::InvalidAmount)
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, net::TcpListener};

    use assert_matches::assert_matches;
    use axum::{
        headers::{authorization::Bearer, Authorization},
        http::StatusCode,
        routing, Form, Json, Router, TypedHeader,
    };

    use super::*;

    async fn fake_payment_intents(
        TypedHeader(Authorization(bearer)): TypedHeader<Authorization<Bearer>>,
        Form(form): Form<HashMap<String, String>>,
    ) -> (StatusCode, Json<serde_json::Value>) {
        if bearer.token() != "sk_test_valid" {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": {
                        "message": "Invalid API Key provided",
                        "type": "invalid_request_error",
                    }
                })),
            );
        }

        let amount: i64 = form["amount"].parse().unwrap_or_default();

        (
            StatusCode::OK,
            Json(serde_json::json!({
                "id": "pi_123",
                "object": "payment_intent",
                "client_secret": "pi_123_secret_456",
                "amount": amount,
                "currency": form["currency"],
                "payment_method_types": [form["payment_method_types[]"]],
            })),
        )
    }

    fn spawn_fake_stripe() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/v1/payment_intents", routing::post(fake_payment_intents));

        tokio::spawn(async move {
            axum::Server::from_tcp(listener)
                .unwrap()
                .serve(app.into_make_service())
                .await
                .unwrap();
        });

        format!("http://{}", addr)
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(minor_units(Decimal::from(25)).unwrap(), 2500);
        assert_eq!(minor_units(Decimal::new(1999, 2)).unwrap(), 1999);
        assert_eq!(minor_units(Decimal::new(10005, 3)).unwrap(), 1001);
        assert_matches!(minor_units(Decimal::ZERO), Err(Error::InvalidAmount));
        assert_matches!(minor_units(Decimal::from(-5)), Err(Error::InvalidAmount));
        assert_matches!(minor_units(Decimal::new(1, 3)), Err(Error::InvalidAmount));
    }

    #[tokio::test]
    async fn test_create_payment_intent() {
        let client = StripeClient::new("sk_test_valid", spawn_fake_stripe());

        let intent = client.create_payment_intent(2500, CURRENCY).await.unwrap();

        assert_eq!(
            intent,
            PaymentIntent {
                id: "pi_123".to_string(),
                client_secret: "pi_123_secret_456".to_string(),
                amount: 2500,
                currency: "usd".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_rejected_key() {
        let client = StripeClient::new("sk_test_revoked", spawn_fake_stripe());

        let err = client
            .create_payment_intent(2500, CURRENCY)
            .await
            .expect_err("key is rejected");

        assert_matches!(err, Error::PaymentRejected(message) if message == "Invalid API Key provided");
    }

    #[tokio::test]
    async fn test_unreachable_processor() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = StripeClient::new("sk_test_valid", format!("http://{}", addr));

        let err = client
            .create_payment_intent(2500, CURRENCY)
            .await
            .expect_err("nothing is listening");

        assert_matches!(err, Error::PaymentProcessorError(_));
    }
}
