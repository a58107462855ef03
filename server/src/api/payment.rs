use axum::{extract::State, Json};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use validator::Validate;

use crate::{
    error::Error,
    mongo_ext::Collection,
    stripe::{minor_units, StripeClient, CURRENCY},
    util::{Amount, FormattedDateTime, ObjectIdString},
};

use super::booking::{Booking, BookingCollection};

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PaymentModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub booking: ObjectId,
    pub amount: Amount,
    pub transaction_id: String,

    pub created_at: bson::DateTime,
}

#[derive(Clone)]
pub struct PaymentCollection(pub Collection<PaymentModel>);

impl std::ops::Deref for PaymentCollection {
    type Target = Collection<PaymentModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    #[serde(rename = "_id")]
    pub id: ObjectIdString,
    pub booking: ObjectIdString,
    pub amount: Amount,
    pub transaction_id: String,
    pub created_at: FormattedDateTime,
}

impl From<PaymentModel> for Payment {
    fn from(value: PaymentModel) -> Self {
        Self {
            id: value.id.into(),
            booking: value.booking.into(),
            amount: value.amount,
            transaction_id: value.transaction_id,
            created_at: value.created_at.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IntentRequest {
    pub price: Amount,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IntentResponse {
    pub client_secret: String,
}

#[tracing::instrument(skip_all, fields(price = ?request.price.0))]
pub async fn create_intent(
    State(stripe): State<StripeClient>,
    Json(request): Json<IntentRequest>,
) -> Result<Json<IntentResponse>, Error> {
    let amount = minor_units(request.price.0)
        .tap_err(|_| tracing::debug!("tried charging a non positive price"))?;

    let intent = stripe.create_payment_intent(amount, CURRENCY).await?;

    Ok(Json(IntentResponse {
        client_secret: intent.client_secret,
    }))
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub booking: ObjectIdString,

    #[validate(length(min = 1))]
    pub transaction_id: String,

    pub amount: Amount,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateResponse {
    pub payment: Payment,
    pub booking: Booking,
}

/// Stores a payment the client completed with the processor and marks the
/// referenced booking as paid.
#[tracing::instrument(skip_all, fields(booking = %request.booking))]
pub async fn create(
    State(payments): State<PaymentCollection>,
    State(bookings): State<BookingCollection>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<CreateResponse>, Error> {
    request.validate()?;

    bookings
        .find_one_by_id(request.booking.0)
        .await?
        .ok_or(Error::NoResource)
        .tap_err(|_| tracing::debug!("tried paying for a non existing booking"))?;

    let model = PaymentModel {
        id: ObjectId::new(),
        booking: request.booking.0,
        amount: request.amount,
        transaction_id: request.transaction_id,
        created_at: bson::DateTime::now(),
    };

    payments.insert_one(&model, None).await?;

    let booking = bookings
        .mark_paid(model.booking, &model.transaction_id)
        .await?
        .ok_or(Error::NoResource)?;

    Ok(Json(CreateResponse {
        payment: model.into(),
        booking: booking.into(),
    }))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::{extract::State, Json};
    use rust_decimal::Decimal;

    use crate::{api::tests::bootstrap, error::Error};

    use super::*;

    #[test]
    fn test_create_request_wire_format() {
        let id = ObjectId::new();
        let request: CreateRequest = serde_json::from_value(serde_json::json!({
            "booking": id.to_hex(),
            "transactionId": "pi_123",
            "amount": 25,
        }))
        .unwrap();

        assert_eq!(request.booking, id);
        assert_eq!(request.amount.0, Decimal::from(25));
    }

    #[tokio::test]
    async fn test_zero_price_is_rejected_before_calling_processor() {
        let stripe = StripeClient::new("sk_test", "http://127.0.0.1:9");

        let err = create_intent(
            State(stripe),
            Json(IntentRequest {
                price: Decimal::ZERO.into(),
            }),
        )
        .await
        .expect_err("nothing to charge");

        assert_matches!(err, Error::InvalidAmount);
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB at MONGODB_URI"]
    async fn test_payment_marks_booking_paid() {
        let bootstrap = bootstrap().await;
        let booking = bootstrap
            .create_booking("Cleaning", "2024-01-01", "9am", "a@example.com")
            .await;

        let Json(response) = create(
            State(bootstrap.app_state.payment_collection.clone()),
            State(bootstrap.app_state.booking_collection.clone()),
            Json(CreateRequest {
                booking: booking.id.into(),
                transaction_id: "pi_123".to_string(),
                amount: Decimal::from(50).into(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.payment.booking, booking.id);
        assert_eq!(response.booking.paid, Some(true));
        assert_eq!(response.booking.transaction_id.as_deref(), Some("pi_123"));
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB at MONGODB_URI"]
    async fn test_payment_for_unknown_booking() {
        let bootstrap = bootstrap().await;

        let err = create(
            State(bootstrap.app_state.payment_collection.clone()),
            State(bootstrap.app_state.booking_collection.clone()),
            Json(CreateRequest {
                booking: ObjectId::new().into(),
                transaction_id: "pi_123".to_string(),
                amount: Decimal::from(50).into(),
            }),
        )
        .await
        .expect_err("booking does not exist");

        assert_matches!(err, Error::NoResource);

        let count = bootstrap
            .app_state
            .payment_collection
            .count_documents(None, None)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
