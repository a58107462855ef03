use axum::{
    extract::{Query, State},
    Json,
};
use bson::oid::ObjectId;
use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    error::Error,
    mongo_ext::{is_duplicate_key, Collection},
    util::{Amount, ObjectIdString},
};

use super::{
    auth::{ensure_self_access, Principal},
    service::ServiceCollection,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    /// Name of the booked service. Bookings follow services by name only.
    pub treatment: String,
    pub date: String,
    pub slot: String,
    pub patient_email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

#[derive(Clone)]
pub struct BookingCollection(pub Collection<BookingModel>);

impl std::ops::Deref for BookingCollection {
    type Target = Collection<BookingModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl BookingCollection {
    pub async fn find_by_identity(
        &self,
        treatment: &str,
        date: &str,
        patient_email: &str,
    ) -> Result<Option<BookingModel>, Error> {
        self.find_one(
            bson::doc! {
                "treatment": treatment,
                "date": date,
                "patientEmail": patient_email,
            },
            None,
        )
        .await
        .map_err(Into::into)
    }

    /// Flags the booking as paid and returns it as stored afterwards.
    pub async fn mark_paid(
        &self,
        id: ObjectId,
        transaction_id: &str,
    ) -> Result<Option<BookingModel>, Error> {
        self.find_one_and_update(
            bson::doc! { "_id": id },
            bson::doc! {
                "$set": {
                    "paid": true,
                    "transactionId": transaction_id,
                }
            },
            FindOneAndUpdateOptions::builder()
                .return_document(ReturnDocument::After)
                .build(),
        )
        .await
        .map_err(Into::into)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(rename = "_id")]
    pub id: ObjectIdString,
    pub treatment: String,
    pub date: String,
    pub slot: String,
    pub patient_email: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

impl From<BookingModel> for Booking {
    fn from(value: BookingModel) -> Self {
        Self {
            id: value.id.into(),
            treatment: value.treatment,
            date: value.date,
            slot: value.slot,
            patient_email: value.patient_email,
            patient_name: value.patient_name,
            phone: value.phone,
            price: value.price,
            paid: value.paid,
            transaction_id: value.transaction_id,
        }
    }
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    #[validate(length(min = 1))]
    pub treatment: String,

    #[validate(length(min = 1))]
    pub date: String,

    #[validate(length(min = 1))]
    pub slot: String,

    #[validate(email)]
    pub patient_email: String,

    pub patient_name: Option<String>,
    pub phone: Option<String>,
    pub price: Option<Amount>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CreateResponse {
    pub success: bool,
    pub booking: Booking,
}

/// Inserts the booking unless the patient already holds one for the same
/// treatment and date, in which case the stored booking is returned.
///
/// The unique index on (treatment, date, patientEmail) decides; a duplicate
/// key error is the "already booked" signal.
#[tracing::instrument(
    skip_all,
    fields(
        treatment = %request.treatment,
        date = %request.date,
    )
)]
pub async fn create(
    State(bookings): State<BookingCollection>,
    State(services): State<ServiceCollection>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<CreateResponse>, Error> {
    request.validate()?;

    let service = services
        .find_one(bson::doc! { "name": &request.treatment }, None)
        .await?;

    if !service.map_or(false, |it| it.slots.contains(&request.slot)) {
        // A patient holding this treatment and date gets the stored booking
        // back even when the slot has since disappeared from the service.
        if let Some(existing) = bookings
            .find_by_identity(&request.treatment, &request.date, &request.patient_email)
            .await?
        {
            tracing::debug!("patient already holds booking {}", existing.id);

            return Ok(Json(CreateResponse {
                success: false,
                booking: existing.into(),
            }));
        }

        tracing::debug!("tried booking a slot the service does not offer");
        return Err(Error::UnknownSlot {
            treatment: request.treatment,
            slot: request.slot,
        });
    }

    let model = BookingModel {
        id: ObjectId::new(),
        treatment: request.treatment,
        date: request.date,
        slot: request.slot,
        patient_email: request.patient_email,
        patient_name: request.patient_name,
        phone: request.phone,
        price: request.price,
        paid: None,
        transaction_id: None,
    };

    match bookings.insert_one(&model, None).await {
        Ok(_) => {
            tracing::debug!("created booking {}", model.id);

            Ok(Json(CreateResponse {
                success: true,
                booking: model.into(),
            }))
        }
        Err(err) if is_duplicate_key(&err) => {
            let existing = bookings
                .find_by_identity(&model.treatment, &model.date, &model.patient_email)
                .await?
                .ok_or(Error::DatabaseError(err))?;

            tracing::debug!("patient already holds booking {}", existing.id);

            Ok(Json(CreateResponse {
                success: false,
                booking: existing.into(),
            }))
        }
        Err(err) => Err(err.into()),
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct IndexQuery {
    pub email: Option<String>,
}

pub async fn index(
    principal: Principal,
    State(bookings): State<BookingCollection>,
    Query(query): Query<IndexQuery>,
) -> Result<Json<Vec<Booking>>, Error> {
    let email = ensure_self_access(&principal, query.email.as_deref())?;

    let bookings = bookings
        .find_all(bson::doc! { "patientEmail": email })
        .await?;

    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}
