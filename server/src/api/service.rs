use axum::{
    extract::{Query, State},
    Json,
};
use bson::oid::ObjectId;
use mongodb::options::FindOptions;
use serde::{Deserialize, Serialize};

use crate::{
    availability::available_services,
    error::Error,
    mongo_ext::Collection,
    util::{Amount, ObjectIdString},
};

use super::booking::BookingCollection;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServiceModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub name: String,
    #[serde(default)]
    pub price: Amount,
    pub slots: Vec<String>,
}

#[derive(Clone)]
pub struct ServiceCollection(pub Collection<ServiceModel>);

impl std::ops::Deref for ServiceCollection {
    type Target = Collection<ServiceModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Service {
    #[serde(rename = "_id")]
    pub id: ObjectIdString,
    pub name: String,
    pub price: Amount,
    pub slots: Vec<String>,
}

impl From<ServiceModel> for Service {
    fn from(value: ServiceModel) -> Self {
        Self {
            id: value.id.into(),
            name: value.name,
            price: value.price,
            slots: value.slots,
        }
    }
}

pub async fn index(State(services): State<ServiceCollection>) -> Result<Json<Vec<Service>>, Error> {
    let services = services.find_all(None).await?;

    Ok(Json(services.into_iter().map(Into::into).collect()))
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AvailableQuery {
    pub date: Option<String>,
}

#[tracing::instrument(skip_all, fields(date = ?query.date))]
pub async fn available(
    State(services): State<ServiceCollection>,
    State(bookings): State<BookingCollection>,
    Query(query): Query<AvailableQuery>,
) -> Result<Json<Vec<Service>>, Error> {
    let services = services.find_all(None).await?;

    // Without a date nothing can be booked against it.
    let bookings = match query.date {
        Some(date) => bookings.find_all(bson::doc! { "date": date }).await?,
        None => vec![],
    };

    tracing::debug!(
        "{} bookings against {} services",
        bookings.len(),
        services.len()
    );

    let available = available_services(services, &bookings);

    Ok(Json(available.into_iter().map(Into::into).collect()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServiceNameModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServiceName {
    #[serde(rename = "_id")]
    pub id: ObjectIdString,
    pub name: String,
}

impl From<ServiceNameModel> for ServiceName {
    fn from(value: ServiceNameModel) -> Self {
        Self {
            id: value.id.into(),
            name: value.name,
        }
    }
}

pub async fn appointments(
    State(services): State<ServiceCollection>,
) -> Result<Json<Vec<ServiceName>>, Error> {
    let mut cursor = services
        .clone_with_type::<ServiceNameModel>()
        .find(
            None,
            FindOptions::builder()
                .projection(bson::doc! { "name": 1 })
                .build(),
        )
        .await?;

    let mut names = vec![];

    while cursor.advance().await? {
        let name: ServiceNameModel = cursor.deserialize_current()?;

        names.push(name.into());
    }

    Ok(Json(names))
}
