pub mod auth;
pub mod booking;
pub mod doctor;
pub mod payment;
pub mod service;
pub mod token;
pub mod user;

use axum::{http::Uri, routing, Router};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{app::AppState, error::Error};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", routing::get(root))
        .route("/services", routing::get(service::index))
        .route("/available", routing::get(service::available))
        .route("/appointments", routing::get(service::appointments))
        .route("/booking", routing::post(booking::create))
        .route("/bookings", routing::get(booking::index))
        .route("/jwt", routing::get(token::issue))
        .route("/user", routing::get(user::index).post(user::create))
        .route("/users", routing::get(user::index))
        // Same pattern for both methods: PUT reads an email, DELETE an id.
        .route("/user/:email", routing::put(user::upsert).delete(user::delete))
        // GET reads an email, PUT an id.
        .route(
            "/user/admin/:id",
            routing::get(user::is_admin).put(user::make_admin),
        )
        .route("/doctor", routing::post(doctor::create))
        .route("/doctors", routing::get(doctor::index))
        .route("/doctor/:id", routing::delete(doctor::delete))
        .route(
            "/create-payment-intent",
            routing::post(payment::create_intent),
        )
        .route("/payments", routing::post(payment::create))
        .fallback(fallback)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn root() -> &'static str {
    "Doctors portal server running"
}

async fn fallback(uri: Uri) -> Error {
    Error::NotFound(uri)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub matched_count: u64,
    pub modified_count: u64,
}

impl From<mongodb::results::UpdateResult> for UpdateResponse {
    fn from(value: mongodb::results::UpdateResult) -> Self {
        Self {
            matched_count: value.matched_count,
            modified_count: value.modified_count,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub deleted_count: u64,
}
