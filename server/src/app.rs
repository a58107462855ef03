use axum::extract::FromRef;

use crate::{
    api::{
        booking::BookingCollection, doctor::DoctorCollection, payment::PaymentCollection,
        service::ServiceCollection, token::JwtState, user::UserCollection,
    },
    config::Config,
    migrate::MigrationCollection,
    stripe::StripeClient,
};

#[derive(FromRef, Clone)]
pub struct AppState {
    pub jwt_state: JwtState,
    pub stripe: StripeClient,

    pub mongo_client: mongodb::Client,
    pub database: mongodb::Database,
    pub migrate_collection: MigrationCollection,
    pub service_collection: ServiceCollection,
    pub booking_collection: BookingCollection,
    pub user_collection: UserCollection,
    pub doctor_collection: DoctorCollection,
    pub payment_collection: PaymentCollection,
}

impl AppState {
    /// Builds the client and collection handles. No round trip to the server
    /// happens here; see [`AppState::ping`].
    pub async fn new(config: &Config) -> Result<Self, mongodb::error::Error> {
        let jwt_state = JwtState::from_config(config);
        let stripe = StripeClient::from_config(config);

        let mut mongo_client_opt =
            mongodb::options::ClientOptions::parse(&config.mongodb_uri).await?;
        mongo_client_opt.app_name = Some("doctors-portal".to_string());
        let mongo_client = mongodb::Client::with_options(mongo_client_opt)?;

        let db = mongo_client.database(&config.database_name);
        Ok(Self {
            jwt_state,
            stripe,

            mongo_client,
            migrate_collection: MigrationCollection(db.collection("migrations").into()),
            service_collection: ServiceCollection(db.collection("service").into()),
            booking_collection: BookingCollection(db.collection("booking").into()),
            user_collection: UserCollection(db.collection("users").into()),
            doctor_collection: DoctorCollection(db.collection("doctors").into()),
            payment_collection: PaymentCollection(db.collection("payments").into()),
            database: db,
        })
    }

    pub async fn ping(&self) -> Result<(), mongodb::error::Error> {
        self.database
            .run_command(bson::doc! { "ping": 1 }, None)
            .await
            .map(|_| ())
    }

    /// Closes the connection pool once in-flight operations finish.
    pub async fn shutdown(self) {
        self.mongo_client.shutdown().await;
    }
}
