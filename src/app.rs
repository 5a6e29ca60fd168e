use axum::extract::FromRef;

use crate::api::{
    booking::BookingCollection, doctor::DoctorCollection, service::ServiceCollection,
    token::JwtState, user::UserCollection,
};

#[derive(FromRef, Clone)]
pub struct AppState {
    pub jwt_state: JwtState,

    pub mongo_client: mongodb::Client,
    pub service_collection: ServiceCollection,
    pub booking_collection: BookingCollection,
    pub user_collection: UserCollection,
    pub doctor_collection: DoctorCollection,
}

impl AppState {
    pub async fn new(
        mongo_url: &str,
        database_name: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let jwt_state = JwtState::new_from_env();

        let mongo_client_opt = mongodb::options::ClientOptions::parse(mongo_url).await?;
        let mongo_client = mongodb::Client::with_options(mongo_client_opt)?;

        let db = mongo_client.database(database_name);
        Ok(Self {
            jwt_state,

            mongo_client,
            service_collection: ServiceCollection(db.collection("services").into()),
            booking_collection: BookingCollection(db.collection("bookings").into()),
            user_collection: UserCollection(db.collection("users").into()),
            doctor_collection: DoctorCollection(db.collection("doctors").into()),
        })
    }

    pub async fn new_from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let mongodb_url = &std::env::var("MONGODB_URI")
            .expect("Cannot retreive MONGODB_URI from environment variable.");

        Self::new(mongodb_url, "doctorsPortal").await
    }
}
