use axum::{
    extract::{Query, State},
    Json,
};
use bson::{doc, oid::ObjectId};
use serde::{Deserialize, Serialize};
use tap::TapFallible;

use crate::{error::Error, mongo_ext::Collection, util::InsertResponse, util::ObjectIdString};

use super::token::UserClaim;

/// One reserved slot for one patient on one date.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BookingModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub appointment: String,
    pub email: String,
    pub treatment: String,
    pub slot: String,
}

#[derive(Clone)]
pub struct BookingCollection(pub Collection<BookingModel>);

impl std::ops::Deref for BookingCollection {
    type Target = Collection<BookingModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Booking {
    pub id: ObjectIdString,
    pub appointment: String,
    pub email: String,
    pub treatment: String,
    pub slot: String,
}

impl From<BookingModel> for Booking {
    fn from(booking: BookingModel) -> Self {
        Self {
            id: booking.id.into(),
            appointment: booking.appointment,
            email: booking.email,
            treatment: booking.treatment,
            slot: booking.slot,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EmailQuery {
    pub email: Option<String>,
}

/// Bookings for one patient. The caller may only list their own email.
pub async fn index(
    State(bookings): State<BookingCollection>,
    claim: UserClaim,
    Query(query): Query<EmailQuery>,
) -> Result<Json<Vec<Booking>>, Error> {
    let email = query.email.unwrap_or_default();

    if email != claim.email {
        return Err(Error::Forbidden)
            .tap_err(|_| tracing::debug!("tried listing bookings of another email"));
    }

    let bookings = bookings
        .find_all(doc! {
            "email": &email,
        })
        .await?;

    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateRequest {
    pub appointment: String,
    pub email: String,
    pub treatment: String,
    pub slot: String,
}

/// A duplicate booking is a normal outcome the caller must inspect, not an
/// HTTP error.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum CreateResponse {
    Booked(InsertResponse),
    Rejected { acknowledged: bool, message: String },
}

/// Inserts a booking unless one already exists for the same
/// (appointment, email, treatment) triple. The pre-check is best-effort:
/// two concurrent identical requests can both pass it and both insert.
pub async fn create(
    State(bookings): State<BookingCollection>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<CreateResponse>, Error> {
    let already_booked = bookings
        .find_all(doc! {
            "appointment": &request.appointment,
            "email": &request.email,
            "treatment": &request.treatment,
        })
        .await?;

    if !already_booked.is_empty() {
        tracing::debug!("duplicate booking rejected");
        return Ok(Json(CreateResponse::Rejected {
            acknowledged: false,
            message: format!("You already have a booking on {}", request.appointment),
        }));
    }

    let model = BookingModel {
        id: ObjectId::new(),
        appointment: request.appointment,
        email: request.email,
        treatment: request.treatment,
        slot: request.slot,
    };

    bookings.insert_one(&model, None).await?;

    Ok(Json(CreateResponse::Booked(InsertResponse::new(model.id))))
}
