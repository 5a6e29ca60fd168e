use axum::{
    extract::{Query, State},
    Json,
};
use bson::{doc, oid::ObjectId};
use mongodb::options::{FindOptions, UpdateOptions};
use serde::{Deserialize, Serialize};

use crate::{error::Error, mongo_ext::Collection, util::ObjectIdString, util::UpdateResponse};

use super::booking::BookingCollection;

/// A bookable treatment type with its day-independent slot template.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServiceModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub name: String,
    pub price: f64,
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
    pub id: ObjectIdString,
    pub name: String,
    pub price: f64,
    pub slots: Vec<String>,
}

impl From<ServiceModel> for Service {
    fn from(service: ServiceModel) -> Self {
        Self {
            id: service.id.into(),
            name: service.name,
            price: service.price,
            slots: service.slots,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DateQuery {
    pub date: Option<String>,
}

/// Slots from the template that are not taken, template order preserved.
pub fn remaining_slots(slots: &[String], booked: &[&str]) -> Vec<String> {
    slots
        .iter()
        .filter(|slot| !booked.contains(&slot.as_str()))
        .cloned()
        .collect()
}

/// Availability for a date, computed application-side: every service with its
/// slot template minus the slots already booked for that service on the date.
pub async fn index(
    State(services): State<ServiceCollection>,
    State(bookings): State<BookingCollection>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<Service>>, Error> {
    let date = query.date.unwrap_or_default();

    let services = services.find_all(None).await?;
    let already_booked = bookings
        .find_all(doc! {
            "appointment": &date,
        })
        .await?;

    let services = services
        .into_iter()
        .map(|service| {
            let booked: Vec<&str> = already_booked
                .iter()
                .filter(|booking| booking.treatment == service.name)
                .map(|booking| booking.slot.as_str())
                .collect();

            Service {
                slots: remaining_slots(&service.slots, &booked),
                id: service.id.into(),
                name: service.name,
                price: service.price,
            }
        })
        .collect();

    Ok(Json(services))
}

/// Same availability contract as [`index`], computed database-side with a
/// single aggregation pipeline.
pub async fn index_aggregated(
    State(services): State<ServiceCollection>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<Service>>, Error> {
    let date = query.date.unwrap_or_default();

    let pipeline = vec![
        doc! {
            "$lookup": {
                "from": "bookings",
                "localField": "name",
                "foreignField": "treatment",
                "pipeline": [
                    {
                        "$match": {
                            "$expr": {
                                "$eq": ["$appointment", &date],
                            },
                        },
                    },
                ],
                "as": "booked",
            },
        },
        doc! {
            "$project": {
                "name": 1,
                "price": 1,
                "slots": 1,
                "booked": {
                    "$map": {
                        "input": "$booked",
                        "as": "book",
                        "in": "$$book.slot",
                    },
                },
            },
        },
        doc! {
            "$project": {
                "name": 1,
                "price": 1,
                "slots": {
                    "$setDifference": ["$slots", "$booked"],
                },
            },
        },
    ];

    let mut cursor = services.aggregate(pipeline, None).await?;

    let mut out = vec![];

    while cursor.advance().await? {
        let model: ServiceModel = bson::from_document(cursor.deserialize_current()?)?;

        out.push(model.into());
    }

    Ok(Json(out))
}

/// Administrative bulk update: overwrites the price of every service.
pub async fn reset_prices(
    State(services): State<ServiceCollection>,
) -> Result<Json<UpdateResponse>, Error> {
    let result = services
        .update_many(
            doc! {},
            doc! {
                "$set": {
                    "price": 99.0,
                },
            },
            UpdateOptions::builder().upsert(true).build(),
        )
        .await?;

    Ok(Json(result.into()))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Specialty {
    pub id: ObjectIdString,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SpecialtyModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
}

/// Service names only, for populating treatment pickers.
pub async fn specialties(
    State(ServiceCollection(services)): State<ServiceCollection>,
) -> Result<Json<Vec<Specialty>>, Error> {
    let mut cursor = services
        .clone_with_type::<SpecialtyModel>()
        .find(
            None,
            FindOptions::builder()
                .projection(doc! {
                    "name": 1,
                })
                .build(),
        )
        .await?;

    let mut out = vec![];

    while cursor.advance().await? {
        let model = cursor.deserialize_current()?;

        out.push(Specialty {
            id: model.id.into(),
            name: model.name,
        });
    }

    Ok(Json(out))
}
