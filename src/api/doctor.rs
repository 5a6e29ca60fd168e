use std::str::FromStr;

use axum::{
    extract::{Path, State},
    Json,
};
use bson::{oid::ObjectId, Document};
use serde::{Deserialize, Serialize};
use tap::TapFallible;

use crate::{
    error::Error,
    mongo_ext::Collection,
    util::{DeleteResponse, InsertResponse, ObjectIdString},
};

/// A practitioner profile. No schema is enforced beyond the name; extra
/// fields from the client are stored and returned as-is.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DoctorModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub name: String,

    #[serde(flatten)]
    pub extra: Document,
}

#[derive(Clone)]
pub struct DoctorCollection(pub Collection<DoctorModel>);

impl std::ops::Deref for DoctorCollection {
    type Target = Collection<DoctorModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Doctor {
    pub id: ObjectIdString,
    pub name: String,

    #[serde(flatten)]
    pub extra: Document,
}

impl From<DoctorModel> for Doctor {
    fn from(doctor: DoctorModel) -> Self {
        Self {
            id: doctor.id.into(),
            name: doctor.name,
            extra: doctor.extra,
        }
    }
}

pub async fn index(State(doctors): State<DoctorCollection>) -> Result<Json<Vec<Doctor>>, Error> {
    let doctors = doctors.find_all(None).await?;

    Ok(Json(doctors.into_iter().map(Into::into).collect()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateRequest {
    pub name: String,

    #[serde(flatten)]
    pub extra: Document,
}

pub async fn create(
    State(doctors): State<DoctorCollection>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<InsertResponse>, Error> {
    let model = DoctorModel {
        id: ObjectId::new(),
        name: request.name,
        extra: request.extra,
    };

    doctors.insert_one(&model, None).await?;

    Ok(Json(InsertResponse::new(model.id)))
}

pub async fn delete(
    State(doctors): State<DoctorCollection>,
    Path(doctor_id): Path<String>,
) -> Result<Json<DeleteResponse>, Error> {
    let doctor_id = ObjectId::from_str(&doctor_id)
        .map_err(|_| Error::NoResource)
        .tap_err(|_| tracing::debug!("tried deleting doctor with malformed id"))?;

    let result = doctors.delete_one_by_id(doctor_id).await?;

    Ok(Json(result.into()))
}
