use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unauthorized access")]
    Unauthorized,

    #[error("forbidden access")]
    Forbidden,

    #[error("No resource found")]
    NoResource,

    #[error("{0}")]
    DatabaseError(#[from] mongodb::error::Error),

    #[error("{0}")]
    JWTError(#[from] jsonwebtoken::errors::Error),

    #[error("{0}")]
    BSONSerError(#[from] bson::ser::Error),

    #[error("{0}")]
    BSONDeError(#[from] bson::de::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorJson {
    message: String,
}

impl From<&Error> for ErrorJson {
    fn from(err: &Error) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("error: {:?}", self);

        match self {
            // missing credential is answered in plain text
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()).into_response(),
            Self::Forbidden => {
                (StatusCode::FORBIDDEN, Json(ErrorJson::from(&self))).into_response()
            }
            Self::NoResource => {
                (StatusCode::NOT_FOUND, Json(ErrorJson::from(&self))).into_response()
            }
            Self::DatabaseError(..)
            | Self::JWTError(..)
            | Self::BSONSerError(..)
            | Self::BSONDeError(..) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorJson::from(&self)),
            )
                .into_response(),
        }
    }
}

impl From<axum::extract::rejection::PathRejection> for Error {
    fn from(_value: axum::extract::rejection::PathRejection) -> Self {
        Self::NoResource
    }
}
