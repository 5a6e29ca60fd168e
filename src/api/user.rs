use std::str::FromStr;

use axum::{
    extract::{Path, State},
    Json,
};
use bson::{doc, oid::ObjectId};
use mongodb::options::UpdateOptions;
use serde::{Deserialize, Serialize};
use tap::TapFallible;

use crate::{
    error::Error,
    mongo_ext::Collection,
    util::{DeleteResponse, InsertResponse, ObjectIdString, UpdateResponse},
};

use super::token::UserClaim;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
}

/// An account. Absence of a role means non-admin.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

impl UserModel {
    pub fn is_admin(&self) -> bool {
        self.role == Some(UserRole::Admin)
    }
}

#[derive(Clone)]
pub struct UserCollection(pub Collection<UserModel>);

impl std::ops::Deref for UserCollection {
    type Target = Collection<UserModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: ObjectIdString,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

impl From<UserModel> for User {
    fn from(user: UserModel) -> Self {
        Self {
            id: user.id.into(),
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

pub async fn index(State(users): State<UserCollection>) -> Result<Json<Vec<User>>, Error> {
    let users = users.find_all(None).await?;

    Ok(Json(users.into_iter().map(Into::into).collect()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub email: String,
}

pub async fn create(
    State(users): State<UserCollection>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<InsertResponse>, Error> {
    let model = UserModel {
        id: ObjectId::new(),
        name: request.name,
        email: request.email,
        role: None,
    };

    users.insert_one(&model, None).await?;

    Ok(Json(InsertResponse::new(model.id)))
}

pub async fn delete(
    State(users): State<UserCollection>,
    Path(user_id): Path<String>,
) -> Result<Json<DeleteResponse>, Error> {
    let user_id = ObjectId::from_str(&user_id)
        .map_err(|_| Error::NoResource)
        .tap_err(|_| tracing::debug!("tried deleting user with malformed id"))?;

    let result = users.delete_one_by_id(user_id).await?;

    Ok(Json(result.into()))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatus {
    pub is_admin: bool,
}

/// Whether the account with this email carries the admin role. Unknown
/// emails are simply not admins.
pub async fn is_admin(
    State(users): State<UserCollection>,
    Path(email): Path<String>,
) -> Result<Json<AdminStatus>, Error> {
    let user = users
        .find_one(
            doc! {
                "email": &email,
            },
            None,
        )
        .await?;

    Ok(Json(AdminStatus {
        is_admin: user.map(|user| user.is_admin()).unwrap_or(false),
    }))
}

/// Grants the admin role to the target id. Only an existing admin may do
/// this; the caller is identified by the email claim of their token.
pub async fn make_admin(
    State(users): State<UserCollection>,
    claim: UserClaim,
    Path(user_id): Path<String>,
) -> Result<Json<UpdateResponse>, Error> {
    let caller = users
        .find_one(
            doc! {
                "email": &claim.email,
            },
            None,
        )
        .await?;

    match caller {
        Some(caller) if caller.is_admin() => {}
        _ => {
            return Err(Error::Forbidden)
                .tap_err(|_| tracing::debug!("tried granting admin as non-admin"))
        }
    }

    let user_id = ObjectId::from_str(&user_id)
        .map_err(|_| Error::NoResource)
        .tap_err(|_| tracing::debug!("tried granting admin with malformed id"))?;

    let result = users
        .update_one(
            doc! {
                "_id": user_id,
            },
            doc! {
                "$set": {
                    "role": "admin",
                },
            },
            UpdateOptions::builder().upsert(true).build(),
        )
        .await?;

    Ok(Json(result.into()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::{extract::Path, Json};
    use bson::oid::ObjectId;

    use crate::{api::tests::bootstrap, error::Error};

    use super::*;

    #[tokio::test]
    async fn test_create_then_index() {
        let bootstrap = bootstrap().await;

        let Json(inserted) = super::create(
            bootstrap.user_collection(),
            Json(CreateRequest {
                name: Some("A".to_string()),
                email: "a@x.com".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(inserted.acknowledged);

        let Json(users) = super::index(bootstrap.user_collection()).await.unwrap();

        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, inserted.inserted_id);
        assert_eq!(users[0].email, "a@x.com");
        assert_eq!(users[0].role, None);
    }

    #[tokio::test]
    async fn test_delete_missing_user_is_idempotent() {
        let bootstrap = bootstrap().await;

        let id = ObjectId::new().to_string();

        for _ in 0..2 {
            let Json(result) = super::delete(bootstrap.user_collection(), Path(id.clone()))
                .await
                .unwrap();
            assert_eq!(result.deleted_count, 0);
        }
    }

    #[tokio::test]
    async fn test_delete_malformed_id() {
        let bootstrap = bootstrap().await;

        let err = super::delete(bootstrap.user_collection(), Path("not-an-id".to_string()))
            .await
            .unwrap_err();
        assert_matches!(err, Error::NoResource);
    }

    #[tokio::test]
    async fn test_is_admin_false_for_unknown_email() {
        let bootstrap = bootstrap().await;

        let Json(status) = super::is_admin(
            bootstrap.user_collection(),
            Path("nobody@x.com".to_string()),
        )
        .await
        .unwrap();

        assert!(!status.is_admin);
    }

    #[tokio::test]
    async fn test_is_admin_reflects_role() {
        let bootstrap = bootstrap().await;

        bootstrap.insert_user("plain@x.com", None).await;
        bootstrap
            .insert_user("admin@x.com", Some(UserRole::Admin))
            .await;

        let Json(status) =
            super::is_admin(bootstrap.user_collection(), Path("plain@x.com".to_string()))
                .await
                .unwrap();
        assert!(!status.is_admin);

        let Json(status) =
            super::is_admin(bootstrap.user_collection(), Path("admin@x.com".to_string()))
                .await
                .unwrap();
        assert!(status.is_admin);
    }

    #[tokio::test]
    async fn test_make_admin_requires_admin_caller() {
        let bootstrap = bootstrap().await;

        bootstrap.insert_user("plain@x.com", None).await;
        let target = bootstrap.insert_user("target@x.com", None).await;

        let err = super::make_admin(
            bootstrap.user_collection(),
            bootstrap.user_claim("plain@x.com"),
            Path(target.to_string()),
        )
        .await
        .unwrap_err();
        assert_matches!(err, Error::Forbidden);

        // unknown caller email is forbidden too
        let err = super::make_admin(
            bootstrap.user_collection(),
            bootstrap.user_claim("ghost@x.com"),
            Path(target.to_string()),
        )
        .await
        .unwrap_err();
        assert_matches!(err, Error::Forbidden);
    }

    #[tokio::test]
    async fn test_make_admin_grants_role() {
        let bootstrap = bootstrap().await;

        bootstrap
            .insert_user("admin@x.com", Some(UserRole::Admin))
            .await;
        let target = bootstrap.insert_user("target@x.com", None).await;

        let Json(result) = super::make_admin(
            bootstrap.user_collection(),
            bootstrap.user_claim("admin@x.com"),
            Path(target.to_string()),
        )
        .await
        .unwrap();

        assert_eq!(result.matched_count, 1);
        assert_eq!(result.modified_count, 1);

        let Json(status) = super::is_admin(
            bootstrap.user_collection(),
            Path("target@x.com".to_string()),
        )
        .await
        .unwrap();
        assert!(status.is_admin);
    }
}
