use axum::{
    extract::{FromRef, FromRequestParts, Query, State},
    headers::{authorization::Bearer, Authorization},
    http::{request::Parts, StatusCode},
    Json, RequestPartsExt, TypedHeader,
};
use jsonwebtoken::TokenData;
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use time::{Duration, OffsetDateTime};

use crate::error::Error;

use super::user::UserCollection;

#[derive(Clone)]
pub struct JwtState {
    validation: jsonwebtoken::Validation,
    header: jsonwebtoken::Header,

    encoding_key: jsonwebtoken::EncodingKey,
    decoding_key: jsonwebtoken::DecodingKey,
}

impl JwtState {
    pub fn new(secret: &[u8]) -> Self {
        let encoding_key = jsonwebtoken::EncodingKey::from_secret(secret);
        let decoding_key = jsonwebtoken::DecodingKey::from_secret(secret);

        let header = jsonwebtoken::Header::new(jsonwebtoken::Algorithm::HS256);
        let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
        // expiry is checked on the claims so an expired token maps to
        // Forbidden instead of a generic decode error
        validation.validate_exp = false;

        Self {
            header,
            validation,

            encoding_key,
            decoding_key,
        }
    }

    pub fn new_from_env() -> Self {
        let secret = std::env::var("ACCESS_TOKEN")
            .expect("Cannot retreive ACCESS_TOKEN from environment variable.");

        Self::new(secret.as_bytes())
    }
}

pub fn current_timestamp() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccessTokenClaims {
    pub email: String,
    pub exp: i64,
}

impl AccessTokenClaims {
    pub fn is_expired(&self) -> bool {
        self.exp < current_timestamp().unix_timestamp()
    }
}

pub fn generate_access_token(jwt_state: &JwtState, email: &str) -> Result<String, Error> {
    let expired_at = current_timestamp() + Duration::hours(1);

    generate_access_token_with_exp(jwt_state, email, expired_at.unix_timestamp())
}

pub fn generate_access_token_with_exp(
    jwt_state: &JwtState,
    email: &str,
    exp: i64,
) -> Result<String, Error> {
    jsonwebtoken::encode(
        &jwt_state.header,
        &AccessTokenClaims {
            email: email.to_string(),
            exp,
        },
        &jwt_state.encoding_key,
    )
    .map_err(Into::into)
}

pub fn decode_access_token(
    jwt_state: &JwtState,
    token: &str,
) -> Result<TokenData<AccessTokenClaims>, Error> {
    jsonwebtoken::decode(token, &jwt_state.decoding_key, &jwt_state.validation).map_err(Into::into)
}

/// The verified bearer identity of the caller, extracted from the
/// `Authorization` header. A missing header is Unauthorized; an undecodable
/// or expired token is Forbidden.
#[derive(Debug, Clone)]
pub struct UserClaim {
    pub email: String,
}

impl UserClaim {
    pub fn from_token(jwt_state: &JwtState, token: &str) -> Result<Self, Error> {
        let token = decode_access_token(jwt_state, token).map_err(|_| Error::Forbidden)?;

        if token.claims.is_expired() {
            return Err(Error::Forbidden);
        }

        Ok(Self {
            email: token.claims.email,
        })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for UserClaim
where
    JwtState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(token)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| Error::Unauthorized)
            .tap_err(|_| tracing::debug!("request without bearer credential"))?;

        let jwt = JwtState::from_ref(state);

        Self::from_token(&jwt, token.token())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IssueQuery {
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub access_token: String,
}

/// Mints a one-hour token for a known user email. Unknown emails get a 403
/// with an empty token; a known user returns immediately with the token.
pub async fn issue(
    State(users): State<UserCollection>,
    State(jwt_state): State<JwtState>,
    Query(query): Query<IssueQuery>,
) -> Result<(StatusCode, Json<IssueResponse>), Error> {
    let email = query.email.unwrap_or_default();

    let user = users
        .find_one(
            bson::doc! {
                "email": &email
            },
            None,
        )
        .await?;

    if user.is_none() {
        tracing::debug!("token requested for unknown email");
        return Ok((
            StatusCode::FORBIDDEN,
            Json(IssueResponse {
                access_token: String::new(),
            }),
        ));
    }

    let token = generate_access_token(&jwt_state, &email)?;

    Ok((StatusCode::OK, Json(IssueResponse { access_token: token })))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use crate::error::Error;

    use super::*;

    fn jwt() -> JwtState {
        JwtState::new(b"test-secret")
    }

    #[test]
    fn test_access_token_round_trip() {
        let jwt = jwt();

        let token = generate_access_token(&jwt, "a@x.com").unwrap();

        let token = decode_access_token(&jwt, &token).unwrap();
        assert_eq!(token.claims.email, "a@x.com");
        assert!(!token.claims.is_expired());
    }

    #[test]
    fn test_expired_token_is_forbidden() {
        let jwt = jwt();

        let token = generate_access_token_with_exp(
            &jwt,
            "a@x.com",
            (current_timestamp() + Duration::seconds(-1)).unix_timestamp(),
        )
        .unwrap();

        let err = UserClaim::from_token(&jwt, &token).unwrap_err();
        assert_matches!(err, Error::Forbidden);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_forbidden() {
        let token = generate_access_token(&JwtState::new(b"other-secret"), "a@x.com").unwrap();

        let err = UserClaim::from_token(&jwt(), &token).unwrap_err();
        assert_matches!(err, Error::Forbidden);
    }

    #[test]
    fn test_garbage_token_is_forbidden() {
        let err = UserClaim::from_token(&jwt(), "not-a-token").unwrap_err();
        assert_matches!(err, Error::Forbidden);
    }

    #[tokio::test]
    async fn test_issue_for_known_email() {
        let bootstrap = crate::api::tests::bootstrap().await;

        bootstrap.insert_user("a@x.com", None).await;

        let (status, Json(response)) = super::issue(
            bootstrap.user_collection(),
            bootstrap.jwt_state(),
            Query(IssueQuery {
                email: Some("a@x.com".to_string()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::OK);

        let claim =
            UserClaim::from_token(&bootstrap.app_state.jwt_state, &response.access_token).unwrap();
        assert_eq!(claim.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_issue_for_unknown_email_is_refused() {
        let bootstrap = crate::api::tests::bootstrap().await;

        let (status, Json(response)) = super::issue(
            bootstrap.user_collection(),
            bootstrap.jwt_state(),
            Query(IssueQuery {
                email: Some("nobody@x.com".to_string()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(response.access_token, "");
    }

    #[tokio::test]
    async fn test_issue_without_email_is_refused() {
        let bootstrap = crate::api::tests::bootstrap().await;

        bootstrap.insert_user("a@x.com", None).await;

        let (status, Json(response)) = super::issue(
            bootstrap.user_collection(),
            bootstrap.jwt_state(),
            Query(IssueQuery { email: None }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(response.access_token, "");
    }

    #[tokio::test]
    async fn test_extractor_accepts_bearer_token() {
        let bootstrap = crate::api::tests::bootstrap().await;

        let token = generate_access_token(&bootstrap.app_state.jwt_state, "a@x.com").unwrap();

        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .header("Authorization", format!("Bearer {}", token))
            .body(())
            .unwrap()
            .into_parts();

        let claim = UserClaim::from_request_parts(&mut parts, &bootstrap.app_state)
            .await
            .unwrap();
        assert_eq!(claim.email, "a@x.com");
    }

    #[tokio::test]
    async fn test_extractor_without_header_is_unauthorized() {
        let bootstrap = crate::api::tests::bootstrap().await;

        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .body(())
            .unwrap()
            .into_parts();

        let err = UserClaim::from_request_parts(&mut parts, &bootstrap.app_state)
            .await
            .unwrap_err();
        assert_matches!(err, Error::Unauthorized);
    }
}
