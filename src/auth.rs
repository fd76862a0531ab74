use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::user::UserRole;
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{FromRequest, Outcome as RequestOutcome, Request};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{Object, Responses, SecurityRequirement, SecurityScheme, SecuritySchemeData};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// The authenticated actor every protected operation receives. Carries the
/// role so handlers can gate driver-only operations without another query.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
    pub role: UserRole,
}

/// Session cookies hold `session_id:user_id`; both halves must be UUIDs.
pub(crate) fn parse_session_cookie_value(value: &str) -> Option<(Uuid, Uuid)> {
    let (session_id_str, user_id_str) = value.split_once(':')?;
    let session_id = Uuid::parse_str(session_id_str).ok()?;
    let user_id = Uuid::parse_str(user_id_str).ok()?;
    Some((session_id, user_id))
}

async fn resolve_current_user(req: &Request<'_>, session_id: Uuid, user_id: Uuid) -> Result<Option<CurrentUser>, AppError> {
    let Some(pool) = req.rocket().state::<PgPool>() else {
        return Err(AppError::Unauthorized);
    };
    let repo = PostgresRepository { pool: pool.clone() };

    match repo.get_active_session_user(&session_id, &user_id).await? {
        Some(user) => Ok(Some(CurrentUser {
            id: user.id,
            username: user.username,
            role: user.role,
        })),
        None => {
            // Expired rows are garbage once the cookie stops resolving.
            let _ = repo.delete_session_if_expired(&session_id).await;
            Ok(None)
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentUser {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        let Some(cookie) = req.cookies().get_private("session") else {
            return Outcome::Error((Status::Unauthorized, AppError::InvalidCredentials));
        };
        let Some((session_id, user_id)) = parse_session_cookie_value(cookie.value()) else {
            return Outcome::Error((Status::Unauthorized, AppError::InvalidCredentials));
        };

        match resolve_current_user(req, session_id, user_id).await {
            Ok(Some(current_user)) => {
                req.local_cache(|| Some(current_user.clone()));
                Outcome::Success(current_user)
            }
            Ok(None) => Outcome::Error((Status::Unauthorized, AppError::InvalidCredentials)),
            Err(err) => Outcome::Error((Status::InternalServerError, err)),
        }
    }
}

impl<'a> OpenApiFromRequest<'a> for CurrentUser {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        let security_scheme = SecurityScheme {
            description: Some("Cookie-based authentication. Log in via POST /api/users/login to obtain the session cookie.".to_string()),
            data: SecuritySchemeData::ApiKey {
                name: "session".to_string(),
                location: "cookie".to_string(),
            },
            extensions: Object::default(),
        };

        let mut security_req = SecurityRequirement::new();
        security_req.insert("cookieAuth".to_string(), Vec::new());

        Ok(RequestHeaderInput::Security("cookieAuth".to_string(), security_scheme, security_req))
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        use rocket_okapi::okapi::openapi3::{RefOr, Response};
        let mut responses = Responses::default();
        responses.responses.insert(
            "401".to_string(),
            RefOr::Object(Response {
                description: "Unauthorized - Authentication required".to_string(),
                ..Default::default()
            }),
        );
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::parse_session_cookie_value;
    use uuid::Uuid;

    #[test]
    fn parse_session_cookie_value_valid() {
        let session_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let value = format!("{}:{}", session_id, user_id);
        let parsed = parse_session_cookie_value(&value);
        assert!(matches!(parsed, Some((parsed_session_id, parsed_user_id)) if parsed_session_id == session_id && parsed_user_id == user_id));
    }

    #[test]
    fn parse_session_cookie_value_rejects_garbage() {
        assert!(parse_session_cookie_value("not-a-uuid:user@example.com").is_none());
        assert!(parse_session_cookie_value("missing-delimiter").is_none());
        assert!(parse_session_cookie_value("").is_none());
    }
}
