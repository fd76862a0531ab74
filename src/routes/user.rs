use crate::auth::{CurrentUser, parse_session_cookie_value};
use crate::config::Config;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::user::{AvailableDriverResponse, LoginRequest, RegisterRequest, UserResponse, UserUpdateRequest};
use rocket::http::{Cookie, CookieJar, Status};
use rocket::serde::json::Json;
use rocket::{State, delete, get, post, put};
use rocket_okapi::openapi;
use schemars::JsonSchema;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

const SESSION_COOKIE: &str = "session";

/// Register a new account. Driver and dual-role accounts must ship a driver
/// profile; passenger profiles are created automatically.
#[openapi(tag = "Users")]
#[post("/", data = "<payload>")]
pub async fn register(pool: &State<PgPool>, payload: Json<RegisterRequest>) -> Result<Json<UserResponse>, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    if repo.get_user_by_email(&payload.email).await?.is_some() {
        return Err(AppError::UserAlreadyExists(payload.email.clone()));
    }

    let user = repo.create_user(&payload).await?;
    let response = assemble_user_response(&repo, &user).await?;
    Ok(Json(response))
}

#[openapi(tag = "Users")]
#[post("/login", data = "<payload>")]
pub async fn login(
    pool: &State<PgPool>,
    config: &State<Config>,
    cookies: &CookieJar<'_>,
    payload: Json<LoginRequest>,
) -> Result<Status, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };

    let Some(user) = repo.get_user_by_email(&payload.email).await? else {
        // Burn the same Argon2 work as a real verification would.
        PostgresRepository::dummy_verify(&payload.password);
        return Err(AppError::InvalidCredentials);
    };

    if !user.is_active {
        PostgresRepository::dummy_verify(&payload.password);
        return Err(AppError::InvalidCredentials);
    }

    repo.verify_password(&user, &payload.password).await?;

    let session = repo.open_session(&user.id, config.auth.session_ttl_hours).await?;

    let value = format!("{}:{}", session.id, user.id);
    cookies.add_private(Cookie::build((SESSION_COOKIE, value)).path("/").build());

    Ok(Status::Ok)
}

#[openapi(tag = "Users")]
#[post("/logout")]
pub async fn logout(pool: &State<PgPool>, cookies: &CookieJar<'_>) -> Result<Status, AppError> {
    if let Some(cookie) = cookies.get_private(SESSION_COOKIE)
        && let Some((session_id, _)) = parse_session_cookie_value(cookie.value())
    {
        let repo = PostgresRepository { pool: pool.inner().clone() };
        repo.close_session(&session_id).await?;
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE).build());
    Ok(Status::Ok)
}

#[openapi(tag = "Users")]
#[get("/me")]
pub async fn me(pool: &State<PgPool>, current_user: CurrentUser) -> Result<Json<UserResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let user = repo
        .get_user_by_id(&current_user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(assemble_user_response(&repo, &user).await?))
}

/// Partial profile update; absent fields keep their current values.
#[openapi(tag = "Users")]
#[put("/me", data = "<payload>")]
pub async fn update_me(pool: &State<PgPool>, current_user: CurrentUser, payload: Json<UserUpdateRequest>) -> Result<Json<UserResponse>, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let user = repo.update_user(&current_user.id, &payload).await?;
    Ok(Json(assemble_user_response(&repo, &user).await?))
}

/// Accounts are deactivated, never deleted; trips and reviews stay on
/// record.
#[openapi(tag = "Users")]
#[delete("/me")]
pub async fn deactivate_me(pool: &State<PgPool>, current_user: CurrentUser, cookies: &CookieJar<'_>) -> Result<Status, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    repo.deactivate_user(&current_user.id).await?;
    repo.close_all_sessions_for_user(&current_user.id).await?;
    cookies.remove_private(Cookie::build(SESSION_COOKIE).build());

    Ok(Status::NoContent)
}

#[openapi(tag = "Users")]
#[get("/<id>")]
pub async fn get_user(pool: &State<PgPool>, _current_user: CurrentUser, id: &str) -> Result<Json<UserResponse>, AppError> {
    let user_id = Uuid::parse_str(id).map_err(|e| AppError::uuid("Invalid user id", e))?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let user = repo
        .get_user_by_id(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(assemble_user_response(&repo, &user).await?))
}

/// Verified drivers currently accepting trips.
#[openapi(tag = "Users")]
#[get("/drivers/available")]
pub async fn available_drivers(pool: &State<PgPool>, _current_user: CurrentUser) -> Result<Json<Vec<AvailableDriverResponse>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let rows = repo.list_available_drivers().await?;
    Ok(Json(rows.iter().map(AvailableDriverResponse::from).collect()))
}

#[derive(Deserialize, Debug, JsonSchema)]
pub struct AvailabilityRequest {
    pub is_available: bool,
}

/// Drivers switch themselves on or off duty. The value is set, not toggled,
/// so repeated requests cannot flip the flag unexpectedly.
#[openapi(tag = "Users")]
#[put("/drivers/availability", data = "<payload>")]
pub async fn set_availability(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    payload: Json<AvailabilityRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if !current_user.role.includes_driver() {
        return Err(AppError::Forbidden("only drivers can change availability".to_string()));
    }

    let repo = PostgresRepository { pool: pool.inner().clone() };
    repo.set_driver_availability(&current_user.id, payload.is_available).await?;

    let user = repo
        .get_user_by_id(&current_user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(assemble_user_response(&repo, &user).await?))
}

async fn assemble_user_response(repo: &PostgresRepository, user: &crate::models::user::User) -> Result<UserResponse, AppError> {
    let passenger = repo.get_passenger_profile(&user.id).await?;
    let driver = repo.get_driver_profile(&user.id).await?;
    Ok(UserResponse::assemble(user, passenger.as_ref(), driver.as_ref()))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![
        register,
        login,
        logout,
        me,
        update_me,
        deactivate_me,
        get_user,
        available_drivers,
        set_availability
    ]
}
