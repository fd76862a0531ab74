use crate::auth::CurrentUser;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::pagination::PaginationParams;
use crate::models::trip::{TripCreateRequest, TripHistoryResponse, TripNotesRequest, TripResponse, TripStatus};
use crate::models::user::UserRole;
use crate::service::trip::TripService;
use rocket::serde::json::Json;
use rocket::{State, get, post, put};
use rocket_okapi::openapi;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Request a new trip; the authenticated user becomes its passenger.
#[openapi(tag = "Trips")]
#[post("/", data = "<payload>")]
pub async fn create_trip(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    payload: Json<TripCreateRequest>,
) -> Result<Json<TripResponse>, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let detail = TripService::new(&repo).create(&current_user, &payload).await?;
    Ok(Json(TripResponse::from(&detail)))
}

/// List the current user's trips, optionally filtered by status.
#[openapi(tag = "Trips")]
#[get("/?<status>&<page>&<limit>")]
pub async fn list_trips(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    status: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Json<Vec<TripResponse>>, AppError> {
    let status = match status.as_deref() {
        None => None,
        Some(raw) => Some(TripStatus::parse(raw).ok_or_else(|| AppError::BadRequest(format!("unknown trip status: {raw}")))?),
    };

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let trips = repo
        .list_trips_for_user(&current_user.id, status, &PaginationParams::new(page, limit))
        .await?;
    Ok(Json(trips.iter().map(TripResponse::from).collect()))
}

/// The current user's trips that are still underway.
#[openapi(tag = "Trips")]
#[get("/active")]
pub async fn list_active_trips(pool: &State<PgPool>, current_user: CurrentUser) -> Result<Json<Vec<TripResponse>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let trips = repo.list_active_trips_for_user(&current_user.id).await?;
    Ok(Json(trips.iter().map(TripResponse::from).collect()))
}

/// Completed-trip history with review flags; `role` narrows to trips where
/// the user rode as `passenger` or drove as `driver`.
#[openapi(tag = "Trips")]
#[get("/history?<role>&<page>&<limit>")]
pub async fn trip_history(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    role: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Json<Vec<TripHistoryResponse>>, AppError> {
    let role = match role.as_deref() {
        None | Some("all") => None,
        Some("passenger") => Some(UserRole::Passenger),
        Some("driver") => Some(UserRole::Driver),
        Some(raw) => return Err(AppError::BadRequest(format!("unknown role filter: {raw}"))),
    };

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let rows = repo
        .list_trip_history(&current_user.id, role, &PaginationParams::new(page, limit))
        .await?;
    Ok(Json(rows.iter().map(TripHistoryResponse::from).collect()))
}

/// Trips waiting for a driver. Only drivers may browse these.
#[openapi(tag = "Trips")]
#[get("/pending?<page>&<limit>")]
pub async fn pending_trips(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Json<Vec<TripResponse>>, AppError> {
    if !current_user.role.includes_driver() {
        return Err(AppError::Forbidden("only drivers can view pending trips".to_string()));
    }

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let trips = repo.list_pending_trips(&PaginationParams::new(page, limit)).await?;
    Ok(Json(trips.iter().map(TripResponse::from).collect()))
}

#[openapi(tag = "Trips")]
#[get("/<id>")]
pub async fn get_trip(pool: &State<PgPool>, current_user: CurrentUser, id: &str) -> Result<Json<TripResponse>, AppError> {
    let trip_id = Uuid::parse_str(id).map_err(|e| AppError::uuid("Invalid trip id", e))?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let detail = TripService::new(&repo).get_for_participant(&current_user, &trip_id).await?;
    Ok(Json(TripResponse::from(&detail)))
}

#[openapi(tag = "Trips")]
#[post("/<id>/accept")]
pub async fn accept_trip(pool: &State<PgPool>, current_user: CurrentUser, id: &str) -> Result<Json<TripResponse>, AppError> {
    let trip_id = Uuid::parse_str(id).map_err(|e| AppError::uuid("Invalid trip id", e))?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let detail = TripService::new(&repo).accept(&current_user, &trip_id).await?;
    Ok(Json(TripResponse::from(&detail)))
}

#[openapi(tag = "Trips")]
#[post("/<id>/start")]
pub async fn start_trip(pool: &State<PgPool>, current_user: CurrentUser, id: &str) -> Result<Json<TripResponse>, AppError> {
    let trip_id = Uuid::parse_str(id).map_err(|e| AppError::uuid("Invalid trip id", e))?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let detail = TripService::new(&repo).start(&current_user, &trip_id).await?;
    Ok(Json(TripResponse::from(&detail)))
}

#[openapi(tag = "Trips")]
#[post("/<id>/complete")]
pub async fn complete_trip(pool: &State<PgPool>, current_user: CurrentUser, id: &str) -> Result<Json<TripResponse>, AppError> {
    let trip_id = Uuid::parse_str(id).map_err(|e| AppError::uuid("Invalid trip id", e))?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let detail = TripService::new(&repo).complete(&current_user, &trip_id).await?;
    Ok(Json(TripResponse::from(&detail)))
}

#[openapi(tag = "Trips")]
#[post("/<id>/cancel")]
pub async fn cancel_trip(pool: &State<PgPool>, current_user: CurrentUser, id: &str) -> Result<Json<TripResponse>, AppError> {
    let trip_id = Uuid::parse_str(id).map_err(|e| AppError::uuid("Invalid trip id", e))?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let detail = TripService::new(&repo).cancel(&current_user, &trip_id).await?;
    Ok(Json(TripResponse::from(&detail)))
}

/// Attach free-text notes to the caller's side of the trip.
#[openapi(tag = "Trips")]
#[put("/<id>/notes", data = "<payload>")]
pub async fn put_trip_notes(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    id: &str,
    payload: Json<TripNotesRequest>,
) -> Result<Json<TripResponse>, AppError> {
    payload.validate()?;

    let trip_id = Uuid::parse_str(id).map_err(|e| AppError::uuid("Invalid trip id", e))?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let detail = TripService::new(&repo).set_notes(&current_user, &trip_id, &payload.notes).await?;
    Ok(Json(TripResponse::from(&detail)))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![
        create_trip,
        list_trips,
        list_active_trips,
        trip_history,
        pending_trips,
        get_trip,
        accept_trip,
        start_trip,
        complete_trip,
        cancel_trip,
        put_trip_notes
    ]
}
