use crate::auth::CurrentUser;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::pagination::PaginationParams;
use crate::models::review::{PendingReviewResponse, ReviewCreateRequest, ReviewResponse, ReviewSummaryResponse};
use crate::service::rating::RatingService;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::openapi;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Review the other party of a completed trip. Recomputes the reviewed
/// user's role average on success.
#[openapi(tag = "Reviews")]
#[post("/", data = "<payload>")]
pub async fn create_review(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    payload: Json<ReviewCreateRequest>,
) -> Result<Json<ReviewResponse>, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let detail = RatingService::new(&repo).record_review(&current_user, &payload).await?;
    Ok(Json(ReviewResponse::from(&detail)))
}

/// Reviews the current user has received.
#[openapi(tag = "Reviews")]
#[get("/received?<page>&<limit>")]
pub async fn reviews_received(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Json<Vec<ReviewResponse>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let reviews = repo
        .list_reviews_received(&current_user.id, &PaginationParams::new(page, limit))
        .await?;
    Ok(Json(reviews.iter().map(ReviewResponse::from).collect()))
}

/// Reviews the current user has written.
#[openapi(tag = "Reviews")]
#[get("/given?<page>&<limit>")]
pub async fn reviews_given(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Json<Vec<ReviewResponse>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let reviews = repo.list_reviews_given(&current_user.id, &PaginationParams::new(page, limit)).await?;
    Ok(Json(reviews.iter().map(ReviewResponse::from).collect()))
}

/// Count, mean and star histogram for a user; defaults to the caller.
#[openapi(tag = "Reviews")]
#[get("/summary?<user_id>")]
pub async fn review_summary(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    user_id: Option<String>,
) -> Result<Json<ReviewSummaryResponse>, AppError> {
    let target = match user_id {
        Some(raw) => Uuid::parse_str(&raw).map_err(|e| AppError::uuid("Invalid user id", e))?,
        None => current_user.id,
    };

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let summary = RatingService::new(&repo).summary(&target).await?;
    Ok(Json(summary))
}

/// Completed trips the current user still has to review.
#[openapi(tag = "Reviews")]
#[get("/pending")]
pub async fn pending_reviews(pool: &State<PgPool>, current_user: CurrentUser) -> Result<Json<Vec<PendingReviewResponse>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let rows = RatingService::new(&repo).pending_reviews(&current_user).await?;
    Ok(Json(rows.iter().map(PendingReviewResponse::from).collect()))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![create_review, reviews_received, reviews_given, review_summary, pending_reviews]
}
