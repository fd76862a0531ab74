use crate::database::postgres_repository::{PostgresRepository, is_unique_violation};
use crate::error::app_error::AppError;
use crate::models::pagination::PaginationParams;
use crate::models::review::{PendingReviewRow, Review, ReviewCreateRequest, ReviewDetail};
use uuid::Uuid;

const REVIEW_COLUMNS: &str = r#"
    id, trip_id, reviewer_id, reviewed_user_id, rating, comment,
    punctuality_rating, cleanliness_rating, safety_rating, communication_rating,
    created_at
"#;

impl PostgresRepository {
    /// Plain insert; the (trip, reviewer) unique constraint is the backstop
    /// against two concurrent submissions from the same reviewer.
    pub async fn create_review(&self, reviewer_id: &Uuid, request: &ReviewCreateRequest) -> Result<Review, AppError> {
        let review = sqlx::query_as::<_, Review>(&format!(
            r#"
            INSERT INTO reviews (
                trip_id, reviewer_id, reviewed_user_id, rating, comment,
                punctuality_rating, cleanliness_rating, safety_rating, communication_rating
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(request.trip_id)
        .bind(reviewer_id)
        .bind(request.reviewed_user_id)
        .bind(request.rating)
        .bind(request.comment.clone().unwrap_or_default())
        .bind(request.punctuality_rating)
        .bind(request.cleanliness_rating)
        .bind(request.safety_rating)
        .bind(request.communication_rating)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::PreconditionFailed("you have already reviewed this trip".to_string())
            } else {
                AppError::from(e)
            }
        })?;

        Ok(review)
    }

    pub async fn get_review_for_trip_by_reviewer(&self, trip_id: &Uuid, reviewer_id: &Uuid) -> Result<Option<Review>, AppError> {
        let review = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE trip_id = $1 AND reviewer_id = $2"
        ))
        .bind(trip_id)
        .bind(reviewer_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(review)
    }

    pub async fn get_review_detail(&self, review_id: &Uuid) -> Result<Option<ReviewDetail>, AppError> {
        let detail = sqlx::query_as::<_, ReviewDetail>(
            r#"
            SELECT r.id, r.trip_id, r.reviewer_id, r.reviewed_user_id, r.rating, r.comment,
                   r.punctuality_rating, r.cleanliness_rating, r.safety_rating, r.communication_rating,
                   r.created_at,
                   ru.username AS reviewer_username,
                   du.username AS reviewed_username
            FROM reviews r
            JOIN users ru ON ru.id = r.reviewer_id
            JOIN users du ON du.id = r.reviewed_user_id
            WHERE r.id = $1
            "#,
        )
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(detail)
    }

    pub async fn list_reviews_received(&self, user_id: &Uuid, pagination: &PaginationParams) -> Result<Vec<ReviewDetail>, AppError> {
        self.list_reviews("r.reviewed_user_id = $1", user_id, pagination).await
    }

    pub async fn list_reviews_given(&self, user_id: &Uuid, pagination: &PaginationParams) -> Result<Vec<ReviewDetail>, AppError> {
        self.list_reviews("r.reviewer_id = $1", user_id, pagination).await
    }

    async fn list_reviews(&self, filter: &str, user_id: &Uuid, pagination: &PaginationParams) -> Result<Vec<ReviewDetail>, AppError> {
        let mut query = format!(
            r#"
            SELECT r.id, r.trip_id, r.reviewer_id, r.reviewed_user_id, r.rating, r.comment,
                   r.punctuality_rating, r.cleanliness_rating, r.safety_rating, r.communication_rating,
                   r.created_at,
                   ru.username AS reviewer_username,
                   du.username AS reviewed_username
            FROM reviews r
            JOIN users ru ON ru.id = r.reviewer_id
            JOIN users du ON du.id = r.reviewed_user_id
            WHERE {filter}
            ORDER BY r.created_at DESC
            "#
        );
        if let (Some(limit), Some(offset)) = (pagination.effective_limit(), pagination.offset()) {
            query.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
        }

        let reviews = sqlx::query_as::<_, ReviewDetail>(&query).bind(user_id).fetch_all(&self.pool).await?;

        Ok(reviews)
    }

    /// Every overall rating the user has received, role-independent; feeds
    /// the summary aggregation.
    pub async fn ratings_received(&self, user_id: &Uuid) -> Result<Vec<i32>, AppError> {
        let ratings = sqlx::query_scalar::<_, i32>("SELECT rating FROM reviews WHERE reviewed_user_id = $1")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(ratings)
    }

    /// Ratings the user received while acting as passenger on the reviewed
    /// trip.
    pub async fn ratings_received_as_passenger(&self, user_id: &Uuid) -> Result<Vec<i32>, AppError> {
        let ratings = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT r.rating
            FROM reviews r
            JOIN trips t ON t.id = r.trip_id
            WHERE r.reviewed_user_id = $1 AND t.passenger_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ratings)
    }

    /// Ratings the user received while acting as driver on the reviewed trip.
    pub async fn ratings_received_as_driver(&self, user_id: &Uuid) -> Result<Vec<i32>, AppError> {
        let ratings = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT r.rating
            FROM reviews r
            JOIN trips t ON t.id = r.trip_id
            WHERE r.reviewed_user_id = $1 AND t.driver_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ratings)
    }

    pub async fn set_passenger_average(&self, user_id: &Uuid, average: Option<f64>) -> Result<(), AppError> {
        sqlx::query("UPDATE passenger_profiles SET average_rating = $2, updated_at = now() WHERE user_id = $1")
            .bind(user_id)
            .bind(average)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn set_driver_average(&self, user_id: &Uuid, average: Option<f64>) -> Result<(), AppError> {
        sqlx::query("UPDATE driver_profiles SET average_rating = $2, updated_at = now() WHERE user_id = $1")
            .bind(user_id)
            .bind(average)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Completed trips the user participates in and has not reviewed yet,
    /// each with the counterpart still owed a review. Trips that never got a
    /// driver cannot appear because only in-progress trips complete.
    pub async fn list_pending_reviews(&self, user_id: &Uuid) -> Result<Vec<PendingReviewRow>, AppError> {
        let rows = sqlx::query_as::<_, PendingReviewRow>(
            r#"
            SELECT t.id AS trip_id,
                   t.start_location_name, t.end_location_name, t.completed_at,
                   c.id AS user_to_review_id,
                   c.username AS user_to_review_username
            FROM trips t
            JOIN users c ON c.id = CASE WHEN t.passenger_id = $1 THEN t.driver_id ELSE t.passenger_id END
            WHERE t.status = 'completed'
              AND (t.passenger_id = $1 OR t.driver_id = $1)
              AND NOT EXISTS (SELECT 1 FROM reviews r WHERE r.trip_id = t.id AND r.reviewer_id = $1)
            ORDER BY t.completed_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
