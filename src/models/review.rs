use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, FromRow)]
pub struct Review {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewed_user_id: Uuid,
    pub rating: i32,
    pub comment: String,
    pub punctuality_rating: Option<i32>,
    pub cleanliness_rating: Option<i32>,
    pub safety_rating: Option<i32>,
    pub communication_rating: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct ReviewCreateRequest {
    pub trip_id: Uuid,
    pub reviewed_user_id: Uuid,
    #[validate(range(min = 1, max = 5))]
    pub rating: i32,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
    #[validate(range(min = 1, max = 5))]
    pub punctuality_rating: Option<i32>,
    #[validate(range(min = 1, max = 5))]
    pub cleanliness_rating: Option<i32>,
    #[validate(range(min = 1, max = 5))]
    pub safety_rating: Option<i32>,
    #[validate(range(min = 1, max = 5))]
    pub communication_rating: Option<i32>,
}

/// Review row joined with the usernames of both parties.
#[derive(Debug, FromRow)]
pub struct ReviewDetail {
    #[sqlx(flatten)]
    pub review: Review,
    pub reviewer_username: String,
    pub reviewed_username: String,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub reviewer_id: Uuid,
    pub reviewer_username: String,
    pub reviewed_user_id: Uuid,
    pub reviewed_username: String,
    pub rating: i32,
    pub comment: String,
    pub punctuality_rating: Option<i32>,
    pub cleanliness_rating: Option<i32>,
    pub safety_rating: Option<i32>,
    pub communication_rating: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<&ReviewDetail> for ReviewResponse {
    fn from(detail: &ReviewDetail) -> Self {
        let review = &detail.review;
        ReviewResponse {
            id: review.id,
            trip_id: review.trip_id,
            reviewer_id: review.reviewer_id,
            reviewer_username: detail.reviewer_username.clone(),
            reviewed_user_id: review.reviewed_user_id,
            reviewed_username: detail.reviewed_username.clone(),
            rating: review.rating,
            comment: review.comment.clone(),
            punctuality_rating: review.punctuality_rating,
            cleanliness_rating: review.cleanliness_rating,
            safety_rating: review.safety_rating,
            communication_rating: review.communication_rating,
            created_at: review.created_at,
        }
    }
}

/// Count, mean and star histogram over all reviews a user has received,
/// independent of the role they were reviewed in.
#[derive(Serialize, Debug, PartialEq, JsonSchema)]
pub struct ReviewSummaryResponse {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub total_reviews: i64,
    pub average_rating: Option<f64>,
    pub five_star_count: i64,
    pub four_star_count: i64,
    pub three_star_count: i64,
    pub two_star_count: i64,
    pub one_star_count: i64,
}

/// A completed trip the current user still has to review, paired with the
/// counterpart waiting for that review.
#[derive(Serialize, Debug, JsonSchema)]
pub struct PendingReviewResponse {
    pub trip_id: Uuid,
    pub start_location_name: String,
    pub end_location_name: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub user_to_review_id: Uuid,
    pub user_to_review_username: String,
}

#[derive(Debug, FromRow)]
pub struct PendingReviewRow {
    pub trip_id: Uuid,
    pub start_location_name: String,
    pub end_location_name: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub user_to_review_id: Uuid,
    pub user_to_review_username: String,
}

impl From<&PendingReviewRow> for PendingReviewResponse {
    fn from(row: &PendingReviewRow) -> Self {
        PendingReviewResponse {
            trip_id: row.trip_id,
            start_location_name: row.start_location_name.clone(),
            end_location_name: row.end_location_name.clone(),
            completed_at: row.completed_at,
            user_to_review_id: row.user_to_review_id,
            user_to_review_username: row.user_to_review_username.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> ReviewCreateRequest {
        ReviewCreateRequest {
            trip_id: Uuid::new_v4(),
            reviewed_user_id: Uuid::new_v4(),
            rating: 5,
            comment: Some("smooth ride".to_string()),
            punctuality_rating: Some(4),
            cleanliness_rating: None,
            safety_rating: None,
            communication_rating: None,
        }
    }

    #[test]
    fn accepts_ratings_within_bounds() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_overall_rating() {
        let mut request = valid_request();
        request.rating = 0;
        assert!(request.validate().is_err());
        request.rating = 6;
        assert!(request.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_category_rating() {
        let mut request = valid_request();
        request.punctuality_rating = Some(0);
        assert!(request.validate().is_err());
    }
}
