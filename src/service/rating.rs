use crate::auth::CurrentUser;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::review::{PendingReviewRow, ReviewCreateRequest, ReviewDetail, ReviewSummaryResponse};
use crate::models::trip::{Trip, TripStatus};
use uuid::Uuid;

/// Owns review creation and the cached per-role rating averages. Persisting
/// a review and refreshing the reviewed user's average are two explicit
/// steps so the derived value never hides inside a save hook.
pub struct RatingService<'a> {
    repository: &'a PostgresRepository,
}

impl<'a> RatingService<'a> {
    pub fn new(repository: &'a PostgresRepository) -> Self {
        RatingService { repository }
    }

    pub async fn record_review(&self, actor: &CurrentUser, request: &ReviewCreateRequest) -> Result<ReviewDetail, AppError> {
        let trip = self
            .repository
            .get_trip_by_id(&request.trip_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Trip not found".to_string()))?;

        if trip.status != TripStatus::Completed {
            return Err(AppError::PreconditionFailed("only completed trips can be reviewed".to_string()));
        }

        let Some(expected) = counterpart(&trip, &actor.id) else {
            return Err(AppError::Forbidden("you can only review trips you were part of".to_string()));
        };

        if request.reviewed_user_id == actor.id {
            return Err(AppError::PreconditionFailed("you cannot review yourself".to_string()));
        }
        if request.reviewed_user_id != expected {
            return Err(AppError::PreconditionFailed(
                "you can only review the other party of the trip".to_string(),
            ));
        }

        if self
            .repository
            .get_review_for_trip_by_reviewer(&request.trip_id, &actor.id)
            .await?
            .is_some()
        {
            return Err(AppError::PreconditionFailed("you have already reviewed this trip".to_string()));
        }

        let review = self.repository.create_review(&actor.id, request).await?;

        // Step two: refresh the cached average for the role the reviewed
        // user held on this trip.
        self.refresh_role_average(&trip, &request.reviewed_user_id).await?;

        self.repository
            .get_review_detail(&review.id)
            .await?
            .ok_or_else(|| AppError::NotFound("Review not found".to_string()))
    }

    async fn refresh_role_average(&self, trip: &Trip, reviewed_user_id: &Uuid) -> Result<(), AppError> {
        if *reviewed_user_id == trip.passenger_id {
            let ratings = self.repository.ratings_received_as_passenger(reviewed_user_id).await?;
            self.repository.set_passenger_average(reviewed_user_id, mean_rating(&ratings)).await?;
        } else {
            let ratings = self.repository.ratings_received_as_driver(reviewed_user_id).await?;
            self.repository.set_driver_average(reviewed_user_id, mean_rating(&ratings)).await?;
        }
        Ok(())
    }

    pub async fn summary(&self, user_id: &Uuid) -> Result<ReviewSummaryResponse, AppError> {
        let user = self
            .repository
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let ratings = self.repository.ratings_received(user_id).await?;
        Ok(build_summary(user.id, Some(user.username), &ratings))
    }

    pub async fn pending_reviews(&self, actor: &CurrentUser) -> Result<Vec<PendingReviewRow>, AppError> {
        self.repository.list_pending_reviews(&actor.id).await
    }
}

/// The party the actor is allowed to review on this trip: the passenger
/// reviews the driver and vice versa. `None` when the actor is not a
/// participant, or when the trip never got a driver.
pub fn counterpart(trip: &Trip, actor_id: &Uuid) -> Option<Uuid> {
    if *actor_id == trip.passenger_id {
        trip.driver_id
    } else if trip.driver_id.as_ref() == Some(actor_id) {
        Some(trip.passenger_id)
    } else {
        None
    }
}

/// Arithmetic mean rounded to two decimals; `None` for an empty slice so a
/// user with no reviews keeps an unset average instead of a fake zero.
pub fn mean_rating(ratings: &[i32]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let sum: i64 = ratings.iter().map(|r| *r as i64).sum();
    Some(round2(sum as f64 / ratings.len() as f64))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn build_summary(user_id: Uuid, username: Option<String>, ratings: &[i32]) -> ReviewSummaryResponse {
    let mut buckets = [0i64; 5];
    for rating in ratings {
        if (1..=5).contains(rating) {
            buckets[(*rating - 1) as usize] += 1;
        }
    }

    ReviewSummaryResponse {
        user_id,
        username,
        total_reviews: ratings.len() as i64,
        average_rating: mean_rating(ratings),
        five_star_count: buckets[4],
        four_star_count: buckets[3],
        three_star_count: buckets[2],
        two_star_count: buckets[1],
        one_star_count: buckets[0],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_trip;

    #[test]
    fn counterpart_is_role_symmetric() {
        let trip = sample_trip(TripStatus::Completed);
        let passenger = trip.passenger_id;
        let driver = trip.driver_id.unwrap();

        assert_eq!(counterpart(&trip, &passenger), Some(driver));
        assert_eq!(counterpart(&trip, &driver), Some(passenger));
    }

    #[test]
    fn counterpart_rejects_strangers() {
        let trip = sample_trip(TripStatus::Completed);
        assert_eq!(counterpart(&trip, &Uuid::new_v4()), None);
    }

    #[test]
    fn counterpart_is_none_without_driver() {
        let mut trip = sample_trip(TripStatus::Pending);
        trip.driver_id = None;
        assert_eq!(counterpart(&trip, &trip.passenger_id), None);
    }

    #[test]
    fn mean_rating_handles_first_review_and_rounding() {
        assert_eq!(mean_rating(&[]), None);
        assert_eq!(mean_rating(&[4]), Some(4.0));
        assert_eq!(mean_rating(&[5, 4]), Some(4.5));
        assert_eq!(mean_rating(&[4, 4, 5]), Some(4.33));
        assert_eq!(mean_rating(&[5, 5, 4, 3, 5]), Some(4.4));
    }

    #[test]
    fn summary_builds_star_histogram() {
        let user_id = Uuid::new_v4();
        let summary = build_summary(user_id, Some("lena".to_string()), &[5, 5, 4, 3, 5]);

        assert_eq!(summary.total_reviews, 5);
        assert_eq!(summary.average_rating, Some(4.4));
        assert_eq!(summary.five_star_count, 3);
        assert_eq!(summary.four_star_count, 1);
        assert_eq!(summary.three_star_count, 1);
        assert_eq!(summary.two_star_count, 0);
        assert_eq!(summary.one_star_count, 0);
    }

    #[test]
    fn summary_for_no_reviews_is_zero_filled() {
        let user_id = Uuid::new_v4();
        let summary = build_summary(user_id, None, &[]);

        assert_eq!(summary.total_reviews, 0);
        assert_eq!(summary.average_rating, None);
        assert_eq!(summary.five_star_count, 0);
        assert_eq!(summary.one_star_count, 0);
    }
}
