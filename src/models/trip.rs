use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Default, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "trip_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    #[default]
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }

    /// Legal lifecycle edges. Everything not listed here is rejected with
    /// a precondition failure before any write happens.
    pub fn can_transition_to(self, next: TripStatus) -> bool {
        use TripStatus::*;
        match (self, next) {
            (Pending, Accepted) => true,
            (Accepted, InProgress) => true,
            (InProgress, Completed) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Parses the wire form used in query strings.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TripStatus::Pending),
            "accepted" => Some(TripStatus::Accepted),
            "in_progress" => Some(TripStatus::InProgress),
            "completed" => Some(TripStatus::Completed),
            "cancelled" => Some(TripStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TripStatus::Pending => "pending",
            TripStatus::Accepted => "accepted",
            TripStatus::InProgress => "in_progress",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Trip {
    pub id: Uuid,
    pub passenger_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub start_location_name: String,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_location_name: String,
    pub end_latitude: f64,
    pub end_longitude: f64,
    pub status: TripStatus,
    pub distance_km: Option<f64>,
    pub estimated_duration_minutes: Option<i32>,
    pub fare_cents: Option<i64>,
    pub requested_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub passenger_notes: String,
    pub driver_notes: String,
    pub number_of_passengers: i32,
}

impl Trip {
    pub fn is_participant(&self, user_id: &Uuid) -> bool {
        self.passenger_id == *user_id || self.driver_id.as_ref() == Some(user_id)
    }
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct TripCreateRequest {
    #[validate(length(min = 1, max = 255))]
    pub start_location_name: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub start_latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub start_longitude: f64,
    #[validate(length(min = 1, max = 255))]
    pub end_location_name: String,
    #[validate(range(min = -90.0, max = 90.0))]
    pub end_latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub end_longitude: f64,
    #[serde(default)]
    pub passenger_notes: Option<String>,
    #[validate(range(min = 1))]
    #[serde(default = "default_passenger_count")]
    pub number_of_passengers: i32,
}

fn default_passenger_count() -> i32 {
    1
}

/// Free-text notes from one trip party; which column is written depends on
/// the caller's role in the trip.
#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct TripNotesRequest {
    #[validate(length(max = 2000))]
    pub notes: String,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct TripResponse {
    pub id: Uuid,
    pub passenger_id: Uuid,
    pub passenger_username: String,
    pub driver_id: Option<Uuid>,
    pub driver_username: Option<String>,
    pub start_location_name: String,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_location_name: String,
    pub end_latitude: f64,
    pub end_longitude: f64,
    pub status: TripStatus,
    pub distance_km: Option<f64>,
    pub estimated_duration_minutes: Option<i32>,
    pub fare_cents: Option<i64>,
    pub requested_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub passenger_notes: String,
    pub driver_notes: String,
    pub number_of_passengers: i32,
}

/// Trip row joined with the participants' usernames.
#[derive(Debug, Clone, FromRow)]
pub struct TripDetail {
    #[sqlx(flatten)]
    pub trip: Trip,
    pub passenger_username: String,
    pub driver_username: Option<String>,
}

impl From<&TripDetail> for TripResponse {
    fn from(detail: &TripDetail) -> Self {
        let trip = &detail.trip;
        TripResponse {
            id: trip.id,
            passenger_id: trip.passenger_id,
            passenger_username: detail.passenger_username.clone(),
            driver_id: trip.driver_id,
            driver_username: detail.driver_username.clone(),
            start_location_name: trip.start_location_name.clone(),
            start_latitude: trip.start_latitude,
            start_longitude: trip.start_longitude,
            end_location_name: trip.end_location_name.clone(),
            end_latitude: trip.end_latitude,
            end_longitude: trip.end_longitude,
            status: trip.status,
            distance_km: trip.distance_km,
            estimated_duration_minutes: trip.estimated_duration_minutes,
            fare_cents: trip.fare_cents,
            requested_at: trip.requested_at,
            accepted_at: trip.accepted_at,
            started_at: trip.started_at,
            completed_at: trip.completed_at,
            cancelled_at: trip.cancelled_at,
            passenger_notes: trip.passenger_notes.clone(),
            driver_notes: trip.driver_notes.clone(),
            number_of_passengers: trip.number_of_passengers,
        }
    }
}

/// Simplified row for the completed-trip history listing, with flags telling
/// the client which side has already submitted its review.
#[derive(Debug, FromRow)]
pub struct TripHistoryRow {
    pub id: Uuid,
    pub passenger_username: String,
    pub driver_username: Option<String>,
    pub start_location_name: String,
    pub end_location_name: String,
    pub status: TripStatus,
    pub distance_km: Option<f64>,
    pub fare_cents: Option<i64>,
    pub requested_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub has_passenger_review: bool,
    pub has_driver_review: bool,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct TripHistoryResponse {
    pub id: Uuid,
    pub passenger_username: String,
    pub driver_username: Option<String>,
    pub start_location_name: String,
    pub end_location_name: String,
    pub status: TripStatus,
    pub distance_km: Option<f64>,
    pub fare_cents: Option<i64>,
    pub requested_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub has_passenger_review: bool,
    pub has_driver_review: bool,
}

impl From<&TripHistoryRow> for TripHistoryResponse {
    fn from(row: &TripHistoryRow) -> Self {
        TripHistoryResponse {
            id: row.id,
            passenger_username: row.passenger_username.clone(),
            driver_username: row.driver_username.clone(),
            start_location_name: row.start_location_name.clone(),
            end_location_name: row.end_location_name.clone(),
            status: row.status,
            distance_km: row.distance_km,
            fare_cents: row.fare_cents,
            requested_at: row.requested_at,
            completed_at: row.completed_at,
            has_passenger_review: row.has_passenger_review,
            has_driver_review: row.has_driver_review,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use validator::Validate;

    const ALL: [TripStatus; 5] = [
        TripStatus::Pending,
        TripStatus::Accepted,
        TripStatus::InProgress,
        TripStatus::Completed,
        TripStatus::Cancelled,
    ];

    #[test]
    fn happy_path_edges_are_legal() {
        assert!(TripStatus::Pending.can_transition_to(TripStatus::Accepted));
        assert!(TripStatus::Accepted.can_transition_to(TripStatus::InProgress));
        assert!(TripStatus::InProgress.can_transition_to(TripStatus::Completed));
    }

    #[test]
    fn cancel_is_legal_from_every_non_terminal_state() {
        assert!(TripStatus::Pending.can_transition_to(TripStatus::Cancelled));
        assert!(TripStatus::Accepted.can_transition_to(TripStatus::Cancelled));
        assert!(TripStatus::InProgress.can_transition_to(TripStatus::Cancelled));
        assert!(!TripStatus::Completed.can_transition_to(TripStatus::Cancelled));
        assert!(!TripStatus::Cancelled.can_transition_to(TripStatus::Cancelled));
    }

    #[test]
    fn skipping_states_is_illegal() {
        assert!(!TripStatus::Pending.can_transition_to(TripStatus::InProgress));
        assert!(!TripStatus::Pending.can_transition_to(TripStatus::Completed));
        assert!(!TripStatus::Accepted.can_transition_to(TripStatus::Completed));
    }

    #[test]
    fn going_backwards_is_illegal() {
        assert!(!TripStatus::Accepted.can_transition_to(TripStatus::Pending));
        assert!(!TripStatus::InProgress.can_transition_to(TripStatus::Accepted));
        assert!(!TripStatus::Completed.can_transition_to(TripStatus::InProgress));
    }

    proptest! {
        #[test]
        fn terminal_states_have_no_outgoing_edges(from in 0usize..ALL.len(), to in 0usize..ALL.len()) {
            let (from, to) = (ALL[from], ALL[to]);
            if from.is_terminal() {
                prop_assert!(!from.can_transition_to(to));
            }
        }

        #[test]
        fn only_the_five_documented_edges_exist(from in 0usize..ALL.len(), to in 0usize..ALL.len()) {
            let (from, to) = (ALL[from], ALL[to]);
            let documented = matches!(
                (from, to),
                (TripStatus::Pending, TripStatus::Accepted)
                    | (TripStatus::Accepted, TripStatus::InProgress)
                    | (TripStatus::InProgress, TripStatus::Completed)
                    | (TripStatus::Pending, TripStatus::Cancelled)
                    | (TripStatus::Accepted, TripStatus::Cancelled)
                    | (TripStatus::InProgress, TripStatus::Cancelled)
            );
            prop_assert_eq!(from.can_transition_to(to), documented);
        }
    }

    fn valid_request() -> TripCreateRequest {
        TripCreateRequest {
            start_location_name: "Alexanderplatz".to_string(),
            start_latitude: 52.5219,
            start_longitude: 13.4132,
            end_location_name: "Tegel".to_string(),
            end_latitude: 52.5588,
            end_longitude: 13.2884,
            passenger_notes: None,
            number_of_passengers: 1,
        }
    }

    #[test]
    fn create_request_accepts_valid_input() {
        assert!(valid_request().validate().is_ok());
    }

    #[test]
    fn create_request_rejects_zero_passengers() {
        let mut request = valid_request();
        request.number_of_passengers = 0;
        assert!(request.validate().is_err());
    }

    #[test]
    fn create_request_rejects_out_of_range_coordinates() {
        let mut request = valid_request();
        request.start_latitude = 91.0;
        assert!(request.validate().is_err());

        let mut request = valid_request();
        request.end_longitude = -180.5;
        assert!(request.validate().is_err());
    }
}
