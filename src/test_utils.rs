use crate::models::trip::{Trip, TripStatus};
use chrono::Utc;
use uuid::Uuid;

/// A trip in the given status with both participants assigned and the
/// timestamps the status implies.
pub fn sample_trip(status: TripStatus) -> Trip {
    let now = Utc::now();
    let reached = |s: TripStatus| -> bool {
        use TripStatus::*;
        matches!(
            (status, s),
            (Accepted | InProgress | Completed, Accepted) | (InProgress | Completed, InProgress) | (Completed, Completed)
        )
    };

    Trip {
        id: Uuid::new_v4(),
        passenger_id: Uuid::new_v4(),
        driver_id: Some(Uuid::new_v4()),
        start_location_name: "Hauptbahnhof".to_string(),
        start_latitude: 52.5251,
        start_longitude: 13.3694,
        end_location_name: "Tempelhofer Feld".to_string(),
        end_latitude: 52.4732,
        end_longitude: 13.4053,
        status,
        distance_km: Some(7.8),
        estimated_duration_minutes: Some(22),
        fare_cents: Some(1450),
        requested_at: now,
        accepted_at: reached(TripStatus::Accepted).then_some(now),
        started_at: reached(TripStatus::InProgress).then_some(now),
        completed_at: reached(TripStatus::Completed).then_some(now),
        cancelled_at: (status == TripStatus::Cancelled).then_some(now),
        passenger_notes: String::new(),
        driver_notes: String::new(),
        number_of_passengers: 1,
    }
}
