use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::pagination::PaginationParams;
use crate::models::trip::{Trip, TripCreateRequest, TripDetail, TripHistoryRow, TripStatus};
use crate::models::user::UserRole;
use uuid::Uuid;

const TRIP_COLUMNS: &str = r#"
    id, passenger_id, driver_id,
    start_location_name, start_latitude, start_longitude,
    end_location_name, end_latitude, end_longitude,
    status, distance_km, estimated_duration_minutes, fare_cents,
    requested_at, accepted_at, started_at, completed_at, cancelled_at,
    passenger_notes, driver_notes, number_of_passengers
"#;

const TRIP_DETAIL_COLUMNS: &str = r#"
    t.id, t.passenger_id, t.driver_id,
    t.start_location_name, t.start_latitude, t.start_longitude,
    t.end_location_name, t.end_latitude, t.end_longitude,
    t.status, t.distance_km, t.estimated_duration_minutes, t.fare_cents,
    t.requested_at, t.accepted_at, t.started_at, t.completed_at, t.cancelled_at,
    t.passenger_notes, t.driver_notes, t.number_of_passengers,
    p.username AS passenger_username,
    d.username AS driver_username
"#;

const TRIP_DETAIL_JOINS: &str = r#"
    FROM trips t
    JOIN users p ON p.id = t.passenger_id
    LEFT JOIN users d ON d.id = t.driver_id
"#;

impl PostgresRepository {
    pub async fn create_trip(&self, passenger_id: &Uuid, request: &TripCreateRequest) -> Result<Trip, AppError> {
        let trip = sqlx::query_as::<_, Trip>(&format!(
            r#"
            INSERT INTO trips (
                passenger_id,
                start_location_name, start_latitude, start_longitude,
                end_location_name, end_latitude, end_longitude,
                passenger_notes, number_of_passengers
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {TRIP_COLUMNS}
            "#
        ))
        .bind(passenger_id)
        .bind(&request.start_location_name)
        .bind(request.start_latitude)
        .bind(request.start_longitude)
        .bind(&request.end_location_name)
        .bind(request.end_latitude)
        .bind(request.end_longitude)
        .bind(request.passenger_notes.clone().unwrap_or_default())
        .bind(request.number_of_passengers)
        .fetch_one(&self.pool)
        .await?;

        Ok(trip)
    }

    pub async fn get_trip_by_id(&self, id: &Uuid) -> Result<Option<Trip>, AppError> {
        let trip = sqlx::query_as::<_, Trip>(&format!("SELECT {TRIP_COLUMNS} FROM trips WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(trip)
    }

    pub async fn get_trip_detail(&self, id: &Uuid) -> Result<Option<TripDetail>, AppError> {
        let detail = sqlx::query_as::<_, TripDetail>(&format!("SELECT {TRIP_DETAIL_COLUMNS} {TRIP_DETAIL_JOINS} WHERE t.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(detail)
    }

    /// Trips the user participates in, newest first, optionally narrowed to
    /// one status.
    pub async fn list_trips_for_user(
        &self,
        user_id: &Uuid,
        status: Option<TripStatus>,
        pagination: &PaginationParams,
    ) -> Result<Vec<TripDetail>, AppError> {
        let mut query = format!(
            "SELECT {TRIP_DETAIL_COLUMNS} {TRIP_DETAIL_JOINS} WHERE (t.passenger_id = $1 OR t.driver_id = $1) AND ($2::trip_status IS NULL OR t.status = $2) ORDER BY t.created_at DESC"
        );
        append_pagination(&mut query, pagination);

        let trips = sqlx::query_as::<_, TripDetail>(&query)
            .bind(user_id)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(trips)
    }

    /// Active (non-terminal) trips the user participates in.
    pub async fn list_active_trips_for_user(&self, user_id: &Uuid) -> Result<Vec<TripDetail>, AppError> {
        let trips = sqlx::query_as::<_, TripDetail>(&format!(
            r#"
            SELECT {TRIP_DETAIL_COLUMNS} {TRIP_DETAIL_JOINS}
            WHERE (t.passenger_id = $1 OR t.driver_id = $1)
              AND t.status NOT IN ('completed', 'cancelled')
            ORDER BY t.created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(trips)
    }

    /// Pending trips with no driver yet; what drivers browse to pick work.
    pub async fn list_pending_trips(&self, pagination: &PaginationParams) -> Result<Vec<TripDetail>, AppError> {
        let mut query = format!("SELECT {TRIP_DETAIL_COLUMNS} {TRIP_DETAIL_JOINS} WHERE t.status = 'pending' ORDER BY t.requested_at ASC");
        append_pagination(&mut query, pagination);

        let trips = sqlx::query_as::<_, TripDetail>(&query).fetch_all(&self.pool).await?;

        Ok(trips)
    }

    /// Completed-trip history with per-side review flags. `role` narrows to
    /// trips where the user held that role; `None` includes both sides.
    pub async fn list_trip_history(
        &self,
        user_id: &Uuid,
        role: Option<UserRole>,
        pagination: &PaginationParams,
    ) -> Result<Vec<TripHistoryRow>, AppError> {
        let role_filter = match role {
            Some(UserRole::Passenger) => "t.passenger_id = $1",
            Some(UserRole::Driver) => "t.driver_id = $1",
            _ => "(t.passenger_id = $1 OR t.driver_id = $1)",
        };

        let mut query = format!(
            r#"
            SELECT t.id,
                   p.username AS passenger_username,
                   d.username AS driver_username,
                   t.start_location_name, t.end_location_name,
                   t.status, t.distance_km, t.fare_cents,
                   t.requested_at, t.completed_at,
                   EXISTS (SELECT 1 FROM reviews r WHERE r.trip_id = t.id AND r.reviewer_id = t.passenger_id) AS has_passenger_review,
                   EXISTS (SELECT 1 FROM reviews r WHERE r.trip_id = t.id AND r.reviewer_id = t.driver_id) AS has_driver_review
            FROM trips t
            JOIN users p ON p.id = t.passenger_id
            LEFT JOIN users d ON d.id = t.driver_id
            WHERE t.status = 'completed' AND {role_filter}
            ORDER BY t.completed_at DESC
            "#
        );
        append_pagination(&mut query, pagination);

        let rows = sqlx::query_as::<_, TripHistoryRow>(&query).bind(user_id).fetch_all(&self.pool).await?;

        Ok(rows)
    }

    /// Compare-and-swap acceptance: only a still-pending, still-unassigned
    /// trip can be taken. Returns `None` when the guard no longer holds,
    /// which the service layer reports as a lost race.
    pub async fn accept_trip(&self, trip_id: &Uuid, driver_id: &Uuid) -> Result<Option<Trip>, AppError> {
        let trip = sqlx::query_as::<_, Trip>(&format!(
            r#"
            UPDATE trips
            SET driver_id = $2, status = 'accepted', accepted_at = now(), updated_at = now()
            WHERE id = $1 AND status = 'pending' AND driver_id IS NULL
            RETURNING {TRIP_COLUMNS}
            "#
        ))
        .bind(trip_id)
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(trip)
    }

    pub async fn start_trip(&self, trip_id: &Uuid, driver_id: &Uuid) -> Result<Option<Trip>, AppError> {
        let trip = sqlx::query_as::<_, Trip>(&format!(
            r#"
            UPDATE trips
            SET status = 'in_progress', started_at = now(), updated_at = now()
            WHERE id = $1 AND status = 'accepted' AND driver_id = $2
            RETURNING {TRIP_COLUMNS}
            "#
        ))
        .bind(trip_id)
        .bind(driver_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(trip)
    }

    /// Completion is a single transaction: the status CAS plus one counter
    /// increment per participant. The CAS guarantees the counters can never
    /// be incremented twice for the same trip.
    pub async fn complete_trip(&self, trip_id: &Uuid, driver_id: &Uuid) -> Result<Option<Trip>, AppError> {
        let mut tx = self.pool.begin().await?;

        let trip = sqlx::query_as::<_, Trip>(&format!(
            r#"
            UPDATE trips
            SET status = 'completed', completed_at = now(), updated_at = now()
            WHERE id = $1 AND status = 'in_progress' AND driver_id = $2
            RETURNING {TRIP_COLUMNS}
            "#
        ))
        .bind(trip_id)
        .bind(driver_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(trip) = trip else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query("UPDATE passenger_profiles SET total_trips = total_trips + 1, updated_at = now() WHERE user_id = $1")
            .bind(trip.passenger_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE driver_profiles SET total_trips = total_trips + 1, updated_at = now() WHERE user_id = $1")
            .bind(driver_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(trip))
    }

    /// Cancellation CAS: any non-terminal status qualifies. Participant
    /// authorization happens in the service layer before this runs.
    pub async fn cancel_trip(&self, trip_id: &Uuid) -> Result<Option<Trip>, AppError> {
        let trip = sqlx::query_as::<_, Trip>(&format!(
            r#"
            UPDATE trips
            SET status = 'cancelled', cancelled_at = now(), updated_at = now()
            WHERE id = $1 AND status IN ('pending', 'accepted', 'in_progress')
            RETURNING {TRIP_COLUMNS}
            "#
        ))
        .bind(trip_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(trip)
    }

    /// Writes the caller's side of the free-text notes.
    pub async fn set_trip_notes(&self, trip_id: &Uuid, as_driver: bool, notes: &str) -> Result<Option<Trip>, AppError> {
        let column = if as_driver { "driver_notes" } else { "passenger_notes" };
        let trip = sqlx::query_as::<_, Trip>(&format!(
            "UPDATE trips SET {column} = $2, updated_at = now() WHERE id = $1 RETURNING {TRIP_COLUMNS}"
        ))
        .bind(trip_id)
        .bind(notes)
        .fetch_optional(&self.pool)
        .await?;

        Ok(trip)
    }
}

fn append_pagination(query: &mut String, pagination: &PaginationParams) {
    if let (Some(limit), Some(offset)) = (pagination.effective_limit(), pagination.offset()) {
        query.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
    }
}
