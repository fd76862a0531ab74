use crate::auth::CurrentUser;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::trip::{Trip, TripCreateRequest, TripDetail, TripStatus};
use uuid::Uuid;

/// Owns the trip state machine. Every transition is validated against a
/// freshly read row, then applied through a compare-and-swap update; a CAS
/// that matches no row after the validation passed means a concurrent writer
/// got there first and the caller lost the race.
pub struct TripService<'a> {
    repository: &'a PostgresRepository,
}

impl<'a> TripService<'a> {
    pub fn new(repository: &'a PostgresRepository) -> Self {
        TripService { repository }
    }

    pub async fn create(&self, actor: &CurrentUser, request: &TripCreateRequest) -> Result<TripDetail, AppError> {
        if !actor.role.includes_passenger() {
            return Err(AppError::Forbidden("only passengers can request trips".to_string()));
        }

        let trip = self.repository.create_trip(&actor.id, request).await?;
        self.detail(&trip.id).await
    }

    pub async fn accept(&self, actor: &CurrentUser, trip_id: &Uuid) -> Result<TripDetail, AppError> {
        if !actor.role.includes_driver() {
            return Err(AppError::Forbidden("only drivers can accept trips".to_string()));
        }

        let trip = self.load(trip_id).await?;
        ensure_status(&trip, TripStatus::Pending, "trip is not available for acceptance")?;

        match self.repository.accept_trip(trip_id, &actor.id).await? {
            Some(trip) => self.detail(&trip.id).await,
            None => Err(AppError::Conflict("trip is no longer available".to_string())),
        }
    }

    pub async fn start(&self, actor: &CurrentUser, trip_id: &Uuid) -> Result<TripDetail, AppError> {
        let trip = self.load(trip_id).await?;
        ensure_assigned_driver(&trip, &actor.id, "only the assigned driver can start this trip")?;
        ensure_status(&trip, TripStatus::Accepted, "trip must be accepted before starting")?;

        match self.repository.start_trip(trip_id, &actor.id).await? {
            Some(trip) => self.detail(&trip.id).await,
            None => Err(AppError::Conflict("trip state changed, please refresh".to_string())),
        }
    }

    pub async fn complete(&self, actor: &CurrentUser, trip_id: &Uuid) -> Result<TripDetail, AppError> {
        let trip = self.load(trip_id).await?;
        ensure_assigned_driver(&trip, &actor.id, "only the assigned driver can complete this trip")?;
        ensure_status(&trip, TripStatus::InProgress, "trip must be in progress to complete")?;

        match self.repository.complete_trip(trip_id, &actor.id).await? {
            Some(trip) => self.detail(&trip.id).await,
            None => Err(AppError::Conflict("trip state changed, please refresh".to_string())),
        }
    }

    pub async fn cancel(&self, actor: &CurrentUser, trip_id: &Uuid) -> Result<TripDetail, AppError> {
        let trip = self.load(trip_id).await?;
        ensure_participant(&trip, &actor.id, "only the passenger or the assigned driver can cancel this trip")?;
        ensure_cancellable(&trip)?;

        match self.repository.cancel_trip(trip_id).await? {
            Some(trip) => self.detail(&trip.id).await,
            None => Err(AppError::Conflict("trip state changed, please refresh".to_string())),
        }
    }

    pub async fn set_notes(&self, actor: &CurrentUser, trip_id: &Uuid, notes: &str) -> Result<TripDetail, AppError> {
        let trip = self.load(trip_id).await?;
        ensure_participant(&trip, &actor.id, "only trip participants can attach notes")?;

        let as_driver = trip.driver_id.as_ref() == Some(&actor.id);
        match self.repository.set_trip_notes(trip_id, as_driver, notes).await? {
            Some(trip) => self.detail(&trip.id).await,
            None => Err(AppError::NotFound("Trip not found".to_string())),
        }
    }

    /// Participants see the full trip; everyone else gets a 404 rather than
    /// a confirmation the trip exists.
    pub async fn get_for_participant(&self, actor: &CurrentUser, trip_id: &Uuid) -> Result<TripDetail, AppError> {
        let detail = self
            .repository
            .get_trip_detail(trip_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Trip not found".to_string()))?;

        if !detail.trip.is_participant(&actor.id) {
            return Err(AppError::NotFound("Trip not found".to_string()));
        }

        Ok(detail)
    }

    async fn load(&self, trip_id: &Uuid) -> Result<Trip, AppError> {
        self.repository
            .get_trip_by_id(trip_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Trip not found".to_string()))
    }

    async fn detail(&self, trip_id: &Uuid) -> Result<TripDetail, AppError> {
        self.repository
            .get_trip_detail(trip_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Trip not found".to_string()))
    }
}

fn ensure_status(trip: &Trip, expected: TripStatus, message: &str) -> Result<(), AppError> {
    if trip.status != expected {
        return Err(AppError::PreconditionFailed(message.to_string()));
    }
    Ok(())
}

fn ensure_cancellable(trip: &Trip) -> Result<(), AppError> {
    if trip.status.is_terminal() {
        return Err(AppError::PreconditionFailed(
            "cannot cancel a completed or already cancelled trip".to_string(),
        ));
    }
    Ok(())
}

fn ensure_assigned_driver(trip: &Trip, actor_id: &Uuid, message: &str) -> Result<(), AppError> {
    if trip.driver_id.as_ref() != Some(actor_id) {
        return Err(AppError::Forbidden(message.to_string()));
    }
    Ok(())
}

fn ensure_participant(trip: &Trip, actor_id: &Uuid, message: &str) -> Result<(), AppError> {
    if !trip.is_participant(actor_id) {
        return Err(AppError::Forbidden(message.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_trip;

    #[test]
    fn accept_requires_pending() {
        let trip = sample_trip(TripStatus::Accepted);
        let err = ensure_status(&trip, TripStatus::Pending, "trip is not available for acceptance").unwrap_err();
        assert!(matches!(err, AppError::PreconditionFailed(_)));
    }

    #[test]
    fn cancel_rejects_terminal_states() {
        let completed = sample_trip(TripStatus::Completed);
        assert!(matches!(ensure_cancellable(&completed), Err(AppError::PreconditionFailed(_))));

        let cancelled = sample_trip(TripStatus::Cancelled);
        assert!(matches!(ensure_cancellable(&cancelled), Err(AppError::PreconditionFailed(_))));

        for status in [TripStatus::Pending, TripStatus::Accepted, TripStatus::InProgress] {
            assert!(ensure_cancellable(&sample_trip(status)).is_ok());
        }
    }

    #[test]
    fn only_assigned_driver_passes_driver_guard() {
        let trip = sample_trip(TripStatus::Accepted);
        let driver_id = trip.driver_id.unwrap();
        assert!(ensure_assigned_driver(&trip, &driver_id, "nope").is_ok());

        let stranger = Uuid::new_v4();
        assert!(matches!(ensure_assigned_driver(&trip, &stranger, "nope"), Err(AppError::Forbidden(_))));

        let passenger = trip.passenger_id;
        assert!(matches!(ensure_assigned_driver(&trip, &passenger, "nope"), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn both_parties_pass_participant_guard() {
        let trip = sample_trip(TripStatus::InProgress);
        assert!(ensure_participant(&trip, &trip.passenger_id, "nope").is_ok());
        assert!(ensure_participant(&trip, &trip.driver_id.unwrap(), "nope").is_ok());
        assert!(matches!(
            ensure_participant(&trip, &Uuid::new_v4(), "nope"),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn pending_trip_has_no_driver_to_guard() {
        let mut trip = sample_trip(TripStatus::Pending);
        trip.driver_id = None;
        assert!(matches!(
            ensure_assigned_driver(&trip, &trip.passenger_id, "nope"),
            Err(AppError::Forbidden(_))
        ));
    }
}
