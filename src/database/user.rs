use crate::database::postgres_repository::{PostgresRepository, is_unique_violation};
use crate::error::app_error::AppError;
use crate::models::user::{
    AvailableDriverRow, DriverProfile, DriverProfileRequest, PassengerProfile, RegisterRequest, User, UserUpdateRequest,
};
use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordVerifier, Salt, SaltString};
use std::sync::LazyLock;
use uuid::Uuid;

/// A real Argon2 hash generated once at startup, used as a timing decoy
/// so that login requests for non-existent users take the same time as
/// requests for existing users.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    PasswordHash::generate(Argon2::default(), b"dummy-never-matches", Salt::from(&salt))
        .expect("failed to generate dummy hash")
        .to_string()
});

const USER_COLUMNS: &str = "id, username, email, password_hash, role, phone_number, date_of_birth, is_active, created_at";

impl PostgresRepository {
    /// Inserts the user row and whichever role profiles the account needs,
    /// in one transaction.
    pub async fn create_user(&self, request: &RegisterRequest) -> Result<User, AppError> {
        let password_hash = hash_password(&request.password)?;

        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, role, phone_number, date_of_birth)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, username, email, password_hash, role, phone_number, date_of_birth, is_active, created_at
            "#,
        )
        .bind(&request.username)
        .bind(&request.email)
        .bind(&password_hash)
        .bind(request.role)
        .bind(&request.phone_number)
        .bind(request.date_of_birth)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::UserAlreadyExists(request.username.clone())
            } else {
                AppError::from(e)
            }
        })?;

        if request.role.includes_passenger() {
            let profile = request.passenger_profile.as_ref();
            sqlx::query(
                r#"
                INSERT INTO passenger_profiles (user_id, preferred_payment_method, emergency_contact_name, emergency_contact_phone)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(user.id)
            .bind(profile.and_then(|p| p.preferred_payment_method).unwrap_or_default())
            .bind(profile.and_then(|p| p.emergency_contact_name.clone()))
            .bind(profile.and_then(|p| p.emergency_contact_phone.clone()))
            .execute(&mut *tx)
            .await?;
        }

        if request.role.includes_driver() {
            // Presence is guaranteed by request validation.
            let profile = request
                .driver_profile
                .as_ref()
                .ok_or_else(|| AppError::BadRequest("driver profile is required".to_string()))?;
            self.insert_driver_profile(&mut tx, &user.id, profile).await?;
        }

        tx.commit().await?;
        Ok(user)
    }

    async fn insert_driver_profile(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: &Uuid,
        profile: &DriverProfileRequest,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO driver_profiles (
                user_id, license_number, license_expiry,
                vehicle_make, vehicle_model, vehicle_year, vehicle_color,
                vehicle_plate_number, vehicle_capacity,
                insurance_number, insurance_expiry
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user_id)
        .bind(&profile.license_number)
        .bind(profile.license_expiry)
        .bind(&profile.vehicle_make)
        .bind(&profile.vehicle_model)
        .bind(profile.vehicle_year)
        .bind(&profile.vehicle_color)
        .bind(&profile.vehicle_plate_number)
        .bind(profile.vehicle_capacity)
        .bind(&profile.insurance_number)
        .bind(profile.insurance_expiry)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("license or plate number already registered".to_string())
            } else {
                AppError::from(e)
            }
        })?;

        Ok(())
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn get_passenger_profile(&self, user_id: &Uuid) -> Result<Option<PassengerProfile>, AppError> {
        let profile = sqlx::query_as::<_, PassengerProfile>(
            r#"
            SELECT user_id, preferred_payment_method, emergency_contact_name, emergency_contact_phone, total_trips, average_rating
            FROM passenger_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    pub async fn get_driver_profile(&self, user_id: &Uuid) -> Result<Option<DriverProfile>, AppError> {
        let profile = sqlx::query_as::<_, DriverProfile>(
            r#"
            SELECT user_id, license_number, license_expiry,
                   vehicle_make, vehicle_model, vehicle_year, vehicle_color,
                   vehicle_plate_number, vehicle_capacity,
                   insurance_number, insurance_expiry,
                   is_verified, is_available, total_trips, average_rating
            FROM driver_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    pub async fn update_user(&self, id: &Uuid, request: &UserUpdateRequest) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET email = COALESCE($1, email),
                phone_number = COALESCE($2, phone_number),
                date_of_birth = COALESCE($3, date_of_birth),
                updated_at = now()
            WHERE id = $4
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&request.email)
        .bind(&request.phone_number)
        .bind(request.date_of_birth)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::UserAlreadyExists(request.email.clone().unwrap_or_default())
            } else {
                AppError::from(e)
            }
        })?;

        Ok(user)
    }

    /// Users are never hard-deleted; deactivation just blocks future logins.
    pub async fn deactivate_user(&self, id: &Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET is_active = false, updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn set_driver_availability(&self, user_id: &Uuid, available: bool) -> Result<DriverProfile, AppError> {
        let profile = sqlx::query_as::<_, DriverProfile>(
            r#"
            UPDATE driver_profiles
            SET is_available = $2, updated_at = now()
            WHERE user_id = $1
            RETURNING user_id, license_number, license_expiry,
                      vehicle_make, vehicle_model, vehicle_year, vehicle_color,
                      vehicle_plate_number, vehicle_capacity,
                      insurance_number, insurance_expiry,
                      is_verified, is_available, total_trips, average_rating
            "#,
        )
        .bind(user_id)
        .bind(available)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Driver profile not found".to_string()))?;

        Ok(profile)
    }

    pub async fn list_available_drivers(&self) -> Result<Vec<AvailableDriverRow>, AppError> {
        let rows = sqlx::query_as::<_, AvailableDriverRow>(
            r#"
            SELECT d.user_id, u.username, d.vehicle_make, d.vehicle_model, d.vehicle_capacity, d.average_rating, d.total_trips
            FROM driver_profiles d
            JOIN users u ON u.id = d.user_id
            WHERE d.is_available AND d.is_verified AND u.is_active
            ORDER BY d.average_rating DESC NULLS LAST, d.total_trips DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn verify_password(&self, user: &User, password: &str) -> Result<(), AppError> {
        let password_hash = PasswordHash::new(&user.password_hash).map_err(|e| AppError::password_hash("Failed to parse stored password hash", e))?;
        Argon2::default()
            .verify_password(password.as_bytes(), &password_hash)
            .map_err(|_| AppError::InvalidCredentials)?;

        Ok(())
    }

    /// Perform a throwaway Argon2 verification to equalize response timing
    /// regardless of whether the target account exists.
    pub fn dummy_verify(password: &str) {
        let hash = PasswordHash::new(&DUMMY_HASH).expect("invalid dummy hash");
        let _ = Argon2::default().verify_password(password.as_bytes(), &hash);
    }
}

pub(crate) fn hash_password(password: &str) -> Result<String, AppError> {
    let salt_string = SaltString::generate(&mut OsRng);
    let salt = Salt::from(&salt_string);
    let password_hash = PasswordHash::generate(Argon2::default(), password.as_bytes(), salt)?;

    Ok(password_hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_password_produces_parseable_hash() {
        let hash = hash_password("hunter2hunter2").unwrap();
        assert!(PasswordHash::new(&hash).is_ok());
        assert_ne!(hash, "hunter2hunter2");
    }
}
