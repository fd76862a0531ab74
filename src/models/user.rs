use chrono::{DateTime, NaiveDate, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Default, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Passenger,
    Driver,
    Both,
}

impl UserRole {
    pub fn includes_passenger(self) -> bool {
        matches!(self, UserRole::Passenger | UserRole::Both)
    }

    pub fn includes_driver(self) -> bool {
        matches!(self, UserRole::Driver | UserRole::Both)
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Default, JsonSchema, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    DigitalWallet,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PassengerProfile {
    pub user_id: Uuid,
    pub preferred_payment_method: PaymentMethod,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub total_trips: i32,
    pub average_rating: Option<f64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DriverProfile {
    pub user_id: Uuid,
    pub license_number: String,
    pub license_expiry: NaiveDate,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_year: i32,
    pub vehicle_color: String,
    pub vehicle_plate_number: String,
    pub vehicle_capacity: i32,
    pub insurance_number: String,
    pub insurance_expiry: NaiveDate,
    pub is_verified: bool,
    pub is_available: bool,
    pub total_trips: i32,
    pub average_rating: Option<f64>,
}

/// A user's overall rating is the unweighted mean of the role averages the
/// upstream service exposes. Counts per role are ignored on purpose to stay
/// wire-compatible with existing clients.
pub fn overall_average(passenger: Option<f64>, driver: Option<f64>) -> Option<f64> {
    match (passenger, driver) {
        (Some(p), Some(d)) => Some((p + d) / 2.0),
        (Some(p), None) => Some(p),
        (None, Some(d)) => Some(d),
        (None, None) => None,
    }
}

#[derive(Deserialize, Debug, Default, Validate, JsonSchema)]
pub struct PassengerProfileRequest {
    #[serde(default)]
    pub preferred_payment_method: Option<PaymentMethod>,
    #[validate(length(max = 100))]
    pub emergency_contact_name: Option<String>,
    #[validate(length(max = 20))]
    pub emergency_contact_phone: Option<String>,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct DriverProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub license_number: String,
    pub license_expiry: NaiveDate,
    #[validate(length(min = 1, max = 50))]
    pub vehicle_make: String,
    #[validate(length(min = 1, max = 50))]
    pub vehicle_model: String,
    #[validate(range(min = 1950, max = 2100))]
    pub vehicle_year: i32,
    #[validate(length(min = 1, max = 30))]
    pub vehicle_color: String,
    #[validate(length(min = 1, max = 20))]
    pub vehicle_plate_number: String,
    #[validate(range(min = 1, max = 50))]
    #[serde(default = "default_vehicle_capacity")]
    pub vehicle_capacity: i32,
    #[validate(length(min = 1, max = 50))]
    pub insurance_number: String,
    pub insurance_expiry: NaiveDate,
}

fn default_vehicle_capacity() -> i32 {
    4
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
#[validate(schema(function = "validate_register_profiles"))]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
    #[validate(length(max = 20))]
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(nested)]
    pub passenger_profile: Option<PassengerProfileRequest>,
    #[validate(nested)]
    pub driver_profile: Option<DriverProfileRequest>,
}

/// Driver accounts cannot be created without their vehicle and license data;
/// a missing passenger profile is fine and defaults to cash payment.
fn validate_register_profiles(request: &RegisterRequest) -> Result<(), ValidationError> {
    if request.role.includes_driver() && request.driver_profile.is_none() {
        return Err(ValidationError::new("driver_profile_required"));
    }
    Ok(())
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct UserUpdateRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Deserialize, Debug, JsonSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct PassengerProfileResponse {
    pub preferred_payment_method: PaymentMethod,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub total_trips: i32,
    pub average_rating: Option<f64>,
}

impl From<&PassengerProfile> for PassengerProfileResponse {
    fn from(profile: &PassengerProfile) -> Self {
        PassengerProfileResponse {
            preferred_payment_method: profile.preferred_payment_method,
            emergency_contact_name: profile.emergency_contact_name.clone(),
            emergency_contact_phone: profile.emergency_contact_phone.clone(),
            total_trips: profile.total_trips,
            average_rating: profile.average_rating,
        }
    }
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct DriverProfileResponse {
    pub license_number: String,
    pub license_expiry: NaiveDate,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_year: i32,
    pub vehicle_color: String,
    pub vehicle_plate_number: String,
    pub vehicle_capacity: i32,
    pub is_verified: bool,
    pub is_available: bool,
    pub total_trips: i32,
    pub average_rating: Option<f64>,
}

impl From<&DriverProfile> for DriverProfileResponse {
    fn from(profile: &DriverProfile) -> Self {
        DriverProfileResponse {
            license_number: profile.license_number.clone(),
            license_expiry: profile.license_expiry,
            vehicle_make: profile.vehicle_make.clone(),
            vehicle_model: profile.vehicle_model.clone(),
            vehicle_year: profile.vehicle_year,
            vehicle_color: profile.vehicle_color.clone(),
            vehicle_plate_number: profile.vehicle_plate_number.clone(),
            vehicle_capacity: profile.vehicle_capacity,
            is_verified: profile.is_verified,
            is_available: profile.is_available,
            total_trips: profile.total_trips,
            average_rating: profile.average_rating,
        }
    }
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub is_active: bool,
    pub average_rating: Option<f64>,
    pub passenger_profile: Option<PassengerProfileResponse>,
    pub driver_profile: Option<DriverProfileResponse>,
}

impl UserResponse {
    pub fn assemble(user: &User, passenger: Option<&PassengerProfile>, driver: Option<&DriverProfile>) -> Self {
        UserResponse {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            phone_number: user.phone_number.clone(),
            date_of_birth: user.date_of_birth,
            is_active: user.is_active,
            average_rating: overall_average(
                passenger.and_then(|p| p.average_rating),
                driver.and_then(|d| d.average_rating),
            ),
            passenger_profile: passenger.map(PassengerProfileResponse::from),
            driver_profile: driver.map(DriverProfileResponse::from),
        }
    }
}

/// Listing entry for the available-drivers endpoint.
#[derive(Debug, FromRow)]
pub struct AvailableDriverRow {
    pub user_id: Uuid,
    pub username: String,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_capacity: i32,
    pub average_rating: Option<f64>,
    pub total_trips: i32,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct AvailableDriverResponse {
    pub user_id: Uuid,
    pub username: String,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub vehicle_capacity: i32,
    pub average_rating: Option<f64>,
    pub total_trips: i32,
}

impl From<&AvailableDriverRow> for AvailableDriverResponse {
    fn from(row: &AvailableDriverRow) -> Self {
        AvailableDriverResponse {
            user_id: row.user_id,
            username: row.username.clone(),
            vehicle_make: row.vehicle_make.clone(),
            vehicle_model: row.vehicle_model.clone(),
            vehicle_capacity: row.vehicle_capacity,
            average_rating: row.average_rating,
            total_trips: row.total_trips,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_membership() {
        assert!(UserRole::Passenger.includes_passenger());
        assert!(!UserRole::Passenger.includes_driver());
        assert!(UserRole::Driver.includes_driver());
        assert!(!UserRole::Driver.includes_passenger());
        assert!(UserRole::Both.includes_passenger());
        assert!(UserRole::Both.includes_driver());
    }

    #[test]
    fn overall_average_combines_role_averages() {
        assert_eq!(overall_average(None, None), None);
        assert_eq!(overall_average(Some(4.0), None), Some(4.0));
        assert_eq!(overall_average(None, Some(3.5)), Some(3.5));
        assert_eq!(overall_average(Some(5.0), Some(4.0)), Some(4.5));
    }

    fn register_request(role: UserRole) -> RegisterRequest {
        RegisterRequest {
            username: "marta".to_string(),
            email: "marta@example.com".to_string(),
            password: "correct horse".to_string(),
            role,
            phone_number: None,
            date_of_birth: None,
            passenger_profile: None,
            driver_profile: None,
        }
    }

    #[test]
    fn passenger_registration_needs_no_profiles() {
        assert!(register_request(UserRole::Passenger).validate().is_ok());
    }

    #[test]
    fn driver_registration_requires_driver_profile() {
        assert!(register_request(UserRole::Driver).validate().is_err());
        assert!(register_request(UserRole::Both).validate().is_err());

        let mut request = register_request(UserRole::Driver);
        request.driver_profile = Some(DriverProfileRequest {
            license_number: "B-123456".to_string(),
            license_expiry: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            vehicle_make: "Skoda".to_string(),
            vehicle_model: "Octavia".to_string(),
            vehicle_year: 2019,
            vehicle_color: "grey".to_string(),
            vehicle_plate_number: "B-AB-1234".to_string(),
            vehicle_capacity: 4,
            insurance_number: "INS-9".to_string(),
            insurance_expiry: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
        });
        assert!(request.validate().is_ok());
    }
}
