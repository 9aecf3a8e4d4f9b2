use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// ============================================================================
// ENUMS
// ============================================================================

/// Business verification status (this is also a Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "business_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BusinessStatus {
    Pending,
    Verified,
    Unverified,
    Rejected,
}

impl BusinessStatus {
    pub const ALL: [BusinessStatus; 4] = [
        BusinessStatus::Pending,
        BusinessStatus::Verified,
        BusinessStatus::Unverified,
        BusinessStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessStatus::Pending => "pending",
            BusinessStatus::Verified => "verified",
            BusinessStatus::Unverified => "unverified",
            BusinessStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for BusinessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BusinessStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(BusinessStatus::Pending),
            "verified" => Ok(BusinessStatus::Verified),
            "unverified" => Ok(BusinessStatus::Unverified),
            "rejected" => Ok(BusinessStatus::Rejected),
            other => Err(format!("Unknown business status '{other}'")),
        }
    }
}

/// Account role (also a Postgres enum)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

// ============================================================================
// BUSINESSES
// ============================================================================

/// Business entity as persisted in the directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Business {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub industry: String,
    pub location: String,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub website: Option<String>,
    pub registration_number: String,
    pub logo_url: Option<String>,
    pub status: BusinessStatus,
    pub trust_score: i32,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Helper struct used when inserting a new business
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBusiness {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub industry: String,
    pub location: String,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub website: Option<String>,
    pub registration_number: String,
    pub logo_url: Option<String>,
    pub status: BusinessStatus,
    pub trust_score: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which slice of the directory a listing covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessScope {
    Verified,
    OwnedBy(Uuid),
    All,
}

impl BusinessScope {
    pub fn includes(&self, business: &Business) -> bool {
        match self {
            BusinessScope::Verified => business.status == BusinessStatus::Verified,
            BusinessScope::OwnedBy(owner_id) => business.owner_id == *owner_id,
            BusinessScope::All => true,
        }
    }
}

/// Owner-editable fields. `None` leaves a column untouched; for the nullable
/// columns `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BusinessChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<Option<String>>,
    pub registration_number: Option<String>,
    pub logo_url: Option<Option<String>>,
}

impl BusinessChanges {
    pub fn is_empty(&self) -> bool {
        *self == BusinessChanges::default()
    }

    pub fn apply_to(&self, business: &mut Business) {
        if let Some(name) = &self.name {
            business.name = name.clone();
        }
        if let Some(description) = &self.description {
            business.description = description.clone();
        }
        if let Some(industry) = &self.industry {
            business.industry = industry.clone();
        }
        if let Some(location) = &self.location {
            business.location = location.clone();
        }
        if let Some(address) = &self.address {
            business.address = address.clone();
        }
        if let Some(email) = &self.email {
            business.email = email.clone();
        }
        if let Some(phone) = &self.phone {
            business.phone = phone.clone();
        }
        if let Some(website) = &self.website {
            business.website = website.clone();
        }
        if let Some(registration_number) = &self.registration_number {
            business.registration_number = registration_number.clone();
        }
        if let Some(logo_url) = &self.logo_url {
            business.logo_url = logo_url.clone();
        }
    }
}

/// Resolved column values written by a status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: BusinessStatus,
    pub verified_at: Option<DateTime<Utc>>,
    pub trust_score: Option<i32>,
}

// ============================================================================
// INCOME RECORDS
// ============================================================================

/// Month-keyed revenue figure for a business
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct IncomeRecord {
    pub id: Uuid,
    pub business_id: Uuid,
    pub amount: i64,
    pub month: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// PROFILES & SESSIONS
// ============================================================================

/// User profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Helper for creating a new profile
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub password_hash: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// Profile together with its stored password hash
#[derive(Debug, Clone)]
pub struct ProfileCredentials {
    pub profile: Profile,
    pub password_hash: String,
}

/// Self-service profile fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileChanges {
    pub full_name: Option<Option<String>>,
    pub avatar_url: Option<Option<String>>,
}

/// Live session issued at login
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ============================================================================
// REQUEST/RESPONSE DTOs
// ============================================================================

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}

/// Distinguishes an absent field from an explicit `null`.
fn deserialize_some<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Normalizes an optional form value: blank strings become `None`.
fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Exactly `YYYY-MM` with a month of 01-12, the same shape the table CHECK enforces.
fn validate_month(month: &str) -> Result<(), ValidationError> {
    let valid = match month.as_bytes() {
        [y1, y2, y3, y4, b'-', m1, m2] => {
            [y1, y2, y3, y4].iter().all(|b| b.is_ascii_digit())
                && matches!((*m1, *m2), (b'0', b'1'..=b'9') | (b'1', b'0'..=b'2'))
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("month_format")
            .with_message("month must use the YYYY-MM format".into()))
    }
}

/// Length bounds on the trimmed value, so whitespace-only input is still blank.
fn trimmed_length(value: &str, min: usize, max: usize) -> Result<(), ValidationError> {
    let len = value.trim().chars().count();
    if (min..=max).contains(&len) {
        Ok(())
    } else {
        Err(ValidationError::new("length")
            .with_message(format!("must be between {min} and {max} characters").into()))
    }
}

fn validate_label(value: &str) -> Result<(), ValidationError> {
    trimmed_length(value, 2, 120)
}

fn validate_address(value: &str) -> Result<(), ValidationError> {
    trimmed_length(value, 5, 255)
}

fn validate_phone(value: &str) -> Result<(), ValidationError> {
    trimmed_length(value, 5, 32)
}

fn validate_registration_number(value: &str) -> Result<(), ValidationError> {
    trimmed_length(value, 3, 64)
}

/// Payload sent by business owners to register a business
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateBusinessRequest {
    #[validate(custom(function = "validate_label"))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(custom(function = "validate_label"))]
    pub industry: String,
    #[validate(custom(function = "validate_label"))]
    pub location: String,
    #[validate(custom(function = "validate_address"))]
    pub address: String,
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[validate(length(max = 255))]
    pub website: Option<String>,
    #[validate(custom(function = "validate_registration_number"))]
    pub registration_number: String,
    #[validate(length(max = 1024))]
    pub logo_url: Option<String>,
}

impl CreateBusinessRequest {
    pub fn into_new_business(self, owner_id: Uuid) -> NewBusiness {
        let now = Utc::now();
        NewBusiness {
            id: Uuid::new_v4(),
            owner_id,
            name: self.name.trim().to_string(),
            description: non_blank(self.description),
            industry: self.industry.trim().to_string(),
            location: self.location.trim().to_string(),
            address: self.address.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            website: non_blank(self.website),
            registration_number: self.registration_number.trim().to_string(),
            logo_url: non_blank(self.logo_url),
            status: BusinessStatus::Pending,
            trust_score: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of owner-editable business fields
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct UpdateBusinessRequest {
    #[validate(custom(function = "validate_label"))]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[validate(custom(function = "validate_label"))]
    pub industry: Option<String>,
    #[validate(custom(function = "validate_label"))]
    pub location: Option<String>,
    #[validate(custom(function = "validate_address"))]
    pub address: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub website: Option<Option<String>>,
    #[validate(custom(function = "validate_registration_number"))]
    pub registration_number: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub logo_url: Option<Option<String>>,
}

impl UpdateBusinessRequest {
    pub fn into_changes(self) -> BusinessChanges {
        let trimmed = |value: Option<String>| value.map(|s| s.trim().to_string());
        BusinessChanges {
            name: trimmed(self.name),
            description: self.description.map(non_blank),
            industry: trimmed(self.industry),
            location: trimmed(self.location),
            address: trimmed(self.address),
            email: trimmed(self.email),
            phone: trimmed(self.phone),
            website: self.website.map(non_blank),
            registration_number: trimmed(self.registration_number),
            logo_url: self.logo_url.map(non_blank),
        }
    }
}

/// Admin status transition request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateStatusRequest {
    pub status: BusinessStatus,
    pub trust_score: Option<i32>,
}

/// Income record submission
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct IncomeRecordRequest {
    #[validate(range(min = 0))]
    pub amount: i64,
    #[validate(custom(function = "validate_month"))]
    pub month: String,
}

/// Signup form
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SignupRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "Passwords do not match"))]
    pub confirm_password: String,
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
}

/// Login form
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Self-service profile update
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct UpdateProfileRequest {
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub full_name: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar_url: Option<Option<String>>,
}

impl UpdateProfileRequest {
    pub fn into_changes(self) -> ProfileChanges {
        ProfileChanges {
            full_name: self.full_name.map(non_blank),
            avatar_url: self.avatar_url.map(non_blank),
        }
    }
}

/// Issued session returned by login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub profile: Profile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Verified".parse::<BusinessStatus>(), Ok(BusinessStatus::Verified));
        assert_eq!(" unverified ".parse::<BusinessStatus>(), Ok(BusinessStatus::Unverified));
        assert!("approved".parse::<BusinessStatus>().is_err());
    }

    #[test]
    fn month_must_be_year_and_month() {
        let ok = IncomeRecordRequest { amount: 10, month: "2025-01".into() };
        assert!(ok.validate().is_ok());

        for month in ["2025-12", "1999-10", "0000-09"] {
            let ok = IncomeRecordRequest { amount: 10, month: month.into() };
            assert!(ok.validate().is_ok(), "{month} should be accepted");
        }

        for month in [
            "2025-13", "2025-00", "2025-1", "January", "2025-01-01",
            "-999-01", "+999-01", " 2025-1", "2025-1 ", "２０２５-01",
        ] {
            let bad = IncomeRecordRequest { amount: 10, month: month.into() };
            assert!(bad.validate().is_err(), "{month} should be rejected");
        }
    }

    #[test]
    fn negative_income_is_rejected() {
        let bad = IncomeRecordRequest { amount: -1, month: "2025-01".into() };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn signup_requires_matching_passwords_of_six_chars() {
        let mut form = SignupRequest {
            email: "ada@example.com".into(),
            password: "secret1".into(),
            confirm_password: "secret1".into(),
            full_name: "Ada".into(),
        };
        assert!(form.validate().is_ok());

        form.confirm_password = "secret2".into();
        assert!(form.validate().is_err());

        form.password = "abc".into();
        form.confirm_password = "abc".into();
        assert!(form.validate().is_err());
    }

    #[test]
    fn update_request_distinguishes_null_from_absent() {
        let body: UpdateBusinessRequest =
            serde_json::from_str(r#"{"website": null, "name": "Acme"}"#).unwrap();
        let changes = body.into_changes();
        assert_eq!(changes.website, Some(None));
        assert_eq!(changes.description, None);
        assert_eq!(changes.name.as_deref(), Some("Acme"));
    }

    fn blank_business_form() -> CreateBusinessRequest {
        CreateBusinessRequest {
            name: "   ".into(),
            description: None,
            industry: "    ".into(),
            location: "Lagos, Nigeria".into(),
            address: "42 Victoria Island".into(),
            email: "info@techflow.ng".into(),
            phone: "+234 801 234 5678".into(),
            website: None,
            registration_number: "    ".into(),
            logo_url: None,
        }
    }

    #[test]
    fn whitespace_only_required_fields_are_rejected() {
        let errors = blank_business_form().validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("industry"));
        assert!(fields.contains_key("registration_number"));
        assert!(!fields.contains_key("location"));

        let mut padded = blank_business_form();
        padded.name = "  TechFlow  ".into();
        padded.industry = " Technology ".into();
        padded.registration_number = " RC-8842 ".into();
        assert!(padded.validate().is_ok());
    }

    #[test]
    fn whitespace_only_updates_are_rejected() {
        let update = UpdateBusinessRequest {
            name: Some("  ".into()),
            phone: Some("     ".into()),
            ..Default::default()
        };
        let errors = update.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("phone"));

        assert!(UpdateBusinessRequest::default().validate().is_ok());
    }

    #[test]
    fn new_business_starts_pending_with_zero_score() {
        let request = CreateBusinessRequest {
            name: " TechFlow ".into(),
            description: Some("  ".into()),
            industry: "Technology".into(),
            location: "Lagos, Nigeria".into(),
            address: "42 Victoria Island".into(),
            email: "info@techflow.ng".into(),
            phone: "+234 801 234 5678".into(),
            website: None,
            registration_number: "RC-2019-TF-8842".into(),
            logo_url: None,
        };
        let owner = Uuid::new_v4();
        let business = request.into_new_business(owner);
        assert_eq!(business.owner_id, owner);
        assert_eq!(business.name, "TechFlow");
        assert_eq!(business.description, None);
        assert_eq!(business.status, BusinessStatus::Pending);
        assert_eq!(business.trust_score, 0);
    }
}
