use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{LoginRequest, NewProfile, Profile, Session, SignupRequest, UserRole};
use crate::store::Store;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("An account with this email already exists")]
    EmailTaken,
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => AuthError::EmailTaken,
            other => AuthError::Store(other),
        }
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(err) => {
            log::warn!("Stored password hash could not be parsed: {err}");
            false
        }
    }
}

/// Creates a `user`-role profile. Callers validate the form first.
pub async fn sign_up(store: &dyn Store, form: SignupRequest) -> Result<Profile, AuthError> {
    let password_hash = hash_password(&form.password)?;
    let full_name = form.full_name.trim();

    let profile = store
        .create_profile(NewProfile {
            id: Uuid::new_v4(),
            email: form.email.trim().to_lowercase(),
            full_name: (!full_name.is_empty()).then(|| full_name.to_string()),
            password_hash,
            role: UserRole::User,
            created_at: Utc::now(),
        })
        .await?;

    log::info!("Created profile {}", profile.id);
    Ok(profile)
}

/// Verifies credentials and issues a session lasting `ttl`.
pub async fn sign_in(
    store: &dyn Store,
    form: &LoginRequest,
    ttl: Duration,
) -> Result<(Session, Profile), AuthError> {
    let credentials = store
        .find_credentials(form.email.trim())
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password(&form.password, &credentials.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }

    let now = Utc::now();
    let session = store
        .create_session(Session {
            token: Uuid::new_v4().simple().to_string(),
            user_id: credentials.profile.id,
            created_at: now,
            expires_at: now + ttl,
        })
        .await?;

    Ok((session, credentials.profile))
}

pub async fn sign_out(store: &dyn Store, token: &str) -> Result<(), AuthError> {
    store.delete_session(token).await?;
    Ok(())
}
