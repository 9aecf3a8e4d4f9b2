//! Data-access seam shared by the Postgres and in-memory backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{
    Business, BusinessChanges, BusinessScope, IncomeRecord, NewBusiness, NewProfile, Profile,
    ProfileChanges, ProfileCredentials, Session, StatusUpdate,
};

#[async_trait]
pub trait Store: Send + Sync {
    // ------------------------------------------------------------------
    // Businesses
    // ------------------------------------------------------------------

    /// Businesses in `scope`, newest first.
    async fn list_businesses(&self, scope: BusinessScope) -> StoreResult<Vec<Business>>;

    async fn get_business(&self, business_id: Uuid) -> StoreResult<Option<Business>>;

    async fn create_business(&self, business: NewBusiness) -> StoreResult<Business>;

    /// Applies owner-editable field changes. Unknown ids yield `NotFound`.
    async fn update_business(
        &self,
        business_id: Uuid,
        changes: BusinessChanges,
    ) -> StoreResult<Business>;

    /// Writes status, verified_at and (optionally) trust_score in one update.
    async fn apply_status_update(
        &self,
        business_id: Uuid,
        update: StatusUpdate,
    ) -> StoreResult<Business>;

    async fn delete_business(&self, business_id: Uuid) -> StoreResult<()>;

    // ------------------------------------------------------------------
    // Income records
    // ------------------------------------------------------------------

    /// Records for a business, oldest month first.
    async fn list_income_records(&self, business_id: Uuid) -> StoreResult<Vec<IncomeRecord>>;

    /// Inserts or overwrites the record for `(business_id, month)`.
    async fn upsert_income_record(
        &self,
        business_id: Uuid,
        month: &str,
        amount: i64,
    ) -> StoreResult<IncomeRecord>;

    // ------------------------------------------------------------------
    // Profiles & sessions
    // ------------------------------------------------------------------

    /// Duplicate emails (case-insensitive) yield `Conflict`.
    async fn create_profile(&self, profile: NewProfile) -> StoreResult<Profile>;

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<ProfileCredentials>>;

    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>>;

    async fn update_profile(&self, user_id: Uuid, changes: ProfileChanges)
        -> StoreResult<Profile>;

    async fn create_session(&self, session: Session) -> StoreResult<Session>;

    /// Profile owning a session that is still live at `now`.
    async fn resolve_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Profile>>;

    async fn delete_session(&self, token: &str) -> StoreResult<()>;
}
