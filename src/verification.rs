//! Business status / trust-score transitions.
//!
//! Callers are responsible for restricting access to administrators; nothing
//! here inspects the session.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{Business, BusinessStatus, StatusUpdate};
use crate::store::Store;

pub const MIN_TRUST_SCORE: i32 = 0;
pub const MAX_TRUST_SCORE: i32 = 100;

#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("trust score must be between 0 and 100, got {0}")]
    TrustScoreOutOfRange(i32),
    #[error("business not found")]
    NotFound,
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for VerificationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => VerificationError::NotFound,
            other => VerificationError::Store(other),
        }
    }
}

/// Requested admin transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub status: BusinessStatus,
    pub trust_score: Option<i32>,
}

impl StatusChange {
    pub fn new(status: BusinessStatus) -> Self {
        Self {
            status,
            trust_score: None,
        }
    }

    pub fn with_trust_score(mut self, score: i32) -> Self {
        self.trust_score = Some(score);
        self
    }

    /// Column values for this change at `now`. `verified_at` is only ever set
    /// for the verified status and is cleared for every other one.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<StatusUpdate, VerificationError> {
        if let Some(score) = self.trust_score {
            if !(MIN_TRUST_SCORE..=MAX_TRUST_SCORE).contains(&score) {
                return Err(VerificationError::TrustScoreOutOfRange(score));
            }
        }

        let verified_at = match self.status {
            BusinessStatus::Verified => Some(now),
            BusinessStatus::Pending | BusinessStatus::Unverified | BusinessStatus::Rejected => None,
        };

        Ok(StatusUpdate {
            status: self.status,
            verified_at,
            trust_score: self.trust_score,
        })
    }
}

pub async fn set_status(
    store: &dyn Store,
    business_id: Uuid,
    change: StatusChange,
) -> Result<Business, VerificationError> {
    let update = change.resolve(Utc::now())?;
    let business = store.apply_status_update(business_id, update).await?;

    log::info!(
        "Business {} moved to {} (trust score {})",
        business.id,
        business.status,
        business.trust_score
    );

    Ok(business)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::models::{BusinessScope, NewBusiness, NewProfile, UserRole};

    async fn seeded() -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let owner = store
            .create_profile(NewProfile {
                id: Uuid::new_v4(),
                email: "owner@example.com".into(),
                full_name: Some("Owner".into()),
                password_hash: "hash".into(),
                role: UserRole::User,
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let now = Utc::now();
        let business = store
            .create_business(NewBusiness {
                id: Uuid::new_v4(),
                owner_id: owner.id,
                name: "GreenLeaf Organics".into(),
                description: None,
                industry: "Agriculture".into(),
                location: "Abuja, Nigeria".into(),
                address: "15 Garki District".into(),
                email: "hello@greenleaf.ng".into(),
                phone: "+234 802 000 0000".into(),
                website: None,
                registration_number: "RC-2021-GL-1120".into(),
                logo_url: None,
                status: BusinessStatus::Pending,
                trust_score: 40,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        (store, business.id)
    }

    #[test]
    fn verified_sets_timestamp_and_others_clear_it() {
        let now = Utc::now();
        let verified = StatusChange::new(BusinessStatus::Verified).resolve(now).unwrap();
        assert_eq!(verified.verified_at, Some(now));

        for status in [
            BusinessStatus::Pending,
            BusinessStatus::Unverified,
            BusinessStatus::Rejected,
        ] {
            let update = StatusChange::new(status).resolve(now).unwrap();
            assert_eq!(update.verified_at, None, "{status} must clear verified_at");
        }
    }

    #[test]
    fn out_of_range_scores_are_rejected() {
        let now = Utc::now();
        for score in [-1, 101, i32::MAX] {
            let result = StatusChange::new(BusinessStatus::Verified)
                .with_trust_score(score)
                .resolve(now);
            assert!(matches!(result, Err(VerificationError::TrustScoreOutOfRange(s)) if s == score));
        }
        for score in [0, 55, 100] {
            assert!(StatusChange::new(BusinessStatus::Verified)
                .with_trust_score(score)
                .resolve(now)
                .is_ok());
        }
    }

    #[tokio::test]
    async fn verify_then_reject_clears_verified_at() {
        let (store, id) = seeded().await;

        let verified = set_status(&store, id, StatusChange::new(BusinessStatus::Verified))
            .await
            .unwrap();
        assert!(verified.verified_at.is_some());

        let rejected = set_status(&store, id, StatusChange::new(BusinessStatus::Rejected))
            .await
            .unwrap();
        assert_eq!(rejected.status, BusinessStatus::Rejected);
        assert!(rejected.verified_at.is_none());
    }

    #[tokio::test]
    async fn trust_score_is_kept_unless_supplied() {
        let (store, id) = seeded().await;

        let business = set_status(&store, id, StatusChange::new(BusinessStatus::Verified))
            .await
            .unwrap();
        assert_eq!(business.trust_score, 40);

        let business = set_status(
            &store,
            id,
            StatusChange::new(BusinessStatus::Verified).with_trust_score(92),
        )
        .await
        .unwrap();
        assert_eq!(business.trust_score, 92);
    }

    #[tokio::test]
    async fn rejected_score_leaves_business_untouched() {
        let (store, id) = seeded().await;

        let result = set_status(
            &store,
            id,
            StatusChange::new(BusinessStatus::Verified).with_trust_score(150),
        )
        .await;
        assert!(matches!(result, Err(VerificationError::TrustScoreOutOfRange(150))));

        let business = store.get_business(id).await.unwrap().unwrap();
        assert_eq!(business.status, BusinessStatus::Pending);
        assert_eq!(business.trust_score, 40);
        assert!(business.verified_at.is_none());
    }

    #[tokio::test]
    async fn unknown_business_is_not_found() {
        let (store, _) = seeded().await;
        let result = set_status(&store, Uuid::new_v4(), StatusChange::new(BusinessStatus::Verified)).await;
        assert!(matches!(result, Err(VerificationError::NotFound)));
    }

    #[tokio::test]
    async fn verified_listing_follows_transitions() {
        let (store, id) = seeded().await;
        let verified_ids = |list: Vec<Business>| list.into_iter().map(|b| b.id).collect::<Vec<_>>();

        assert!(verified_ids(store.list_businesses(BusinessScope::Verified).await.unwrap()).is_empty());

        set_status(&store, id, StatusChange::new(BusinessStatus::Verified)).await.unwrap();
        assert_eq!(
            verified_ids(store.list_businesses(BusinessScope::Verified).await.unwrap()),
            vec![id]
        );

        set_status(&store, id, StatusChange::new(BusinessStatus::Rejected)).await.unwrap();
        assert!(verified_ids(store.list_businesses(BusinessScope::Verified).await.unwrap()).is_empty());
    }
}
