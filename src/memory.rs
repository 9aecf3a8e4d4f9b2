//! In-process [`Store`] used by the test suite and `STORE_BACKEND=memory`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    Business, BusinessChanges, BusinessScope, IncomeRecord, NewBusiness, NewProfile, Profile,
    ProfileChanges, ProfileCredentials, Session, StatusUpdate,
};
use crate::store::Store;

#[derive(Default)]
struct Tables {
    businesses: Vec<Business>,
    income_records: Vec<IncomeRecord>,
    profiles: Vec<ProfileCredentials>,
    sessions: HashMap<String, Session>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_businesses(&self, scope: BusinessScope) -> StoreResult<Vec<Business>> {
        let tables = self.tables.read().await;
        let mut records: Vec<Business> = tables
            .businesses
            .iter()
            .filter(|business| scope.includes(business))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn get_business(&self, business_id: Uuid) -> StoreResult<Option<Business>> {
        let tables = self.tables.read().await;
        Ok(tables.businesses.iter().find(|b| b.id == business_id).cloned())
    }

    async fn create_business(&self, business: NewBusiness) -> StoreResult<Business> {
        let mut tables = self.tables.write().await;
        if tables.businesses.iter().any(|b| b.id == business.id) {
            return Err(StoreError::Conflict(format!("business {} exists", business.id)));
        }

        let record = Business {
            id: business.id,
            owner_id: business.owner_id,
            name: business.name,
            description: business.description,
            industry: business.industry,
            location: business.location,
            address: business.address,
            email: business.email,
            phone: business.phone,
            website: business.website,
            registration_number: business.registration_number,
            logo_url: business.logo_url,
            status: business.status,
            trust_score: business.trust_score,
            verified_at: None,
            created_at: business.created_at,
            updated_at: business.updated_at,
        };
        tables.businesses.push(record.clone());
        Ok(record)
    }

    async fn update_business(
        &self,
        business_id: Uuid,
        changes: BusinessChanges,
    ) -> StoreResult<Business> {
        let mut tables = self.tables.write().await;
        let business = tables
            .businesses
            .iter_mut()
            .find(|b| b.id == business_id)
            .ok_or(StoreError::NotFound)?;

        changes.apply_to(business);
        business.updated_at = Utc::now();
        Ok(business.clone())
    }

    async fn apply_status_update(
        &self,
        business_id: Uuid,
        update: StatusUpdate,
    ) -> StoreResult<Business> {
        let mut tables = self.tables.write().await;
        let business = tables
            .businesses
            .iter_mut()
            .find(|b| b.id == business_id)
            .ok_or(StoreError::NotFound)?;

        business.status = update.status;
        business.verified_at = update.verified_at;
        if let Some(score) = update.trust_score {
            business.trust_score = score;
        }
        business.updated_at = Utc::now();
        Ok(business.clone())
    }

    async fn delete_business(&self, business_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let before = tables.businesses.len();
        tables.businesses.retain(|b| b.id != business_id);
        if tables.businesses.len() == before {
            return Err(StoreError::NotFound);
        }
        tables.income_records.retain(|r| r.business_id != business_id);
        Ok(())
    }

    async fn list_income_records(&self, business_id: Uuid) -> StoreResult<Vec<IncomeRecord>> {
        let tables = self.tables.read().await;
        let mut records: Vec<IncomeRecord> = tables
            .income_records
            .iter()
            .filter(|r| r.business_id == business_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.month.cmp(&b.month));
        Ok(records)
    }

    async fn upsert_income_record(
        &self,
        business_id: Uuid,
        month: &str,
        amount: i64,
    ) -> StoreResult<IncomeRecord> {
        let mut tables = self.tables.write().await;
        if !tables.businesses.iter().any(|b| b.id == business_id) {
            return Err(StoreError::NotFound);
        }

        if let Some(existing) = tables
            .income_records
            .iter_mut()
            .find(|r| r.business_id == business_id && r.month == month)
        {
            existing.amount = amount;
            return Ok(existing.clone());
        }

        let record = IncomeRecord {
            id: Uuid::new_v4(),
            business_id,
            amount,
            month: month.to_string(),
            created_at: Utc::now(),
        };
        tables.income_records.push(record.clone());
        Ok(record)
    }

    async fn create_profile(&self, profile: NewProfile) -> StoreResult<Profile> {
        let mut tables = self.tables.write().await;
        if tables
            .profiles
            .iter()
            .any(|c| c.profile.email.to_lowercase() == profile.email.to_lowercase())
        {
            return Err(StoreError::Conflict(format!("email {} is taken", profile.email)));
        }

        let record = Profile {
            id: profile.id,
            email: profile.email,
            full_name: profile.full_name,
            avatar_url: None,
            role: profile.role,
            created_at: profile.created_at,
            updated_at: profile.created_at,
        };
        tables.profiles.push(ProfileCredentials {
            profile: record.clone(),
            password_hash: profile.password_hash,
        });
        Ok(record)
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<ProfileCredentials>> {
        let tables = self.tables.read().await;
        let email = email.to_lowercase();
        Ok(tables
            .profiles
            .iter()
            .find(|c| c.profile.email.to_lowercase() == email)
            .cloned())
    }

    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        let tables = self.tables.read().await;
        Ok(tables
            .profiles
            .iter()
            .find(|c| c.profile.id == user_id)
            .map(|c| c.profile.clone()))
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        changes: ProfileChanges,
    ) -> StoreResult<Profile> {
        let mut tables = self.tables.write().await;
        let credentials = tables
            .profiles
            .iter_mut()
            .find(|c| c.profile.id == user_id)
            .ok_or(StoreError::NotFound)?;

        let profile = &mut credentials.profile;
        if let Some(full_name) = changes.full_name {
            profile.full_name = full_name;
        }
        if let Some(avatar_url) = changes.avatar_url {
            profile.avatar_url = avatar_url;
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn create_session(&self, session: Session) -> StoreResult<Session> {
        let mut tables = self.tables.write().await;
        if !tables.profiles.iter().any(|c| c.profile.id == session.user_id) {
            return Err(StoreError::NotFound);
        }
        tables
            .sessions
            .retain(|_, existing| existing.expires_at > session.created_at);
        tables.sessions.insert(session.token.clone(), session.clone());
        Ok(session)
    }

    async fn resolve_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Profile>> {
        let tables = self.tables.read().await;
        let Some(session) = tables.sessions.get(token) else {
            return Ok(None);
        };
        if session.expires_at <= now {
            return Ok(None);
        }
        Ok(tables
            .profiles
            .iter()
            .find(|c| c.profile.id == session.user_id)
            .map(|c| c.profile.clone()))
    }

    async fn delete_session(&self, token: &str) -> StoreResult<()> {
        self.tables.write().await.sessions.remove(token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BusinessStatus, UserRole};
    use chrono::Duration;

    fn new_profile(email: &str) -> NewProfile {
        NewProfile {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: None,
            password_hash: "hash".into(),
            role: UserRole::User,
            created_at: Utc::now(),
        }
    }

    fn new_business(owner_id: Uuid, name: &str) -> NewBusiness {
        let now = Utc::now();
        NewBusiness {
            id: Uuid::new_v4(),
            owner_id,
            name: name.into(),
            description: None,
            industry: "Retail".into(),
            location: "Accra, Ghana".into(),
            address: "1 Oxford Street".into(),
            email: "shop@example.com".into(),
            phone: "+233 20 000 0000".into(),
            website: None,
            registration_number: "RC-1".into(),
            logo_url: None,
            status: BusinessStatus::Pending,
            trust_score: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_case_insensitively() {
        let store = MemoryStore::new();
        store.create_profile(new_profile("ada@example.com")).await.unwrap();
        let err = store.create_profile(new_profile("ADA@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn expired_sessions_do_not_resolve() {
        let store = MemoryStore::new();
        let profile = store.create_profile(new_profile("ada@example.com")).await.unwrap();
        let now = Utc::now();
        store
            .create_session(Session {
                token: "t1".into(),
                user_id: profile.id,
                created_at: now - Duration::days(8),
                expires_at: now - Duration::days(1),
            })
            .await
            .unwrap();

        assert!(store.resolve_session("t1", now).await.unwrap().is_none());
        assert!(store.resolve_session("missing", now).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn issuing_a_session_purges_expired_ones() {
        let store = MemoryStore::new();
        let profile = store.create_profile(new_profile("ada@example.com")).await.unwrap();
        let now = Utc::now();
        for (token, expires_at) in [("old", now - Duration::hours(1)), ("live", now + Duration::days(1))] {
            store
                .create_session(Session {
                    token: token.into(),
                    user_id: profile.id,
                    created_at: now - Duration::days(2),
                    expires_at,
                })
                .await
                .unwrap();
        }

        store
            .create_session(Session {
                token: "fresh".into(),
                user_id: profile.id,
                created_at: now,
                expires_at: now + Duration::days(7),
            })
            .await
            .unwrap();

        let tables = store.tables.read().await;
        let mut tokens: Vec<&str> = tables.sessions.keys().map(String::as_str).collect();
        tokens.sort_unstable();
        assert_eq!(tokens, ["fresh", "live"]);
    }

    #[tokio::test]
    async fn non_ascii_emails_compare_case_insensitively() {
        let store = MemoryStore::new();
        store.create_profile(new_profile("élodie@example.com")).await.unwrap();

        let err = store.create_profile(new_profile("ÉLODIE@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let found = store.find_credentials("Élodie@Example.com").await.unwrap();
        assert_eq!(found.map(|c| c.profile.email).as_deref(), Some("élodie@example.com"));
    }

    #[tokio::test]
    async fn deleting_a_business_removes_its_income_records() {
        let store = MemoryStore::new();
        let owner = store.create_profile(new_profile("owner@example.com")).await.unwrap();
        let business = store.create_business(new_business(owner.id, "Kiosk")).await.unwrap();
        store.upsert_income_record(business.id, "2025-01", 100).await.unwrap();

        store.delete_business(business.id).await.unwrap();
        assert!(store.list_income_records(business.id).await.unwrap().is_empty());
        assert!(matches!(
            store.delete_business(business.id).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn owned_scope_only_returns_owner_businesses() {
        let store = MemoryStore::new();
        let alice = store.create_profile(new_profile("alice@example.com")).await.unwrap();
        let bob = store.create_profile(new_profile("bob@example.com")).await.unwrap();
        store.create_business(new_business(alice.id, "A")).await.unwrap();
        store.create_business(new_business(bob.id, "B")).await.unwrap();

        let mine = store.list_businesses(BusinessScope::OwnedBy(alice.id)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name, "A");
        assert_eq!(store.list_businesses(BusinessScope::All).await.unwrap().len(), 2);
    }
}
