use std::{borrow::Cow, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgRow},
    Connection, Executor, PgPool, Row,
};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    Business, BusinessChanges, BusinessScope, BusinessStatus, IncomeRecord, NewBusiness,
    NewProfile, Profile, ProfileChanges, ProfileCredentials, Session, StatusUpdate,
};
use crate::store::Store;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Some(Duration::from_secs(600)))
        .test_before_acquire(true)
}

impl Database {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = match pool_options().connect(database_url).await {
            Ok(pool) => pool,
            // 3D000: invalid_catalog_name
            Err(sqlx::Error::Database(db_err)) if db_err.code() == Some(Cow::Borrowed("3D000")) => {
                log::info!("Database missing, attempting to create it");
                create_database_if_missing(database_url).await?;
                pool_options().connect(database_url).await?
            }
            Err(err) => return Err(err.into()),
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        log::info!("Database connection established and migrations applied");

        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for Database {
    // ========================================================================
    // BUSINESSES
    // ========================================================================

    async fn list_businesses(&self, scope: BusinessScope) -> StoreResult<Vec<Business>> {
        let records = match scope {
            BusinessScope::Verified => {
                sqlx::query_as::<_, Business>(
                    r#"
                    SELECT * FROM businesses
                    WHERE status = $1
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(BusinessStatus::Verified)
                .fetch_all(&self.pool)
                .await?
            }
            BusinessScope::OwnedBy(owner_id) => {
                sqlx::query_as::<_, Business>(
                    r#"
                    SELECT * FROM businesses
                    WHERE owner_id = $1
                    ORDER BY created_at DESC
                    "#,
                )
                .bind(owner_id)
                .fetch_all(&self.pool)
                .await?
            }
            BusinessScope::All => {
                sqlx::query_as::<_, Business>("SELECT * FROM businesses ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(records)
    }

    async fn get_business(&self, business_id: Uuid) -> StoreResult<Option<Business>> {
        let record = sqlx::query_as::<_, Business>("SELECT * FROM businesses WHERE id = $1")
            .bind(business_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn create_business(&self, business: NewBusiness) -> StoreResult<Business> {
        let NewBusiness {
            id,
            owner_id,
            name,
            description,
            industry,
            location,
            address,
            email,
            phone,
            website,
            registration_number,
            logo_url,
            status,
            trust_score,
            created_at,
            updated_at,
        } = business;

        let record = sqlx::query_as::<_, Business>(
            r#"
            INSERT INTO businesses (
                id,
                owner_id,
                name,
                description,
                industry,
                location,
                address,
                email,
                phone,
                website,
                registration_number,
                logo_url,
                status,
                trust_score,
                verified_at,
                created_at,
                updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, NULL, $15, $16
            )
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(name)
        .bind(description)
        .bind(industry)
        .bind(location)
        .bind(address)
        .bind(email)
        .bind(phone)
        .bind(website)
        .bind(registration_number)
        .bind(logo_url)
        .bind(status)
        .bind(trust_score)
        .bind(created_at)
        .bind(updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update_business(
        &self,
        business_id: Uuid,
        changes: BusinessChanges,
    ) -> StoreResult<Business> {
        let BusinessChanges {
            name,
            description,
            industry,
            location,
            address,
            email,
            phone,
            website,
            registration_number,
            logo_url,
        } = changes;

        let record = sqlx::query_as::<_, Business>(
            r#"
            UPDATE businesses
            SET
                name = COALESCE($2, name),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                industry = COALESCE($5, industry),
                location = COALESCE($6, location),
                address = COALESCE($7, address),
                email = COALESCE($8, email),
                phone = COALESCE($9, phone),
                website = CASE WHEN $10 THEN $11 ELSE website END,
                registration_number = COALESCE($12, registration_number),
                logo_url = CASE WHEN $13 THEN $14 ELSE logo_url END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(business_id)
        .bind(name)
        .bind(description.is_some())
        .bind(description.flatten())
        .bind(industry)
        .bind(location)
        .bind(address)
        .bind(email)
        .bind(phone)
        .bind(website.is_some())
        .bind(website.flatten())
        .bind(registration_number)
        .bind(logo_url.is_some())
        .bind(logo_url.flatten())
        .fetch_optional(&self.pool)
        .await?;

        record.ok_or(StoreError::NotFound)
    }

    async fn apply_status_update(
        &self,
        business_id: Uuid,
        update: StatusUpdate,
    ) -> StoreResult<Business> {
        let record = sqlx::query_as::<_, Business>(
            r#"
            UPDATE businesses
            SET
                status = $2,
                verified_at = $3,
                trust_score = COALESCE($4, trust_score),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(business_id)
        .bind(update.status)
        .bind(update.verified_at)
        .bind(update.trust_score)
        .fetch_optional(&self.pool)
        .await?;

        record.ok_or(StoreError::NotFound)
    }

    async fn delete_business(&self, business_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM businesses WHERE id = $1")
            .bind(business_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    // ========================================================================
    // INCOME RECORDS
    // ========================================================================

    async fn list_income_records(&self, business_id: Uuid) -> StoreResult<Vec<IncomeRecord>> {
        let records = sqlx::query_as::<_, IncomeRecord>(
            r#"
            SELECT id, business_id, amount, month, created_at
            FROM income_records
            WHERE business_id = $1
            ORDER BY month ASC
            "#,
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn upsert_income_record(
        &self,
        business_id: Uuid,
        month: &str,
        amount: i64,
    ) -> StoreResult<IncomeRecord> {
        let record = sqlx::query_as::<_, IncomeRecord>(
            r#"
            INSERT INTO income_records (id, business_id, amount, month)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (business_id, month)
            DO UPDATE SET amount = EXCLUDED.amount
            RETURNING id, business_id, amount, month, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(business_id)
        .bind(amount)
        .bind(month)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    // ========================================================================
    // PROFILES & SESSIONS
    // ========================================================================

    async fn create_profile(&self, profile: NewProfile) -> StoreResult<Profile> {
        let record = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (
                id,
                email,
                full_name,
                avatar_url,
                password_hash,
                role,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, NULL, $4, $5, $6, $6)
            RETURNING id, email, full_name, avatar_url, role, created_at, updated_at
            "#,
        )
        .bind(profile.id)
        .bind(&profile.email)
        .bind(&profile.full_name)
        .bind(&profile.password_hash)
        .bind(profile.role)
        .bind(profile.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_credentials(&self, email: &str) -> StoreResult<Option<ProfileCredentials>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, full_name, avatar_url, role, created_at, updated_at, password_hash
            FROM profiles
            WHERE lower(email) = lower($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_credentials(&row)).transpose()
    }

    async fn get_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        let record = sqlx::query_as::<_, Profile>(
            r#"
            SELECT id, email, full_name, avatar_url, role, created_at, updated_at
            FROM profiles
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update_profile(
        &self,
        user_id: Uuid,
        changes: ProfileChanges,
    ) -> StoreResult<Profile> {
        let ProfileChanges {
            full_name,
            avatar_url,
        } = changes;

        let record = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET
                full_name = CASE WHEN $2 THEN $3 ELSE full_name END,
                avatar_url = CASE WHEN $4 THEN $5 ELSE avatar_url END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, full_name, avatar_url, role, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(full_name.is_some())
        .bind(full_name.flatten())
        .bind(avatar_url.is_some())
        .bind(avatar_url.flatten())
        .fetch_optional(&self.pool)
        .await?;

        record.ok_or(StoreError::NotFound)
    }

    async fn create_session(&self, session: Session) -> StoreResult<Session> {
        let purged = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(session.created_at)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if purged > 0 {
            log::debug!("Purged {purged} expired sessions");
        }

        sqlx::query(
            r#"
            INSERT INTO sessions (token, user_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&session.token)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(session)
    }

    async fn resolve_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Profile>> {
        let record = sqlx::query_as::<_, Profile>(
            r#"
            SELECT p.id, p.email, p.full_name, p.avatar_url, p.role, p.created_at, p.updated_at
            FROM sessions s
            INNER JOIN profiles p ON p.id = s.user_id
            WHERE s.token = $1 AND s.expires_at > $2
            "#,
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete_session(&self, token: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_credentials(row: &PgRow) -> StoreResult<ProfileCredentials> {
    Ok(ProfileCredentials {
        profile: Profile {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            full_name: row.try_get("full_name")?,
            avatar_url: row.try_get("avatar_url")?,
            role: row.try_get("role")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        },
        password_hash: row.try_get("password_hash")?,
    })
}

async fn create_database_if_missing(database_url: &str) -> Result<(), sqlx::Error> {
    let options: PgConnectOptions = database_url.parse()?;
    let database_name = options
        .get_database()
        .map(|name| name.to_string())
        .unwrap_or_else(|| "postgres".to_string());

    // Already targeting the maintenance database.
    if database_name.eq_ignore_ascii_case("postgres") {
        return Ok(());
    }

    let maintenance_options = options.clone().database("postgres");
    let mut connection = sqlx::postgres::PgConnection::connect_with(&maintenance_options).await?;

    let escaped_name = database_name.replace('"', "\"\"");
    let create_stmt = format!("CREATE DATABASE \"{}\"", escaped_name);

    match connection.execute(create_stmt.as_str()).await {
        Ok(_) => {
            log::info!("Created database '{}'", database_name);
            Ok(())
        }
        // 42P04: duplicate_database
        Err(sqlx::Error::Database(db_err)) if db_err.code() == Some(Cow::Borrowed("42P04")) => {
            log::info!("Database '{}' already exists", database_name);
            Ok(())
        }
        Err(err) => Err(err),
    }
}
