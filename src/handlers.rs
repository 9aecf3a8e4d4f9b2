use actix_web::{delete, get, http::header, patch, post, web, HttpResponse, Responder};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{self, AuthError};
use crate::directory::{self, SearchFields, StatusFilter};
use crate::error::StoreError;
use crate::models::{
    ApiResponse, Business, BusinessScope, CreateBusinessRequest, IncomeRecordRequest,
    LoginRequest, LoginResponse, SignupRequest, UpdateBusinessRequest, UpdateProfileRequest,
    UpdateStatusRequest,
};
use crate::session::{Authenticated, CurrentSession, MaybeSession, SessionSettings};
use crate::store::Store;
use crate::verification::{self, StatusChange, VerificationError};

type StoreData = web::Data<dyn Store>;

fn forbidden(message: &str) -> HttpResponse {
    HttpResponse::Forbidden().json(ApiResponse::<()>::error(message.into()))
}

fn require_admin(session: &CurrentSession) -> Result<(), HttpResponse> {
    if session.profile.is_admin() {
        Ok(())
    } else {
        Err(forbidden("Admin access required"))
    }
}

/// Fetches a business the session may modify: its owner or an admin.
pub(crate) async fn load_managed_business(
    store: &dyn Store,
    session: &CurrentSession,
    business_id: Uuid,
) -> Result<Business, HttpResponse> {
    match store.get_business(business_id).await {
        Ok(Some(business))
            if session.profile.is_admin() || business.owner_id == session.profile.id =>
        {
            Ok(business)
        }
        Ok(Some(_)) => Err(forbidden("You do not have access to this business")),
        Ok(None) => Err(HttpResponse::NotFound()
            .json(ApiResponse::<()>::error("Business not found".into()))),
        Err(err) => {
            log::error!("Failed to fetch business: {err:?}");
            Err(HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to load business".into())))
        }
    }
}

// ============================================================================
// HEALTH CHECK
// ============================================================================

#[get("/health")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "trusthub-directory-service",
        "timestamp": chrono::Utc::now()
    }))
}

// ============================================================================
// AUTH & PROFILE
// ============================================================================

#[post("/auth/signup")]
pub async fn signup(store: StoreData, payload: web::Json<SignupRequest>) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    match auth::sign_up(store.get_ref(), body).await {
        Ok(profile) => HttpResponse::Created().json(ApiResponse::success(profile)),
        Err(AuthError::EmailTaken) => HttpResponse::Conflict()
            .json(ApiResponse::<()>::error(AuthError::EmailTaken.to_string())),
        Err(err) => {
            log::error!("Failed to sign up: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to create account".into()))
        }
    }
}

#[post("/auth/login")]
pub async fn login(
    store: StoreData,
    settings: web::Data<SessionSettings>,
    payload: web::Json<LoginRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    match auth::sign_in(store.get_ref(), &body, settings.ttl).await {
        Ok((session, profile)) => HttpResponse::Ok()
            .cookie(settings.cookie(&session.token))
            .json(ApiResponse::success(LoginResponse {
                token: session.token,
                expires_at: session.expires_at,
                profile,
            })),
        Err(AuthError::InvalidCredentials) => HttpResponse::Unauthorized()
            .json(ApiResponse::<()>::error(AuthError::InvalidCredentials.to_string())),
        Err(err) => {
            log::error!("Failed to sign in: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to sign in".into()))
        }
    }
}

#[post("/auth/logout")]
pub async fn logout(
    store: StoreData,
    settings: web::Data<SessionSettings>,
    session: MaybeSession,
) -> impl Responder {
    if let Some(session) = session.0 {
        if let Err(err) = auth::sign_out(store.get_ref(), &session.token).await {
            log::error!("Failed to end session: {err:?}");
        }
    }
    HttpResponse::NoContent()
        .cookie(settings.removal_cookie())
        .finish()
}

#[get("/profile/me")]
pub async fn get_my_profile(session: Authenticated) -> impl Responder {
    HttpResponse::Ok().json(ApiResponse::success(session.0.profile))
}

#[patch("/profile/me")]
pub async fn update_my_profile(
    store: StoreData,
    session: Authenticated,
    payload: web::Json<UpdateProfileRequest>,
) -> impl Responder {
    let changes = payload.into_inner().into_changes();
    match store.update_profile(session.0.profile.id, changes).await {
        Ok(profile) => HttpResponse::Ok().json(ApiResponse::success(profile)),
        Err(StoreError::NotFound) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Profile not found".into()))
        }
        Err(err) => {
            log::error!("Failed to update profile: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to update profile".into()))
        }
    }
}

// ============================================================================
// DIRECTORY (public + admin)
// ============================================================================

#[derive(Deserialize)]
pub struct DirectoryQuery {
    pub search: Option<String>,
    pub status: Option<String>,
}

#[get("/businesses/verified")]
pub async fn list_verified_businesses(store: StoreData) -> impl Responder {
    match store.list_businesses(BusinessScope::Verified).await {
        Ok(businesses) => HttpResponse::Ok()
            .insert_header((header::CACHE_CONTROL, "no-cache"))
            .json(ApiResponse::success(businesses)),
        Err(err) => {
            log::error!("Failed to list verified businesses: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to list businesses".into()))
        }
    }
}

#[get("/businesses")]
pub async fn list_all_businesses(
    store: StoreData,
    session: Authenticated,
    query: web::Query<DirectoryQuery>,
) -> impl Responder {
    if let Err(response) = require_admin(&session.0) {
        return response;
    }

    let filter = match StatusFilter::parse(query.status.as_deref()) {
        Ok(filter) => filter,
        Err(message) => return HttpResponse::BadRequest().json(ApiResponse::<()>::error(message)),
    };

    match store.list_businesses(BusinessScope::All).await {
        Ok(businesses) => {
            let search = query.search.as_deref().unwrap_or_default();
            let matches: Vec<&Business> =
                directory::search(&businesses, search, filter, SearchFields::Admin);
            HttpResponse::Ok()
                .insert_header((header::CACHE_CONTROL, "no-cache"))
                .json(ApiResponse::success(matches))
        }
        Err(err) => {
            log::error!("Failed to list businesses: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to list businesses".into()))
        }
    }
}

#[get("/businesses/{business_id}")]
pub async fn get_business(store: StoreData, business_id: web::Path<Uuid>) -> impl Responder {
    let business_id = business_id.into_inner();
    match store.get_business(business_id).await {
        Ok(Some(business)) => HttpResponse::Ok()
            .insert_header((header::CACHE_CONTROL, "no-cache"))
            .json(ApiResponse::success(business)),
        Ok(None) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Business not found".into()))
        }
        Err(err) => {
            log::error!("Failed to get business: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to get business".into()))
        }
    }
}

#[patch("/businesses/{business_id}")]
pub async fn update_business_status(
    store: StoreData,
    session: Authenticated,
    business_id: web::Path<Uuid>,
    payload: web::Json<UpdateStatusRequest>,
) -> impl Responder {
    if let Err(response) = require_admin(&session.0) {
        return response;
    }

    let business_id = business_id.into_inner();
    let UpdateStatusRequest {
        status,
        trust_score,
    } = payload.into_inner();
    let change = StatusChange {
        status,
        trust_score,
    };

    match verification::set_status(store.get_ref(), business_id, change).await {
        Ok(business) => HttpResponse::Ok().json(ApiResponse::success(business)),
        Err(err @ VerificationError::TrustScoreOutOfRange(_)) => {
            HttpResponse::BadRequest().json(ApiResponse::<()>::error(err.to_string()))
        }
        Err(VerificationError::NotFound) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Business not found".into()))
        }
        Err(err) => {
            log::error!("Failed to update business status: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to update business status".into()))
        }
    }
}

// ============================================================================
// INCOME RECORDS
// ============================================================================

#[get("/businesses/{business_id}/income-records")]
pub async fn list_income_records(
    store: StoreData,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    let business_id = business_id.into_inner();
    match store.get_business(business_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return HttpResponse::NotFound()
                .json(ApiResponse::<()>::error("Business not found".into()))
        }
        Err(err) => {
            log::error!("Failed to fetch business: {err:?}");
            return HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to list income records".into()));
        }
    }

    match store.list_income_records(business_id).await {
        Ok(records) => HttpResponse::Ok().json(ApiResponse::success(records)),
        Err(err) => {
            log::error!("Failed to list income records: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to list income records".into()))
        }
    }
}

#[post("/businesses/{business_id}/income-records")]
pub async fn add_income_record(
    store: StoreData,
    session: Authenticated,
    business_id: web::Path<Uuid>,
    payload: web::Json<IncomeRecordRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    let business =
        match load_managed_business(store.get_ref(), &session.0, business_id.into_inner()).await {
            Ok(business) => business,
            Err(response) => return response,
        };

    match store
        .upsert_income_record(business.id, &body.month, body.amount)
        .await
    {
        Ok(record) => HttpResponse::Ok().json(ApiResponse::success(record)),
        Err(StoreError::NotFound) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Business not found".into()))
        }
        Err(err) => {
            log::error!("Failed to save income record: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to save income record".into()))
        }
    }
}

// ============================================================================
// OWNER BUSINESSES
// ============================================================================

#[get("/user/businesses")]
pub async fn list_my_businesses(store: StoreData, session: Authenticated) -> impl Responder {
    match store
        .list_businesses(BusinessScope::OwnedBy(session.0.profile.id))
        .await
    {
        Ok(businesses) => HttpResponse::Ok()
            .insert_header((header::CACHE_CONTROL, "no-cache"))
            .json(ApiResponse::success(businesses)),
        Err(err) => {
            log::error!("Failed to list businesses: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to list businesses".into()))
        }
    }
}

/// Shared by the API and the registration view.
pub(crate) async fn register_business(
    store: &dyn Store,
    session: &CurrentSession,
    body: CreateBusinessRequest,
) -> HttpResponse {
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    let new_business = body.into_new_business(session.profile.id);
    match store.create_business(new_business).await {
        Ok(business) => {
            log::info!("Business {} registered by {}", business.id, session.profile.id);
            HttpResponse::Created().json(ApiResponse::success(business))
        }
        Err(err) => {
            log::error!("Failed to create business: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to register business".into()))
        }
    }
}

#[post("/user/businesses")]
pub async fn create_business(
    store: StoreData,
    session: Authenticated,
    payload: web::Json<CreateBusinessRequest>,
) -> impl Responder {
    register_business(store.get_ref(), &session.0, payload.into_inner()).await
}

#[get("/user/businesses/{business_id}")]
pub async fn get_my_business(
    store: StoreData,
    session: Authenticated,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    match load_managed_business(store.get_ref(), &session.0, business_id.into_inner()).await {
        Ok(business) => HttpResponse::Ok().json(ApiResponse::success(business)),
        Err(response) => response,
    }
}

#[patch("/user/businesses/{business_id}")]
pub async fn update_my_business(
    store: StoreData,
    session: Authenticated,
    business_id: web::Path<Uuid>,
    payload: web::Json<UpdateBusinessRequest>,
) -> impl Responder {
    let body = payload.into_inner();
    if let Err(e) = body.validate() {
        return HttpResponse::BadRequest()
            .json(ApiResponse::<()>::error(format!("Validation failed: {}", e)));
    }

    let existing =
        match load_managed_business(store.get_ref(), &session.0, business_id.into_inner()).await {
            Ok(business) => business,
            Err(response) => return response,
        };

    let changes = body.into_changes();
    if changes.is_empty() {
        return HttpResponse::Ok().json(ApiResponse::success(existing));
    }

    match store.update_business(existing.id, changes).await {
        Ok(updated) => HttpResponse::Ok().json(ApiResponse::success(updated)),
        Err(StoreError::NotFound) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Business not found".into()))
        }
        Err(err) => {
            log::error!("Failed to update business: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to update business".into()))
        }
    }
}

#[delete("/user/businesses/{business_id}")]
pub async fn delete_my_business(
    store: StoreData,
    session: Authenticated,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    let existing =
        match load_managed_business(store.get_ref(), &session.0, business_id.into_inner()).await {
            Ok(business) => business,
            Err(response) => return response,
        };

    match store.delete_business(existing.id).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(StoreError::NotFound) => {
            HttpResponse::NotFound().json(ApiResponse::<()>::error("Business not found".into()))
        }
        Err(err) => {
            log::error!("Failed to delete business: {err:?}");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<()>::error("Failed to delete business".into()))
        }
    }
}
