//! Page-level view models. Every route here sits behind `session::gate`.

use actix_web::{get, http::header, post, web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::directory::{self, IncomeSummary, SearchFields, StatusCounts, StatusFilter};
use crate::handlers::register_business;
use crate::models::{
    ApiResponse, Business, BusinessScope, BusinessStatus, CreateBusinessRequest, IncomeRecord,
    Profile,
};
use crate::session::Authenticated;
use crate::store::Store;

type StoreData = web::Data<dyn Store>;

const LATEST_VERIFIED_LIMIT: usize = 6;

fn not_found_view() -> HttpResponse {
    HttpResponse::NotFound().json(ApiResponse::<()>::error("Business not found".into()))
}

fn failed_view(message: &str) -> HttpResponse {
    HttpResponse::InternalServerError().json(ApiResponse::<()>::error(message.into()))
}

#[derive(Debug, Serialize)]
pub struct HomeView {
    pub total: usize,
    pub verified: usize,
    pub latest_verified: Vec<Business>,
}

#[derive(Debug, Serialize)]
pub struct DirectoryView<'a> {
    pub search: &'a str,
    pub status: StatusFilterLabel,
    pub counts: StatusCounts,
    pub businesses: Vec<&'a Business>,
}

/// `all` or a status name, as echoed back to the filter buttons.
#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct StatusFilterLabel(&'static str);

impl From<StatusFilter> for StatusFilterLabel {
    fn from(filter: StatusFilter) -> Self {
        match filter {
            StatusFilter::All => StatusFilterLabel("all"),
            StatusFilter::Only(status) => StatusFilterLabel(status.as_str()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BusinessDetailView {
    pub business: Business,
    pub income_records: Vec<IncomeRecord>,
    pub income_summary: Option<IncomeSummary>,
}

#[derive(Debug, Serialize)]
pub struct WizardStep {
    pub number: u8,
    pub name: &'static str,
    pub fields: &'static [&'static str],
}

pub const REGISTRATION_STEPS: [WizardStep; 4] = [
    WizardStep {
        number: 1,
        name: "BUSINESS INFO",
        fields: &["name", "industry", "description", "location", "address"],
    },
    WizardStep {
        number: 2,
        name: "CONTACT",
        fields: &["email", "phone", "website"],
    },
    WizardStep {
        number: 3,
        name: "DOCUMENTS",
        fields: &["registration_number", "logo_url"],
    },
    WizardStep {
        number: 4,
        name: "REVIEW",
        fields: &[],
    },
];

#[derive(Debug, Serialize)]
pub struct RegisterView {
    pub steps: &'static [WizardStep],
}

#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub profile: Profile,
    pub total: usize,
    pub verified: usize,
    pub pending: usize,
    pub businesses: Vec<Business>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextSteps {
    pub title: &'static str,
    pub message: &'static str,
}

impl NextSteps {
    pub fn for_status(status: BusinessStatus) -> Self {
        match status {
            BusinessStatus::Pending => NextSteps {
                title: "VERIFICATION PENDING",
                message: "Your business is awaiting verification. Our team will review your documents shortly.",
            },
            BusinessStatus::Verified => NextSteps {
                title: "VERIFIED BUSINESS",
                message: "Congratulations! Your business has been verified. You can now display the verification badge on your website and marketing materials.",
            },
            BusinessStatus::Unverified => NextSteps {
                title: "NOT YET VERIFIED",
                message: "Your business has not been verified. Make sure your registration details are complete.",
            },
            BusinessStatus::Rejected => NextSteps {
                title: "VERIFICATION REJECTED",
                message: "Unfortunately, your business verification was not approved. Please contact our support team for more details and next steps.",
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OwnerBusinessView {
    pub business: Business,
    pub income_records: Vec<IncomeRecord>,
    pub next_steps: NextSteps,
}

#[derive(Debug, Serialize)]
pub struct AdminView<'a> {
    pub search: &'a str,
    pub total: usize,
    pub verified: usize,
    pub pending: usize,
    pub businesses: Vec<&'a Business>,
}

#[derive(Debug, Serialize)]
pub struct AuthEntryView {
    pub view: &'static str,
    pub submit_to: &'static str,
    pub fields: &'static [&'static str],
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
    pub status: Option<String>,
}

#[get("/")]
pub async fn home(store: StoreData) -> impl Responder {
    match store.list_businesses(BusinessScope::All).await {
        Ok(businesses) => {
            let counts = StatusCounts::tally(&businesses);
            let latest_verified = businesses
                .into_iter()
                .filter(|b| b.status == BusinessStatus::Verified)
                .take(LATEST_VERIFIED_LIMIT)
                .collect();
            HttpResponse::Ok()
                .insert_header((header::CACHE_CONTROL, "no-cache"))
                .json(HomeView {
                    total: counts.all,
                    verified: counts.verified,
                    latest_verified,
                })
        }
        Err(err) => {
            log::error!("Failed to load home view: {err:?}");
            failed_view("Failed to load businesses")
        }
    }
}

// NOTE: registered ahead of `/businesses/{business_id}`.
#[get("/businesses/register")]
pub async fn register_form(_session: Authenticated) -> impl Responder {
    HttpResponse::Ok().json(RegisterView {
        steps: &REGISTRATION_STEPS,
    })
}

#[post("/businesses/register")]
pub async fn register_submit(
    store: StoreData,
    session: Authenticated,
    payload: web::Json<CreateBusinessRequest>,
) -> impl Responder {
    register_business(store.get_ref(), &session.0, payload.into_inner()).await
}

#[get("/businesses")]
pub async fn directory_view(store: StoreData, query: web::Query<SearchQuery>) -> impl Responder {
    let filter = match StatusFilter::parse(query.status.as_deref()) {
        Ok(filter) => filter,
        Err(message) => return HttpResponse::BadRequest().json(ApiResponse::<()>::error(message)),
    };

    match store.list_businesses(BusinessScope::All).await {
        Ok(businesses) => {
            let search = query.search.as_deref().unwrap_or_default().trim();
            let view = DirectoryView {
                search,
                status: filter.into(),
                counts: StatusCounts::tally(&businesses),
                businesses: directory::search(&businesses, search, filter, SearchFields::Directory),
            };
            HttpResponse::Ok()
                .insert_header((header::CACHE_CONTROL, "no-cache"))
                .json(view)
        }
        Err(err) => {
            log::error!("Failed to load directory: {err:?}");
            failed_view("Failed to load businesses")
        }
    }
}

#[get("/businesses/{business_id}")]
pub async fn business_detail(store: StoreData, business_id: web::Path<Uuid>) -> impl Responder {
    let business_id = business_id.into_inner();
    let business = match store.get_business(business_id).await {
        Ok(Some(business)) => business,
        Ok(None) => return not_found_view(),
        Err(err) => {
            log::error!("Failed to load business {business_id}: {err:?}");
            return failed_view("Failed to load business");
        }
    };

    match store.list_income_records(business_id).await {
        Ok(income_records) => {
            let income_summary = IncomeSummary::from_records(&income_records);
            HttpResponse::Ok().json(BusinessDetailView {
                business,
                income_records,
                income_summary,
            })
        }
        Err(err) => {
            log::error!("Failed to load income records for {business_id}: {err:?}");
            failed_view("Failed to load income records")
        }
    }
}

#[get("/dashboard")]
pub async fn dashboard(store: StoreData, session: Authenticated) -> impl Responder {
    let profile = session.0.profile;
    match store.list_businesses(BusinessScope::OwnedBy(profile.id)).await {
        Ok(businesses) => {
            let counts = StatusCounts::tally(&businesses);
            HttpResponse::Ok()
                .insert_header((header::CACHE_CONTROL, "no-cache"))
                .json(DashboardView {
                    profile,
                    total: counts.all,
                    verified: counts.verified,
                    pending: counts.pending,
                    businesses,
                })
        }
        Err(err) => {
            log::error!("Failed to load dashboard: {err:?}");
            failed_view("Failed to load businesses")
        }
    }
}

#[get("/my-businesses/{business_id}")]
pub async fn owner_business_detail(
    store: StoreData,
    session: Authenticated,
    business_id: web::Path<Uuid>,
) -> impl Responder {
    let business_id = business_id.into_inner();
    let profile = &session.0.profile;

    let business = match store.get_business(business_id).await {
        Ok(Some(business)) if profile.is_admin() || business.owner_id == profile.id => business,
        Ok(_) => return not_found_view(),
        Err(err) => {
            log::error!("Failed to load business {business_id}: {err:?}");
            return failed_view("Failed to load business");
        }
    };

    match store.list_income_records(business_id).await {
        Ok(income_records) => HttpResponse::Ok().json(OwnerBusinessView {
            next_steps: NextSteps::for_status(business.status),
            business,
            income_records,
        }),
        Err(err) => {
            log::error!("Failed to load income records for {business_id}: {err:?}");
            failed_view("Failed to load income records")
        }
    }
}

#[get("/admin")]
pub async fn admin_panel(
    store: StoreData,
    _session: Authenticated,
    query: web::Query<SearchQuery>,
) -> impl Responder {
    match store.list_businesses(BusinessScope::All).await {
        Ok(businesses) => {
            let counts = StatusCounts::tally(&businesses);
            let search = query.search.as_deref().unwrap_or_default().trim();
            HttpResponse::Ok()
                .insert_header((header::CACHE_CONTROL, "no-cache"))
                .json(AdminView {
                    search,
                    total: counts.all,
                    verified: counts.verified,
                    pending: counts.pending,
                    businesses: directory::search(
                        &businesses,
                        search,
                        StatusFilter::All,
                        SearchFields::Admin,
                    ),
                })
        }
        Err(err) => {
            log::error!("Failed to load admin panel: {err:?}");
            failed_view("Failed to load businesses")
        }
    }
}

#[get("/login")]
pub async fn login_view() -> impl Responder {
    HttpResponse::Ok().json(AuthEntryView {
        view: "login",
        submit_to: "/api/v1/auth/login",
        fields: &["email", "password"],
    })
}

#[get("/signup")]
pub async fn signup_view() -> impl Responder {
    HttpResponse::Ok().json(AuthEntryView {
        view: "signup",
        submit_to: "/api/v1/auth/signup",
        fields: &["full_name", "email", "password", "confirm_password"],
    })
}
