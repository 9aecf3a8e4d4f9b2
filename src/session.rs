//! Session resolution and the request gate for the view routes.

use actix_web::{
    body::{BoxBody, MessageBody},
    cookie::{time, Cookie, SameSite},
    dev::{Payload, ServiceRequest, ServiceResponse},
    http::{header, StatusCode},
    middleware::Next,
    web, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse, ResponseError,
};
use chrono::{Duration, Utc};
use futures_util::future::LocalBoxFuture;
use thiserror::Error;
use url::form_urlencoded;

use crate::models::{ApiResponse, Profile};
use crate::store::Store;

pub const SESSION_COOKIE: &str = "session_access_token";
pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

const AUTHENTICATED_ROUTES: &[&str] = &["/businesses/register", "/dashboard", "/my-businesses"];
const ADMIN_ROUTES: &[&str] = &["/admin"];
const AUTH_ENTRY_ROUTES: &[&str] = &["/login", "/signup"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Authenticated,
    Admin,
    AuthEntry,
}

pub fn classify(path: &str) -> RouteClass {
    let under = |routes: &[&str]| routes.iter().any(|route| path.starts_with(route));

    if under(AUTHENTICATED_ROUTES) {
        RouteClass::Authenticated
    } else if under(ADMIN_ROUTES) {
        RouteClass::Admin
    } else if under(AUTH_ENTRY_ROUTES) {
        RouteClass::AuthEntry
    } else {
        RouteClass::Public
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Redirect(String),
}

/// `/login?redirect=<path>`
pub fn login_redirect(path: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("redirect", path)
        .finish();
    format!("{LOGIN_PATH}?{query}")
}

pub fn decide(path: &str, session: Option<&Profile>) -> GateDecision {
    match (classify(path), session) {
        (RouteClass::Authenticated, None) => GateDecision::Redirect(login_redirect(path)),
        (RouteClass::Admin, None) => GateDecision::Redirect(LOGIN_PATH.to_string()),
        (RouteClass::Admin, Some(profile)) if !profile.is_admin() => {
            GateDecision::Redirect(HOME_PATH.to_string())
        }
        (RouteClass::AuthEntry, Some(_)) => GateDecision::Redirect(HOME_PATH.to_string()),
        _ => GateDecision::Proceed,
    }
}

/// Session attached to a request
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub token: String,
    pub profile: Profile,
}

/// Result of the gate's lookup, kept in request extensions.
#[derive(Debug, Clone)]
struct ResolvedSession(Option<CurrentSession>);

/// Lifetime and cookie flags for issued sessions
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ttl: Duration,
    pub cookie_secure: bool,
}

impl SessionSettings {
    pub fn cookie(&self, token: &str) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, token.to_string())
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.cookie_secure)
            .max_age(time::Duration::seconds(self.ttl.num_seconds()))
            .finish()
    }

    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(SESSION_COOKIE, "")
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.cookie_secure)
            .finish();
        cookie.make_removal();
        cookie
    }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Cookie first, then `Authorization: Bearer`.
pub fn session_token(req: &HttpRequest) -> Option<String> {
    req.cookie(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| bearer_token(req))
}

async fn resolve(store: &dyn Store, token: String) -> Option<CurrentSession> {
    match store.resolve_session(&token, Utc::now()).await {
        Ok(profile) => profile.map(|profile| CurrentSession { token, profile }),
        Err(err) => {
            log::error!("Failed to resolve session: {err:?}");
            None
        }
    }
}

/// Runs before every handler. Only the session cookie is consulted here.
pub async fn gate(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let token = req
        .cookie(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|token| !token.is_empty());
    let store = req.app_data::<web::Data<dyn Store>>().cloned();

    let session = match (token.clone(), store) {
        (Some(token), Some(store)) => resolve(store.get_ref(), token).await,
        _ => None,
    };

    let path = req.path().to_string();
    if let GateDecision::Redirect(location) = decide(&path, session.as_ref().map(|s| &s.profile)) {
        log::debug!("Gate redirecting {} to {}", path, location);
        let response = HttpResponse::Found()
            .insert_header((header::LOCATION, location))
            .finish();
        return Ok(req.into_response(response));
    }

    if token.is_some() {
        req.extensions_mut().insert(ResolvedSession(session));
    }

    Ok(next.call(req).await?.map_into_boxed_body())
}

#[derive(Debug, Error)]
#[error("Not authenticated")]
pub struct NotAuthenticated;

impl ResponseError for NotAuthenticated {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse<BoxBody> {
        HttpResponse::Unauthorized().json(ApiResponse::<()>::error(self.to_string()))
    }
}

/// Extracts the session if there is one.
pub struct MaybeSession(pub Option<CurrentSession>);

impl FromRequest for MaybeSession {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        if let Some(resolved) = req.extensions().get::<ResolvedSession>() {
            let session = resolved.0.clone();
            return Box::pin(async move { Ok(MaybeSession(session)) });
        }

        let token = session_token(req);
        let store = req.app_data::<web::Data<dyn Store>>().cloned();
        Box::pin(async move {
            let session = match (token, store) {
                (Some(token), Some(store)) => resolve(store.get_ref(), token).await,
                _ => None,
            };
            Ok(MaybeSession(session))
        })
    }
}

/// Rejects the request with `401` when there is no session.
pub struct Authenticated(pub CurrentSession);

impl FromRequest for Authenticated {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let maybe = MaybeSession::from_request(req, payload);
        Box::pin(async move {
            match maybe.await?.0 {
                Some(session) => Ok(Authenticated(session)),
                None => Err(NotAuthenticated.into()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use uuid::Uuid;

    fn profile(role: UserRole) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            email: "someone@example.com".into(),
            full_name: None,
            avatar_url: None,
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn redirect_param(location: &str) -> Option<String> {
        let (_, query) = location.split_once('?')?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == "redirect")
            .map(|(_, value)| value.into_owned())
    }

    #[test]
    fn routes_are_classified_by_prefix() {
        assert_eq!(classify("/dashboard"), RouteClass::Authenticated);
        assert_eq!(classify("/businesses/register"), RouteClass::Authenticated);
        assert_eq!(classify("/my-businesses/42"), RouteClass::Authenticated);
        assert_eq!(classify("/admin"), RouteClass::Admin);
        assert_eq!(classify("/login"), RouteClass::AuthEntry);
        assert_eq!(classify("/signup"), RouteClass::AuthEntry);
        assert_eq!(classify("/businesses"), RouteClass::Public);
        assert_eq!(classify("/businesses/9b2c"), RouteClass::Public);
        assert_eq!(classify("/"), RouteClass::Public);
    }

    #[test]
    fn anonymous_protected_requests_carry_the_original_path() {
        for path in ["/dashboard", "/businesses/register"] {
            match decide(path, None) {
                GateDecision::Redirect(location) => {
                    assert!(location.starts_with("/login?"));
                    assert_eq!(redirect_param(&location).as_deref(), Some(path));
                }
                other => panic!("expected redirect for {path}, got {other:?}"),
            }
        }
    }

    #[test]
    fn anonymous_admin_requests_go_to_login() {
        assert_eq!(decide("/admin", None), GateDecision::Redirect("/login".into()));
    }

    #[test]
    fn non_admin_sessions_are_turned_away_from_admin() {
        let user = profile(UserRole::User);
        let admin = profile(UserRole::Admin);
        assert_eq!(decide("/admin", Some(&user)), GateDecision::Redirect("/".into()));
        assert_eq!(decide("/admin", Some(&admin)), GateDecision::Proceed);
    }

    #[test]
    fn signed_in_users_skip_auth_entry_points() {
        let user = profile(UserRole::User);
        assert_eq!(decide("/login", Some(&user)), GateDecision::Redirect("/".into()));
        assert_eq!(decide("/signup", Some(&user)), GateDecision::Redirect("/".into()));
        assert_eq!(decide("/login", None), GateDecision::Proceed);
        assert_eq!(decide("/dashboard", Some(&user)), GateDecision::Proceed);
        assert_eq!(decide("/businesses", None), GateDecision::Proceed);
    }

    #[test]
    fn session_cookie_flags() {
        let settings = SessionSettings {
            ttl: Duration::days(7),
            cookie_secure: true,
        };
        let cookie = settings.cookie("abc");
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(time::Duration::days(7)));
    }
}
