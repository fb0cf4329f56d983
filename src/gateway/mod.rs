//! HTTP session gateway: login/register/logout/whoami plus the admin
//! session listing, all stateless beyond the session store.

pub mod handlers;

use std::future::Future;
use std::pin::Pin;

use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};

use crate::error::AppError;
use crate::session::Identity;
use crate::AppState;

/// Session cookie name shared by the gateway and the upgrade guard.
pub const AUTH_COOKIE: &str = "AuthToken";

/// Builds the session cookie: http-only, SameSite=Strict, session-lifetime
/// (expiry is the session store's concern, not the cookie's).
pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build(AUTH_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .finish()
}

pub fn clear_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(AUTH_COOKIE, "");
    cookie.set_path("/");
    cookie.make_removal();
    cookie
}

/// Extractor resolving the request's session cookie to an identity
/// snapshot. Fails the request with 401 when the cookie is missing or its
/// token is no longer in the store.
pub struct AuthedUser(pub Identity);

impl FromRequest for AuthedUser {
    type Error = AppError;
    type Future = Pin<Box<dyn Future<Output = Result<Self, AppError>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let token = req.cookie(AUTH_COOKIE).map(|c| c.value().to_owned());
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let state =
                state.ok_or_else(|| AppError::Internal("application state missing".into()))?;
            let token = token.ok_or(AppError::Unauthorized)?;
            state
                .sessions
                .lookup(&token)
                .await
                .map(AuthedUser)
                .ok_or(AppError::Unauthorized)
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/v1/login", web::post().to(handlers::login))
        .route("/api/v1/register", web::post().to(handlers::register))
        .route("/api/v1/logout", web::post().to(handlers::logout))
        .route("/api/v1/user", web::get().to(handlers::whoami))
        .route("/api/v1/all", web::get().to(handlers::list_sessions))
        .route("/health", web::get().to(crate::health_check));
}
