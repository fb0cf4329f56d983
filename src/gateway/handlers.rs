use std::path::Path;

use actix_files::NamedFile;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::{info, warn};

use super::{clear_session_cookie, session_cookie, AuthedUser, AUTH_COOKIE};
use crate::directory::{random_color, NewUser};
use crate::error::{AppError, DirectoryError};
use crate::AppState;

const MAX_USERNAME_CHARS: usize = 32;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

/// Structural check only: one `@`, a non-empty local part, and a dot inside
/// the domain. Deliverability is not this server's problem.
fn is_valid_email(email: &str) -> bool {
    if email.contains(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let password = present(&req.password).ok_or(AppError::BadRequest)?;
    let username = present(&req.username);
    let email = present(&req.email).map(str::to_lowercase);
    if username.is_none() && email.is_none() {
        return Err(AppError::BadRequest);
    }

    // A directory failure is deliberately indistinguishable from a miss.
    let record = state
        .directory
        .find_by_username_or_email(username, email.as_deref())
        .await
        .unwrap_or_else(|e| {
            warn!("directory lookup failed: {}", e);
            None
        })
        .ok_or(AppError::Unauthorized)?;

    let valid = state
        .directory
        .verify_password(&record, password)
        .await
        .unwrap_or(false);
    if !valid {
        return Err(AppError::Unauthorized);
    }

    let identity = record.identity();
    let token = state.sessions.create(identity.clone()).await;
    info!("login: {}", identity.username);
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(token))
        .json(identity))
}

pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let email = present(&req.email).ok_or(AppError::BadRequest)?;
    let username = present(&req.username).ok_or(AppError::BadRequest)?;
    let password = present(&req.password).ok_or(AppError::BadRequest)?;
    if !is_valid_email(email) {
        return Err(AppError::BadRequest);
    }

    let email = email.to_lowercase();
    let username: String = username.chars().take(MAX_USERNAME_CHARS).collect();

    let allowed = state
        .directory
        .is_allowlisted(&email)
        .await
        .unwrap_or(false);
    if !allowed {
        return Err(AppError::Forbidden);
    }

    let existing = state
        .directory
        .find_by_username_or_email(Some(&username), Some(&email))
        .await
        .unwrap_or_else(|e| {
            warn!("directory lookup failed: {}", e);
            None
        });
    if existing.is_some() {
        return Err(AppError::Conflict);
    }

    let record = state
        .directory
        .create_user(NewUser {
            username,
            email,
            password: password.to_owned(),
            color: random_color(),
            admin: false,
        })
        .await
        .map_err(|e| match e {
            DirectoryError::Duplicate => AppError::Conflict,
            other => AppError::Directory(other),
        })?;

    let identity = record.identity();
    let token = state.sessions.create(identity.clone()).await;
    info!("registered: {}", identity.username);
    Ok(HttpResponse::Ok()
        .cookie(session_cookie(token))
        .json(identity))
}

/// Logout requires an active session; a request without one is a 400, not a
/// 401, matching the gateway's historical contract.
pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = req
        .cookie(AUTH_COOKIE)
        .map(|c| c.value().to_owned())
        .ok_or(AppError::BadRequest)?;

    if !state.sessions.revoke(&token).await {
        return Err(AppError::BadRequest);
    }

    Ok(HttpResponse::Ok().cookie(clear_session_cookie()).finish())
}

pub async fn whoami(user: AuthedUser) -> HttpResponse {
    HttpResponse::Ok().json(user.0)
}

pub async fn list_sessions(
    user: AuthedUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if !user.0.admin {
        return Err(AppError::Forbidden);
    }
    Ok(HttpResponse::Ok().json(state.sessions.list_all().await))
}

/// SPA fallback: unmatched paths get the entry document and the client-side
/// router takes it from there.
pub async fn spa_index(state: web::Data<AppState>) -> actix_web::Result<NamedFile> {
    let index = Path::new(&state.config.assets.public_dir).join("index.html");
    Ok(NamedFile::open(index)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@sub.example.co"));

        assert!(!is_valid_email("plainaddress"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("user@example."));
        assert!(!is_valid_email("user@@example.com"));
        assert!(!is_valid_email("us er@example.com"));
    }

    #[test]
    fn test_present_rejects_empty_strings() {
        assert_eq!(present(&Some("value".into())), Some("value"));
        assert_eq!(present(&Some(String::new())), None);
        assert_eq!(present(&None), None);
    }
}
