pub mod config;
pub mod directory;
pub mod error;
pub mod gateway;
pub mod relay;
pub mod session;

use std::sync::Arc;

use actix_web::{web, HttpResponse};

pub use config::Settings;
pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;

use directory::{Directory, InMemoryDirectory, NewUser};
use relay::BroadcastHub;
use session::SessionStore;

/// Health check endpoint handler
/// Returns a JSON response with server status and live counters
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "sessions": state.sessions.session_count().await,
        "connections": state.hub.connection_count().await,
    }))
}

/// Application state shared by the HTTP gateway and the streaming relay.
/// All of it is volatile; a restart forgets every session and connection.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub directory: Arc<dyn Directory>,
    pub sessions: Arc<SessionStore>,
    pub hub: Arc<BroadcastHub>,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        let directory = InMemoryDirectory::new(config.directory.allowlist.iter().cloned());

        if let (Some(username), Some(email), Some(password)) = (
            &config.directory.seed_admin_username,
            &config.directory.seed_admin_email,
            &config.directory.seed_admin_password,
        ) {
            directory
                .create_user(NewUser {
                    username: username.clone(),
                    email: email.to_lowercase(),
                    password: password.clone(),
                    color: directory::random_color(),
                    admin: true,
                })
                .await?;
            tracing::info!("seeded admin account {}", username);
        }

        Ok(Self {
            config: Arc::new(config),
            directory: Arc::new(directory),
            sessions: Arc::new(SessionStore::new()),
            hub: Arc::new(BroadcastHub::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_app_state_seeds_admin() {
        let mut config = Settings::new_for_test().expect("Failed to load test config");
        config.directory.seed_admin_username = Some("root".into());
        config.directory.seed_admin_email = Some("Root@Example.com".into());
        config.directory.seed_admin_password = Some("rootpw".into());

        let state = AppState::new(config).await.unwrap();
        let record = state
            .directory
            .find_by_username_or_email(Some("root"), None)
            .await
            .unwrap()
            .expect("seeded admin present");
        assert!(record.admin);
        assert_eq!(record.email, "root@example.com");
    }

    #[tokio::test]
    async fn test_app_state_clone_shares_state() {
        let config = Settings::new_for_test().expect("Failed to load test config");
        let state = AppState::new(config).await.unwrap();
        let cloned = state.clone();

        assert!(Arc::ptr_eq(&state.sessions, &cloned.sessions));
        assert!(Arc::ptr_eq(&state.hub, &cloned.hub));
        assert!(Arc::ptr_eq(&state.config, &cloned.config));
    }
}
