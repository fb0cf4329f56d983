use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    pub port: u16,
    pub heartbeat_interval_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssetsConfig {
    pub public_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DirectoryConfig {
    /// Emails allowed to register. Empty means registration is closed.
    pub allowlist: Vec<String>,
    #[serde(default)]
    pub seed_admin_username: Option<String>,
    #[serde(default)]
    pub seed_admin_email: Option<String>,
    #[serde(default)]
    pub seed_admin_password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub enabled: bool,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub server: ServerConfig,
    pub relay: RelayConfig,
    pub assets: AssetsConfig,
    pub directory: DirectoryConfig,
    pub cors: CorsConfig,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default values
            .set_default("environment", "development")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3040)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("relay.port", 3041)?
            .set_default("relay.heartbeat_interval_ms", 30_000)?
            .set_default("assets.public_dir", "public")?
            .set_default("directory.allowlist", Vec::<String>::new())?
            .set_default("cors.enabled", false)?
            .set_default("cors.allowed_origins", Vec::<String>::new())?
            // Add in settings from the config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add in settings from environment variables (with prefix "APP_")
            // E.g., `APP_SERVER__PORT=5001` would set `Settings.server.port`
            .add_source(
                Environment::with_prefix("app")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        s.try_deserialize()
    }

    #[cfg(test)]
    pub fn new_for_test() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("environment", "test")?
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3040)?
            .set_default("server.workers", 1)?
            .set_default("relay.port", 0)?
            .set_default("relay.heartbeat_interval_ms", 30_000)?
            .set_default("assets.public_dir", "public")?
            .set_default("directory.allowlist", Vec::<String>::new())?
            .set_default("cors.enabled", false)?
            .set_default("cors.allowed_origins", Vec::<String>::new())?
            .build()?
            .try_deserialize()
    }
}
