use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Media type every uploaded file must declare.
pub const CSV_MEDIA_TYPE: &str = "text/csv";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub upload: UploadConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

/// How a decoded batch is written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    /// One atomic batch; a failure stores nothing.
    Transactional,
    /// Concurrent independent inserts with per-row outcomes.
    BestEffort,
}

impl FromStr for PersistMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "transactional" | "atomic" => Ok(PersistMode::Transactional),
            "best_effort" => Ok(PersistMode::BestEffort),
            other => Err(format!("unknown persist mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub field_name: String,
    pub max_file_size_bytes: u64,
    pub persist_mode: PersistMode,
    pub timeout_secs: u64,
    pub staging_dir: Option<PathBuf>,
}

impl UploadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Directory the upload is spooled into while it is processed.
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(env::temp_dir)
    }

    /// Body limit for the upload route: the file ceiling plus room for multipart framing.
    pub fn body_limit(&self) -> usize {
        const MULTIPART_OVERHEAD: u64 = 64 * 1024;
        usize::try_from(self.max_file_size_bytes.saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub session_cookie: String,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("STORE_BACKEND") {
            self.database.backend = v.parse().unwrap_or(self.database.backend);
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Upload overrides
        if let Ok(v) = env::var("UPLOAD_FIELD_NAME") {
            if !v.trim().is_empty() {
                self.upload.field_name = v.trim().to_string();
            }
        }
        if let Ok(v) = env::var("UPLOAD_MAX_FILE_SIZE_BYTES") {
            self.upload.max_file_size_bytes = v.parse().unwrap_or(self.upload.max_file_size_bytes);
        }
        if let Ok(v) = env::var("UPLOAD_PERSIST_MODE") {
            self.upload.persist_mode = v.parse().unwrap_or(self.upload.persist_mode);
        }
        if let Ok(v) = env::var("UPLOAD_TIMEOUT_SECS") {
            self.upload.timeout_secs = v.parse().unwrap_or(self.upload.timeout_secs);
        }
        if let Ok(v) = env::var("UPLOAD_STAGING_DIR") {
            self.upload.staging_dir = Some(PathBuf::from(v));
        }

        // API overrides
        if let Ok(v) = env::var("API_PORT").or_else(|_| env::var("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_SESSION_COOKIE") {
            self.security.session_cookie = v;
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            upload: UploadConfig {
                field_name: "file".to_string(),
                max_file_size_bytes: 10_000_000,
                persist_mode: PersistMode::Transactional,
                timeout_secs: 60,
                staging_dir: None,
            },
            api: ApiConfig { port: 3000 },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24 * 7, // 1 week
                session_cookie: "session_token".to_string(),
                cors_origins: Vec::new(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            upload: UploadConfig {
                field_name: "file".to_string(),
                max_file_size_bytes: 10_000_000,
                persist_mode: PersistMode::Transactional,
                timeout_secs: 30,
                staging_dir: None,
            },
            api: ApiConfig { port: 3000 },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                session_cookie: "session_token".to_string(),
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            upload: UploadConfig {
                field_name: "file".to_string(),
                max_file_size_bytes: 10_000_000,
                persist_mode: PersistMode::Transactional,
                timeout_secs: 30,
                staging_dir: None,
            },
            api: ApiConfig { port: 3000 },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                session_cookie: "__Secure-session_token".to_string(),
                cors_origins: vec!["https://app.example.com".to_string()],
            },
        }
    }
}

// Global config for the binaries - the request path receives its copy through AppState
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.upload.max_file_size_bytes, 10_000_000);
        assert_eq!(config.upload.field_name, "file");
        assert_eq!(config.upload.persist_mode, PersistMode::Transactional);
        assert!(config.security.cors_origins.is_empty());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.database.max_connections, 50);
        assert_eq!(config.security.jwt_expiry_hours, 4);
        assert!(!config.security.cors_origins.is_empty());
    }

    #[test]
    fn parses_persist_modes() {
        assert_eq!("transactional".parse::<PersistMode>(), Ok(PersistMode::Transactional));
        assert_eq!("best-effort".parse::<PersistMode>(), Ok(PersistMode::BestEffort));
        assert_eq!("BEST_EFFORT".parse::<PersistMode>(), Ok(PersistMode::BestEffort));
        assert!("sometimes".parse::<PersistMode>().is_err());
    }

    #[test]
    fn parses_store_backends() {
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("PostgreSQL".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn body_limit_leaves_room_for_framing() {
        let config = AppConfig::development();
        assert!(config.upload.body_limit() as u64 > config.upload.max_file_size_bytes);
    }
}
