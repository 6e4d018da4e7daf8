use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub uploads: UploadConfig,
    pub drive: DriveConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(skip_serializing)]
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_photos: usize,
    pub max_videos: usize,
    pub max_archive_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    #[serde(skip_serializing)]
    pub refresh_token: String,
    pub redirect_uri: Option<String>,
    /// Folder that admin library uploads are placed in.
    pub upload_folder_id: Option<String>,
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub token_url: String,
    pub api_base_url: String,
    pub upload_base_url: String,
}

/// Shape of the OAuth client file downloaded from the Google console.
#[derive(Debug, Deserialize)]
struct CredentialsFile {
    web: Option<OAuthClient>,
    installed: Option<OAuthClient>,
}

#[derive(Debug, Deserialize)]
struct OAuthClient {
    client_id: String,
    client_secret: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TokenFile {
    refresh_token: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        let mut config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides();

        config.drive.load_credential_files()?;
        Ok(config)
    }

    /// Checks that everything the HTTP server cannot run without is present.
    pub fn require_server_secrets(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        if self.security.jwt_secret.is_empty() {
            return Err(ConfigError::Missing("JWT_SECRET"));
        }
        self.drive.require_credentials()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Some(v) = env::var("API_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Upload overrides
        if let Ok(v) = env::var("UPLOAD_MAX_PHOTOS") {
            self.uploads.max_photos = v.parse().unwrap_or(self.uploads.max_photos);
        }
        if let Ok(v) = env::var("UPLOAD_MAX_ARCHIVE_BYTES") {
            self.uploads.max_archive_bytes = v.parse().unwrap_or(self.uploads.max_archive_bytes);
        }

        // Drive overrides
        if let Ok(v) = env::var("DRIVE_CLIENT_ID") {
            self.drive.client_id = v;
        }
        if let Ok(v) = env::var("DRIVE_CLIENT_SECRET") {
            self.drive.client_secret = v;
        }
        if let Ok(v) = env::var("DRIVE_REFRESH_TOKEN") {
            self.drive.refresh_token = v;
        }
        if let Ok(v) = env::var("DRIVE_REDIRECT_URI") {
            self.drive.redirect_uri = Some(v);
        }
        if let Ok(v) = env::var("DRIVE_UPLOAD_FOLDER_ID") {
            self.drive.upload_folder_id = Some(v);
        }
        if let Ok(v) = env::var("DRIVE_CREDENTIALS_PATH") {
            self.drive.credentials_path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("DRIVE_TOKEN_PATH") {
            self.drive.token_path = PathBuf::from(v);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 10,
                connection_timeout: 30,
            },
            api: ApiConfig {
                port: 5050,
                enable_request_logging: true,
                max_request_size_bytes: 256 * 1024 * 1024, // 256MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            uploads: UploadConfig::default(),
            drive: DriveConfig::default(),
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 20,
                connection_timeout: 10,
            },
            api: ApiConfig {
                port: 5050,
                enable_request_logging: true,
                max_request_size_bytes: 160 * 1024 * 1024, // 160MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            uploads: UploadConfig::default(),
            drive: DriveConfig::default(),
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 50,
                connection_timeout: 5,
            },
            api: ApiConfig {
                port: 5050,
                enable_request_logging: false,
                max_request_size_bytes: 160 * 1024 * 1024, // 160MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            uploads: UploadConfig::default(),
            drive: DriveConfig::default(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_photos: 10,
            max_videos: 1,
            max_archive_bytes: 100 * 1024 * 1024, // 100MiB
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            redirect_uri: None,
            upload_folder_id: None,
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            api_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base_url: "https://www.googleapis.com/upload/drive/v3".to_string(),
        }
    }
}

impl DriveConfig {
    /// Fills client and refresh-token fields from the JSON files when the
    /// environment did not provide them. Absent files are not an error.
    fn load_credential_files(&mut self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() || self.client_secret.is_empty() {
            if let Some(file) = read_json::<CredentialsFile>(&self.credentials_path)? {
                if let Some(client) = file.web.or(file.installed) {
                    if self.client_id.is_empty() {
                        self.client_id = client.client_id;
                    }
                    if self.client_secret.is_empty() {
                        self.client_secret = client.client_secret;
                    }
                    if self.redirect_uri.is_none() {
                        self.redirect_uri = client.redirect_uris.into_iter().next();
                    }
                }
            }
        }

        if self.refresh_token.is_empty() {
            if let Some(TokenFile { refresh_token: Some(token) }) = read_json::<TokenFile>(&self.token_path)? {
                self.refresh_token = token;
            }
        }

        Ok(())
    }

    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::Missing("DRIVE_CLIENT_ID"));
        }
        if self.client_secret.is_empty() {
            return Err(ConfigError::Missing("DRIVE_CLIENT_SECRET"));
        }
        if self.refresh_token.is_empty() {
            return Err(ConfigError::Missing("DRIVE_REFRESH_TOKEN"));
        }
        Ok(())
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };
    serde_json::from_str(&raw).map(Some).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}
