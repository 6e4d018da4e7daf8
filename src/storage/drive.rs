use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{header::CONTENT_TYPE, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;

use super::{ByteStream, ObjectStorage, StorageError, StoredObject};
use crate::config::DriveConfig;

const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
/// Access tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Google Drive v3 client authenticated with an OAuth refresh token.
pub struct DriveClient {
    http: Client,
    config: DriveConfig,
    token: Mutex<Option<AccessToken>>,
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Token endpoint response for both the refresh and the code-exchange grants.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    web_view_link: Option<String>,
}

impl DriveClient {
    pub fn new(config: DriveConfig) -> Result<Self, StorageError> {
        config
            .require_credentials()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let http = Client::builder()
            .user_agent(concat!("iruvade-api/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    /// Obtains an access token now so bad credentials fail at startup.
    pub async fn authorize(&self) -> Result<(), StorageError> {
        self.access_token().await.map(|_| ())
    }

    async fn access_token(&self) -> Result<String, StorageError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + EXPIRY_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", self.config.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let response = self.http.post(&self.config.token_url).form(&params).send().await?;
        let token: TokenResponse = token_response(response).await?;

        let lifetime = Duration::from_secs(token.expires_in.unwrap_or(3600));
        tracing::debug!("Refreshed Drive access token, valid for {}s", lifetime.as_secs());

        let value = token.access_token.clone();
        *cached = Some(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + lifetime,
        });
        Ok(value)
    }

    fn files_url(&self, base: &str, id: Option<&str>) -> Result<Url, StorageError> {
        let mut url = Url::parse(base).map_err(|e| StorageError::Config(format!("{}: {}", base, e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::Config(format!("{} cannot be a base URL", base)))?;
            segments.pop_if_empty().push("files");
            if let Some(id) = id {
                segments.push(id);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl ObjectStorage for DriveClient {
    async fn upload(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
        folder: Option<&str>,
    ) -> Result<StoredObject, StorageError> {
        let content = tokio::fs::read(path).await?;
        let token = self.access_token().await?;

        let boundary = format!("iruvade-{}", Uuid::new_v4().simple());
        let body = related_body(&boundary, &file_metadata(name, mime_type, folder), mime_type, &content);

        let mut url = self.files_url(&self.config.upload_base_url, None)?;
        url.query_pairs_mut()
            .append_pair("uploadType", "multipart")
            .append_pair("fields", "id,webViewLink");

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, format!("multipart/related; boundary={}", boundary))
            .body(body)
            .send()
            .await?;
        let file: DriveFile = check(response, None).await?.json().await?;

        tracing::info!("Uploaded {} ({} bytes) to Drive as {}", name, content.len(), file.id);

        let locator = file
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", file.id));
        Ok(StoredObject { id: file.id, locator })
    }

    async fn download(&self, id: &str) -> Result<ByteStream, StorageError> {
        let token = self.access_token().await?;
        let mut url = self.files_url(&self.config.api_base_url, Some(id))?;
        url.query_pairs_mut().append_pair("alt", "media");

        let response = self.http.get(url).bearer_auth(token).send().await?;
        let response = check(response, Some(id)).await?;

        Ok(response.bytes_stream().map_err(StorageError::from).boxed())
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let token = self.access_token().await?;
        let url = self.files_url(&self.config.api_base_url, Some(id))?;

        let response = self.http.delete(url).bearer_auth(token).send().await?;
        check(response, Some(id)).await?;

        tracing::info!("Deleted Drive file {}", id);
        Ok(())
    }
}

/// Consent URL for obtaining a refresh token with offline access.
pub fn authorization_url(config: &DriveConfig) -> Result<Url, StorageError> {
    let redirect_uri = config
        .redirect_uri
        .as_deref()
        .ok_or_else(|| StorageError::Config("no redirect URI configured".to_string()))?;
    if config.client_id.is_empty() {
        return Err(StorageError::Config("no OAuth client id configured".to_string()));
    }

    Url::parse_with_params(
        AUTH_URL,
        &[
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("scope", DRIVE_SCOPE),
        ],
    )
    .map_err(|e| StorageError::Config(e.to_string()))
}

/// Trades a one-time authorization code for tokens.
pub async fn exchange_code(config: &DriveConfig, code: &str) -> Result<TokenResponse, StorageError> {
    let redirect_uri = config
        .redirect_uri
        .as_deref()
        .ok_or_else(|| StorageError::Config("no redirect URI configured".to_string()))?;

    let params = [
        ("client_id", config.client_id.as_str()),
        ("client_secret", config.client_secret.as_str()),
        ("code", code),
        ("redirect_uri", redirect_uri),
        ("grant_type", "authorization_code"),
    ];
    let response = Client::new().post(&config.token_url).form(&params).send().await?;
    token_response(response).await
}

async fn token_response(response: Response) -> Result<TokenResponse, StorageError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StorageError::Auth(format!("token endpoint returned {}: {}", status, body)));
    }
    Ok(response.json().await?)
}

async fn check(response: Response, id: Option<&str>) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if let (StatusCode::NOT_FOUND, Some(id)) = (status, id) {
        return Err(StorageError::NotFound(id.to_string()));
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(StorageError::Auth("access token rejected".to_string()));
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Status {
        status: status.as_u16(),
        body,
    })
}

fn file_metadata(name: &str, mime_type: &str, folder: Option<&str>) -> Value {
    let mut metadata = Map::new();
    metadata.insert("name".into(), json!(name));
    metadata.insert("mimeType".into(), json!(mime_type));
    if let Some(folder) = folder {
        metadata.insert("parents".into(), json!([folder]));
    }
    Value::Object(metadata)
}

/// Builds a `multipart/related` body: JSON metadata part, then the media part.
fn related_body(boundary: &str, metadata: &Value, mime_type: &str, content: &[u8]) -> Vec<u8> {
    let head = format!(
        "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{meta}\r\n--{b}\r\nContent-Type: {mime}\r\n\r\n",
        b = boundary,
        meta = metadata,
        mime = mime_type
    );
    let tail = format!("\r\n--{}--\r\n", boundary);

    let mut body = Vec::with_capacity(head.len() + content.len() + tail.len());
    body.extend_from_slice(head.as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(tail.as_bytes());
    body
}
