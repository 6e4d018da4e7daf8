// handlers/protected/files.rs - /api/files document library

use axum::{
    body::Body,
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Serialize;

use crate::error::ApiError;
use crate::extract::required;
use crate::middleware::{AdminOnly, ApiResponse, ApiResult, AuthUser, Authorized};
use crate::models::{NewFile, StoredFile};
use crate::state::AppState;
use crate::storage::StorageError;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    #[serde(flatten)]
    pub file: StoredFile,
    pub url: String,
}

struct FilePart {
    name: String,
    mime_type: String,
    bytes: Bytes,
}

/// POST /api/files/upload - multipart `title` and `file`, stored in the library folder
pub async fn upload(
    State(state): State<AppState>,
    admin: Authorized<AdminOnly>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<UploadedFile> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let mut title: Option<String> = None;
    let mut part: Option<FilePart> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "title" => {
                title = Some(field.text().await.map_err(|e| ApiError::bad_request(e.body_text()))?);
            }
            "file" => {
                if part.is_some() {
                    return Err(ApiError::bad_request("Only one file may be uploaded"));
                }
                let name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field.content_type().unwrap_or(DEFAULT_MIME_TYPE).to_string();
                let bytes = field.bytes().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
                part = Some(FilePart { name, mime_type, bytes });
            }
            other => return Err(ApiError::bad_request(format!("Unexpected field '{}'", other))),
        }
    }

    let title = required("title", title.as_deref())?.to_string();
    let part = part.ok_or_else(|| ApiError::field_error("file", "This field is required"))?;

    let staging = tempfile::tempdir().map_err(StorageError::from)?;
    let path = staging.path().join("upload");
    tokio::fs::write(&path, &part.bytes).await.map_err(StorageError::from)?;

    let folder = state.config.drive.upload_folder_id.as_deref();
    let uploaded = state.storage.upload(&path, &part.name, &part.mime_type, folder).await;
    if let Err(e) = staging.close() {
        tracing::warn!("Failed to remove staged upload: {}", e);
    }
    let object = uploaded?;

    let file = state
        .store
        .create_file(NewFile {
            title,
            drive_id: object.id,
            mime_type: Some(part.mime_type),
        })
        .await?;

    tracing::info!("{} uploaded library file {} ({})", admin.account.username, file.title, file.drive_id);

    Ok(ApiResponse::created(UploadedFile {
        file,
        url: object.locator,
    }))
}

/// GET /api/files - library listing, newest first
pub async fn list(State(state): State<AppState>, _user: AuthUser) -> ApiResult<Vec<StoredFile>> {
    Ok(ApiResponse::success(state.store.list_files().await?))
}

/// GET /api/files/drive/:driveId - stream the stored content back
pub async fn download(
    State(state): State<AppState>,
    _admin: Authorized<AdminOnly>,
    Path(drive_id): Path<String>,
) -> Result<Response, ApiError> {
    let file = state
        .store
        .find_file_by_drive_id(&drive_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("File {} not found", drive_id)))?;

    let stream = state.storage.download(&drive_id).await?;
    let mime_type = file.mime_type.unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
    let disposition = format!("inline; filename=\"{}\"", file.title.replace('"', ""));

    Ok((
        [(CONTENT_TYPE, mime_type), (CONTENT_DISPOSITION, disposition)],
        Body::from_stream(stream),
    )
        .into_response())
}

/// DELETE /api/files/drive/:driveId - remove from storage, then from the library
pub async fn delete(
    State(state): State<AppState>,
    admin: Authorized<AdminOnly>,
    Path(drive_id): Path<String>,
) -> ApiResult<StoredFile> {
    let file = state
        .store
        .find_file_by_drive_id(&drive_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("File {} not found", drive_id)))?;

    match state.storage.delete(&drive_id).await {
        Ok(()) => {}
        Err(StorageError::NotFound(_)) => {
            tracing::warn!("{} was already gone from storage", drive_id);
        }
        Err(e) => return Err(e.into()),
    }
    state.store.delete_file(file.id).await?;

    tracing::info!("{} deleted library file {}", admin.account.username, drive_id);

    Ok(ApiResponse::success(file))
}
