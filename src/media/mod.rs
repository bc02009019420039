//! Image hosting on Cloudinary: standalone uploads and course cover images.

pub mod cloudinary;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::IntoResponse,
    routing::{delete, post},
    Extension, Router,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::core::shared::error::ApiError;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{created_json, message_json, ok_json};
use crate::core::urls::ApiUrls;
use crate::learn::courses::ensure_can_manage;
use crate::learn::CourseEngine;
use crate::security::auth_api::{AuthenticatedUser, Permission};

pub use cloudinary::{sign, CloudinaryClient, UploadedImage};

/// Room for multipart boundaries and headers on top of the image itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Debug)]
pub struct ImageUpload {
    pub data: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

pub fn validate_image(content_type: &str, size: usize, max_bytes: usize) -> Result<(), ApiError> {
    if !content_type.to_ascii_lowercase().starts_with("image/") {
        return Err(ApiError::Validation(format!(
            "Only images can be uploaded, got {}",
            content_type
        )));
    }
    if size == 0 {
        return Err(ApiError::Validation("The uploaded file is empty".to_string()));
    }
    if size > max_bytes {
        return Err(ApiError::Validation(format!(
            "Images must be at most {} bytes",
            max_bytes
        )));
    }
    Ok(())
}

/// Reads the `file` field of a multipart body.
pub async fn read_image(mut multipart: Multipart, max_bytes: usize) -> Result<ImageUpload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::Validation(format!("Could not read upload: {}", e)))?;

        validate_image(&content_type, data.len(), max_bytes)?;
        return Ok(ImageUpload {
            data: data.to_vec(),
            filename,
            content_type,
        });
    }

    Err(ApiError::Validation("No file provided".to_string()))
}

fn media_client(state: &AppState) -> Result<Arc<CloudinaryClient>, ApiError> {
    state
        .media
        .clone()
        .ok_or_else(|| ApiError::Unavailable("Image hosting is not configured".to_string()))
}

pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::UploadMedia)?;
    let client = media_client(&state)?;

    let upload = read_image(multipart, state.config.media.max_image_bytes).await?;
    let image = client
        .upload_image(upload.data, &upload.filename, None)
        .await?;

    info!("User {} uploaded image {}", user.user_id, image.public_id);
    Ok(created_json(image))
}

pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(public_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::UploadMedia)?;
    let client = media_client(&state)?;

    let public_id = public_id.trim_matches('/');
    if !public_id.starts_with(&format!("{}/", client.folder())) {
        return Err(ApiError::Forbidden(
            "Image does not belong to this platform".to_string(),
        ));
    }

    client.delete_image(public_id).await?;
    info!("User {} deleted image {}", user.user_id, public_id);
    Ok(message_json("Image deleted"))
}

pub async fn upload_course_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(course_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    user.require(&Permission::UploadMedia)?;
    let client = media_client(&state)?;

    let engine = CourseEngine::new(state.conn.clone());
    let course = engine.get_course(&user, course_id).await?;
    ensure_can_manage(&user, &course)?;

    let upload = read_image(multipart, state.config.media.max_image_bytes).await?;
    let folder = format!("{}/courses", client.folder());
    let image = client
        .upload_image(upload.data, &upload.filename, Some(&folder))
        .await?;

    let course = engine.set_image(&user, course_id, &image.url).await?;
    Ok(ok_json(course))
}

pub fn configure_media_routes(max_image_bytes: usize) -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::MEDIA_IMAGES, post(upload_image))
        .route(ApiUrls::MEDIA_IMAGE_BY_ID, delete(delete_image))
        .route(ApiUrls::COURSE_IMAGE, post(upload_course_image))
        .layer(DefaultBodyLimit::max(max_image_bytes + MULTIPART_OVERHEAD))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_image() {
        assert!(validate_image("image/png", 10, 100).is_ok());
        assert!(validate_image("IMAGE/JPEG", 100, 100).is_ok());
        assert!(validate_image("application/pdf", 10, 100).is_err());
        assert!(validate_image("image/png", 0, 100).is_err());
        assert!(validate_image("image/png", 101, 100).is_err());
    }
}
