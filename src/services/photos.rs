use std::path::PathBuf;

use axum::body::Bytes;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::book::BookImage,
};

/// The URL prefix stored photos are served under.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// A file received in a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// The client-side file name, if one was sent.
    pub file_name: Option<String>,
    /// The media type the client declared.
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Checks an upload against the photo rules and picks the stored extension.
///
/// The declared media type must be `image/*`, and content sniffing must not
/// identify a non-image. Size is checked after the media type.
///
/// # Arguments
///
/// * `file` - The uploaded file.
/// * `max_bytes` - The configured size limit.
///
/// # Returns
///
/// A `Result` containing the file extension to store the photo under.
pub fn validate_upload(file: &UploadedFile, max_bytes: usize) -> Result<String> {
    let declared = file.content_type.as_deref().unwrap_or_default();
    if !declared.starts_with("image") {
        return Err(AppError::InvalidMediaType);
    }

    let sniffed = infer::get(&file.bytes);
    if let Some(kind) = sniffed {
        if kind.matcher_type() != infer::MatcherType::Image {
            tracing::debug!("Upload declared {} but looks like {}", declared, kind.mime_type());
            return Err(AppError::InvalidMediaType);
        }
    }

    if file.bytes.len() > max_bytes {
        return Err(AppError::PayloadTooLarge { limit: max_bytes });
    }

    let from_name = file
        .file_name
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    let extension = from_name
        .or_else(|| sniffed.map(|kind| kind.extension().to_string()))
        .or_else(|| {
            declared
                .split_once('/')
                .map(|(_, subtype)| subtype.to_string())
                .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric()))
        })
        .unwrap_or_else(|| "img".to_string());

    Ok(extension)
}

/// The stored name of a book's photo. Repeated uploads for the same book
/// and extension overwrite one another.
pub fn photo_name(book_id: Uuid, extension: &str) -> String {
    format!("photo_{}.{}", book_id, extension)
}

/// Writes book photos to a directory that is served statically.
#[derive(Clone, Debug)]
pub struct PhotoStore {
    root: PathBuf,
}

impl PhotoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Stores `bytes` under `name`, replacing any previous file of that name.
    pub async fn store(&self, name: &str, bytes: &[u8]) -> Result<BookImage> {
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(self.root.join(name), bytes).await?;
        tracing::info!("✅ Photo stored: {}", name);

        Ok(BookImage {
            storage_id: name.to_string(),
            url: format!("{}/{}", PUBLIC_PREFIX, name),
        })
    }

    /// Removes a stored photo. Failures are logged, not returned.
    pub async fn remove(&self, name: &str) {
        if let Err(e) = tokio::fs::remove_file(self.root.join(name)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("⚠️ Could not remove photo {}: {}", name, e);
            }
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const PDF_MAGIC: &[u8] = b"%PDF-1.7\n";

    fn upload(name: &str, content_type: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile {
            file_name: Some(name.to_string()),
            content_type: Some(content_type.to_string()),
            bytes: Bytes::copy_from_slice(bytes),
        }
    }

    #[test]
    fn images_within_the_limit_are_accepted() {
        let ext = validate_upload(&upload("cover.PNG", "image/png", PNG_MAGIC), 1024).unwrap();
        assert_eq!(ext, "png");
    }

    #[test]
    fn non_image_media_types_are_rejected() {
        let err = validate_upload(&upload("notes.txt", "text/plain", b"hello"), 1024).unwrap_err();
        assert!(matches!(err, AppError::InvalidMediaType));
    }

    #[test]
    fn disguised_documents_are_rejected() {
        let err = validate_upload(&upload("cover.png", "image/png", PDF_MAGIC), 1024).unwrap_err();
        assert!(matches!(err, AppError::InvalidMediaType));
    }

    #[test]
    fn oversized_images_are_rejected_with_the_limit() {
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.resize(2048, 0);
        let err = validate_upload(&upload("cover.png", "image/png", &bytes), 1024).unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { limit: 1024 }));
    }

    #[test]
    fn extension_falls_back_to_sniffed_type() {
        let file = UploadedFile {
            file_name: None,
            content_type: Some("image/png".into()),
            bytes: Bytes::from_static(PNG_MAGIC),
        };
        assert_eq!(validate_upload(&file, 1024).unwrap(), "png");
    }

    #[test]
    fn photo_names_derive_from_the_book_id() {
        let id = Uuid::new_v4();
        assert_eq!(photo_name(id, "jpg"), format!("photo_{}.jpg", id));
    }

    #[tokio::test]
    async fn store_and_remove_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path().join("uploads"));

        let image = store.store("photo_x.png", PNG_MAGIC).await.unwrap();
        assert_eq!(image.url, "/uploads/photo_x.png");
        assert!(store.root().join("photo_x.png").exists());

        store.remove("photo_x.png").await;
        assert!(!store.root().join("photo_x.png").exists());
    }
}
