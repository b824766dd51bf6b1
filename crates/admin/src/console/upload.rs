//! Image uploads to object storage.
//!
//! Files are uploaded one at a time. Every object lands in the shared images
//! bucket under a folder named after the collection it belongs to, with a
//! random prefix so two files with the same name never collide.

use std::fmt;
use std::path::Path;

use amicale_core::BatchResult;
use amicale_core::records::FormDraft;
use amicale_core::remote::{RemoteStore, StoreResult};
use tracing::instrument;
use uuid::Uuid;

use crate::error::AdminError;

/// Bucket holding every back-office image.
pub const IMAGES_BUCKET: &str = "images";

/// A file picked by the operator.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

impl ImageUpload {
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            content_type: content_type.into(),
        }
    }

    /// Read a file from disk, guessing its content type from the extension.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be read.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map_or_else(|| "image".to_owned(), |n| n.to_string_lossy().into_owned());
        let content_type = content_type_for(&file_name);
        Ok(Self::new(file_name, bytes, content_type))
    }
}

/// An uploaded object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// Path inside [`IMAGES_BUCKET`].
    pub path: String,
    /// Public URL written into the record.
    pub url: String,
}

fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

/// Object path for a new upload: `{folder}/{random}-{sanitized name}`.
fn object_path(folder: &str, file_name: &str) -> String {
    let name: String = file_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let name = if name.is_empty() { "image".to_owned() } else { name };
    format!("{folder}/{}-{name}", Uuid::new_v4().simple())
}

/// Recover the object path from a public URL of the images bucket.
#[must_use]
pub fn object_path_from_url(url: &str) -> Option<&str> {
    let marker = format!("/object/public/{IMAGES_BUCKET}/");
    url.split_once(&marker)
        .map(|(_, path)| path)
        .filter(|path| !path.is_empty())
}

/// Upload one file.
///
/// # Errors
///
/// Returns the store error if the upload is rejected.
#[instrument(skip(store, file), fields(file = %file.file_name))]
pub async fn upload_image(
    store: &dyn RemoteStore,
    folder: &str,
    file: &ImageUpload,
) -> StoreResult<StoredImage> {
    let path = object_path(folder, &file.file_name);
    let path = store
        .upload(IMAGES_BUCKET, &path, file.bytes.clone(), &file.content_type)
        .await?;
    let url = store.public_url(IMAGES_BUCKET, &path);
    tracing::debug!(path = %path, "Image uploaded");
    Ok(StoredImage { path, url })
}

/// Upload files one after another, keeping going after a failure.
pub async fn upload_images(
    store: &dyn RemoteStore,
    folder: &str,
    files: Vec<ImageUpload>,
) -> BatchResult<StoredImage, ImageUpload> {
    let mut batch = BatchResult::default();
    for file in files {
        match upload_image(store, folder, &file).await {
            Ok(stored) => batch.push_success(stored),
            Err(e) => {
                tracing::warn!(file = %file.file_name, error = %e, "Image upload failed");
                batch.push_failure(file, e);
            }
        }
    }
    batch
}

/// Best-effort removal of images whose row was never written.
pub async fn discard(store: &dyn RemoteStore, folder: &str, stored: &[StoredImage]) {
    if stored.is_empty() {
        return;
    }
    let paths: Vec<String> = stored.iter().map(|image| image.path.clone()).collect();
    if let Err(e) = store.remove(IMAGES_BUCKET, &paths).await {
        tracing::warn!(folder, error = %e, "Could not remove images of a failed save");
    }
}

/// Upload the single image of a form into `draft`.
///
/// # Errors
///
/// Returns `AdminError::Upload` when the upload fails; the draft is left as
/// it was.
pub async fn attach_single<D: FormDraft>(
    store: &dyn RemoteStore,
    folder: &str,
    draft: &mut D,
    file: &ImageUpload,
) -> Result<StoredImage, AdminError> {
    let stored = upload_image(store, folder, file)
        .await
        .map_err(|source| AdminError::Upload {
            file_name: file.file_name.clone(),
            source,
        })?;
    draft.attach_image(stored.url.clone());
    Ok(stored)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use amicale_core::remote::MemoryStore;

    use super::*;

    fn file(name: &str) -> ImageUpload {
        ImageUpload::new(name, vec![1, 2, 3], "image/jpeg")
    }

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(content_type_for("photo.JPG"), "image/jpeg");
        assert_eq!(content_type_for("logo.png"), "image/png");
        assert_eq!(content_type_for("notes"), "application/octet-stream");
    }

    #[test]
    fn test_object_path_is_sanitized_and_unique() {
        let a = object_path("gallery", "Fête du Village.jpg");
        let b = object_path("gallery", "Fête du Village.jpg");
        assert!(a.starts_with("gallery/"));
        assert!(a.ends_with("-f-te-du-village.jpg"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_object_path_from_url() {
        let url = "https://project.example.co/storage/v1/object/public/images/posts/abc-a.jpg";
        assert_eq!(object_path_from_url(url), Some("posts/abc-a.jpg"));
        assert_eq!(object_path_from_url("https://elsewhere.org/a.jpg"), None);
    }

    #[test]
    fn test_debug_hides_bytes() {
        let debug = format!("{:?}", file("a.jpg"));
        assert!(debug.contains("len: 3"));
        assert!(!debug.contains("[1, 2, 3]"));
    }

    #[tokio::test]
    async fn test_batch_keeps_going_after_failure() {
        let store = MemoryStore::new();
        store.fail_uploads_matching("broken");

        let batch = upload_images(
            &store,
            "gallery",
            vec![file("one.jpg"), file("broken.jpg"), file("three.jpg")],
        )
        .await;

        assert_eq!(batch.succeeded_count(), 2);
        assert_eq!(batch.failed_count(), 1);
        assert_eq!(batch.failed[0].0.file_name, "broken.jpg");
        assert_eq!(store.object_paths(IMAGES_BUCKET).len(), 2);
        for stored in &batch.succeeded {
            assert_eq!(object_path_from_url(&stored.url), Some(stored.path.as_str()));
        }
    }

    #[tokio::test]
    async fn test_attach_single_failure_leaves_draft() {
        #[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
        struct Draft {
            image_url: Option<String>,
        }
        impl FormDraft for Draft {
            fn attach_image(&mut self, url: String) {
                self.image_url = Some(url);
            }
        }

        let store = MemoryStore::new();
        store.fail_uploads_matching("bad");
        let mut draft = Draft::default();

        let err = attach_single(&store, "events", &mut draft, &file("bad.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Upload { .. }));
        assert!(draft.image_url.is_none());

        attach_single(&store, "events", &mut draft, &file("good.png"))
            .await
            .unwrap();
        assert!(draft.image_url.is_some());
    }
}
