//! The gallery tab: batch photo uploads.

use std::sync::Arc;

use amicale_core::records::Record;
use amicale_core::{BatchResult, GalleryImageId};
use amicale_core::remote::{RemoteStore, StoreResult, Table};
use tracing::instrument;

use super::upload::{self, IMAGES_BUCKET, ImageUpload};
use super::{Access, Confirm, failure_notice};
use crate::error::{AdminError, Result};
use crate::models::{GalleryImage, GalleryImageDraft};

pub struct GalleryConsole {
    store: Arc<dyn RemoteStore>,
    access: Access,
    images: Vec<GalleryImage>,
    notice: Option<String>,
}

impl GalleryConsole {
    pub(crate) fn new(store: Arc<dyn RemoteStore>, access: Access) -> Self {
        Self {
            store,
            access,
            images: Vec::new(),
            notice: None,
        }
    }

    fn table(&self) -> Table<'_, GalleryImage, dyn RemoteStore> {
        Table::new(self.store.as_ref())
    }

    /// Photos as last loaded, newest first.
    #[must_use]
    pub fn images(&self) -> &[GalleryImage] {
        &self.images
    }

    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` or the store error.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> Result<&[GalleryImage]> {
        self.access.check()?;
        let listed = self.table().list().await;
        match listed {
            Ok(images) => {
                self.images = images;
                Ok(&self.images)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Upload photos one at a time, creating one gallery row per file.
    ///
    /// A file whose upload or row insert fails is reported in the result and
    /// the batch carries on. When the row insert fails the uploaded object
    /// is removed again.
    ///
    /// # Errors
    ///
    /// Only `AdminError::Forbidden`; per-file failures are in the result.
    #[instrument(skip(self, files, caption), fields(files = files.len()))]
    pub async fn upload(
        &mut self,
        files: Vec<ImageUpload>,
        caption: Option<&str>,
    ) -> Result<BatchResult<GalleryImage, ImageUpload>> {
        self.access.check()?;
        let mut batch = BatchResult::default();
        for file in files {
            match self.store_one(&file, caption).await {
                Ok(image) => batch.push_success(image),
                Err(e) => {
                    tracing::warn!(file = %file.file_name, error = %e, "Gallery upload failed");
                    batch.push_failure(file, e);
                }
            }
        }

        let summary = batch.summary("uploaded");
        tracing::info!(
            succeeded = batch.succeeded_count(),
            failed = batch.failed_count(),
            "Gallery batch finished"
        );
        self.notice = Some(summary);
        if batch.succeeded_count() > 0 {
            let listed = self.table().list().await;
            match listed {
                Ok(images) => self.images = images,
                Err(e) => tracing::warn!(error = %e, "Reload after gallery upload failed"),
            }
        }
        Ok(batch)
    }

    async fn store_one(&self, file: &ImageUpload, caption: Option<&str>) -> StoreResult<GalleryImage> {
        let stored = upload::upload_image(self.store.as_ref(), GalleryImage::COLLECTION, file).await?;
        let draft = GalleryImageDraft {
            image_url: stored.url,
            caption: caption.map(str::to_owned),
        };
        match self.table().insert(&draft).await {
            Ok(image) => Ok(image),
            Err(e) => {
                if let Err(cleanup) = self.store.remove(IMAGES_BUCKET, &[stored.path]).await {
                    tracing::warn!(error = %cleanup, "Could not remove orphaned gallery object");
                }
                Err(e)
            }
        }
    }

    /// Delete a photo after confirmation.
    ///
    /// The row goes first; removing the stored file is best-effort.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Cancelled` if the operator declines,
    /// `AdminError::Forbidden`, or the store error.
    #[instrument(skip(self, confirm), fields(id = %id))]
    pub async fn delete(&mut self, id: GalleryImageId, confirm: &impl Confirm) -> Result<()> {
        self.access.check()?;
        if !confirm.confirm("Delete this photo?") {
            return Err(AdminError::Cancelled);
        }

        let object = self
            .images
            .iter()
            .find(|image| image.id == id)
            .and_then(|image| upload::object_path_from_url(&image.image_url))
            .map(str::to_owned);

        let deleted = self.table().delete(id).await;
        if let Err(e) = deleted {
            return Err(self.fail(e.into()));
        }
        if let Some(path) = object {
            if let Err(e) = self.store.remove(IMAGES_BUCKET, &[path]).await {
                tracing::warn!(error = %e, "Could not remove gallery object");
            }
        }
        self.images.retain(|image| image.id != id);
        self.notice = Some("Photo deleted.".to_owned());
        Ok(())
    }

    fn fail(&mut self, error: AdminError) -> AdminError {
        error.capture();
        self.notice = Some(failure_notice(&error));
        error
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use amicale_core::ProfileRole;

    use super::*;
    use crate::console::testing::{console_as, yes};

    fn photo(name: &str) -> ImageUpload {
        ImageUpload::new(name, vec![0xFF, 0xD8, 0xFF], "image/jpeg")
    }

    #[tokio::test]
    async fn test_partial_batch() {
        let (store, _gate, console) = console_as(ProfileRole::Author).await;
        store.fail_uploads_matching("flou");
        let mut gallery = console.gallery().unwrap();

        let batch = gallery
            .upload(
                vec![photo("repas.jpg"), photo("flou.jpg"), photo("danse.jpg")],
                Some("Repas des anciens"),
            )
            .await
            .unwrap();

        assert_eq!(batch.succeeded_count(), 2);
        assert_eq!(batch.failed_count(), 1);
        assert_eq!(batch.failed[0].0.file_name, "flou.jpg");
        assert_eq!(gallery.images().len(), 2);
        assert_eq!(store.rows("gallery").len(), 2);
        assert_eq!(gallery.notice(), Some("2 of 3 uploaded, 1 failed"));
        assert_eq!(gallery.images()[0].caption.as_deref(), Some("Repas des anciens"));
    }

    #[tokio::test]
    async fn test_failed_insert_removes_object() {
        let (store, _gate, console) = console_as(ProfileRole::Author).await;
        store.fail_writes("gallery", "quota exceeded");
        let mut gallery = console.gallery().unwrap();

        let batch = gallery.upload(vec![photo("a.jpg")], None).await.unwrap();

        assert_eq!(batch.failed_count(), 1);
        assert!(store.object_paths(IMAGES_BUCKET).is_empty());
        assert!(gallery.images().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_row_and_object() {
        let (store, _gate, console) = console_as(ProfileRole::Editor).await;
        let mut gallery = console.gallery().unwrap();
        let batch = gallery.upload(vec![photo("a.jpg")], None).await.unwrap();
        let id = batch.succeeded[0].id;
        assert_eq!(store.object_paths(IMAGES_BUCKET).len(), 1);

        gallery.delete(id, &yes).await.unwrap();

        assert!(store.rows("gallery").is_empty());
        assert!(store.object_paths(IMAGES_BUCKET).is_empty());
        assert!(gallery.images().is_empty());
    }

    #[tokio::test]
    async fn test_subscriber_cannot_open_gallery() {
        let (_store, _gate, console) = console_as(ProfileRole::Subscriber).await;
        assert!(matches!(console.gallery(), Err(AdminError::Forbidden(_))));
    }
}
