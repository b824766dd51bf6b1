//! Generic list/create/edit/delete console for one record collection.

use std::sync::Arc;

use amicale_core::BatchResult;
use amicale_core::records::{Editable, FormDraft, ImageSlots, validate_draft};
use amicale_core::remote::{RemoteStore, Table};
use tracing::instrument;

use super::upload::{self, ImageUpload, StoredImage};
use super::{Access, Confirm, failure_notice};
use crate::error::{AdminError, Result};

/// Result of a successful submit.
#[derive(Debug)]
pub struct SubmitOutcome<R> {
    /// The stored record.
    pub record: R,
    /// `true` for a create, `false` for an update.
    pub created: bool,
    /// Image uploads of a multi-image form. Always complete for single-image
    /// forms, whose upload failures abort the submit instead.
    pub uploads: BatchResult<StoredImage, ImageUpload>,
}

/// Console over the collection of `R`.
///
/// Holds the loaded list, a create buffer and an edit buffer. The edit buffer
/// is populated by [`begin_edit`](Self::begin_edit); while it is, submit
/// updates that record, otherwise submit creates a new one from the create
/// buffer.
pub struct CollectionConsole<R: Editable> {
    store: Arc<dyn RemoteStore>,
    access: Access,
    items: Vec<R>,
    create: R::Draft,
    edit: Option<(R::Id, R::Draft)>,
    notice: Option<String>,
}

impl<R: Editable> CollectionConsole<R> {
    pub(crate) fn new(store: Arc<dyn RemoteStore>, access: Access) -> Self {
        Self {
            store,
            access,
            items: Vec::new(),
            create: R::Draft::default(),
            edit: None,
            notice: None,
        }
    }

    fn table(&self) -> Table<'_, R, dyn RemoteStore> {
        Table::new(self.store.as_ref())
    }

    /// Records as last loaded, in the collection's order.
    #[must_use]
    pub fn items(&self) -> &[R] {
        &self.items
    }

    /// Last operator message.
    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Fetch the list.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` or the store error; the previous list
    /// is kept on failure.
    #[instrument(skip(self), fields(collection = R::COLLECTION))]
    pub async fn load(&mut self) -> Result<&[R]> {
        self.access.check()?;
        let listed = self.table().list().await;
        match listed {
            Ok(items) => {
                self.items = items;
                Ok(&self.items)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    // =========================================================================
    // Buffers
    // =========================================================================

    #[must_use]
    pub const fn create_buffer(&self) -> &R::Draft {
        &self.create
    }

    pub const fn create_buffer_mut(&mut self) -> &mut R::Draft {
        &mut self.create
    }

    /// ID of the record being edited.
    #[must_use]
    pub fn editing(&self) -> Option<R::Id> {
        self.edit.as_ref().map(|(id, _)| *id)
    }

    #[must_use]
    pub fn edit_buffer(&self) -> Option<&R::Draft> {
        self.edit.as_ref().map(|(_, draft)| draft)
    }

    pub fn edit_buffer_mut(&mut self) -> Option<&mut R::Draft> {
        self.edit.as_mut().map(|(_, draft)| draft)
    }

    /// Copy a loaded record into the edit buffer.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::UnknownRecord` if `id` is not in the loaded list.
    pub fn begin_edit(&mut self, id: R::Id) -> Result<&mut R::Draft> {
        let draft = self
            .items
            .iter()
            .find(|r| r.id() == id)
            .map(Editable::to_draft)
            .ok_or_else(|| AdminError::UnknownRecord(id.to_string()))?;
        let (_, draft) = self.edit.insert((id, draft));
        Ok(draft)
    }

    /// Drop the edit buffer; the next submit creates.
    pub fn cancel_edit(&mut self) {
        self.edit = None;
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Save the active buffer.
    ///
    /// The buffer is validated first; nothing is uploaded or written for an
    /// invalid form. Images are then uploaded and their URLs attached to the
    /// record. On success both buffers are cleared and the list is reloaded.
    ///
    /// # Errors
    ///
    /// - `AdminError::Forbidden` if the role no longer allows the tab
    /// - `AdminError::TooManyImages` if the form has fewer image slots
    /// - `AdminError::Validation` for an invalid form
    /// - `AdminError::Upload` if the image of a single-image form fails
    /// - `AdminError::Store` if the write fails
    ///
    /// The buffers are kept on every error.
    #[instrument(skip(self, images), fields(collection = R::COLLECTION, images = images.len()))]
    pub async fn submit(&mut self, images: Vec<ImageUpload>) -> Result<SubmitOutcome<R>> {
        self.access.check()?;
        let result = self.try_submit(images).await;
        match result {
            Ok(outcome) => {
                self.create = R::Draft::default();
                self.edit = None;
                let verb = if outcome.created { "Created" } else { "Saved" };
                self.notice = Some(if outcome.uploads.is_complete_success() {
                    format!("{verb}.")
                } else {
                    format!("{verb}; {}.", outcome.uploads.summary("images uploaded"))
                });
                tracing::info!(
                    collection = R::COLLECTION,
                    id = %outcome.record.id(),
                    created = outcome.created,
                    "Record saved"
                );
                self.refresh().await;
                Ok(outcome)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn try_submit(&self, images: Vec<ImageUpload>) -> Result<SubmitOutcome<R>> {
        let max = match R::IMAGES {
            ImageSlots::None => Some(0),
            ImageSlots::Single => Some(1),
            ImageSlots::Multiple => None,
        };
        if let Some(max) = max.filter(|max| images.len() > *max) {
            return Err(AdminError::TooManyImages {
                max,
                got: images.len(),
            });
        }

        let (target, buffer) = match &self.edit {
            Some((id, draft)) => (Some(*id), draft),
            None => (None, &self.create),
        };
        validate_draft::<R>(buffer)?;

        let mut draft = buffer.clone();
        let mut uploads = BatchResult::default();
        if R::IMAGES == ImageSlots::Single {
            if let Some(file) = images.first() {
                let stored =
                    upload::attach_single(self.store.as_ref(), R::COLLECTION, &mut draft, file)
                        .await?;
                uploads.push_success(stored);
            }
        } else if !images.is_empty() {
            uploads = upload::upload_images(self.store.as_ref(), R::COLLECTION, images).await;
            for stored in &uploads.succeeded {
                draft.attach_image(stored.url.clone());
            }
        }

        let table = self.table();
        let written = match target {
            Some(id) => table.update(id, &draft).await.map(|record| (record, false)),
            None => table.insert(&draft).await.map(|record| (record, true)),
        };
        let (record, created) = match written {
            Ok(written) => written,
            Err(e) => {
                upload::discard(self.store.as_ref(), R::COLLECTION, &uploads.succeeded).await;
                return Err(e.into());
            }
        };
        Ok(SubmitOutcome {
            record,
            created,
            uploads,
        })
    }

    /// Delete a record after confirmation.
    ///
    /// The list is reloaded only after the store confirms the delete.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Cancelled` if the operator declines,
    /// `AdminError::Forbidden`, or the store error.
    #[instrument(skip(self, confirm), fields(collection = R::COLLECTION, id = %id))]
    pub async fn delete(&mut self, id: R::Id, confirm: &impl Confirm) -> Result<()> {
        self.access.check()?;
        if !confirm.confirm(&format!("Delete this entry from {}?", R::COLLECTION)) {
            return Err(AdminError::Cancelled);
        }
        let deleted = self.table().delete(id).await;
        if let Err(e) = deleted {
            return Err(self.fail(e.into()));
        }
        if self.editing() == Some(id) {
            self.edit = None;
        }
        tracing::info!(collection = R::COLLECTION, id = %id, "Record deleted");
        self.notice = Some("Deleted.".to_owned());
        self.refresh().await;
        Ok(())
    }

    /// Reload after a confirmed write; a failed reload only leaves a notice.
    async fn refresh(&mut self) {
        let listed = self.table().list().await;
        match listed {
            Ok(items) => self.items = items,
            Err(e) => {
                tracing::warn!(collection = R::COLLECTION, error = %e, "Reload after write failed");
                self.notice = Some(format!("Saved, but the list could not be refreshed: {e}"));
            }
        }
    }

    fn fail(&mut self, error: AdminError) -> AdminError {
        error.capture();
        self.notice = Some(failure_notice(&error));
        error
    }
}
