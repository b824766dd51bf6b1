//! The lottery tab.

use std::sync::Arc;

use amicale_core::records::{Editable, Record, validate_draft};
use amicale_core::remote::{RemoteStore, Table};
use tracing::instrument;

use super::upload::{self, ImageUpload};
use super::{Access, failure_notice};
use crate::error::{AdminError, Result};
use crate::models::{LotteryConfig, LotteryDraft};

/// Edits the single lottery row.
pub struct LotteryConsole {
    store: Arc<dyn RemoteStore>,
    access: Access,
    current: Option<LotteryConfig>,
    draft: LotteryDraft,
    notice: Option<String>,
}

impl LotteryConsole {
    pub(crate) fn new(store: Arc<dyn RemoteStore>, access: Access) -> Self {
        Self {
            store,
            access,
            current: None,
            draft: LotteryDraft::default(),
            notice: None,
        }
    }

    fn table(&self) -> Table<'_, LotteryConfig, dyn RemoteStore> {
        Table::new(self.store.as_ref())
    }

    /// The stored configuration, if one exists.
    #[must_use]
    pub const fn current(&self) -> Option<&LotteryConfig> {
        self.current.as_ref()
    }

    #[must_use]
    pub const fn draft(&self) -> &LotteryDraft {
        &self.draft
    }

    pub const fn draft_mut(&mut self) -> &mut LotteryDraft {
        &mut self.draft
    }

    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Read the stored row into the form.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Forbidden` or the store error.
    #[instrument(skip(self))]
    pub async fn load(&mut self) -> Result<Option<&LotteryConfig>> {
        self.access.check()?;
        let first = self.table().first().await;
        match first {
            Ok(current) => {
                self.draft = current
                    .as_ref()
                    .map_or_else(LotteryDraft::default, Editable::to_draft);
                self.current = current;
                Ok(self.current.as_ref())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Save the form: create the row the first time, update it afterwards.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Validation` for an invalid form (nothing is sent),
    /// `AdminError::Upload` if the image fails, or the store error.
    #[instrument(skip(self, image))]
    pub async fn save(&mut self, image: Option<ImageUpload>) -> Result<LotteryConfig> {
        self.access.check()?;
        let result = self.try_save(image).await;
        match result {
            Ok(saved) => {
                tracing::info!(id = %saved.id(), "Lottery saved");
                self.draft = saved.to_draft();
                self.current = Some(saved.clone());
                self.notice = Some("Lottery saved.".to_owned());
                Ok(saved)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn try_save(&self, image: Option<ImageUpload>) -> Result<LotteryConfig> {
        validate_draft::<LotteryConfig>(&self.draft)?;
        // A console that was never loaded still updates the existing row.
        let existing = match &self.current {
            Some(current) => Some(current.id),
            None => self.table().first().await?.map(|row| row.id),
        };
        let mut draft = self.draft.clone();
        let mut stored = Vec::new();
        if let Some(file) = &image {
            stored.push(
                upload::attach_single(
                    self.store.as_ref(),
                    LotteryConfig::COLLECTION,
                    &mut draft,
                    file,
                )
                .await?,
            );
        }

        let table = self.table();
        let saved = match existing {
            Some(id) => table.update(id, &draft).await,
            None => table.insert(&draft).await,
        };
        if saved.is_err() {
            upload::discard(self.store.as_ref(), LotteryConfig::COLLECTION, &stored).await;
        }
        Ok(saved?)
    }

    fn fail(&mut self, error: AdminError) -> AdminError {
        error.capture();
        self.notice = Some(failure_notice(&error));
        error
    }
}
