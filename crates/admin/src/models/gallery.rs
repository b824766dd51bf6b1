//! Photo gallery entries.
//!
//! Gallery rows are created by the multi-file upload flow only; there is no
//! edit form.

use amicale_core::GalleryImageId;
use amicale_core::records::Record;
use amicale_core::remote::Sort;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub id: GalleryImageId,
    pub image_url: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryImageDraft {
    pub image_url: String,
    pub caption: Option<String>,
}

impl Record for GalleryImage {
    type Id = GalleryImageId;
    type Draft = GalleryImageDraft;

    const COLLECTION: &'static str = "gallery";
    const SORT: Sort = Sort::descending("created_at");

    fn id(&self) -> GalleryImageId {
        self.id
    }
}
