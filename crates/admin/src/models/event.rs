//! Calendar events.

use amicale_core::EventId;
use amicale_core::records::{Editable, FormDraft, ImageSlots, Record};
use amicale_core::remote::Sort;
use amicale_core::schema::{FieldKind, FieldSpec, ValidationErrors};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An event on the association calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Event {
    /// Whether the event has started by `now` and is not over yet.
    #[must_use]
    pub fn is_ongoing(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && self.ends_at.is_none_or(|end| now <= end)
    }
}

/// Create/edit buffer for an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

impl FormDraft for EventDraft {
    fn check(&self, errors: &mut ValidationErrors) {
        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            if end < start {
                errors.add("ends_at", "must not be before the start");
            }
        }
    }

    fn attach_image(&mut self, url: String) {
        self.image_url = Some(url);
    }
}

impl Record for Event {
    type Id = EventId;
    type Draft = EventDraft;

    const COLLECTION: &'static str = "events";
    const SORT: Sort = Sort::ascending("starts_at");

    fn id(&self) -> EventId {
        self.id
    }
}

impl Editable for Event {
    const SCHEMA: &'static [FieldSpec] = &[
        FieldSpec::required("title", FieldKind::Text),
        FieldSpec::optional("description", FieldKind::LongText),
        FieldSpec::optional("location", FieldKind::Text),
        FieldSpec::required("starts_at", FieldKind::DateTime),
        FieldSpec::optional("ends_at", FieldKind::DateTime),
        FieldSpec::optional("image_url", FieldKind::Url),
    ];
    const IMAGES: ImageSlots = ImageSlots::Single;

    fn to_draft(&self) -> EventDraft {
        EventDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            starts_at: Some(self.starts_at),
            ends_at: self.ends_at,
            image_url: self.image_url.clone(),
        }
    }
}
