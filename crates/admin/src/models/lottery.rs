//! Lottery configuration.
//!
//! The `lottery_config` collection holds at most one row. The back-office
//! creates it on first save and updates that same row afterwards.

use amicale_core::records::{Editable, FormDraft, ImageSlots, Record};
use amicale_core::remote::Sort;
use amicale_core::schema::{FieldKind, FieldSpec};
use amicale_core::{LotteryId, Price};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The running lottery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotteryConfig {
    pub id: LotteryId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub ticket_price: Price,
    #[serde(default)]
    pub draw_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Edit buffer for the lottery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LotteryDraft {
    pub title: String,
    pub description: Option<String>,
    pub ticket_price: Option<Price>,
    pub draw_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub image_url: Option<String>,
}

impl FormDraft for LotteryDraft {
    fn attach_image(&mut self, url: String) {
        self.image_url = Some(url);
    }
}

impl Record for LotteryConfig {
    type Id = LotteryId;
    type Draft = LotteryDraft;

    const COLLECTION: &'static str = "lottery_config";
    const SORT: Sort = Sort::ascending("id");

    fn id(&self) -> LotteryId {
        self.id
    }
}

impl Editable for LotteryConfig {
    const SCHEMA: &'static [FieldSpec] = &[
        FieldSpec::required("title", FieldKind::Text),
        FieldSpec::optional("description", FieldKind::LongText),
        FieldSpec::required("ticket_price", FieldKind::Price),
        FieldSpec::optional("draw_date", FieldKind::DateTime),
        FieldSpec::required("is_active", FieldKind::Boolean),
        FieldSpec::optional("image_url", FieldKind::Url),
    ];
    const IMAGES: ImageSlots = ImageSlots::Single;

    fn to_draft(&self) -> LotteryDraft {
        LotteryDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            ticket_price: Some(self.ticket_price),
            draw_date: self.draw_date,
            is_active: self.is_active,
            image_url: self.image_url.clone(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use amicale_core::records::validate_draft;

    use super::*;

    #[test]
    fn test_ticket_price_required() {
        let draft = LotteryDraft {
            title: "Tombola de printemps".to_owned(),
            ..LotteryDraft::default()
        };
        let errors = validate_draft::<LotteryConfig>(&draft).unwrap_err();
        assert!(errors.has("ticket_price"));
    }

    #[test]
    fn test_round_trip_through_draft() {
        let lottery = LotteryConfig {
            id: LotteryId::random(),
            title: "Tombola".to_owned(),
            description: None,
            ticket_price: Price::from_cents(200),
            draw_date: None,
            is_active: true,
            image_url: None,
        };
        let draft = lottery.to_draft();
        assert_eq!(draft.ticket_price, Some(Price::from_cents(200)));
        assert!(validate_draft::<LotteryConfig>(&draft).is_ok());
    }
}
