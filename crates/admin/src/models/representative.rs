//! Association representatives (the board).

use amicale_core::RepresentativeId;
use amicale_core::records::{Editable, FormDraft, ImageSlots, Record};
use amicale_core::remote::Sort;
use amicale_core::schema::{FieldKind, FieldSpec, ValidationErrors};
use serde::{Deserialize, Serialize};

/// A board member shown on the "who we are" page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representative {
    pub id: RepresentativeId,
    pub name: String,
    pub position: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub display_order: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepresentativeDraft {
    pub name: String,
    pub position: String,
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    pub display_order: i32,
}

impl FormDraft for RepresentativeDraft {
    fn check(&self, errors: &mut ValidationErrors) {
        if self.display_order < 0 {
            errors.add("display_order", "cannot be negative");
        }
    }

    fn attach_image(&mut self, url: String) {
        self.photo_url = Some(url);
    }
}

impl Record for Representative {
    type Id = RepresentativeId;
    type Draft = RepresentativeDraft;

    const COLLECTION: &'static str = "representatives";
    const SORT: Sort = Sort::ascending("display_order");

    fn id(&self) -> RepresentativeId {
        self.id
    }
}

impl Editable for Representative {
    const SCHEMA: &'static [FieldSpec] = &[
        FieldSpec::required("name", FieldKind::Text),
        FieldSpec::required("position", FieldKind::Text),
        FieldSpec::optional("bio", FieldKind::LongText),
        FieldSpec::optional("photo_url", FieldKind::Url),
        FieldSpec::required("display_order", FieldKind::Integer),
    ];
    const IMAGES: ImageSlots = ImageSlots::Single;

    fn to_draft(&self) -> RepresentativeDraft {
        RepresentativeDraft {
            name: self.name.clone(),
            position: self.position.clone(),
            bio: self.bio.clone(),
            photo_url: self.photo_url.clone(),
            display_order: self.display_order,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use amicale_core::records::validate_draft;

    use super::*;

    #[test]
    fn test_negative_order_rejected() {
        let draft = RepresentativeDraft {
            name: "Claude Martin".to_owned(),
            position: "Trésorier".to_owned(),
            display_order: -1,
            ..RepresentativeDraft::default()
        };
        let errors = validate_draft::<Representative>(&draft).unwrap_err();
        assert!(errors.has("display_order"));
    }

    #[test]
    fn test_photo_goes_to_photo_url() {
        let mut draft = RepresentativeDraft::default();
        draft.attach_image("https://cdn.example.org/p.jpg".to_owned());
        assert_eq!(draft.photo_url.as_deref(), Some("https://cdn.example.org/p.jpg"));
    }
}
