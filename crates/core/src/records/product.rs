//! Merchandise catalog records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Editable, FormDraft, ImageSlots, Record};
use crate::remote::Sort;
use crate::schema::{FieldKind, FieldSpec, ValidationErrors};
use crate::{Price, ProductId};

/// A merchandise item offered in the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Price,
    /// Sizes offered; a cart line must pick one of them.
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

const fn default_active() -> bool {
    true
}

impl Product {
    /// Whether `size` is one of the offered sizes.
    #[must_use]
    pub fn offers_size(&self, size: &str) -> bool {
        self.sizes.iter().any(|s| s == size)
    }
}

/// Create/edit buffer for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductDraft {
    pub name: String,
    pub description: Option<String>,
    pub price: Option<Price>,
    pub sizes: Vec<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
}

impl Default for ProductDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            price: None,
            sizes: Vec::new(),
            image_url: None,
            is_active: true,
        }
    }
}

impl FormDraft for ProductDraft {
    fn check(&self, errors: &mut ValidationErrors) {
        let mut seen = std::collections::HashSet::new();
        if !self.sizes.iter().all(|s| seen.insert(s.trim())) {
            errors.add("sizes", "sizes must be unique");
        }
    }

    fn attach_image(&mut self, url: String) {
        self.image_url = Some(url);
    }
}

impl Record for Product {
    type Id = ProductId;
    type Draft = ProductDraft;

    const COLLECTION: &'static str = "products";
    const SORT: Sort = Sort::ascending("name");

    fn id(&self) -> ProductId {
        self.id
    }
}

impl Editable for Product {
    const SCHEMA: &'static [FieldSpec] = &[
        FieldSpec::required("name", FieldKind::Text),
        FieldSpec::optional("description", FieldKind::LongText),
        FieldSpec::required("price", FieldKind::Price),
        FieldSpec::required("sizes", FieldKind::TextList),
        FieldSpec::optional("image_url", FieldKind::Url),
        FieldSpec::required("is_active", FieldKind::Boolean),
    ];
    const IMAGES: ImageSlots = ImageSlots::Single;

    fn to_draft(&self) -> ProductDraft {
        ProductDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            price: Some(self.price),
            sizes: self.sizes.clone(),
            image_url: self.image_url.clone(),
            is_active: self.is_active,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::records::validate_draft;

    #[test]
    fn test_empty_draft_is_invalid() {
        let errors = validate_draft::<Product>(&ProductDraft::default()).unwrap_err();
        assert!(errors.has("name"));
        assert!(errors.has("price"));
        assert!(errors.has("sizes"));
    }

    #[test]
    fn test_duplicate_sizes_rejected() {
        let draft = ProductDraft {
            name: "Sweat".to_owned(),
            price: Some(Price::from_cents(3_000)),
            sizes: vec!["M".to_owned(), "M".to_owned()],
            ..ProductDraft::default()
        };
        let errors = validate_draft::<Product>(&draft).unwrap_err();
        assert!(errors.has("sizes"));
    }

    #[test]
    fn test_valid_draft() {
        let draft = ProductDraft {
            name: "Mug".to_owned(),
            price: Some(Price::from_cents(800)),
            sizes: vec!["Unique".to_owned()],
            ..ProductDraft::default()
        };
        assert!(validate_draft::<Product>(&draft).is_ok());
    }
}
