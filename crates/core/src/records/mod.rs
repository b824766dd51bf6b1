//! Records stored in the remote store's row collections.
//!
//! Every collection is a typed [`Record`] with an ID type, a draft type used
//! for writes, and a default sort order. Collections the back-office edits
//! through forms also implement [`Editable`], which adds the field schema
//! checked at the form boundary.
//!
//! The records shared by the storefront and the admin console live here:
//! member profiles, merchandise products, and orders with their line items.

mod order;
mod product;
mod profile;

use core::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

pub use order::{Order, OrderDraft, OrderItem, OrderItemDraft};
pub use product::{Product, ProductDraft};
pub use profile::{Profile, ProfileDraft};

use crate::remote::Sort;
use crate::schema::{self, FieldSpec, ValidationErrors};

/// A row type of one remote collection.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Primary key type.
    type Id: Copy + Eq + fmt::Display + fmt::Debug + Send + Sync;
    /// Payload written on insert and update.
    type Draft: Serialize + Send + Sync;

    /// Remote collection name.
    const COLLECTION: &'static str;
    /// Default list order.
    const SORT: Sort;

    /// This row's primary key.
    fn id(&self) -> Self::Id;
}

/// How many images a form attaches to its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlots {
    /// The record carries no image.
    None,
    /// One image; a failed upload aborts the save.
    Single,
    /// Any number of images; uploads are serial and failures are reported
    /// per file without aborting the save.
    Multiple,
}

/// A draft edited through a back-office form.
pub trait FormDraft: Serialize + DeserializeOwned + Default + Clone + Send + Sync {
    /// Rules beyond the field schema (cross-field checks and the like).
    fn check(&self, _errors: &mut ValidationErrors) {}

    /// Store the public URL of an uploaded image.
    fn attach_image(&mut self, _url: String) {}
}

/// A record the back-office creates and edits through forms.
pub trait Editable: Record<Draft: FormDraft> {
    /// Field schema checked before any remote write.
    const SCHEMA: &'static [FieldSpec];
    /// Image slots of the form.
    const IMAGES: ImageSlots;

    /// Copy this record into an edit buffer.
    fn to_draft(&self) -> Self::Draft;
}

/// Validate a draft against its record's schema and its own rules.
///
/// # Errors
///
/// Returns every field error found.
pub fn validate_draft<R: Editable>(draft: &R::Draft) -> Result<(), ValidationErrors> {
    let mut errors = match serde_json::to_value(draft) {
        Ok(value) => schema::validate(R::SCHEMA, &value),
        Err(e) => {
            let mut errors = ValidationErrors::default();
            errors.add("form", e.to_string());
            errors
        }
    };
    draft.check(&mut errors);
    errors.into_result()
}
