//! Records managed from the back-office.
//!
//! Profiles, products and orders are shared with the storefront and live in
//! `amicale_core::records`; they are re-exported here so every console works
//! from one module.

mod event;
mod gallery;
mod lottery;
mod post;
mod representative;

pub use event::{Event, EventDraft};
pub use gallery::{GalleryImage, GalleryImageDraft};
pub use lottery::{LotteryConfig, LotteryDraft};
pub use post::{Post, PostDraft};
pub use representative::{Representative, RepresentativeDraft};

pub use amicale_core::records::{
    Order, OrderItem, Product, ProductDraft, Profile, ProfileDraft,
};
