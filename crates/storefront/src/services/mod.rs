//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Session tracking, role derivation and credential operations
//! - `cart` - Local merchandise cart and checkout
//! - `preferences` - Interface language

pub mod auth;
pub mod cart;
pub mod preferences;
