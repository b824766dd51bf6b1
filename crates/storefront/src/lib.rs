//! Amicale Storefront library.
//!
//! Member-facing services built on the remote store contract:
//! - [`services::cart`] - the merchandise cart and two-step checkout
//! - [`services::auth`] - the session/role gate
//! - [`services::preferences`] - the interface language preference
//! - [`remote`] - the HTTP implementation of the remote store
//! - [`storage`] - device-local key/value storage

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod remote;
pub mod services;
pub mod state;
pub mod storage;
