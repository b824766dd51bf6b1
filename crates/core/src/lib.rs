//! Amicale Core - Shared types and the remote store contract.
//!
//! This crate provides common types used across all Amicale components:
//! - `storefront` - Cart engine, session gate and the HTTP store client
//! - `admin` - Back-office console over the association's record collections
//! - `cli` - Command-line shell wiring the services together
//!
//! # Architecture
//!
//! The core crate contains types, traits and pure logic. The only concrete
//! store it ships is [`remote::MemoryStore`], which keeps everything in process
//! memory and is used by tests and offline runs.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, roles and statuses
//! - [`records`] - Records shared by the storefront and the admin console
//! - [`schema`] - Field schemas and form-boundary validation
//! - [`batch`] - Aggregate results for serial batch operations
//! - [`remote`] - The remote store contract

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod batch;
pub mod records;
pub mod remote;
pub mod schema;
pub mod types;

pub use batch::BatchResult;
pub use types::*;
