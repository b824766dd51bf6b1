//! Command implementations, one module per top-level command.

pub mod admin;
pub mod auth;
pub mod cart;
pub mod lang;
