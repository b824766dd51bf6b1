//! Amicale Admin library.
//!
//! The back-office of the association: news posts, events, the lottery,
//! board members, the photo gallery, members and merchandise orders.
//!
//! # Security
//!
//! Every console is opened through [`console::AdminConsole`], which checks
//! the session gate's derived role against the tab's allowed roles. Anonymous
//! and loading sessions are always refused. The remote store enforces its
//! own row-level policies on top of this.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod console;
pub mod error;
pub mod models;

pub use console::{AdminConsole, Tab};
pub use error::AdminError;
