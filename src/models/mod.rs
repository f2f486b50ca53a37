//! Data models for the GLPI gateway.
//!
//! This module contains the response envelope shared by all operations,
//! the search criterion tree, ticket descriptors and directory users.

mod criterion;
mod envelope;
mod ticket;
mod user;

pub use criterion::*;
pub use envelope::*;
pub use ticket::*;
pub use user::*;
