//! Veilchat shared library — types, IDs, and API contracts shared between the
//! crypto subsystem and its host application.

pub mod api;
pub mod error;
pub mod ids;
