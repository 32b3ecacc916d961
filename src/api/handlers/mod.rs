//! Request handlers for the query API (C5).

pub mod metadata;
pub mod properties;
