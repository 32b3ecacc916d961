//! Query API (C5): a stateless HTTP server with caching and rate limiting
//! in front of the search index (spec §4.5).

pub mod cache;
pub mod handlers;
pub mod query;
pub mod rate_limit;
pub mod routes;
pub mod state;
